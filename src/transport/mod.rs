// SensorStream - Host Transports
//
// Host links.  Exactly one transport is compiled into an image.

pub mod serial;
pub mod wireless;

pub use serial::{SerialPort, StreamingTransport};
pub use wireless::{ConnectionState, LinkIndicator, Radio, WirelessTransport};

use crate::config::TransportKind;
use crate::error::Result;
use crate::packetizer::Packet;

/// Carries the descriptor and the packet stream to a host.
///
/// Every method runs on the scheduler's single thread.  `send_packet` may
/// block that thread until the underlying channel accepts the bytes; on the
/// serial link this back-pressure bounds how many samples the sensor FIFO
/// drops, so implementations must not hide it behind a queue.
pub trait Transport {
    fn kind(&self) -> TransportKind;

    /// Link upkeep: connection tracking, inbound commands, descriptor
    /// re-advertisement.  Called once per scheduler tick.
    fn poll(&mut self, now_ms: u32) -> Result<()>;

    /// Whether a receiver is present and has agreed to the packet shape.
    fn is_ready(&self) -> bool;

    /// Publish the configuration descriptor.  Called once at setup.
    fn send_config(&mut self, descriptor: &[u8]) -> Result<()>;

    fn send_packet(&mut self, packet: &Packet<'_>) -> Result<()>;
}
