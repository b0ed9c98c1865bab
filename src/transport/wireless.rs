// SensorStream - Wireless (BLE) Transport
//
// GATT peripheral with a readable config characteristic and a notify data
// characteristic.  The radio stack drives connection changes; this side
// only polls them, flips the status indicator and restarts advertising.

use crate::config::{TransportKind, STATUS_ANNOUNCE_MS};
use crate::error::{Error, Result};
use crate::packetizer::Packet;
use crate::time::elapsed_ms;
use crate::transport::Transport;

/// The BLE stack as seen by the transport.
pub trait Radio {
    /// Whether a central is currently connected.
    fn is_connected(&mut self) -> bool;

    /// Store the descriptor in the read-only config characteristic.
    fn set_config(&mut self, descriptor: &[u8]) -> Result<()>;

    /// Notify the data characteristic.  No acknowledgment.
    fn notify(&mut self, bytes: &[u8]) -> Result<()>;

    fn advertise(&mut self) -> Result<()>;

    /// Address a central should connect to.
    fn address(&self) -> String;
}

/// Shows whether a central is connected (status LED on the board).
pub trait LinkIndicator {
    fn set_connected(&mut self, connected: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Advertising,
    Connected,
}

pub struct WirelessTransport<R, L> {
    radio: R,
    indicator: L,
    state: ConnectionState,
    last_announce_ms: Option<u32>,
}

impl<R: Radio, L: LinkIndicator> WirelessTransport<R, L> {
    /// Start advertising.  A radio that cannot advertise is a startup failure.
    pub fn start(mut radio: R, mut indicator: L) -> Result<Self> {
        indicator.set_connected(false);
        radio.advertise()?;
        log::info!("BLE advertising as {}", radio.address());
        Ok(Self {
            radio,
            indicator,
            state: ConnectionState::Advertising,
            last_announce_ms: None,
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    fn readvertise(&mut self) {
        match self.radio.advertise() {
            Ok(()) => self.state = ConnectionState::Advertising,
            Err(e) => {
                log::warn!("advertising restart failed: {}", e);
                self.state = ConnectionState::Disconnected;
            }
        }
    }

    fn announce_due(&self, now_ms: u32) -> bool {
        self.last_announce_ms
            .map_or(true, |last| elapsed_ms(now_ms, last) >= STATUS_ANNOUNCE_MS)
    }
}

impl<R: Radio, L: LinkIndicator> Transport for WirelessTransport<R, L> {
    fn kind(&self) -> TransportKind {
        TransportKind::Wireless
    }

    fn poll(&mut self, now_ms: u32) -> Result<()> {
        let connected = self.radio.is_connected();
        match (self.state, connected) {
            (ConnectionState::Connected, false) => {
                log::info!("central disconnected");
                self.indicator.set_connected(false);
                self.readvertise();
            }
            (ConnectionState::Advertising | ConnectionState::Disconnected, true) => {
                log::info!("central connected");
                self.indicator.set_connected(true);
                self.state = ConnectionState::Connected;
            }
            _ => {}
        }

        if self.state != ConnectionState::Connected && self.announce_due(now_ms) {
            if self.state == ConnectionState::Disconnected {
                self.readvertise();
            }
            log::info!("waiting for central; connect to {}", self.radio.address());
            self.last_announce_ms = Some(now_ms);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn send_config(&mut self, descriptor: &[u8]) -> Result<()> {
        self.radio.set_config(descriptor)
    }

    fn send_packet(&mut self, packet: &Packet<'_>) -> Result<()> {
        let mtu = self.kind().mtu();
        if packet.len() > mtu {
            return Err(Error::PacketTooLarge { bytes: packet.len(), mtu });
        }
        if let Err(e) = self.radio.notify(packet.as_bytes()) {
            log::debug!("notification #{} dropped: {}", packet.number, e);
        }
        Ok(())
    }
}
