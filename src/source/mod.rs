// SensorStream - Sample Sources
//
// Sample sources: one physical sensor behind a uniform contract.

pub mod audio;
pub mod imu;
pub mod synthetic;

pub use audio::{AudioSource, Microphone};
pub use imu::ImuSource;
pub use synthetic::SyntheticSource;

use crate::buffer::SampleBuffer;
use crate::config::SourceKind;
use crate::descriptor::DescriptorBuilder;
use crate::error::Result;

/// A sensor that queues samples in hardware until they are read.
pub trait SampleSource {
    fn kind(&self) -> SourceKind;

    /// Register this source's sensor groups with the descriptor and return the
    /// number of columns it claimed.  The source writes only those columns.
    fn describe(&mut self, descriptor: &mut DescriptorBuilder) -> usize;

    /// Output data rate in Hz, or `None` when the source should be drained on
    /// every scheduler tick.
    fn output_data_rate_hz(&self) -> Option<u32>;

    /// Whole samples queued in the peripheral.  Never blocks.
    fn available(&mut self) -> Result<usize>;

    /// Move as many queued samples as fit into `buffer`, starting at its write
    /// index.  Returns the flat index one past the last value written.
    fn read(&mut self, buffer: &mut SampleBuffer) -> Result<usize>;
}
