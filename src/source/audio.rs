// SensorStream - Microphone Sample Source
//
// One PCM column at a fixed rate.  The peripheral DMA queue is the FIFO; the
// scheduler drains it on every tick because there is no ODR to pace against.

use crate::buffer::SampleBuffer;
use crate::config::{SourceKind, AUDIO_SAMPLE_RATE};
use crate::descriptor::{DescriptorBuilder, SensorKind};
use crate::error::Result;
use crate::source::SampleSource;

/// A PCM capture peripheral with its own receive queue.
pub trait Microphone {
    /// Samples already captured and waiting.  Never blocks.
    fn samples_available(&mut self) -> Result<usize>;

    /// Copy up to `out.len()` queued samples; returns how many were written.
    fn read_pcm(&mut self, out: &mut [i16]) -> Result<usize>;
}

pub struct AudioSource<M> {
    mic: M,
    column_start: usize,
    scratch: Vec<i16>,
}

impl<M: Microphone> AudioSource<M> {
    pub fn new(mic: M) -> Self {
        Self { mic, column_start: 0, scratch: Vec::new() }
    }
}

impl<M: Microphone> SampleSource for AudioSource<M> {
    fn kind(&self) -> SourceKind {
        SourceKind::Audio
    }

    fn describe(&mut self, descriptor: &mut DescriptorBuilder) -> usize {
        self.column_start = descriptor.add_group(SensorKind::Mic, 0);
        descriptor.sample_rate(AUDIO_SAMPLE_RATE);
        SensorKind::Mic.width()
    }

    fn output_data_rate_hz(&self) -> Option<u32> {
        None
    }

    fn available(&mut self) -> Result<usize> {
        self.mic.samples_available()
    }

    fn read(&mut self, buffer: &mut SampleBuffer) -> Result<usize> {
        let want = self.mic.samples_available()?.min(buffer.remaining());
        if want == 0 {
            return Ok(buffer.write_index());
        }
        self.scratch.resize(want, 0);
        let got = self.mic.read_pcm(&mut self.scratch)?;
        for &pcm in &self.scratch[..got.min(want)] {
            if !buffer.push_sample(self.column_start, &[pcm]) {
                break;
            }
        }
        Ok(buffer.write_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PacketShape;

    struct ToneMic {
        queued: Vec<i16>,
    }

    impl Microphone for ToneMic {
        fn samples_available(&mut self) -> Result<usize> {
            Ok(self.queued.len())
        }

        fn read_pcm(&mut self, out: &mut [i16]) -> Result<usize> {
            let n = out.len().min(self.queued.len());
            out[..n].copy_from_slice(&self.queued[..n]);
            self.queued.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn describes_a_single_mic_column() {
        let mut src = AudioSource::new(ToneMic { queued: vec![] });
        let mut b = crate::descriptor::ConfigDescriptor::builder();
        assert_eq!(src.describe(&mut b), 1);
        let d = b.build();
        assert_eq!(d.sample_rate, 16_000);
        assert_eq!(d.sensors[0].sensor, SensorKind::Mic);
        assert_eq!(src.output_data_rate_hz(), None);
    }

    #[test]
    fn fills_at_most_one_packet() {
        let queued: Vec<i16> = (0..200).collect();
        let mut src = AudioSource::new(ToneMic { queued });
        let mut b = crate::descriptor::ConfigDescriptor::builder();
        let columns = src.describe(&mut b);
        let mut buf = SampleBuffer::new(PacketShape::STREAMING_AUDIO, columns).unwrap();

        assert_eq!(src.read(&mut buf).unwrap(), 128);
        assert!(buf.is_full());
        assert_eq!(buf.as_slice()[127], 127);
        assert_eq!(src.available().unwrap(), 72);
    }
}
