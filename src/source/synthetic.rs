// SensorStream - Synthetic IMU Source
//
// Stands in for the LSM9DS1 on the host build.  Samples accumulate in a
// bounded queue at the configured rate, so the scheduler sees the same
// "FIFO fills between ticks" behaviour it gets from the real part.

use crate::buffer::SampleBuffer;
use crate::config::{ImuSelection, SourceKind, IMU_FIFO_DEPTH};
use crate::descriptor::{DescriptorBuilder, SensorKind};
use crate::error::Result;
use crate::source::SampleSource;
use crate::time::{elapsed_ms, Clock};

/// Depth of the LSM9DS1 FIFO.
pub const SYNTHETIC_FIFO_DEPTH: usize = IMU_FIFO_DEPTH;

pub struct SyntheticSource<C> {
    clock: C,
    selection: ImuSelection,
    odr_hz: u32,
    column_start: usize,
    columns: usize,
    /// Samples produced so far; also the phase of the next one.
    produced: u64,
    queued: usize,
    last_fill_ms: u32,
    residue_ms: u64,
}

impl<C: Clock> SyntheticSource<C> {
    pub fn new(clock: C, selection: ImuSelection, odr_hz: u32) -> Self {
        let last_fill_ms = clock.now_ms();
        Self {
            clock,
            selection,
            odr_hz: odr_hz.max(1),
            column_start: 0,
            columns: 0,
            produced: 0,
            queued: 0,
            last_fill_ms,
            residue_ms: 0,
        }
    }

    /// Advance the virtual FIFO to the current time, dropping the oldest
    /// samples on overflow like the part does in continuous mode.
    fn fill(&mut self) {
        let now = self.clock.now_ms();
        let span = u64::from(elapsed_ms(now, self.last_fill_ms)) * u64::from(self.odr_hz) + self.residue_ms;
        self.last_fill_ms = now;
        let fresh = span / 1000;
        self.residue_ms = span % 1000;

        let total = self.queued as u64 + fresh;
        let dropped = total.saturating_sub(SYNTHETIC_FIFO_DEPTH as u64);
        self.produced += dropped;
        self.queued = total.min(SYNTHETIC_FIFO_DEPTH as u64) as usize;
    }

    /// Deterministic waveform: column `c` of sample `n` is a ramp offset by
    /// the column so every channel is distinguishable on the host.
    fn sample(&self, n: u64, row: &mut [i16]) {
        for (c, v) in row.iter_mut().enumerate() {
            *v = ((n as i64 * 16 + c as i64 * 1000) % i64::from(i16::MAX)) as i16;
        }
    }
}

impl<C: Clock> SampleSource for SyntheticSource<C> {
    fn kind(&self) -> SourceKind {
        SourceKind::Imu
    }

    fn describe(&mut self, descriptor: &mut DescriptorBuilder) -> usize {
        let before = descriptor.column_count();
        self.column_start = before;
        // Rate class 3 is the 119 Hz setting on the real part.
        if self.selection.accel {
            descriptor.add_group(SensorKind::Accel, 3);
        }
        if self.selection.gyro {
            descriptor.add_group(SensorKind::Gyro, 3);
        }
        if self.selection.mag {
            descriptor.add_group(SensorKind::Mag, 5);
        }
        descriptor.sample_rate(self.odr_hz);
        self.columns = descriptor.column_count() - before;
        self.columns
    }

    fn output_data_rate_hz(&self) -> Option<u32> {
        Some(self.odr_hz)
    }

    fn available(&mut self) -> Result<usize> {
        self.fill();
        Ok(self.queued)
    }

    fn read(&mut self, buffer: &mut SampleBuffer) -> Result<usize> {
        let ready = self.available()?.min(buffer.remaining());
        let mut row = vec![0i16; self.columns];
        for _ in 0..ready {
            self.sample(self.produced, &mut row);
            if !buffer.push_sample(self.column_start, &row) {
                break;
            }
            self.produced += 1;
            self.queued -= 1;
        }
        Ok(buffer.write_index())
    }
}
