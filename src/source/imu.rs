// SensorStream - IMU Sample Source
//
// Drains the LSM9DS1 FIFO one sample at a time into the packet buffer.  Column
// order is accel XYZ, gyro XYZ, mag XYZ for whichever groups are enabled.
//
// The magnetometer has no FIFO.  Without accel/gyro, each poll of its
// data-ready flag moves one fresh triple into a queue as deep as the
// accel/gyro FIFO, oldest dropped first, so whole packets build up across ticks.

use std::collections::VecDeque;

use embedded_hal::i2c::I2c;

use crate::buffer::SampleBuffer;
use crate::config::{SourceKind, IMU_FIFO_DEPTH};
use crate::descriptor::{DescriptorBuilder, SensorKind};
use crate::drivers::imu::{ImuSettings, Lsm9ds1};
use crate::error::Result;
use crate::source::SampleSource;

const MAX_IMU_COLUMNS: usize = 9;

pub struct ImuSource<I2C> {
    imu: Lsm9ds1<I2C>,
    settings: ImuSettings,
    column_start: usize,
    mag_queue: VecDeque<[i16; 3]>,
    mag_dropped: u64,
}

impl<I2C: I2c> ImuSource<I2C> {
    /// Wrap an initialised driver and switch its FIFO to continuous mode.
    pub fn new(mut imu: Lsm9ds1<I2C>, settings: ImuSettings) -> Result<Self> {
        if settings.selection.accel || settings.selection.gyro {
            imu.set_continuous_mode()?;
        }
        Ok(Self {
            imu,
            settings,
            column_start: 0,
            mag_queue: VecDeque::with_capacity(IMU_FIFO_DEPTH),
            mag_dropped: 0,
        })
    }

    /// Move a fresh magnetometer triple, if any, into the queue.
    fn poll_mag(&mut self) -> Result<()> {
        if !self.imu.mag_ready()? {
            return Ok(());
        }
        let triple = self.imu.read_mag()?;
        if self.mag_queue.len() == IMU_FIFO_DEPTH {
            self.mag_queue.pop_front();
            self.mag_dropped += 1;
            if self.mag_dropped == 1 {
                log::warn!("mag queue full, dropping oldest samples");
            }
        }
        self.mag_queue.push_back(triple);
        Ok(())
    }

    fn fifo_backed(&self) -> bool {
        self.settings.selection.accel || self.settings.selection.gyro
    }

    /// Read one sample across every enabled group into `row`; returns its width.
    fn read_row(&mut self, row: &mut [i16; MAX_IMU_COLUMNS]) -> Result<usize> {
        let sel = self.settings.selection;
        let mut width = 0;
        if sel.gyro || sel.accel {
            // Gyro first: the accel read advances the FIFO slot.
            let gyro = self.imu.read_gyro()?;
            let accel = self.imu.read_accel()?;
            if sel.accel {
                row[width..width + 3].copy_from_slice(&accel);
                width += 3;
            }
            if sel.gyro {
                row[width..width + 3].copy_from_slice(&gyro);
                width += 3;
            }
        }
        if sel.mag {
            row[width..width + 3].copy_from_slice(&self.imu.read_mag()?);
            width += 3;
        }
        Ok(width)
    }
}

impl<I2C: I2c> SampleSource for ImuSource<I2C> {
    fn kind(&self) -> SourceKind {
        SourceKind::Imu
    }

    fn describe(&mut self, descriptor: &mut DescriptorBuilder) -> usize {
        let sel = self.settings.selection;
        let before = descriptor.column_count();
        self.column_start = before;
        let odr = self.settings.accel_gyro_odr.class();
        if sel.accel {
            descriptor.add_group(SensorKind::Accel, odr);
        }
        if sel.gyro {
            descriptor.add_group(SensorKind::Gyro, odr);
        }
        if sel.mag {
            descriptor.add_group(SensorKind::Mag, self.settings.mag_odr.class());
        }
        if let Some(hz) = self.output_data_rate_hz() {
            descriptor.sample_rate(hz);
        }
        descriptor.column_count() - before
    }

    fn output_data_rate_hz(&self) -> Option<u32> {
        if self.fifo_backed() {
            self.settings.accel_gyro_odr.hz()
        } else if self.settings.selection.mag {
            Some((self.settings.mag_odr.millihertz() / 1000).max(1))
        } else {
            None
        }
    }

    fn available(&mut self) -> Result<usize> {
        if self.fifo_backed() {
            self.imu.fifo_samples()
        } else if self.settings.selection.mag {
            self.poll_mag()?;
            Ok(self.mag_queue.len())
        } else {
            Ok(0)
        }
    }

    fn read(&mut self, buffer: &mut SampleBuffer) -> Result<usize> {
        if !self.fifo_backed() {
            while let Some(triple) = self.mag_queue.front() {
                if !buffer.push_sample(self.column_start, triple) {
                    break;
                }
                self.mag_queue.pop_front();
            }
            return Ok(buffer.write_index());
        }
        let ready = self.available()?.min(buffer.remaining());
        let mut row = [0i16; MAX_IMU_COLUMNS];
        for _ in 0..ready {
            let width = self.read_row(&mut row)?;
            if !buffer.push_sample(self.column_start, &row[..width]) {
                break;
            }
        }
        Ok(buffer.write_index())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::{AccelGyroOdr, BuildProfile, ImuSelection, MagOdr, PacketShape, TransportKind};
    use crate::drivers::imu::fake_bus::FakeBus;
    use crate::events::TickOutcome;
    use crate::packetizer::Packet;
    use crate::scheduler::Scheduler;
    use crate::time::Clock;
    use crate::transport::Transport;

    fn build(sel: ImuSelection, fifo: usize, mag: usize) -> ImuSource<FakeBus> {
        let mut bus = FakeBus::lsm9ds1();
        for i in 0..fifo as i16 {
            bus.fifo.push_back(([i, i + 100, i + 200], [-i, -i - 100, -i - 200]));
        }
        for i in 0..mag as i16 {
            bus.mag.push_back([1000 + i, 2000 + i, 3000 + i]);
        }
        let settings = ImuSettings {
            selection: sel,
            accel_gyro_odr: AccelGyroOdr::Hz119,
            mag_odr: MagOdr::Hz20,
        };
        ImuSource::new(Lsm9ds1::new(bus), settings).unwrap()
    }

    fn source(accel: bool, gyro: bool, mag: bool, fifo: usize) -> ImuSource<FakeBus> {
        build(ImuSelection { accel, gyro, mag }, fifo, 0)
    }

    const MAG_ONLY: ImuSelection = ImuSelection { accel: false, gyro: false, mag: true };
    const NINE_AXIS: ImuSelection = ImuSelection { accel: true, gyro: true, mag: true };

    #[derive(Default)]
    struct TestClock(Cell<u32>);

    impl TestClock {
        fn advance(&self, ms: u32) {
            self.0.set(self.0.get() + ms);
        }
    }

    impl Clock for TestClock {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }

        fn delay_ms(&self, ms: u32) {
            self.advance(ms);
        }
    }

    /// Always-ready link that keeps every packet.
    struct Sink {
        kind: TransportKind,
        packets: Vec<Vec<u8>>,
    }

    impl Sink {
        fn new(kind: TransportKind) -> Self {
            Self { kind, packets: Vec::new() }
        }
    }

    impl Transport for Sink {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        fn poll(&mut self, _now_ms: u32) -> Result<()> {
            Ok(())
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn send_config(&mut self, _descriptor: &[u8]) -> Result<()> {
            Ok(())
        }

        fn send_packet(&mut self, packet: &Packet<'_>) -> Result<()> {
            self.packets.push(packet.as_bytes().to_vec());
            Ok(())
        }
    }

    fn decode(bytes: &[u8]) -> Vec<i16> {
        bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
    }

    #[test]
    fn describe_claims_accel_then_gyro() {
        let mut src = source(true, true, false, 0);
        let mut b = crate::descriptor::ConfigDescriptor::builder();
        assert_eq!(src.describe(&mut b), 6);
        let d = b.build();
        assert_eq!(d.sample_rate, 119);
        assert_eq!(d.sensors[0].sensor, SensorKind::Accel);
        assert_eq!(d.sensors[1].start, 3);
        assert_eq!(d.sensors[0].odr, 3);
    }

    #[test]
    fn read_stops_at_packet_boundary() {
        let mut src = source(true, true, false, 8);
        let mut b = crate::descriptor::ConfigDescriptor::builder();
        let columns = src.describe(&mut b);
        let mut buf = SampleBuffer::new(PacketShape::STREAMING, columns).unwrap();

        assert_eq!(src.available().unwrap(), 8);
        assert_eq!(src.read(&mut buf).unwrap(), 6 * 6);
        assert!(buf.is_full());
        // The remainder stays queued in the FIFO.
        assert_eq!(src.available().unwrap(), 2);
        assert_eq!(&buf.as_slice()[..6], &[0, 100, 200, 0, -100, -200]);
        assert_eq!(&buf.as_slice()[6..9], &[1, 101, 201]);
    }

    #[test]
    fn mag_only_queues_one_sample_per_ready_flag() {
        let mut src = build(MAG_ONLY, 0, 3);
        assert_eq!(src.output_data_rate_hz(), Some(20));
        assert_eq!(src.available().unwrap(), 1);
        assert_eq!(src.available().unwrap(), 2);
        assert_eq!(src.available().unwrap(), 3);
        // Flag clear: nothing new, nothing lost.
        assert_eq!(src.available().unwrap(), 3);
    }

    #[test]
    fn mag_queue_drops_oldest_when_full() {
        let mut src = build(MAG_ONLY, 0, IMU_FIFO_DEPTH + 2);
        for _ in 0..IMU_FIFO_DEPTH + 2 {
            src.available().unwrap();
        }
        assert_eq!(src.available().unwrap(), IMU_FIFO_DEPTH);
        assert_eq!(src.mag_dropped, 2);
        assert_eq!(src.mag_queue.front(), Some(&[1002, 2002, 3002]));
    }

    #[test]
    fn fifo_is_switched_to_continuous_mode() {
        let src = source(true, false, false, 0);
        assert!(src.imu.is_continuous());
    }

    #[test]
    fn mag_only_fills_serial_packets_across_ticks() {
        let profile = BuildProfile { transport: TransportKind::Streaming, source: SourceKind::Imu };
        let (mut scheduler, mut state) =
            Scheduler::setup(build(MAG_ONLY, 0, 12), Sink::new(TransportKind::Streaming), TestClock::default(), profile)
                .unwrap();
        assert_eq!(state.session().interval_ms(), 25);

        let mut emitted = Vec::new();
        for _ in 0..12 {
            scheduler.clock().advance(25);
            emitted.push(scheduler.tick(&mut state).unwrap());
        }
        assert_eq!(emitted[4], TickOutcome::Idle);
        assert_eq!(emitted[5], TickOutcome::Emitted(1));
        assert_eq!(emitted[11], TickOutcome::Emitted(1));

        let packets = &scheduler.transport().packets;
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].len(), 6 * 3 * 2);
        let first = decode(&packets[0]);
        assert_eq!(&first[..3], &[1000, 2000, 3000]);
        assert_eq!(&first[15..], &[1005, 2005, 3005]);
        assert_eq!(&decode(&packets[1])[..3], &[1006, 2006, 3006]);
    }

    #[test]
    fn nine_axis_streams_over_serial() {
        let profile = BuildProfile { transport: TransportKind::Streaming, source: SourceKind::Imu };
        let (mut scheduler, mut state) =
            Scheduler::setup(build(NINE_AXIS, 8, 8), Sink::new(TransportKind::Streaming), TestClock::default(), profile)
                .unwrap();
        assert_eq!(scheduler.descriptor().column_count(), 9);

        scheduler.clock().advance(4);
        assert_eq!(scheduler.tick(&mut state).unwrap(), TickOutcome::Emitted(1));
        let packet = decode(&scheduler.transport().packets[0]);
        assert_eq!(packet.len(), 6 * 9);
        assert_eq!(&packet[..9], &[0, 100, 200, 0, -100, -200, 1000, 2000, 3000]);
        assert_eq!(&packet[45..], &[5, 105, 205, -5, -105, -205, 1005, 2005, 3005]);
    }

    #[test]
    fn nine_axis_fits_one_sample_per_notification() {
        let profile = BuildProfile { transport: TransportKind::Wireless, source: SourceKind::Imu };
        let (mut scheduler, mut state) =
            Scheduler::setup(build(NINE_AXIS, 3, 3), Sink::new(TransportKind::Wireless), TestClock::default(), profile)
                .unwrap();

        scheduler.clock().advance(4);
        assert_eq!(scheduler.tick(&mut state).unwrap(), TickOutcome::Emitted(3));
        let packets = &scheduler.transport().packets;
        assert!(packets.iter().all(|p| p.len() == 9 * 2));
        assert_eq!(decode(&packets[2]), vec![2, 102, 202, -2, -102, -202, 1002, 2002, 3002]);
    }
}
