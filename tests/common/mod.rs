// SensorStream - Test Fakes
//
// Shared fakes for the pipeline integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use sensor_stream::buffer::SampleBuffer;
use sensor_stream::config::{SourceKind, TransportKind};
use sensor_stream::descriptor::{DescriptorBuilder, SensorKind};
use sensor_stream::packetizer::Packet;
use sensor_stream::source::SampleSource;
use sensor_stream::time::Clock;
use sensor_stream::transport::{LinkIndicator, Radio, SerialPort, Transport};
use sensor_stream::{Error, Result};

/// Clock that only moves when told to.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u32>>);

impl ManualClock {
    pub fn advance(&self, ms: u32) {
        self.0.set(self.0.get().wrapping_add(ms));
    }

    pub fn set(&self, ms: u32) {
        self.0.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(ms);
    }
}

/// Source backed by a queue of pre-built rows.  A row shorter than the
/// source's width only writes its leading columns.
pub struct ScriptedSource {
    pub kind: SourceKind,
    pub groups: Vec<SensorKind>,
    pub odr_hz: Option<u32>,
    pub queue: VecDeque<Vec<i16>>,
    pub reads: usize,
    column_start: usize,
}

impl ScriptedSource {
    pub fn imu(groups: &[SensorKind], odr_hz: u32) -> Self {
        Self {
            kind: SourceKind::Imu,
            groups: groups.to_vec(),
            odr_hz: Some(odr_hz),
            queue: VecDeque::new(),
            reads: 0,
            column_start: 0,
        }
    }

    pub fn audio() -> Self {
        Self {
            kind: SourceKind::Audio,
            groups: vec![SensorKind::Mic],
            odr_hz: None,
            queue: VecDeque::new(),
            reads: 0,
            column_start: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.groups.iter().map(|g| g.width()).sum()
    }

    /// Queue `n` full-width samples; every column of sample `k` holds
    /// `first + k`.
    pub fn push_samples(&mut self, first: i16, n: usize) {
        let width = self.width();
        for k in 0..n {
            self.queue.push_back(vec![first + k as i16; width]);
        }
    }
}

impl SampleSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn describe(&mut self, descriptor: &mut DescriptorBuilder) -> usize {
        self.column_start = descriptor.column_count();
        for &group in &self.groups {
            descriptor.add_group(group, 3);
        }
        if let Some(hz) = self.odr_hz {
            descriptor.sample_rate(hz);
        }
        self.width()
    }

    fn output_data_rate_hz(&self) -> Option<u32> {
        self.odr_hz
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.queue.len())
    }

    fn read(&mut self, buffer: &mut SampleBuffer) -> Result<usize> {
        self.reads += 1;
        while let Some(row) = self.queue.front() {
            if !buffer.push_sample(self.column_start, row) {
                break;
            }
            self.queue.pop_front();
        }
        Ok(buffer.write_index())
    }
}

/// Transport that records everything and is ready when told to be.
pub struct RecordingTransport {
    pub kind: TransportKind,
    pub ready: bool,
    pub configs: Vec<Vec<u8>>,
    pub packets: Vec<Vec<u8>>,
    pub polls: Vec<u32>,
}

impl RecordingTransport {
    pub fn new(kind: TransportKind) -> Self {
        Self { kind, ready: true, configs: Vec::new(), packets: Vec::new(), polls: Vec::new() }
    }
}

impl Transport for RecordingTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn poll(&mut self, now_ms: u32) -> Result<()> {
        self.polls.push(now_ms);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn send_config(&mut self, descriptor: &[u8]) -> Result<()> {
        self.configs.push(descriptor.to_vec());
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet<'_>) -> Result<()> {
        self.packets.push(packet.as_bytes().to_vec());
        Ok(())
    }
}

/// In-memory serial port.
#[derive(Default)]
pub struct FakeSerialPort {
    pub inbound: VecDeque<u8>,
    pub written: Vec<u8>,
    pub flushes: usize,
}

impl FakeSerialPort {
    pub fn send_line(&mut self, line: &str) {
        self.inbound.extend(line.as_bytes());
        self.inbound.push_back(b'\n');
    }

    /// Complete newline-terminated lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.written
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }
}

impl SerialPort for FakeSerialPort {
    fn available(&mut self) -> Result<usize> {
        Ok(self.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// BLE stack stand-in.  Notifications are lost while `drop_notifications`
/// is set, as they are when no central has subscribed.
#[derive(Default)]
pub struct FakeRadio {
    pub connected: bool,
    pub config: Vec<u8>,
    pub notified: Vec<Vec<u8>>,
    pub adverts: usize,
    pub drop_notifications: bool,
}

impl Radio for FakeRadio {
    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn set_config(&mut self, descriptor: &[u8]) -> Result<()> {
        self.config = descriptor.to_vec();
        Ok(())
    }

    fn notify(&mut self, bytes: &[u8]) -> Result<()> {
        if self.drop_notifications {
            return Err(Error::Transport("not subscribed".into()));
        }
        self.notified.push(bytes.to_vec());
        Ok(())
    }

    fn advertise(&mut self) -> Result<()> {
        self.adverts += 1;
        Ok(())
    }

    fn address(&self) -> String {
        "02:00:00:00:00:01".into()
    }
}

/// Records indicator changes through a shared handle.
#[derive(Clone, Default)]
pub struct RecordingLed(pub Rc<RefCell<Vec<bool>>>);

impl LinkIndicator for RecordingLed {
    fn set_connected(&mut self, connected: bool) {
        self.0.borrow_mut().push(connected);
    }
}

/// Decode a little-endian packet back into values.
pub fn decode(bytes: &[u8]) -> Vec<i16> {
    bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
}
