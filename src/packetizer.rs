// SensorStream - Packetizer
//
// Turns the sample buffer into transport-sized packets.  One call to `emit`
// sends every whole packet the source has queued, clearing the buffer after
// each so no sample ever straddles two packets.

use crate::buffer::{SampleBuffer, ELEMENT_SIZE};
use crate::config::PacketShape;
use crate::error::{Error, Result};
use crate::source::SampleSource;
use crate::transport::Transport;

/// One encoded packet, borrowed from the packetizer for the duration of a
/// single `send_packet` call.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    /// Running packet counter, starting at 1.
    pub number: u32,
    pub samples: usize,
    pub columns: usize,
    bytes: &'a [u8],
}

impl<'a> Packet<'a> {
    /// View `bytes` as packet `number` of `columns`-wide samples.
    pub fn new(number: u32, columns: usize, bytes: &'a [u8]) -> Self {
        let samples = bytes.len() / (columns.max(1) * ELEMENT_SIZE);
        Self { number, samples, columns, bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub struct Packetizer {
    buffer: SampleBuffer,
    wire: Vec<u8>,
    packets_sent: u32,
}

impl Packetizer {
    /// Size the buffer for `columns`-wide samples and check a full packet fits
    /// one transmission unit of `mtu` bytes.
    pub fn new(shape: PacketShape, columns: usize, mtu: usize) -> Result<Self> {
        let buffer = SampleBuffer::new(shape, columns)?;
        let bytes = columns * ELEMENT_SIZE * shape.samples_per_packet;
        if bytes > mtu {
            return Err(Error::PacketTooLarge { bytes, mtu });
        }
        Ok(Self {
            buffer,
            wire: Vec::with_capacity(bytes),
            packets_sent: 0,
        })
    }

    pub fn samples_per_packet(&self) -> usize {
        self.buffer.max_samples()
    }

    /// Whole packets that `available` queued samples make up.
    pub fn packets_ready(&self, available: usize) -> usize {
        available / self.buffer.max_samples()
    }

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Read, encode and send up to `packets` packets.  Returns how many went
    /// out.  The buffer is clear on return, including on error.
    pub fn emit<S, T>(&mut self, source: &mut S, transport: &mut T, packets: usize) -> Result<usize>
    where
        S: SampleSource + ?Sized,
        T: Transport + ?Sized,
    {
        let mut sent = 0;
        for _ in 0..packets {
            let result = self.emit_one(source, transport);
            self.buffer.clear();
            match result? {
                true => sent += 1,
                false => break,
            }
        }
        Ok(sent)
    }

    fn emit_one<S, T>(&mut self, source: &mut S, transport: &mut T) -> Result<bool>
    where
        S: SampleSource + ?Sized,
        T: Transport + ?Sized,
    {
        let end = source.read(&mut self.buffer)?;
        if end == 0 {
            return Ok(false);
        }
        self.packets_sent = self.packets_sent.wrapping_add(1);
        self.buffer.encode_le(&mut self.wire);
        let packet = Packet::new(self.packets_sent, self.buffer.columns(), &self.wire);
        log::trace!("packet #{} ({} samples, {} bytes)", packet.number, packet.samples, packet.len());
        transport.send_packet(&packet)?;
        Ok(true)
    }
}
