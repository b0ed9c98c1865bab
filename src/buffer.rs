// SensorStream - Sample Buffer
//
// Fixed-capacity store for one packet's worth of raw samples.  Samples are laid
// out in acquisition order with their columns contiguous, so the filled prefix
// of the buffer is already in wire order.

use byteorder::{ByteOrder, LittleEndian};

use crate::config::PacketShape;
use crate::error::{Error, Result};

/// Bytes per encoded column value.
pub const ELEMENT_SIZE: usize = core::mem::size_of::<i16>();

pub struct SampleBuffer {
    data: Box<[i16]>,
    columns: usize,
    max_samples: usize,
    samples: usize,
}

impl SampleBuffer {
    /// Allocate a buffer of `shape.capacity()` elements for samples that are
    /// `columns` wide.  The allocation is never resized afterwards.
    pub fn new(shape: PacketShape, columns: usize) -> Result<Self> {
        if columns == 0 {
            return Err(Error::NoColumns);
        }
        if columns > shape.max_columns {
            return Err(Error::TooManyColumns { columns, max: shape.max_columns });
        }
        Ok(Self {
            data: vec![0i16; shape.capacity()].into_boxed_slice(),
            columns,
            max_samples: shape.samples_per_packet,
            samples: 0,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Complete samples currently held.
    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn is_full(&self) -> bool {
        self.samples >= self.max_samples
    }

    /// How many more samples fit before the packet is full.
    pub fn remaining(&self) -> usize {
        self.max_samples - self.samples
    }

    /// Flat index one past the last value written.
    pub fn write_index(&self) -> usize {
        self.samples * self.columns
    }

    /// Commit one sample.  `values` land at `column_start` within the sample's
    /// row; the other columns of the row keep whatever they held (zero after
    /// [`clear`](Self::clear)).  Returns `false`, writing nothing, when the
    /// buffer is full or the values do not fit the row.
    pub fn push_sample(&mut self, column_start: usize, values: &[i16]) -> bool {
        if self.is_full() || column_start + values.len() > self.columns {
            return false;
        }
        let row = self.write_index() + column_start;
        self.data[row..row + values.len()].copy_from_slice(values);
        self.samples += 1;
        true
    }

    /// The filled region, `len() * columns()` values.
    pub fn as_slice(&self) -> &[i16] {
        &self.data[..self.write_index()]
    }

    /// Serialize the filled region as little-endian bytes into `out`.
    pub fn encode_le(&self, out: &mut Vec<u8>) {
        let values = self.as_slice();
        out.clear();
        out.resize(values.len() * ELEMENT_SIZE, 0);
        LittleEndian::write_i16_into(values, out);
    }

    /// Zero the whole capacity and rewind the write index.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.samples = 0;
    }

    /// True when no sample is held and every element is zero.
    pub fn is_clear(&self) -> bool {
        self.samples == 0 && self.data.iter().all(|&v| v == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming(columns: usize) -> SampleBuffer {
        SampleBuffer::new(PacketShape::STREAMING, columns).unwrap()
    }

    #[test]
    fn capacity_is_max_columns_times_max_samples() {
        let buf = streaming(6);
        assert_eq!(buf.capacity(), 20 * 6);
        assert_eq!(buf.max_samples(), 6);
        assert!(buf.is_clear());
    }

    #[test]
    fn rejects_more_columns_than_the_shape_allows() {
        assert!(matches!(
            SampleBuffer::new(PacketShape::WIRELESS, 11),
            Err(Error::TooManyColumns { columns: 11, max: 10 })
        ));
        assert!(SampleBuffer::new(PacketShape::WIRELESS, 10).is_ok());
        assert!(matches!(SampleBuffer::new(PacketShape::WIRELESS, 0), Err(Error::NoColumns)));
    }

    #[test]
    fn samples_are_column_contiguous() {
        let mut buf = streaming(3);
        assert!(buf.push_sample(0, &[1, 2, 3]));
        assert!(buf.push_sample(0, &[4, 5, 6]));
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(buf.write_index(), 6);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn partial_row_leaves_other_columns_untouched() {
        let mut buf = streaming(4);
        assert!(buf.push_sample(2, &[7, 8]));
        assert_eq!(buf.as_slice(), &[0, 0, 7, 8]);
    }

    #[test]
    fn full_buffer_refuses_whole_sample() {
        let mut buf = SampleBuffer::new(PacketShape::WIRELESS, 2).unwrap();
        assert!(buf.push_sample(0, &[1, 1]));
        assert!(!buf.push_sample(0, &[2, 2]));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.as_slice(), &[1, 1]);
    }

    #[test]
    fn oversized_row_is_refused() {
        let mut buf = streaming(2);
        assert!(!buf.push_sample(1, &[1, 2]));
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut buf = streaming(10);
        for i in 0..6 {
            buf.push_sample(0, &[i; 10]);
        }
        buf.clear();
        let once: Vec<i16> = buf.data.to_vec();
        buf.clear();
        assert_eq!(buf.data.to_vec(), once);
        assert!(buf.is_clear());
        assert_eq!(buf.write_index(), 0);
    }

    #[test]
    fn encodes_little_endian() {
        let mut buf = streaming(2);
        buf.push_sample(0, &[0x0102, -2]);
        let mut out = Vec::new();
        buf.encode_le(&mut out);
        assert_eq!(out, vec![0x02, 0x01, 0xFE, 0xFF]);
    }
}
