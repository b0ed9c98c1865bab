// SensorStream - Configuration Descriptor
//
// The JSON document a host reads before any packet so it knows how to slice the
// raw stream: which sensor groups occupy which columns, their rate class, and
// how many samples each packet carries.

use serde::{Deserialize, Serialize};

use crate::buffer::ELEMENT_SIZE;
use crate::config::WRITE_BUFFER_SIZE;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accel,
    Gyro,
    Mag,
    Mic,
}

impl SensorKind {
    /// Column labels, in column order, for one group of this kind.
    pub fn column_names(self) -> &'static [&'static str] {
        match self {
            Self::Accel => &["AccelerometerX", "AccelerometerY", "AccelerometerZ"],
            Self::Gyro  => &["GyroscopeX", "GyroscopeY", "GyroscopeZ"],
            Self::Mag   => &["MagnetometerX", "MagnetometerY", "MagnetometerZ"],
            Self::Mic   => &["Microphone0"],
        }
    }

    pub fn width(self) -> usize {
        self.column_names().len()
    }
}

/// One enabled sensor group and the columns it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGroup {
    pub sensor: SensorKind,
    pub start: usize,
    pub count: usize,
    /// Device rate class (ODR register encoding).
    pub odr: u8,
}

/// A single logical channel with its session-stable index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub index: usize,
    pub name: &'static str,
    pub sensor: SensorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    pub sample_rate: u32,
    pub samples_per_packet: usize,
    pub sensors: Vec<SensorGroup>,
}

impl ConfigDescriptor {
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    pub fn column_count(&self) -> usize {
        self.sensors.iter().map(|g| g.count).sum()
    }

    /// Every active column, ordered by index.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = self
            .sensors
            .iter()
            .flat_map(|g| {
                g.sensor
                    .column_names()
                    .iter()
                    .take(g.count)
                    .enumerate()
                    .map(move |(i, &name)| Column { index: g.start + i, name, sensor: g.sensor })
            })
            .collect();
        columns.sort_by_key(|c| c.index);
        columns
    }

    /// Bytes in one full packet on the wire.
    pub fn packet_len(&self) -> usize {
        self.column_count() * self.samples_per_packet * ELEMENT_SIZE
    }

    /// Encode as JSON, bounded by the handshake write buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > WRITE_BUFFER_SIZE {
            return Err(Error::DescriptorTooLarge { len: bytes.len(), limit: WRITE_BUFFER_SIZE });
        }
        Ok(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Collects sensor groups as sources register them, handing out consecutive
/// column ranges.
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    sample_rate: u32,
    samples_per_packet: usize,
    sensors: Vec<SensorGroup>,
    next_column: usize,
}

impl DescriptorBuilder {
    /// Claim the next `sensor.width()` columns; returns the starting column.
    pub fn add_group(&mut self, sensor: SensorKind, odr: u8) -> usize {
        let start = self.next_column;
        let count = sensor.width();
        self.sensors.push(SensorGroup { sensor, start, count, odr });
        self.next_column += count;
        start
    }

    pub fn sample_rate(&mut self, hz: u32) -> &mut Self {
        self.sample_rate = hz;
        self
    }

    pub fn samples_per_packet(&mut self, n: usize) -> &mut Self {
        self.samples_per_packet = n;
        self
    }

    /// Columns claimed so far.
    pub fn column_count(&self) -> usize {
        self.next_column
    }

    pub fn build(self) -> ConfigDescriptor {
        ConfigDescriptor {
            sample_rate: self.sample_rate,
            samples_per_packet: self.samples_per_packet,
            sensors: self.sensors,
        }
    }
}
