// SensorStream - Error Types
//
// Failures the library reports; the binary wraps them in `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("sensor bus error: {0}")]
    Bus(String),

    #[error("unexpected device id at 0x{addr:02X}: got 0x{found:02X}, expected 0x{expected:02X}")]
    WrongDevice { addr: u8, found: u8, expected: u8 },

    #[error("{columns} active columns exceed the transport limit of {max}")]
    TooManyColumns { columns: usize, max: usize },

    #[error("packet of {bytes} bytes exceeds the transport MTU of {mtu}")]
    PacketTooLarge { bytes: usize, mtu: usize },

    #[error("configuration descriptor is {len} bytes, limit is {limit}")]
    DescriptorTooLarge { len: usize, limit: usize },

    #[error("configuration descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error("source has no active columns")]
    NoColumns,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported build profile: {0}")]
    UnsupportedProfile(&'static str),
}

impl Error {
    /// Map an `embedded-hal` bus error into [`Error::Bus`].
    pub fn bus<E: embedded_hal::i2c::Error>(e: E) -> Self {
        Error::Bus(format!("{:?}", e.kind()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
