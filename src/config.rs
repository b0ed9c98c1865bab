// SensorStream - Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V) + LSM9DS1 breakout

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_LED_RED: i32 = 2;     // D0    - status LED, red (disconnected)
pub const PIN_LED_GREEN: i32 = 3;   // D1    - status LED, green (connected)
pub const PIN_I2C_SDA: i32 = 6;     // D4    - I2C data line
pub const PIN_I2C_SCL: i32 = 7;     // D5    - I2C clock line
pub const PIN_I2S_BCLK: i32 = 8;    // D8    - microphone bit clock
pub const PIN_I2S_WS: i32 = 9;      // D9    - microphone word select
pub const PIN_I2S_DIN: i32 = 10;    // D10   - microphone data
pub const PIN_UART_TX: i32 = 21;    // D6    - host link TX
pub const PIN_UART_RX: i32 = 20;    // D7    - host link RX

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_LSM9DS1_AG: u8 = 0x6B;
pub const I2C_ADDR_LSM9DS1_M: u8 = 0x1E;
pub const I2C_BAUDRATE_KHZ: u32 = 400;
pub const IMU_FIFO_DEPTH: usize = 32;             // accel/gyro FIFO slots; also bounds the mag queue

// ---------------------------------------------------------------------------
// Host link
// ---------------------------------------------------------------------------
pub const SERIAL_BAUD_RATE: u32 = 115_200 * 8;
pub const WRITE_BUFFER_SIZE: usize = 256;        // descriptor + largest serial packet
pub const BLE_DATA_MTU: usize = 20;              // default ATT MTU (23) minus header
pub const TOKEN_MAX_LEN: usize = 32;

pub const BLE_PERIPHERAL_NAME: &str = "Nano 33 DCL";
pub const BLE_SERVICE_UUID: u128 = 0x16480000_0525_4ad5_b4fb_6dd83f49546b;
pub const BLE_CONFIG_CHAR_UUID: u128 = 0x16480001_0525_4ad5_b4fb_6dd83f49546b;
pub const BLE_DATA_CHAR_UUID: u128 = 0x16480002_0525_4ad5_b4fb_6dd83f49546b;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const STARTUP_SETTLE_MS: u32 = 1000;
pub const HANDSHAKE_RESEND_MS: u32 = 1000;       // descriptor re-advertise cadence
pub const STATUS_ANNOUNCE_MS: u32 = 5000;        // "waiting for central" reminder
pub const FAIL_STOP_RETRY_MS: u32 = 1000;
pub const TOKEN_IDLE_MS: u32 = 100;              // serial read window for one token
pub const POLL_IDLE_MS: u32 = 1;                 // yield between scheduler ticks

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;
pub const AUDIO_SAMPLES_PER_PACKET: usize = 128;

// ---------------------------------------------------------------------------
// IMU output data rates. Gyroscope and accelerometer share one ODR.
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccelGyroOdr {
    Off = 0,
    Hz10 = 1,
    Hz50 = 2,
    Hz119 = 3,
    Hz238 = 4,
    Hz476 = 5,
}

impl AccelGyroOdr {
    pub fn hz(self) -> Option<u32> {
        match self {
            Self::Off   => None,
            Self::Hz10  => Some(10),
            Self::Hz50  => Some(50),
            Self::Hz119 => Some(119),
            Self::Hz238 => Some(238),
            Self::Hz476 => Some(476),
        }
    }

    /// Rate class as sent in the configuration descriptor.
    pub fn class(self) -> u8 {
        self as u8
    }
}

// range (0..8) = {0.625,1.25,2.5,5,10,20,40,80,400}Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MagOdr {
    Hz0_625 = 0,
    Hz1_25,
    Hz2_5,
    Hz5,
    Hz10,
    Hz20,
    Hz40,
    Hz80,
    Hz400,
}

impl MagOdr {
    pub fn millihertz(self) -> u32 {
        match self {
            Self::Hz0_625 => 625,
            Self::Hz1_25  => 1_250,
            Self::Hz2_5   => 2_500,
            Self::Hz5     => 5_000,
            Self::Hz10    => 10_000,
            Self::Hz20    => 20_000,
            Self::Hz40    => 40_000,
            Self::Hz80    => 80_000,
            Self::Hz400   => 400_000,
        }
    }

    pub fn class(self) -> u8 {
        self as u8
    }
}

pub const ACCEL_GYRO_DEFAULT_ODR: AccelGyroOdr = AccelGyroOdr::Hz119;
pub const MAG_DEFAULT_ODR: MagOdr = MagOdr::Hz20; // mag is read at the accel/gyro cadence

// ---------------------------------------------------------------------------
// Build profile: which source and which transport this image streams with.
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// BLE notifications, one sample per packet.
    Wireless,
    /// Wired serial byte stream with an application handshake.
    Streaming,
}

impl TransportKind {
    /// Largest payload one transmission unit carries.
    pub fn mtu(self) -> usize {
        match self {
            Self::Wireless => BLE_DATA_MTU,
            Self::Streaming => WRITE_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Imu,
    Audio,
}

/// IMU sensor groups compiled into this image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImuSelection {
    pub accel: bool,
    pub gyro: bool,
    pub mag: bool,
}

impl ImuSelection {
    pub const ACTIVE: Self = Self {
        accel: cfg!(feature = "accel"),
        gyro: cfg!(feature = "gyro"),
        mag: cfg!(feature = "mag"),
    };

    pub fn any(&self) -> bool {
        self.accel || self.gyro || self.mag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProfile {
    pub transport: TransportKind,
    pub source: SourceKind,
}

impl BuildProfile {
    pub const ACTIVE: Self = Self {
        transport: if cfg!(feature = "ble") {
            TransportKind::Wireless
        } else {
            TransportKind::Streaming
        },
        // Audio and IMU are exclusive; audio wins when both are compiled in.
        source: if cfg!(feature = "audio") {
            SourceKind::Audio
        } else {
            SourceKind::Imu
        },
    };
}

/// Buffer geometry for one packet on a given profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketShape {
    pub max_columns: usize,
    pub samples_per_packet: usize,
}

impl PacketShape {
    pub const WIRELESS: Self = Self { max_columns: 10, samples_per_packet: 1 };
    pub const STREAMING: Self = Self { max_columns: 20, samples_per_packet: 6 };
    pub const STREAMING_AUDIO: Self = Self {
        max_columns: 20,
        samples_per_packet: AUDIO_SAMPLES_PER_PACKET,
    };

    pub fn for_profile(profile: BuildProfile) -> Result<Self> {
        match (profile.transport, profile.source) {
            (TransportKind::Wireless, SourceKind::Imu) => Ok(Self::WIRELESS),
            (TransportKind::Streaming, SourceKind::Imu) => Ok(Self::STREAMING),
            (TransportKind::Streaming, SourceKind::Audio) => Ok(Self::STREAMING_AUDIO),
            (TransportKind::Wireless, SourceKind::Audio) => Err(Error::UnsupportedProfile(
                "audio streaming requires the serial transport",
            )),
        }
    }

    /// Sample buffer capacity in elements.
    pub fn capacity(&self) -> usize {
        self.max_columns * self.samples_per_packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireless_shape_fits_notification_mtu() {
        let shape = PacketShape::WIRELESS;
        assert!(shape.max_columns * 2 * shape.samples_per_packet <= TransportKind::Wireless.mtu());
    }

    #[test]
    fn streaming_shapes_fit_write_buffer() {
        // IMU at full width, audio as a single PCM column.
        assert!(PacketShape::STREAMING.capacity() * 2 <= TransportKind::Streaming.mtu());
        assert!(PacketShape::STREAMING_AUDIO.samples_per_packet * 2 <= TransportKind::Streaming.mtu());
    }

    #[test]
    fn audio_over_ble_is_rejected() {
        let profile = BuildProfile {
            transport: TransportKind::Wireless,
            source: SourceKind::Audio,
        };
        assert!(PacketShape::for_profile(profile).is_err());
    }

    #[test]
    fn odr_classes_match_register_encoding() {
        assert_eq!(AccelGyroOdr::Hz119.class(), 3);
        assert_eq!(AccelGyroOdr::Hz119.hz(), Some(119));
        assert_eq!(AccelGyroOdr::Off.hz(), None);
        assert_eq!(MagOdr::Hz20.class(), 5);
        assert_eq!(MagOdr::Hz400.millihertz(), 400_000);
    }
}
