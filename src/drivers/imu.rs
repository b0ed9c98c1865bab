// SensorStream - LSM9DS1 IMU Driver
//
// Register-level driver for the accelerometer/gyroscope (FIFO-backed) and the
// magnetometer of an LSM9DS1, generic over any `embedded-hal` I2C bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::*;
use crate::error::{Error, Result};

// Accelerometer / gyroscope register addresses
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1_G: u8 = 0x10;
const REG_OUT_X_L_G: u8 = 0x18;
const REG_CTRL_REG6_XL: u8 = 0x20;
const REG_CTRL_REG8: u8 = 0x22;
const REG_CTRL_REG9: u8 = 0x23;
const REG_OUT_X_L_XL: u8 = 0x28;
const REG_FIFO_CTRL: u8 = 0x2E;
const REG_FIFO_SRC: u8 = 0x2F;
const WHO_AM_I_AG: u8 = 0x68;

// Magnetometer register addresses
const REG_CTRL_REG1_M: u8 = 0x20;
const REG_CTRL_REG2_M: u8 = 0x21;
const REG_CTRL_REG3_M: u8 = 0x22;
const REG_STATUS_REG_M: u8 = 0x27;
const REG_OUT_X_L_M: u8 = 0x28;
const WHO_AM_I_M: u8 = 0x3D;

const FS_G_2000DPS: u8 = 0x18;
const FS_XL_4G: u8 = 0x10;
const FIFO_EN: u8 = 0x02;
const FIFO_MODE_CONTINUOUS: u8 = 0xC0;
const FIFO_FSS_MASK: u8 = 0x3F;
const MAG_ZYXDA: u8 = 0x08;
const MAG_MULTI_READ: u8 = 0x80; // sub-address auto-increment on the mag die

/// Which sensor groups to power and at what rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImuSettings {
    pub selection: ImuSelection,
    pub accel_gyro_odr: AccelGyroOdr,
    pub mag_odr: MagOdr,
}

impl Default for ImuSettings {
    fn default() -> Self {
        Self {
            selection: ImuSelection::ACTIVE,
            accel_gyro_odr: ACCEL_GYRO_DEFAULT_ODR,
            mag_odr: MAG_DEFAULT_ODR,
        }
    }
}

pub struct Lsm9ds1<I2C> {
    bus: I2C,
    continuous: bool,
}

impl<I2C: I2c> Lsm9ds1<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self { bus, continuous: false }
    }

    /// Verify both dies answer with their expected identity.
    pub fn is_connected(&mut self) -> bool {
        matches!(self.read_byte(I2C_ADDR_LSM9DS1_AG, REG_WHO_AM_I), Ok(WHO_AM_I_AG))
            && matches!(self.read_byte(I2C_ADDR_LSM9DS1_M, REG_WHO_AM_I), Ok(WHO_AM_I_M))
    }

    /// Reset both dies and program the configured rates.
    pub fn init(&mut self, delay: &mut impl DelayNs, settings: &ImuSettings) -> Result<()> {
        // Soft reset (keeps register auto-increment on)
        self.write_byte(I2C_ADDR_LSM9DS1_AG, REG_CTRL_REG8, 0x05)?;
        self.write_byte(I2C_ADDR_LSM9DS1_M, REG_CTRL_REG2_M, 0x0C)?;
        delay.delay_ms(10);

        self.expect_id(I2C_ADDR_LSM9DS1_AG, WHO_AM_I_AG)?;
        self.expect_id(I2C_ADDR_LSM9DS1_M, WHO_AM_I_M)?;

        let sel = settings.selection;
        let odr_bits = settings.accel_gyro_odr.class() << 5;

        let gyro = if sel.gyro { odr_bits | FS_G_2000DPS } else { 0x00 };
        self.write_byte(I2C_ADDR_LSM9DS1_AG, REG_CTRL_REG1_G, gyro)?;

        // With the gyro on, the accelerometer follows the gyro ODR.
        let accel = if sel.accel || sel.gyro { odr_bits | FS_XL_4G } else { 0x00 };
        self.write_byte(I2C_ADDR_LSM9DS1_AG, REG_CTRL_REG6_XL, accel)?;

        if sel.mag {
            self.write_byte(I2C_ADDR_LSM9DS1_M, REG_CTRL_REG1_M, mag_ctrl1(settings.mag_odr))?;
            self.write_byte(I2C_ADDR_LSM9DS1_M, REG_CTRL_REG2_M, 0x00)?; // ±4 gauss
            self.write_byte(I2C_ADDR_LSM9DS1_M, REG_CTRL_REG3_M, 0x00)?; // continuous conversion
        } else {
            self.write_byte(I2C_ADDR_LSM9DS1_M, REG_CTRL_REG3_M, 0x03)?; // power-down
        }

        log::info!(
            "LSM9DS1 initialised (accel:{} gyro:{} mag:{}, ODR class {})",
            sel.accel,
            sel.gyro,
            sel.mag,
            settings.accel_gyro_odr.class()
        );
        Ok(())
    }

    /// Let the FIFO fill continuously at the configured ODR, overwriting the
    /// oldest slot when nobody drains it.
    pub fn set_continuous_mode(&mut self) -> Result<()> {
        self.write_byte(I2C_ADDR_LSM9DS1_AG, REG_CTRL_REG9, FIFO_EN)?;
        self.write_byte(I2C_ADDR_LSM9DS1_AG, REG_FIFO_CTRL, FIFO_MODE_CONTINUOUS)?;
        self.continuous = true;
        Ok(())
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Unread accel/gyro samples in the FIFO.
    pub fn fifo_samples(&mut self) -> Result<usize> {
        let src = self.read_byte(I2C_ADDR_LSM9DS1_AG, REG_FIFO_SRC)?;
        Ok((src & FIFO_FSS_MASK) as usize)
    }

    /// True when the magnetometer holds a fresh XYZ triple.
    pub fn mag_ready(&mut self) -> Result<bool> {
        let status = self.read_byte(I2C_ADDR_LSM9DS1_M, REG_STATUS_REG_M)?;
        Ok(status & MAG_ZYXDA != 0)
    }

    pub fn read_accel(&mut self) -> Result<[i16; 3]> {
        self.read_triple(I2C_ADDR_LSM9DS1_AG, REG_OUT_X_L_XL)
    }

    pub fn read_gyro(&mut self) -> Result<[i16; 3]> {
        self.read_triple(I2C_ADDR_LSM9DS1_AG, REG_OUT_X_L_G)
    }

    pub fn read_mag(&mut self) -> Result<[i16; 3]> {
        self.read_triple(I2C_ADDR_LSM9DS1_M, MAG_MULTI_READ | REG_OUT_X_L_M)
    }

    fn expect_id(&mut self, addr: u8, expected: u8) -> Result<()> {
        let found = self.read_byte(addr, REG_WHO_AM_I)?;
        if found != expected {
            return Err(Error::WrongDevice { addr, found, expected });
        }
        Ok(())
    }

    fn read_triple(&mut self, addr: u8, reg: u8) -> Result<[i16; 3]> {
        let mut raw = [0u8; 6];
        self.bus.write_read(addr, &[reg], &mut raw).map_err(Error::bus)?;
        Ok([
            i16::from_le_bytes([raw[0], raw[1]]),
            i16::from_le_bytes([raw[2], raw[3]]),
            i16::from_le_bytes([raw[4], raw[5]]),
        ])
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.bus.write(addr, &[reg, value]).map_err(Error::bus)
    }

    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.write_read(addr, &[reg], &mut buf).map_err(Error::bus)?;
        Ok(buf[0])
    }
}

/// CTRL_REG1_M: temperature compensation, medium-performance XY, output rate.
fn mag_ctrl1(odr: MagOdr) -> u8 {
    const TEMP_COMP: u8 = 0x80;
    const OM_MEDIUM: u8 = 0x20;
    const FAST_ODR: u8 = 0x02;
    match odr {
        MagOdr::Hz400 => TEMP_COMP | OM_MEDIUM | FAST_ODR,
        other => TEMP_COMP | OM_MEDIUM | (other.class() << 2),
    }
}
