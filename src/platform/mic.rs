// SensorStream - I2S Microphone (ESP-IDF)
//
// 16-bit mono PCM over the I2S standard (Philips) receiver.  The DMA queue
// does not report its depth, so non-blocking reads are staged locally and
// the staged count is what `samples_available` reports.

use std::collections::VecDeque;

use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::i2s::config::{DataBitWidth, StdConfig};
use esp_idf_hal::i2s::{I2s, I2sDriver, I2sRx};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_sys::{EspError, ESP_ERR_TIMEOUT};

use crate::config::{AUDIO_SAMPLES_PER_PACKET, AUDIO_SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::source::Microphone;

const STAGING_LIMIT: usize = AUDIO_SAMPLES_PER_PACKET * 8;

pub struct I2sMic {
    driver: I2sDriver<'static, I2sRx>,
    staged: VecDeque<i16>,
    raw: Vec<u8>,
}

impl I2sMic {
    pub fn new(
        i2s: impl Peripheral<P = impl I2s> + 'static,
        bclk: impl Peripheral<P = impl InputPin + OutputPin> + 'static,
        din: impl Peripheral<P = impl InputPin> + 'static,
        ws: impl Peripheral<P = impl InputPin + OutputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = StdConfig::philips(AUDIO_SAMPLE_RATE, DataBitWidth::Bits16);
        let mut driver = I2sDriver::new_std_rx(i2s, &config, bclk, din, Option::<AnyIOPin>::None, ws)?;
        driver.rx_enable()?;
        log::info!("I2S microphone at {} Hz", AUDIO_SAMPLE_RATE);
        Ok(Self {
            driver,
            staged: VecDeque::with_capacity(STAGING_LIMIT),
            raw: vec![0u8; AUDIO_SAMPLES_PER_PACKET * 2],
        })
    }

    /// Pull whatever the DMA queue holds without waiting.
    fn stage(&mut self) -> Result<()> {
        while self.staged.len() < STAGING_LIMIT {
            let n = match self.driver.read(&mut self.raw, NON_BLOCK) {
                Ok(n) => n,
                Err(e) if e.code() == ESP_ERR_TIMEOUT as i32 => 0,
                Err(e) => return Err(mic_err(e)),
            };
            if n == 0 {
                break;
            }
            self.staged
                .extend(self.raw[..n].chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])));
        }
        Ok(())
    }
}

fn mic_err(e: EspError) -> Error {
    Error::Bus(format!("i2s: {}", e))
}

impl Microphone for I2sMic {
    fn samples_available(&mut self) -> Result<usize> {
        self.stage()?;
        Ok(self.staged.len())
    }

    fn read_pcm(&mut self, out: &mut [i16]) -> Result<usize> {
        let n = out.len().min(self.staged.len());
        for (slot, pcm) in out.iter_mut().zip(self.staged.drain(..n)) {
            *slot = pcm;
        }
        Ok(n)
    }
}
