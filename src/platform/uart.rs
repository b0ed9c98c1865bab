// SensorStream - UART Host Link (ESP-IDF)

use esp_idf_hal::delay::{BLOCK, NON_BLOCK};
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{config::Config, Uart, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_sys::EspError;

use crate::config::SERIAL_BAUD_RATE;
use crate::error::{Error, Result};
use crate::transport::SerialPort;

pub struct UartPort {
    uart: UartDriver<'static>,
}

impl UartPort {
    pub fn new(
        uart: impl Peripheral<P = impl Uart> + 'static,
        tx: impl Peripheral<P = impl OutputPin> + 'static,
        rx: impl Peripheral<P = impl InputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = Config::default().baudrate(Hertz(SERIAL_BAUD_RATE));
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        log::info!("UART host link at {} baud", SERIAL_BAUD_RATE);
        Ok(Self { uart })
    }
}

fn uart_err(e: EspError) -> Error {
    Error::Transport(format!("uart: {}", e))
}

impl SerialPort for UartPort {
    fn available(&mut self) -> Result<usize> {
        self.uart.remaining_read().map_err(uart_err)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.uart.read(buf, NON_BLOCK).map_err(uart_err)
    }

    fn write_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let n = self.uart.write(bytes).map_err(uart_err)?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.uart.wait_tx_done(BLOCK).map_err(uart_err)
    }
}
