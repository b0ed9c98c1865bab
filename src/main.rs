// SensorStream - Firmware Entry Point
//
// Startup sequence:
//   1. Install the logger and let the supplies settle.
//   2. Bring up the sample source (LSM9DS1 over I2C, or the I2S microphone).
//   3. Bring up the host link (UART with handshake, or the BLE GATT server).
//   4. Build the configuration descriptor and publish it once.
//   5. Run the cooperative stream loop until power-off.
//
// A peripheral that fails to start halts the node in the fail-stop loop.
//
// Off-target the same pipeline runs over stdin/stdout with a synthetic IMU.

use sensor_stream::config::*;
use sensor_stream::scheduler::Scheduler;
use sensor_stream::tasks::stream::{fail_stop, run};
use sensor_stream::time::{Clock, SystemClock};

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("SensorStream firmware starting…");

    let clock = SystemClock;
    clock.delay_ms(STARTUP_SETTLE_MS);

    let profile = BuildProfile::ACTIVE;
    if profile.source == SourceKind::Audio && ImuSelection::ACTIVE.any() {
        log::warn!("audio and IMU features both enabled; streaming audio");
    }

    // ---- Peripherals ------------------------------------------------------
    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;
    let pins = peripherals.pins;

    // ---- Sample source ----------------------------------------------------
    #[cfg(not(feature = "audio"))]
    let source = firmware::start_imu(peripherals.i2c0, pins.gpio6, pins.gpio7);
    #[cfg(feature = "audio")]
    let source = firmware::start_mic(peripherals.i2s0, pins.gpio8, pins.gpio10, pins.gpio9);
    let source = source.unwrap_or_else(|e| fail_stop("sample source", &e, &clock));

    // ---- Host link --------------------------------------------------------
    #[cfg(not(feature = "ble"))]
    let transport = firmware::start_uart(peripherals.uart1, pins.gpio21, pins.gpio20);
    #[cfg(feature = "ble")]
    let transport = firmware::start_ble(peripherals.modem, pins.gpio2, pins.gpio3);
    let transport = transport.unwrap_or_else(|e| fail_stop("host link", &e, &clock));

    // ---- Session ----------------------------------------------------------
    let (scheduler, state) = Scheduler::setup(source, transport, clock, profile)
        .unwrap_or_else(|e| fail_stop("session setup", &e, &clock));
    log::info!("Startup complete, streaming {:?} over {:?}", profile.source, profile.transport);

    run(scheduler, state)
}

#[cfg(target_os = "espidf")]
mod firmware {
    #[cfg(not(feature = "audio"))]
    use esp_idf_hal::{
        delay::FreeRtos,
        i2c::{I2cConfig, I2cDriver},
        prelude::*,
    };

    use sensor_stream::config::*;
    #[cfg(not(feature = "audio"))]
    use sensor_stream::{
        drivers::imu::{ImuSettings, Lsm9ds1},
        source::ImuSource,
    };

    #[cfg(not(feature = "audio"))]
    pub fn start_imu(
        i2c0: esp_idf_hal::i2c::I2C0,
        sda: esp_idf_hal::gpio::Gpio6,
        scl: esp_idf_hal::gpio::Gpio7,
    ) -> anyhow::Result<ImuSource<I2cDriver<'static>>> {
        let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into());
        let i2c = I2cDriver::new(i2c0, sda, scl, &i2c_config)?;
        log::info!("I2C up (SDA GPIO{}, SCL GPIO{})", PIN_I2C_SDA, PIN_I2C_SCL);

        let settings = ImuSettings::default();
        let mut imu = Lsm9ds1::new(i2c);
        if !imu.is_connected() {
            anyhow::bail!("LSM9DS1 not responding at 0x{:02X}/0x{:02X}", I2C_ADDR_LSM9DS1_AG, I2C_ADDR_LSM9DS1_M);
        }
        imu.init(&mut FreeRtos, &settings)?;
        Ok(ImuSource::new(imu, settings)?)
    }

    #[cfg(feature = "audio")]
    pub fn start_mic(
        i2s0: esp_idf_hal::i2s::I2S0,
        bclk: esp_idf_hal::gpio::Gpio8,
        din: esp_idf_hal::gpio::Gpio10,
        ws: esp_idf_hal::gpio::Gpio9,
    ) -> anyhow::Result<sensor_stream::source::AudioSource<sensor_stream::platform::mic::I2sMic>> {
        log::info!("I2S up (BCLK GPIO{}, WS GPIO{}, DIN GPIO{})", PIN_I2S_BCLK, PIN_I2S_WS, PIN_I2S_DIN);
        let mic = sensor_stream::platform::mic::I2sMic::new(i2s0, bclk, din, ws)?;
        Ok(sensor_stream::source::AudioSource::new(mic))
    }

    #[cfg(not(feature = "ble"))]
    pub fn start_uart(
        uart1: esp_idf_hal::uart::UART1,
        tx: esp_idf_hal::gpio::Gpio21,
        rx: esp_idf_hal::gpio::Gpio20,
    ) -> anyhow::Result<
        sensor_stream::transport::StreamingTransport<sensor_stream::platform::uart::UartPort>,
    > {
        log::info!("UART pins TX GPIO{}, RX GPIO{}", PIN_UART_TX, PIN_UART_RX);
        let port = sensor_stream::platform::uart::UartPort::new(uart1, tx, rx)?;
        Ok(sensor_stream::transport::StreamingTransport::new(port))
    }

    #[cfg(feature = "ble")]
    pub type Led = sensor_stream::drivers::led::StatusLed<
        esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::Gpio2, esp_idf_hal::gpio::Output>,
        esp_idf_hal::gpio::PinDriver<'static, esp_idf_hal::gpio::Gpio3, esp_idf_hal::gpio::Output>,
    >;

    #[cfg(feature = "ble")]
    pub fn start_ble(
        modem: esp_idf_hal::modem::Modem,
        red: esp_idf_hal::gpio::Gpio2,
        green: esp_idf_hal::gpio::Gpio3,
    ) -> anyhow::Result<
        sensor_stream::transport::WirelessTransport<sensor_stream::platform::radio::EspRadio, Led>,
    > {
        use esp_idf_hal::gpio::PinDriver;

        log::info!("status LED on GPIO{} / GPIO{}", PIN_LED_RED, PIN_LED_GREEN);
        let led = sensor_stream::drivers::led::StatusLed::new(PinDriver::output(red)?, PinDriver::output(green)?);
        let nvs = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
        let radio = sensor_stream::platform::radio::EspRadio::new(modem, nvs)?;
        Ok(sensor_stream::transport::WirelessTransport::start(radio, led)?)
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use sensor_stream::platform::host::StdioPort;
    use sensor_stream::source::SyntheticSource;
    use sensor_stream::transport::StreamingTransport;

    // Logs go to stderr; stdout carries the descriptor and packets.
    env_logger::init();
    log::info!("SensorStream host node starting…");

    let profile = BuildProfile::ACTIVE;
    if profile.transport != TransportKind::Streaming || profile.source != SourceKind::Imu {
        anyhow::bail!("the host build streams a synthetic IMU over stdio; disable `ble` and `audio`");
    }

    let clock = SystemClock;
    clock.delay_ms(STARTUP_SETTLE_MS);

    let odr_hz = ACCEL_GYRO_DEFAULT_ODR.hz().unwrap_or(119);
    let source = SyntheticSource::new(clock, ImuSelection::ACTIVE, odr_hz);
    let transport = StreamingTransport::new(StdioPort::spawn()?);

    let (scheduler, state) = Scheduler::setup(source, transport, clock, profile)
        .unwrap_or_else(|e| fail_stop("session setup", &e, &clock));
    run(scheduler, state)
}
