// SensorStream - Library Root
//
// Sensor acquisition node: drains an IMU or microphone FIFO into fixed-shape
// packets and streams them to a host over BLE notifications or a serial
// link, after publishing a JSON configuration descriptor.

pub mod buffer;
pub mod config;
pub mod descriptor;
pub mod drivers;
pub mod error;
pub mod events;
pub mod handshake;
pub mod input;
pub mod packetizer;
pub mod platform;
pub mod scheduler;
pub mod source;
pub mod tasks;
pub mod time;
pub mod transport;

pub use error::{Error, Result};
