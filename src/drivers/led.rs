// SensorStream - Status LED Driver
//
// Two GPIO-driven LEDs: red while no central is connected, green while one is.

use embedded_hal::digital::OutputPin;

use crate::transport::LinkIndicator;

pub struct StatusLed<R, G> {
    red: R,
    green: G,
}

impl<R: OutputPin, G: OutputPin> StatusLed<R, G> {
    pub fn new(red: R, green: G) -> Self {
        Self { red, green }
    }
}

impl<R: OutputPin, G: OutputPin> LinkIndicator for StatusLed<R, G> {
    fn set_connected(&mut self, connected: bool) {
        if connected {
            let _ = self.red.set_low();
            let _ = self.green.set_high();
        } else {
            let _ = self.green.set_low();
            let _ = self.red.set_high();
        }
    }
}
