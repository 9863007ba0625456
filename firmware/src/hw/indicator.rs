//! Discrete RGB status LED.

use embassy_stm32::gpio::Output;
use pump_core::indicator::Rgb;

/// Common-cathode LED on three GPIOs; any non-zero channel lights.
pub struct RgbLed<'d> {
    red: Output<'d>,
    green: Output<'d>,
    blue: Output<'d>,
}

impl<'d> RgbLed<'d> {
    pub fn new(red: Output<'d>, green: Output<'d>, blue: Output<'d>) -> Self {
        Self { red, green, blue }
    }

    pub fn show(&mut self, color: Rgb) {
        set(&mut self.red, color.red);
        set(&mut self.green, color.green);
        set(&mut self.blue, color.blue);
    }
}

fn set(pin: &mut Output<'_>, value: u8) {
    if value > 0 {
        pin.set_high();
    } else {
        pin.set_low();
    }
}
