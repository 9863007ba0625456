//! Board bindings for the STM32G0B1 power-stage controller.
//!
//! [`Board`] gathers every input one control cycle touches so the controller
//! can borrow it as a single `ControllerIo`. The power stage and the status LED
//! are owned separately by the control and indicator tasks.

#![cfg(target_os = "none")]

pub mod analog;
pub mod indicator;
pub mod power_stage;
pub mod pulse;

use core::time::Duration as CoreDuration;

use embassy_stm32::gpio::Input;
use embassy_time::{Duration, block_for};
use pump_core::control::SafetyInput;
use pump_core::pwm_input::{MissingEdge, PulseCycle, PulseTimer};
use pump_core::sensors::{AnalogChannel, AnalogInputs, SampleDelay};

pub use analog::AnalogFrontEnd;
pub use indicator::RgbLed;
pub use power_stage::PwmPowerStage;
pub use pulse::PulseInput;

pub struct Board<'d> {
    analog: AnalogFrontEnd<'d>,
    command: PulseInput<'d>,
    safety: Input<'d>,
}

impl<'d> Board<'d> {
    pub fn new(analog: AnalogFrontEnd<'d>, command: PulseInput<'d>, safety: Input<'d>) -> Self {
        Self {
            analog,
            command,
            safety,
        }
    }
}

impl AnalogInputs for Board<'_> {
    fn read(&mut self, channel: AnalogChannel) -> u16 {
        self.analog.read(channel)
    }
}

impl SampleDelay for Board<'_> {
    fn delay_us(&mut self, micros: u32) {
        block_for(Duration::from_micros(u64::from(micros)));
    }
}

impl PulseTimer for Board<'_> {
    fn measure_cycle(&mut self, edge_timeout: CoreDuration) -> Result<PulseCycle, MissingEdge> {
        self.command.measure_cycle(edge_timeout)
    }
}

impl SafetyInput for Board<'_> {
    fn safety_pin_high(&mut self) -> bool {
        self.safety.is_high()
    }
}
