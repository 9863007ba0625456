//! Timer PWM driving the pump power stage.

use embassy_stm32::peripherals::TIM3;
use embassy_stm32::timer::simple_pwm::SimplePwmChannel;
use pump_core::actuator::PowerStage;

/// One timer channel gating both high-side switches.
pub struct PwmPowerStage<'d> {
    channel: SimplePwmChannel<'d, TIM3>,
}

impl<'d> PwmPowerStage<'d> {
    /// Enables the channel at zero duty.
    pub fn new(mut channel: SimplePwmChannel<'d, TIM3>) -> Self {
        channel.set_duty_cycle(0);
        channel.enable();
        Self { channel }
    }
}

impl PowerStage for PwmPowerStage<'_> {
    fn max_level(&self) -> u16 {
        self.channel.max_duty_cycle()
    }

    fn write_level(&mut self, level: u16) {
        self.channel.set_duty_cycle(level);
    }
}
