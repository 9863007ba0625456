//! ADC front end for the pressure, current and supply inputs.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::ADC1;
use pump_core::sensors::AnalogChannel;

/// ADC1 plus the four sensor channels.
pub struct AnalogFrontEnd<'d> {
    adc: Adc<'d, ADC1>,
    pressure: AnyAdcChannel<ADC1>,
    current_a: AnyAdcChannel<ADC1>,
    current_b: AnyAdcChannel<ADC1>,
    supply: AnyAdcChannel<ADC1>,
}

impl<'d> AnalogFrontEnd<'d> {
    /// Configures the long sample time the high-impedance dividers need.
    pub fn new(
        mut adc: Adc<'d, ADC1>,
        pressure: AnyAdcChannel<ADC1>,
        current_a: AnyAdcChannel<ADC1>,
        current_b: AnyAdcChannel<ADC1>,
        supply: AnyAdcChannel<ADC1>,
    ) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            pressure,
            current_a,
            current_b,
            supply,
        }
    }

    pub fn read(&mut self, channel: AnalogChannel) -> u16 {
        let pin = match channel {
            AnalogChannel::Pressure => &mut self.pressure,
            AnalogChannel::CurrentA => &mut self.current_a,
            AnalogChannel::CurrentB => &mut self.current_b,
            AnalogChannel::Supply => &mut self.supply,
        };
        self.adc.blocking_read(pin)
    }
}
