//! Supply voltage sensing through the resistive divider.

use crate::config::{AdcConfig, VoltageConfig};
use crate::filter::Ema;

use super::{AnalogChannel, AnalogInputs, counts_to_volts};

/// Filtered supply voltage plus its plausibility verdict.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SupplyReading {
    pub volts: f32,
    /// `false` when the reading lies outside the plausible range; this marks a
    /// sensor fault, not an undervoltage.
    pub valid: bool,
}

#[derive(Clone, Debug)]
pub struct SupplySensor {
    config: VoltageConfig,
    filter: Ema,
}

impl SupplySensor {
    #[must_use]
    pub const fn new(config: VoltageConfig) -> Self {
        Self {
            filter: Ema::new(config.filter_alpha),
            config,
        }
    }

    pub fn read<A: AnalogInputs>(&mut self, adc: &mut A, scaling: &AdcConfig) -> SupplyReading {
        let divider_v = counts_to_volts(adc.read(AnalogChannel::Supply), scaling);
        let volts = self.filter.update(divider_v / self.config.divider_ratio);
        SupplyReading {
            volts,
            valid: self.is_plausible(volts),
        }
    }

    /// Inclusive plausibility check against the configured band.
    #[must_use]
    pub fn is_plausible(&self, volts: f32) -> bool {
        volts >= self.config.minimum_valid_v && volts <= self.config.maximum_valid_v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::sensors::testing::FixedAdc;
    use crate::sensors::volts_to_counts;

    fn supply_counts(volts: f32) -> u16 {
        let config = ControllerConfig::DEFAULT;
        volts_to_counts(volts * config.voltage.divider_ratio, &config.adc)
    }

    #[test]
    fn divider_scales_back_to_supply() {
        let config = ControllerConfig::DEFAULT;
        let mut sensor = SupplySensor::new(config.voltage);
        let mut adc = FixedAdc {
            supply: supply_counts(12.0),
            ..FixedAdc::default()
        };
        let reading = sensor.read(&mut adc, &config.adc);
        assert!(reading.valid);
        assert!(reading.volts > 11.95 && reading.volts < 12.05, "{reading:?}");
    }

    #[test]
    fn out_of_band_is_a_sensor_fault() {
        let config = ControllerConfig::DEFAULT;
        let mut sensor = SupplySensor::new(config.voltage);
        let mut adc = FixedAdc {
            supply: 0,
            ..FixedAdc::default()
        };
        assert!(!sensor.read(&mut adc, &config.adc).valid);

        adc.supply = supply_counts(18.0);
        assert!(!sensor.read(&mut adc, &config.adc).valid);

        assert!(sensor.is_plausible(7.0));
        assert!(sensor.is_plausible(16.0));
        assert!(!sensor.is_plausible(6.99));
    }
}
