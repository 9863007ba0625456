//! MPX5700AP manifold pressure sensor.

use crate::config::{AdcConfig, PressureConfig};
use crate::filter::Ema;

use super::{AnalogChannel, AnalogInputs, counts_to_volts};

/// Filtered gauge pressure reader.
///
/// The sensor output voltage is smoothed before conversion; the transfer
/// function is linear, so this equals smoothing the pressure itself.
#[derive(Clone, Debug)]
pub struct PressureSensor {
    config: PressureConfig,
    filter: Ema,
}

impl PressureSensor {
    #[must_use]
    pub const fn new(config: PressureConfig) -> Self {
        Self {
            filter: Ema::new(config.filter_alpha),
            config,
        }
    }

    /// Samples the sensor and returns gauge pressure in bar (negative under vacuum).
    pub fn read<A: AnalogInputs>(&mut self, adc: &mut A, scaling: &AdcConfig) -> f32 {
        let volts = counts_to_volts(adc.read(AnalogChannel::Pressure), scaling);
        let filtered = self.filter.update(volts);
        voltage_to_gauge_bar(filtered, &self.config)
    }
}

/// Inverts `V = Vs·(k1·P_kPa + k2)` and converts to gauge bar.
#[must_use]
pub fn voltage_to_gauge_bar(volts: f32, config: &PressureConfig) -> f32 {
    let ratio = volts / config.supply_v;
    let kpa = (ratio - config.offset) / config.slope_per_kpa;
    kpa / 100.0 - config.atmospheric_bar
}

/// Sensor voltage that corresponds to `gauge_bar`.
#[must_use]
pub fn gauge_bar_to_voltage(gauge_bar: f32, config: &PressureConfig) -> f32 {
    let kpa = (gauge_bar + config.atmospheric_bar) * 100.0;
    config.supply_v * (config.slope_per_kpa * kpa + config.offset)
}
