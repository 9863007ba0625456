//! Open-loop pressure to output mapping.

use crate::config::PressureConfig;

/// Piecewise-linear map from gauge pressure to output fraction.
///
/// At or below the low setpoint the output sits at `percent_min`; at or above
/// the high setpoint it sits at `percent_max`; linear in between.
#[must_use]
pub fn pressure_to_fraction(pressure_bar: f32, config: &PressureConfig) -> f32 {
    let low = config.low_setpoint_bar;
    let high = config.high_setpoint_bar;

    if pressure_bar.is_nan() || pressure_bar <= low {
        return config.percent_min;
    }
    if pressure_bar >= high {
        return config.percent_max;
    }

    let ratio = (pressure_bar - low) / (high - low);
    config.percent_min + ratio * (config.percent_max - config.percent_min)
}
