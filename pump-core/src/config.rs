//! Compile-time configuration for the pump controller.
//!
//! Nothing here is adjustable at runtime. Boards build a [`ControllerConfig`]
//! once (usually [`ControllerConfig::DEFAULT`]), call
//! [`ControllerConfig::validate`], and hand it to the controller.

use core::fmt;
use core::time::Duration;

/// MPX5700AP absolute pressure sensor transfer function and filtering.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PressureConfig {
    /// Sensor supply voltage `Vs`.
    pub supply_v: f32,
    /// Slope `k1` of `V = Vs·(k1·P_kPa + k2)`.
    pub slope_per_kpa: f32,
    /// Offset `k2` of the transfer function.
    pub offset: f32,
    /// Subtracted from absolute bar to obtain gauge pressure.
    pub atmospheric_bar: f32,
    pub filter_alpha: f32,
    /// Gauge pressure at which output sits at `percent_min`.
    pub low_setpoint_bar: f32,
    /// Gauge pressure at which output reaches `percent_max`.
    pub high_setpoint_bar: f32,
    pub percent_min: f32,
    pub percent_max: f32,
}

/// ADC scaling shared by every analog channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdcConfig {
    /// Highest code the converter returns.
    pub full_scale_counts: u16,
    /// Connector voltage that maps to `full_scale_counts` (front-end scaling included).
    pub reference_v: f32,
}

/// ACS772 hall-effect current sensors (unidirectional wiring).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurrentSensorConfig {
    pub zero_current_v: f32,
    pub sensitivity_v_per_a: f32,
    /// Sensor saturation ceiling.
    pub max_current_a: f32,
    pub filter_alpha: f32,
    /// ADC samples averaged per read to reject drive-frequency ripple.
    pub samples_per_read: u8,
    pub sample_spacing_us: u32,
}

/// Current protection thresholds, hysteresis, and per-level limits.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurrentProtectionConfig {
    pub warning_a: f32,
    pub high_a: f32,
    pub critical_a: f32,
    pub fault_a: f32,
    pub emergency_a: f32,
    pub hysteresis_a: f32,
    pub limit_normal: f32,
    pub limit_warning: f32,
    pub limit_high: f32,
    pub limit_critical: f32,
    pub limit_fault: f32,
    /// Limit applied in EMERGENCY when emergency shutdown is enabled.
    pub limit_emergency: f32,
    /// Largest change of the voltage limit per control cycle.
    pub rate_step: f32,
}

/// Which voltage protection philosophy the board runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VoltageProtectionMode {
    /// Binary NORMAL/FAULT driven only by sensor plausibility.
    SensorFaultOnly,
    /// Percentage drop from an upward-tracking baseline.
    Adaptive,
}

/// Supply voltage sensing and protection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoltageConfig {
    /// `V_adc / V_supply` of the sense divider.
    pub divider_ratio: f32,
    pub filter_alpha: f32,
    pub minimum_valid_v: f32,
    pub maximum_valid_v: f32,
    pub mode: VoltageProtectionMode,
    pub baseline_alpha: f32,
    pub baseline_min_v: f32,
    pub baseline_max_v: f32,
    /// Fractional drop from baseline that raises WARNING.
    pub warning_drop: f32,
    /// Fractional drop from baseline that raises CRITICAL.
    pub critical_drop: f32,
    pub hysteresis_v: f32,
}

/// External duty-modulated command input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PwmInputConfig {
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    /// Bound on the wait for each edge while timing one cycle.
    pub edge_timeout: Duration,
    /// Validity is dropped when no qualifying cycle arrives within this window.
    pub signal_timeout: Duration,
}

/// Power stage drive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OutputConfig {
    /// Safe band the measured supply voltage is clamped into before use.
    pub supply_min_v: f32,
    pub supply_max_v: f32,
    /// Supply assumed until the first valid measurement arrives.
    pub nominal_supply_v: f32,
    /// The power stage inverts the control signal in hardware.
    pub inverted: bool,
}

/// Loop and reporting cadence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    pub control_interval: Duration,
    pub report_interval: Duration,
    /// Output is held at zero for this long after boot.
    pub startup_hold: Duration,
}

/// Board feature switches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FeatureFlags {
    /// EMERGENCY drops the limit to `limit_emergency` instead of the FAULT floor.
    pub emergency_shutdown: bool,
    pub external_safety: bool,
    /// Input level that means "safety asserted".
    pub safety_active_high: bool,
    pub slave_mode: bool,
}

/// Complete controller configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    pub adc: AdcConfig,
    pub pressure: PressureConfig,
    pub current_sensor: CurrentSensorConfig,
    pub current_protection: CurrentProtectionConfig,
    pub voltage: VoltageConfig,
    pub pwm_input: PwmInputConfig,
    pub output: OutputConfig,
    pub timing: TimingConfig,
    pub features: FeatureFlags,
}

impl ControllerConfig {
    pub const DEFAULT: Self = Self {
        adc: AdcConfig {
            full_scale_counts: 4095,
            reference_v: 5.0,
        },
        pressure: PressureConfig {
            supply_v: 5.0,
            slope_per_kpa: 0.00125,
            offset: 0.04,
            atmospheric_bar: 1.013,
            filter_alpha: 0.15,
            low_setpoint_bar: 0.2,
            high_setpoint_bar: 0.4,
            percent_min: 0.70,
            percent_max: 1.00,
        },
        current_sensor: CurrentSensorConfig {
            zero_current_v: 0.6,
            sensitivity_v_per_a: 0.040,
            max_current_a: 50.0,
            filter_alpha: 0.25,
            samples_per_read: 8,
            sample_spacing_us: 125,
        },
        current_protection: CurrentProtectionConfig {
            warning_a: 25.0,
            high_a: 30.0,
            critical_a: 35.0,
            fault_a: 40.0,
            emergency_a: 45.0,
            hysteresis_a: 2.0,
            limit_normal: 1.00,
            limit_warning: 0.70,
            limit_high: 0.60,
            limit_critical: 0.50,
            limit_fault: 0.50,
            limit_emergency: 0.0,
            rate_step: 0.05,
        },
        voltage: VoltageConfig {
            divider_ratio: 0.0909,
            filter_alpha: 1.0,
            minimum_valid_v: 7.0,
            maximum_valid_v: 16.0,
            mode: VoltageProtectionMode::SensorFaultOnly,
            baseline_alpha: 0.01,
            baseline_min_v: 10.0,
            baseline_max_v: 15.0,
            warning_drop: 0.30,
            critical_drop: 0.50,
            hysteresis_v: 0.5,
        },
        pwm_input: PwmInputConfig {
            min_frequency_hz: 15.0,
            max_frequency_hz: 35.0,
            edge_timeout: Duration::from_millis(100),
            signal_timeout: Duration::from_millis(500),
        },
        output: OutputConfig {
            supply_min_v: 8.0,
            supply_max_v: 15.0,
            nominal_supply_v: 12.0,
            inverted: false,
        },
        timing: TimingConfig {
            control_interval: Duration::from_millis(50),
            report_interval: Duration::from_millis(1_000),
            startup_hold: Duration::from_millis(500),
        },
        features: FeatureFlags {
            emergency_shutdown: true,
            external_safety: true,
            safety_active_high: false,
            slave_mode: true,
        },
    };

    /// Checks the cross-field invariants the controller relies on.
    ///
    /// Comparisons are negated so a NaN field fails them.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pressure;
        if !(p.low_setpoint_bar < p.high_setpoint_bar) {
            return Err(ConfigError::SetpointsInverted);
        }
        if !in_unit_range(p.percent_min) || !in_unit_range(p.percent_max) {
            return Err(ConfigError::FractionOutOfRange("pressure.percent"));
        }

        if self.adc.full_scale_counts == 0 || !(self.adc.reference_v > 0.0) {
            return Err(ConfigError::NonPositive("adc"));
        }
        if !(self.current_sensor.sensitivity_v_per_a > 0.0) {
            return Err(ConfigError::NonPositive("current_sensor.sensitivity_v_per_a"));
        }
        if self.current_sensor.samples_per_read == 0 {
            return Err(ConfigError::NonPositive("current_sensor.samples_per_read"));
        }
        if !(self.voltage.divider_ratio > 0.0) {
            return Err(ConfigError::NonPositive("voltage.divider_ratio"));
        }

        for (name, alpha) in [
            ("pressure.filter_alpha", p.filter_alpha),
            ("current_sensor.filter_alpha", self.current_sensor.filter_alpha),
            ("voltage.filter_alpha", self.voltage.filter_alpha),
            ("voltage.baseline_alpha", self.voltage.baseline_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::FilterAlpha(name));
            }
        }

        let c = &self.current_protection;
        let thresholds = [c.warning_a, c.high_a, c.critical_a, c.fault_a, c.emergency_a];
        if thresholds.windows(2).any(|pair| !(pair[0] < pair[1])) {
            return Err(ConfigError::ThresholdsNotIncreasing);
        }
        if !(c.hysteresis_a >= 0.0) {
            return Err(ConfigError::NonPositive("current_protection.hysteresis_a"));
        }
        let limits = [
            c.limit_normal,
            c.limit_warning,
            c.limit_high,
            c.limit_critical,
            c.limit_fault,
            c.limit_emergency,
        ];
        if limits.iter().any(|limit| !in_unit_range(*limit)) {
            return Err(ConfigError::FractionOutOfRange("current_protection.limit"));
        }
        if limits.windows(2).any(|pair| pair[1] > pair[0]) {
            return Err(ConfigError::LimitsIncreasing);
        }
        if !(c.rate_step > 0.0) {
            return Err(ConfigError::NonPositive("current_protection.rate_step"));
        }

        let v = &self.voltage;
        if !(v.minimum_valid_v < v.maximum_valid_v) || !(v.baseline_min_v <= v.baseline_max_v) {
            return Err(ConfigError::VoltageBand);
        }
        if !(v.warning_drop < v.critical_drop) || !in_unit_range(v.critical_drop) {
            return Err(ConfigError::VoltageBand);
        }

        let pwm = &self.pwm_input;
        if !(pwm.min_frequency_hz > 0.0 && pwm.min_frequency_hz < pwm.max_frequency_hz) {
            return Err(ConfigError::FrequencyBand);
        }

        if !(self.output.supply_min_v > 0.0 && self.output.supply_min_v <= self.output.supply_max_v)
        {
            return Err(ConfigError::VoltageBand);
        }
        if self.timing.control_interval.is_zero() {
            return Err(ConfigError::NonPositive("timing.control_interval"));
        }

        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn in_unit_range(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Configuration rejected by [`ControllerConfig::validate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    SetpointsInverted,
    ThresholdsNotIncreasing,
    LimitsIncreasing,
    FractionOutOfRange(&'static str),
    FilterAlpha(&'static str),
    NonPositive(&'static str),
    VoltageBand,
    FrequencyBand,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SetpointsInverted => {
                f.write_str("pressure low setpoint must be below high setpoint")
            }
            ConfigError::ThresholdsNotIncreasing => {
                f.write_str("current thresholds must strictly increase with severity")
            }
            ConfigError::LimitsIncreasing => {
                f.write_str("voltage limits must not increase with severity")
            }
            ConfigError::FractionOutOfRange(field) => write!(f, "{field} must lie in [0, 1]"),
            ConfigError::FilterAlpha(field) => write!(f, "{field} must lie in (0, 1]"),
            ConfigError::NonPositive(field) => write!(f, "{field} must be positive"),
            ConfigError::VoltageBand => f.write_str("voltage bands are inconsistent"),
            ConfigError::FrequencyBand => f.write_str("pwm input frequency band is empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert_eq!(ControllerConfig::DEFAULT.validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_setpoints() {
        let mut config = ControllerConfig::DEFAULT;
        config.pressure.low_setpoint_bar = 0.5;
        assert_eq!(config.validate(), Err(ConfigError::SetpointsInverted));
    }

    #[test]
    fn rejects_non_monotonic_thresholds() {
        let mut config = ControllerConfig::DEFAULT;
        config.current_protection.high_a = config.current_protection.warning_a;
        assert_eq!(config.validate(), Err(ConfigError::ThresholdsNotIncreasing));
    }

    #[test]
    fn rejects_limit_that_rises_with_severity() {
        let mut config = ControllerConfig::DEFAULT;
        config.current_protection.limit_high = 0.8;
        assert_eq!(config.validate(), Err(ConfigError::LimitsIncreasing));
    }

    #[test]
    fn rejects_zero_filter_alpha() {
        let mut config = ControllerConfig::DEFAULT;
        config.current_sensor.filter_alpha = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::FilterAlpha("current_sensor.filter_alpha"))
        );
    }
}
