//! Power stage drive abstraction.
//!
//! The controller thinks in output fractions (share of the supply voltage
//! delivered to the pump). [`ActuatorControl`] multiplies the commanded
//! fraction by the voltage limit currently granted by current protection,
//! converts the product into a drive level, and writes it to both outputs.

use crate::config::OutputConfig;

/// Hardware that drives the two pump outputs.
pub trait PowerStage {
    /// Drive level corresponding to 100 % on-time.
    fn max_level(&self) -> u16;

    /// Writes the same drive level to both outputs.
    fn write_level(&mut self, level: u16);
}

/// Power stage that discards every write.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPowerStage;

impl NoopPowerStage {
    /// Creates a new no-op power stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PowerStage for NoopPowerStage {
    fn max_level(&self) -> u16 {
        u16::from(u8::MAX)
    }

    fn write_level(&mut self, _: u16) {}
}

/// Commanded output, limit and last written drive level.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OutputCommand {
    /// Commanded fraction before limiting, in `[0, 1]`.
    pub fraction: f32,
    /// Voltage limit in force, in `[0, 1]`.
    pub limit: f32,
    /// Logical drive level before polarity compensation.
    pub level: u16,
}

impl OutputCommand {
    /// Fraction actually delivered after limiting.
    #[must_use]
    pub fn effective_fraction(&self) -> f32 {
        self.fraction * self.limit
    }
}

pub struct ActuatorControl<P> {
    stage: P,
    config: OutputConfig,
    fraction: f32,
    limit: f32,
    supply_v: f32,
    level: u16,
}

impl<P: PowerStage> ActuatorControl<P> {
    /// Takes ownership of the stage and drives it off.
    pub fn new(stage: P, config: OutputConfig) -> Self {
        let mut actuator = Self {
            stage,
            supply_v: config
                .nominal_supply_v
                .clamp(config.supply_min_v, config.supply_max_v),
            config,
            fraction: 0.0,
            limit: 1.0,
            level: 0,
        };
        actuator.apply();
        actuator
    }

    /// Commands an output fraction, clamped to `[0, 1]`, and writes it immediately.
    pub fn set_output_fraction(&mut self, fraction: f32) {
        self.fraction = clamp_unit(fraction);
        self.apply();
    }

    /// Records the measured supply, clamped to the configured safe band.
    pub fn update_supply_voltage(&mut self, volts: f32) {
        self.supply_v = volts.clamp(self.config.supply_min_v, self.config.supply_max_v);
    }

    /// Sets the voltage limit, clamped to `[0, 1]`, and rewrites the outputs.
    pub fn set_voltage_limit(&mut self, limit: f32) {
        self.limit = clamp_unit(limit);
        self.apply();
    }

    /// Sets the fraction and the limit together with a single write.
    pub fn drive(&mut self, fraction: f32, limit: f32) {
        self.fraction = clamp_unit(fraction);
        self.limit = clamp_unit(limit);
        self.apply();
    }

    /// Voltage delivered to the pump: fraction × limit × supply.
    #[must_use]
    pub fn output_voltage(&self) -> f32 {
        self.fraction * self.limit * self.supply_v
    }

    /// Drops the commanded fraction to zero and writes it without delay.
    pub fn force_off(&mut self) {
        self.fraction = 0.0;
        self.apply();
    }

    #[must_use]
    pub fn command(&self) -> OutputCommand {
        OutputCommand {
            fraction: self.fraction,
            limit: self.limit,
            level: self.level,
        }
    }

    #[must_use]
    pub fn supply_voltage(&self) -> f32 {
        self.supply_v
    }

    #[must_use]
    pub fn voltage_limit(&self) -> f32 {
        self.limit
    }

    #[must_use]
    pub fn stage(&self) -> &P {
        &self.stage
    }

    fn apply(&mut self) {
        let max = self.stage.max_level();
        let level = fraction_to_level(self.fraction * self.limit, max);
        self.level = level;
        let physical = if self.config.inverted { max - level } else { level };
        self.stage.write_level(physical);
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Converts a fraction to a drive level in `[0, max]`, rounding down so the
/// delivered duty never exceeds the fraction.
#[must_use]
pub fn fraction_to_level(fraction: f32, max: u16) -> u16 {
    let scaled = clamp_unit(fraction) * f32::from(max);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let level = scaled as u16;
    level.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;

    #[derive(Default)]
    struct RecordingStage {
        writes: heapless::Vec<u16, 16>,
    }

    impl PowerStage for RecordingStage {
        fn max_level(&self) -> u16 {
            255
        }

        fn write_level(&mut self, level: u16) {
            let _ = self.writes.push(level);
        }
    }

    fn actuator(inverted: bool) -> ActuatorControl<RecordingStage> {
        let mut config = ControllerConfig::DEFAULT.output;
        config.inverted = inverted;
        ActuatorControl::new(RecordingStage::default(), config)
    }

    #[test]
    fn construction_drives_outputs_off() {
        assert_eq!(actuator(false).stage().writes.as_slice(), &[0]);
        assert_eq!(actuator(true).stage().writes.as_slice(), &[255]);
    }

    #[test]
    fn limit_scales_the_written_level() {
        let mut act = actuator(false);
        act.set_output_fraction(0.8);
        act.set_voltage_limit(0.5);
        assert_eq!(act.command().level, 102);
        assert_eq!(act.stage().writes.last(), Some(&102));
    }

    #[test]
    fn written_duty_never_exceeds_limited_fraction() {
        let mut act = actuator(false);
        act.set_output_fraction(0.70);
        assert_eq!(act.command().level, 178);

        for limit in [1.0, 0.7, 0.6, 0.5] {
            act.set_voltage_limit(limit);
            for step in 0..=100_u8 {
                let fraction = f32::from(step) / 100.0;
                act.set_output_fraction(fraction);
                let level = act.command().level;
                let physical = f32::from(level) / 255.0;
                assert!(
                    physical <= fraction * limit + 1e-6,
                    "fraction {fraction} limit {limit} level {level}"
                );
                assert!(
                    fraction * limit - physical < 1.0 / 255.0 + 1e-6,
                    "fraction {fraction} limit {limit} level {level}"
                );
            }
        }
    }

    #[test]
    fn drive_writes_once() {
        let mut act = actuator(false);
        act.set_output_fraction(1.0);
        act.drive(0.4, 0.5);
        assert_eq!(act.stage().writes.as_slice(), &[0, 255, 51]);
        assert_eq!(act.command().fraction, 0.4);
        assert_eq!(act.command().limit, 0.5);
    }

    #[test]
    fn inverted_stage_receives_complement() {
        let mut act = actuator(true);
        act.set_output_fraction(1.0);
        assert_eq!(act.command().level, 255);
        assert_eq!(act.stage().writes.last(), Some(&0));
        act.force_off();
        assert_eq!(act.stage().writes.last(), Some(&255));
    }

    #[test]
    fn inputs_are_clamped() {
        let mut act = actuator(false);
        act.set_output_fraction(1.7);
        act.set_voltage_limit(-0.2);
        assert_eq!(act.command().fraction, 1.0);
        assert_eq!(act.command().limit, 0.0);
        act.set_output_fraction(f32::NAN);
        assert_eq!(act.command().fraction, 0.0);
    }

    #[test]
    fn output_voltage_uses_clamped_supply() {
        let mut act = actuator(false);
        act.set_output_fraction(0.5);
        act.update_supply_voltage(13.0);
        assert_eq!(act.output_voltage(), 6.5);
        act.update_supply_voltage(40.0);
        assert_eq!(act.supply_voltage(), 15.0);
        act.update_supply_voltage(2.0);
        assert_eq!(act.supply_voltage(), 8.0);
        act.set_voltage_limit(0.5);
        assert_eq!(act.output_voltage(), 2.0);
    }
}
