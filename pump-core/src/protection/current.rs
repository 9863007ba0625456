//! Overcurrent protection.
//!
//! Six ordered levels with adjacent, hysteresis-gated transitions. EMERGENCY
//! is the one exception: it is entered from any level the moment the current
//! reaches the emergency threshold. Each level grants a voltage-limit
//! fraction; the granted limit moves towards that target by a bounded step per
//! cycle except in EMERGENCY, where it is applied at once.

use core::fmt;

use crate::config::{CurrentProtectionConfig, FeatureFlags};
use crate::time::{TickRate, Ticks};

use super::LevelTransition;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum ProtectionLevel {
    Normal,
    Warning,
    High,
    Critical,
    Fault,
    Emergency,
}

impl ProtectionLevel {
    pub const ALL: [Self; 6] = [
        Self::Normal,
        Self::Warning,
        Self::High,
        Self::Critical,
        Self::Fault,
        Self::Emergency,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Fault => "FAULT",
            Self::Emergency => "EMERGENCY",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Next more severe level, if any.
    #[must_use]
    pub const fn escalated(self) -> Option<Self> {
        match self {
            Self::Normal => Some(Self::Warning),
            Self::Warning => Some(Self::High),
            Self::High => Some(Self::Critical),
            Self::Critical => Some(Self::Fault),
            Self::Fault => Some(Self::Emergency),
            Self::Emergency => None,
        }
    }

    /// Next less severe level, if any.
    #[must_use]
    pub const fn relaxed(self) -> Option<Self> {
        match self {
            Self::Normal => None,
            Self::Warning => Some(Self::Normal),
            Self::High => Some(Self::Warning),
            Self::Critical => Some(Self::High),
            Self::Fault => Some(Self::Critical),
            Self::Emergency => Some(Self::Fault),
        }
    }

    #[must_use]
    pub const fn is_fault(self) -> bool {
        matches!(self, Self::Fault | Self::Emergency)
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry thresholds and hysteresis for the current levels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurrentThresholds {
    pub warning_a: f32,
    pub high_a: f32,
    pub critical_a: f32,
    pub fault_a: f32,
    pub emergency_a: f32,
    pub hysteresis_a: f32,
}

impl CurrentThresholds {
    #[must_use]
    pub const fn from_config(config: &CurrentProtectionConfig) -> Self {
        Self {
            warning_a: config.warning_a,
            high_a: config.high_a,
            critical_a: config.critical_a,
            fault_a: config.fault_a,
            emergency_a: config.emergency_a,
            hysteresis_a: config.hysteresis_a,
        }
    }

    /// Current at which `level` is entered from below; NORMAL has none.
    #[must_use]
    pub const fn entry(&self, level: ProtectionLevel) -> Option<f32> {
        match level {
            ProtectionLevel::Normal => None,
            ProtectionLevel::Warning => Some(self.warning_a),
            ProtectionLevel::High => Some(self.high_a),
            ProtectionLevel::Critical => Some(self.critical_a),
            ProtectionLevel::Fault => Some(self.fault_a),
            ProtectionLevel::Emergency => Some(self.emergency_a),
        }
    }

    /// Current below which `level` relaxes by one step.
    #[must_use]
    pub fn recovery(&self, level: ProtectionLevel) -> Option<f32> {
        self.entry(level).map(|entry| entry - self.hysteresis_a)
    }
}

/// Pure level transition for one cycle.
///
/// EMERGENCY wins unconditionally. Otherwise the level rises one step when the
/// next entry threshold is reached and falls one step when the current drops
/// strictly below the present level's entry threshold minus hysteresis.
#[must_use]
pub fn next_level(
    level: ProtectionLevel,
    amps: f32,
    thresholds: &CurrentThresholds,
) -> ProtectionLevel {
    if amps >= thresholds.emergency_a {
        return ProtectionLevel::Emergency;
    }

    if let Some(up) = level.escalated().filter(|up| *up != ProtectionLevel::Emergency)
        && thresholds.entry(up).is_some_and(|entry| amps >= entry)
    {
        return up;
    }

    match (level.relaxed(), thresholds.recovery(level)) {
        (Some(down), Some(recovery)) if amps < recovery => down,
        _ => level,
    }
}

/// Moves a value towards a target by a bounded step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RateLimiter {
    value: f32,
    step: f32,
}

impl RateLimiter {
    #[must_use]
    pub const fn new(initial: f32, step: f32) -> Self {
        Self {
            value: initial,
            step,
        }
    }

    /// Advances one step towards `target` and returns the new value.
    pub fn step_towards(&mut self, target: f32) -> f32 {
        let delta = target - self.value;
        self.value = if delta > self.step {
            self.value + self.step
        } else if delta < -self.step {
            self.value - self.step
        } else {
            target
        };
        self.value
    }

    /// Jumps straight to `target`.
    pub fn set(&mut self, target: f32) -> f32 {
        self.value = target;
        self.value
    }

    #[must_use]
    pub const fn value(&self) -> f32 {
        self.value
    }
}

/// Result of one protection update.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurrentUpdate {
    pub level: ProtectionLevel,
    pub limit: f32,
    pub transition: Option<LevelTransition<ProtectionLevel>>,
}

/// Current protection state: level, granted limit and fault history.
#[derive(Clone, Debug)]
pub struct CurrentProtection {
    thresholds: CurrentThresholds,
    limits: [f32; 6],
    level: ProtectionLevel,
    limiter: RateLimiter,
    last_change: Ticks,
    fault_count: u32,
}

impl CurrentProtection {
    #[must_use]
    pub fn new(config: &CurrentProtectionConfig, features: &FeatureFlags, now: Ticks) -> Self {
        let emergency = if features.emergency_shutdown {
            config.limit_emergency
        } else {
            config.limit_fault
        };
        Self {
            thresholds: CurrentThresholds::from_config(config),
            limits: [
                config.limit_normal,
                config.limit_warning,
                config.limit_high,
                config.limit_critical,
                config.limit_fault,
                emergency,
            ],
            level: ProtectionLevel::Normal,
            limiter: RateLimiter::new(config.limit_normal, config.rate_step),
            last_change: now,
            fault_count: 0,
        }
    }

    /// Evaluates `amps` (the larger channel current) and advances the limit.
    pub fn update(&mut self, amps: f32, now: Ticks, rate: &TickRate) -> CurrentUpdate {
        let next = next_level(self.level, amps, &self.thresholds);

        let transition = if next == self.level {
            None
        } else {
            let transition = LevelTransition {
                from: self.level,
                to: next,
                measurement: amps,
                elapsed: rate.elapsed(self.last_change, now),
                at: now,
            };
            if next.is_fault() && next > self.level {
                self.fault_count = self.fault_count.saturating_add(1);
            }
            self.level = next;
            self.last_change = now;
            Some(transition)
        };

        let target = self.target_limit();
        let limit = if self.level == ProtectionLevel::Emergency {
            self.limiter.set(target)
        } else {
            self.limiter.step_towards(target)
        };

        CurrentUpdate {
            level: self.level,
            limit,
            transition,
        }
    }

    #[must_use]
    pub fn limit_for(&self, level: ProtectionLevel) -> f32 {
        self.limits[level.index()]
    }

    #[must_use]
    pub fn target_limit(&self) -> f32 {
        self.limit_for(self.level)
    }

    #[must_use]
    pub const fn level(&self) -> ProtectionLevel {
        self.level
    }

    #[must_use]
    pub const fn limit(&self) -> f32 {
        self.limiter.value()
    }

    /// Entries into FAULT or EMERGENCY since boot.
    #[must_use]
    pub const fn fault_count(&self) -> u32 {
        self.fault_count
    }

    #[must_use]
    pub const fn thresholds(&self) -> &CurrentThresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;

    const RATE: TickRate = TickRate::nominal(1_000);

    fn protection() -> CurrentProtection {
        let config = ControllerConfig::DEFAULT;
        CurrentProtection::new(&config.current_protection, &config.features, Ticks(0))
    }

    fn thresholds() -> CurrentThresholds {
        CurrentThresholds::from_config(&ControllerConfig::DEFAULT.current_protection)
    }

    #[test]
    fn level_names_are_upper_case() {
        let names = ProtectionLevel::ALL.map(ProtectionLevel::as_str);
        assert_eq!(
            names,
            ["NORMAL", "WARNING", "HIGH", "CRITICAL", "FAULT", "EMERGENCY"]
        );
    }

    #[test]
    fn escalates_one_step_per_call() {
        let t = thresholds();
        let mut level = ProtectionLevel::Normal;
        let mut seen = heapless::Vec::<ProtectionLevel, 8>::new();
        for _ in 0..6 {
            level = next_level(level, 42.0, &t);
            let _ = seen.push(level);
        }
        assert_eq!(
            seen.as_slice(),
            &[
                ProtectionLevel::Warning,
                ProtectionLevel::High,
                ProtectionLevel::Critical,
                ProtectionLevel::Fault,
                ProtectionLevel::Fault,
                ProtectionLevel::Fault,
            ]
        );
    }

    #[test]
    fn emergency_skips_every_boundary() {
        let t = thresholds();
        for level in ProtectionLevel::ALL {
            assert_eq!(next_level(level, 45.0, &t), ProtectionLevel::Emergency);
        }
    }

    #[test]
    fn recovery_requires_strictly_below_hysteresis() {
        let t = thresholds();
        assert_eq!(
            next_level(ProtectionLevel::Warning, 23.0, &t),
            ProtectionLevel::Warning
        );
        assert_eq!(
            next_level(ProtectionLevel::Warning, 22.99, &t),
            ProtectionLevel::Normal
        );
        assert_eq!(
            next_level(ProtectionLevel::Fault, 38.5, &t),
            ProtectionLevel::Fault
        );
        assert_eq!(
            next_level(ProtectionLevel::Fault, 37.9, &t),
            ProtectionLevel::Critical
        );
        assert_eq!(
            next_level(ProtectionLevel::Emergency, 44.0, &t),
            ProtectionLevel::Emergency
        );
        assert_eq!(
            next_level(ProtectionLevel::Emergency, 42.9, &t),
            ProtectionLevel::Fault
        );
    }

    #[test]
    fn settled_level_never_falls_as_current_rises() {
        let t = thresholds();
        let mut previous = ProtectionLevel::Normal;
        for tenths in 0..=500_u16 {
            let amps = f32::from(tenths) / 10.0;
            let mut level = ProtectionLevel::Normal;
            for _ in 0..ProtectionLevel::ALL.len() {
                level = next_level(level, amps, &t);
            }
            assert_eq!(next_level(level, amps, &t), level, "{amps} A did not settle");
            assert!(level >= previous, "{amps} A settled at {level} after {previous}");
            previous = level;
        }
        assert_eq!(previous, ProtectionLevel::Emergency);
    }

    #[test]
    fn level_is_stable_inside_the_hysteresis_band() {
        let t = thresholds();
        for amps in [28.0_f32, 29.9, 31.0, 34.9] {
            assert_eq!(next_level(ProtectionLevel::High, amps, &t), ProtectionLevel::High);
        }
    }

    #[test]
    fn limits_never_increase_with_severity() {
        let prot = protection();
        let limits = ProtectionLevel::ALL.map(|level| prot.limit_for(level));
        assert!(limits.windows(2).all(|pair| pair[1] <= pair[0]));
        assert_eq!(prot.limit_for(ProtectionLevel::Emergency), 0.0);
    }

    #[test]
    fn emergency_uses_fault_floor_when_shutdown_disabled() {
        let mut config = ControllerConfig::DEFAULT;
        config.features.emergency_shutdown = false;
        let mut prot =
            CurrentProtection::new(&config.current_protection, &config.features, Ticks(0));
        let update = prot.update(48.0, Ticks(50), &RATE);
        assert_eq!(update.level, ProtectionLevel::Emergency);
        assert_eq!(update.limit, config.current_protection.limit_fault);
    }

    #[test]
    fn limit_ramps_by_rate_step_outside_emergency() {
        let mut prot = protection();
        let mut previous = prot.limit();
        for cycle in 0..40_u64 {
            let update = prot.update(36.0, Ticks(cycle * 50), &RATE);
            let delta = previous - update.limit;
            assert!(delta <= 0.05 + 1e-6 && delta >= -1e-6, "delta {delta}");
            previous = update.limit;
        }
        assert_eq!(prot.level(), ProtectionLevel::Critical);
        assert_eq!(prot.limit(), 0.5);
    }

    #[test]
    fn transitions_carry_elapsed_time_and_count_faults() {
        let mut prot = protection();
        let mut last = None;
        for (cycle, amps) in [26.0, 31.0, 36.0, 41.0].into_iter().enumerate() {
            let at = Ticks(1_000 + 100 * cycle as u64);
            last = prot.update(amps, at, &RATE).transition;
        }
        let transition = last.expect("fault entry");
        assert_eq!(transition.from, ProtectionLevel::Critical);
        assert_eq!(transition.to, ProtectionLevel::Fault);
        assert_eq!(transition.measurement, 41.0);
        assert_eq!(transition.elapsed, core::time::Duration::from_millis(100));
        assert_eq!(prot.fault_count(), 1);

        // Relaxing back into FAULT from EMERGENCY is not a new fault.
        prot.update(46.0, Ticks(2_000), &RATE);
        prot.update(42.0, Ticks(2_050), &RATE);
        assert_eq!(prot.level(), ProtectionLevel::Fault);
        assert_eq!(prot.fault_count(), 2);
    }
}
