//! Monotonic time base shared by firmware and host targets.
//!
//! Every duration comparison in the controller goes through [`TickRate`].
//! Boards that retune the timer feeding the monotonic counter (for example to
//! move the drive frequency) report the distortion as a prescaler factor here,
//! so hysteresis dwell, signal timeouts, and the startup hold keep running at
//! wall-clock rate without per-call-site compensation.

use core::ops::Add;
use core::time::Duration;

/// Raw reading of the free-running monotonic counter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Tick delta from `earlier` to `self`, zero if the counter appears to run backwards.
    #[must_use]
    pub const fn saturating_ticks_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u64> for Ticks {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

/// Effective rate of the monotonic counter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickRate {
    nominal_hz: u64,
    prescaler_factor: u32,
}

impl TickRate {
    /// Counter running at its documented rate.
    #[must_use]
    pub const fn nominal(hz: u64) -> Self {
        Self {
            nominal_hz: hz,
            prescaler_factor: 1,
        }
    }

    /// Counter whose source timer was sped up by `factor` (e.g. prescaler 64 → 1).
    #[must_use]
    pub const fn with_prescaler_factor(hz: u64, factor: u32) -> Self {
        Self {
            nominal_hz: hz,
            prescaler_factor: if factor == 0 { 1 } else { factor },
        }
    }

    #[must_use]
    pub const fn nominal_hz(&self) -> u64 {
        self.nominal_hz
    }

    #[must_use]
    pub const fn prescaler_factor(&self) -> u32 {
        self.prescaler_factor
    }

    /// Ticks actually counted per wall-clock second.
    #[must_use]
    pub const fn effective_hz(&self) -> u64 {
        self.nominal_hz.saturating_mul(self.prescaler_factor as u64)
    }

    /// Converts a tick delta into wall-clock time.
    #[must_use]
    pub fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let hz = u128::from(self.effective_hz().max(1));
        let nanos = u128::from(ticks).saturating_mul(1_000_000_000) / hz;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Converts wall-clock time into a tick delta.
    #[must_use]
    pub fn duration_to_ticks(&self, duration: Duration) -> u64 {
        let hz = u128::from(self.effective_hz());
        let ticks = duration.as_nanos().saturating_mul(hz) / 1_000_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Wall-clock time elapsed between two counter readings.
    #[must_use]
    pub fn elapsed(&self, since: Ticks, now: Ticks) -> Duration {
        self.ticks_to_duration(now.saturating_ticks_since(since))
    }

    /// Returns `true` once at least `interval` of wall-clock time separates the readings.
    #[must_use]
    pub fn has_elapsed(&self, since: Ticks, now: Ticks, interval: Duration) -> bool {
        now.saturating_ticks_since(since) >= self.duration_to_ticks(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaled_counter_reports_wall_clock_time() {
        // Prescaler dropped from 64 to 1: the counter runs 64x fast.
        let rate = TickRate::with_prescaler_factor(1_000, 64);
        assert_eq!(rate.effective_hz(), 64_000);
        assert_eq!(
            rate.elapsed(Ticks(0), Ticks(64_000)),
            Duration::from_secs(1)
        );
        assert_eq!(rate.duration_to_ticks(Duration::from_millis(500)), 32_000);
    }

    #[test]
    fn has_elapsed_uses_effective_rate() {
        let rate = TickRate::with_prescaler_factor(1_000, 64);
        let start = Ticks(10);
        assert!(!rate.has_elapsed(start, Ticks(10 + 499), Duration::from_millis(500)));
        assert!(!rate.has_elapsed(start, Ticks(10 + 31_999), Duration::from_millis(500)));
        assert!(rate.has_elapsed(start, Ticks(10 + 32_000), Duration::from_millis(500)));
    }

    #[test]
    fn zero_factor_falls_back_to_nominal() {
        let rate = TickRate::with_prescaler_factor(1_000_000, 0);
        assert_eq!(rate.prescaler_factor(), 1);
        assert_eq!(
            rate.ticks_to_duration(1_500),
            Duration::from_micros(1_500)
        );
    }

    #[test]
    fn backwards_counter_saturates_to_zero() {
        let rate = TickRate::nominal(1_000);
        assert_eq!(rate.elapsed(Ticks(50), Ticks(10)), Duration::ZERO);
    }
}
