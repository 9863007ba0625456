//! Protection state machines guarding the power stage.

pub mod current;
pub mod voltage;

pub use current::{CurrentProtection, CurrentThresholds, ProtectionLevel, RateLimiter};
pub use voltage::{VoltageLevel, VoltageProtection, VoltageThresholds};

use core::time::Duration;

use crate::time::Ticks;

/// Discrete level change reported by a protection machine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevelTransition<L> {
    pub from: L,
    pub to: L,
    /// Measurement that triggered the change (amperes or volts).
    pub measurement: f32,
    /// Time spent in `from`.
    pub elapsed: Duration,
    pub at: Ticks,
}
