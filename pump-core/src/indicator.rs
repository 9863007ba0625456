//! RGB status indicator patterns.
//!
//! Purely derived from controller state; nothing here feeds back into control.

use core::time::Duration;

use crate::control::CycleSnapshot;
use crate::protection::{CurrentThresholds, ProtectionLevel};
use crate::time::{TickRate, Ticks};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);

    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// What the indicator is asked to show.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum IndicatorInput {
    Safety,
    Current {
        amps: f32,
        in_fault: bool,
        in_emergency: bool,
    },
}

impl IndicatorInput {
    /// Indicator request for the state at the end of a cycle.
    #[must_use]
    pub fn from_snapshot(snapshot: &CycleSnapshot) -> Self {
        if snapshot.safety_active {
            return Self::Safety;
        }
        Self::Current {
            amps: snapshot
                .readings
                .map_or(0.0, |readings| readings.max_current()),
            in_fault: snapshot.current_level == ProtectionLevel::Fault,
            in_emergency: snapshot.current_level == ProtectionLevel::Emergency,
        }
    }
}

pub const EMERGENCY_BLINK: Duration = Duration::from_millis(100);
pub const FAULT_BLINK: Duration = Duration::from_millis(500);
pub const SAFETY_BLINK: Duration = Duration::from_millis(250);

/// Colour plus optional blink half-period.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorPattern {
    pub color: Rgb,
    pub blink: Option<Duration>,
}

impl IndicatorPattern {
    #[must_use]
    pub const fn steady(color: Rgb) -> Self {
        Self { color, blink: None }
    }

    #[must_use]
    pub const fn blinking(color: Rgb, half_period: Duration) -> Self {
        Self {
            color,
            blink: Some(half_period),
        }
    }
}

/// Maps controller state onto a pattern.
#[must_use]
pub fn pattern_for(input: IndicatorInput, thresholds: &CurrentThresholds) -> IndicatorPattern {
    match input {
        IndicatorInput::Safety => IndicatorPattern::blinking(Rgb::BLUE, SAFETY_BLINK),
        IndicatorInput::Current {
            in_emergency: true, ..
        } => IndicatorPattern::blinking(Rgb::RED, EMERGENCY_BLINK),
        IndicatorInput::Current { in_fault: true, .. } => {
            IndicatorPattern::blinking(Rgb::RED, FAULT_BLINK)
        }
        IndicatorInput::Current { amps, .. } => IndicatorPattern::steady(gradient(
            amps,
            thresholds.warning_a,
            thresholds.fault_a,
        )),
    }
}

/// Green at or below `low`, red at or above `high`, through yellow halfway.
#[must_use]
pub fn gradient(amps: f32, low: f32, high: f32) -> Rgb {
    if amps <= low {
        return Rgb::GREEN;
    }
    if amps >= high {
        return Rgb::RED;
    }

    let ratio = ((amps - low) / (high - low)).clamp(0.0, 1.0);
    if ratio <= 0.5 {
        Rgb::new(channel(ratio * 2.0), 255, 0)
    } else {
        Rgb::new(255, channel(1.0 - (ratio - 0.5) * 2.0), 0)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(fraction: f32) -> u8 {
    (fraction.clamp(0.0, 1.0) * 255.0) as u8
}

/// Blink state machine driving the physical indicator.
#[derive(Clone, Debug)]
pub struct StatusIndicator {
    last_toggle: Ticks,
    lit: bool,
    pattern: Option<IndicatorPattern>,
}

impl StatusIndicator {
    #[must_use]
    pub const fn new(now: Ticks) -> Self {
        Self {
            last_toggle: now,
            lit: false,
            pattern: None,
        }
    }

    /// Advances blinking and returns the colour to display now.
    pub fn update(&mut self, pattern: IndicatorPattern, now: Ticks, rate: &TickRate) -> Rgb {
        if self.pattern != Some(pattern) {
            self.pattern = Some(pattern);
            self.lit = true;
            self.last_toggle = now;
        } else if let Some(half_period) = pattern.blink
            && rate.has_elapsed(self.last_toggle, now, half_period)
        {
            self.lit = !self.lit;
            self.last_toggle = now;
        }

        if pattern.blink.is_none() || self.lit {
            pattern.color
        } else {
            Rgb::OFF
        }
    }
}
