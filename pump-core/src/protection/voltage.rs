//! Supply voltage and sensor-fault protection.
//!
//! Two philosophies are supported, chosen by [`VoltageProtectionMode`]:
//! a binary NORMAL/FAULT machine driven purely by sensor plausibility, and an
//! adaptive machine that tracks a slowly rising baseline and grades drops from
//! it. In both, FAULT means the measurement cannot be trusted and is reached
//! only through sensor invalidity.

use core::fmt;

use crate::config::{VoltageConfig, VoltageProtectionMode};
use crate::sensors::SupplyReading;
use crate::time::{TickRate, Ticks};

use super::LevelTransition;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum VoltageLevel {
    Normal,
    Warning,
    Critical,
    Fault,
}

impl VoltageLevel {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Warning, Self::Critical, Self::Fault];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Fault => "FAULT",
        }
    }

    const fn counts_as_fault(self) -> bool {
        matches!(self, Self::Critical | Self::Fault)
    }
}

impl fmt::Display for VoltageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Baseline and derived drop thresholds of the adaptive machine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoltageThresholds {
    pub baseline_v: f32,
    pub warning_v: f32,
    pub critical_v: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoltageUpdate {
    pub level: VoltageLevel,
    pub transition: Option<LevelTransition<VoltageLevel>>,
}

#[derive(Clone, Debug)]
pub struct VoltageProtection {
    config: VoltageConfig,
    level: VoltageLevel,
    baseline: Option<f32>,
    last_change: Ticks,
    fault_count: u32,
}

impl VoltageProtection {
    #[must_use]
    pub const fn new(config: VoltageConfig, now: Ticks) -> Self {
        Self {
            config,
            level: VoltageLevel::Normal,
            baseline: None,
            last_change: now,
            fault_count: 0,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> VoltageProtectionMode {
        self.config.mode
    }

    pub fn update(&mut self, reading: SupplyReading, now: Ticks, rate: &TickRate) -> VoltageUpdate {
        let next = match self.config.mode {
            VoltageProtectionMode::SensorFaultOnly => {
                if reading.valid {
                    VoltageLevel::Normal
                } else {
                    VoltageLevel::Fault
                }
            }
            VoltageProtectionMode::Adaptive => self.adaptive_level(reading),
        };

        let transition = if next == self.level {
            None
        } else {
            let transition = LevelTransition {
                from: self.level,
                to: next,
                measurement: reading.volts,
                elapsed: rate.elapsed(self.last_change, now),
                at: now,
            };
            if next.counts_as_fault() {
                self.fault_count = self.fault_count.saturating_add(1);
            }
            self.level = next;
            self.last_change = now;
            Some(transition)
        };

        VoltageUpdate {
            level: self.level,
            transition,
        }
    }

    fn adaptive_level(&mut self, reading: SupplyReading) -> VoltageLevel {
        if !reading.valid {
            return VoltageLevel::Fault;
        }

        let volts = reading.volts;
        self.track_baseline(volts);
        let Some(thresholds) = self.thresholds() else {
            return VoltageLevel::Normal;
        };
        let hysteresis = self.config.hysteresis_v;

        match self.level {
            VoltageLevel::Normal if volts < thresholds.warning_v => VoltageLevel::Warning,
            VoltageLevel::Warning if volts < thresholds.critical_v => VoltageLevel::Critical,
            VoltageLevel::Warning if volts > thresholds.warning_v + hysteresis => {
                VoltageLevel::Normal
            }
            VoltageLevel::Critical if volts > thresholds.critical_v + hysteresis => {
                VoltageLevel::Warning
            }
            VoltageLevel::Fault => classify(volts, &thresholds),
            level => level,
        }
    }

    fn track_baseline(&mut self, volts: f32) {
        let alpha = self.config.baseline_alpha;
        let next = match self.baseline {
            None => volts,
            Some(current) if volts > current => current + alpha * (volts - current),
            Some(current) => current,
        };
        self.baseline = Some(next.clamp(self.config.baseline_min_v, self.config.baseline_max_v));
    }

    /// Baseline-derived thresholds, once the first valid sample has arrived.
    #[must_use]
    pub fn thresholds(&self) -> Option<VoltageThresholds> {
        self.baseline.map(|baseline_v| VoltageThresholds {
            baseline_v,
            warning_v: baseline_v * (1.0 - self.config.warning_drop),
            critical_v: baseline_v * (1.0 - self.config.critical_drop),
        })
    }

    #[must_use]
    pub const fn level(&self) -> VoltageLevel {
        self.level
    }

    /// Entries into CRITICAL or FAULT since boot.
    #[must_use]
    pub const fn fault_count(&self) -> u32 {
        self.fault_count
    }
}

/// Level matching `volts` without hysteresis, used when leaving FAULT.
fn classify(volts: f32, thresholds: &VoltageThresholds) -> VoltageLevel {
    if volts < thresholds.critical_v {
        VoltageLevel::Critical
    } else if volts < thresholds.warning_v {
        VoltageLevel::Warning
    } else {
        VoltageLevel::Normal
    }
}
