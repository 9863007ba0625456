//! Inter-module status bus.
//!
//! Boards that share state with other modules publish a compact
//! [`StatusFrame`] once per cycle. No transport is wired yet; [`NoopBus`]
//! accepts and drops every frame.

use crate::control::{CycleSnapshot, OperatingMode};
use crate::protection::{ProtectionLevel, VoltageLevel};
use crate::telemetry::TelemetryEventKind;

/// Encoded frame length in bytes.
pub const STATUS_FRAME_LEN: usize = 6;

/// Controller status as seen by other modules.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusFrame {
    pub mode: OperatingMode,
    pub current_level: ProtectionLevel,
    pub voltage_level: VoltageLevel,
    /// Granted voltage limit, whole percent.
    pub limit_percent: u8,
    /// Delivered output after limiting, whole percent.
    pub output_percent: u8,
    /// Supply voltage in tenths of a volt, saturating.
    pub supply_decivolts: u8,
}

impl StatusFrame {
    #[must_use]
    pub fn from_snapshot(snapshot: &CycleSnapshot) -> Self {
        Self {
            mode: snapshot.mode,
            current_level: snapshot.current_level,
            voltage_level: snapshot.voltage_level,
            limit_percent: percent(snapshot.output.limit),
            output_percent: percent(snapshot.output.effective_fraction()),
            supply_decivolts: saturating_u8(snapshot.supply_v * 10.0),
        }
    }

    /// Serializes the frame; level and mode fields reuse the telemetry codes.
    #[must_use]
    pub fn encode(&self) -> [u8; STATUS_FRAME_LEN] {
        [
            low_byte(TelemetryEventKind::ModeChanged(self.mode).to_raw()),
            low_byte(TelemetryEventKind::CurrentLevel(self.current_level).to_raw()),
            low_byte(TelemetryEventKind::VoltageLevel(self.voltage_level).to_raw()),
            self.limit_percent,
            self.output_percent,
            self.supply_decivolts,
        ]
    }
}

/// Outbound half of the status bus.
pub trait StatusBus {
    type Error;

    fn publish(&mut self, frame: &StatusFrame) -> Result<(), Self::Error>;
}

/// Bus that accepts and discards every frame.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopBus;

impl NoopBus {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StatusBus for NoopBus {
    type Error = core::convert::Infallible;

    fn publish(&mut self, _: &StatusFrame) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn percent(fraction: f32) -> u8 {
    saturating_u8(fraction * 100.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn saturating_u8(value: f32) -> u8 {
    (value.clamp(0.0, 255.0) + 0.5) as u8
}

fn low_byte(code: u16) -> u8 {
    code.to_le_bytes()[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::OutputCommand;
    use crate::time::Ticks;
    use core::time::Duration;

    #[test]
    fn frame_encodes_levels_and_percentages() {
        let snapshot = CycleSnapshot {
            at: Ticks(0),
            uptime: Duration::ZERO,
            mode: OperatingMode::Slave,
            safety_active: false,
            readings: None,
            target_fraction: 0.8,
            output: OutputCommand {
                fraction: 0.8,
                limit: 0.5,
                level: 102,
            },
            output_voltage: 4.8,
            supply_v: 12.0,
            current_level: ProtectionLevel::Critical,
            voltage_level: VoltageLevel::Normal,
            report_due: false,
        };
        let frame = StatusFrame::from_snapshot(&snapshot);
        assert_eq!(frame.limit_percent, 50);
        assert_eq!(frame.output_percent, 40);
        assert_eq!(frame.encode(), [0x22, 0x03, 0x10, 50, 40, 120]);
        assert_eq!(NoopBus::new().publish(&frame), Ok(()));
    }
}
