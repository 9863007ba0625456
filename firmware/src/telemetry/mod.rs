//! Logging bridge for controller telemetry.
//!
//! The control task drains new records from the core's telemetry ring after
//! every cycle and hands them here. Each record is emitted over defmt on the
//! target and over stdout on the host, at a level chosen from the event: fault
//! entries are errors, elevated levels and lost signals are warnings, the rest
//! is informational.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt::Write as _;

use heapless::String;
use pump_core::control::{CycleSnapshot, OperatingMode};
use pump_core::diagnostics::{ReportFormatter, StatusReport, SummaryFormatter};
use pump_core::protection::{ProtectionLevel, VoltageLevel};
use pump_core::telemetry::{TelemetryEventKind, TelemetryRecord};
use pump_core::time::TickRate;

/// Longest line the log helpers format.
const LINE_CAPACITY: usize = 160;

type Line = String<LINE_CAPACITY>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Log level for a telemetry event.
pub const fn severity(event: TelemetryEventKind) -> Severity {
    match event {
        TelemetryEventKind::CurrentLevel(ProtectionLevel::Fault | ProtectionLevel::Emergency)
        | TelemetryEventKind::VoltageLevel(VoltageLevel::Critical | VoltageLevel::Fault) => {
            Severity::Error
        }
        TelemetryEventKind::CurrentLevel(
            ProtectionLevel::Warning | ProtectionLevel::High | ProtectionLevel::Critical,
        )
        | TelemetryEventKind::VoltageLevel(VoltageLevel::Warning)
        | TelemetryEventKind::ModeChanged(OperatingMode::Safety)
        | TelemetryEventKind::SignalLost => Severity::Warn,
        _ => Severity::Info,
    }
}

/// Subsystem tag used as the log prefix.
pub const fn family_label(event: TelemetryEventKind) -> &'static str {
    match event {
        TelemetryEventKind::CurrentLevel(_) => "current",
        TelemetryEventKind::VoltageLevel(_) => "voltage",
        TelemetryEventKind::ModeChanged(_) => "mode",
        TelemetryEventKind::SignalAcquired | TelemetryEventKind::SignalLost => "signal",
        TelemetryEventKind::Custom(_) => "custom",
    }
}

/// Emits one telemetry record.
pub fn log_record(record: &TelemetryRecord, rate: &TickRate) {
    let micros = u64::try_from(rate.ticks_to_duration(record.timestamp.raw()).as_micros())
        .unwrap_or(u64::MAX);
    let mut line = Line::new();
    if write!(line, "{record}").is_err() {
        line.clear();
        let _ = write!(line, "#{} {}", record.id, record.event);
    }
    emit(severity(record.event), family_label(record.event), micros, &line);
}

/// Emits the one-line cycle summary.
pub fn log_summary(snapshot: &CycleSnapshot) {
    let mut line = Line::new();
    if SummaryFormatter::new(snapshot).write_line(&mut line).is_ok() {
        emit_debug(&line);
    }
}

/// Emits the verbose report, one log line per section.
pub fn log_report(report: &StatusReport) {
    let mut text: String<{ LINE_CAPACITY * 5 }> = String::new();
    if ReportFormatter::new(report).write_all(&mut text).is_err() {
        emit(Severity::Warn, "report", 0, "report truncated");
    }
    for line in text.lines() {
        emit(Severity::Info, "report", 0, line);
    }
}

#[cfg(target_os = "none")]
fn emit(severity: Severity, family: &'static str, micros: u64, line: &str) {
    match severity {
        Severity::Info => defmt::info!("telemetry:{} t={}us {}", family, micros, line),
        Severity::Warn => defmt::warn!("telemetry:{} t={}us {}", family, micros, line),
        Severity::Error => defmt::error!("telemetry:{} t={}us {}", family, micros, line),
    }
}

#[cfg(not(target_os = "none"))]
fn emit(severity: Severity, family: &'static str, micros: u64, line: &str) {
    let level = match severity {
        Severity::Info => "INFO",
        Severity::Warn => "WARN",
        Severity::Error => "ERROR",
    };
    println!("{level} telemetry:{family} t={micros}us {line}");
}

#[cfg(target_os = "none")]
fn emit_debug(line: &str) {
    defmt::debug!("status {}", line);
}

#[cfg(not(target_os = "none"))]
fn emit_debug(line: &str) {
    println!("DEBUG status {line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_entries_are_errors() {
        assert_eq!(
            severity(TelemetryEventKind::CurrentLevel(ProtectionLevel::Emergency)),
            Severity::Error
        );
        assert_eq!(
            severity(TelemetryEventKind::VoltageLevel(VoltageLevel::Fault)),
            Severity::Error
        );
        assert_eq!(
            severity(TelemetryEventKind::CurrentLevel(ProtectionLevel::High)),
            Severity::Warn
        );
        assert_eq!(
            severity(TelemetryEventKind::CurrentLevel(ProtectionLevel::Normal)),
            Severity::Info
        );
        assert_eq!(severity(TelemetryEventKind::SignalLost), Severity::Warn);
        assert_eq!(severity(TelemetryEventKind::SignalAcquired), Severity::Info);
        assert_eq!(
            severity(TelemetryEventKind::ModeChanged(OperatingMode::Safety)),
            Severity::Warn
        );
    }

    #[test]
    fn families_follow_event_kind() {
        assert_eq!(
            family_label(TelemetryEventKind::VoltageLevel(VoltageLevel::Warning)),
            "voltage"
        );
        assert_eq!(
            family_label(TelemetryEventKind::ModeChanged(OperatingMode::Slave)),
            "mode"
        );
        assert_eq!(family_label(TelemetryEventKind::SignalLost), "signal");
        assert_eq!(family_label(TelemetryEventKind::Custom(0x99)), "custom");
    }
}
