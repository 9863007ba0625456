//! Textual diagnostics shared by the firmware log task and the emulator.
//!
//! [`SummaryFormatter`] renders the one-line status printed every cycle;
//! [`ReportFormatter`] renders the verbose block printed at the report
//! interval. Both write into any [`fmt::Write`] so the firmware can format into
//! a `heapless::String` while hosts use `alloc::string::String`.

use core::fmt;
use core::time::Duration;

use crate::actuator::PowerStage;
use crate::config::VoltageProtectionMode;
use crate::control::{CycleSnapshot, PumpController};
use crate::protection::{CurrentThresholds, VoltageThresholds};
use crate::pwm_input::{Rejection, SignalState};

/// Everything the verbose report prints, captured at one instant.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub snapshot: CycleSnapshot,
    pub cycles: u64,
    pub current_thresholds: CurrentThresholds,
    pub target_limit: f32,
    pub current_faults: u32,
    pub voltage_mode: VoltageProtectionMode,
    pub voltage_thresholds: Option<VoltageThresholds>,
    pub voltage_faults: u32,
    pub slave_enabled: bool,
    pub signal: SignalState,
    pub accepted_cycles: u32,
    pub since_last_signal: Duration,
    pub rejection: Option<Rejection>,
}

impl StatusReport {
    #[must_use]
    pub fn capture<P: PowerStage>(controller: &PumpController<P>, snapshot: &CycleSnapshot) -> Self {
        let current = controller.current_protection();
        let voltage = controller.voltage_protection();
        let decoder = controller.decoder();
        Self {
            snapshot: *snapshot,
            cycles: controller.cycles(),
            current_thresholds: *current.thresholds(),
            target_limit: current.target_limit(),
            current_faults: current.fault_count(),
            voltage_mode: voltage.mode(),
            voltage_thresholds: voltage.thresholds(),
            voltage_faults: voltage.fault_count(),
            slave_enabled: controller.config().features.slave_mode,
            signal: *decoder.state(),
            accepted_cycles: decoder.accepted_cycles(),
            since_last_signal: decoder.since_last_valid(snapshot.at, controller.tick_rate()),
            rejection: decoder.last_rejection(),
        }
    }
}

/// Renders the per-cycle summary line.
#[derive(Clone, Copy, Debug)]
pub struct SummaryFormatter<'a> {
    snapshot: &'a CycleSnapshot,
}

impl<'a> SummaryFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a CycleSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes e.g. `map=0.25bar supply=12.10V target=77.5% vout=9.40V i1=3.2A i2=3.4A limit=100% prot=NORMAL mode=LOCAL`.
    pub fn write_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        match snapshot.readings {
            Some(readings) => write!(
                writer,
                "map={:.2}bar supply={:.2}V",
                readings.pressure_bar, readings.supply.volts
            )?,
            None => writer.write_str("map=n/a supply=n/a")?,
        }
        write!(
            writer,
            " target={:.1}% vout={:.2}V",
            snapshot.target_fraction * 100.0,
            snapshot.output_voltage
        )?;
        match snapshot.readings {
            Some(readings) => write!(
                writer,
                " i1={:.1}A i2={:.1}A",
                readings.current_a[0], readings.current_a[1]
            )?,
            None => writer.write_str(" i1=n/a i2=n/a")?,
        }
        write!(
            writer,
            " limit={:.0}% prot={} mode={}",
            snapshot.output.limit * 100.0,
            snapshot.current_level,
            snapshot.mode
        )
    }
}

impl fmt::Display for SummaryFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_line(f)
    }
}

/// Renders the verbose periodic report.
#[derive(Clone, Copy, Debug)]
pub struct ReportFormatter<'a> {
    report: &'a StatusReport,
}

impl<'a> ReportFormatter<'a> {
    #[must_use]
    pub const fn new(report: &'a StatusReport) -> Self {
        Self { report }
    }

    /// Writes e.g. `uptime=+12.3s cycles=246 mode=LOCAL safety=inactive`.
    pub fn write_system_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = &self.report.snapshot;
        writer.write_str("uptime=")?;
        write_duration(writer, snapshot.uptime)?;
        write!(
            writer,
            " cycles={} mode={} safety={}",
            self.report.cycles,
            snapshot.mode,
            if snapshot.safety_active {
                "active"
            } else {
                "inactive"
            }
        )
    }

    /// Writes e.g. `current level=HIGH limit=75% target=60% faults=0 thresholds=25/30/35/40/45A hyst=2.0A`.
    pub fn write_current_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let report = self.report;
        let t = &report.current_thresholds;
        write!(
            writer,
            "current level={} limit={:.0}% target={:.0}% faults={} thresholds={:.0}/{:.0}/{:.0}/{:.0}/{:.0}A hyst={:.1}A",
            report.snapshot.current_level,
            report.snapshot.output.limit * 100.0,
            report.target_limit * 100.0,
            report.current_faults,
            t.warning_a,
            t.high_a,
            t.critical_a,
            t.fault_a,
            t.emergency_a,
            t.hysteresis_a
        )
    }

    /// Writes e.g. `voltage level=NORMAL mode=adaptive baseline=12.00V warn=8.40V crit=6.00V faults=0`.
    pub fn write_voltage_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let report = self.report;
        write!(
            writer,
            "voltage level={} mode={}",
            report.snapshot.voltage_level,
            match report.voltage_mode {
                VoltageProtectionMode::Adaptive => "adaptive",
                VoltageProtectionMode::SensorFaultOnly => "sensor-fault-only",
            }
        )?;
        match report.voltage_thresholds {
            Some(t) => write!(
                writer,
                " baseline={:.2}V warn={:.2}V crit={:.2}V",
                t.baseline_v, t.warning_v, t.critical_v
            )?,
            None => writer.write_str(" baseline=n/a")?,
        }
        write!(writer, " faults={}", report.voltage_faults)
    }

    /// Writes e.g. `signal valid=true freq=20.00Hz duty=24.0% period=50.0ms high=12.0ms accepted=3 last=+50ms`.
    pub fn write_signal_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let report = self.report;
        if !report.slave_enabled {
            return writer.write_str("signal disabled");
        }
        let signal = &report.signal;
        write!(
            writer,
            "signal valid={} freq={:.2}Hz duty={:.1}% period={:.1}ms high={:.1}ms accepted={} last=",
            signal.valid,
            signal.frequency_hz,
            signal.duty * 100.0,
            signal.period.as_secs_f32() * 1_000.0,
            signal.high.as_secs_f32() * 1_000.0,
            report.accepted_cycles
        )?;
        write_duration(writer, report.since_last_signal)?;
        if let Some(rejection) = report.rejection {
            write!(writer, " rejected=\"{rejection}\"")?;
        }
        Ok(())
    }

    /// Writes e.g. `output fraction=70.0% level=178 supply=12.00V vout=8.40V`.
    pub fn write_output_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = &self.report.snapshot;
        write!(
            writer,
            "output fraction={:.1}% level={} supply={:.2}V vout={:.2}V",
            snapshot.output.effective_fraction() * 100.0,
            snapshot.output.level,
            snapshot.supply_v,
            snapshot.output_voltage
        )
    }

    /// Writes every report line separated by `\n`.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_system_line(writer)?;
        writer.write_char('\n')?;
        self.write_current_line(writer)?;
        writer.write_char('\n')?;
        self.write_voltage_line(writer)?;
        writer.write_char('\n')?;
        self.write_signal_line(writer)?;
        writer.write_char('\n')?;
        self.write_output_line(writer)
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, value: Duration) -> fmt::Result {
    match value {
        value if value >= Duration::from_secs(1) => {
            let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        value if value >= Duration::from_millis(1) => {
            write!(writer, "+{}ms", value.as_millis())
        }
        value => write!(writer, "+{}us", value.as_micros()),
    }
}

#[cfg(feature = "alloc")]
mod render {
    use alloc::string::String;
    use core::fmt::Write as _;

    use super::{ReportFormatter, StatusReport, SummaryFormatter};
    use crate::control::CycleSnapshot;

    /// Summary line as an owned string.
    #[must_use]
    pub fn render_summary(snapshot: &CycleSnapshot) -> String {
        let mut line = String::new();
        let _ = SummaryFormatter::new(snapshot).write_line(&mut line);
        line
    }

    /// Verbose report as an owned, newline-separated string.
    #[must_use]
    pub fn render_report(report: &StatusReport) -> String {
        let mut text = String::new();
        let _ = ReportFormatter::new(report).write_all(&mut text);
        text
    }
}

#[cfg(feature = "alloc")]
pub use render::{render_report, render_summary};
