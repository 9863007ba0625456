use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use pump_core::actuator::PowerStage;
use pump_core::config::{ConfigError, ControllerConfig};
use pump_core::control::{CycleSnapshot, PumpController, SafetyInput};
use pump_core::diagnostics::{StatusReport, render_report, render_summary};
use pump_core::pwm_input::{MissingEdge, PulseCycle, PulseTimer};
use pump_core::sensors::current::amps_to_voltage;
use pump_core::sensors::pressure::gauge_bar_to_voltage;
use pump_core::sensors::{AnalogChannel, AnalogInputs, SampleDelay, volts_to_counts};
use pump_core::telemetry::EventId;
use pump_core::time::{TickRate, Ticks};

use crate::console::{self, Command, CurrentChannel, Keyword, PwmSetting, StepAmount};

/// Simulated monotonic counter: a 1 kHz timer whose prescaler was reduced
/// 64-fold, so it counts 64 000 ticks per second.
pub const SIM_RATE: TickRate = TickRate::with_prescaler_factor(1_000, 64);

/// Resolution of the simulated power stage.
const STAGE_MAX_LEVEL: u16 = 1_000;

/// Upper bound on cycles a single `step` may run.
const MAX_STEP_CYCLES: u32 = 72_000;

/// Board model whose sensor outputs are set from the console.
#[derive(Clone, Debug)]
pub struct SimulatedPlant {
    config: ControllerConfig,
    pub pressure_bar: f32,
    pub current_a: [f32; 2],
    pub supply_v: f32,
    pub safety_asserted: bool,
    pub signal: Option<PulseCycle>,
}

impl SimulatedPlant {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            pressure_bar: 0.0,
            current_a: [0.0; 2],
            supply_v: config.output.nominal_supply_v,
            safety_asserted: false,
            signal: None,
        }
    }
}

impl AnalogInputs for SimulatedPlant {
    fn read(&mut self, channel: AnalogChannel) -> u16 {
        let volts = match channel {
            AnalogChannel::Pressure => gauge_bar_to_voltage(self.pressure_bar, &self.config.pressure),
            AnalogChannel::CurrentA => amps_to_voltage(self.current_a[0], &self.config.current_sensor),
            AnalogChannel::CurrentB => amps_to_voltage(self.current_a[1], &self.config.current_sensor),
            AnalogChannel::Supply => self.supply_v * self.config.voltage.divider_ratio,
        };
        volts_to_counts(volts, &self.config.adc)
    }
}

impl SampleDelay for SimulatedPlant {
    fn delay_us(&mut self, _: u32) {}
}

impl PulseTimer for SimulatedPlant {
    fn measure_cycle(&mut self, _: Duration) -> Result<PulseCycle, MissingEdge> {
        self.signal.ok_or(MissingEdge::High)
    }
}

impl SafetyInput for SimulatedPlant {
    fn safety_pin_high(&mut self) -> bool {
        self.safety_asserted == self.config.features.safety_active_high
    }
}

/// Power stage that keeps the last physical level written.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostPowerStage {
    pub level: u16,
    pub writes: u64,
}

impl PowerStage for HostPowerStage {
    fn max_level(&self) -> u16 {
        STAGE_MAX_LEVEL
    }

    fn write_level(&mut self, level: u16) {
        self.level = level;
        self.writes += 1;
    }
}

pub struct Session {
    controller: PumpController<HostPowerStage>,
    plant: SimulatedPlant,
    now: Ticks,
    cycle_ticks: u64,
    event_cursor: EventId,
    last: Option<CycleSnapshot>,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        let now = Ticks::ZERO;
        let controller = PumpController::new(config, HostPowerStage::default(), SIM_RATE, now)?;
        let cycle_ticks = SIM_RATE
            .duration_to_ticks(config.timing.control_interval)
            .max(1);

        Ok(Self {
            controller,
            plant: SimulatedPlant::new(config),
            now,
            cycle_ticks,
            event_cursor: 0,
            last: None,
            transcript: None,
        })
    }

    /// Mirrors every console exchange into `path`.
    pub fn with_transcript(mut self, path: &Path, header: &str) -> io::Result<Self> {
        self.transcript = Some(TranscriptLogger::new(path, header)?);
        Ok(self)
    }

    pub fn controller(&self) -> &PumpController<HostPowerStage> {
        &self.controller
    }

    pub fn plant(&self) -> &SimulatedPlant {
        &self.plant
    }

    pub fn last_snapshot(&self) -> Option<&CycleSnapshot> {
        self.last.as_ref()
    }

    /// Simulated time since the session started.
    pub fn uptime(&self) -> Duration {
        self.controller.uptime(self.now)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.uptime();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let lines = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR {err}")],
        };

        if let Some(transcript) = self.transcript.as_mut() {
            for line in &lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        match command {
            Command::Pressure(bar) => {
                self.plant.pressure_bar = bar;
                vec![format!("OK pressure {bar:.3}bar")]
            }
            Command::Current { channel, amps } => {
                match channel {
                    Some(CurrentChannel::A) => self.plant.current_a[0] = amps,
                    Some(CurrentChannel::B) => self.plant.current_a[1] = amps,
                    None => self.plant.current_a = [amps, amps],
                }
                let [a, b] = self.plant.current_a;
                vec![format!("OK current a={a:.1}A b={b:.1}A")]
            }
            Command::Supply(volts) => {
                self.plant.supply_v = volts;
                vec![format!("OK supply {volts:.2}V")]
            }
            Command::Safety(asserted) => {
                self.plant.safety_asserted = asserted;
                let state = if asserted { "asserted" } else { "released" };
                vec![format!("OK safety {state}")]
            }
            Command::Pwm(setting) => self.set_signal(setting),
            Command::Step(amount) => self.step(amount),
            Command::Status => match self.last.as_ref() {
                Some(snapshot) => vec![render_summary(snapshot)],
                None => vec!["no cycles run yet".to_string()],
            },
            Command::Report => match self.last.as_ref() {
                Some(snapshot) => {
                    let report = StatusReport::capture(&self.controller, snapshot);
                    render_report(&report).lines().map(str::to_string).collect()
                }
                None => vec!["no cycles run yet".to_string()],
            },
            Command::Events => {
                let telemetry = self.controller.telemetry();
                if telemetry.is_empty() {
                    vec!["no events recorded".to_string()]
                } else {
                    telemetry
                        .oldest_first()
                        .map(|record| format!("EVT {record}"))
                        .collect()
                }
            }
            Command::Help(topic) => help(topic),
        }
    }

    fn set_signal(&mut self, setting: Option<PwmSetting>) -> Vec<String> {
        let Some(setting) = setting else {
            self.plant.signal = None;
            return vec!["OK pwm off".to_string()];
        };

        if setting.frequency_hz <= 0.0 || !(0.0..=100.0).contains(&setting.duty_percent) {
            return vec!["ERR pwm needs a positive frequency and a duty of 0-100%".to_string()];
        }

        let Ok(period) = Duration::try_from_secs_f32(1.0 / setting.frequency_hz) else {
            return vec![format!(
                "ERR pwm period of {} Hz is out of range",
                setting.frequency_hz
            )];
        };
        let high = period.mul_f32(setting.duty_percent / 100.0);
        self.plant.signal = Some(PulseCycle {
            high,
            low: period.saturating_sub(high),
        });
        vec![format!(
            "OK pwm {:.1}Hz duty={:.1}%",
            setting.frequency_hz, setting.duty_percent
        )]
    }

    fn step(&mut self, amount: StepAmount) -> Vec<String> {
        let cycles = match amount {
            StepAmount::Cycles(count) => count,
            StepAmount::Time(duration) => {
                let ticks = SIM_RATE.duration_to_ticks(duration);
                u32::try_from(ticks.div_ceil(self.cycle_ticks)).unwrap_or(u32::MAX)
            }
        };
        if cycles > MAX_STEP_CYCLES {
            return vec![format!("ERR step limited to {MAX_STEP_CYCLES} cycles")];
        }

        let mut lines = Vec::new();
        for _ in 0..cycles {
            self.run_cycle();
            lines.extend(self.drain_events());
        }

        match self.last.as_ref() {
            Some(snapshot) => lines.push(render_summary(snapshot)),
            None => lines.push("OK step 0 cycles".to_string()),
        }
        lines
    }

    /// Advances the simulated clock one control interval and runs a cycle.
    pub fn run_cycle(&mut self) -> CycleSnapshot {
        self.now = self.now + self.cycle_ticks;
        let snapshot = self.controller.run_cycle(&mut self.plant, self.now);
        self.last = Some(snapshot);
        snapshot
    }

    fn drain_events(&mut self) -> Vec<String> {
        let telemetry = self.controller.telemetry();
        let lines: Vec<String> = telemetry
            .since(self.event_cursor)
            .map(|record| format!("EVT {record}"))
            .collect();
        self.event_cursor = telemetry.next_event_id();
        lines
    }
}

fn help(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match Keyword::lookup(target) {
            Some(keyword) => vec![keyword.usage().to_string()],
            None => vec![
                format!("No help available for `{target}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(
                Keyword::ALL
                    .into_iter()
                    .map(|keyword| format!("  {}", keyword.usage())),
            );
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    Keyword::ALL
        .into_iter()
        .map(Keyword::name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        writeln!(logger.writer, "# {header}")?;
        writeln!(
            logger.writer,
            "# Timestamps are simulated milliseconds since power-on"
        )?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_core::control::OperatingMode;
    use pump_core::protection::ProtectionLevel;

    fn session() -> Session {
        Session::new(ControllerConfig::DEFAULT).expect("default configuration is valid")
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("no transcript attached")
    }

    #[test]
    fn clock_advances_one_interval_per_cycle() {
        let mut session = session();
        assert_eq!(session.cycle_ticks, 3_200);
        run(&mut session, "step 10");
        assert_eq!(session.uptime(), Duration::from_millis(500));
        // One write when the stage is taken over, then one per cycle.
        assert_eq!(session.controller().actuator().stage().writes, 11);
    }

    #[test]
    fn step_by_time_rounds_up_to_whole_cycles() {
        let mut session = session();
        run(&mut session, "step 120ms");
        assert_eq!(session.controller().cycles(), 3);
    }

    #[test]
    fn startup_then_local_mode_reports_events() {
        let mut session = session();
        run(&mut session, "pressure 0.3");
        let lines = run(&mut session, "step 1s");

        let events: Vec<_> = lines.iter().filter(|line| line.starts_with("EVT")).collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("mode LOCAL"), "{}", events[0]);

        let summary = lines.last().expect("summary line");
        assert!(summary.contains("mode=LOCAL"), "{summary}");
        assert_eq!(session.controller().mode(), OperatingMode::Local);
    }

    #[test]
    fn overcurrent_reaches_emergency_and_cuts_output() {
        let mut session = session();
        run(&mut session, "pressure 0.5");
        run(&mut session, "step 1s");
        run(&mut session, "current 46");
        let lines = run(&mut session, "step 1s");

        assert!(lines.iter().any(|line| line.contains("current-level EMERGENCY")));
        let snapshot = session.last_snapshot().expect("ran cycles");
        assert_eq!(snapshot.current_level, ProtectionLevel::Emergency);
        assert_eq!(snapshot.output.level, 0);
        assert_eq!(session.controller().actuator().stage().level, 0);
    }

    #[test]
    fn slave_mode_follows_the_command_signal() {
        let mut session = session();
        run(&mut session, "step 1s");
        assert_eq!(run(&mut session, "pwm 20 60"), ["OK pwm 20.0Hz duty=60.0%"]);
        run(&mut session, "step");

        let snapshot = session.last_snapshot().expect("ran cycles");
        assert_eq!(snapshot.mode, OperatingMode::Slave);
        let level = i32::from(snapshot.output.level);
        assert!((level - 600).abs() <= 1, "level {level}");

        run(&mut session, "pwm off");
        let lines = run(&mut session, "step 1s");
        assert!(lines.iter().any(|line| line.contains("signal-lost")));
        assert_eq!(session.controller().mode(), OperatingMode::Local);
    }

    #[test]
    fn safety_forces_output_off() {
        let mut session = session();
        run(&mut session, "pressure 1");
        run(&mut session, "step 1s");
        assert!(session.controller().actuator().stage().level > 0);

        assert_eq!(run(&mut session, "safety on"), ["OK safety asserted"]);
        run(&mut session, "step");
        assert_eq!(session.controller().mode(), OperatingMode::Safety);
        assert_eq!(session.controller().actuator().stage().level, 0);
    }

    #[test]
    fn report_and_status_need_a_cycle() {
        let mut session = session();
        assert_eq!(run(&mut session, "status"), ["no cycles run yet"]);
        run(&mut session, "step");
        let report = run(&mut session, "report");
        assert_eq!(report.len(), 5);
        assert_eq!(run(&mut session, "status").len(), 1);
    }

    #[test]
    fn errors_and_help_are_reported_inline() {
        let mut session = session();
        let lines = run(&mut session, "pwm 0 50");
        assert!(lines[0].starts_with("ERR pwm"), "{}", lines[0]);
        let lines = run(&mut session, "pwm 1e-39 50");
        assert!(lines[0].starts_with("ERR pwm period"), "{}", lines[0]);
        assert!(session.plant().signal.is_none());
        let lines = run(&mut session, "bogus");
        assert!(lines[0].starts_with("ERR unknown command"), "{}", lines[0]);
        let lines = run(&mut session, "help");
        assert_eq!(lines.len(), Keyword::ALL.len() + 2);
        let lines = run(&mut session, "help nothing");
        assert!(lines[1].contains("pressure, current"));
    }
}
