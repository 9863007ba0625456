//! Fixed-rate control loop arbitration.
//!
//! [`PumpController`] owns every component and runs one cycle per call to
//! [`PumpController::run_cycle`]. Priority within a cycle:
//!
//! 1. External safety asserted: output forced to zero immediately and the rest
//!    of the cycle is skipped.
//! 2. Sensors sampled; voltage and current protection updated.
//! 3. Startup hold: output held at zero until the hold time has passed.
//! 4. Slave mode with a valid command signal: decoded duty, through the limit.
//! 5. Local mode: pressure map, through the limit.

pub mod map;

pub use map::pressure_to_fraction;

use core::fmt;
use core::time::Duration;

use crate::actuator::{ActuatorControl, OutputCommand, PowerStage};
use crate::config::{ConfigError, ControllerConfig};
use crate::protection::{CurrentProtection, ProtectionLevel, VoltageLevel, VoltageProtection};
use crate::pwm_input::{PulseTimer, SignalDecoder, SignalEvent};
use crate::sensors::{AnalogInputs, SampleDelay, SensorBank, SensorReadings};
use crate::telemetry::{SignalTelemetry, TelemetryRecorder};
use crate::time::{TickRate, Ticks};

/// Digital safety input.
pub trait SafetyInput {
    /// Raw pin level, `true` when high.
    fn safety_pin_high(&mut self) -> bool;
}

/// Everything one control cycle touches on the board.
pub trait ControllerIo: AnalogInputs + SampleDelay + PulseTimer + SafetyInput {}

impl<T> ControllerIo for T where T: AnalogInputs + SampleDelay + PulseTimer + SafetyInput {}

/// Which branch of the arbiter produced the output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperatingMode {
    Startup,
    Local,
    Slave,
    Safety,
}

impl OperatingMode {
    pub const ALL: [Self; 4] = [Self::Startup, Self::Local, Self::Slave, Self::Safety];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "STARTUP",
            Self::Local => "LOCAL",
            Self::Slave => "SLAVE",
            Self::Safety => "SAFETY",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State observed at the end of one cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CycleSnapshot {
    pub at: Ticks,
    pub uptime: Duration,
    pub mode: OperatingMode,
    pub safety_active: bool,
    /// Most recent sensor readings; not refreshed while safety is asserted.
    pub readings: Option<SensorReadings>,
    /// Output fraction requested before the current limit.
    pub target_fraction: f32,
    pub output: OutputCommand,
    pub output_voltage: f32,
    /// Supply voltage the actuator scales against.
    pub supply_v: f32,
    pub current_level: ProtectionLevel,
    pub voltage_level: VoltageLevel,
    /// Set once per report interval.
    pub report_due: bool,
}

pub struct PumpController<P> {
    config: ControllerConfig,
    rate: TickRate,
    sensors: SensorBank,
    actuator: ActuatorControl<P>,
    current: CurrentProtection,
    voltage: VoltageProtection,
    decoder: SignalDecoder,
    telemetry: TelemetryRecorder,
    mode: OperatingMode,
    mode_since: Ticks,
    started_at: Ticks,
    last_report: Ticks,
    readings: Option<SensorReadings>,
    target: f32,
    cycles: u64,
}

impl<P: PowerStage> PumpController<P> {
    /// Validates `config`, drives the outputs off and starts the startup hold.
    pub fn new(
        config: ControllerConfig,
        stage: P,
        rate: TickRate,
        now: Ticks,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            sensors: SensorBank::new(&config),
            actuator: ActuatorControl::new(stage, config.output),
            current: CurrentProtection::new(&config.current_protection, &config.features, now),
            voltage: VoltageProtection::new(config.voltage, now),
            decoder: SignalDecoder::new(config.pwm_input, now),
            telemetry: TelemetryRecorder::new(),
            mode: OperatingMode::Startup,
            mode_since: now,
            started_at: now,
            last_report: now,
            readings: None,
            target: 0.0,
            cycles: 0,
            config,
            rate,
        })
    }

    /// Runs one control cycle against `io` at time `now`.
    pub fn run_cycle<I: ControllerIo>(&mut self, io: &mut I, now: Ticks) -> CycleSnapshot {
        self.cycles = self.cycles.wrapping_add(1);

        if self.safety_asserted(io) {
            self.actuator.force_off();
            self.target = 0.0;
            self.enter_mode(OperatingMode::Safety, now);
            return self.snapshot(now, true);
        }

        let readings = self.sensors.sample(io);
        self.readings = Some(readings);

        let voltage = self.voltage.update(readings.supply, now, &self.rate);
        if let Some(transition) = voltage.transition {
            self.telemetry.record_voltage_transition(transition);
        }
        if readings.supply.valid {
            self.actuator.update_supply_voltage(readings.supply.volts);
        }

        let current = self.current.update(readings.max_current(), now, &self.rate);
        if let Some(transition) = current.transition {
            self.telemetry.record_current_transition(transition);
        }

        if self.config.features.slave_mode
            && let Some(event) = self.decoder.poll(io, now, &self.rate)
        {
            let state = self.decoder.state();
            self.telemetry.record_signal(
                event == SignalEvent::Acquired,
                SignalTelemetry {
                    frequency_hz: state.frequency_hz,
                    duty: state.duty,
                },
                now,
            );
        }

        let (mode, target) = if !self.startup_complete(now) {
            (OperatingMode::Startup, 0.0)
        } else if self.config.features.slave_mode && self.decoder.is_valid() {
            (OperatingMode::Slave, self.decoder.duty())
        } else {
            (
                OperatingMode::Local,
                pressure_to_fraction(readings.pressure_bar, &self.config.pressure),
            )
        };

        self.enter_mode(mode, now);
        self.target = target;
        self.actuator.drive(target, current.limit);

        self.snapshot(now, false)
    }

    fn safety_asserted<I: SafetyInput>(&self, io: &mut I) -> bool {
        let features = &self.config.features;
        features.external_safety && io.safety_pin_high() == features.safety_active_high
    }

    fn startup_complete(&self, now: Ticks) -> bool {
        self.rate
            .has_elapsed(self.started_at, now, self.config.timing.startup_hold)
    }

    fn enter_mode(&mut self, mode: OperatingMode, now: Ticks) {
        if mode == self.mode {
            return;
        }
        let time_in_previous = self.rate.elapsed(self.mode_since, now);
        self.telemetry
            .record_mode_change(self.mode, mode, time_in_previous, now);
        self.mode = mode;
        self.mode_since = now;
    }

    fn snapshot(&mut self, now: Ticks, safety_active: bool) -> CycleSnapshot {
        let report_due = self
            .rate
            .has_elapsed(self.last_report, now, self.config.timing.report_interval);
        if report_due {
            self.last_report = now;
        }

        CycleSnapshot {
            at: now,
            uptime: self.uptime(now),
            mode: self.mode,
            safety_active,
            readings: self.readings,
            target_fraction: self.target,
            output: self.actuator.command(),
            output_voltage: self.actuator.output_voltage(),
            supply_v: self.actuator.supply_voltage(),
            current_level: self.current.level(),
            voltage_level: self.voltage.level(),
            report_due,
        }
    }

    #[must_use]
    pub fn uptime(&self, now: Ticks) -> Duration {
        self.rate.elapsed(self.started_at, now)
    }

    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick_rate(&self) -> &TickRate {
        &self.rate
    }

    #[must_use]
    pub const fn mode(&self) -> OperatingMode {
        self.mode
    }

    #[must_use]
    pub const fn current_protection(&self) -> &CurrentProtection {
        &self.current
    }

    #[must_use]
    pub const fn voltage_protection(&self) -> &VoltageProtection {
        &self.voltage
    }

    #[must_use]
    pub const fn decoder(&self) -> &SignalDecoder {
        &self.decoder
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    #[must_use]
    pub const fn actuator(&self) -> &ActuatorControl<P> {
        &self.actuator
    }

    /// Cycles run since construction.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }
}
