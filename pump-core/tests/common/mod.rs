#![allow(dead_code)]

use core::time::Duration;

use pump_core::actuator::PowerStage;
use pump_core::config::ControllerConfig;
use pump_core::control::{CycleSnapshot, PumpController, SafetyInput};
use pump_core::pwm_input::{MissingEdge, PulseCycle, PulseTimer};
use pump_core::sensors::current::amps_to_voltage;
use pump_core::sensors::pressure::gauge_bar_to_voltage;
use pump_core::sensors::{AnalogChannel, AnalogInputs, SampleDelay, volts_to_counts};
use pump_core::time::{TickRate, Ticks};

pub const RATE: TickRate = TickRate::nominal(1_000);
pub const CYCLE_MS: u64 = 50;

/// Plant whose sensor outputs are set in engineering units.
pub struct MockBoard {
    pub config: ControllerConfig,
    pub pressure_bar: f32,
    pub current_a: [f32; 2],
    pub supply_v: f32,
    pub safety_asserted: bool,
    pub pulse: Option<PulseCycle>,
    pub pulse_polls: usize,
}

impl MockBoard {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            pressure_bar: 0.0,
            current_a: [0.0; 2],
            supply_v: 12.0,
            safety_asserted: false,
            pulse: None,
            pulse_polls: 0,
        }
    }

    pub fn set_current(&mut self, amps: f32) {
        self.current_a = [amps, amps];
    }

    pub fn set_signal(&mut self, frequency_hz: f32, duty: f32) {
        let period = Duration::from_secs_f32(1.0 / frequency_hz);
        let high = period.mul_f32(duty);
        self.pulse = Some(PulseCycle {
            high,
            low: period - high,
        });
    }
}

impl AnalogInputs for MockBoard {
    fn read(&mut self, channel: AnalogChannel) -> u16 {
        let volts = match channel {
            AnalogChannel::Pressure => gauge_bar_to_voltage(self.pressure_bar, &self.config.pressure),
            AnalogChannel::CurrentA => {
                amps_to_voltage(self.current_a[0], &self.config.current_sensor)
            }
            AnalogChannel::CurrentB => {
                amps_to_voltage(self.current_a[1], &self.config.current_sensor)
            }
            AnalogChannel::Supply => self.supply_v * self.config.voltage.divider_ratio,
        };
        volts_to_counts(volts, &self.config.adc)
    }
}

impl SampleDelay for MockBoard {
    fn delay_us(&mut self, _: u32) {}
}

impl PulseTimer for MockBoard {
    fn measure_cycle(&mut self, _: Duration) -> Result<PulseCycle, MissingEdge> {
        self.pulse_polls += 1;
        self.pulse.ok_or(MissingEdge::High)
    }
}

impl SafetyInput for MockBoard {
    fn safety_pin_high(&mut self) -> bool {
        let active_high = self.config.features.safety_active_high;
        if self.safety_asserted {
            active_high
        } else {
            !active_high
        }
    }
}

/// Power stage remembering every level written.
#[derive(Default)]
pub struct RecordingStage {
    pub writes: Vec<u16>,
}

impl PowerStage for RecordingStage {
    fn max_level(&self) -> u16 {
        1_000
    }

    fn write_level(&mut self, level: u16) {
        self.writes.push(level);
    }
}

/// Controller plus board advanced in fixed steps.
pub struct Rig {
    pub controller: PumpController<RecordingStage>,
    pub board: MockBoard,
    pub now: Ticks,
}

impl Rig {
    pub fn new(config: ControllerConfig) -> Self {
        let controller = PumpController::new(config, RecordingStage::default(), RATE, Ticks(0))
            .expect("valid configuration");
        Self {
            controller,
            board: MockBoard::new(config),
            now: Ticks(0),
        }
    }

    /// Rig past the startup hold with a settled local-mode output.
    pub fn started(config: ControllerConfig) -> Self {
        let mut rig = Self::new(config);
        rig.run(12);
        rig
    }

    pub fn step(&mut self) -> CycleSnapshot {
        self.now = self.now + CYCLE_MS;
        self.controller.run_cycle(&mut self.board, self.now)
    }

    pub fn run(&mut self, cycles: usize) -> CycleSnapshot {
        let mut last = self.step();
        for _ in 1..cycles {
            last = self.step();
        }
        last
    }

    pub fn last_written(&self) -> Option<u16> {
        self.controller.actuator().stage().writes.last().copied()
    }
}
