//! Decoder for the external duty-modulated command signal.
//!
//! One cycle is timed per control cycle: the high pulse, then the low pulse,
//! each bounded by an edge timeout. A cycle whose frequency falls inside the
//! accepted band marks the signal valid; validity lapses once no qualifying
//! cycle has been seen for the signal timeout. The last measured values are
//! kept after validity lapses so they can still be reported. Only the duty of
//! an accepted cycle is ever handed to the controller.

use core::fmt;
use core::time::Duration;

use crate::config::PwmInputConfig;
use crate::time::{TickRate, Ticks};

/// Which edge never arrived while timing a cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MissingEdge {
    High,
    Low,
}

/// Durations of one complete signal cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulseCycle {
    pub high: Duration,
    pub low: Duration,
}

impl PulseCycle {
    #[must_use]
    pub fn period(&self) -> Duration {
        self.high + self.low
    }
}

/// Blocking edge timer on the command input.
pub trait PulseTimer {
    /// Times one high pulse followed by one low pulse, waiting at most
    /// `edge_timeout` for each.
    fn measure_cycle(&mut self, edge_timeout: Duration) -> Result<PulseCycle, MissingEdge>;
}

/// Input that never toggles.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSignal;

impl PulseTimer for NoSignal {
    fn measure_cycle(&mut self, _: Duration) -> Result<PulseCycle, MissingEdge> {
        Err(MissingEdge::High)
    }
}

/// Why the most recent measurement did not qualify.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Rejection {
    NoHighPulse,
    NoLowPulse,
    OutOfBand { frequency_hz: f32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoHighPulse => f.write_str("no high pulse"),
            Rejection::NoLowPulse => f.write_str("no low pulse"),
            Rejection::OutOfBand { frequency_hz } => {
                write!(f, "out of band ({frequency_hz:.2} Hz)")
            }
        }
    }
}

/// Last measured values and validity. The measurements may come from a
/// rejected cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignalState {
    pub period: Duration,
    pub high: Duration,
    pub frequency_hz: f32,
    pub duty: f32,
    pub valid: bool,
}

impl SignalState {
    const IDLE: Self = Self {
        period: Duration::ZERO,
        high: Duration::ZERO,
        frequency_hz: 0.0,
        duty: 0.0,
        valid: false,
    };
}

/// Validity edge reported by [`SignalDecoder::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignalEvent {
    Acquired,
    Lost,
}

pub struct SignalDecoder {
    config: PwmInputConfig,
    state: SignalState,
    accepted_duty: f32,
    last_valid_at: Ticks,
    accepted: u32,
    last_rejection: Option<Rejection>,
}

impl SignalDecoder {
    #[must_use]
    pub const fn new(config: PwmInputConfig, now: Ticks) -> Self {
        Self {
            config,
            state: SignalState::IDLE,
            accepted_duty: 0.0,
            last_valid_at: now,
            accepted: 0,
            last_rejection: None,
        }
    }

    /// Times one cycle on `timer` and updates validity.
    pub fn poll<T: PulseTimer>(
        &mut self,
        timer: &mut T,
        now: Ticks,
        rate: &TickRate,
    ) -> Option<SignalEvent> {
        let measured = timer.measure_cycle(self.config.edge_timeout);
        self.process(measured, now, rate)
    }

    /// Folds one measurement outcome into the decoder state.
    pub fn process(
        &mut self,
        measured: Result<PulseCycle, MissingEdge>,
        now: Ticks,
        rate: &TickRate,
    ) -> Option<SignalEvent> {
        let was_valid = self.state.valid;

        match measured {
            Ok(cycle) => self.accept_or_reject(cycle, now),
            Err(MissingEdge::High) => self.last_rejection = Some(Rejection::NoHighPulse),
            Err(MissingEdge::Low) => self.last_rejection = Some(Rejection::NoLowPulse),
        }

        if rate.has_elapsed(self.last_valid_at, now, self.config.signal_timeout) {
            self.state.valid = false;
        }

        match (was_valid, self.state.valid) {
            (false, true) => Some(SignalEvent::Acquired),
            (true, false) => Some(SignalEvent::Lost),
            _ => None,
        }
    }

    fn accept_or_reject(&mut self, cycle: PulseCycle, now: Ticks) {
        let period = cycle.period();
        let period_s = period.as_secs_f32();
        if period.is_zero() {
            self.last_rejection = Some(Rejection::NoLowPulse);
            return;
        }

        let frequency_hz = 1.0 / period_s;
        let duty = (cycle.high.as_secs_f32() / period_s).clamp(0.0, 1.0);
        self.state.period = period;
        self.state.high = cycle.high;
        self.state.frequency_hz = frequency_hz;
        self.state.duty = duty;

        if frequency_hz >= self.config.min_frequency_hz
            && frequency_hz <= self.config.max_frequency_hz
        {
            self.state.valid = true;
            self.accepted_duty = duty;
            self.last_valid_at = now;
            self.accepted = self.accepted.saturating_add(1);
            self.last_rejection = None;
        } else {
            self.last_rejection = Some(Rejection::OutOfBand { frequency_hz });
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SignalState {
        &self.state
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.state.valid
    }

    /// Duty of the last accepted cycle, in `[0, 1]`.
    #[must_use]
    pub const fn duty(&self) -> f32 {
        self.accepted_duty
    }

    /// Cycles accepted since boot.
    #[must_use]
    pub const fn accepted_cycles(&self) -> u32 {
        self.accepted
    }

    #[must_use]
    pub const fn last_rejection(&self) -> Option<Rejection> {
        self.last_rejection
    }

    /// Wall-clock time since the last accepted cycle (or since start).
    #[must_use]
    pub fn since_last_valid(&self, now: Ticks, rate: &TickRate) -> Duration {
        rate.elapsed(self.last_valid_at, now)
    }
}
