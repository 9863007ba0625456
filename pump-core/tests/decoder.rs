use core::time::Duration;
use std::collections::VecDeque;

use pump_core::config::ControllerConfig;
use pump_core::pwm_input::{
    MissingEdge, PulseCycle, PulseTimer, Rejection, SignalDecoder, SignalEvent,
};
use pump_core::time::{TickRate, Ticks};

/// Timer replaying a fixed list of measurement outcomes.
struct ScriptedTimer {
    script: VecDeque<Result<PulseCycle, MissingEdge>>,
    timeouts: Vec<Duration>,
}

impl ScriptedTimer {
    fn new(script: impl IntoIterator<Item = Result<PulseCycle, MissingEdge>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            timeouts: Vec::new(),
        }
    }
}

impl PulseTimer for ScriptedTimer {
    fn measure_cycle(&mut self, edge_timeout: Duration) -> Result<PulseCycle, MissingEdge> {
        self.timeouts.push(edge_timeout);
        self.script.pop_front().unwrap_or(Err(MissingEdge::High))
    }
}

fn cycle(high_ms: u64, low_ms: u64) -> Result<PulseCycle, MissingEdge> {
    Ok(PulseCycle {
        high: Duration::from_millis(high_ms),
        low: Duration::from_millis(low_ms),
    })
}

#[test]
fn polls_with_configured_edge_timeout() {
    let config = ControllerConfig::DEFAULT.pwm_input;
    let rate = TickRate::nominal(1_000);
    let mut decoder = SignalDecoder::new(config, Ticks(0));
    let mut timer = ScriptedTimer::new([cycle(25, 25)]);

    assert_eq!(
        decoder.poll(&mut timer, Ticks(50), &rate),
        Some(SignalEvent::Acquired)
    );
    assert_eq!(timer.timeouts, [config.edge_timeout]);
    assert_eq!(decoder.accepted_cycles(), 1);
}

#[test]
fn rejection_reasons_are_reported() {
    let rate = TickRate::nominal(1_000);
    let mut decoder = SignalDecoder::new(ControllerConfig::DEFAULT.pwm_input, Ticks(0));
    let mut timer = ScriptedTimer::new([
        Err(MissingEdge::High),
        Err(MissingEdge::Low),
        cycle(5, 5),
        cycle(30, 20),
    ]);

    decoder.poll(&mut timer, Ticks(50), &rate);
    assert_eq!(decoder.last_rejection(), Some(Rejection::NoHighPulse));
    decoder.poll(&mut timer, Ticks(100), &rate);
    assert_eq!(decoder.last_rejection(), Some(Rejection::NoLowPulse));
    decoder.poll(&mut timer, Ticks(150), &rate);
    match decoder.last_rejection() {
        Some(Rejection::OutOfBand { frequency_hz }) => {
            assert!(frequency_hz > 99.0 && frequency_hz < 101.0);
        }
        other => panic!("unexpected rejection {other:?}"),
    }
    assert!(!decoder.is_valid());

    let event = decoder.poll(&mut timer, Ticks(200), &rate);
    assert_eq!(event, Some(SignalEvent::Acquired));
    assert_eq!(decoder.last_rejection(), None);
    let duty = decoder.duty();
    assert!(duty > 0.599 && duty < 0.601);
}

#[test]
fn timeout_is_measured_in_wall_clock_time_under_a_prescaled_clock() {
    // Counter sped up 64 times: 64 000 ticks per wall-clock second.
    let rate = TickRate::with_prescaler_factor(1_000, 64);
    let mut decoder = SignalDecoder::new(ControllerConfig::DEFAULT.pwm_input, Ticks(0));

    assert_eq!(
        decoder.process(cycle(10, 40), Ticks(64), &rate),
        Some(SignalEvent::Acquired)
    );

    // 31 936 ticks = 499 ms: still inside the 500 ms window.
    let inside = Ticks(64 + 31_936);
    assert_eq!(decoder.process(Err(MissingEdge::High), inside, &rate), None);
    assert!(decoder.is_valid());
    assert_eq!(
        decoder.since_last_valid(inside, &rate),
        Duration::from_millis(499)
    );

    // 32 000 ticks = 500 ms.
    assert_eq!(
        decoder.process(Err(MissingEdge::High), Ticks(64 + 32_000), &rate),
        Some(SignalEvent::Lost)
    );
    assert!(!decoder.is_valid());

    // Last measured values survive loss of validity.
    let duty = decoder.state().duty;
    assert!(duty > 0.199 && duty < 0.201);
}

#[test]
fn only_in_band_periods_are_accepted() {
    let rate = TickRate::nominal(1_000);
    let config = ControllerConfig::DEFAULT.pwm_input;

    for period_ms in [40_u64, 66] {
        let mut decoder = SignalDecoder::new(config, Ticks(0));
        decoder.process(cycle(period_ms / 2, period_ms - period_ms / 2), Ticks(10), &rate);
        assert!(decoder.is_valid(), "period {period_ms} ms");
    }

    let mut decoder = SignalDecoder::new(config, Ticks(0));
    decoder.process(cycle(35, 35), Ticks(10), &rate);
    assert!(!decoder.is_valid());
}
