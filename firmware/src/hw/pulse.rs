//! Edge timing on the external command input.
//!
//! Busy-waits on the pin level against the embassy clock. Each wait is bounded
//! by the edge timeout, so a dead input costs one timeout per cycle.

use core::time::Duration as CoreDuration;

use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Instant};
use pump_core::pwm_input::{MissingEdge, PulseCycle};

pub struct PulseInput<'d> {
    pin: Input<'d>,
}

impl<'d> PulseInput<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }

    /// Times one high pulse and the low pulse that follows it.
    pub fn measure_cycle(&mut self, edge_timeout: CoreDuration) -> Result<PulseCycle, MissingEdge> {
        let timeout =
            Duration::from_micros(u64::try_from(edge_timeout.as_micros()).unwrap_or(u64::MAX));

        // Start from a low level so the next rising edge begins a full pulse.
        let start = Instant::now();
        self.wait_for(false, start + timeout).ok_or(MissingEdge::High)?;
        let rise = self
            .wait_for(true, Instant::now() + timeout)
            .ok_or(MissingEdge::High)?;
        let fall = self
            .wait_for(false, rise + timeout)
            .ok_or(MissingEdge::Low)?;
        let next_rise = self
            .wait_for(true, fall + timeout)
            .ok_or(MissingEdge::Low)?;

        Ok(PulseCycle {
            high: to_core(fall - rise),
            low: to_core(next_rise - fall),
        })
    }

    fn wait_for(&self, high: bool, deadline: Instant) -> Option<Instant> {
        loop {
            let now = Instant::now();
            if self.pin.is_high() == high {
                return Some(now);
            }
            if now >= deadline {
                return None;
            }
        }
    }
}

fn to_core(duration: Duration) -> CoreDuration {
    CoreDuration::from_micros(duration.as_micros())
}
