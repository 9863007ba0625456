use embassy_time::{Duration, Ticker};
use pump_core::indicator::{IndicatorInput, StatusIndicator, pattern_for};
use pump_core::protection::CurrentThresholds;

use super::{INDICATOR, TICK_RATE, now};
use crate::hw::RgbLed;

/// Refresh period; short against the fastest 100 ms blink.
const REFRESH: Duration = Duration::from_millis(25);

#[embassy_executor::task]
pub async fn run(mut led: RgbLed<'static>, thresholds: CurrentThresholds) -> ! {
    let mut indicator = StatusIndicator::new(now());
    let mut input = IndicatorInput::Current {
        amps: 0.0,
        in_fault: false,
        in_emergency: false,
    };
    let mut ticker = Ticker::every(REFRESH);

    loop {
        if let Some(latest) = INDICATOR.try_take() {
            input = latest;
        }
        let color = indicator.update(pattern_for(input, &thresholds), now(), &TICK_RATE);
        led.show(color);
        ticker.next().await;
    }
}
