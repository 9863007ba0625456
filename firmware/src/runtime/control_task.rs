use embassy_time::{Duration, Ticker};
use pump_core::bus::{NoopBus, StatusBus, StatusFrame};
use pump_core::control::PumpController;
use pump_core::diagnostics::StatusReport;
use pump_core::indicator::IndicatorInput;
use pump_core::telemetry::EventId;

use super::{INDICATOR, now};
use crate::hw::{Board, PwmPowerStage};
use crate::telemetry;

#[embassy_executor::task]
pub async fn run(
    mut controller: PumpController<PwmPowerStage<'static>>,
    mut board: Board<'static>,
) -> ! {
    let rate = *controller.tick_rate();
    let interval = controller.config().timing.control_interval;
    let mut ticker = Ticker::every(Duration::from_micros(
        u64::try_from(interval.as_micros()).unwrap_or(u64::MAX),
    ));
    let mut bus = NoopBus::new();
    let mut cursor: EventId = 0;

    loop {
        ticker.next().await;

        let snapshot = controller.run_cycle(&mut board, now());

        let ring = controller.telemetry();
        for record in ring.since(cursor) {
            telemetry::log_record(record, &rate);
        }
        cursor = ring.next_event_id();

        INDICATOR.signal(IndicatorInput::from_snapshot(&snapshot));
        let Ok(()) = bus.publish(&StatusFrame::from_snapshot(&snapshot));

        telemetry::log_summary(&snapshot);
        if snapshot.report_due {
            telemetry::log_report(&StatusReport::capture(&controller, &snapshot));
        }
    }
}
