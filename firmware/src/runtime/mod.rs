use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use pump_core::config::ControllerConfig;
use pump_core::control::PumpController;
use pump_core::indicator::IndicatorInput;
use pump_core::protection::CurrentThresholds;
use pump_core::time::{TickRate, Ticks};

use crate::hw::{AnalogFrontEnd, Board, PulseInput, PwmPowerStage, RgbLed};

mod control_task;
mod indicator_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Latest indicator request from the control loop.
pub(super) static INDICATOR: Signal<CriticalSectionRawMutex, IndicatorInput> = Signal::new();

/// The controller runs directly on the embassy time base.
pub(super) const TICK_RATE: TickRate = TickRate::nominal(embassy_time::TICK_HZ);

/// Switching frequency of the power stage.
const PWM_FREQUENCY: Hertz = Hertz(20_000);

pub(super) fn now() -> Ticks {
    Ticks::from_raw(Instant::now().as_ticks())
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        ADC1,
        TIM3,
        PA0,
        PA1,
        PA4,
        PA5,
        PA6,
        PB0,
        PB1,
        PB3,
        PB4,
        PB5,
        ..
    } = hal::init(hal::Config::default());

    // Bring the stage up at zero duty before anything else runs.
    let pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        None,
        None,
        None,
        PWM_FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    let stage = PwmPowerStage::new(pwm.split().ch1);

    let analog = AnalogFrontEnd::new(
        Adc::new(ADC1),
        PA0.degrade_adc(),
        PA1.degrade_adc(),
        PA4.degrade_adc(),
        PA5.degrade_adc(),
    );
    let board = Board::new(
        analog,
        PulseInput::new(Input::new(PB0, Pull::Down)),
        Input::new(PB1, Pull::Up),
    );

    let config = ControllerConfig::DEFAULT;
    let controller = PumpController::new(config, stage, TICK_RATE, now())
        .expect("default controller configuration is valid");

    let led = RgbLed::new(
        Output::new(PB3, Level::Low, Speed::Low),
        Output::new(PB4, Level::Low, Speed::Low),
        Output::new(PB5, Level::Low, Speed::Low),
    );
    let thresholds = CurrentThresholds::from_config(&config.current_protection);

    defmt::info!("pump controller starting");

    spawner
        .spawn(control_task::run(controller, board))
        .expect("failed to spawn control task");
    spawner
        .spawn(indicator_task::run(led, thresholds))
        .expect("failed to spawn indicator task");

    core::future::pending::<()>().await;
}
