//! Analog sensor acquisition and filtering.
//!
//! Each sensor owns its own filter state and converts raw ADC codes into
//! engineering units. Hardware access is injected through [`AnalogInputs`] and
//! [`SampleDelay`] so the same conversion code runs on the board, in the
//! emulator, and under test.

pub mod current;
pub mod pressure;
pub mod voltage;

pub use current::CurrentSensor;
pub use pressure::PressureSensor;
pub use voltage::{SupplyReading, SupplySensor};

use crate::config::{AdcConfig, ControllerConfig};

/// Analog inputs wired to the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AnalogChannel {
    Pressure,
    CurrentA,
    CurrentB,
    Supply,
}

/// Blocking single-shot ADC access.
pub trait AnalogInputs {
    /// Returns the raw conversion result for `channel`.
    fn read(&mut self, channel: AnalogChannel) -> u16;
}

/// Short busy-wait used between oversampled reads.
pub trait SampleDelay {
    fn delay_us(&mut self, micros: u32);
}

/// Converts an ADC code into connector volts.
#[must_use]
pub fn counts_to_volts(counts: u16, adc: &AdcConfig) -> f32 {
    let full_scale = f32::from(adc.full_scale_counts.max(1));
    let counts = f32::from(counts.min(adc.full_scale_counts));
    counts / full_scale * adc.reference_v
}

/// Converts connector volts back into the nearest ADC code.
#[must_use]
pub fn volts_to_counts(volts: f32, adc: &AdcConfig) -> u16 {
    let full_scale = f32::from(adc.full_scale_counts);
    let scaled = (volts / adc.reference_v * full_scale).clamp(0.0, full_scale);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let counts = (scaled + 0.5) as u16;
    counts.min(adc.full_scale_counts)
}

/// All filtered readings taken in one control cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SensorReadings {
    pub pressure_bar: f32,
    pub current_a: [f32; 2],
    pub supply: SupplyReading,
}

impl SensorReadings {
    /// Larger of the two channel currents; protection acts on this value.
    #[must_use]
    pub fn max_current(&self) -> f32 {
        self.current_a[0].max(self.current_a[1])
    }
}

/// The four analog sensors sampled together every cycle.
#[derive(Clone, Debug)]
pub struct SensorBank {
    adc: AdcConfig,
    pressure: PressureSensor,
    currents: [CurrentSensor; 2],
    supply: SupplySensor,
}

impl SensorBank {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            adc: config.adc,
            pressure: PressureSensor::new(config.pressure),
            currents: [
                CurrentSensor::new(AnalogChannel::CurrentA, config.current_sensor),
                CurrentSensor::new(AnalogChannel::CurrentB, config.current_sensor),
            ],
            supply: SupplySensor::new(config.voltage),
        }
    }

    /// Samples every channel once and returns the filtered readings.
    pub fn sample<I>(&mut self, io: &mut I) -> SensorReadings
    where
        I: AnalogInputs + SampleDelay,
    {
        let pressure_bar = self.pressure.read(io, &self.adc);
        let current_a = [
            self.currents[0].read(io, &self.adc),
            self.currents[1].read(io, &self.adc),
        ];
        let supply = self.supply.read(io, &self.adc);

        SensorReadings {
            pressure_bar,
            current_a,
            supply,
        }
    }
}
