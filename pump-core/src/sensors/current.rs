//! ACS772 hall-effect current sensors.

use crate::config::{AdcConfig, CurrentSensorConfig};
use crate::filter::Ema;

use super::{AnalogChannel, AnalogInputs, SampleDelay, counts_to_volts};

/// One current channel with oversampling and exponential smoothing.
#[derive(Clone, Debug)]
pub struct CurrentSensor {
    channel: AnalogChannel,
    config: CurrentSensorConfig,
    filter: Ema,
}

impl CurrentSensor {
    #[must_use]
    pub const fn new(channel: AnalogChannel, config: CurrentSensorConfig) -> Self {
        Self {
            channel,
            filter: Ema::new(config.filter_alpha),
            config,
        }
    }

    /// Averages `samples_per_read` conversions and returns filtered amperes.
    pub fn read<I>(&mut self, io: &mut I, scaling: &AdcConfig) -> f32
    where
        I: AnalogInputs + SampleDelay,
    {
        let samples = self.config.samples_per_read.max(1);
        let mut total = 0.0_f32;
        for index in 0..samples {
            if index > 0 {
                io.delay_us(self.config.sample_spacing_us);
            }
            total += counts_to_volts(io.read(self.channel), scaling);
        }
        let volts = total / f32::from(samples);

        let filtered = self.filter.update(voltage_to_amps(volts, &self.config));
        filtered.clamp(0.0, self.config.max_current_a)
    }
}

/// Sensor voltage to amperes, clamped to `[0, max_current_a]`.
#[must_use]
pub fn voltage_to_amps(volts: f32, config: &CurrentSensorConfig) -> f32 {
    let amps = (volts - config.zero_current_v) / config.sensitivity_v_per_a;
    amps.clamp(0.0, config.max_current_a)
}

/// Sensor voltage produced by `amps` of load current.
#[must_use]
pub fn amps_to_voltage(amps: f32, config: &CurrentSensorConfig) -> f32 {
    config.zero_current_v + amps * config.sensitivity_v_per_a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::sensors::testing::FixedAdc;
    use crate::sensors::volts_to_counts;

    struct SpacedAdc {
        adc: FixedAdc,
        delays: u32,
        delayed_us: u32,
    }

    impl AnalogInputs for SpacedAdc {
        fn read(&mut self, channel: AnalogChannel) -> u16 {
            self.adc.read(channel)
        }
    }

    impl SampleDelay for SpacedAdc {
        fn delay_us(&mut self, micros: u32) {
            self.delays += 1;
            self.delayed_us += micros;
        }
    }

    fn counts_for(amps: f32) -> u16 {
        let config = ControllerConfig::DEFAULT;
        volts_to_counts(amps_to_voltage(amps, &config.current_sensor), &config.adc)
    }

    #[test]
    fn conversion_clamps_to_sensor_range() {
        let config = ControllerConfig::DEFAULT.current_sensor;
        assert_eq!(voltage_to_amps(0.2, &config), 0.0);
        assert_eq!(voltage_to_amps(0.6, &config), 0.0);
        assert_eq!(voltage_to_amps(4.9, &config), 50.0);
        let amps = voltage_to_amps(amps_to_voltage(32.0, &config), &config);
        assert!(amps > 31.99 && amps < 32.01);
    }

    #[test]
    fn oversamples_with_spacing_between_reads() {
        let config = ControllerConfig::DEFAULT;
        let mut sensor = CurrentSensor::new(AnalogChannel::CurrentB, config.current_sensor);
        let mut io = SpacedAdc {
            adc: FixedAdc {
                current_b: counts_for(5.0),
                ..FixedAdc::default()
            },
            delays: 0,
            delayed_us: 0,
        };

        let amps = sensor.read(&mut io, &config.adc);
        assert!(amps > 4.9 && amps < 5.1, "amps {amps}");

        let samples = config.current_sensor.samples_per_read;
        assert_eq!(io.adc.reads, usize::from(samples));
        assert_eq!(io.delays, u32::from(samples) - 1);
        assert_eq!(
            io.delayed_us,
            (u32::from(samples) - 1) * config.current_sensor.sample_spacing_us
        );
    }

    #[test]
    fn channels_filter_independently() {
        let config = ControllerConfig::DEFAULT;
        let mut a = CurrentSensor::new(AnalogChannel::CurrentA, config.current_sensor);
        let mut b = CurrentSensor::new(AnalogChannel::CurrentB, config.current_sensor);
        let mut adc = FixedAdc {
            current_a: counts_for(0.0),
            current_b: counts_for(0.0),
            ..FixedAdc::default()
        };
        a.read(&mut adc, &config.adc);
        b.read(&mut adc, &config.adc);

        adc.current_a = counts_for(40.0);
        let first = a.read(&mut adc, &config.adc);
        let second = b.read(&mut adc, &config.adc);

        // alpha 0.25 of a 40 A step
        assert!(first > 9.9 && first < 10.1, "first {first}");
        assert!(second < 0.1, "second {second}");
    }
}
