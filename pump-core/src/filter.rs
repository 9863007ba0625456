//! First-order exponential smoothing.

/// Exponential moving average seeded from its first sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ema {
    alpha: f32,
    value: Option<f32>,
}

impl Ema {
    /// `alpha` is the weight of the newest sample; 1.0 disables smoothing.
    #[must_use]
    pub const fn new(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    /// Folds `sample` into the average and returns the filtered value.
    pub fn update(&mut self, sample: f32) -> f32 {
        let next = match self.value {
            None => sample,
            Some(previous) => previous + self.alpha * (sample - previous),
        };
        self.value = Some(next);
        next
    }

    #[must_use]
    pub const fn value(&self) -> Option<f32> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        let delta = a - b;
        delta < 1e-6 && delta > -1e-6
    }

    #[test]
    fn first_sample_seeds_the_average() {
        let mut ema = Ema::new(0.15);
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(2.5), 2.5);
    }

    #[test]
    fn converges_towards_step_input() {
        let mut ema = Ema::new(0.25);
        ema.update(0.0);
        assert!(close(ema.update(4.0), 1.0));
        assert!(close(ema.update(4.0), 1.75));
    }

    #[test]
    fn unit_alpha_passes_samples_through() {
        let mut ema = Ema::new(1.0);
        ema.update(12.0);
        assert_eq!(ema.update(9.5), 9.5);
    }
}
