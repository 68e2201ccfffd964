// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Randomized service durations.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

use crate::domain::config::{ConfigError, ServiceConfig};

/// Samples service durations from a normal distribution measured in time units.
///
/// Samples are rounded to whole units with a floor of one unit; doubled services
/// last twice the sampled time.
#[derive(Debug, Clone)]
pub struct ServiceTimer {
    distribution: Normal<f64>,
    unit: Duration,
}

impl ServiceTimer {
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let distribution = Normal::new(config.mean_units, config.std_dev_units).map_err(|e| {
            ConfigError::InvalidServiceDistribution {
                mean: config.mean_units,
                std_dev: config.std_dev_units,
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            distribution,
            unit: config.time_unit,
        })
    }

    /// Whole number of units for one sample, at least 1.
    pub fn sample_units<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let sample = self.distribution.sample(rng).round();
        if sample.is_finite() && sample > 1.0 {
            sample.min(u32::MAX as f64) as u32
        } else {
            1
        }
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R, doubled: bool) -> Duration {
        let units = self.sample_units(rng);
        let units = if doubled { units.saturating_mul(2) } else { units };
        self.unit * units
    }

    /// Samples with the thread-local generator.
    pub fn sample(&self, doubled: bool) -> Duration {
        self.sample_with(&mut rand::rng(), doubled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(mean: f64, std_dev: f64) -> ServiceConfig {
        ServiceConfig {
            time_unit: Duration::from_millis(10),
            mean_units: mean,
            std_dev_units: std_dev,
        }
    }

    #[test]
    fn test_samples_have_floor_of_one_unit() {
        let timer = ServiceTimer::new(&config(0.5, 5.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<u32> = (0..500).map(|_| timer.sample_units(&mut rng)).collect();
        assert!(samples.iter().all(|units| *units >= 1));
        // Roughly half the draws fall below one unit and are clamped.
        assert!(samples.iter().filter(|units| **units == 1).count() > 100);
    }

    #[test]
    fn test_doubled_samples_are_twice_as_long() {
        let timer = ServiceTimer::new(&config(3.0, 0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(timer.sample_with(&mut rng, false), Duration::from_millis(30));
        assert_eq!(timer.sample_with(&mut rng, true), Duration::from_millis(60));
    }

    #[test]
    fn test_samples_center_on_mean() {
        let timer = ServiceTimer::new(&config(5.0, 1.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let total: u64 = (0..2000).map(|_| timer.sample_units(&mut rng) as u64).sum();
        let mean = total as f64 / 2000.0;
        assert!((mean - 5.0).abs() < 0.2, "mean was {mean}");
    }

    #[test]
    fn test_negative_std_dev_is_rejected() {
        let err = ServiceTimer::new(&config(2.0, -1.0)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServiceDistribution { .. }));
    }
}
