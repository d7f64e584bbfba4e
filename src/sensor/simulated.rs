//! Synthetic sensor for development hosts and demos.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Measurement, Sensor, SensorKind};
use crate::error::SensorError;

const BASE_TEMPERATURE: f32 = 22.0;
const BASE_HUMIDITY: f32 = 55.0;

/// Produces readings that wander around a baseline, with optional failures.
pub struct SimulatedSensor {
    kind: SensorKind,
    temperature: f32,
    humidity: f32,
    failure_ratio: f64,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(kind: SensorKind) -> Self {
        Self::with_rng(kind, StdRng::from_entropy())
    }

    /// Deterministic sensor for tests.
    pub fn seeded(kind: SensorKind, seed: u64) -> Self {
        Self::with_rng(kind, StdRng::seed_from_u64(seed))
    }

    fn with_rng(kind: SensorKind, rng: StdRng) -> Self {
        Self {
            kind,
            temperature: BASE_TEMPERATURE,
            humidity: BASE_HUMIDITY,
            failure_ratio: 0.0,
            rng,
        }
    }

    /// Fraction of read attempts that fail, clamped to 0.0..=1.0.
    pub fn with_failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// Rounds to the 0.1 resolution the real parts report.
fn tenths(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

impl Sensor for SimulatedSensor {
    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn read(&mut self) -> Result<Measurement, SensorError> {
        if self.rng.gen_bool(self.failure_ratio) {
            return Err(SensorError::Timeout("simulated sensor response"));
        }

        // Random walk pulled back towards the baseline
        self.temperature +=
            self.rng.gen_range(-0.3f32..=0.3) + (BASE_TEMPERATURE - self.temperature) * 0.1;
        self.humidity +=
            self.rng.gen_range(-1.0f32..=1.0) + (BASE_HUMIDITY - self.humidity) * 0.1;
        self.humidity = self.humidity.clamp(0.0, 100.0);

        Ok(Measurement {
            temperature: tenths(self.temperature),
            humidity: tenths(self.humidity),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_stay_plausible() {
        let mut sensor = SimulatedSensor::seeded(SensorKind::Dht22, 7);
        for _ in 0..1000 {
            let m = sensor.read().unwrap();
            assert!((0.0..=100.0).contains(&m.humidity));
            assert!((10.0..=35.0).contains(&m.temperature), "temperature {}", m.temperature);
        }
    }

    #[test]
    fn test_full_failure_ratio_always_fails() {
        let mut sensor = SimulatedSensor::seeded(SensorKind::Dht11, 1).with_failure_ratio(1.0);
        for _ in 0..10 {
            assert!(sensor.read().is_err());
        }
    }

    #[test]
    fn test_failure_ratio_is_clamped() {
        let mut sensor = SimulatedSensor::seeded(SensorKind::Dht11, 1).with_failure_ratio(-3.0);
        assert!(sensor.read().is_ok());
        let mut sensor = SimulatedSensor::seeded(SensorKind::Dht11, 1).with_failure_ratio(f64::NAN);
        assert!(sensor.read().is_ok());
    }
}
