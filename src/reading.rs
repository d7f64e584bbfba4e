//! Sensor readings and values derived from them.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::sensor::Measurement;

/// One successful sampling round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Retries the sensor needed for this reading.
    pub retries: u32,
    /// Monotonic instant the reading completed.
    pub timestamp: Instant,
    /// Wall-clock time the reading completed, for logs and `/health`.
    pub taken_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(measurement: Measurement, retries: u32, timestamp: Instant) -> Self {
        Self {
            temperature: measurement.temperature as f64,
            humidity: measurement.humidity as f64,
            retries,
            timestamp,
            taken_at: Utc::now(),
        }
    }

    pub fn vapor_pressure_deficit(&self) -> f64 {
        vapor_pressure_deficit(self.temperature, self.humidity)
    }
}

/// Saturation vapor pressure over water in kPa (Tetens equation).
pub fn saturation_vapor_pressure(temperature_c: f64) -> f64 {
    0.6108 * (17.27 * temperature_c / (temperature_c + 237.3)).exp()
}

/// Vapor pressure deficit in kPa.
///
/// Positive whenever the air is below saturation, zero at 100 %RH.
pub fn vapor_pressure_deficit(temperature_c: f64, humidity_pct: f64) -> f64 {
    let es = saturation_vapor_pressure(temperature_c);
    let ea = (humidity_pct / 100.0) * es;
    es - ea
}
