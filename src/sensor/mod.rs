//! Sensor access for single-wire DHT temperature/humidity sensors.
//!
//! The exporter only relies on the [`Sensor`] trait: a blocking read that
//! returns a measurement or a [`SensorError`]. Backends:
//! - [`DhtSensor`]: bit-banged GPIO driver (requires the `gpio` feature)
//! - [`SimulatedSensor`]: synthetic readings for hosts without a sensor

pub mod dht;
pub mod simulated;

use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{Config, SensorBackend};
use crate::error::{ExporterError, SensorError};

pub use dht::{decode_frame, DhtSensor};
pub use simulated::SimulatedSensor;

/// Default pause between two attempts of a retried read.
/// DHT parts need at least this long before they answer again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1500);

/// Supported sensor models. Configured by numeric code (`sensor_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Dht11,
    Dht12,
    /// Also sold as AM2302.
    Dht22,
}

impl SensorKind {
    /// Maps the configured code (1, 2, 3) to a sensor kind.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Dht11),
            2 => Some(Self::Dht12),
            3 => Some(Self::Dht22),
            _ => None,
        }
    }

    /// How long the host holds the line low to wake the sensor.
    pub fn start_signal(self) -> Duration {
        match self {
            Self::Dht11 | Self::Dht12 => Duration::from_millis(20),
            Self::Dht22 => Duration::from_millis(2),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dht11 => "DHT11",
            Self::Dht12 => "DHT12",
            Self::Dht22 => "DHT22",
        };
        f.write_str(name)
    }
}

/// One decoded sensor measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
}

/// A temperature/humidity sensor. Reads are blocking.
pub trait Sensor: Send + 'static {
    fn kind(&self) -> SensorKind;

    /// Performs a single read attempt.
    fn read(&mut self) -> Result<Measurement, SensorError>;
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn kind(&self) -> SensorKind {
        (**self).kind()
    }

    fn read(&mut self) -> Result<Measurement, SensorError> {
        (**self).read()
    }
}

/// Reads the sensor, retrying up to `max_retries` times on failure.
///
/// Returns the measurement together with the number of retries it took.
/// Blocks the calling thread for `retry_delay` between attempts.
pub fn read_with_retry<S: Sensor + ?Sized>(
    sensor: &mut S,
    max_retries: u32,
    retry_delay: Duration,
) -> Result<(Measurement, u32), SensorError> {
    let mut retries = 0;
    loop {
        match sensor.read() {
            Ok(measurement) => return Ok((measurement, retries)),
            Err(e) if retries < max_retries => {
                retries += 1;
                debug!(
                    "{} read attempt {}/{} failed: {}",
                    sensor.kind(),
                    retries,
                    max_retries + 1,
                    e
                );
                if !retry_delay.is_zero() {
                    thread::sleep(retry_delay);
                }
            }
            Err(e) => {
                return Err(SensorError::RetriesExhausted {
                    attempts: retries + 1,
                    last: Box::new(e),
                })
            }
        }
    }
}

/// Builds the sensor backend selected by the effective configuration.
pub fn open_sensor(config: &Config) -> Result<Box<dyn Sensor>, ExporterError> {
    let kind = config.sensor_kind()?;
    match config.sensor_backend.unwrap_or_default() {
        SensorBackend::Simulated => {
            info!("Using simulated {} sensor", kind);
            let sensor = SimulatedSensor::new(kind)
                .with_failure_ratio(config.simulated_failure_ratio.unwrap_or(0.0));
            Ok(Box::new(sensor))
        }
        SensorBackend::Gpio => {
            let pin = config.sensor_pin.unwrap_or(crate::config::DEFAULT_SENSOR_PIN);
            info!("Opening {} sensor on GPIO pin {}", kind, pin);
            let sensor = DhtSensor::open(kind, pin)
                .map_err(|e| ExporterError::config(format!("Cannot open sensor: {}", e)))?;
            Ok(Box::new(sensor))
        }
    }
}
