//! Error types for herakles-dht-exporter.
//!
//! Only configuration and listener failures are fatal. Sensor errors are
//! expected on flaky single-wire buses and are absorbed by the sampler.

use std::net::SocketAddr;
use std::time::Duration;

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Fatal and lifecycle errors of the exporter process.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The HTTP listener could not be bound
    #[error("Failed to bind HTTP listener on {addr}: {source}")]
    ServerStart {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an I/O error while running
    #[error("HTTP server error: {0}")]
    Server(#[from] std::io::Error),

    /// In-flight requests did not drain within the grace period
    #[error("HTTP shutdown did not complete within {grace:?}")]
    ServerShutdown { grace: Duration },

    /// Prometheus registry rejected a metric
    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ExporterError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// A failed sensor read.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The sensor did not drive the line within the expected window
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// Frame checksum mismatch
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    /// Decoded values are physically impossible
    #[error("Reading out of range: {temperature:.1}°C, {humidity:.1}%")]
    OutOfRange { temperature: f32, humidity: f32 },

    /// GPIO line could not be opened or driven
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// The sensor backend cannot be used right now
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),

    /// All attempts of a bounded retry loop failed
    #[error("Sensor read failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SensorError>,
    },
}
