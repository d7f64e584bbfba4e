//! Herakles DHT Exporter Library
//!
//! Samples a single-wire DHT temperature/humidity sensor on a background task
//! and exposes the latest values as Prometheus gauges over HTTP.
//!
//! # Features
//!
//! - **Bounded retries**: each sampling round retries the flaky sensor a fixed number of times
//! - **Last-write-wins gauges**: atomic cells shared between the sampler and the scrape handler
//! - **Derived values**: vapor pressure deficit computed from every reading
//! - **Graceful shutdown**: in-flight scrapes finish within a bounded grace period
//!
//! # Usage
//!
//! ```rust
//! use herakles_dht_exporter::reading::vapor_pressure_deficit;
//!
//! // 25°C at 50 %RH
//! let vpd = vapor_pressure_deficit(25.0, 50.0);
//! assert!((vpd - 1.584).abs() < 0.01);
//! ```
//!
//! The binary wires [`sampler::Sampler`], [`server::serve`] and
//! [`shutdown::Shutdown`] together; integration tests drive the same pieces
//! with a simulated sensor.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health_stats;
pub mod metrics;
pub mod reading;
pub mod sampler;
pub mod sensor;
pub mod server;
pub mod shutdown;
pub mod state;

pub use error::{ExporterError, Result, SensorError};
pub use reading::Reading;
pub use sensor::{Measurement, Sensor, SensorKind};
