//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and written by the background sampler.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::metrics::SensorMetrics;
use crate::server::Lifecycle;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and the sampler task.
pub struct AppState {
    pub registry: Registry,
    pub metrics: SensorMetrics,
    pub health_stats: Arc<HealthStats>,
    pub config: Arc<Config>,
    /// Server lifecycle phase, reported on `/health`.
    pub lifecycle: Arc<Lifecycle>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
    /// Age at which the last reading makes `/health` report 503.
    pub stale_after: Duration,
}

impl AppState {
    /// Builds the registry, registers all gauges and wraps everything in
    /// a [`SharedState`].
    pub fn new(config: Config, start_time: Instant) -> Result<SharedState, prometheus::Error> {
        let registry = Registry::new();
        let metrics = SensorMetrics::new(
            &registry,
            config.namespace(),
            config.enable_vpd.unwrap_or(true),
            start_time,
        )?;
        let stale_after = config.stale_after();

        Ok(Arc::new(Self {
            registry,
            metrics,
            health_stats: Arc::new(HealthStats::new()),
            config: Arc::new(config),
            lifecycle: Arc::new(Lifecycle::new()),
            start_time,
            stale_after,
        }))
    }
}
