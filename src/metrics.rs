//! Prometheus metrics definitions for herakles-dht-exporter.
//!
//! Every gauge is an atomic f64 cell, so a scrape never observes a torn value.
//! The sampler is the only writer. `seconds_since_last_success` is derived from
//! the last-success instant while the registry is gathered, so a scrape writes
//! nothing.

use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::reading::Reading;

/// Collection of the exported sensor gauges.
#[derive(Clone)]
pub struct SensorMetrics {
    // ========== Last Reading ==========
    pub last_temperature: Gauge,
    pub last_humidity: Gauge,
    pub last_measurement_retries: Gauge,
    pub vapor_pressure_deficit: Option<Gauge>,

    // ========== Freshness ==========
    pub last_successful_measurement_seconds: Gauge,
    pub seconds_since_last_success: SinceLastSuccess,
    pub last_measurement_success: Gauge,

    // ========== Totals ==========
    pub measurements_total: Counter,
    pub measurement_errors_total: Counter,

    pub build_info: GaugeVec,

    /// Reference point for `last_success_nanos`.
    epoch: Instant,
    /// Nanoseconds after `epoch` of the last successful reading.
    last_success_nanos: Arc<AtomicU64>,
}

fn opts(namespace: Option<&str>, name: &str, help: &str) -> Opts {
    let opts = Opts::new(name, help);
    match namespace {
        Some(ns) if !ns.is_empty() => opts.namespace(ns),
        _ => opts,
    }
}

/// Gauge reporting the time since the last successful reading.
///
/// The value is computed in [`Collector::collect`] from the shared
/// last-success instant instead of being stored.
#[derive(Clone)]
pub struct SinceLastSuccess {
    opts: Opts,
    desc: Desc,
    epoch: Instant,
    last_success_nanos: Arc<AtomicU64>,
}

impl SinceLastSuccess {
    fn new(
        opts: Opts,
        epoch: Instant,
        last_success_nanos: Arc<AtomicU64>,
    ) -> Result<Self, prometheus::Error> {
        let desc = opts.describe()?;
        Ok(Self {
            opts,
            desc,
            epoch,
            last_success_nanos,
        })
    }

    /// Instant of the last success, or the epoch if none happened yet.
    pub fn last_success(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.last_success_nanos.load(Ordering::Acquire))
    }

    /// Seconds between the last success and `now`.
    pub fn at(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.last_success()).as_secs_f64()
    }
}

impl Collector for SinceLastSuccess {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // A fresh gauge per gather keeps the registered state read-only
        match Gauge::with_opts(self.opts.clone()) {
            Ok(gauge) => {
                gauge.set(self.at(Instant::now()));
                gauge.collect()
            }
            Err(_) => Vec::new(),
        }
    }
}

impl SensorMetrics {
    /// Creates and registers all sensor metrics with the registry.
    ///
    /// `epoch` is the process start; until the first success the staleness
    /// gauges count from there.
    pub fn new(
        registry: &Registry,
        namespace: Option<&str>,
        enable_vpd: bool,
        epoch: Instant,
    ) -> Result<Self, prometheus::Error> {
        let last_temperature = Gauge::with_opts(opts(
            namespace,
            "last_temperature",
            "Last measured temperature by DHT sensor",
        ))?;
        let last_humidity = Gauge::with_opts(opts(
            namespace,
            "last_humidity",
            "Last measured humidity by DHT sensor",
        ))?;
        let last_measurement_retries = Gauge::with_opts(opts(
            namespace,
            "last_measurement_retries",
            "Number of retries by DHT sensor since it got values",
        ))?;
        let vapor_pressure_deficit = if enable_vpd {
            Some(Gauge::with_opts(opts(
                namespace,
                "vapor_pressure_deficit_kpa",
                "Vapor pressure deficit of the last measurement in kPa",
            ))?)
        } else {
            None
        };

        let last_successful_measurement_seconds = Gauge::with_opts(opts(
            namespace,
            "last_successful_measurement_seconds",
            "Number of seconds that passed between the two most recent successful measurements",
        ))?;
        let last_success_nanos = Arc::new(AtomicU64::new(0));
        let seconds_since_last_success = SinceLastSuccess::new(
            opts(
                namespace,
                "seconds_since_last_success",
                "Seconds elapsed since the last successful measurement, evaluated at scrape time",
            ),
            epoch,
            last_success_nanos.clone(),
        )?;
        let last_measurement_success = Gauge::with_opts(opts(
            namespace,
            "last_measurement_success",
            "Whether the most recent sampling round succeeded (1) or failed (0)",
        ))?;

        let measurements_total = Counter::with_opts(opts(
            namespace,
            "measurements_total",
            "Total number of successful sampling rounds",
        ))?;
        let measurement_errors_total = Counter::with_opts(opts(
            namespace,
            "measurement_errors_total",
            "Total number of sampling rounds that failed after exhausting retries",
        ))?;

        let build_info = GaugeVec::new(
            opts(
                namespace,
                "exporter_build_info",
                "Build information of herakles-dht-exporter",
            ),
            &["version"],
        )?;
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1.0);

        registry.register(Box::new(last_temperature.clone()))?;
        registry.register(Box::new(last_humidity.clone()))?;
        registry.register(Box::new(last_measurement_retries.clone()))?;
        if let Some(vpd) = &vapor_pressure_deficit {
            registry.register(Box::new(vpd.clone()))?;
        }
        registry.register(Box::new(last_successful_measurement_seconds.clone()))?;
        registry.register(Box::new(seconds_since_last_success.clone()))?;
        registry.register(Box::new(last_measurement_success.clone()))?;
        registry.register(Box::new(measurements_total.clone()))?;
        registry.register(Box::new(measurement_errors_total.clone()))?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            last_temperature,
            last_humidity,
            last_measurement_retries,
            vapor_pressure_deficit,
            last_successful_measurement_seconds,
            seconds_since_last_success,
            last_measurement_success,
            measurements_total,
            measurement_errors_total,
            build_info,
            epoch,
            last_success_nanos,
        })
    }

    /// Publishes a successful reading.
    ///
    /// `since_previous` is the time between this success and the one before.
    pub fn record_success(&self, reading: &Reading, since_previous: Duration) {
        self.last_temperature.set(reading.temperature);
        self.last_humidity.set(reading.humidity);
        self.last_measurement_retries.set(reading.retries as f64);
        if let Some(vpd) = &self.vapor_pressure_deficit {
            vpd.set(reading.vapor_pressure_deficit());
        }
        self.last_successful_measurement_seconds
            .set(since_previous.as_secs_f64());
        self.last_measurement_success.set(1.0);
        self.measurements_total.inc();

        let nanos = reading
            .timestamp
            .saturating_duration_since(self.epoch)
            .as_nanos()
            .min(u64::MAX as u128) as u64;
        self.last_success_nanos.store(nanos, Ordering::Release);
    }

    /// Marks the latest round as failed. Reading gauges keep their values.
    pub fn record_failure(&self) {
        self.last_measurement_success.set(0.0);
        self.measurement_errors_total.inc();
    }

    /// Instant of the last success, or the epoch if none happened yet.
    pub fn last_success(&self) -> Instant {
        self.seconds_since_last_success.last_success()
    }

    /// Whether at least one reading has been published.
    pub fn has_success(&self) -> bool {
        self.measurements_total.get() > 0.0
    }

    /// Value `seconds_since_last_success` would report at `now`.
    pub fn seconds_since_last_success(&self, now: Instant) -> f64 {
        self.seconds_since_last_success.at(now)
    }
}
