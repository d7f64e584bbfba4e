//! Background sampling task.
//!
//! Each round reads the sensor with its bounded retry budget on the blocking
//! pool, folds the outcome into [`SensorMetrics`] and then sleeps for the
//! configured interval. A failed round is logged and counted; the next
//! scheduled round is the only retry outside the sensor's own budget.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::error::SensorError;
use crate::health_stats::HealthStats;
use crate::metrics::SensorMetrics;
use crate::reading::Reading;
use crate::sensor::{read_with_retry, Measurement, Sensor};
use crate::shutdown::ShutdownListener;

/// Timing parameters of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSettings {
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl SamplerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.interval(),
            max_retries: config.max_retries(),
            retry_delay: config.retry_delay(),
        }
    }
}

/// Periodically reads a sensor and publishes the result.
pub struct Sampler<S: Sensor> {
    sensor: Arc<Mutex<S>>,
    settings: SamplerSettings,
    metrics: SensorMetrics,
    health_stats: Arc<HealthStats>,
    /// Previous success, or the sampler start before the first one.
    last_success: Instant,
}

impl<S: Sensor> Sampler<S> {
    pub fn new(
        sensor: S,
        settings: SamplerSettings,
        metrics: SensorMetrics,
        health_stats: Arc<HealthStats>,
    ) -> Self {
        Self {
            sensor: Arc::new(Mutex::new(sensor)),
            settings,
            metrics,
            health_stats,
            last_success: Instant::now(),
        }
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Folds the outcome of one round, completed at `now`, into the gauges.
    ///
    /// On failure the reading gauges keep their previous values.
    pub fn record(
        &mut self,
        result: Result<(Measurement, u32), SensorError>,
        now: Instant,
    ) -> Option<Reading> {
        match result {
            Ok((measurement, retries)) => {
                let reading = Reading::new(measurement, retries, now);
                let since_previous = now.saturating_duration_since(self.last_success);
                self.metrics.record_success(&reading, since_previous);
                self.last_success = now;

                if self.metrics.vapor_pressure_deficit.is_some() {
                    info!(
                        "Temperature: {:.1}°C, Humidity: {:.1}%, VPD: {:.3} kPa, retries: {}",
                        reading.temperature,
                        reading.humidity,
                        reading.vapor_pressure_deficit(),
                        retries
                    );
                } else {
                    info!(
                        "Temperature: {:.1}°C, Humidity: {:.1}%, retries: {}",
                        reading.temperature, reading.humidity, retries
                    );
                }
                Some(reading)
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(
                    "Sensor read failed, keeping previous values ({:.0}s since last success): {}",
                    now.saturating_duration_since(self.metrics.last_success())
                        .as_secs_f64(),
                    e
                );
                None
            }
        }
    }

    /// Runs one sampling round.
    #[instrument(skip(self))]
    pub async fn sample_once(&mut self) -> Option<Reading> {
        let sensor = Arc::clone(&self.sensor);
        let SamplerSettings {
            max_retries,
            retry_delay,
            ..
        } = self.settings;

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let mut sensor = sensor
                .lock()
                .map_err(|_| SensorError::Unavailable("sensor mutex poisoned".into()))?;
            read_with_retry(&mut *sensor, max_retries, retry_delay)
        })
        .await
        .unwrap_or_else(|e| Err(SensorError::Unavailable(format!("read task failed: {}", e))));
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(started);

        match &result {
            Ok((_, retries)) => self.health_stats.record_read_success(*retries, elapsed),
            Err(_) => self.health_stats.record_read_failure(elapsed),
        }
        debug!("Sampling round took {:.3}s", elapsed.as_secs_f64());

        self.record(result, now)
    }

    /// Samples until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: ShutdownListener) {
        info!(
            "Sampler started: interval {}s, max retries {}, retry delay {}ms",
            self.settings.interval.as_secs(),
            self.settings.max_retries,
            self.settings.retry_delay.as_millis()
        );
        self.last_success = Instant::now();

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = self.sample_once() => {}
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = time::sleep(self.settings.interval) => {}
            }
        }

        if self.sensor.is_poisoned() {
            warn!("Sensor mutex was poisoned by a panicking read");
        }
        info!("Sampler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorKind;
    use crate::shutdown::Shutdown;
    use prometheus::Registry;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        results: VecDeque<Result<Measurement, SensorError>>,
        calls: Arc<AtomicU32>,
    }

    impl Sensor for Scripted {
        fn kind(&self) -> SensorKind {
            SensorKind::Dht22
        }

        fn read(&mut self) -> Result<Measurement, SensorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .pop_front()
                .unwrap_or(Ok(Measurement {
                    temperature: 20.0,
                    humidity: 50.0,
                }))
        }
    }

    fn settings(max_retries: u32) -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_secs(5),
            max_retries,
            retry_delay: Duration::ZERO,
        }
    }

    fn sampler(
        results: Vec<Result<Measurement, SensorError>>,
        max_retries: u32,
    ) -> (Sampler<Scripted>, SensorMetrics, Arc<AtomicU32>) {
        let registry = Registry::new();
        let metrics = SensorMetrics::new(&registry, None, true, Instant::now()).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let sensor = Scripted {
            results: results.into(),
            calls: Arc::clone(&calls),
        };
        let sampler = Sampler::new(
            sensor,
            settings(max_retries),
            metrics.clone(),
            Arc::new(HealthStats::new()),
        );
        (sampler, metrics, calls)
    }

    fn ok(temperature: f32, humidity: f32) -> Result<Measurement, SensorError> {
        Ok(Measurement {
            temperature,
            humidity,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_between_successes() {
        let (mut sampler, metrics, _) = sampler(vec![], 0);
        let start = Instant::now();

        sampler.record(Ok((ok(20.0, 50.0).unwrap(), 0)), start + Duration::from_secs(5));
        assert_eq!(metrics.last_successful_measurement_seconds.get(), 5.0);

        sampler.record(Err(SensorError::Timeout("response")), start + Duration::from_secs(10));
        sampler.record(Ok((ok(21.0, 51.0).unwrap(), 2)), start + Duration::from_secs(15));
        assert_eq!(metrics.last_successful_measurement_seconds.get(), 10.0);
        assert_eq!(metrics.last_measurement_retries.get(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_round_keeps_previous_values() {
        let (mut sampler, metrics, _) = sampler(vec![ok(23.5, 60.0)], 0);
        sampler.sample_once().await.unwrap();

        let t0 = Instant::now();
        let failed = sampler.record(
            Err(SensorError::RetriesExhausted {
                attempts: 1,
                last: Box::new(SensorError::Timeout("response")),
            }),
            t0 + Duration::from_secs(5),
        );
        assert!(failed.is_none());
        assert_eq!(metrics.last_temperature.get(), 23.5);
        assert_eq!(metrics.last_humidity.get(), 60.0);
        assert_eq!(metrics.last_measurement_success.get(), 0.0);
        assert_eq!(metrics.measurement_errors_total.get(), 1.0);
        let since = metrics.seconds_since_last_success(t0 + Duration::from_secs(5));
        assert!((since - 5.0).abs() < 1e-3, "{since}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_reported_after_success() {
        let failures = (0..5).map(|_| Err(SensorError::Timeout("response")));
        let results = failures.chain(std::iter::once(ok(19.5, 70.0))).collect();
        let (mut sampler, metrics, calls) = sampler(results, 5);

        let reading = sampler.sample_once().await.unwrap();
        assert_eq!(reading.retries, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(metrics.last_measurement_retries.get(), 5.0);
        assert_eq!(metrics.last_temperature.get(), 19.5);
        assert_eq!(metrics.last_measurement_success.get(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_samples_every_interval_until_shutdown() {
        let (sampler, metrics, calls) = sampler(vec![], 0);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(sampler.run(shutdown.listener()));

        // Rounds at t=0, 5 and 10
        time::sleep(Duration::from_secs(12)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.measurements_total.get(), 3.0);

        shutdown.trigger();
        handle.await.unwrap();

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
