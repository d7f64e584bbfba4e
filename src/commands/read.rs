//! Read command implementation.
//!
//! Samples the configured sensor a few times without starting the server
//! and prints the readings.

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::thread;
use std::time::Instant;
use tokio::time::Instant as TokioInstant;

use crate::cli::ConfigFormat;
use crate::config::Config;
use crate::reading::Reading;
use crate::sensor::{open_sensor, read_with_retry, Sensor};

/// One reading as printed by `read`.
#[derive(Debug, Serialize)]
struct ReadOutput {
    sensor: String,
    temperature: f64,
    humidity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    vapor_pressure_deficit_kpa: Option<f64>,
    retries: u32,
    taken_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ReadReport {
    failures: usize,
    readings: Vec<ReadOutput>,
}

/// Reads the sensor `iterations` times, one configured interval apart.
pub fn command_read(
    iterations: usize,
    format: ConfigFormat,
    config: &Config,
) -> anyhow::Result<()> {
    println!("🌡️  Herakles DHT Exporter - Read Mode");
    println!("====================================");

    let mut sensor = open_sensor(config)?;
    let report = collect_readings(&mut sensor, iterations, config);

    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&report)?,
        ConfigFormat::Toml => toml::to_string_pretty(&report)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&report)?,
    };
    println!("\n{}", rendered);

    if report.readings.is_empty() && iterations > 0 {
        bail!("All {} sampling rounds failed", iterations);
    }
    Ok(())
}

fn collect_readings<S: Sensor + ?Sized>(
    sensor: &mut S,
    iterations: usize,
    config: &Config,
) -> ReadReport {
    let enable_vpd = config.enable_vpd.unwrap_or(true);
    let mut report = ReadReport {
        failures: 0,
        readings: Vec::with_capacity(iterations),
    };

    for iteration in 1..=iterations {
        println!("\n🔄 Round {}/{}:", iteration, iterations);
        let start = Instant::now();

        match read_with_retry(sensor, config.max_retries(), config.retry_delay()) {
            Ok((measurement, retries)) => {
                let reading = Reading::new(measurement, retries, TokioInstant::now());
                println!(
                    "   ✅ {:.1}°C, {:.1}% after {} retries ({:.0}ms)",
                    reading.temperature,
                    reading.humidity,
                    retries,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                report.readings.push(ReadOutput {
                    sensor: sensor.kind().to_string(),
                    temperature: reading.temperature,
                    humidity: reading.humidity,
                    vapor_pressure_deficit_kpa: enable_vpd
                        .then(|| reading.vapor_pressure_deficit()),
                    retries,
                    taken_at: reading.taken_at,
                });
            }
            Err(e) => {
                println!("   ❌ {}", e);
                report.failures += 1;
            }
        }

        if iteration < iterations {
            thread::sleep(config.interval());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorBackend;
    use crate::sensor::{SensorKind, SimulatedSensor};

    fn simulated_config(failure_ratio: f64) -> Config {
        Config {
            sensor_backend: Some(SensorBackend::Simulated),
            simulated_failure_ratio: Some(failure_ratio),
            retry_delay_ms: Some(0),
            sensor_max_retries: Some(0),
            ..Config::default()
        }
    }

    #[test]
    fn test_collects_simulated_reading() {
        let config = simulated_config(0.0);
        let mut sensor = SimulatedSensor::seeded(SensorKind::Dht22, 7);
        let report = collect_readings(&mut sensor, 1, &config);

        assert_eq!(report.failures, 0);
        assert_eq!(report.readings.len(), 1);
        let reading = &report.readings[0];
        assert_eq!(reading.sensor, "DHT22");
        assert!(reading.vapor_pressure_deficit_kpa.is_some());
    }

    #[test]
    fn test_failing_sensor_is_reported() {
        let config = simulated_config(1.0);
        assert!(command_read(1, ConfigFormat::Json, &config).is_err());
    }

    #[test]
    fn test_toml_report_renders() {
        let config = simulated_config(0.0);
        assert!(command_read(1, ConfigFormat::Toml, &config).is_ok());
    }
}
