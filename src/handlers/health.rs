//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! sampler freshness, lifecycle phase and exporter statistics.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::server::Phase;
use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-dht-exporter — More info: https://www.herakles.now — Support: exporter@herakles.now";

/// Handler for the /health endpoint.
///
/// Returns 503 until the first successful reading, once the last success is
/// older than the staleness window, and while the server shuts down.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let metrics = &state.metrics;
    let age = Instant::now().saturating_duration_since(metrics.last_success());
    let phase = state.lifecycle.phase();

    let (status, message) = if phase != Phase::Running {
        (StatusCode::SERVICE_UNAVAILABLE, format!("Exporter {}", phase))
    } else if !metrics.has_success() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "No successful sensor reading yet".to_string(),
        )
    } else if age > state.stale_after {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!(
                "Sensor reading stale: last success {:.0}s ago (limit {}s)",
                age.as_secs_f64(),
                state.stale_after.as_secs()
            ),
        )
    } else {
        (StatusCode::OK, "OK".to_string())
    };

    // Calculate uptime
    let uptime_seconds = state.health_stats.get_uptime_seconds();
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let mut reading = String::new();
    writeln!(reading, "LAST READING").ok();
    writeln!(reading, "============").ok();
    if metrics.has_success() {
        writeln!(
            reading,
            "temperature (°C)           : {:.1}",
            metrics.last_temperature.get()
        )
        .ok();
        writeln!(
            reading,
            "humidity (%)               : {:.1}",
            metrics.last_humidity.get()
        )
        .ok();
        if let Some(vpd) = &metrics.vapor_pressure_deficit {
            writeln!(reading, "vapor_pressure_deficit (kPa): {:.3}", vpd.get()).ok();
        }
        writeln!(
            reading,
            "retries                    : {:.0}",
            metrics.last_measurement_retries.get()
        )
        .ok();
        writeln!(
            reading,
            "age (s)                    : {:.1}",
            age.as_secs_f64()
        )
        .ok();
    } else {
        writeln!(reading, "none").ok();
    }

    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nPhase: {phase}\nUptime: {uptime_str}\n\n{reading}\n{table}\n{FOOTER_TEXT}"
        ),
    )
}
