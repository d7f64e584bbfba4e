//! Metrics endpoint handler for Prometheus scraping.
//!
//! Serializes the current gauge values in the Prometheus text format. The
//! handler never writes a gauge; the sampler is the only writer.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder, TEXT_FORMAT};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 8 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<Response, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode Prometheus metrics: {}", e);
        return Err(MetricsError::EncodingFailed);
    }

    let body = String::from_utf8(buffer).map_err(|e| {
        error!("Encoded metrics are not valid UTF-8: {}", e);
        MetricsError::EncodingFailed
    })?;

    let request_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    state.health_stats.record_scrape(request_duration_ms);

    debug!(
        "Served {} metric families in {:.3}ms",
        families.len(),
        request_duration_ms
    );

    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response())
}
