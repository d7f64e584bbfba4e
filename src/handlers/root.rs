//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown");
    let built = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown");

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let sensor = state
        .config
        .sensor_kind()
        .map(|k| k.to_string())
        .unwrap_or_else(|_| "unknown".into());
    let pin = state
        .config
        .sensor_pin
        .unwrap_or(crate::config::DEFAULT_SENSOR_PIN);
    let interval = state.config.interval().as_secs();

    let health_item = if state.config.enable_health.unwrap_or(true) {
        r#"<li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">Sampler freshness and exporter statistics (text)</div>
        </li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herakles DHT Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
        }}
        .container {{
            max-width: 720px;
            margin: 0 auto;
            background: white;
            padding: 32px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 12px; }}
        .info {{ background: #e9ecef; padding: 12px; border-radius: 4px; }}
        .info span {{ margin-right: 24px; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 16px 0;
            padding: 12px;
            background: #f8f9fa;
            border-left: 4px solid #007bff;
        }}
        .endpoint-desc {{ color: #666; margin-top: 4px; }}
        .footer {{ margin-top: 32px; color: #666; font-size: 0.9em; text-align: center; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Herakles DHT Exporter</h1>
    <div class="info">
        <span><b>Version</b> {version} ({git_sha}, built {built})</span>
        <span><b>Uptime</b> {uptime}</span>
        <span><b>Sensor</b> {sensor} on GPIO {pin}, every {interval}s</span>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li>
            <a href="/metrics">/metrics</a>
            <div class="endpoint-desc">Prometheus-compatible metrics endpoint</div>
        </li>
        {health_item}
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        uptime = uptime_str,
        footer = FOOTER_TEXT
    );

    Html(html)
}
