//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let health_item = if state.config.enable_health.unwrap_or(true) {
        r#"<li><a href="/health">/health</a> - collection run statistics (text)</li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Bookmarks Alive Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; line-height: 1.6; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
    <h1>Bookmarks Alive Exporter</h1>
    <p>Version <code>{version}</code> - uptime {uptime} - tracking {urls} URLs</p>
    <ul>
        <li><a href="/metrics">/metrics</a> - probes every bookmark and returns Prometheus metrics</li>
        {health_item}
        <li><a href="/config">/config</a> - effective configuration (YAML)</li>
    </ul>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        urls = state.store.len(),
        health_item = health_item,
    );

    Html(html)
}
