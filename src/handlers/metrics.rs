//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request triggers one collection run bounded by the scrape deadline,
//! then encodes the registry. A run that hits its deadline still answers
//! with whatever the gauge store holds; only a store that cannot be opened
//! turns the scrape into a server error.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::orchestrator::CollectError;
use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    CollectionFailed(CollectError),
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            Self::CollectionFailed(_) => "Failed to read bookmarks",
            Self::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");
    state.run_stats.record_scrape_request();

    match state.orchestrator.collect(&state.shutdown).await {
        Ok(report) => {
            state.run_stats.record_run(&report);
            if let Some(telemetry) = &state.telemetry {
                telemetry.record_run(&report);
            }
        }
        Err(e) => {
            error!("Error collecting metrics: {}", e);
            state.run_stats.record_failure();
            if let Some(telemetry) = &state.telemetry {
                telemetry.record_failure();
            }
            return Err(MetricsError::CollectionFailed(e));
        }
    }

    if let Some(telemetry) = &state.telemetry {
        telemetry
            .scrape_duration
            .set(start.elapsed().as_secs_f64());
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    encoder
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|e| {
            error!("Failed to encode metrics: {}", e);
            MetricsError::EncodingFailed
        })?;

    debug!(
        "Served /metrics ({} bytes) in {:.3}s",
        buffer.len(),
        start.elapsed().as_secs_f64()
    );

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    ))
}
