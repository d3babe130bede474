//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers. The gauge store and registry are created once per
//! process here instead of living in globals.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::gauge_store::GaugeStore;
use crate::metrics::ExporterMetrics;
use crate::orchestrator::Orchestrator;
use crate::prober::Prober;
use crate::run_stats::RunStats;
use crate::source::UrlSource;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Process-wide state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub store: GaugeStore,
    pub orchestrator: Orchestrator,
    /// Exporter self-metrics, absent when telemetry is disabled.
    pub telemetry: Option<ExporterMetrics>,
    pub run_stats: Arc<RunStats>,
    pub config: Arc<Config>,
    /// Parent of every collection run's cancellation token.
    pub shutdown: CancellationToken,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the registry, gauge store and orchestrator for `config`.
    pub fn new(
        config: Config,
        source: Arc<dyn UrlSource>,
        prober: Arc<dyn Prober>,
        shutdown: CancellationToken,
    ) -> Result<SharedState, prometheus::Error> {
        let registry = Registry::new();

        let store = GaugeStore::new()?;
        registry.register(Box::new(store.clone()))?;

        let telemetry = if config.enable_telemetry.unwrap_or(true) {
            Some(ExporterMetrics::new(&registry)?)
        } else {
            None
        };

        let orchestrator =
            Orchestrator::new(source, prober, store.clone(), config.orchestrator_settings());

        Ok(Arc::new(Self {
            registry,
            store,
            orchestrator,
            telemetry,
            run_stats: Arc::new(RunStats::new()),
            config: Arc::new(config),
            shutdown,
            start_time: Instant::now(),
        }))
    }
}
