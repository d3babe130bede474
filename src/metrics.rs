//! Prometheus self-telemetry for bookmarks-alive-exporter.
//!
//! The per-URL status gauge is provided by [`crate::gauge_store::GaugeStore`];
//! this module only covers the exporter's own `bookmarks_alive_exporter_*`
//! metrics describing the collection runs.

use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry};

use crate::orchestrator::RunReport;
use crate::run_stats::RunOutcome;

/// Metrics describing the exporter's collection runs.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub scrape_duration: Gauge,
    pub collection_duration: Gauge,
    pub collection_timed_out: Gauge,
    pub urls_total: Gauge,
    pub probe_failures: Gauge,
    pub skipped_rows_total: IntCounter,
    pub collection_runs_total: IntCounterVec, // labels: outcome
}

impl ExporterMetrics {
    /// Creates and registers all exporter metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let scrape_duration = Gauge::new(
            "bookmarks_alive_exporter_scrape_duration_seconds",
            "Time spent serving the last /metrics request, including collection",
        )?;
        let collection_duration = Gauge::new(
            "bookmarks_alive_exporter_collection_duration_seconds",
            "Duration of the last collection run",
        )?;
        let collection_timed_out = Gauge::new(
            "bookmarks_alive_exporter_collection_timed_out",
            "Whether the last collection run hit its deadline (1) or completed (0)",
        )?;
        let urls_total = Gauge::new(
            "bookmarks_alive_exporter_urls_total",
            "Number of URLs handed to the probe workers in the last run",
        )?;
        let probe_failures = Gauge::new(
            "bookmarks_alive_exporter_probe_failures",
            "Number of probes in the last run that did not yield an HTTP status",
        )?;
        let skipped_rows_total = IntCounter::new(
            "bookmarks_alive_exporter_skipped_rows_total",
            "Bookmark records skipped because they could not be read",
        )?;
        let collection_runs_total = IntCounterVec::new(
            Opts::new(
                "bookmarks_alive_exporter_collection_runs_total",
                "Collection runs by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(collection_duration.clone()))?;
        registry.register(Box::new(collection_timed_out.clone()))?;
        registry.register(Box::new(urls_total.clone()))?;
        registry.register(Box::new(probe_failures.clone()))?;
        registry.register(Box::new(skipped_rows_total.clone()))?;
        registry.register(Box::new(collection_runs_total.clone()))?;

        Ok(Self {
            scrape_duration,
            collection_duration,
            collection_timed_out,
            urls_total,
            probe_failures,
            skipped_rows_total,
            collection_runs_total,
        })
    }

    pub fn record_run(&self, report: &RunReport) {
        self.collection_duration.set(report.elapsed.as_secs_f64());
        self.collection_timed_out
            .set(if report.timed_out() { 1.0 } else { 0.0 });
        self.urls_total.set(report.urls_fed as f64);
        self.probe_failures.set(report.probe_failures as f64);
        self.skipped_rows_total.inc_by(report.skipped_rows as u64);
        self.collection_runs_total
            .with_label_values(&[RunOutcome::from(report.state).as_str()])
            .inc();
    }

    pub fn record_failure(&self) {
        self.collection_runs_total
            .with_label_values(&[RunOutcome::Failed.as_str()])
            .inc();
    }
}
