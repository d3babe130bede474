//! Bookmarks Alive Exporter Library
//!
//! This library provides the on-demand collection pipeline behind the
//! exporter: every scrape reads the bookmarked URLs from the backing store,
//! probes them with a bounded worker pool and publishes the latest HTTP
//! status per URL as a labeled gauge.
//!
//! # Pipeline
//!
//! - **Source**: lazily yields URLs from SQLite ([`source::SqliteSource`])
//! - **Prober**: one bounded HTTP GET per URL ([`prober::HttpProber`])
//! - **Worker pool**: fixed number of probe workers draining a bounded queue
//! - **Gauge store**: concurrent `url -> status` map exposed to Prometheus
//! - **Orchestrator**: owns the deadline and cancellation of a single run
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bookmarks_alive_exporter::{
//!     GaugeStore, HttpProber, Orchestrator, OrchestratorSettings, StaticSource,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = GaugeStore::new()?;
//! let source = Arc::new(StaticSource::new(vec!["https://example.com".to_string()]));
//! let prober = Arc::new(HttpProber::new("bookmarks-alive-exporter/0.1", Duration::from_secs(5))?);
//!
//! let orchestrator = Orchestrator::new(source, prober, store.clone(), OrchestratorSettings::default());
//! let report = orchestrator.collect(&CancellationToken::new()).await?;
//!
//! println!("{:?}: {:?}", report.state, store.get("https://example.com"));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod gauge_store;
pub mod handlers;
pub mod metrics;
pub mod orchestrator;
pub mod pool;
pub mod prober;
pub mod run_stats;
pub mod server;
pub mod source;
pub mod state;

// Re-export main types for convenience
pub use gauge_store::{GaugeStore, ResultSink};
pub use orchestrator::{CollectError, Orchestrator, OrchestratorSettings, RunReport, RunState};
pub use pool::{ProbeResult, WorkerPool};
pub use prober::{HttpProber, Prober, FAILURE_STATUS};
pub use source::{SourceError, SqliteSource, StaticSource, UrlSource, UrlStream};
