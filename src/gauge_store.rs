//! Per-URL status gauge store and the result sink feeding it.
//!
//! The [`GaugeStore`] lives for the whole process and is shared between the
//! orchestrator (writer) and the exposition path (reader). It implements
//! [`prometheus::core::Collector`], so registering it once makes every
//! stored status show up as `bookmarks_alive_status{url="..."}`.
//!
//! Readers may observe a partially updated store while a run is in
//! progress; concurrent runs race on it with last-writer-wins.

use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{trace, warn};

use crate::pool::ProbeResult;
use crate::prober::FAILURE_STATUS;

/// Name of the exported status gauge.
pub const STATUS_METRIC_NAME: &str = "bookmarks_alive_status";

/// Help text of the exported status gauge.
pub const STATUS_METRIC_HELP: &str = "HTTP status code of the bookmarked URL";

/// Label carrying the probed URL.
pub const URL_LABEL: &str = "url";

struct Inner {
    values: DashMap<String, u16, RandomState>,
    opts: Opts,
    template: GaugeVec,
}

/// Thread-safe `url -> last status` map exposed as a Prometheus gauge.
#[derive(Clone)]
pub struct GaugeStore {
    inner: Arc<Inner>,
}

impl GaugeStore {
    pub fn new() -> Result<Self, prometheus::Error> {
        let opts = Opts::new(STATUS_METRIC_NAME, STATUS_METRIC_HELP);
        let template = GaugeVec::new(opts.clone(), &[URL_LABEL])?;

        Ok(Self {
            inner: Arc::new(Inner {
                values: DashMap::with_hasher(RandomState::new()),
                opts,
                template,
            }),
        })
    }

    /// Upserts the status for a URL; the latest write wins.
    pub fn update(&self, result: &ProbeResult) {
        self.set(&result.url, result.status);
    }

    pub fn set(&self, url: &str, status: u16) {
        self.inner.values.insert(url.to_string(), status);
    }

    pub fn get(&self, url: &str) -> Option<u16> {
        self.inner.values.get(url).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Returns all entries sorted by URL.
    pub fn snapshot(&self) -> Vec<(String, u16)> {
        let mut entries: Vec<(String, u16)> = self
            .inner
            .values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort();
        entries
    }
}

impl std::fmt::Debug for GaugeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl Collector for GaugeStore {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.template.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let gauges = match GaugeVec::new(self.inner.opts.clone(), &[URL_LABEL]) {
            Ok(gauges) => gauges,
            Err(e) => {
                warn!("Failed to build status gauge family: {}", e);
                return Vec::new();
            }
        };

        for entry in self.inner.values.iter() {
            gauges
                .with_label_values(&[entry.key().as_str()])
                .set(f64::from(*entry.value()));
        }

        gauges.collect()
    }
}

/// Consumer end of a run's result channel, applying results to the store.
pub struct ResultSink {
    results: mpsc::Receiver<ProbeResult>,
    store: GaugeStore,
    applied: usize,
    failures: usize,
}

impl ResultSink {
    pub fn new(results: mpsc::Receiver<ProbeResult>, store: GaugeStore) -> Self {
        Self {
            results,
            store,
            applied: 0,
            failures: 0,
        }
    }

    /// Waits for the next result and applies it.
    ///
    /// Returns `false` once every producer is gone and the channel is empty.
    pub async fn recv(&mut self) -> bool {
        match self.results.recv().await {
            Some(result) => {
                self.apply(result);
                true
            }
            None => false,
        }
    }

    /// Applies every result that is immediately available and returns how
    /// many were applied. Never waits for producers.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.results.try_recv() {
                Ok(result) => {
                    self.apply(result);
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    /// Total results applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Results applied so far that carried the failure status.
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn apply(&mut self, result: ProbeResult) {
        trace!(url = %result.url, status = result.status, "applying probe result");
        if result.status == FAILURE_STATUS {
            self.failures += 1;
        }
        self.store.update(&result);
        self.applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, Registry, TextEncoder};

    fn result(url: &str, status: u16) -> ProbeResult {
        ProbeResult {
            url: url.to_string(),
            status,
        }
    }

    #[test]
    fn test_last_write_wins() {
        let store = GaugeStore::new().unwrap();
        store.update(&result("http://a.test", 500));
        store.update(&result("http://a.test", 200));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("http://a.test"), Some(200));
        assert_eq!(store.get("http://missing.test"), None);
    }

    #[test]
    fn test_exposition_has_one_series_per_url() {
        let store = GaugeStore::new().unwrap();
        let registry = Registry::new();
        registry.register(Box::new(store.clone())).unwrap();

        store.set("http://a.test", 200);
        store.set("http://b.test", 0);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("bookmarks_alive_status{url=\"http://a.test\"} 200"));
        assert!(text.contains("bookmarks_alive_status{url=\"http://b.test\"} 0"));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let store = GaugeStore::new().unwrap();
        store.set("http://b.test", 404);
        store.set("http://a.test", 200);
        assert_eq!(
            store.snapshot(),
            vec![
                ("http://a.test".to_string(), 200),
                ("http://b.test".to_string(), 404)
            ]
        );
    }

    #[tokio::test]
    async fn test_drain_on_empty_channel_is_noop() {
        let store = GaugeStore::new().unwrap();
        let (tx, rx) = mpsc::channel(4);
        let mut sink = ResultSink::new(rx, store.clone());

        assert_eq!(sink.drain(), 0);
        assert_eq!(sink.drain(), 0);
        assert!(store.is_empty());

        tx.send(result("http://a.test", 0)).await.unwrap();
        tx.send(result("http://b.test", 301)).await.unwrap();
        assert_eq!(sink.drain(), 2);
        assert_eq!(sink.applied(), 2);
        assert_eq!(sink.failures(), 1);

        drop(tx);
        assert_eq!(sink.drain(), 0);
        assert!(!sink.recv().await);
    }
}
