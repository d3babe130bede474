//! Collection orchestrator: one bounded run per scrape.
//!
//! A run wires `source -> URL queue -> worker pool -> result channel ->
//! gauge store` and moves through
//! `Idle -> Running -> Draining -> Done`, or ends in `TimedOut` when the
//! deadline elapses first. A timed out run is not an error: the caller
//! serves whatever the store holds at that point.
//!
//! The feeder is driven as a future inside the run, joined together with
//! the worker pool, so nothing outlives the run. Results are applied while
//! the workers are still busy (the result channel is bounded), and one
//! final non-blocking drain runs after every worker has exited.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::gauge_store::{GaugeStore, ResultSink};
use crate::pool::{ProbeResult, WorkerPool, DEFAULT_WORKERS};
use crate::prober::Prober;
use crate::source::{SourceError, UrlSource, UrlStream};

/// Default capacity of the URL queue between feeder and workers.
pub const DEFAULT_URL_QUEUE_CAPACITY: usize = 100;

/// Default capacity of the result channel between workers and the sink.
pub const DEFAULT_RESULT_QUEUE_CAPACITY: usize = 1000;

/// Default deadline of a single collection run.
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables of a collection run.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub workers: usize,
    pub url_queue_capacity: usize,
    pub result_queue_capacity: usize,
    pub deadline: Duration,
    /// Allow only one run at a time instead of letting overlapping scrapes race.
    pub serialize_runs: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            url_queue_capacity: DEFAULT_URL_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_RESULT_QUEUE_CAPACITY,
            deadline: DEFAULT_SCRAPE_TIMEOUT,
            serialize_runs: false,
        }
    }
}

/// Lifecycle of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Done,
    TimedOut,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    /// URLs handed to the worker pool.
    pub urls_fed: usize,
    /// Store records skipped because they could not be read.
    pub skipped_rows: usize,
    /// Results written to the gauge store.
    pub results_applied: usize,
    /// Applied results that carried the failure status.
    pub probe_failures: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn timed_out(&self) -> bool {
        self.state == RunState::TimedOut
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("collection run aborted: {0}")]
    SourceOpen(#[from] SourceError),
}

#[derive(Default)]
struct RunCounters {
    fed: usize,
    skipped: usize,
}

/// Resources owned by one in-flight run.
struct CollectionRun {
    cancel: CancellationToken,
    sink: ResultSink,
    counters: RunCounters,
    state: RunState,
}

/// Drives collection runs against a shared gauge store.
pub struct Orchestrator {
    source: Arc<dyn UrlSource>,
    prober: Arc<dyn Prober>,
    store: GaugeStore,
    settings: OrchestratorSettings,
    run_lock: Option<Mutex<()>>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn UrlSource>,
        prober: Arc<dyn Prober>,
        store: GaugeStore,
        settings: OrchestratorSettings,
    ) -> Self {
        let run_lock = settings.serialize_runs.then(|| Mutex::new(()));
        Self {
            source,
            prober,
            store,
            settings,
            run_lock,
        }
    }

    pub fn store(&self) -> &GaugeStore {
        &self.store
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Performs one collection run bounded by the configured deadline.
    ///
    /// `parent` is the process-wide token; cancelling it ends the run early
    /// the same way the deadline does.
    ///
    /// # Errors
    /// Only a failure to open the URL source is returned. Probe failures,
    /// unreadable records and the deadline are reflected in the report.
    #[instrument(skip(self, parent), fields(workers = self.settings.workers))]
    pub async fn collect(&self, parent: &CancellationToken) -> Result<RunReport, CollectError> {
        let started = Instant::now();
        let (result_tx, result_rx) = mpsc::channel(self.settings.result_queue_capacity.max(1));

        let mut run = CollectionRun {
            cancel: parent.child_token(),
            sink: ResultSink::new(result_rx, self.store.clone()),
            counters: RunCounters::default(),
            state: RunState::Idle,
        };

        let outcome = timeout(self.settings.deadline, self.execute(&mut run, result_tx)).await;
        let cancelled_externally = run.cancel.is_cancelled();
        run.cancel.cancel();

        match outcome {
            Ok(Ok(())) if !cancelled_externally => {}
            Ok(Ok(())) => {
                warn!("Collection run cancelled by shutdown, serving partial snapshot");
                run.state = RunState::TimedOut;
            }
            Ok(Err(e)) => {
                error!("Collection run failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                // Results already queued by completed probes are still valid.
                let late = run.sink.drain();
                warn!(
                    "Collection run exceeded deadline of {:?} while {}, serving partial snapshot ({} late results applied)",
                    self.settings.deadline, run.state, late
                );
                run.state = RunState::TimedOut;
            }
        }

        let report = RunReport {
            state: run.state,
            urls_fed: run.counters.fed,
            skipped_rows: run.counters.skipped,
            results_applied: run.sink.applied(),
            probe_failures: run.sink.failures(),
            elapsed: started.elapsed(),
        };

        info!(
            state = %report.state,
            urls = report.urls_fed,
            results = report.results_applied,
            failures = report.probe_failures,
            skipped = report.skipped_rows,
            "Collection run finished in {:.3}s",
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    async fn execute(
        &self,
        run: &mut CollectionRun,
        results: mpsc::Sender<ProbeResult>,
    ) -> Result<(), CollectError> {
        let _serialized = match &self.run_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let urls = self.source.open().await?;

        let CollectionRun {
            cancel,
            sink,
            counters,
            state,
        } = run;
        let cancel = &*cancel;
        *state = RunState::Running;

        let (url_tx, url_rx) = mpsc::channel(self.settings.url_queue_capacity.max(1));
        let pool = WorkerPool::spawn(
            self.settings.workers,
            self.prober.clone(),
            url_rx,
            results,
            cancel.clone(),
        );

        let quiesced = async { tokio::join!(feed(urls, url_tx, cancel, counters), pool.join()) };
        tokio::pin!(quiesced);

        let mut sink_open = true;
        loop {
            tokio::select! {
                (_, forwarded) = &mut quiesced => {
                    debug!("Worker pool quiesced after forwarding {} results", forwarded);
                    break;
                }
                received = sink.recv(), if sink_open => {
                    sink_open = received;
                }
            }
        }

        *state = RunState::Draining;
        let drained = sink.drain();
        debug!("Final drain applied {} results", drained);

        *state = RunState::Done;
        Ok(())
    }
}

/// Moves URLs from the source into the bounded queue, skipping bad records.
/// Dropping `queue` on return closes it for the workers.
async fn feed(
    mut urls: UrlStream<'_>,
    queue: mpsc::Sender<String>,
    cancel: &CancellationToken,
    counters: &mut RunCounters,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = urls.next() => next,
        };

        match next {
            None => break,
            Some(Err(e)) => {
                warn!("Skipping URL record: {}", e);
                counters.skipped += 1;
            }
            Some(Ok(url)) => {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = queue.send(url) => sent,
                };
                if sent.is_err() {
                    break;
                }
                counters.fed += 1;
            }
        }
    }

    debug!(
        "Feeder finished: {} URLs queued, {} records skipped",
        counters.fed, counters.skipped
    );
}
