//! Fixed-size pool of probe workers.
//!
//! Workers share one bounded URL queue and one bounded result channel. Each
//! worker loops: take the next URL, probe it, forward the result. A worker
//! exits when the queue is closed and drained, when the result channel is
//! gone, or as soon as the run's cancellation token fires. The number of
//! in-flight probes therefore never exceeds the pool size.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::prober::Prober;

/// Default number of concurrent probe workers.
pub const DEFAULT_WORKERS: usize = 20;

/// Outcome of probing one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub url: String,
    pub status: u16,
}

/// Handle to a running set of probe workers.
pub struct WorkerPool {
    workers: JoinSet<usize>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one) draining `urls` into `results`.
    pub fn spawn(
        size: usize,
        prober: Arc<dyn Prober>,
        urls: mpsc::Receiver<String>,
        results: mpsc::Sender<ProbeResult>,
        cancel: CancellationToken,
    ) -> Self {
        let urls = Arc::new(Mutex::new(urls));
        let mut workers = JoinSet::new();

        for id in 0..size.max(1) {
            workers.spawn(run_worker(
                id,
                prober.clone(),
                urls.clone(),
                results.clone(),
                cancel.clone(),
            ));
        }

        debug!("Spawned {} probe workers", size.max(1));
        Self { workers }
    }

    /// Waits for every worker to exit and returns how many results they
    /// forwarded in total.
    pub async fn join(mut self) -> usize {
        let mut forwarded = 0;
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(count) => forwarded += count,
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("Probe worker panicked: {}", e),
            }
        }
        forwarded
    }
}

async fn run_worker(
    id: usize,
    prober: Arc<dyn Prober>,
    urls: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<ProbeResult>,
    cancel: CancellationToken,
) -> usize {
    let mut forwarded = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = async { urls.lock().await.recv().await } => next,
        };
        let Some(url) = next else {
            break;
        };

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            status = prober.probe(&url) => status,
        };
        trace!(worker = id, url = %url, status, "probe finished");

        let result = ProbeResult { url, status };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = results.send(result) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        forwarded += 1;
    }

    trace!(worker = id, forwarded, "probe worker exiting");
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedProber(u16);

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _url: &str) -> u16 {
            self.0
        }
    }

    struct HangingProber;

    #[async_trait]
    impl Prober for HangingProber {
        async fn probe(&self, _url: &str) -> u16 {
            std::future::pending::<u16>().await
        }
    }

    #[tokio::test]
    async fn test_pool_drains_closed_queue() {
        let (url_tx, url_rx) = mpsc::channel(4);
        let (result_tx, mut result_rx) = mpsc::channel(16);
        let pool = WorkerPool::spawn(
            3,
            Arc::new(FixedProber(204)),
            url_rx,
            result_tx,
            CancellationToken::new(),
        );

        for i in 0..10 {
            url_tx.send(format!("http://{i}.test")).await.unwrap();
        }
        drop(url_tx);

        let forwarded = pool.join().await;
        assert_eq!(forwarded, 10);

        let mut received = Vec::new();
        while let Ok(result) = result_rx.try_recv() {
            assert_eq!(result.status, 204);
            received.push(result.url);
        }
        received.sort();
        received.dedup();
        assert_eq!(received.len(), 10);
    }

    #[tokio::test]
    async fn test_zero_size_still_spawns_one_worker() {
        let (url_tx, url_rx) = mpsc::channel::<String>(1);
        let (result_tx, mut result_rx) = mpsc::channel(1);
        let pool = WorkerPool::spawn(
            0,
            Arc::new(FixedProber(200)),
            url_rx,
            result_tx,
            CancellationToken::new(),
        );

        url_tx.send("http://only.test".to_string()).await.unwrap();
        drop(url_tx);

        let forwarded = tokio::time::timeout(Duration::from_secs(1), pool.join())
            .await
            .expect("a zero-sized pool must still drain the queue");
        assert_eq!(forwarded, 1);
        assert_eq!(result_rx.try_recv().unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_cancellation_stops_hanging_workers() {
        let (url_tx, url_rx) = mpsc::channel(4);
        let (result_tx, mut result_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(2, Arc::new(HangingProber), url_rx, result_tx, cancel.clone());

        url_tx.send("http://a.test".to_string()).await.unwrap();
        url_tx.send("http://b.test".to_string()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let forwarded = tokio::time::timeout(Duration::from_secs(1), pool.join())
            .await
            .expect("workers must exit promptly after cancellation");
        assert_eq!(forwarded, 0);
        assert!(result_rx.try_recv().is_err());
    }
}
