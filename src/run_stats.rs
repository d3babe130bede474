//! Collection run statistics backing the `/health` endpoint.
//!
//! Counters are lock-free atomics updated by scrape handlers; sampled values
//! keep last/avg/max/min so the health table can show trends without a
//! history buffer.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::orchestrator::{RunReport, RunState};

/// Running statistics for a single sampled value.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = Self {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// How the most recent scrape-triggered run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Done,
    TimedOut,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }
}

impl From<RunState> for RunOutcome {
    fn from(state: RunState) -> Self {
        match state {
            RunState::TimedOut => Self::TimedOut,
            _ => Self::Done,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LastRun {
    pub outcome: RunOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Aggregated statistics over all collection runs of this process.
pub struct RunStats {
    pub runs_total: AtomicU64,
    pub runs_done: AtomicU64,
    pub runs_timed_out: AtomicU64,
    pub runs_failed: AtomicU64,
    pub probes_total: AtomicU64,
    pub probe_failures_total: AtomicU64,
    pub skipped_rows_total: AtomicU64,
    pub scrape_requests: AtomicU64,

    pub run_duration_seconds: Stat,
    pub urls_per_run: Stat,

    pub start_time: Instant,
    last_run: StdRwLock<Option<LastRun>>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            runs_total: AtomicU64::new(0),
            runs_done: AtomicU64::new(0),
            runs_timed_out: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            probes_total: AtomicU64::new(0),
            probe_failures_total: AtomicU64::new(0),
            skipped_rows_total: AtomicU64::new(0),
            scrape_requests: AtomicU64::new(0),
            run_duration_seconds: Stat::default(),
            urls_per_run: Stat::default(),
            start_time: Instant::now(),
            last_run: StdRwLock::new(None),
        }
    }
}

impl RunStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_scrape_request(&self) {
        self.scrape_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a run that reached a terminal state.
    pub fn record_run(&self, report: &RunReport) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        match report.state {
            RunState::TimedOut => self.runs_timed_out.fetch_add(1, Ordering::Relaxed),
            _ => self.runs_done.fetch_add(1, Ordering::Relaxed),
        };
        self.probes_total
            .fetch_add(report.results_applied as u64, Ordering::Relaxed);
        self.probe_failures_total
            .fetch_add(report.probe_failures as u64, Ordering::Relaxed);
        self.skipped_rows_total
            .fetch_add(report.skipped_rows as u64, Ordering::Relaxed);
        self.run_duration_seconds
            .add_sample(report.elapsed.as_secs_f64());
        self.urls_per_run.add_sample(report.urls_fed as f64);
        self.set_last_run(RunOutcome::from(report.state));
    }

    /// Records a run aborted because the URL source could not be opened.
    pub fn record_failure(&self) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_run(RunOutcome::Failed);
    }

    pub fn last_run(&self) -> Option<LastRun> {
        self.last_run.read().ok().and_then(|guard| *guard)
    }

    /// True unless the most recent run failed to open the URL source.
    pub fn is_healthy(&self) -> bool {
        self.last_run()
            .map(|run| run.outcome != RunOutcome::Failed)
            .unwrap_or(true)
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn set_last_run(&self, outcome: RunOutcome) {
        if let Ok(mut guard) = self.last_run.write() {
            *guard = Some(LastRun {
                outcome,
                finished_at: Utc::now(),
            });
        }
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - COLLECTION RUN STATS").ok();
        writeln!(out, "======================================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        let sampled = [
            ("run_duration (s)", &self.run_duration_seconds, 3usize),
            ("urls_per_run", &self.urls_per_run, 0usize),
        ];
        for (name, stat, precision) in sampled {
            let (cur, avg, max, min, _) = stat.snapshot();
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.p$}", cur, p = precision),
                format!("{:.3}", avg),
                format!("{:.p$}", max, p = precision),
                format!("{:.p$}", min, p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "COUNTERS").ok();
        writeln!(out, "--------").ok();

        let counters = [
            ("scrape_requests", &self.scrape_requests),
            ("runs_total", &self.runs_total),
            ("runs_done", &self.runs_done),
            ("runs_timed_out", &self.runs_timed_out),
            ("runs_failed", &self.runs_failed),
            ("probes_total", &self.probes_total),
            ("probe_failures_total", &self.probe_failures_total),
            ("skipped_rows_total", &self.skipped_rows_total),
        ];
        for (name, counter) in counters {
            writeln!(
                out,
                "{:left$} | {:>col$}",
                name,
                counter.load(Ordering::Relaxed),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        let last_run = match self.last_run() {
            Some(run) => format!("{} at {}", run.outcome.as_str(), run.finished_at.to_rfc3339()),
            None => "N/A".to_string(),
        };
        writeln!(out, "Last run: {}", last_run).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report(state: RunState, urls: usize, failures: usize) -> RunReport {
        RunReport {
            state,
            urls_fed: urls,
            skipped_rows: 1,
            results_applied: urls,
            probe_failures: failures,
            elapsed: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_running_stat_tracks_extremes() {
        let mut stat = RunningStat::default();
        for value in [3.0, 1.0, 5.0] {
            stat.add(value);
        }
        assert_eq!(stat.min, 1.0);
        assert_eq!(stat.max, 5.0);
        assert_eq!(stat.last, 5.0);
        assert_eq!(stat.avg(), 3.0);
    }

    #[test]
    fn test_record_runs_and_failure() {
        let stats = RunStats::new();
        assert!(stats.is_healthy());
        assert!(stats.last_run().is_none());

        stats.record_run(&report(RunState::Done, 3, 1));
        stats.record_run(&report(RunState::TimedOut, 2, 0));

        assert_eq!(stats.runs_total.load(Ordering::Relaxed), 2);
        assert_eq!(stats.runs_done.load(Ordering::Relaxed), 1);
        assert_eq!(stats.runs_timed_out.load(Ordering::Relaxed), 1);
        assert_eq!(stats.probes_total.load(Ordering::Relaxed), 5);
        assert_eq!(stats.probe_failures_total.load(Ordering::Relaxed), 1);
        assert_eq!(stats.skipped_rows_total.load(Ordering::Relaxed), 2);
        assert_eq!(stats.last_run().unwrap().outcome, RunOutcome::TimedOut);
        assert!(stats.is_healthy());

        stats.record_failure();
        assert!(!stats.is_healthy());
        assert_eq!(stats.runs_failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_render_table_lists_counters() {
        let stats = RunStats::new();
        stats.record_scrape_request();
        stats.record_run(&report(RunState::Done, 4, 0));

        let table = stats.render_table();
        assert!(table.contains("runs_total"));
        assert!(table.contains("run_duration (s)"));
        assert!(table.contains("Last run: done"));
    }
}
