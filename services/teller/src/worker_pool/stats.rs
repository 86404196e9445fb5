//! Pool counters
//!
//! Updated by workers, readable from anywhere at any time.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use shared::JobStatus;

#[derive(Debug, Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub running: usize,
    pub peak_running: usize,
}

impl PoolSnapshot {
    /// Jobs accepted but not yet in a terminal state
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }
}

/// Held by a worker for as long as a job body runs
pub(crate) struct RunningJob<'a> {
    stats: &'a PoolStats,
}

impl Drop for RunningJob<'_> {
    fn drop(&mut self) {
        let now = self.stats.running.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("pool_jobs_running").set(now as f64);
    }
}

impl PoolStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("pool_jobs_submitted_total").increment(1);
    }

    pub(crate) fn begin(&self) -> RunningJob<'_> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now, Ordering::SeqCst);
        metrics::gauge!("pool_jobs_running").set(now as f64);
        RunningJob { stats: self }
    }

    pub(crate) fn record_finished(&self, status: JobStatus) {
        match status {
            JobStatus::Completed => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("pool_jobs_total", "status" => "completed").increment(1);
            }
            JobStatus::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("pool_jobs_total", "status" => "failed").increment(1);
            }
            JobStatus::Queued | JobStatus::Running => {}
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
            peak_running: self.peak_running.load(Ordering::SeqCst),
        }
    }
}
