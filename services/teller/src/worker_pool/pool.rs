//! Worker pool management
//!
//! A fixed set of workers sharing one unbounded job queue. Closing the pool drops the
//! queue's sender, so workers finish whatever is queued and then exit on their own.
//! The last worker to exit moves the pool to `Terminated`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use shared::{JobId, PoolState, ServiceError};

use super::job::{Job, JobReport};
use super::stats::{PoolSnapshot, PoolStats};
use super::worker::Worker;

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

/// Pool state shared with the workers, plus how many of them are still running
pub(crate) struct Lifecycle {
    pool_id: usize,
    live_workers: AtomicUsize,
    state: watch::Sender<PoolState>,
}

impl Lifecycle {
    fn new(pool_id: usize, worker_count: usize) -> Self {
        let (state, _) = watch::channel(PoolState::Open);
        Self {
            pool_id,
            live_workers: AtomicUsize::new(worker_count),
            state,
        }
    }

    fn current(&self) -> PoolState {
        *self.state.borrow()
    }

    fn begin_closing(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == PoolState::Open {
                *state = PoolState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// Called once by each worker on its way out
    pub(crate) fn worker_exited(&self) {
        if self.live_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.send_replace(PoolState::Terminated);
            tracing::info!(pool_id = self.pool_id, "Last worker exited, pool terminated");
        }
    }

    async fn terminated(&self) {
        let mut state = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once terminated
        let _ = state.wait_for(|state| *state == PoolState::Terminated).await;
    }
}

/// Pool of workers for fire-and-forget jobs
pub struct WorkerPool {
    id: usize,
    worker_count: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    lifecycle: Arc<Lifecycle>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    reports: Mutex<mpsc::UnboundedReceiver<JobReport>>,
    stats: Arc<PoolStats>,
    interrupt: CancellationToken,
}

impl WorkerPool {
    /// Create a pool and spawn its workers. Must be called from within a tokio runtime.
    pub fn new(worker_count: usize) -> shared::Result<Self> {
        Self::with_interrupt(worker_count, CancellationToken::new())
    }

    /// Like `new`, with jobs' simulated durations tied to an external interrupt token
    pub fn with_interrupt(worker_count: usize, interrupt: CancellationToken) -> shared::Result<Self> {
        if worker_count == 0 {
            return Err(ServiceError::invalid_config(
                "worker_count",
                "a pool needs at least one worker",
            ));
        }

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (report_sender, report_receiver) = mpsc::unbounded_channel();
        let queue = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(PoolStats::default());
        let lifecycle = Arc::new(Lifecycle::new(id, worker_count));

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 1..=worker_count {
            let worker = Worker::new(
                id,
                worker_id,
                queue.clone(),
                report_sender.clone(),
                stats.clone(),
                interrupt.clone(),
                lifecycle.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        tracing::info!(pool_id = id, worker_count, "Worker pool started");

        Ok(Self {
            id,
            worker_count,
            sender: Mutex::new(Some(sender)),
            lifecycle,
            handles: Mutex::new(handles),
            reports: Mutex::new(report_receiver),
            stats,
            interrupt,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub async fn state(&self) -> PoolState {
        self.lifecycle.current()
    }

    pub fn stats(&self) -> PoolSnapshot {
        self.stats.snapshot()
    }

    /// Queue a job for the next free worker. Never waits for a worker.
    pub async fn submit(&self, job: Job) -> shared::Result<JobId> {
        let guard = self.sender.lock().await;
        let Some(sender) = guard.as_ref() else {
            tracing::warn!(pool_id = self.id, label = %job.label(), "Submission refused, pool closed");
            return Err(ServiceError::pool_closed(job.label()));
        };

        let job_id = job.id();
        let label = job.label().clone();
        sender
            .send(job)
            .map_err(|rejected| ServiceError::pool_closed(rejected.0.label()))?;
        self.stats.record_submitted();

        tracing::debug!(pool_id = self.id, job_id = %job_id, label = %label, "Job queued");
        Ok(job_id)
    }

    /// Stop accepting jobs. Queued and running jobs still run to completion.
    pub async fn close(&self) {
        let mut sender = self.sender.lock().await;
        if sender.take().is_none() {
            return;
        }

        // Workers may already have drained and terminated the pool
        self.lifecycle.begin_closing();
        tracing::info!(
            pool_id = self.id,
            queued_or_running = self.stats.snapshot().outstanding(),
            "Worker pool closing, draining queue"
        );
    }

    /// Interrupt the simulated duration of every running and future job.
    ///
    /// Interrupted jobs end `Failed` but are still announced; the pool keeps draining.
    pub fn interrupt(&self) {
        tracing::warn!(pool_id = self.id, "Worker pool interrupted");
        self.interrupt.cancel();
    }

    /// Close the pool, wait for every worker to exit and return the job reports.
    ///
    /// Reports come back in completion order. Every caller waits for termination, but
    /// reports are handed out once: concurrent or later calls get what is left.
    pub async fn join(&self) -> Vec<JobReport> {
        self.close().await;

        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(pool_id = self.id, error = %e, "Worker task ended abnormally");
            }
        }
        self.lifecycle.terminated().await;

        let mut reports = Vec::new();
        let mut receiver = self.reports.lock().await;
        while let Ok(report) = receiver.try_recv() {
            reports.push(report);
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            pool_id = self.id,
            submitted = stats.submitted,
            completed = stats.completed,
            failed = stats.failed,
            peak_running = stats.peak_running,
            "Worker pool joined"
        );

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let error = WorkerPool::new(0).err().unwrap();
        assert_eq!(error.code, "VALIDATION_INVALID_CONFIG");
    }

    #[tokio::test]
    async fn test_submit_after_close_refused() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.state().await, PoolState::Open);

        pool.close().await;
        assert_eq!(pool.state().await, PoolState::Closing);

        let job = Job::certificate("Amit", Duration::from_millis(1)).unwrap();
        let error = pool.submit(job).await.unwrap_err();
        assert_eq!(error.code, "UNAVAILABLE_POOL_CLOSED");

        assert!(pool.join().await.is_empty());
        assert_eq!(pool.state().await, PoolState::Terminated);
    }

    #[tokio::test]
    async fn test_join_drains_queue() {
        let pool = WorkerPool::new(2).unwrap();
        for name in ["Amit", "Priya", "Rahul", "Sneha", "Vikram"] {
            let job = Job::certificate(name, Duration::from_millis(20)).unwrap();
            pool.submit(job).await.unwrap();
        }

        let reports = pool.join().await;
        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(JobReport::is_completed));

        let stats = pool.stats();
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.running, 0);
        assert!(stats.peak_running <= 2);

        // Reports are handed out once
        assert!(pool.join().await.is_empty());
    }

    #[tokio::test]
    async fn test_worker_names_are_pool_scoped() {
        let pool = WorkerPool::new(1).unwrap();
        let job = Job::certificate("Neha", Duration::from_millis(1)).unwrap();
        pool.submit(job).await.unwrap();

        let reports = pool.join().await;
        assert_eq!(reports[0].worker, format!("pool-{}-worker-1", pool.id()));
    }

    #[tokio::test]
    async fn test_close_without_join_reaches_terminated() {
        let pool = WorkerPool::new(2).unwrap();
        for name in ["Amit", "Priya", "Rahul"] {
            let job = Job::certificate(name, Duration::from_millis(10)).unwrap();
            pool.submit(job).await.unwrap();
        }
        pool.close().await;

        tokio::time::timeout(Duration::from_secs(5), pool.lifecycle.terminated())
            .await
            .expect("pool never terminated after close");
        assert_eq!(pool.state().await, PoolState::Terminated);
        assert_eq!(pool.stats().completed, 3);
    }
}
