//! Individual worker implementation
//!
//! Takes jobs off the shared queue one at a time until the queue is closed and empty.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use shared::{JobStatus, ServiceError};

use super::job::{classify_failure, Job, JobContext, JobReport};
use super::pool::Lifecycle;
use super::stats::PoolStats;

/// Receiving end of the job queue, shared by every worker of a pool
pub(crate) type SharedQueue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

pub(crate) struct Worker {
    pub id: usize,
    pub name: String,
    queue: SharedQueue,
    reports: mpsc::UnboundedSender<JobReport>,
    stats: Arc<PoolStats>,
    interrupt: CancellationToken,
    lifecycle: Arc<Lifecycle>,
}

/// Reports the worker's exit to the pool, even if the loop unwinds
struct ExitGuard<'a>(&'a Lifecycle);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}

impl Worker {
    pub fn new(
        pool_id: usize,
        id: usize,
        queue: SharedQueue,
        reports: mpsc::UnboundedSender<JobReport>,
        stats: Arc<PoolStats>,
        interrupt: CancellationToken,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            id,
            name: format!("pool-{}-worker-{}", pool_id, id),
            queue,
            reports,
            stats,
            interrupt,
            lifecycle,
        }
    }

    /// Run the worker's main loop
    pub async fn run(self) {
        info!(worker = %self.name, worker_id = self.id, "Worker started");
        let _exit = ExitGuard(&self.lifecycle);

        loop {
            // Only one worker waits on the queue at a time; the rest wait for the lock
            let next = {
                let mut queue = self.queue.lock().await;
                queue.recv().await
            };

            let Some(job) = next else {
                break;
            };

            let report = self.execute(job).await;
            if self.reports.send(report).is_err() {
                warn!(worker = %self.name, "Report channel closed, dropping job report");
            }
        }

        info!(worker = %self.name, worker_id = self.id, "Queue closed and drained, worker stopped");
    }

    async fn execute(&self, job: Job) -> JobReport {
        let (job_id, label, work) = job.into_parts();
        let started_at = Utc::now();

        info!(job_id = %job_id, label = %label, worker = %self.name, "Starting job");

        let ctx = JobContext::new(job_id, label.clone(), self.name.clone(), self.interrupt.clone());
        let running = self.stats.begin();
        let result = AssertUnwindSafe(work.run(ctx)).catch_unwind().await;
        drop(running);

        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(classify_failure(&label, e)),
            Err(payload) => Some(ServiceError::job_panicked(&label, panic_message(&*payload))),
        };

        let status = if error.is_none() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.stats.record_finished(status);

        if let Some(e) = &error {
            error!(
                job_id = %job_id,
                label = %label,
                worker = %self.name,
                error = %e,
                "Job failed"
            );
        }

        // Announced whatever the terminal state
        info!(
            job_id = %job_id,
            label = %label,
            worker = %self.name,
            status = ?status,
            "Job completed"
        );

        JobReport {
            job_id,
            label,
            worker: self.name.clone(),
            status,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let static_payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*static_payload), "boom");

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(&*owned_payload), "kaboom");

        let other_payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*other_payload), "non-string panic payload");
    }
}
