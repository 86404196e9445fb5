//! Jobs and the work they carry
//!
//! A job is consumed exactly once by exactly one worker. Its body is any `Work`
//! implementation; certificate delivery is the stock one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use shared::{JobId, JobStatus, Label, ServiceError};

/// Body of a job
#[async_trait]
pub trait Work: Send + 'static {
    async fn run(self: Box<Self>, ctx: JobContext) -> anyhow::Result<()>;
}

/// What a running job knows about itself
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub label: Label,
    pub worker: String,
    interrupt: CancellationToken,
}

impl JobContext {
    pub(crate) fn new(job_id: JobId, label: Label, worker: String, interrupt: CancellationToken) -> Self {
        Self {
            job_id,
            label,
            worker,
            interrupt,
        }
    }

    /// Suspend for `duration`, failing with `Interrupted` if the pool is interrupted first
    pub async fn pause(&self, duration: Duration) -> shared::Result<()> {
        tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => {
                Err(ServiceError::job_interrupted(&self.label, "simulated_duration"))
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

pub struct Job {
    id: JobId,
    label: Label,
    work: Box<dyn Work>,
}

impl Job {
    pub fn new(label: impl Into<String>, work: impl Work) -> shared::Result<Self> {
        Ok(Self {
            id: JobId::new(),
            label: Label::new(label)?,
            work: Box::new(work),
        })
    }

    /// Job whose body is an async closure
    pub fn from_fn<F, Fut>(label: impl Into<String>, body: F) -> shared::Result<Self>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(label, FnWork(body))
    }

    /// Deliver a certificate to `recipient`, taking `duration`
    pub fn certificate(recipient: impl Into<String>, duration: Duration) -> shared::Result<Self> {
        Self::new(recipient, CertificateDelivery { duration })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub(crate) fn into_parts(self) -> (JobId, Label, Box<dyn Work>) {
        (self.id, self.label, self.work)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

struct FnWork<F>(F);

#[async_trait]
impl<F, Fut> Work for FnWork<F>
where
    F: FnOnce(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(self: Box<Self>, ctx: JobContext) -> anyhow::Result<()> {
        let FnWork(body) = *self;
        body(ctx).await
    }
}

/// Sends one certificate; delivery itself is simulated by waiting
pub struct CertificateDelivery {
    pub duration: Duration,
}

#[async_trait]
impl Work for CertificateDelivery {
    async fn run(self: Box<Self>, ctx: JobContext) -> anyhow::Result<()> {
        tracing::debug!(
            recipient = %ctx.label,
            worker = %ctx.worker,
            duration_ms = self.duration.as_millis() as u64,
            "Sending certificate"
        );
        ctx.pause(self.duration).await?;
        Ok(())
    }
}

/// Terminal record of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub label: Label,
    pub worker: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Map a failed body onto the shared error taxonomy, keeping interruptions intact
pub(crate) fn classify_failure(label: &Label, error: anyhow::Error) -> ServiceError {
    match error.downcast::<ServiceError>() {
        Ok(service_error) => service_error,
        Err(other) => ServiceError::job_failed(label, format!("{:#}", other)),
    }
}
