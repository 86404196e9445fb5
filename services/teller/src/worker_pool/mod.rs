//! Worker pool for fire-and-forget jobs
//!
//! A fixed number of workers consume one shared queue, so no more jobs run at once
//! than there are workers. Each job ends `Completed` or `Failed` and is announced
//! either way.

mod job;
mod pool;
mod stats;
mod worker;

// Re-export the main interface
pub use pool::WorkerPool;
pub use job::{CertificateDelivery, Job, JobContext, JobReport, Work};
pub use stats::PoolSnapshot;
