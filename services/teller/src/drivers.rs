//! Drivers that exercise the ledger and the pool the way the binary does
//!
//! Both return summaries instead of printing so tests can check the invariants.

use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shared::{ServiceError, WithdrawalOutcome};

use crate::config::PoolConfig;
use crate::ledger::Account;
use crate::worker_pool::{Job, JobReport, PoolSnapshot, WorkerPool};

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRecord {
    pub caller: String,
    pub amount: u64,
    pub outcome: WithdrawalOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceSummary {
    pub initial_balance: u64,
    pub final_balance: u64,
    pub records: Vec<WithdrawalRecord>,
}

impl RaceSummary {
    /// Sum of the amounts that were actually debited
    pub fn completed_total(&self) -> u64 {
        self.records
            .iter()
            .filter(|record| record.outcome.is_completed())
            .map(|record| record.amount)
            .sum()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.records
            .iter()
            .filter(|record| record.outcome.kind() == kind)
            .count()
    }
}

/// Fire one concurrent withdrawal per request at `account` and wait for all of them.
///
/// Callers are not coordinated beyond the account's own guard. If any withdrawal is
/// interrupted the race still waits for the others, then fails with that error.
pub async fn run_withdrawal_race(account: Arc<Account>, requests: &[(&str, u64)]) -> Result<RaceSummary> {
    let initial_balance = account.balance().await;
    info!(
        holder = %account.holder(),
        initial_balance,
        callers = requests.len(),
        "Starting withdrawal race"
    );

    let handles = requests.iter().map(|(caller, amount)| {
        let account = account.clone();
        let caller = caller.to_string();
        let amount = *amount;
        tokio::spawn(async move {
            let outcome = account.withdraw(&caller, amount).await;
            (caller, amount, outcome)
        })
    });

    let mut records = Vec::with_capacity(requests.len());
    let mut fatal: Option<ServiceError> = None;

    for joined in join_all(handles).await {
        let (caller, amount, outcome) = joined.context("withdrawal task panicked")?;
        match outcome {
            Ok(outcome) => records.push(WithdrawalRecord {
                caller,
                amount,
                outcome,
            }),
            Err(e) => {
                error!(caller = %caller, amount, error = %e, "Withdrawal failed");
                fatal.get_or_insert(e);
            }
        }
    }

    if let Some(e) = fatal {
        return Err(anyhow::Error::new(e).context("withdrawal race aborted"));
    }

    let summary = RaceSummary {
        initial_balance,
        final_balance: account.balance().await,
        records,
    };

    info!(
        final_balance = summary.final_balance,
        completed = summary.count("completed"),
        rejected = summary.count("rejected"),
        deferred = summary.count("deferred"),
        "Withdrawal race finished"
    );

    Ok(summary)
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub worker_count: usize,
    pub reports: Vec<JobReport>,
    pub stats: PoolSnapshot,
}

/// Send one certificate per recipient through a fresh pool, then close it and wait.
pub async fn run_certificate_dispatch(
    config: &PoolConfig,
    recipients: &[&str],
    interrupt: CancellationToken,
) -> Result<DispatchSummary> {
    let pool = WorkerPool::with_interrupt(config.worker_count, interrupt)?;

    for recipient in recipients {
        let job = Job::certificate(*recipient, config.job_duration())?;
        pool.submit(job).await?;
    }
    pool.close().await;

    let reports = pool.join().await;
    let stats = pool.stats();

    info!(
        pool_id = pool.id(),
        delivered = stats.completed,
        failed = stats.failed,
        peak_running = stats.peak_running,
        "Certificate dispatch finished"
    );

    Ok(DispatchSummary {
        worker_count: pool.worker_count(),
        reports,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sequential_requests_all_complete() {
        let account = Arc::new(Account::new("Pankaj", 10_000, Duration::ZERO).unwrap());
        let summary = run_withdrawal_race(account, &[("Wifey", 2_000)]).await.unwrap();

        assert_eq!(summary.count("completed"), 1);
        assert_eq!(summary.final_balance, 8_000);
        assert_eq!(summary.completed_total(), 2_000);
    }

    #[tokio::test]
    async fn test_blank_recipient_fails_dispatch() {
        let config = PoolConfig {
            worker_count: 1,
            job_duration_ms: 1,
        };
        let result = run_certificate_dispatch(&config, &["Amit", ""], CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
