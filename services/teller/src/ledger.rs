//! Guarded ledger
//!
//! One balance behind one guard. Withdrawals never queue for the guard: a caller that
//! finds it held is told so (`Deferred`) and goes on with something else.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shared::{Label, ServiceError, WithdrawalOutcome};

use crate::config::LedgerConfig;

/// Account whose balance is only touched while its guard is held
pub struct Account {
    holder: Label,
    balance: Mutex<u64>,
    processing_delay: Duration,
    interrupt: CancellationToken,
    counters: LedgerCounters,
}

/// Point-in-time view of an account
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub holder: Label,
    pub balance: u64,
    pub completed: u64,
    pub rejected: u64,
    pub deferred: u64,
    pub interrupted: u64,
    pub peak_concurrency: usize,
}

#[derive(Default)]
struct LedgerCounters {
    completed: AtomicU64,
    rejected: AtomicU64,
    deferred: AtomicU64,
    interrupted: AtomicU64,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl LedgerCounters {
    fn enter(&self) -> CriticalSection<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        CriticalSection { counters: self }
    }

    fn record(&self, outcome: &WithdrawalOutcome) {
        let counter = match outcome {
            WithdrawalOutcome::Completed { .. } => &self.completed,
            WithdrawalOutcome::Rejected { .. } => &self.rejected,
            WithdrawalOutcome::Deferred { .. } => &self.deferred,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("ledger_withdrawals_total", "outcome" => outcome.kind()).increment(1);
    }

    fn record_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("ledger_withdrawals_total", "outcome" => "interrupted").increment(1);
    }
}

/// Marks a caller as inside the read-modify-write section
struct CriticalSection<'a> {
    counters: &'a LedgerCounters,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Account {
    pub fn new(
        holder: impl Into<String>,
        initial_balance: u64,
        processing_delay: Duration,
    ) -> shared::Result<Self> {
        Ok(Self {
            holder: Label::new(holder)?,
            balance: Mutex::new(initial_balance),
            processing_delay,
            interrupt: CancellationToken::new(),
            counters: LedgerCounters::default(),
        })
    }

    pub fn from_config(config: &LedgerConfig) -> shared::Result<Self> {
        Self::new(
            config.holder.clone(),
            config.initial_balance,
            config.processing_delay(),
        )
    }

    /// Tie processing delays to an external interrupt token (e.g. a shutdown signal)
    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn holder(&self) -> &Label {
        &self.holder
    }

    /// Current balance. Unlike `withdraw`, this waits for the guard.
    pub async fn balance(&self) -> u64 {
        *self.balance.lock().await
    }

    /// Interrupt every processing delay that is running now or starts later.
    ///
    /// Affected withdrawals fail with an `Interrupted` error and debit nothing.
    pub fn interrupt(&self) {
        warn!(holder = %self.holder, "Account interrupted");
        self.interrupt.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_cancelled()
    }

    /// Highest number of callers ever observed inside the critical section
    pub fn peak_concurrency(&self) -> usize {
        self.counters.peak_active.load(Ordering::SeqCst)
    }

    pub async fn statement(&self) -> Statement {
        let balance = self.balance().await;
        Statement {
            holder: self.holder.clone(),
            balance,
            completed: self.counters.completed.load(Ordering::SeqCst),
            rejected: self.counters.rejected.load(Ordering::SeqCst),
            deferred: self.counters.deferred.load(Ordering::SeqCst),
            interrupted: self.counters.interrupted.load(Ordering::SeqCst),
            peak_concurrency: self.peak_concurrency(),
        }
    }

    /// Withdraw `amount` on behalf of `caller`.
    ///
    /// Makes exactly one non-blocking attempt at the guard. If the guard is held the
    /// result is `Deferred` and nothing else happens. Otherwise the balance is checked,
    /// the processing delay elapses while the guard is held, and the amount is debited.
    /// An interrupted delay is returned as an error after the guard has been released.
    pub async fn withdraw(&self, caller: &str, amount: u64) -> shared::Result<WithdrawalOutcome> {
        let caller = Label::new(caller)?;
        info!(holder = %self.holder, caller = %caller, amount, "Attempting withdrawal");

        let Ok(mut balance) = self.balance.try_lock() else {
            info!(caller = %caller, "Guard is held, deferring to other work");
            let outcome = WithdrawalOutcome::Deferred { caller };
            self.counters.record(&outcome);
            return Ok(outcome);
        };

        let section = self.counters.enter();
        info!(caller = %caller, "Acquired guard");

        let outcome = if *balance >= amount {
            if let Err(e) = self.processing_pause(&caller).await {
                drop(section);
                drop(balance);
                error!(
                    caller = %caller,
                    amount,
                    error = %e,
                    "Withdrawal interrupted, guard released"
                );
                self.counters.record_interrupted();
                return Err(e);
            }
            *balance -= amount;
            WithdrawalOutcome::Completed { balance: *balance }
        } else {
            WithdrawalOutcome::insufficient_balance()
        };

        drop(section);
        drop(balance);

        match &outcome {
            WithdrawalOutcome::Completed { balance } => {
                info!(caller = %caller, amount, remaining = *balance, "Withdrawal completed");
            }
            WithdrawalOutcome::Rejected { reason } => {
                info!(caller = %caller, amount, reason = %reason, "Withdrawal rejected");
            }
            WithdrawalOutcome::Deferred { .. } => {}
        }
        self.counters.record(&outcome);

        Ok(outcome)
    }

    async fn processing_pause(&self, caller: &Label) -> shared::Result<()> {
        debug!(
            caller = %caller,
            delay_ms = self.processing_delay.as_millis() as u64,
            "Processing withdrawal"
        );

        tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => {
                Err(ServiceError::withdrawal_interrupted(caller, "processing_delay"))
            }
            _ = tokio::time::sleep(self.processing_delay) => Ok(()),
        }
    }
}
