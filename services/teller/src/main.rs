use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shared::{DEMO_RECIPIENTS, DEMO_WITHDRAWALS};
use teller::config::Config;
use teller::drivers;
use teller::ledger::Account;
use teller::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let use_json = telemetry::init_tracing();

    info!(
        service = "teller",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting teller"
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        run_mode = ?config.run_mode,
        initial_balance = config.ledger.initial_balance,
        processing_delay_ms = config.ledger.processing_delay_ms,
        worker_count = config.pool.worker_count,
        job_duration_ms = config.pool.job_duration_ms,
        "Configuration loaded"
    );

    // Ctrl-C interrupts every simulated delay still running
    let interrupt = CancellationToken::new();
    tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Shutdown signal received, interrupting in-flight work");
                interrupt.cancel();
            }
        }
    });

    if config.run_mode.runs_ledger() {
        let account = Arc::new(
            Account::from_config(&config.ledger)?.with_interrupt(interrupt.child_token()),
        );

        // An interrupted withdrawal is fatal for the whole run
        let summary = drivers::run_withdrawal_race(account.clone(), &DEMO_WITHDRAWALS).await?;
        info!(
            initial_balance = summary.initial_balance,
            final_balance = summary.final_balance,
            debited = summary.completed_total(),
            "Ledger scenario finished"
        );

        let statement = account.statement().await;
        info!(statement = %serde_json::to_string(&statement)?, "Account statement");
    }

    if config.run_mode.runs_pool() {
        let summary =
            drivers::run_certificate_dispatch(&config.pool, &DEMO_RECIPIENTS, interrupt.child_token())
                .await?;
        info!(
            worker_count = summary.worker_count,
            delivered = summary.stats.completed,
            failed = summary.stats.failed,
            peak_running = summary.stats.peak_running,
            "Pool scenario finished"
        );
    }

    info!("Teller stopped");

    Ok(())
}
