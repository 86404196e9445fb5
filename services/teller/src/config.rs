use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use shared::{
    DEFAULT_HOLDER, DEFAULT_INITIAL_BALANCE, DEFAULT_JOB_DURATION_MS, DEFAULT_PROCESSING_DELAY_MS,
    DEFAULT_WORKER_COUNT,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub run_mode: RunMode,
    pub ledger: LedgerConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Ledger,
    Pool,
    All,
}

impl RunMode {
    pub fn runs_ledger(&self) -> bool {
        matches!(self, RunMode::Ledger | RunMode::All)
    }

    pub fn runs_pool(&self) -> bool {
        matches!(self, RunMode::Pool | RunMode::All)
    }
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ledger" => Ok(RunMode::Ledger),
            "pool" => Ok(RunMode::Pool),
            "all" => Ok(RunMode::All),
            other => bail!("unknown run mode '{}' (expected ledger, pool or all)", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    pub holder: String,
    pub initial_balance: u64,
    pub processing_delay_ms: u64,
}

impl LedgerConfig {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            holder: DEFAULT_HOLDER.to_string(),
            initial_balance: DEFAULT_INITIAL_BALANCE,
            processing_delay_ms: DEFAULT_PROCESSING_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub job_duration_ms: u64,
}

impl PoolConfig {
    pub fn job_duration(&self) -> Duration {
        Duration::from_millis(self.job_duration_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            job_duration_ms: DEFAULT_JOB_DURATION_MS,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            run_mode: env::var("TELLER_RUN_MODE")
                .unwrap_or_else(|_| "all".to_string())
                .parse()?,
            ledger: LedgerConfig {
                holder: env::var("LEDGER_HOLDER")
                    .unwrap_or_else(|_| DEFAULT_HOLDER.to_string()),
                initial_balance: parse_var("LEDGER_INITIAL_BALANCE", DEFAULT_INITIAL_BALANCE)?,
                processing_delay_ms: parse_var(
                    "LEDGER_PROCESSING_DELAY_MS",
                    DEFAULT_PROCESSING_DELAY_MS,
                )?,
            },
            pool: PoolConfig {
                worker_count: parse_var("POOL_WORKER_COUNT", DEFAULT_WORKER_COUNT)?,
                job_duration_ms: parse_var("POOL_JOB_DURATION_MS", DEFAULT_JOB_DURATION_MS)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pool.worker_count == 0 {
            bail!("POOL_WORKER_COUNT must be greater than zero");
        }
        if self.ledger.holder.trim().is_empty() {
            bail!("LEDGER_HOLDER must not be blank");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
