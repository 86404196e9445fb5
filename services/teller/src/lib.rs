//! Teller: a guarded ledger and a bounded worker pool
//!
//! `ledger` holds one balance behind a non-blocking guard; `worker_pool` runs
//! fire-and-forget jobs over a fixed set of workers. `drivers` wires both into the
//! scenarios the binary runs.

pub mod config;
pub mod drivers;
pub mod ledger;
pub mod telemetry;
pub mod worker_pool;
