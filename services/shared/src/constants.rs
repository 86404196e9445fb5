/// Shared constants for the teller services
///
/// Centralizes defaults so the config layer, the drivers and the tests agree on
/// the same numbers.

/// Starting balance of the demo account
pub const DEFAULT_INITIAL_BALANCE: u64 = 100_000;

/// Default account holder
pub const DEFAULT_HOLDER: &str = "Pankaj";

/// Time a withdrawal spends inside the guarded section, in milliseconds
///
/// Long enough that concurrent callers reliably observe the guard as held.
pub const DEFAULT_PROCESSING_DELAY_MS: u64 = 2_000;

/// Fixed number of workers in the dispatch pool
pub const DEFAULT_WORKER_COUNT: usize = 8;

/// Simulated duration of one certificate delivery, in milliseconds
pub const DEFAULT_JOB_DURATION_MS: u64 = 2_000;

/// Reason attached to a withdrawal rejected by the balance check
pub const INSUFFICIENT_BALANCE_REASON: &str = "insufficient balance";

/// Concurrent withdrawals issued by the demo driver
pub const DEMO_WITHDRAWALS: [(&str, u64); 3] = [("Wifey", 2_000), ("Papa", 3_000), ("Mummy", 5_000)];

/// Certificate recipients dispatched by the demo driver
pub const DEMO_RECIPIENTS: [&str; 12] = [
    "Amit", "Priya", "Rahul", "Sneha", "Vikram", "Neha", "Arjun", "Kiran", "Rohit", "Anjali",
    "Siddharth", "Pooja",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_withdrawals_fit_initial_balance() {
        let total: u64 = DEMO_WITHDRAWALS.iter().map(|(_, amount)| amount).sum();
        assert_eq!(total, 10_000);
        assert!(total <= DEFAULT_INITIAL_BALANCE);
    }

    #[test]
    fn test_demo_recipients_exceed_worker_count() {
        // Dispatch demo only exercises queuing if there are more jobs than workers
        assert!(DEMO_RECIPIENTS.len() > DEFAULT_WORKER_COUNT);
    }
}
