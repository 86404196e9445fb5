/// Concurrency tests for the guarded ledger
///
/// Outcome order across callers depends on the scheduler, so these tests only check
/// invariants: one caller at a time in the critical section, no negative balance, and
/// the final balance matching what was reported as completed.
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use shared::{Label, ServiceError, WithdrawalOutcome, DEMO_WITHDRAWALS};
use teller::drivers::run_withdrawal_race;
use teller::ledger::Account;

fn account(balance: u64, delay_ms: u64) -> Arc<Account> {
    Arc::new(Account::new("Pankaj", balance, Duration::from_millis(delay_ms)).expect("valid holder"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_demo_scenario_balance_matches_completed() {
    let account = account(100_000, 100);

    let summary = assert_ok!(run_withdrawal_race(account.clone(), &DEMO_WITHDRAWALS).await);

    assert_eq!(summary.records.len(), 3);
    assert_eq!(summary.count("rejected"), 0);
    assert_eq!(summary.final_balance, 100_000 - summary.completed_total());

    if summary.count("completed") == 3 {
        assert_eq!(summary.final_balance, 90_000);
    } else {
        assert!(summary.count("deferred") >= 1, "missing completions must be deferrals");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_exclusion_under_many_callers() {
    let account = account(1_000_000, 20);

    let callers: Vec<String> = (0..32).map(|i| format!("caller-{}", i)).collect();
    let requests: Vec<(&str, u64)> = callers.iter().map(|c| (c.as_str(), 100)).collect();

    let summary = assert_ok!(run_withdrawal_race(account.clone(), &requests).await);

    assert_eq!(account.peak_concurrency(), 1, "critical section entered concurrently");
    assert!(summary.count("completed") >= 1);
    assert_eq!(summary.count("completed") + summary.count("deferred"), 32);
    assert_eq!(summary.final_balance, 1_000_000 - summary.completed_total());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_races_never_overlap() {
    let account = account(1_000_000, 5);

    for round in 0..10 {
        let requests = [("Wifey", 10), ("Papa", 20), ("Mummy", 30)];
        let summary = assert_ok!(run_withdrawal_race(account.clone(), &requests).await);
        assert!(summary.count("completed") >= 1, "round {} completed nothing", round);
    }

    assert_eq!(account.peak_concurrency(), 1);

    let statement = account.statement().await;
    assert_eq!(statement.completed + statement.deferred, 30);
    assert!(statement.balance <= 1_000_000);
}

#[tokio::test]
async fn test_non_negative_balance_for_sequential_withdrawals() {
    let account = account(5_000, 0);
    let amounts = [2_000, 2_000, 2_000, 500, 1_000];

    let mut debited = 0;
    for amount in amounts {
        match assert_ok!(account.withdraw("Papa", amount).await) {
            WithdrawalOutcome::Completed { balance } => {
                debited += amount;
                assert_eq!(balance, 5_000 - debited);
            }
            WithdrawalOutcome::Rejected { reason } => {
                assert_eq!(reason, "insufficient balance");
            }
            WithdrawalOutcome::Deferred { .. } => panic!("sequential callers should never be deferred"),
        }
    }

    assert_eq!(debited, 4_500);
    assert_eq!(account.balance().await, 500);

    let statement = account.statement().await;
    assert_eq!(statement.completed, 3);
    assert_eq!(statement.rejected, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deferral_while_guard_held() {
    let account = account(100_000, 300);

    let first = tokio::spawn({
        let account = account.clone();
        async move { account.withdraw("Wifey", 2_000).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    for caller in ["Papa", "Mummy"] {
        let outcome = assert_ok!(account.withdraw(caller, 3_000).await);
        assert_eq!(
            outcome,
            WithdrawalOutcome::Deferred {
                caller: Label::new(caller).unwrap()
            }
        );
    }

    let first = assert_ok!(first.await.unwrap());
    assert_eq!(first, WithdrawalOutcome::Completed { balance: 98_000 });
    assert_eq!(account.balance().await, 98_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interrupted_race_is_fatal_and_releases_guard() {
    let interrupt = CancellationToken::new();
    let account = Arc::new(
        Account::new("Pankaj", 100_000, Duration::from_secs(30))
            .unwrap()
            .with_interrupt(interrupt.clone()),
    );

    let race = tokio::spawn({
        let account = account.clone();
        async move { run_withdrawal_race(account, &DEMO_WITHDRAWALS).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    interrupt.cancel();

    let error = assert_err!(race.await.unwrap());
    let service_error = error
        .downcast_ref::<ServiceError>()
        .expect("interruption should surface as a ServiceError");
    assert!(service_error.is_interrupted());

    // Guard is free and nothing was debited
    let balance = tokio::time::timeout(Duration::from_secs(1), account.balance())
        .await
        .expect("guard still held after interruption");
    assert_eq!(balance, 100_000);
}
