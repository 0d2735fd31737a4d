use std::sync::Arc;
use std::time::Duration;

use energy_ledger::{
    ConsumeOutcome, Energy, EnergyCoordinator, IdempotencyKey, InMemoryLedger, LedgerConfig,
    LedgerStore, LedgerTransaction, NewConsumption, OutcomeClass, classify,
};

fn coordinator_with(balance: u64) -> Arc<EnergyCoordinator<InMemoryLedger>> {
    let ledger = InMemoryLedger::new(LedgerConfig::default());
    ledger.open_account(1, Energy(balance)).unwrap();
    Arc::new(EnergyCoordinator::new(ledger))
}

async fn consume_concurrently(
    coordinator: &Arc<EnergyCoordinator<InMemoryLedger>>,
    requests: Vec<(u64, String)>,
) -> Vec<ConsumeOutcome> {
    let handles: Vec<_> = requests
        .into_iter()
        .map(|(amount, key)| {
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move { coordinator.consume_raw(1, Energy(amount), key).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    outcomes
}

#[tokio::test]
async fn sequential_consumption_and_refusal() {
    let coordinator = coordinator_with(100);
    let ledger = coordinator.store();

    let first = coordinator.consume_raw(1, Energy(60), "k1").await;
    assert_eq!(first.receipt().unwrap().remaining_energy, Energy(40));
    assert_eq!(ledger.consumption_count(), 1);

    let second = coordinator.consume_raw(1, Energy(60), "k2").await;
    assert_eq!(
        second,
        ConsumeOutcome::InsufficientEnergy {
            account_id: 1,
            requested: Energy(60),
            available: Energy(40),
        }
    );
    assert_eq!(ledger.balance(1), Some(Energy(40)));
    assert_eq!(ledger.consumption_count(), 1);
}

#[tokio::test]
async fn balance_progresses_across_distinct_keys() {
    let coordinator = coordinator_with(100);

    let a = coordinator.consume_raw(1, Energy(30), "k3").await;
    let b = coordinator.consume_raw(1, Energy(20), "k4").await;

    assert_eq!(a.receipt().unwrap().remaining_energy, Energy(70));
    assert_eq!(b.receipt().unwrap().remaining_energy, Energy(50));
    assert_ne!(a.receipt().unwrap().record_id, b.receipt().unwrap().record_id);

    let records = coordinator.store().consumptions_for(1);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].idempotency_key.as_str(), "k3");
    assert_eq!(records[1].idempotency_key.as_str(), "k4");
}

#[tokio::test]
async fn insufficient_balance_leaves_everything_untouched() {
    let coordinator = coordinator_with(100);
    coordinator.consume_raw(1, Energy(10), "seed").await;
    let before_balance = coordinator.store().balance(1);
    let before_records = coordinator.store().consumptions_for(1);

    let outcome = coordinator.consume_raw(1, Energy(200), "too-much").await;

    assert_eq!(classify(&outcome), OutcomeClass::CallerError);
    assert_eq!(coordinator.store().balance(1), before_balance);
    assert_eq!(coordinator.store().consumptions_for(1), before_records);
}

#[tokio::test]
async fn replay_after_the_balance_dropped_is_still_a_replay() {
    let coordinator = coordinator_with(100);

    assert!(coordinator.consume_raw(1, Energy(60), "k1").await.is_success());
    let replay = coordinator.consume_raw(1, Energy(60), "k1").await;

    assert!(matches!(replay, ConsumeOutcome::IdempotencyReplay { .. }));
    assert_eq!(coordinator.store().balance(1), Some(Energy(40)));
}

#[tokio::test]
async fn replay_returns_already_processed_and_original_record() {
    let coordinator = coordinator_with(100);

    let first = coordinator.consume_raw(1, Energy(20), "key-idempotent-1").await;
    let second = coordinator.consume_raw(1, Energy(20), "key-idempotent-1").await;

    assert!(first.is_success());
    assert_eq!(classify(&second), OutcomeClass::AlreadyProcessed);
    assert_eq!(coordinator.store().balance(1), Some(Energy(80)));
    assert_eq!(coordinator.store().consumption_count(), 1);

    let ConsumeOutcome::IdempotencyReplay { idempotency_key } = second else {
        panic!("expected replay, got {:?}", second);
    };
    let original = coordinator.store().record_by_key(&idempotency_key).unwrap();
    assert_eq!(original.id, first.receipt().unwrap().record_id);
}

fn requests(pairs: &[(u64, &str)]) -> Vec<(u64, String)> {
    pairs
        .iter()
        .map(|(amount, key)| (*amount, key.to_string()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_key_deducts_once() {
    let coordinator = coordinator_with(100);

    let outcomes = consume_concurrently(&coordinator, requests(&[(60, "k1"), (60, "k1")])).await;

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    let replays = outcomes
        .iter()
        .filter(|o| matches!(o, ConsumeOutcome::IdempotencyReplay { .. }))
        .count();
    assert_eq!((successes, replays), (1, 1));
    assert_eq!(coordinator.store().balance(1), Some(Energy(40)));
    assert_eq!(coordinator.store().consumption_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_of_a_small_request() {
    let coordinator = coordinator_with(100);

    let outcomes = consume_concurrently(
        &coordinator,
        requests(&[(30, "k1"), (30, "k1"), (30, "k1")]),
    )
    .await;

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    let replays = outcomes
        .iter()
        .filter(|o| matches!(o, ConsumeOutcome::IdempotencyReplay { .. }))
        .count();
    assert_eq!((successes, replays), (1, 2));
    assert_eq!(coordinator.store().balance(1), Some(Energy(70)));
    assert_eq!(coordinator.store().consumption_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_keys_never_overdraw() {
    let coordinator = coordinator_with(100);

    let outcomes = consume_concurrently(&coordinator, requests(&[(60, "k1"), (60, "k2")])).await;

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    let refused = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                ConsumeOutcome::InsufficientEnergy {
                    available: Energy(40),
                    ..
                }
            )
        })
        .count();
    assert_eq!((successes, refused), (1, 1));
    assert_eq!(coordinator.store().balance(1), Some(Energy(40)));
    assert_eq!(coordinator.store().consumption_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn no_lost_update_under_contention() {
    let coordinator = coordinator_with(1_000);
    let batch = (0..50).map(|i| (20, format!("req-{}", i))).collect();

    let outcomes = consume_concurrently(&coordinator, batch).await;

    assert!(outcomes.iter().all(|o| o.is_success()));
    assert_eq!(coordinator.store().balance(1), Some(Energy::ZERO));
    assert_eq!(coordinator.store().consumption_count(), 50);

    // The account is drained; one more request is refused, not overdrawn.
    let extra = coordinator.consume_raw(1, Energy(1), "req-extra").await;
    assert!(matches!(extra, ConsumeOutcome::InsufficientEnergy { .. }));
    assert_eq!(coordinator.store().balance(1), Some(Energy::ZERO));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversubscribed_account_grants_exactly_what_fits() {
    let coordinator = coordinator_with(100);
    let batch = requests(&[(30, "a"), (30, "b"), (30, "c"), (30, "d"), (30, "e")]);

    let outcomes = consume_concurrently(&coordinator, batch).await;

    let granted: u64 = outcomes
        .iter()
        .filter_map(|o| o.receipt())
        .map(|r| r.amount_consumed.units())
        .sum();
    assert_eq!(granted, 90);
    assert_eq!(coordinator.store().balance(1), Some(Energy(100 - granted)));
    assert_eq!(coordinator.store().consumption_count(), 3);
}

#[tokio::test]
async fn lock_timeout_is_transient_and_retry_succeeds() {
    let ledger = InMemoryLedger::new(
        LedgerConfig::default().with_lock_timeout(Duration::from_millis(50)),
    );
    ledger.open_account(1, Energy(100)).unwrap();
    let coordinator = EnergyCoordinator::new(ledger.clone());

    // Another unit of work holds the row lock.
    let mut holder = ledger.begin().await.unwrap();
    holder.lock_account(1).await.unwrap();

    let outcome = coordinator.consume_raw(1, Energy(10), "k1").await;
    assert!(matches!(outcome, ConsumeOutcome::TransientFailure { .. }));
    assert!(classify(&outcome).is_retryable());
    assert_eq!(ledger.balance(1), Some(Energy(100)));

    holder.rollback().await;

    let retry = coordinator.consume_raw(1, Energy(10), "k1").await;
    assert_eq!(retry.receipt().unwrap().remaining_energy, Energy(90));
}

#[tokio::test]
async fn cancelled_consume_leaves_no_trace() {
    let ledger = InMemoryLedger::new(LedgerConfig::default());
    ledger.open_account(1, Energy(100)).unwrap();
    let coordinator = Arc::new(EnergyCoordinator::new(ledger.clone()));

    let mut holder = ledger.begin().await.unwrap();
    holder.lock_account(1).await.unwrap();

    // Parked on the row lock, then cancelled.
    let waiting = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.consume_raw(1, Energy(10), "k1").await })
    };
    tokio::task::yield_now().await;
    waiting.abort();
    assert!(waiting.await.unwrap_err().is_cancelled());

    holder.rollback().await;

    assert_eq!(ledger.balance(1), Some(Energy(100)));
    assert_eq!(ledger.consumption_count(), 0);
    assert!(coordinator.consume_raw(1, Energy(10), "k1").await.is_success());
}

#[tokio::test]
async fn different_accounts_do_not_contend() {
    let ledger = InMemoryLedger::new(
        LedgerConfig::default().with_lock_timeout(Duration::from_millis(50)),
    );
    ledger.open_account(1, Energy(100)).unwrap();
    ledger.open_account(2, Energy(100)).unwrap();
    let coordinator = EnergyCoordinator::new(ledger.clone());

    let mut holder = ledger.begin().await.unwrap();
    holder.lock_account(1).await.unwrap();

    let outcome = coordinator.consume_raw(2, Energy(10), "other-account").await;
    assert_eq!(outcome.receipt().unwrap().remaining_energy, Energy(90));

    holder.rollback().await;
}

async fn key_held_by_an_open_unit_of_work(
    key: &str,
) -> (Arc<EnergyCoordinator<InMemoryLedger>>, <InMemoryLedger as LedgerStore>::Tx) {
    let ledger = InMemoryLedger::new(LedgerConfig::default());
    ledger.open_account(1, Energy(100)).unwrap();
    ledger.open_account(2, Energy(100)).unwrap();

    let mut holder = ledger.begin().await.unwrap();
    holder.lock_account(1).await.unwrap();
    holder
        .insert_consumption(NewConsumption {
            account_id: 1,
            amount: Energy(10),
            idempotency_key: IdempotencyKey::parse(key).unwrap(),
        })
        .await
        .unwrap();

    (Arc::new(EnergyCoordinator::new(ledger)), holder)
}

#[tokio::test]
async fn same_key_on_another_account_proceeds_when_the_holder_rolls_back() {
    let (coordinator, holder) = key_held_by_an_open_unit_of_work("k").await;

    let waiting = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.consume_raw(2, Energy(10), "k").await })
    };
    tokio::task::yield_now().await;
    assert!(!waiting.is_finished());

    holder.rollback().await;

    let outcome = waiting.await.unwrap();
    let receipt = outcome.receipt().unwrap();
    assert_eq!(receipt.account_id, 2);
    assert_eq!(receipt.remaining_energy, Energy(90));
    assert_eq!(coordinator.store().balance(1), Some(Energy(100)));
}

#[tokio::test]
async fn same_key_on_another_account_is_a_replay_when_the_holder_commits() {
    let (coordinator, mut holder) = key_held_by_an_open_unit_of_work("k").await;
    holder.decrement_balance(1, Energy(10)).await.unwrap();

    let waiting = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.consume_raw(2, Energy(10), "k").await })
    };
    tokio::task::yield_now().await;
    assert!(!waiting.is_finished());

    holder.commit().await.unwrap();

    let outcome = waiting.await.unwrap();
    assert_eq!(classify(&outcome), OutcomeClass::AlreadyProcessed);
    assert_eq!(coordinator.store().balance(1), Some(Energy(90)));
    assert_eq!(coordinator.store().balance(2), Some(Energy(100)));
    assert_eq!(coordinator.store().consumption_count(), 1);
}
