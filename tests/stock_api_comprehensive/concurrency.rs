//! Concurrency Tests
//!
//! Racing writers against one batch counter.

use crate::*;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

fn race(db: &PharmaStock, requests: Vec<StockMutation>) -> Vec<Outcome> {
    let barrier = Barrier::new(requests.len());
    thread::scope(|s| {
        let handles: Vec<_> = requests
            .iter()
            .map(|request| {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    db.sales.execute(request)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

// =============================================================================
// TWO SALES OF 60 AGAINST 100
// =============================================================================

#[test]
fn test_two_pessimistic_sales_of_60_exactly_one_accepted() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let request = StockMutation::sale(batch, ACTOR, 60).with_strategy(Strategy::Pessimistic);
    let outcomes = race(&db, vec![request.clone(), request]);

    assert_eq!(outcomes.iter().filter(|o| o.is_accepted()).count(), 1);
    let loser = outcomes.iter().find(|o| !o.is_accepted()).unwrap();
    assert!(matches!(
        loser,
        Outcome::Rejected(Rejection::InsufficientStock {
            requested: 60,
            available: 40
        })
    ));

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 40);
    assert_eq!(record.version, 1);
    assert_ledger_consistent(&db, batch);
}

#[test]
fn test_two_optimistic_sales_of_60_exactly_one_accepted() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let request = StockMutation::sale(batch, ACTOR, 60);
    let outcomes = race(&db, vec![request.clone(), request]);

    assert_eq!(outcomes.iter().filter(|o| o.is_accepted()).count(), 1);
    // The loser either lost the race or arrived after the commit
    let loser = outcomes.iter().find(|o| !o.is_accepted()).unwrap();
    assert!(matches!(
        loser,
        Outcome::Rejected(Rejection::ConcurrencyConflict { .. })
            | Outcome::Rejected(Rejection::InsufficientStock { .. })
    ));

    assert_eq!(db.batches.get(batch).unwrap().quantity_current, 40);
    assert_ledger_consistent(&db, batch);
}

// =============================================================================
// MANY WRITERS
// =============================================================================

#[test]
fn test_pessimistic_writers_serialize() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let requests = (0..10)
        .map(|_| StockMutation::sale(batch, ACTOR, 7).with_strategy(Strategy::Pessimistic))
        .collect();
    let outcomes = race(&db, requests);

    assert!(outcomes.iter().all(|o| o.is_accepted()));
    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 30);
    assert_eq!(record.version, 10);
    assert_ledger_consistent(&db, batch);
}

#[test]
fn test_oversubscribed_batch_never_goes_negative() {
    let db = create_db();
    let batch = seed_batch(&db, 50);

    let requests = (0..16)
        .map(|i| {
            let strategy = if i % 2 == 0 {
                Strategy::Pessimistic
            } else {
                Strategy::Optimistic
            };
            StockMutation::sale(batch, ACTOR, 9).with_strategy(strategy)
        })
        .collect();
    let outcomes = race(&db, requests);

    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count() as u64;
    assert!(accepted <= 5, "50 units cover at most five sales of 9");

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 50 - 9 * accepted);
    assert_eq!(record.version, accepted);
    assert_ledger_consistent(&db, batch);
}

#[test]
fn test_optimistic_writers_with_retry_all_land() {
    let db = PharmaStock::builder()
        .no_durability()
        .retry(RetryPolicy {
            max_attempts: 200,
            backoff_ms: 1,
        })
        .open_ephemeral()
        .unwrap();
    let batch = seed_batch(&db, 100);

    let barrier = Barrier::new(8);
    thread::scope(|s| {
        for _ in 0..8 {
            let (db, barrier) = (&db, &barrier);
            s.spawn(move || {
                barrier.wait();
                let outcome = db
                    .sales
                    .execute_with_retry(&StockMutation::sale(batch, ACTOR, 5));
                assert!(outcome.is_accepted(), "{}", outcome);
            });
        }
    });

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 60);
    assert_eq!(record.version, 8);
    assert_ledger_consistent(&db, batch);
}

#[test]
fn test_independent_batches_do_not_contend() {
    let db = create_db();
    let batches: Vec<BatchId> = (0..4).map(|_| seed_batch(&db, 20)).collect();

    let requests = batches
        .iter()
        .flat_map(|&b| (0..4).map(move |_| StockMutation::sale(b, ACTOR, 5)))
        .map(|r| r.with_strategy(Strategy::Pessimistic))
        .collect();
    let outcomes = race(&db, requests);

    assert!(outcomes.iter().all(|o| o.is_accepted()));
    for batch in batches {
        assert_eq!(db.batches.get(batch).unwrap().quantity_current, 0);
        assert_ledger_consistent(&db, batch);
    }
}

// =============================================================================
// HELD ROW LOCK
// =============================================================================

#[test]
fn test_held_lock_conflicts_optimistic_and_times_out_pessimistic() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let mut holder = db.engine().begin();
    holder.lock_row(batch, Duration::from_millis(100)).unwrap();

    let optimistic = db.sales.execute(&StockMutation::sale(batch, ACTOR, 1));
    assert!(matches!(
        optimistic,
        Outcome::Rejected(Rejection::ConcurrencyConflict { .. })
    ));
    assert!(optimistic.is_retryable());

    let pessimistic = db.sales.execute(
        &StockMutation::sale(batch, ACTOR, 1)
            .with_strategy(Strategy::Pessimistic)
            .with_lock_timeout(Duration::from_millis(30)),
    );
    assert_eq!(pessimistic.message(), "failed: lock timeout");
    assert!(pessimistic.is_retryable());

    drop(holder);

    db.sales
        .sell(batch, ACTOR, 1, Strategy::Pessimistic)
        .unwrap();
    let record = db.batches.get(batch).unwrap();
    assert_eq!((record.quantity_current, record.version), (99, 1));

    let metrics = db.metrics();
    assert!(metrics.conflicts >= 1);
    assert!(metrics.lock_timeouts >= 1);
}

#[test]
fn test_sell_maps_lock_timeout_to_retryable_error() {
    let db = PharmaStock::builder()
        .no_durability()
        .lock_timeout(Duration::from_millis(20))
        .open_ephemeral()
        .unwrap();
    let batch = seed_batch(&db, 10);

    let mut holder = db.engine().begin();
    holder.lock_row(batch, Duration::from_millis(100)).unwrap();

    let err = db
        .sales
        .sell(batch, ACTOR, 1, Strategy::Pessimistic)
        .unwrap_err();
    assert!(matches!(err, Error::LockTimeout(_)));
    assert!(err.is_retryable());

    let err = db
        .sales
        .sell(batch, ACTOR, 1, Strategy::Optimistic)
        .unwrap_err();
    assert!(err.is_conflict());
}
