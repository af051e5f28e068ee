//! Sale Tests
//!
//! Single-threaded sale behavior for both strategies.

use crate::*;

// =============================================================================
// ACCEPTED SALES
// =============================================================================

#[test]
fn test_optimistic_sale_of_30() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let ledger_id = db
        .sales
        .sell(batch, ACTOR, 30, Strategy::Optimistic)
        .unwrap();

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 70);
    assert_eq!(record.version, 1);

    let entries = db.ledger.for_batch(batch).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.id, ledger_id);
    assert_eq!(entry.kind, LedgerKind::Sale);
    assert_eq!(entry.quantity_delta, 30);
    assert_eq!(entry.total_amount, Decimal::new(7500, 2));
    assert_eq!(entry.actor_id.as_str(), ACTOR);
}

#[test]
fn test_pessimistic_sale_of_30() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    db.sales
        .sell(batch, ACTOR, 30, Strategy::Pessimistic)
        .unwrap();

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 70);
    assert_eq!(record.version, 1);
    assert_eq!(
        db.ledger.for_batch(batch).unwrap()[0].total_amount,
        Decimal::new(7500, 2)
    );
}

#[test]
fn test_selling_entire_stock_reaches_zero() {
    let db = create_db();
    let batch = seed_batch(&db, 10);

    db.sales.sell(batch, ACTOR, 10, Strategy::Optimistic).unwrap();
    assert_eq!(db.batches.get(batch).unwrap().quantity_current, 0);

    let err = db
        .sales
        .sell(batch, ACTOR, 1, Strategy::Pessimistic)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientStock {
            requested: 1,
            available: 0
        }
    ));
}

#[test]
fn test_sequential_sales_advance_version_by_one() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    for (i, strategy) in [Strategy::Optimistic, Strategy::Pessimistic]
        .iter()
        .cycle()
        .take(6)
        .enumerate()
    {
        db.sales.sell(batch, ACTOR, 5, *strategy).unwrap();
        let record = db.batches.get(batch).unwrap();
        assert_eq!(record.version, i as u64 + 1);
        assert_eq!(record.quantity_current, 100 - 5 * (i as u64 + 1));
    }
    assert_ledger_consistent(&db, batch);
}

// =============================================================================
// REJECTED SALES
// =============================================================================

#[test]
fn test_sale_of_150_against_100_rejected() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    for strategy in [Strategy::Optimistic, Strategy::Pessimistic] {
        let outcome = db
            .sales
            .execute(&StockMutation::sale(batch, ACTOR, 150).with_strategy(strategy));
        assert!(matches!(
            outcome,
            Outcome::Rejected(Rejection::InsufficientStock {
                requested: 150,
                available: 100
            })
        ));
        assert!(outcome.message().contains("insufficient stock"));
    }

    let record = db.batches.get(batch).unwrap();
    assert_eq!((record.quantity_current, record.version), (100, 0));
    assert!(db.ledger.is_empty());
}

#[test]
fn test_zero_quantity_rejected() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let err = db
        .sales
        .sell(batch, ACTOR, 0, Strategy::Optimistic)
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
    assert!(db.ledger.is_empty());
}

#[test]
fn test_sale_on_missing_batch_is_not_found() {
    let db = create_db();

    for strategy in [Strategy::Optimistic, Strategy::Pessimistic] {
        let err = db
            .sales
            .sell(BatchId(999), ACTOR, 1, strategy)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }
}

#[test]
fn test_outcome_messages() {
    let db = create_db();
    let batch = seed_batch(&db, 5);

    let accepted = db.sales.execute(&StockMutation::sale(batch, ACTOR, 1));
    assert!(accepted.message().starts_with("accepted"));

    let rejected = db.sales.execute(&StockMutation::sale(batch, ACTOR, 50));
    assert_eq!(
        rejected.message(),
        "rejected: insufficient stock: requested 50, available 4"
    );
}
