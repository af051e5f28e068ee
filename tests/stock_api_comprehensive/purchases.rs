//! Purchase Tests

use crate::*;

#[test]
fn test_purchase_increases_quantity_and_records_total() {
    let db = create_db();
    let batch = seed_batch(&db, 100);

    let ledger_id = db
        .sales
        .purchase(batch, "buyer-2", 40, Strategy::Pessimistic)
        .unwrap();

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 140);
    assert_eq!(record.quantity_initial, 100);
    assert_eq!(record.version, 1);

    let entry = &db.ledger.for_batch(batch).unwrap()[0];
    assert_eq!(entry.id, ledger_id);
    assert_eq!(entry.kind, LedgerKind::Purchase);
    assert_eq!(entry.total_amount, Decimal::new(10000, 2));
    assert_eq!(entry.signed_delta(), 40);
}

#[test]
fn test_purchase_then_sale_beyond_initial_quantity() {
    let db = create_db();
    let batch = seed_batch(&db, 10);

    db.sales
        .purchase(batch, ACTOR, 50, Strategy::Optimistic)
        .unwrap();
    db.sales.sell(batch, ACTOR, 55, Strategy::Optimistic).unwrap();

    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 5);
    assert_eq!(record.version, 2);
    assert_ledger_consistent(&db, batch);
}

#[test]
fn test_purchase_into_empty_batch() {
    let db = create_db();
    let batch = seed_batch(&db, 0);

    db.sales
        .purchase(batch, ACTOR, 12, Strategy::Optimistic)
        .unwrap();
    assert_eq!(db.batches.get(batch).unwrap().quantity_current, 12);
}

#[test]
fn test_purchase_overflow_writes_nothing() {
    let db = create_db();
    let batch = seed_batch(&db, 1);

    let err = db
        .sales
        .purchase(batch, ACTOR, u64::MAX, Strategy::Pessimistic)
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));

    let record = db.batches.get(batch).unwrap();
    assert_eq!((record.quantity_current, record.version), (1, 0));
    assert!(db.ledger.is_empty());
}

#[test]
fn test_price_change_does_not_alter_history() {
    let db = create_db();
    let batch = seed_batch(&db, 100);
    db.sales
        .purchase(batch, ACTOR, 10, Strategy::Optimistic)
        .unwrap();

    let mut details = intake(0).details();
    details.unit_price = Decimal::new(400, 2);
    db.batches.update_details(batch, details).unwrap();

    db.sales
        .purchase(batch, ACTOR, 10, Strategy::Optimistic)
        .unwrap();

    let totals: Vec<Decimal> = db
        .ledger
        .for_batch(batch)
        .unwrap()
        .iter()
        .map(|e| e.total_amount)
        .collect();
    assert_eq!(totals, vec![Decimal::new(2500, 2), Decimal::new(4000, 2)]);
}
