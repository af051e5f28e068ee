//! Batch Administration and Report Tests

use crate::*;

// =============================================================================
// REGISTER / UPDATE / REMOVE
// =============================================================================

#[test]
fn test_register_assigns_increasing_ids() {
    let db = create_db();

    let a = db.batches.register(intake(10)).unwrap();
    let b = db.batches.register(intake(20)).unwrap();

    assert!(b.batch_id > a.batch_id);
    assert_eq!(a.quantity_current, a.quantity_initial);
    assert_eq!(a.version, 0);
    assert!(db.batches.exists(a.batch_id));
    assert_eq!(
        db.batches.list().iter().map(|r| r.batch_id).collect::<Vec<_>>(),
        vec![a.batch_id, b.batch_id]
    );
}

#[test]
fn test_register_rejects_expiry_before_manufacture() {
    let db = create_db();
    let mut bad = intake(10);
    bad.expiry_date = date(2024, 1, 1);

    let err = db.batches.register(bad).unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
    assert!(db.batches.list().is_empty());
}

#[test]
fn test_update_details_keeps_quantity_and_version() {
    let db = create_db();
    let batch = seed_batch(&db, 100);
    db.sales.sell(batch, ACTOR, 10, Strategy::Optimistic).unwrap();

    let mut details = intake(0).details();
    details.supplier = "Other Supplier".into();
    details.unit_price = Decimal::new(300, 2);
    let updated = db.batches.update_details(batch, details).unwrap();

    assert_eq!(updated.supplier, "Other Supplier");
    assert_eq!(updated.unit_price, Decimal::new(300, 2));
    assert_eq!(updated.quantity_current, 90);
    assert_eq!(updated.version, 1);
    assert_ledger_consistent(&db, batch);
}

#[test]
fn test_update_details_on_missing_batch() {
    let db = create_db();
    let err = db
        .batches
        .update_details(BatchId(42), intake(0).details())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_remove_unreferenced_batch() {
    let db = create_db();
    let batch = seed_batch(&db, 5);

    db.batches.remove(batch).unwrap();
    assert!(!db.batches.exists(batch));
    assert!(db.batches.get(batch).unwrap_err().is_not_found());
    assert!(db.batches.remove(batch).unwrap_err().is_not_found());
}

#[test]
fn test_remove_referenced_batch_refused() {
    let db = create_db();
    let batch = seed_batch(&db, 5);
    db.sales.sell(batch, ACTOR, 1, Strategy::Optimistic).unwrap();

    let err = db.batches.remove(batch).unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
    assert!(db.batches.exists(batch));
}

// =============================================================================
// INVENTORY
// =============================================================================

#[test]
fn test_inventory_classifies_expiry() {
    let db = create_db();
    let today = date(2026, 6, 1);

    let mut expired = intake(5);
    expired.expiry_date = date(2026, 5, 1);
    let mut soon = intake(5);
    soon.expiry_date = date(2026, 7, 1);
    let valid = intake(5);

    let expired = db.batches.register(expired).unwrap().batch_id;
    let soon = db.batches.register(soon).unwrap().batch_id;
    let valid = db.batches.register(valid).unwrap().batch_id;

    let items = db.batches.inventory(today);
    let status: Vec<(BatchId, ExpiryStatus)> = items
        .iter()
        .map(|i| (i.record.batch_id, i.expiry_status))
        .collect();
    assert_eq!(
        status,
        vec![
            (expired, ExpiryStatus::Expired),
            (soon, ExpiryStatus::ExpiringSoon),
            (valid, ExpiryStatus::Valid),
        ]
    );
}

#[test]
fn test_custom_expiry_horizon() {
    let db = PharmaStock::builder()
        .no_durability()
        .expiry_warning_days(400)
        .open_ephemeral()
        .unwrap();
    seed_batch(&db, 5);

    let items = db.batches.inventory(date(2026, 6, 1));
    assert_eq!(items[0].expiry_status, ExpiryStatus::ExpiringSoon);
}

// =============================================================================
// LEDGER AND DASHBOARD
// =============================================================================

#[test]
fn test_history_newest_first_and_limited() {
    let db = create_db();
    let batch = seed_batch(&db, 100);
    let ids: Vec<LedgerId> = (0..5)
        .map(|_| db.sales.sell(batch, ACTOR, 1, Strategy::Optimistic).unwrap())
        .collect();

    let recent = db.ledger.history(3);
    assert_eq!(
        recent.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![ids[4], ids[3], ids[2]]
    );
    assert_eq!(db.ledger.recent().len(), 5);
    assert_eq!(db.ledger.len(), 5);
}

#[test]
fn test_ledger_for_missing_batch() {
    let db = create_db();
    assert!(db.ledger.for_batch(BatchId(7)).unwrap_err().is_not_found());
}

#[test]
fn test_summary_today() {
    let db = create_db();
    let batch = seed_batch(&db, 100);
    let empty = seed_batch(&db, 0);

    db.sales.sell(batch, ACTOR, 4, Strategy::Optimistic).unwrap();
    db.sales.sell(batch, ACTOR, 2, Strategy::Pessimistic).unwrap();
    db.sales.purchase(empty, ACTOR, 1, Strategy::Optimistic).unwrap();
    db.sales.sell(empty, ACTOR, 1, Strategy::Optimistic).unwrap();

    let summary = db.ledger.summary_today();
    assert_eq!(summary.sales_today, 3);
    assert_eq!(summary.purchases_today, 1);
    assert_eq!(summary.revenue_today, Decimal::new(1750, 2));
    assert_eq!(summary.total_batches, 2);
    assert_eq!(summary.active_batches, 1);

    let yesterday = db
        .ledger
        .summary(chrono::Utc::now().date_naive().pred_opt().unwrap());
    assert_eq!(yesterday.sales_today, 0);
    assert_eq!(yesterday.revenue_today, Decimal::ZERO);
}
