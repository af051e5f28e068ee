//! Durability Tests
//!
//! Reopen after commits, torn WAL tails, and the no-durability mode.

use crate::*;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;

fn open_strict(dir: &TempDir) -> PharmaStock {
    PharmaStock::builder()
        .path(dir.path())
        .strict()
        .open()
        .expect("Failed to open database")
}

#[test]
fn test_committed_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let (batch, sale_id) = {
        let db = open_strict(&dir);
        let batch = seed_batch(&db, 100);
        let sale_id = db
            .sales
            .sell(batch, ACTOR, 30, Strategy::Optimistic)
            .unwrap();
        db.sales
            .purchase(batch, ACTOR, 5, Strategy::Pessimistic)
            .unwrap();
        db.close().unwrap();
        (batch, sale_id)
    };

    let db = open_strict(&dir);
    let record = db.batches.get(batch).unwrap();
    assert_eq!(record.quantity_current, 75);
    assert_eq!(record.version, 2);

    let entries = db.ledger.for_batch(batch).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, sale_id);
    assert_eq!(entries[0].total_amount, Decimal::new(7500, 2));
    assert_ledger_consistent(&db, batch);

    let stats = db.recovery_stats().unwrap();
    assert_eq!(stats.transactions_replayed, 3);
    assert_eq!(stats.truncated_bytes, 0);
}

#[test]
fn test_ids_continue_after_reopen() {
    let dir = TempDir::new().unwrap();

    let (first_batch, first_entry) = {
        let db = open_strict(&dir);
        let batch = seed_batch(&db, 10);
        let entry = db.sales.sell(batch, ACTOR, 1, Strategy::Optimistic).unwrap();
        (batch, entry)
    };

    let db = open_strict(&dir);
    let second_batch = seed_batch(&db, 10);
    let second_entry = db
        .sales
        .sell(second_batch, ACTOR, 1, Strategy::Optimistic)
        .unwrap();

    assert!(second_batch > first_batch);
    assert!(second_entry > first_entry);
    assert_eq!(db.batches.list().len(), 2);
}

#[test]
fn test_torn_tail_is_dropped_on_reopen() {
    let dir = TempDir::new().unwrap();

    let batch = {
        let db = open_strict(&dir);
        let batch = seed_batch(&db, 100);
        db.sales.sell(batch, ACTOR, 30, Strategy::Optimistic).unwrap();
        batch
    };

    // A frame header cut short by a crash
    let wal = dir.path().join("stock.wal");
    let mut file = OpenOptions::new().append(true).open(&wal).unwrap();
    file.write_all(&[0x2a, 0x00, 0x00]).unwrap();
    file.sync_all().unwrap();
    drop(file);

    let db = open_strict(&dir);
    let stats = db.recovery_stats().unwrap();
    assert_eq!(stats.truncated_bytes, 3);

    let record = db.batches.get(batch).unwrap();
    assert_eq!((record.quantity_current, record.version), (70, 1));

    // New commits append cleanly after the truncation
    db.sales.sell(batch, ACTOR, 10, Strategy::Pessimistic).unwrap();
    db.close().unwrap();
    drop(db);

    let db = open_strict(&dir);
    assert_eq!(db.batches.get(batch).unwrap().quantity_current, 60);
    assert_eq!(db.recovery_stats().unwrap().truncated_bytes, 0);
}

#[test]
fn test_rejected_requests_leave_no_trace_on_disk() {
    let dir = TempDir::new().unwrap();

    let batch = {
        let db = open_strict(&dir);
        let batch = seed_batch(&db, 10);
        assert!(db.sales.sell(batch, ACTOR, 11, Strategy::Optimistic).is_err());
        assert!(db.sales.sell(batch, ACTOR, 0, Strategy::Pessimistic).is_err());
        batch
    };

    let db = open_strict(&dir);
    let record = db.batches.get(batch).unwrap();
    assert_eq!((record.quantity_current, record.version), (10, 0));
    assert!(db.ledger.is_empty());
    assert_eq!(db.recovery_stats().unwrap().transactions_replayed, 1);
}

#[test]
fn test_batched_mode_flushes_on_close() {
    let dir = TempDir::new().unwrap();

    let batch = {
        let db = PharmaStock::builder()
            .path(dir.path())
            .batched(60_000, 1_000)
            .open()
            .unwrap();
        let batch = seed_batch(&db, 20);
        db.sales.sell(batch, ACTOR, 4, Strategy::Optimistic).unwrap();
        db.close().unwrap();
        batch
    };

    let db = open_strict(&dir);
    assert_eq!(db.batches.get(batch).unwrap().quantity_current, 16);
}

#[test]
fn test_no_durability_writes_nothing() {
    let dir = TempDir::new().unwrap();

    {
        let db = PharmaStock::builder()
            .path(dir.path())
            .no_durability()
            .open()
            .unwrap();
        let batch = seed_batch(&db, 20);
        db.sales.sell(batch, ACTOR, 4, Strategy::Optimistic).unwrap();
        assert!(db.recovery_stats().is_none());
    }

    assert!(!dir.path().join("stock.wal").exists());

    let db = open_strict(&dir);
    assert!(db.batches.list().is_empty());
}

#[test]
fn test_ephemeral_database() {
    let db = create_db();
    assert!(db.is_ephemeral());
    assert!(db.path().is_none());
    assert!(db.recovery_stats().is_none());
    assert_eq!(db.durability_mode(), DurabilityMode::None);
    db.flush().unwrap();
}
