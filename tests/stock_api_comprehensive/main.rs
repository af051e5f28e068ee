//! Stock API Comprehensive Test Suite
//!
//! Exercises the public `PharmaStock` facade end to end.
//!
//! ## Key Verification Points
//!
//! 1. Quantity never goes negative; rejected requests write nothing
//! 2. Every accepted mutation advances the version by exactly one and has
//!    exactly one ledger entry
//! 3. Optimistic writers fail fast; pessimistic writers serialize
//! 4. Committed state survives reopen; torn WAL tails are dropped
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test stock_api_comprehensive
//!
//! # Concurrency tests only
//! cargo test --test stock_api_comprehensive concurrency::
//! ```

use pharmastock::prelude::*;

// Test modules
pub mod batches;
pub mod concurrency;
pub mod durability;
pub mod invariants;
pub mod purchases;
pub mod sales;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Acting user for most tests
pub const ACTOR: &str = "pharmacist-1";

/// Create an ephemeral test database
pub fn create_db() -> PharmaStock {
    PharmaStock::ephemeral().expect("Failed to create ephemeral database")
}

/// Intake of `quantity` units at 2.50 each, expiring 2027-01-01
pub fn intake(quantity: u64) -> NewBatch {
    NewBatch {
        medication_id: MedicationId(1),
        lot_number: "LOT-2025-001".into(),
        quantity,
        unit_price: Decimal::new(250, 2),
        manufacture_date: date(2025, 1, 1),
        expiry_date: date(2027, 1, 1),
        supplier: "Acme Pharma".into(),
    }
}

/// Register one batch and return its id
pub fn seed_batch(db: &PharmaStock, quantity: u64) -> BatchId {
    db.batches
        .register(intake(quantity))
        .expect("Failed to register batch")
        .batch_id
}

/// Shorthand date constructor
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Assert the ledger/record relationship for one batch
pub fn assert_ledger_consistent(db: &PharmaStock, batch_id: BatchId) {
    let record = db.batches.get(batch_id).unwrap();
    let ledger = db.ledger.for_batch(batch_id).unwrap();

    assert_eq!(
        record.version as usize,
        ledger.len(),
        "one ledger entry per accepted mutation"
    );

    let net: i128 = ledger.iter().map(|e| e.signed_delta()).sum();
    assert_eq!(
        i128::from(record.quantity_initial) + net,
        i128::from(record.quantity_current),
        "ledger replays to the current quantity"
    );
}
