//! # PharmaStock
//!
//! Embedded stock ledger for medication batches.
//!
//! Many concurrent sales contend to decrement the same batch counter.
//! PharmaStock guarantees the counter never goes negative, no two sales
//! silently overwrite each other, and every accepted change is recorded in an
//! append-only ledger in the same transaction as the change itself.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pharmastock::prelude::*;
//!
//! let db = PharmaStock::open("./stock")?;
//!
//! let batch = db.batches.register(NewBatch {
//!     medication_id: MedicationId(7),
//!     lot_number: "A-113".into(),
//!     quantity: 100,
//!     unit_price: Decimal::new(250, 2),
//!     manufacture_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!     expiry_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
//!     supplier: "Acme".into(),
//! })?;
//!
//! db.sales.sell(batch.batch_id, "pharmacist-1", 30, Strategy::Optimistic)?;
//! db.close()?;
//! ```
//!
//! ## Strategies
//!
//! Chosen per request:
//!
//! - [`Strategy::Optimistic`] - version check at write time, fails fast with a
//!   conflict when another writer got there first
//! - [`Strategy::Pessimistic`] - exclusive row lock before reading, waits (up
//!   to a timeout) for other writers
//!
//! ## Handles
//!
//! - [`Batches`] - intake, administrative updates, inventory
//! - [`Sales`] - sales and purchases
//! - [`Ledger`] - history and dashboard

#![warn(missing_docs)]

mod database;
mod error;
mod primitives;
mod types;

pub mod prelude;

// Re-export main entry points
pub use database::{PharmaStock, PharmaStockBuilder};
pub use error::{Error, Result};

// Re-export handles
pub use primitives::{Batches, Ledger, Sales};

// Re-export types
pub use types::*;
