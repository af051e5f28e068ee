//! Convenient imports for PharmaStock.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use pharmastock::prelude::*;
//!
//! let db = PharmaStock::open("./stock")?;
//! db.sales.sell(BatchId(1), "pharmacist-1", 2, Strategy::Pessimistic)?;
//! ```

// Main entry point
pub use crate::database::{PharmaStock, PharmaStockBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Handles
pub use crate::primitives::{Batches, Ledger, Sales};

// Core types
pub use crate::types::{
    ActorId, BatchDetails, BatchId, ExpiryStatus, LedgerEntry, LedgerId, LedgerKind,
    MedicationId, NewBatch, StockRecord,
};

// Requests and outcomes
pub use crate::types::{Outcome, Rejection, StockMutation, Strategy};

// Reports
pub use crate::types::{DashboardSummary, InventoryItem};

// Configuration
pub use crate::types::{DurabilityMode, RecoveryStats, RetryPolicy, StoreConfig};

// Money and dates
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
