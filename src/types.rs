//! Public types for the PharmaStock API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Identifiers
pub use pharmastock_core::{ActorId, BatchId, LedgerId, MedicationId};

// Batches
pub use pharmastock_core::{BatchDetails, ExpiryStatus, NewBatch, StockRecord};

// Ledger
pub use pharmastock_core::{LedgerEntry, LedgerKind};

// Requests and outcomes
pub use pharmastock_engine::{Outcome, Rejection, StockMutation, Strategy};

// Reports
pub use pharmastock_engine::{DashboardSummary, InventoryItem};

// Configuration and observability
pub use pharmastock_engine::{
    DurabilityMode, RecoveryStats, RetryPolicy, StoreConfig, TransactionMetrics,
};
