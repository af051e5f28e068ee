//! Error types for the stock engine
//!
//! One variant per failure category a caller must be able to tell apart.
//! Business-rule rejections (`InsufficientStock`, `ConcurrencyConflict`,
//! `LockTimeout`) are recoverable; store-level failures abort the whole
//! transaction and are surfaced as-is.

use crate::types::{BatchId, TxnId};
use std::io;
use thiserror::Error;

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the store, the strategies and the orchestrator
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced batch does not exist
    #[error("batch not found: {0}")]
    NotFound(BatchId),

    /// A sale would take the batch below zero
    #[error("insufficient stock on {batch_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Batch that was short
        batch_id: BatchId,
        /// Quantity the caller asked for
        requested: u64,
        /// Quantity on hand when the request was evaluated
        available: u64,
    },

    /// An optimistic writer lost the race for a version
    #[error("concurrency conflict on {batch_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Contended batch
        batch_id: BatchId,
        /// Version the writer read
        expected: u64,
        /// Version the store holds now
        actual: u64,
    },

    /// Exclusive row lock could not be acquired in time
    #[error("lock timeout on {batch_id} after {waited_ms}ms")]
    LockTimeout {
        /// Contended batch
        batch_id: BatchId,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// Row locks must be taken in ascending batch order
    #[error("lock order violation: {requested} requested while holding {held}")]
    LockOrderViolation {
        /// Highest batch already locked by the transaction
        held: BatchId,
        /// Lower batch the transaction tried to lock afterwards
        requested: BatchId,
    },

    /// Quantity delta must be positive
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Arithmetic would overflow
    #[error("overflow computing {what}")]
    Overflow {
        /// Quantity being computed
        what: &'static str,
    },

    /// Batch data failed validation
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// Batch id already present
    #[error("duplicate batch: {0}")]
    DuplicateBatch(BatchId),

    /// Batch is still referenced by ledger entries
    #[error("{batch_id} is referenced by {entries} ledger entries")]
    BatchReferenced {
        /// Batch the caller tried to remove
        batch_id: BatchId,
        /// Number of ledger entries pointing at it
        entries: usize,
    },

    /// Operation on a transaction that already committed or aborted
    #[error("{txn_id} is not active ({state})")]
    TransactionNotActive {
        /// Transaction
        txn_id: TxnId,
        /// Current state
        state: String,
    },

    /// Configuration rejected at load time
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected (checksum mismatch, impossible replay)
    #[error("corruption: {0}")]
    Corruption(String),

    /// Generic storage failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether resubmitting the same request with a fresh read may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConcurrencyConflict { .. } | Error::LockTimeout { .. }
        )
    }

    /// Whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this is an optimistic conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }

    /// Whether the failure came from the underlying store rather than a
    /// business rule
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Serialization(_) | Error::Corruption(_) | Error::Storage(_)
        )
    }
}
