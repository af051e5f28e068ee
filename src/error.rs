//! Unified error types for PharmaStock.
//!
//! This module provides a clean error type that wraps internal errors
//! and presents a consistent interface to users.

use thiserror::Error;

/// All PharmaStock errors.
///
/// This is the canonical error type for all facade operations.
/// It provides a stable interface that hides internal error details.
#[derive(Debug, Error)]
pub enum Error {
    /// Batch not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A sale asked for more than the batch holds; nothing was written
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Quantity asked for
        requested: u64,
        /// Quantity on hand
        available: u64,
    },

    /// Optimistic write lost the race; re-read and resubmit
    #[error("conflict: {0}")]
    Conflict(String),

    /// Pessimistic lock not acquired in time; resubmit
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// Constraint violation (invalid input, referenced batch, bad config)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for PharmaStock operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Conflicts and lock timeouts may succeed on retry with fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::LockTimeout(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if the store itself failed (as opposed to a business rule).
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Serialization(_) | Error::Storage(_) | Error::Internal(_)
        )
    }
}

// Convert from internal core errors
impl From<pharmastock_core::Error> for Error {
    fn from(e: pharmastock_core::Error) -> Self {
        use pharmastock_core::Error as CoreError;
        match e {
            CoreError::NotFound(batch_id) => Error::NotFound(batch_id.to_string()),
            CoreError::InsufficientStock {
                requested,
                available,
                ..
            } => Error::InsufficientStock {
                requested,
                available,
            },
            e @ CoreError::ConcurrencyConflict { .. } => Error::Conflict(e.to_string()),
            CoreError::LockTimeout {
                batch_id,
                waited_ms,
            } => Error::LockTimeout(format!("{} after {}ms", batch_id, waited_ms)),
            e @ (CoreError::LockOrderViolation { .. }
            | CoreError::TransactionNotActive { .. }) => Error::Internal(e.to_string()),
            CoreError::InvalidQuantity(msg) => Error::ConstraintViolation(msg),
            e @ CoreError::Overflow { .. } => Error::ConstraintViolation(e.to_string()),
            CoreError::InvalidBatch(msg) => Error::ConstraintViolation(msg),
            e @ (CoreError::DuplicateBatch(_) | CoreError::BatchReferenced { .. }) => {
                Error::ConstraintViolation(e.to_string())
            }
            CoreError::InvalidConfig(msg) => {
                Error::ConstraintViolation(format!("configuration: {}", msg))
            }
            CoreError::Io(io_err) => Error::Io(io_err),
            CoreError::Serialization(msg) => Error::Serialization(msg),
            CoreError::Corruption(msg) => Error::Storage(format!("corruption: {}", msg)),
            CoreError::Storage(msg) => Error::Storage(msg),
        }
    }
}
