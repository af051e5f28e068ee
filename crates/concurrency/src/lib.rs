//! Concurrency layer for the stock engine
//!
//! This crate implements guarded quantity writes with:
//! - TransactionContext: held row locks plus the staged write set
//! - Strategy: optimistic (version check, fail fast) or pessimistic
//!   (exclusive lock, blocking with a deadline)
//! - TransactionManager: serialized validate → WAL → apply commit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod strategy;
pub mod transaction;

pub use manager::{CommitInfo, TransactionManager, TransactionMetrics};
pub use strategy::{attempt_mutation, with_exclusive_lock, ScopedHandle, Strategy};
pub use transaction::{TransactionContext, TransactionStatus};
