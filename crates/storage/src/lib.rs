//! Storage layer for the stock engine
//!
//! This crate implements the in-memory side of the transactional store:
//! - StockStore: record and ledger tables with atomic write-set apply
//! - LockTable: per-batch exclusive row locks with timeouts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod locks;
pub mod store;

pub use locks::{LockTable, RowLock};
pub use store::StockStore;
