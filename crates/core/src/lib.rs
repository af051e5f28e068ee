//! Core types for the stock engine
//!
//! This crate defines the data model shared by every layer:
//! - [`StockRecord`]: versioned remaining quantity of a batch
//! - [`LedgerEntry`]: immutable record of an accepted mutation
//! - [`Mutation`]: unit of a transaction's write set (WAL and memory alike)
//! - [`Error`]: failure taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ledger;
pub mod mutation;
pub mod record;
pub mod types;

pub use error::{Error, Result};
pub use ledger::{LedgerEntry, LedgerKind};
pub use mutation::Mutation;
pub use record::{BatchDetails, ExpiryStatus, NewBatch, StockRecord};
pub use types::{ActorId, BatchId, LedgerId, MedicationId, TxnId};
