//! Durability layer for the stock engine
//!
//! This crate implements write-ahead logging and recovery:
//! - WalEntry types: BeginTxn, Mutation, CommitTxn
//! - Entry encoding/decoding with CRC32 checksums
//! - Durability modes: None, Strict, Batched (default)
//! - Recovery: replay committed transactions, drop torn tails
//! - Background fsync for idle batched WALs

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod flusher;
pub mod mode;
pub mod recovery;
pub mod wal;

pub use encoding::{decode_entry, encode_entry};
pub use flusher::BackgroundSync;
pub use mode::DurabilityMode;
pub use recovery::{recover, RecoveryStats, ReplayedTransaction};
pub use wal::{Wal, WalEntry};
