//! Crash recovery by WAL replay
//!
//! After recovery the in-memory state corresponds to a prefix of the
//! committed transaction history: every transaction whose `CommitTxn` frame
//! survived is replayed in log order, everything else is discarded.
//!
//! ## Recovery Sequence
//!
//! 1. Scan frames from the start of the WAL
//! 2. Buffer mutations per transaction until its commit marker
//! 3. Hand each committed write set to the caller's apply function
//! 4. Truncate a torn or corrupt tail so new commits append cleanly

use crate::wal::{self, WalEntry};
use chrono::{DateTime, Utc};
use pharmastock_core::{Error, Mutation, Result, TxnId};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Recovery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Frames decoded
    pub entries_read: u64,
    /// Committed transactions replayed
    pub transactions_replayed: u64,
    /// Transactions without a commit marker, discarded
    pub orphaned_transactions: u64,
    /// Bytes cut from the tail of the WAL
    pub truncated_bytes: u64,
    /// Highest transaction id seen (committed or not)
    pub max_txn_id: Option<TxnId>,
}

impl RecoveryStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "replayed {} transactions from {} entries ({} orphaned, {} bytes truncated)",
            self.transactions_replayed,
            self.entries_read,
            self.orphaned_transactions,
            self.truncated_bytes
        )
    }
}

/// A committed transaction as read back from the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayedTransaction {
    /// Transaction id
    pub txn_id: TxnId,
    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
    /// Write set in staging order
    pub mutations: Vec<Mutation>,
}

/// Replay the WAL at `path`, calling `apply` once per committed transaction
/// in commit order.
///
/// An error from `apply` means the log contradicts itself (e.g. a quantity
/// write against a version that never existed) and is reported as
/// corruption; recovery stops there.
pub fn recover<F>(path: impl AsRef<Path>, mut apply: F) -> Result<RecoveryStats>
where
    F: FnMut(&ReplayedTransaction) -> Result<()>,
{
    let path = path.as_ref();
    let scan = wal::scan(path)?;

    let mut stats = RecoveryStats {
        entries_read: scan.entries.len() as u64,
        ..Default::default()
    };
    let mut open: HashMap<TxnId, ReplayedTransaction> = HashMap::new();

    for entry in scan.entries {
        let txn_id = entry.txn_id();
        stats.max_txn_id = stats.max_txn_id.max(Some(txn_id));

        match entry {
            WalEntry::BeginTxn { txn_id, timestamp } => {
                open.insert(
                    txn_id,
                    ReplayedTransaction {
                        txn_id,
                        timestamp,
                        mutations: Vec::new(),
                    },
                );
            }
            WalEntry::Mutation { txn_id, mutation } => match open.get_mut(&txn_id) {
                Some(txn) => txn.mutations.push(mutation),
                None => {
                    return Err(Error::Corruption(format!(
                        "mutation for {} without BeginTxn",
                        txn_id
                    )))
                }
            },
            WalEntry::CommitTxn { txn_id } => {
                let txn = open.remove(&txn_id).ok_or_else(|| {
                    Error::Corruption(format!("CommitTxn for {} without BeginTxn", txn_id))
                })?;
                apply(&txn).map_err(|e| {
                    Error::Corruption(format!("replay of {} failed: {}", txn_id, e))
                })?;
                stats.transactions_replayed += 1;
            }
        }
    }

    stats.orphaned_transactions = open.len() as u64;
    if stats.orphaned_transactions > 0 {
        warn!(
            orphaned = stats.orphaned_transactions,
            "discarding transactions without commit marker"
        );
    }

    if scan.discarded_bytes > 0 {
        wal::truncate(path, scan.valid_len)?;
        stats.truncated_bytes = scan.discarded_bytes;
        warn!(
            bytes = scan.discarded_bytes,
            valid_len = scan.valid_len,
            "truncated WAL tail"
        );
    }

    info!(path = %path.display(), "{}", stats.summary());
    Ok(stats)
}
