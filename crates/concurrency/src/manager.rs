//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Validation of the write set against committed state
//! 2. WAL writing (durability)
//! 3. Store application (visibility)
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. take commit_lock            - one commit at a time
//! 2. stamp ledger entries        - commit timestamp, shared by the write set
//! 3. store.validate()            - IF it fails: abort, return error
//! 4. wal.append_transaction()    - BeginTxn, Mutation*, CommitTxn (DURABILITY POINT)
//! 5. store.apply()               - visible to readers
//! 6. release row locks
//! ```
//!
//! If a crash occurs before step 4 completes, the transaction is not durable
//! and recovery discards it. After step 4 it is replayed on recovery. Since
//! WAL order equals apply order, replay reproduces the same state.

use crate::transaction::{TransactionContext, TransactionStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pharmastock_core::{Error, Mutation, Result, TxnId};
use pharmastock_durability::Wal;
use pharmastock_storage::{LockTable, StockStore};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    /// Committed transaction
    pub txn_id: TxnId,
    /// Timestamp stamped on every ledger entry of the write set
    pub timestamp: DateTime<Utc>,
    /// Number of mutations applied
    pub mutations: usize,
}

/// Transaction counters since the manager was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetrics {
    /// Transactions committed
    pub committed: u64,
    /// Transactions aborted, for any reason
    pub aborted: u64,
    /// Optimistic races lost and stale writes refused at commit
    pub conflicts: u64,
    /// Pessimistic lock acquisitions that timed out
    pub lock_timeouts: u64,
}

impl TransactionMetrics {
    /// Fraction of finished transactions that committed, if any finished
    pub fn commit_ratio(&self) -> Option<f64> {
        let finished = self.committed + self.aborted;
        if finished == 0 {
            None
        } else {
            Some(self.committed as f64 / finished as f64)
        }
    }
}

/// Manages transaction lifecycle and atomic commits
///
/// # Thread Safety
///
/// Commits are serialized via an internal lock so that no other commit can
/// change the store between validation and application of a write set.
/// Row locks held by the committing transaction already exclude other
/// quantity writers on the same batches; the commit lock additionally orders
/// WAL appends identically to store applies.
pub struct TransactionManager {
    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Commit serialization lock
    commit_lock: Mutex<()>,

    committed: AtomicU64,
    aborted: AtomicU64,
    conflicts: AtomicU64,
    lock_timeouts: AtomicU64,
}

impl TransactionManager {
    /// Create a manager whose first transaction is `txn:1`
    pub fn new() -> Self {
        Self::with_txn_id(0)
    }

    /// Create a manager that resumes after `max_txn_id`
    ///
    /// Used after recovery so new transactions never reuse an id already
    /// present in the WAL.
    pub fn with_txn_id(max_txn_id: u64) -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(max_txn_id + 1),
            commit_lock: Mutex::new(()),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
        }
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> TxnId {
        TxnId(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Start a transaction against `store`
    pub fn begin<'s>(&self, store: &'s StockStore, locks: &'s LockTable) -> TransactionContext<'s> {
        let txn = TransactionContext::new(self.next_txn_id(), store, locks);
        tracing::trace!(txn_id = %txn.txn_id(), "transaction started");
        txn
    }

    /// Commit a transaction
    ///
    /// On success the write set is durable (per the WAL's mode) and visible,
    /// and every row lock of `txn` is released. On failure `txn` is aborted,
    /// nothing was written and its locks are released.
    ///
    /// # Errors
    ///
    /// - `TransactionNotActive` if `txn` already committed or aborted
    /// - `ConcurrencyConflict`, `NotFound`, ... from validating the write set
    /// - `Io` / `Serialization` from the WAL
    pub fn commit(
        &self,
        txn: &mut TransactionContext<'_>,
        wal: Option<&Mutex<Wal>>,
    ) -> Result<CommitInfo> {
        txn.ensure_active()?;
        let txn_id = txn.txn_id();
        let store = txn.store();

        let _commit_guard = self.commit_lock.lock();
        let timestamp = Utc::now();

        // Ledger timestamps are the moment of commit, not of staging
        for mutation in txn.mutations_mut().iter_mut() {
            if let Mutation::AppendLedger(entry) = mutation {
                entry.timestamp = timestamp;
            }
        }

        if let Err(e) = store.validate(txn.mutations()) {
            if e.is_conflict() {
                self.conflicts.fetch_add(1, Ordering::Relaxed);
            }
            self.abort(txn, format!("validation failed: {}", e));
            return Err(e);
        }

        let mutations = txn.mutations().len();
        if mutations > 0 {
            if let Some(wal) = wal {
                if let Err(e) = wal
                    .lock()
                    .append_transaction(txn_id, timestamp, txn.mutations())
                {
                    tracing::error!(txn_id = %txn_id, error = %e, "WAL append failed");
                    self.abort(txn, format!("WAL append failed: {}", e));
                    return Err(e);
                }
            }

            // Validated under the same commit lock, so this cannot fail
            // unless the store itself is broken
            if let Err(e) = store.apply(txn.mutations()) {
                tracing::error!(txn_id = %txn_id, error = %e, "apply failed after WAL append");
                self.abort(txn, format!("apply failed: {}", e));
                return Err(Error::Storage(format!(
                    "{} durable but not applied: {}",
                    txn_id, e
                )));
            }
        }

        txn.mark_committed();
        self.committed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(txn_id = %txn_id, mutations, "transaction committed");

        Ok(CommitInfo {
            txn_id,
            timestamp,
            mutations,
        })
    }

    /// Abort a transaction: discard its write set and release its locks.
    ///
    /// No-op for a transaction that already finished.
    pub fn abort(&self, txn: &mut TransactionContext<'_>, reason: impl Into<String>) {
        if txn.status() != &TransactionStatus::Active {
            return;
        }
        let reason = reason.into();
        tracing::debug!(txn_id = %txn.txn_id(), reason = %reason, "transaction aborted");
        txn.mark_aborted(reason);
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an optimistic race lost before commit
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a pessimistic lock acquisition that timed out
    pub fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        TransactionMetrics {
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_txn_id", &self.next_txn_id.load(Ordering::Relaxed))
            .field("metrics", &self.metrics())
            .finish()
    }
}
