//! Exclusive row locks
//!
//! One [`RowLock`] per batch, owned by at most one transaction at a time.
//! Pessimistic writers block on it (with a deadline); optimistic writers only
//! ever try it and fail fast. The lock is owned by a transaction id rather
//! than a guard so that it can be held across the read, the write and the
//! commit of one transaction and released in one place.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use pharmastock_core::{BatchId, TxnId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exclusive lock on one stock record
#[derive(Debug, Default)]
pub struct RowLock {
    owner: Mutex<Option<TxnId>>,
    released: Condvar,
}

impl RowLock {
    /// Create an unlocked row lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Transaction currently holding the lock
    pub fn owner(&self) -> Option<TxnId> {
        *self.owner.lock()
    }

    /// Take the lock without waiting.
    ///
    /// Returns `true` if `txn` now holds the lock (including when it already
    /// did).
    pub fn try_acquire(&self, txn: TxnId) -> bool {
        let mut owner = self.owner.lock();
        match *owner {
            None => {
                *owner = Some(txn);
                true
            }
            Some(holder) => holder == txn,
        }
    }

    /// Take the lock, waiting at most `timeout`.
    ///
    /// Returns `false` on timeout; nothing is held in that case. A timeout
    /// too large to express as a deadline (e.g. `Duration::MAX`) waits until
    /// the lock is released.
    pub fn acquire_timeout(&self, txn: TxnId, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut owner = self.owner.lock();
        loop {
            match *owner {
                None => {
                    *owner = Some(txn);
                    return true;
                }
                Some(holder) if holder == txn => return true,
                Some(_) => {}
            }
            let Some(deadline) = deadline else {
                self.released.wait(&mut owner);
                continue;
            };
            if self.released.wait_until(&mut owner, deadline).timed_out() {
                // Released exactly at the deadline still counts
                if owner.is_none() {
                    *owner = Some(txn);
                    return true;
                }
                return false;
            }
        }
    }

    /// Release the lock if `txn` holds it. Returns whether it did.
    pub fn release(&self, txn: TxnId) -> bool {
        let mut owner = self.owner.lock();
        if *owner == Some(txn) {
            *owner = None;
            drop(owner);
            self.released.notify_all();
            true
        } else {
            false
        }
    }
}

/// Row locks for every batch, created on first use
///
/// Sharded through `DashMap` so lock lookups on different batches never
/// contend on a table-wide mutex.
#[derive(Debug, Default)]
pub struct LockTable {
    rows: DashMap<BatchId, Arc<RowLock>>,
}

impl LockTable {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Row lock for a batch
    pub fn row(&self, batch_id: BatchId) -> Arc<RowLock> {
        if let Some(row) = self.rows.get(&batch_id) {
            return Arc::clone(row.value());
        }
        let entry = self
            .rows
            .entry(batch_id)
            .or_insert_with(|| Arc::new(RowLock::new()));
        Arc::clone(entry.value())
    }

    /// Drop the lock entry of a batch that no longer exists.
    ///
    /// Kept while some transaction still holds it. Returns whether the entry
    /// was removed.
    pub fn forget(&self, batch_id: BatchId) -> bool {
        self.rows
            .remove_if(&batch_id, |_, row| row.owner().is_none())
            .is_some()
    }

    /// Whether a lock entry exists for a batch
    pub fn tracks(&self, batch_id: BatchId) -> bool {
        self.rows.contains_key(&batch_id)
    }

    /// Transaction holding the lock on a batch, if any
    pub fn holder(&self, batch_id: BatchId) -> Option<TxnId> {
        self.rows.get(&batch_id).and_then(|row| row.owner())
    }

    /// Number of batches with a lock currently held
    pub fn held_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.value().owner().is_some())
            .count()
    }
}
