//! Transaction context
//!
//! A [`TransactionContext`] is a scoped handle on the store for the duration
//! of one all-or-nothing operation. It tracks:
//! - the row locks the transaction holds (released exactly once, on commit,
//!   abort, or drop)
//! - the staged write set, invisible to everyone until commit
//!
//! The context borrows the store and lock table, so it cannot outlive the
//! database it was started on.

use chrono::Utc;
use pharmastock_core::{
    ActorId, BatchId, Error, LedgerEntry, LedgerId, LedgerKind, Mutation, Result, StockRecord,
    TxnId,
};
use pharmastock_storage::{LockTable, RowLock, StockStore};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle state of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting reads, locks and staged writes
    Active,
    /// Write set is durable and visible
    Committed,
    /// Discarded; nothing was written
    Aborted {
        /// Why the transaction ended
        reason: String,
    },
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Active => f.write_str("active"),
            TransactionStatus::Committed => f.write_str("committed"),
            TransactionStatus::Aborted { reason } => write!(f, "aborted: {}", reason),
        }
    }
}

/// Scoped transaction over the stock store
pub struct TransactionContext<'s> {
    txn_id: TxnId,
    store: &'s StockStore,
    locks: &'s LockTable,
    /// Held row locks, ascending by batch id
    held: Vec<(BatchId, Arc<RowLock>)>,
    mutations: Vec<Mutation>,
    status: TransactionStatus,
}

impl<'s> TransactionContext<'s> {
    /// Start a transaction
    pub fn new(txn_id: TxnId, store: &'s StockStore, locks: &'s LockTable) -> Self {
        TransactionContext {
            txn_id,
            store,
            locks,
            held: Vec::new(),
            mutations: Vec::new(),
            status: TransactionStatus::Active,
        }
    }

    /// Transaction id
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Current lifecycle state
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Whether the transaction still accepts work
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Staged write set in order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Batches whose row lock this transaction holds, ascending
    pub fn held_locks(&self) -> Vec<BatchId> {
        self.held.iter().map(|(batch_id, _)| *batch_id).collect()
    }

    /// Whether this transaction holds the row lock on `batch_id`
    pub fn holds_lock(&self, batch_id: BatchId) -> bool {
        self.held.iter().any(|(held, _)| *held == batch_id)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                txn_id: self.txn_id,
                state: self.status.to_string(),
            })
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Committed state of a batch, read without taking any lock
    pub fn read(&self, batch_id: BatchId) -> Result<StockRecord> {
        self.ensure_active()?;
        self.store.require(&batch_id)
    }

    // ========================================================================
    // Row locks
    // ========================================================================

    /// Locks must be taken in ascending batch order. Since `held` is kept
    /// sorted, comparing with its last element is enough.
    fn check_lock_order(&self, batch_id: BatchId) -> Result<()> {
        match self.held.last() {
            Some((highest, _)) if batch_id < *highest => Err(Error::LockOrderViolation {
                held: *highest,
                requested: batch_id,
            }),
            _ => Ok(()),
        }
    }

    /// Take the row lock without waiting. Returns `false` if another
    /// transaction holds it.
    pub fn try_lock_row(&mut self, batch_id: BatchId) -> Result<bool> {
        self.ensure_active()?;
        if self.holds_lock(batch_id) {
            return Ok(true);
        }
        self.check_lock_order(batch_id)?;

        let row = self.locks.row(batch_id);
        if row.try_acquire(self.txn_id) {
            self.held.push((batch_id, row));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Take the row lock, waiting at most `timeout`
    ///
    /// # Errors
    ///
    /// `LockTimeout` if the lock stayed held elsewhere; nothing is held then.
    pub fn lock_row(&mut self, batch_id: BatchId, timeout: Duration) -> Result<()> {
        self.ensure_active()?;
        if self.holds_lock(batch_id) {
            return Ok(());
        }
        self.check_lock_order(batch_id)?;

        let row = self.locks.row(batch_id);
        if row.acquire_timeout(self.txn_id, timeout) {
            tracing::trace!(txn_id = %self.txn_id, batch_id = %batch_id, "row lock acquired");
            self.held.push((batch_id, row));
            Ok(())
        } else {
            Err(Error::LockTimeout {
                batch_id,
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }

    /// Give up one row lock before the transaction ends.
    ///
    /// Refused while the write set still touches the batch.
    pub fn unlock_row(&mut self, batch_id: BatchId) -> Result<()> {
        if self.mutations.iter().any(|m| m.batch_id() == batch_id) {
            return Err(Error::Storage(format!(
                "{} has staged writes on {}; lock must be held until commit",
                self.txn_id, batch_id
            )));
        }
        if let Some(position) = self.held.iter().position(|(held, _)| *held == batch_id) {
            let (_, row) = self.held.remove(position);
            row.release(self.txn_id);
        }
        Ok(())
    }

    fn release_locks(&mut self) {
        for (_, row) in self.held.drain(..) {
            row.release(self.txn_id);
        }
    }

    // ========================================================================
    // Staged writes
    // ========================================================================

    /// Stage a mutation.
    ///
    /// Quantity writes are only accepted while the transaction holds the
    /// batch's row lock; that is what makes the later commit safe.
    pub fn stage(&mut self, mutation: Mutation) -> Result<()> {
        self.ensure_active()?;
        if mutation.is_quantity_write() && !self.holds_lock(mutation.batch_id()) {
            return Err(Error::Storage(format!(
                "quantity write on {} without its row lock",
                mutation.batch_id()
            )));
        }
        self.mutations.push(mutation);
        Ok(())
    }

    /// Stage a ledger append and return the id the store assigned to it
    pub fn stage_ledger(
        &mut self,
        kind: LedgerKind,
        batch_id: BatchId,
        actor_id: ActorId,
        quantity_delta: u64,
        unit_price: Decimal,
    ) -> Result<LedgerId> {
        self.ensure_active()?;
        let id = self.store.allocate_ledger_id();
        let entry = LedgerEntry::new(
            id,
            kind,
            batch_id,
            actor_id,
            quantity_delta,
            unit_price,
            Utc::now(),
        )?;
        self.mutations.push(Mutation::AppendLedger(entry));
        Ok(id)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub(crate) fn store(&self) -> &'s StockStore {
        self.store
    }

    pub(crate) fn mutations_mut(&mut self) -> &mut Vec<Mutation> {
        &mut self.mutations
    }

    pub(crate) fn mark_committed(&mut self) {
        self.status = TransactionStatus::Committed;
        self.release_locks();
    }

    /// Abort: discard the write set and release every lock
    pub fn mark_aborted(&mut self, reason: impl Into<String>) {
        if self.is_active() {
            self.status = TransactionStatus::Aborted {
                reason: reason.into(),
            };
        }
        self.mutations.clear();
        self.release_locks();
    }
}

impl Drop for TransactionContext<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            self.mark_aborted("dropped without commit");
        }
        self.release_locks();
    }
}

impl std::fmt::Debug for TransactionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("status", &self.status)
            .field("held", &self.held_locks())
            .field("mutations", &self.mutations.len())
            .finish()
    }
}
