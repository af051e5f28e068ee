//! Guarded quantity writes
//!
//! Two interchangeable ways to change a batch's `quantity_current`:
//!
//! - **Optimistic**: read without locking, then write conditionally on the
//!   version read. The condition is checked under the row lock, which is
//!   only ever *tried*: an optimistic writer never waits for anybody. A
//!   lost race returns `false` and leaves the record untouched.
//! - **Pessimistic**: take the row lock (waiting up to a deadline) before
//!   reading, so the read-modify-write cannot interleave with any other
//!   writer.
//!
//! Either way the row lock is then held by the transaction until it commits
//! or aborts, and the staged `SetQuantity` carries the version it was
//! computed from, so the commit re-checks it.
//!
//! Neither strategy retries; that is the caller's decision.

use crate::transaction::TransactionContext;
use pharmastock_core::{BatchId, Error, Mutation, Result, StockRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Concurrency-control strategy chosen per mutation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Version check at write time; fails fast on contention
    #[default]
    Optimistic,
    /// Exclusive lock before read-modify-write; blocks on contention
    Pessimistic,
}

impl Strategy {
    /// Lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Optimistic => "optimistic",
            Strategy::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Strategy::Optimistic),
            "pessimistic" => Ok(Strategy::Pessimistic),
            other => Err(Error::InvalidConfig(format!(
                "unknown strategy '{}' (expected optimistic or pessimistic)",
                other
            ))),
        }
    }
}

// ============================================================================
// Optimistic
// ============================================================================

/// Conditionally set `quantity_current` to `new_quantity`.
///
/// Succeeds only if the record is still at `expected_version` and no other
/// transaction holds its row lock. On `Ok(true)` the write is staged in
/// `txn` (version will become `expected_version + 1` at commit) and the row
/// lock stays held. On `Ok(false)` nothing was staged and no lock acquired
/// by this call remains held.
///
/// # Errors
///
/// `NotFound` if the batch does not exist; lifecycle errors from `txn`.
pub fn attempt_mutation(
    txn: &mut TransactionContext<'_>,
    batch_id: BatchId,
    new_quantity: u64,
    expected_version: u64,
) -> Result<bool> {
    let already_held = txn.holds_lock(batch_id);
    if !txn.try_lock_row(batch_id)? {
        tracing::debug!(txn_id = %txn.txn_id(), batch_id = %batch_id, "row busy, optimistic write lost");
        return Ok(false);
    }

    let current = match txn.store().get(&batch_id) {
        Some(record) => record,
        None => {
            if !already_held {
                txn.unlock_row(batch_id)?;
            }
            return Err(Error::NotFound(batch_id));
        }
    };

    if current.version != expected_version {
        tracing::debug!(
            txn_id = %txn.txn_id(),
            batch_id = %batch_id,
            expected = expected_version,
            actual = current.version,
            "version moved, optimistic write lost"
        );
        if !already_held {
            txn.unlock_row(batch_id)?;
        }
        return Ok(false);
    }

    txn.stage(Mutation::SetQuantity {
        batch_id,
        quantity: new_quantity,
        expected_version,
    })?;
    Ok(true)
}

// ============================================================================
// Pessimistic
// ============================================================================

/// Take the exclusive row lock on `batch_id` and read its state.
///
/// The returned handle is consumed by a single [`ScopedHandle::write`]. The
/// lock belongs to `txn` and is released when `txn` commits, aborts or is
/// dropped, whichever comes first, so every exit path releases it.
///
/// # Errors
///
/// - `LockTimeout` if the lock could not be taken within `timeout`
/// - `LockOrderViolation` if `txn` already holds a higher batch's lock
/// - `NotFound` if the batch does not exist
pub fn with_exclusive_lock<'t, 's>(
    txn: &'t mut TransactionContext<'s>,
    batch_id: BatchId,
    timeout: Duration,
) -> Result<ScopedHandle<'t, 's>> {
    let already_held = txn.holds_lock(batch_id);
    txn.lock_row(batch_id, timeout)?;
    let record = match txn.store().require(&batch_id) {
        Ok(record) => record,
        Err(e) => {
            if !already_held {
                txn.unlock_row(batch_id)?;
            }
            return Err(e);
        }
    };
    Ok(ScopedHandle { txn, record })
}

/// Exclusive view of one batch inside a transaction
pub struct ScopedHandle<'t, 's> {
    txn: &'t mut TransactionContext<'s>,
    record: StockRecord,
}

impl<'t, 's> ScopedHandle<'t, 's> {
    /// Remaining quantity at lock time
    pub fn quantity_current(&self) -> u64 {
        self.record.quantity_current
    }

    /// Version at lock time
    pub fn version(&self) -> u64 {
        self.record.version
    }

    /// Unit price at lock time
    pub fn unit_price(&self) -> Decimal {
        self.record.unit_price
    }

    /// Full record as read under the lock
    pub fn record(&self) -> &StockRecord {
        &self.record
    }

    /// Batch this handle locks
    pub fn batch_id(&self) -> BatchId {
        self.record.batch_id
    }

    /// Stage the unconditional write of `new_quantity`.
    ///
    /// The lock guarantees nobody else has moved the version since the read,
    /// so the staged write carries the version read here.
    pub fn write(self, new_quantity: u64) -> Result<&'t mut TransactionContext<'s>> {
        self.txn.stage(Mutation::SetQuantity {
            batch_id: self.record.batch_id,
            quantity: new_quantity,
            expected_version: self.record.version,
        })?;
        Ok(self.txn)
    }

    /// Give the transaction back without writing
    pub fn into_inner(self) -> &'t mut TransactionContext<'s> {
        self.txn
    }
}

impl fmt::Debug for ScopedHandle<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("batch_id", &self.record.batch_id)
            .field("quantity_current", &self.record.quantity_current)
            .field("version", &self.record.version)
            .finish()
    }
}
