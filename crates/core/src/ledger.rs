//! Ledger entries
//!
//! The ledger is the append-only audit trail of accepted stock mutations.
//! Entries are immutable once committed and are never deleted.

use crate::error::{Error, Result};
use crate::types::{ActorId, BatchId, LedgerId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a stock mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKind {
    /// Stock leaves the batch
    Sale,
    /// Stock enters the batch
    Purchase,
}

impl LedgerKind {
    /// Quantity after applying `delta` to `current`.
    ///
    /// A sale that would take the batch below zero fails with
    /// `InsufficientStock`; a purchase fails only on integer overflow.
    pub fn apply(&self, batch_id: BatchId, current: u64, delta: u64) -> Result<u64> {
        match self {
            LedgerKind::Sale => current.checked_sub(delta).ok_or(Error::InsufficientStock {
                batch_id,
                requested: delta,
                available: current,
            }),
            LedgerKind::Purchase => current.checked_add(delta).ok_or(Error::Overflow {
                what: "quantity_current",
            }),
        }
    }

    /// Lower-case label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Sale => "sale",
            LedgerKind::Purchase => "purchase",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted stock mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Store-assigned id
    pub id: LedgerId,
    /// Sale or purchase
    pub kind: LedgerKind,
    /// Batch that was mutated
    pub batch_id: BatchId,
    /// User that triggered the mutation
    pub actor_id: ActorId,
    /// Positive magnitude of the change; the sign follows from `kind`
    pub quantity_delta: u64,
    /// `unit_price × quantity_delta` at mutation time
    pub total_amount: Decimal,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build an entry, capturing the total from the price read at mutation time.
    ///
    /// `timestamp` is provisional: the transaction manager restamps staged
    /// entries with the commit time.
    pub fn new(
        id: LedgerId,
        kind: LedgerKind,
        batch_id: BatchId,
        actor_id: ActorId,
        quantity_delta: u64,
        unit_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let total_amount = unit_price
            .checked_mul(Decimal::from(quantity_delta))
            .ok_or(Error::Overflow {
                what: "total_amount",
            })?;
        Ok(LedgerEntry {
            id,
            kind,
            batch_id,
            actor_id,
            quantity_delta,
            total_amount,
            timestamp,
        })
    }

    /// Signed effect on `quantity_current`
    pub fn signed_delta(&self) -> i128 {
        match self.kind {
            LedgerKind::Sale => -i128::from(self.quantity_delta),
            LedgerKind::Purchase => i128::from(self.quantity_delta),
        }
    }
}
