//! Store mutations
//!
//! A transaction's write set is an ordered list of [`Mutation`]s. The same
//! values are written to the WAL and applied to memory, so replay after a
//! crash goes through exactly the code path a live commit does.

use crate::ledger::LedgerEntry;
use crate::record::{BatchDetails, StockRecord};
use crate::types::BatchId;
use serde::{Deserialize, Serialize};

/// One state change staged inside a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Administrative intake of a new batch
    InsertBatch(StockRecord),

    /// Administrative update of descriptive fields
    UpdateDetails {
        /// Target batch
        batch_id: BatchId,
        /// New descriptive fields
        details: BatchDetails,
    },

    /// Administrative removal of an unreferenced batch
    RemoveBatch(BatchId),

    /// Strategy-guarded quantity write
    ///
    /// Applies only while the record is still at `expected_version`; the
    /// version then becomes `expected_version + 1`.
    SetQuantity {
        /// Target batch
        batch_id: BatchId,
        /// New `quantity_current`
        quantity: u64,
        /// Version the writer observed
        expected_version: u64,
    },

    /// Ledger append
    AppendLedger(LedgerEntry),
}

impl Mutation {
    /// Batch this mutation touches
    pub fn batch_id(&self) -> BatchId {
        match self {
            Mutation::InsertBatch(record) => record.batch_id,
            Mutation::UpdateDetails { batch_id, .. } => *batch_id,
            Mutation::RemoveBatch(batch_id) => *batch_id,
            Mutation::SetQuantity { batch_id, .. } => *batch_id,
            Mutation::AppendLedger(entry) => entry.batch_id,
        }
    }

    /// Whether this mutation changes the quantity/version pair
    pub fn is_quantity_write(&self) -> bool {
        matches!(self, Mutation::SetQuantity { .. })
    }
}
