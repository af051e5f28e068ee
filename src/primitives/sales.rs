//! Sales and purchases.
//!
//! Every call is one all-or-nothing transaction: the quantity write and the
//! ledger entry commit together or not at all.
//!
//! # Example
//!
//! ```ignore
//! use pharmastock::prelude::*;
//!
//! // Simple: Result-returning
//! let ledger_id = db.sales.sell(batch_id, "pharmacist-1", 30, Strategy::Optimistic)?;
//!
//! // Full control: the three-way outcome
//! let outcome = db.sales.execute(&StockMutation::sale(batch_id, "pharmacist-1", 30));
//! println!("{}", outcome.message());
//! ```

use crate::error::Result;
use crate::types::{ActorId, BatchId, LedgerId, Outcome, StockMutation, Strategy};
use pharmastock_engine::{Database, Orchestrator, RetryingOrchestrator};
use std::sync::Arc;

/// Sale and purchase operations.
///
/// Access via `db.sales`.
pub struct Sales {
    db: Arc<Database>,
}

impl Sales {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Simple API
    // =========================================================================

    /// Sell `quantity` units from a batch.
    ///
    /// Returns the ledger id. Insufficient stock, a lost optimistic race and
    /// a lock timeout come back as errors; nothing was written in any of
    /// those cases. Never retries.
    pub fn sell(
        &self,
        batch_id: BatchId,
        actor_id: impl Into<ActorId>,
        quantity: u64,
        strategy: Strategy,
    ) -> Result<LedgerId> {
        let request = StockMutation::sale(batch_id, actor_id, quantity).with_strategy(strategy);
        Ok(self.execute(&request).into_result(batch_id)?)
    }

    /// Receive `quantity` more units into a batch.
    pub fn purchase(
        &self,
        batch_id: BatchId,
        actor_id: impl Into<ActorId>,
        quantity: u64,
        strategy: Strategy,
    ) -> Result<LedgerId> {
        let request =
            StockMutation::purchase(batch_id, actor_id, quantity).with_strategy(strategy);
        Ok(self.execute(&request).into_result(batch_id)?)
    }

    // =========================================================================
    // Full control
    // =========================================================================

    /// Execute a request once and return its outcome.
    pub fn execute(&self, request: &StockMutation) -> Outcome {
        Orchestrator::new(&self.db).execute(request)
    }

    /// Execute a request, retrying lost races and lock timeouts per the
    /// configured retry policy.
    pub fn execute_with_retry(&self, request: &StockMutation) -> Outcome {
        RetryingOrchestrator::new(&self.db).execute(request)
    }
}
