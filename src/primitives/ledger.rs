//! Transaction history.
//!
//! The ledger is append-only: entries are never edited or deleted.

use crate::error::Result;
use crate::types::{BatchId, DashboardSummary, LedgerEntry};
use chrono::{NaiveDate, Utc};
use pharmastock_engine::{Database, DEFAULT_HISTORY_LIMIT};
use std::sync::Arc;

/// Ledger queries.
///
/// Access via `db.ledger`.
pub struct Ledger {
    db: Arc<Database>,
}

impl Ledger {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The 50 most recent entries, newest first.
    pub fn recent(&self) -> Vec<LedgerEntry> {
        self.history(DEFAULT_HISTORY_LIMIT)
    }

    /// The `limit` most recent entries, newest first.
    pub fn history(&self, limit: usize) -> Vec<LedgerEntry> {
        self.db.history(limit)
    }

    /// Entries of one batch in commit order.
    pub fn for_batch(&self, batch_id: BatchId) -> Result<Vec<LedgerEntry>> {
        Ok(self.db.ledger_for_batch(batch_id)?)
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.db.store().ledger_len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dashboard counters as of `today`.
    pub fn summary(&self, today: NaiveDate) -> DashboardSummary {
        self.db.summary(today)
    }

    /// Dashboard counters as of the current UTC date.
    pub fn summary_today(&self) -> DashboardSummary {
        self.summary(Utc::now().date_naive())
    }
}
