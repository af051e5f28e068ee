//! Batch administration and inventory.
//!
//! # Example
//!
//! ```ignore
//! use pharmastock::prelude::*;
//!
//! let db = PharmaStock::ephemeral()?;
//! let batch = db.batches.register(NewBatch { .. })?;
//! let items = db.batches.inventory(today);
//! ```

use crate::error::Result;
use crate::types::{BatchDetails, BatchId, InventoryItem, NewBatch, StockRecord};
use chrono::{NaiveDate, Utc};
use pharmastock_engine::Database;
use std::sync::Arc;

/// Batch operations.
///
/// Access via `db.batches`.
pub struct Batches {
    db: Arc<Database>,
}

impl Batches {
    pub(crate) fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Receive a new batch.
    ///
    /// The store assigns the id; the returned record has
    /// `quantity_current == quantity_initial` and `version == 0`.
    pub fn register(&self, intake: NewBatch) -> Result<StockRecord> {
        Ok(self.db.register_batch(intake)?)
    }

    /// Get a batch.
    pub fn get(&self, batch_id: BatchId) -> Result<StockRecord> {
        Ok(self.db.get_batch(batch_id)?)
    }

    /// Check whether a batch exists.
    pub fn exists(&self, batch_id: BatchId) -> bool {
        self.db.store().contains(&batch_id)
    }

    /// List every batch ordered by id.
    pub fn list(&self) -> Vec<StockRecord> {
        self.db.batches()
    }

    /// Update descriptive fields and price.
    ///
    /// Quantity and version are untouched; so are totals of ledger entries
    /// already written.
    pub fn update_details(&self, batch_id: BatchId, details: BatchDetails) -> Result<StockRecord> {
        Ok(self.db.update_batch_details(batch_id, details)?)
    }

    /// Remove a batch that has no ledger entries.
    pub fn remove(&self, batch_id: BatchId) -> Result<()> {
        Ok(self.db.remove_batch(batch_id)?)
    }

    /// Inventory with expiry status as of `today`.
    pub fn inventory(&self, today: NaiveDate) -> Vec<InventoryItem> {
        self.db.inventory(today)
    }

    /// Inventory with expiry status as of the current UTC date.
    pub fn inventory_today(&self) -> Vec<InventoryItem> {
        self.inventory(Utc::now().date_naive())
    }
}
