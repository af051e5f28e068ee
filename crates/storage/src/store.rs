//! Stock record and ledger tables
//!
//! Both tables live behind one `RwLock` so a committed write set becomes
//! visible all at once: a reader sees either none or all of a transaction's
//! quantity writes and ledger appends.
//!
//! # Design
//!
//! - Records: `BTreeMap` keyed by `BatchId` (ordered listing for reports)
//! - Ledger: `Vec` in commit order plus an `FxHashMap` index per batch
//! - Id sequences: `AtomicU64`, allocated outside the table lock
//!
//! `apply()` validates the whole write set against a staging copy before
//! touching the tables, so a failing mutation leaves no partial state.
//! `validate()` runs the same staging under the shared lock.

use parking_lot::RwLock;
use pharmastock_core::{
    BatchId, Error, LedgerEntry, LedgerId, Mutation, Result, StockRecord,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<BatchId, StockRecord>,
    ledger: Vec<LedgerEntry>,
    /// Positions in `ledger` per batch, in commit order
    ledger_by_batch: FxHashMap<BatchId, Vec<usize>>,
}

impl Tables {
    fn ledger_refs(&self, batch_id: &BatchId) -> usize {
        self.ledger_by_batch.get(batch_id).map_or(0, Vec::len)
    }

    fn push_ledger(&mut self, entry: LedgerEntry) {
        let position = self.ledger.len();
        self.ledger_by_batch
            .entry(entry.batch_id)
            .or_default()
            .push(position);
        self.ledger.push(entry);
    }
}

/// Durable-state tables for batches and the ledger
///
/// # Thread Safety
///
/// Reads take the shared lock; `apply()` takes the exclusive lock for the
/// duration of validation and write-back only. Callers that need
/// read-modify-write isolation use the row locks in [`crate::LockTable`]
/// and the commit protocol of the concurrency crate; the store itself only
/// guarantees that each `apply()` is atomic.
pub struct StockStore {
    tables: RwLock<Tables>,
    /// Last batch id handed out
    last_batch_id: AtomicU64,
    /// Last ledger id handed out
    last_ledger_id: AtomicU64,
}

impl StockStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            last_batch_id: AtomicU64::new(0),
            last_ledger_id: AtomicU64::new(0),
        }
    }

    /// Allocate the next batch id
    pub fn allocate_batch_id(&self) -> BatchId {
        BatchId(self.last_batch_id.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Allocate the next ledger id
    ///
    /// Ids of transactions that later abort are not reused.
    pub fn allocate_ledger_id(&self) -> LedgerId {
        LedgerId(self.last_ledger_id.fetch_add(1, Ordering::AcqRel) + 1)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current state of a batch
    pub fn get(&self, batch_id: &BatchId) -> Option<StockRecord> {
        self.tables.read().records.get(batch_id).cloned()
    }

    /// Current state of a batch, or `NotFound`
    pub fn require(&self, batch_id: &BatchId) -> Result<StockRecord> {
        self.get(batch_id).ok_or(Error::NotFound(*batch_id))
    }

    /// Whether a batch exists
    pub fn contains(&self, batch_id: &BatchId) -> bool {
        self.tables.read().records.contains_key(batch_id)
    }

    /// Number of batches
    pub fn batch_count(&self) -> usize {
        self.tables.read().records.len()
    }

    /// All batches ordered by id
    pub fn records(&self) -> Vec<StockRecord> {
        self.tables.read().records.values().cloned().collect()
    }

    /// Number of committed ledger entries
    pub fn ledger_len(&self) -> usize {
        self.tables.read().ledger.len()
    }

    /// Every ledger entry in commit order
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.tables.read().ledger.clone()
    }

    /// Ledger entries of one batch in commit order
    pub fn ledger_for_batch(&self, batch_id: &BatchId) -> Vec<LedgerEntry> {
        let tables = self.tables.read();
        tables
            .ledger_by_batch
            .get(batch_id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&i| tables.ledger[i].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of ledger entries referencing a batch
    pub fn ledger_count_for_batch(&self, batch_id: &BatchId) -> usize {
        self.tables.read().ledger_refs(batch_id)
    }

    /// The `limit` most recent ledger entries, newest first
    pub fn recent_ledger(&self, limit: usize) -> Vec<LedgerEntry> {
        self.tables
            .read()
            .ledger
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// A batch together with its ledger, read under one lock
    ///
    /// Lets callers check the record/ledger relationship without a commit
    /// landing between the two reads.
    pub fn snapshot_batch(&self, batch_id: &BatchId) -> Option<(StockRecord, Vec<LedgerEntry>)> {
        let tables = self.tables.read();
        let record = tables.records.get(batch_id)?.clone();
        let entries = tables
            .ledger_by_batch
            .get(batch_id)
            .map(|positions| positions.iter().map(|&i| tables.ledger[i].clone()).collect())
            .unwrap_or_default();
        Some((record, entries))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Check a write set against the current state without applying it
    ///
    /// Callers that serialize all writers (the commit protocol does) can rely
    /// on a subsequent `apply()` of the same write set succeeding.
    pub fn validate(&self, mutations: &[Mutation]) -> Result<()> {
        let tables = self.tables.read();
        stage(&tables, mutations).map(|_| ())
    }

    /// Apply a write set atomically
    ///
    /// Every mutation is validated against the state produced by the ones
    /// before it. If any fails, nothing is written and the error is returned.
    ///
    /// # Errors
    ///
    /// - `DuplicateBatch` when inserting an existing id
    /// - `NotFound` when touching a missing batch
    /// - `ConcurrencyConflict` when a quantity write's expected version is stale
    /// - `BatchReferenced` when removing a batch that has ledger entries
    pub fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        let mut tables = self.tables.write();
        let staged = stage(&tables, mutations)?;

        // Validation passed: write back
        for (batch_id, record) in staged.records {
            match record {
                Some(record) => {
                    self.last_batch_id.fetch_max(batch_id.0, Ordering::AcqRel);
                    tables.records.insert(batch_id, record);
                }
                None => {
                    tables.records.remove(&batch_id);
                }
            }
        }
        for entry in staged.ledger {
            self.last_ledger_id.fetch_max(entry.id.0, Ordering::AcqRel);
            tables.push_ledger(entry);
        }

        tracing::trace!(mutations = mutations.len(), "write set applied");
        Ok(())
    }
}

/// Result of validating a write set: final state of every touched batch
/// (`None` = removed) and the ledger entries to append
#[derive(Default)]
struct Staged {
    records: FxHashMap<BatchId, Option<StockRecord>>,
    ledger: Vec<LedgerEntry>,
}

fn stage(tables: &Tables, mutations: &[Mutation]) -> Result<Staged> {
    let mut staged = Staged::default();

    for mutation in mutations {
        let batch_id = mutation.batch_id();
        let current = match staged.records.get(&batch_id) {
            Some(staged_record) => staged_record.clone(),
            None => tables.records.get(&batch_id).cloned(),
        };

        match mutation {
            Mutation::InsertBatch(record) => {
                if current.is_some() {
                    return Err(Error::DuplicateBatch(batch_id));
                }
                staged.records.insert(batch_id, Some(record.clone()));
            }
            Mutation::UpdateDetails { details, .. } => {
                let mut record = current.ok_or(Error::NotFound(batch_id))?;
                record.apply_details(details);
                staged.records.insert(batch_id, Some(record));
            }
            Mutation::RemoveBatch(_) => {
                if current.is_none() {
                    return Err(Error::NotFound(batch_id));
                }
                let entries = tables.ledger_refs(&batch_id)
                    + staged.ledger.iter().filter(|e| e.batch_id == batch_id).count();
                if entries > 0 {
                    return Err(Error::BatchReferenced { batch_id, entries });
                }
                staged.records.insert(batch_id, None);
            }
            Mutation::SetQuantity {
                quantity,
                expected_version,
                ..
            } => {
                let mut record = current.ok_or(Error::NotFound(batch_id))?;
                record.apply_quantity(*quantity, *expected_version)?;
                staged.records.insert(batch_id, Some(record));
            }
            Mutation::AppendLedger(entry) => {
                if current.is_none() {
                    return Err(Error::NotFound(batch_id));
                }
                staged.ledger.push(entry.clone());
            }
        }
    }

    Ok(staged)
}

impl Default for StockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("StockStore")
            .field("batches", &tables.records.len())
            .field("ledger_entries", &tables.ledger.len())
            .finish()
    }
}
