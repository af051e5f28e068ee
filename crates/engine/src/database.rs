//! Database: the scoped store handle
//!
//! Owns the stock tables, the row-lock table, the transaction manager and
//! (when durable) the WAL. Everything that mutates state goes through
//! [`Database::commit`], so the WAL and memory always agree on the order of
//! committed transactions. In `Batched` mode a background thread fsyncs the
//! WAL once the interval runs out, so an idle database does not sit on
//! unsynced commits.
//!
//! ```ignore
//! use pharmastock_engine::Database;
//!
//! // Ephemeral (no disk files)
//! let db = Database::ephemeral()?;
//!
//! // Durable, fsync on every commit
//! let db = Database::builder()
//!     .path("/var/lib/pharmastock")
//!     .strict()
//!     .open()?;
//! ```

use crate::config::{RetryPolicy, StoreConfig};
use crate::reports::{self, DashboardSummary, InventoryItem};
use chrono::NaiveDate;
use parking_lot::Mutex;
use pharmastock_concurrency::{
    CommitInfo, TransactionContext, TransactionManager, TransactionMetrics,
};
use pharmastock_core::{
    BatchDetails, BatchId, Error, LedgerEntry, Mutation, NewBatch, Result, StockRecord,
};
use pharmastock_durability::{recover, BackgroundSync, DurabilityMode, RecoveryStats, Wal};
use pharmastock_storage::{LockTable, StockStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// File name of the write-ahead log inside the data directory
pub const WAL_FILE_NAME: &str = "stock.wal";

/// Default page size of [`Database::history`]
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// The stock database
///
/// Not a process-wide singleton: callers create one and pass it (or an
/// `Arc` of it) to whatever needs it. Transactions borrow it, so none can
/// outlive it.
pub struct Database {
    config: StoreConfig,
    store: StockStore,
    locks: LockTable,
    manager: TransactionManager,
    wal: Option<Arc<Mutex<Wal>>>,
    syncer: Option<BackgroundSync>,
    recovery: Option<RecoveryStats>,
}

impl Database {
    /// Open a database at the given directory with default settings
    /// (batched durability).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).open()
    }

    /// Create a database with no disk I/O; all data is lost on drop.
    pub fn ephemeral() -> Result<Self> {
        Self::with_config(StoreConfig::ephemeral())
    }

    /// Create a builder for database configuration
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Open a database from a validated configuration.
    ///
    /// With a data directory and a WAL-writing durability mode, committed
    /// transactions found in the WAL are replayed first and id sequences
    /// resume after the highest ids seen. With `DurabilityMode::None` the
    /// WAL is neither read nor written.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let store = StockStore::new();

        let (wal, syncer, recovery, manager) = match (&config.data_dir, config.durability) {
            (Some(dir), mode) if mode.requires_wal() => {
                std::fs::create_dir_all(dir)?;
                let wal_path = dir.join(WAL_FILE_NAME);
                let stats = recover(&wal_path, |txn| store.apply(&txn.mutations))?;
                let max_txn_id = stats.max_txn_id.map_or(0, |id| id.0);
                let wal = Arc::new(Mutex::new(Wal::open(&wal_path, mode)?));
                let syncer = BackgroundSync::start(Arc::clone(&wal))?;
                info!(
                    path = %wal_path.display(),
                    mode = mode.description(),
                    batches = store.batch_count(),
                    ledger_entries = store.ledger_len(),
                    "database opened"
                );
                (
                    Some(wal),
                    syncer,
                    Some(stats),
                    TransactionManager::with_txn_id(max_txn_id),
                )
            }
            (dir, _) => {
                debug!(data_dir = ?dir, "database opened without WAL");
                (None, None, None, TransactionManager::new())
            }
        };

        Ok(Database {
            config,
            store,
            locks: LockTable::new(),
            manager,
            wal,
            syncer,
            recovery,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Effective configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Data directory, if any
    pub fn data_dir(&self) -> Option<&Path> {
        self.config.data_dir.as_deref()
    }

    /// Current durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.config.durability
    }

    /// Whether nothing is persisted
    pub fn is_ephemeral(&self) -> bool {
        self.wal.is_none()
    }

    /// Default pessimistic lock wait
    pub fn lock_timeout(&self) -> Duration {
        self.config.lock_timeout()
    }

    /// Retry policy for [`crate::RetryingOrchestrator`]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    /// What recovery did when the database was opened
    pub fn recovery_stats(&self) -> Option<&RecoveryStats> {
        self.recovery.as_ref()
    }

    /// Underlying tables (read access)
    pub fn store(&self) -> &StockStore {
        &self.store
    }

    pub(crate) fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Start a transaction
    pub fn begin(&self) -> TransactionContext<'_> {
        self.manager.begin(&self.store, &self.locks)
    }

    /// Commit a transaction: validate, append to the WAL, apply
    pub fn commit(&self, txn: &mut TransactionContext<'_>) -> Result<CommitInfo> {
        self.manager.commit(txn, self.wal.as_deref())
    }

    /// Abort a transaction, releasing its locks
    pub fn abort(&self, txn: &mut TransactionContext<'_>, reason: impl Into<String>) {
        self.manager.abort(txn, reason)
    }

    /// Run `f` in a transaction: commit on `Ok`, abort on `Err`
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionContext<'_>) -> Result<T>,
    {
        let mut txn = self.begin();
        match f(&mut txn) {
            Ok(value) => {
                self.commit(&mut txn)?;
                Ok(value)
            }
            Err(e) => {
                if matches!(e, Error::LockTimeout { .. }) {
                    self.manager.record_lock_timeout();
                }
                self.abort(&mut txn, e.to_string());
                Err(e)
            }
        }
    }

    /// Transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.manager.metrics()
    }

    /// Force everything committed so far to disk
    pub fn flush(&self) -> Result<()> {
        match &self.wal {
            Some(wal) => wal.lock().flush(),
            None => Ok(()),
        }
    }

    /// Flush and report; the database stays usable
    pub fn close(&self) -> Result<()> {
        self.flush()?;
        info!(metrics = ?self.metrics(), "database closed");
        Ok(())
    }

    // ========================================================================
    // Administrative batch operations
    // ========================================================================

    /// Receive a new batch. The store assigns its id; `quantity_current`
    /// starts at the received quantity and `version` at 0.
    pub fn register_batch(&self, intake: NewBatch) -> Result<StockRecord> {
        intake.validate()?;
        let batch_id = self.store.allocate_batch_id();
        let record = StockRecord::from_intake(batch_id, intake);

        self.transaction(|txn| txn.stage(Mutation::InsertBatch(record.clone())))?;
        debug!(batch_id = %batch_id, quantity = record.quantity_initial, "batch registered");
        Ok(record)
    }

    /// Update descriptive fields and price. Quantity and version are left
    /// alone; ledger entries already written keep their totals.
    pub fn update_batch_details(
        &self,
        batch_id: BatchId,
        details: BatchDetails,
    ) -> Result<StockRecord> {
        details.validate()?;
        let timeout = self.lock_timeout();
        self.transaction(|txn| {
            txn.lock_row(batch_id, timeout)?;
            txn.read(batch_id)?;
            txn.stage(Mutation::UpdateDetails {
                batch_id,
                details: details.clone(),
            })
        })?;
        debug!(batch_id = %batch_id, "batch details updated");
        self.store.require(&batch_id)
    }

    /// Remove a batch that no ledger entry references.
    ///
    /// # Errors
    ///
    /// `BatchReferenced` if the batch has ledger entries, `NotFound` if it
    /// does not exist, `LockTimeout` if a writer kept it locked.
    pub fn remove_batch(&self, batch_id: BatchId) -> Result<()> {
        let timeout = self.lock_timeout();
        let removed = self.transaction(|txn| {
            txn.lock_row(batch_id, timeout)?;
            txn.read(batch_id)?;
            let entries = self.store.ledger_count_for_batch(&batch_id);
            if entries > 0 {
                return Err(Error::BatchReferenced { batch_id, entries });
            }
            txn.stage(Mutation::RemoveBatch(batch_id))
        });
        // Ids are never reused, so a gone batch needs no lock entry
        if matches!(removed, Ok(()) | Err(Error::NotFound(_))) {
            self.locks.forget(batch_id);
        }
        removed?;
        debug!(batch_id = %batch_id, "batch removed");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current state of a batch
    pub fn get_batch(&self, batch_id: BatchId) -> Result<StockRecord> {
        self.store.require(&batch_id)
    }

    /// Every batch ordered by id
    pub fn batches(&self) -> Vec<StockRecord> {
        self.store.records()
    }

    /// Ledger entries of one batch in commit order
    pub fn ledger_for_batch(&self, batch_id: BatchId) -> Result<Vec<LedgerEntry>> {
        match self.store.snapshot_batch(&batch_id) {
            Some((_, entries)) => Ok(entries),
            None => Err(Error::NotFound(batch_id)),
        }
    }

    /// The `limit` most recent ledger entries, newest first
    pub fn history(&self, limit: usize) -> Vec<LedgerEntry> {
        self.store.recent_ledger(limit)
    }

    /// Every batch with its expiry status as of `today`
    pub fn inventory(&self, today: NaiveDate) -> Vec<InventoryItem> {
        reports::inventory(&self.store, today, self.config.expiry_warning_days)
    }

    /// Dashboard counters as of `today`
    pub fn summary(&self, today: NaiveDate) -> DashboardSummary {
        reports::summary(&self.store, today, self.config.expiry_warning_days)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(syncer) = self.syncer.as_mut() {
            syncer.stop();
        }
        if let Err(e) = self.flush() {
            warn!(error = %e, "flush on drop failed");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.config.data_dir)
            .field("durability", &self.config.durability)
            .field("store", &self.store)
            .field("manager", &self.manager)
            .field("background_sync", &self.syncer.is_some())
            .finish()
    }
}

/// Builder for database configuration
///
/// ```ignore
/// let db = Database::builder()
///     .path("./stock")
///     .batched(50, 100)
///     .lock_timeout(Duration::from_millis(500))
///     .open()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatabaseBuilder {
    config: StoreConfig,
}

impl DatabaseBuilder {
    /// Builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: StoreConfig) -> Self {
        DatabaseBuilder { config }
    }

    /// Set the data directory
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// fsync on every commit
    pub fn strict(mut self) -> Self {
        self.config.durability = DurabilityMode::Strict;
        self
    }

    /// fsync every `batch_size` commits or `interval_ms` milliseconds
    pub fn batched(mut self, interval_ms: u64, batch_size: usize) -> Self {
        self.config.durability = DurabilityMode::Batched {
            interval_ms,
            batch_size,
        };
        self
    }

    /// No WAL; state lives in memory only
    pub fn no_durability(mut self) -> Self {
        self.config.durability = DurabilityMode::None;
        self
    }

    /// Default pessimistic lock wait
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Retry policy of the retrying orchestrator
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// "Expiring soon" horizon in days
    pub fn expiry_warning_days(mut self, days: u32) -> Self {
        self.config.expiry_warning_days = days;
        self
    }

    /// Configuration assembled so far
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the database
    pub fn open(self) -> Result<Database> {
        Database::with_config(self.config)
    }

    /// Open a database with no data directory, whatever path was set
    pub fn open_ephemeral(mut self) -> Result<Database> {
        self.config.data_dir = None;
        self.config.durability = DurabilityMode::None;
        Database::with_config(self.config)
    }
}

/// Path of the WAL for a data directory
pub fn wal_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(WAL_FILE_NAME)
}
