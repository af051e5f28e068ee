//! Main database entry point for PharmaStock.
//!
//! This module provides the `PharmaStock` struct, the primary entry point for
//! all stock operations.

use crate::error::Result;
use crate::primitives::{Batches, Ledger, Sales};
use pharmastock_engine::{
    Database, DatabaseBuilder, DurabilityMode, RecoveryStats, RetryPolicy, StoreConfig,
    TransactionMetrics,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The PharmaStock database.
///
/// Create one with [`PharmaStock::open`], [`PharmaStock::ephemeral`] or
/// [`PharmaStock::builder`], and pass it to whatever handles requests. It is
/// cheap to share: every handle holds an `Arc` of the same engine.
///
/// # Example
///
/// ```ignore
/// use pharmastock::prelude::*;
///
/// let db = PharmaStock::open("./stock")?;
/// let batch = db.batches.register(intake)?;
/// let ledger_id = db.sales.sell(batch.batch_id, "pharmacist-1", 30, Strategy::Optimistic)?;
/// let recent = db.ledger.recent();
/// db.close()?;
/// ```
pub struct PharmaStock {
    /// The underlying engine database
    pub(crate) inner: Arc<Database>,

    /// Batch intake, updates and inventory
    pub batches: Batches,

    /// Sales and purchases
    pub sales: Sales,

    /// Transaction history and dashboard
    pub ledger: Ledger,
}

impl PharmaStock {
    /// Open a database at the given path.
    ///
    /// Uses default settings (batched durability mode). Committed
    /// transactions already in the directory are recovered.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(path).open()
    }

    /// Create an ephemeral database with no disk I/O.
    ///
    /// All data is lost when the value is dropped. Use it for tests.
    pub fn ephemeral() -> Result<Self> {
        let db = Arc::new(Database::ephemeral()?);
        Ok(Self::from_engine(db))
    }

    /// Open a database from a configuration, e.g. one loaded with
    /// [`StoreConfig::load`].
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        let db = Arc::new(Database::with_config(config)?);
        Ok(Self::from_engine(db))
    }

    /// Create a builder for database configuration.
    pub fn builder() -> PharmaStockBuilder {
        PharmaStockBuilder::new()
    }

    /// Force flush all committed transactions to disk.
    ///
    /// In batched mode commits are fsynced periodically; call `flush()` to
    /// make everything committed so far durable now.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush().map_err(Into::into)
    }

    /// Flush pending writes. The database stays usable.
    pub fn close(&self) -> Result<()> {
        self.inner.close().map_err(Into::into)
    }

    /// Get the data directory, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.data_dir()
    }

    /// Get the current durability mode.
    pub fn durability_mode(&self) -> DurabilityMode {
        self.inner.durability_mode()
    }

    /// Check if nothing is persisted.
    pub fn is_ephemeral(&self) -> bool {
        self.inner.is_ephemeral()
    }

    /// What recovery did when the database was opened.
    pub fn recovery_stats(&self) -> Option<RecoveryStats> {
        self.inner.recovery_stats().cloned()
    }

    /// Get transaction metrics.
    pub fn metrics(&self) -> TransactionMetrics {
        self.inner.metrics()
    }

    /// Access the engine database directly.
    pub fn engine(&self) -> &Database {
        &self.inner
    }

    /// Create PharmaStock from an engine Database.
    fn from_engine(db: Arc<Database>) -> Self {
        Self {
            batches: Batches::new(db.clone()),
            sales: Sales::new(db.clone()),
            ledger: Ledger::new(db.clone()),
            inner: db,
        }
    }
}

impl std::fmt::Debug for PharmaStock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PharmaStock")
            .field("inner", &self.inner)
            .finish()
    }
}

/// Builder for database configuration.
///
/// # Example
///
/// ```ignore
/// // Production: disk-backed, fsync on every commit
/// let db = PharmaStock::builder()
///     .path("./stock")
///     .strict()
///     .open()?;
///
/// // Unit testing: no disk at all
/// let db = PharmaStock::ephemeral()?;
/// ```
pub struct PharmaStockBuilder {
    inner: DatabaseBuilder,
}

impl PharmaStockBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            inner: DatabaseBuilder::new(),
        }
    }

    /// Set the data directory.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.inner = self.inner.path(path);
        self
    }

    /// Use no-durability mode (no WAL is read or written).
    pub fn no_durability(mut self) -> Self {
        self.inner = self.inner.no_durability();
        self
    }

    /// Use batched mode with custom parameters.
    ///
    /// # Arguments
    ///
    /// * `interval_ms` - Maximum time between fsyncs
    /// * `batch_size` - Maximum commits before a forced fsync
    pub fn batched(mut self, interval_ms: u64, batch_size: usize) -> Self {
        self.inner = self.inner.batched(interval_ms, batch_size);
        self
    }

    /// Use strict mode (safest, slowest).
    ///
    /// Syncs to disk on every commit. Zero data loss on crash.
    pub fn strict(mut self) -> Self {
        self.inner = self.inner.strict();
        self
    }

    /// Default wait for pessimistic row locks.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.lock_timeout(timeout);
        self
    }

    /// Retry policy used by [`Sales::execute_with_retry`].
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.inner = self.inner.retry(policy);
        self
    }

    /// Horizon in days for "expiring soon".
    pub fn expiry_warning_days(mut self, days: u32) -> Self {
        self.inner = self.inner.expiry_warning_days(days);
        self
    }

    /// Open the database.
    pub fn open(self) -> Result<PharmaStock> {
        let db = Arc::new(self.inner.open()?);
        Ok(PharmaStock::from_engine(db))
    }

    /// Open an ephemeral database with the configured settings.
    pub fn open_ephemeral(self) -> Result<PharmaStock> {
        let db = Arc::new(self.inner.open_ephemeral()?);
        Ok(PharmaStock::from_engine(db))
    }
}

impl Default for PharmaStockBuilder {
    fn default() -> Self {
        Self::new()
    }
}
