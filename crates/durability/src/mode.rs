//! Durability mode for WAL writes.
//!
//! Controls when committed transactions are fsynced to disk.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Durability mode for WAL writes.
///
/// | Mode | fsync | Data loss window on crash |
/// |------|-------|---------------------------|
/// | None | never (no WAL) | everything |
/// | Batched | every N commits or T ms | up to N commits / T ms |
/// | Strict | every commit | none |
///
/// Deserializes from configuration as a tagged table:
///
/// ```toml
/// [durability]
/// mode = "batched"
/// interval_ms = 100
/// batch_size = 1000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DurabilityMode {
    /// No WAL at all; state lives only in memory.
    None,

    /// fsync after every commit. Use for audit-critical deployments.
    Strict,

    /// fsync every `batch_size` commits OR every `interval_ms` milliseconds.
    ///
    /// The interval is also enforced while idle by
    /// [`BackgroundSync`](crate::BackgroundSync).
    Batched {
        /// Maximum time between fsyncs in milliseconds
        interval_ms: u64,
        /// Maximum commits between fsyncs
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Whether this mode writes a WAL.
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::None)
    }

    /// Whether every commit is fsynced before returning.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }

    /// Whether a WAL that has seen `unsynced` commits, the oldest `elapsed`
    /// ago, is due for an fsync.
    pub fn sync_due(&self, unsynced: usize, elapsed: Duration) -> bool {
        match self {
            DurabilityMode::None => false,
            DurabilityMode::Strict => unsynced > 0,
            DurabilityMode::Batched {
                interval_ms,
                batch_size,
            } => {
                unsynced > 0
                    && (unsynced >= *batch_size || elapsed >= Duration::from_millis(*interval_ms))
            }
        }
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::None => "No durability (memory only)",
            DurabilityMode::Strict => "fsync on every commit",
            DurabilityMode::Batched { .. } => "Batched fsync",
        }
    }

    /// `Batched { interval_ms: 100, batch_size: 1000 }`
    pub fn buffered_default() -> Self {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::buffered_default()
    }
}
