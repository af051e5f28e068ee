//! Store configuration
//!
//! Loaded from TOML or assembled through [`crate::DatabaseBuilder`]:
//!
//! ```toml
//! data_dir = "/var/lib/pharmastock"
//! lock_timeout_ms = 5000
//! expiry_warning_days = 90
//!
//! [durability]
//! mode = "strict"
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 5
//! ```
//!
//! Every field is optional; a missing `data_dir` means an ephemeral store
//! with no disk I/O.

use pharmastock_core::{Error, Result};
use pharmastock_durability::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default pessimistic lock wait
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default horizon for "expiring soon"
pub const DEFAULT_EXPIRY_WARNING_DAYS: u32 = 90;

/// Bounded retry of conflicting mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total executions including the first one
    pub max_attempts: u32,
    /// Sleep before retry `n` is `backoff_ms * n`
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Sleep before the retry that follows attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 5,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the WAL; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    /// When commits are fsynced
    pub durability: DurabilityMode,
    /// Default pessimistic lock wait in milliseconds
    pub lock_timeout_ms: u64,
    /// Retry policy of [`crate::RetryingOrchestrator`]
    pub retry: RetryPolicy,
    /// Batches expiring within this many days count as "expiring soon"
    pub expiry_warning_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: None,
            durability: DurabilityMode::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            expiry_warning_days: DEFAULT_EXPIRY_WARNING_DAYS,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration with default settings
    pub fn ephemeral() -> Self {
        StoreConfig {
            durability: DurabilityMode::None,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(raw)
            .map_err(|e| Error::InvalidConfig(format!("parse failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if let DurabilityMode::Batched { batch_size: 0, .. } = self.durability {
            return Err(Error::InvalidConfig(
                "durability.batch_size must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Default pessimistic lock wait
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Whether this configuration writes a WAL
    pub fn is_durable(&self) -> bool {
        self.data_dir.is_some() && self.durability.requires_wal()
    }
}
