//! Engine layer for the stock database
//!
//! This crate ties the lower layers together:
//! - [`Database`]: scoped store handle, builder, recovery on open
//! - [`Orchestrator`]: sale / purchase as one all-or-nothing transaction
//! - [`RetryingOrchestrator`]: bounded retry of conflicting requests
//! - [`StoreConfig`]: TOML-loadable configuration
//! - Inventory and dashboard reports

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod database;
pub mod orchestrator;
pub mod reports;
pub mod retry;

pub use config::{RetryPolicy, StoreConfig};
pub use database::{Database, DatabaseBuilder, DEFAULT_HISTORY_LIMIT, WAL_FILE_NAME};
pub use orchestrator::{Orchestrator, Outcome, Rejection, StockMutation};
pub use reports::{DashboardSummary, InventoryItem};
pub use retry::RetryingOrchestrator;

// Re-exports for callers that only depend on the engine
pub use pharmastock_concurrency::{Strategy, TransactionMetrics};
pub use pharmastock_durability::{DurabilityMode, RecoveryStats};
