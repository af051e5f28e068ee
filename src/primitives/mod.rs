//! Handles for the unified API.
//!
//! Each handle shares the same engine database:
//!
//! 1. [`Batches`] - intake, administrative updates, inventory
//! 2. [`Sales`] - guarded sales and purchases
//! 3. [`Ledger`] - transaction history and dashboard counters

mod batches;
mod ledger;
mod sales;

pub use batches::Batches;
pub use ledger::Ledger;
pub use sales::Sales;
