//! Inventory and dashboard reports
//!
//! Read-only views over committed state. Each report reads the tables
//! once, so it never mixes two versions of the same batch.

use chrono::NaiveDate;
use pharmastock_core::{ExpiryStatus, LedgerKind, StockRecord};
use pharmastock_storage::StockStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One inventory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Batch state
    pub record: StockRecord,
    /// Expiry classification as of the report date
    pub expiry_status: ExpiryStatus,
}

/// Dashboard counters for one day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Sales committed on the report date
    pub sales_today: u64,
    /// Purchases committed on the report date
    pub purchases_today: u64,
    /// Sum of the totals of today's sales
    pub revenue_today: Decimal,
    /// Batches with stock left
    pub active_batches: u64,
    /// Batches with stock left that are expired or expire within the warning
    /// horizon
    pub batches_expiring_soon: u64,
    /// All batches
    pub total_batches: u64,
}

/// Every batch with its expiry status, ordered by medication then expiry
pub fn inventory(store: &StockStore, today: NaiveDate, warning_days: u32) -> Vec<InventoryItem> {
    let mut items: Vec<InventoryItem> = store
        .records()
        .into_iter()
        .map(|record| InventoryItem {
            expiry_status: record.expiry_status(today, warning_days),
            record,
        })
        .collect();
    items.sort_by(|a, b| {
        (a.record.medication_id, a.record.expiry_date, a.record.batch_id).cmp(&(
            b.record.medication_id,
            b.record.expiry_date,
            b.record.batch_id,
        ))
    });
    items
}

/// Dashboard counters as of `today` (UTC dates of commit timestamps)
pub fn summary(store: &StockStore, today: NaiveDate, warning_days: u32) -> DashboardSummary {
    let mut summary = DashboardSummary::default();

    for record in store.records() {
        summary.total_batches += 1;
        if record.quantity_current == 0 {
            continue;
        }
        summary.active_batches += 1;
        if record.expiry_status(today, warning_days) != ExpiryStatus::Valid {
            summary.batches_expiring_soon += 1;
        }
    }

    for entry in store.ledger_entries() {
        if entry.timestamp.date_naive() != today {
            continue;
        }
        match entry.kind {
            LedgerKind::Sale => {
                summary.sales_today += 1;
                summary.revenue_today += entry.total_amount;
            }
            LedgerKind::Purchase => summary.purchases_today += 1,
        }
    }

    summary
}
