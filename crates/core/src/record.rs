//! Stock records
//!
//! A [`StockRecord`] is the authoritative remaining quantity of one batch,
//! fenced by a version counter. Only the strategy-guarded write path changes
//! `quantity_current` and `version`; descriptive fields change through
//! [`BatchDetails`] updates, which never touch the counter pair.

use crate::error::{Error, Result};
use crate::types::{BatchId, MedicationId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Remaining stock of one medication batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// Store-assigned key, immutable
    pub batch_id: BatchId,
    /// Catalog reference, read-only here
    pub medication_id: MedicationId,
    /// Quantity received at intake; never mutated
    pub quantity_initial: u64,
    /// Remaining quantity; unsigned so it cannot go negative
    pub quantity_current: u64,
    /// Price per unit, read when computing ledger totals
    pub unit_price: Decimal,
    /// Supplier lot number
    pub lot_number: String,
    /// Manufacture date
    pub manufacture_date: NaiveDate,
    /// Expiry date
    pub expiry_date: NaiveDate,
    /// Supplier name
    pub supplier: String,
    /// Number of accepted quantity mutations so far
    pub version: u64,
}

impl StockRecord {
    /// Materialize a freshly received batch: `quantity_current` equals the
    /// received quantity and `version` starts at 0.
    pub fn from_intake(batch_id: BatchId, intake: NewBatch) -> Self {
        StockRecord {
            batch_id,
            medication_id: intake.medication_id,
            quantity_initial: intake.quantity,
            quantity_current: intake.quantity,
            unit_price: intake.unit_price,
            lot_number: intake.lot_number,
            manufacture_date: intake.manufacture_date,
            expiry_date: intake.expiry_date,
            supplier: intake.supplier,
            version: 0,
        }
    }

    /// Apply an accepted quantity mutation.
    ///
    /// Fails with `ConcurrencyConflict` unless `expected_version` is the
    /// current version; on success the version advances by exactly one.
    pub fn apply_quantity(&mut self, quantity: u64, expected_version: u64) -> Result<()> {
        if self.version != expected_version {
            return Err(Error::ConcurrencyConflict {
                batch_id: self.batch_id,
                expected: expected_version,
                actual: self.version,
            });
        }
        let next = self.version.checked_add(1).ok_or(Error::Overflow {
            what: "record version",
        })?;
        self.quantity_current = quantity;
        self.version = next;
        Ok(())
    }

    /// Overwrite the descriptive fields; quantity and version are untouched
    pub fn apply_details(&mut self, details: &BatchDetails) {
        self.lot_number = details.lot_number.clone();
        self.unit_price = details.unit_price;
        self.manufacture_date = details.manufacture_date;
        self.expiry_date = details.expiry_date;
        self.supplier = details.supplier.clone();
    }

    /// Expiry status relative to `today` with a warning horizon in days
    pub fn expiry_status(&self, today: NaiveDate, warning_days: u32) -> ExpiryStatus {
        ExpiryStatus::classify(self.expiry_date, today, warning_days)
    }
}

/// Input of the administrative intake operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    /// Catalog reference
    pub medication_id: MedicationId,
    /// Supplier lot number
    pub lot_number: String,
    /// Quantity received
    pub quantity: u64,
    /// Price per unit
    pub unit_price: Decimal,
    /// Manufacture date
    pub manufacture_date: NaiveDate,
    /// Expiry date
    pub expiry_date: NaiveDate,
    /// Supplier name
    pub supplier: String,
}

impl NewBatch {
    /// Reject batches the store must never hold
    pub fn validate(&self) -> Result<()> {
        validate_descriptive(self.unit_price, self.manufacture_date, self.expiry_date)
    }

    /// Descriptive part of the intake
    pub fn details(&self) -> BatchDetails {
        BatchDetails {
            lot_number: self.lot_number.clone(),
            unit_price: self.unit_price,
            manufacture_date: self.manufacture_date,
            expiry_date: self.expiry_date,
            supplier: self.supplier.clone(),
        }
    }
}

/// Descriptive fields editable through the administrative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDetails {
    /// Supplier lot number
    pub lot_number: String,
    /// Price per unit; later changes never alter historical ledger totals
    pub unit_price: Decimal,
    /// Manufacture date
    pub manufacture_date: NaiveDate,
    /// Expiry date
    pub expiry_date: NaiveDate,
    /// Supplier name
    pub supplier: String,
}

impl BatchDetails {
    /// Reject details the store must never hold
    pub fn validate(&self) -> Result<()> {
        validate_descriptive(self.unit_price, self.manufacture_date, self.expiry_date)
    }
}

fn validate_descriptive(price: Decimal, made: NaiveDate, expires: NaiveDate) -> Result<()> {
    if price.is_sign_negative() {
        return Err(Error::InvalidBatch(format!("negative unit price {}", price)));
    }
    if expires < made {
        return Err(Error::InvalidBatch(format!(
            "expiry {} precedes manufacture {}",
            expires, made
        )));
    }
    Ok(())
}

/// Shelf-life classification used by inventory reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpiryStatus {
    /// Past its expiry date
    Expired,
    /// Expires within the warning horizon
    ExpiringSoon,
    /// Beyond the warning horizon
    Valid,
}

impl ExpiryStatus {
    /// Classify an expiry date
    pub fn classify(expiry: NaiveDate, today: NaiveDate, warning_days: u32) -> Self {
        if expiry < today {
            ExpiryStatus::Expired
        } else if (expiry - today).num_days() <= i64::from(warning_days) {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn intake() -> NewBatch {
        NewBatch {
            medication_id: MedicationId(1),
            lot_number: "L-001".into(),
            quantity: 100,
            unit_price: Decimal::new(250, 2),
            manufacture_date: date(2025, 1, 1),
            expiry_date: date(2027, 1, 1),
            supplier: "Acme Pharma".into(),
        }
    }

    #[test]
    fn test_intake_starts_full_at_version_zero() {
        let record = StockRecord::from_intake(BatchId(1), intake());
        assert_eq!(record.quantity_initial, 100);
        assert_eq!(record.quantity_current, 100);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_apply_quantity_advances_version_by_one() {
        let mut record = StockRecord::from_intake(BatchId(1), intake());
        record.apply_quantity(70, 0).unwrap();
        assert_eq!(record.quantity_current, 70);
        assert_eq!(record.version, 1);
        assert_eq!(record.quantity_initial, 100);
    }

    #[test]
    fn test_apply_quantity_rejects_stale_version() {
        let mut record = StockRecord::from_intake(BatchId(1), intake());
        record.apply_quantity(70, 0).unwrap();

        let err = record.apply_quantity(40, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::ConcurrencyConflict { expected: 0, actual: 1, .. }
        ));
        assert_eq!(record.quantity_current, 70);
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_apply_details_keeps_counter_pair() {
        let mut record = StockRecord::from_intake(BatchId(1), intake());
        record.apply_quantity(90, 0).unwrap();

        let mut details = intake().details();
        details.unit_price = Decimal::new(300, 2);
        details.supplier = "Other".into();
        record.apply_details(&details);

        assert_eq!(record.unit_price, Decimal::new(300, 2));
        assert_eq!(record.supplier, "Other");
        assert_eq!(record.quantity_current, 90);
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_validate_rejects_negative_price_and_inverted_dates() {
        let mut bad_price = intake();
        bad_price.unit_price = Decimal::new(-1, 0);
        assert!(matches!(bad_price.validate(), Err(Error::InvalidBatch(_))));

        let mut bad_dates = intake();
        bad_dates.expiry_date = date(2024, 1, 1);
        assert!(matches!(bad_dates.validate(), Err(Error::InvalidBatch(_))));

        assert!(intake().validate().is_ok());
    }

    #[test]
    fn test_expiry_classification() {
        let today = date(2026, 6, 1);
        assert_eq!(
            ExpiryStatus::classify(date(2026, 5, 31), today, 90),
            ExpiryStatus::Expired
        );
        assert_eq!(
            ExpiryStatus::classify(today, today, 90),
            ExpiryStatus::ExpiringSoon
        );
        assert_eq!(
            ExpiryStatus::classify(date(2026, 8, 30), today, 90),
            ExpiryStatus::ExpiringSoon
        );
        assert_eq!(
            ExpiryStatus::classify(date(2026, 12, 1), today, 90),
            ExpiryStatus::Valid
        );
    }
}
