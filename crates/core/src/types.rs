//! Identifier types shared by every layer
//!
//! - [`BatchId`]: key of a stock record; also the global lock order
//! - [`MedicationId`]: reference into the external medication catalog
//! - [`ActorId`]: opaque identity of the user that triggered a mutation
//! - [`LedgerId`]: store-assigned id of a ledger entry
//! - [`TxnId`]: transaction identifier used in WAL framing and lock ownership

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a medication batch
///
/// Assigned by the store at intake and never reused. The derived `Ord` is the
/// single global order in which exclusive row locks must be acquired when a
/// transaction holds more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl BatchId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch:{}", self.0)
    }
}

impl From<u64> for BatchId {
    fn from(id: u64) -> Self {
        BatchId(id)
    }
}

/// Reference to a medication in the external catalog
///
/// Read-only here; the catalog itself lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MedicationId(pub u64);

impl fmt::Display for MedicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "medication:{}", self.0)
    }
}

/// Opaque identifier of the acting user
///
/// Authentication happens upstream; the ledger only records whatever
/// identifier the caller vouches for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Wrap an identifier issued by the authentication layer
    pub fn new(id: impl Into<String>) -> Self {
        ActorId(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        ActorId::new(id)
    }
}

/// Store-assigned identifier of a ledger entry
///
/// Allocated from a sequence when the entry is staged, so ids of rolled-back
/// transactions leave gaps. Ids are unique and increase with allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerId(pub u64);

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ledger:{}", self.0)
    }
}

/// Transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}
