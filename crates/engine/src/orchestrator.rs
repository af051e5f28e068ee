//! Sale / purchase orchestration
//!
//! Composes a [`Strategy`], the stock record and the ledger into one
//! all-or-nothing transaction:
//!
//! 1. Read the record (unlocked for optimistic, under the row lock for
//!    pessimistic)
//! 2. Compute the new quantity; a sale below zero is rejected before any
//!    write is attempted
//! 3. Stage the guarded write through the strategy
//! 4. Stage the ledger entry, total priced from the step 1 read
//! 5. Commit
//!
//! Any failure aborts the transaction, so neither the quantity write nor the
//! ledger entry becomes visible without the other.
//!
//! The orchestrator never retries; see [`crate::RetryingOrchestrator`].

use crate::database::Database;
use pharmastock_concurrency::{attempt_mutation, with_exclusive_lock, Strategy, TransactionContext};
use pharmastock_core::{ActorId, BatchId, Error, LedgerId, LedgerKind, Result};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Inbound sale or purchase request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMutation {
    /// Target batch
    pub batch_id: BatchId,
    /// Authenticated user the ledger entry is attributed to
    pub actor_id: ActorId,
    /// Sale or purchase
    pub kind: LedgerKind,
    /// Magnitude of the change; must be positive
    pub quantity: u64,
    /// Concurrency-control strategy for this request
    pub strategy: Strategy,
    /// Pessimistic lock wait; the database default when `None`
    pub lock_timeout: Option<Duration>,
}

impl StockMutation {
    /// Request with the default (optimistic) strategy
    pub fn new(batch_id: BatchId, actor_id: ActorId, kind: LedgerKind, quantity: u64) -> Self {
        StockMutation {
            batch_id,
            actor_id,
            kind,
            quantity,
            strategy: Strategy::default(),
            lock_timeout: None,
        }
    }

    /// Sale request
    pub fn sale(batch_id: BatchId, actor_id: impl Into<ActorId>, quantity: u64) -> Self {
        Self::new(batch_id, actor_id.into(), LedgerKind::Sale, quantity)
    }

    /// Purchase request
    pub fn purchase(batch_id: BatchId, actor_id: impl Into<ActorId>, quantity: u64) -> Self {
        Self::new(batch_id, actor_id.into(), LedgerKind::Purchase, quantity)
    }

    /// Choose the strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override the pessimistic lock wait
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

/// Business-rule reason a request was turned down; nothing was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A sale asked for more than the batch holds
    InsufficientStock {
        /// Quantity asked for
        requested: u64,
        /// Quantity on hand when the request was evaluated
        available: u64,
    },
    /// An optimistic write lost the race for the version it read
    ConcurrencyConflict {
        /// Version the request read
        expected_version: u64,
        /// Version found when the write lost; equal to `expected_version`
        /// when another transaction held the row instead
        actual_version: u64,
    },
    /// `quantity` was zero
    InvalidQuantity,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "insufficient stock: requested {}, available {}",
                requested, available
            ),
            Rejection::ConcurrencyConflict { .. } => f.write_str("concurrency conflict, retry"),
            Rejection::InvalidQuantity => f.write_str("quantity must be positive"),
        }
    }
}

/// Result of executing a [`StockMutation`]
#[derive(Debug)]
pub enum Outcome {
    /// Committed; the ledger entry has this id
    Accepted(LedgerId),
    /// Turned down by a business rule; nothing was written
    Rejected(Rejection),
    /// The store or the lock failed; nothing was written
    Failed(Error),
}

impl Outcome {
    /// Whether the mutation committed
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    /// Ledger id of an accepted mutation
    pub fn ledger_id(&self) -> Option<LedgerId> {
        match self {
            Outcome::Accepted(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether resubmitting with a fresh read may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Outcome::Rejected(Rejection::ConcurrencyConflict { .. }) => true,
            Outcome::Failed(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Human-readable status line
    pub fn message(&self) -> String {
        match self {
            Outcome::Accepted(id) => format!("accepted ({})", id),
            Outcome::Rejected(reason) => format!("rejected: {}", reason),
            Outcome::Failed(Error::LockTimeout { .. }) => "failed: lock timeout".to_string(),
            Outcome::Failed(e) => format!("failed: {}", e),
        }
    }

    /// Convert into a `Result`, mapping rejections onto the error taxonomy
    pub fn into_result(self, batch_id: BatchId) -> Result<LedgerId> {
        match self {
            Outcome::Accepted(id) => Ok(id),
            Outcome::Rejected(Rejection::InsufficientStock {
                requested,
                available,
            }) => Err(Error::InsufficientStock {
                batch_id,
                requested,
                available,
            }),
            Outcome::Rejected(Rejection::ConcurrencyConflict {
                expected_version,
                actual_version,
            }) => Err(Error::ConcurrencyConflict {
                batch_id,
                expected: expected_version,
                actual: actual_version,
            }),
            Outcome::Rejected(Rejection::InvalidQuantity) => Err(Error::InvalidQuantity(
                "quantity must be positive".into(),
            )),
            Outcome::Failed(e) => Err(e),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Executes sale and purchase requests against a [`Database`]
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator<'db> {
    db: &'db Database,
}

impl<'db> Orchestrator<'db> {
    /// Orchestrator over `db`
    pub fn new(db: &'db Database) -> Self {
        Orchestrator { db }
    }

    /// Database this orchestrator writes to
    pub fn database(&self) -> &'db Database {
        self.db
    }

    /// Execute one request in its own transaction.
    ///
    /// Returns `Accepted` only after the quantity write and the ledger entry
    /// committed together.
    pub fn execute(&self, request: &StockMutation) -> Outcome {
        if request.quantity == 0 {
            return Outcome::Rejected(Rejection::InvalidQuantity);
        }

        let mut txn = self.db.begin();
        let staged = match request.strategy {
            Strategy::Optimistic => self.stage_optimistic(&mut txn, request),
            Strategy::Pessimistic => self.stage_pessimistic(&mut txn, request),
        };

        match staged {
            Ok(Ok(ledger_id)) => match self.db.commit(&mut txn) {
                Ok(info) => {
                    debug!(
                        batch_id = %request.batch_id,
                        ledger_id = %ledger_id,
                        txn_id = %info.txn_id,
                        kind = %request.kind,
                        strategy = %request.strategy,
                        quantity = request.quantity,
                        "stock mutation accepted"
                    );
                    Outcome::Accepted(ledger_id)
                }
                Err(Error::ConcurrencyConflict {
                    expected, actual, ..
                }) => Outcome::Rejected(Rejection::ConcurrencyConflict {
                    expected_version: expected,
                    actual_version: actual,
                }),
                Err(e) => Outcome::Failed(e),
            },
            Ok(Err(rejection)) => {
                self.db.abort(&mut txn, rejection.to_string());
                Outcome::Rejected(rejection)
            }
            Err(e) => {
                if let Error::LockTimeout { waited_ms, .. } = &e {
                    warn!(batch_id = %request.batch_id, waited_ms, "lock timeout");
                    self.db.manager().record_lock_timeout();
                }
                self.db.abort(&mut txn, e.to_string());
                Outcome::Failed(e)
            }
        }
    }

    fn stage_optimistic(
        &self,
        txn: &mut TransactionContext<'_>,
        request: &StockMutation,
    ) -> Result<std::result::Result<LedgerId, Rejection>> {
        let record = txn.read(request.batch_id)?;
        let new_quantity = match next_quantity(request, record.quantity_current)? {
            Ok(quantity) => quantity,
            Err(rejection) => return Ok(Err(rejection)),
        };

        if !attempt_mutation(txn, request.batch_id, new_quantity, record.version)? {
            warn!(
                batch_id = %request.batch_id,
                version = record.version,
                "optimistic write lost the race"
            );
            self.db.manager().record_conflict();
            return Ok(Err(self.lost_race(request.batch_id, record.version)));
        }

        let ledger_id = txn.stage_ledger(
            request.kind,
            request.batch_id,
            request.actor_id.clone(),
            request.quantity,
            record.unit_price,
        )?;
        Ok(Ok(ledger_id))
    }

    /// Conflict rejection carrying the version the batch is at now
    fn lost_race(&self, batch_id: BatchId, expected_version: u64) -> Rejection {
        let actual_version = self
            .db
            .store()
            .get(&batch_id)
            .map_or(expected_version, |record| record.version);
        Rejection::ConcurrencyConflict {
            expected_version,
            actual_version,
        }
    }

    fn stage_pessimistic(
        &self,
        txn: &mut TransactionContext<'_>,
        request: &StockMutation,
    ) -> Result<std::result::Result<LedgerId, Rejection>> {
        let timeout = request.lock_timeout.unwrap_or_else(|| self.db.lock_timeout());
        let handle = with_exclusive_lock(txn, request.batch_id, timeout)?;
        let unit_price = handle.unit_price();

        let new_quantity = match next_quantity(request, handle.quantity_current())? {
            Ok(quantity) => quantity,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let txn = handle.write(new_quantity)?;
        let ledger_id = txn.stage_ledger(
            request.kind,
            request.batch_id,
            request.actor_id.clone(),
            request.quantity,
            unit_price,
        )?;
        Ok(Ok(ledger_id))
    }
}

/// Quantity after the request, or the rejection that prevents it
fn next_quantity(
    request: &StockMutation,
    current: u64,
) -> Result<std::result::Result<u64, Rejection>> {
    match request.kind.apply(request.batch_id, current, request.quantity) {
        Ok(quantity) => Ok(Ok(quantity)),
        Err(Error::InsufficientStock {
            requested,
            available,
            ..
        }) => Ok(Err(Rejection::InsufficientStock {
            requested,
            available,
        })),
        Err(e) => Err(e),
    }
}
