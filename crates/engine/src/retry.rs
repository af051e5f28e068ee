//! Bounded retry around the orchestrator
//!
//! Re-executes a request (with a fresh read each time) while the outcome is
//! a lost optimistic race or a pessimistic lock timeout. Business rejections
//! and store failures are returned on the first attempt.

use crate::config::RetryPolicy;
use crate::database::Database;
use crate::orchestrator::{Orchestrator, Outcome, StockMutation};
use tracing::debug;

/// Orchestrator decorator that retries retryable outcomes
#[derive(Debug, Clone, Copy)]
pub struct RetryingOrchestrator<'db> {
    inner: Orchestrator<'db>,
    policy: RetryPolicy,
}

impl<'db> RetryingOrchestrator<'db> {
    /// Wrap `db` with its configured retry policy
    pub fn new(db: &'db Database) -> Self {
        Self::with_policy(Orchestrator::new(db), db.retry_policy())
    }

    /// Wrap an orchestrator with an explicit policy
    pub fn with_policy(inner: Orchestrator<'db>, policy: RetryPolicy) -> Self {
        RetryingOrchestrator { inner, policy }
    }

    /// Policy in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Execute, retrying up to `max_attempts` executions in total
    pub fn execute(&self, request: &StockMutation) -> Outcome {
        self.execute_counted(request).0
    }

    /// Execute and also report how many attempts were made
    pub fn execute_counted(&self, request: &StockMutation) -> (Outcome, u32) {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = self.inner.execute(request);
            if !outcome.is_retryable() || attempt >= max_attempts {
                return (outcome, attempt);
            }
            debug!(
                batch_id = %request.batch_id,
                attempt,
                outcome = %outcome,
                "retrying stock mutation"
            );
            std::thread::sleep(self.policy.backoff(attempt));
            attempt += 1;
        }
    }
}
