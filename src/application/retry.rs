//! Bounded retry for last-writer-wins updates against versioned records.
//!
//! Each attempt re-reads the record and re-applies the caller's intended field
//! values, so retrying never double-applies anything. Only full replacements are
//! safe here; deltas such as "decrement stock by n" must not go through it.

use std::future::Future;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::error::ServiceError;
use crate::application::repos::RepoError;

pub const DEFAULT_ATTEMPTS: u32 = 3;

const METRIC_RETRY: &str = "pcshop_optimistic_retry_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticRetry {
    attempts: u32,
}

impl Default for OptimisticRetry {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS)
    }
}

impl OptimisticRetry {
    /// `attempts` is the total number of tries, first one included. Zero is treated as one.
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `attempt` until it succeeds, fails with something other than a version
    /// conflict, or the budget is spent. Exhaustion surfaces `ServiceError::Conflict`.
    pub async fn run<T, F, Fut>(&self, entity: &'static str, mut attempt: F) -> Result<T, ServiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        for n in 1..=self.attempts {
            match attempt(n).await {
                Err(ServiceError::Repo(RepoError::VersionConflict { expected })) => {
                    counter!(METRIC_RETRY, "entity" => entity).increment(1);
                    debug!(
                        target = "pcshop::retry",
                        entity,
                        attempt = n,
                        expected_version = expected,
                        "version conflict; retrying"
                    );
                }
                other => return other,
            }
        }

        warn!(
            target = "pcshop::retry",
            entity,
            attempts = self.attempts,
            "retry budget exhausted"
        );
        Err(ServiceError::conflict(format!(
            "{entity} was modified by another user; {} attempts failed, reload and try again",
            self.attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn conflict() -> ServiceError {
        ServiceError::Repo(RepoError::VersionConflict { expected: 0 })
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflicts() {
        let calls = AtomicU32::new(0);
        let result = OptimisticRetry::new(3)
            .run("component", |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 3 { Err(conflict()) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.expect("third attempt wins"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_is_a_conflict() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = OptimisticRetry::new(3)
            .run("component", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(conflict()) }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = OptimisticRetry::default()
            .run("component", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ServiceError::validation("price must be greater than zero")) }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Validation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
