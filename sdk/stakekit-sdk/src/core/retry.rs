//! Retry policy shared by every network call the SDK makes.

use crate::core::connection::{ConnectionError, ConnectionResult};
use crate::core::constants::*;
use crate::error::{Result, StakeSdkError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with exponential backoff. Only transient failures are retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry as i32);
        let delay_ms = (self.initial_delay_ms as f64 * factor) as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Runs network operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryScheduler {
    policy: RetryPolicy,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `f` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Exhausted transient failures surface as [`StakeSdkError::TransientNetwork`];
    /// terminal failures are converted immediately.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ConnectionResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match f().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_transient() {
                debug!(operation, attempt, error = %error, "terminal RPC failure");
                return Err(error.into());
            }
            if attempt >= max_attempts {
                warn!(operation, attempts = attempt, error = %error, "retries exhausted");
                return Err(StakeSdkError::TransientNetwork {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.policy.delay_for_retry(attempt - 1);
            warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient RPC failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 300,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(300));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(600));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_after_backoff() {
        let scheduler = RetryScheduler::default();
        let calls = AtomicUsize::new(0);
        let started = Instant::now();

        let value = scheduler
            .run("get_token_balance", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ConnectionError::RateLimited)
                    } else {
                        Ok(42u64)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let scheduler = RetryScheduler::new(RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        });
        let calls = AtomicUsize::new(0);

        let err = scheduler
            .run("get_account", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ConnectionError::Timeout) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err,
            StakeSdkError::TransientNetwork { attempts: 3, .. }
        ));
        assert!(err.is_retry_safe());
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let scheduler = RetryScheduler::default();
        let calls = AtomicUsize::new(0);

        let err = scheduler
            .run("send_transaction", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ConnectionError::InvalidRequest("bad".into())) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, StakeSdkError::Rpc(_)));
    }
}
