// Retry Executor - bounded retries with exponential backoff

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::application::constants::{
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
};

/// How the caller's classifier judges an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network/IO class failures worth retrying
    Transient,
    /// Not-found, malformed input: retrying cannot help
    Permanent,
}

/// Terminal outcome of a retried operation
#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("Permanent error, not retried: {source}")]
    Permanent {
        #[source]
        source: E,
    },
}

/// Backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (counted from 1):
    /// `min(base_delay * 2^(attempt-1), max_delay)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Wraps a fallible operation with bounded retries.
///
/// Only errors the caller's classifier marks [`ErrorClass::Transient`] are
/// retried; a permanent error returns immediately. After `max_attempts` the
/// last error is surfaced as [`RetryError::Exhausted`] with its cause intact.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, E, F, Fut, C>(&self, classify: C, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match classify(&e) {
                    ErrorClass::Permanent => {
                        warn!(attempt = %attempt, error = %e, "Permanent error, not retrying");
                        return Err(RetryError::Permanent { source: e });
                    }
                    ErrorClass::Transient => {
                        if attempt >= max_attempts {
                            warn!(
                                attempts = %attempt,
                                max_attempts = %max_attempts,
                                error = %e,
                                "Max retry attempts reached"
                            );
                            return Err(RetryError::Exhausted {
                                attempts: attempt,
                                source: e,
                            });
                        }

                        let delay = self.jittered_delay(attempt);
                        info!(
                            attempt = %attempt,
                            delay_ms = %delay.as_millis(),
                            error = %e,
                            "Scheduling retry"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    /// Backoff with ±10% jitter so parallel workers retrying the same
    /// throttled provider don't herd. Capped at `max_delay`.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.policy.backoff_delay(attempt);
        let factor = rand::thread_rng().gen_range(0.9..=1.1);
        base.mul_f64(factor).min(self.policy.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum TestError {
        #[error("connection reset")]
        ConnectionReset,
        #[error("item not found")]
        NotFound,
    }

    fn classify(e: &TestError) -> ErrorClass {
        match e {
            TestError::ConnectionReset => ErrorClass::Transient,
            TestError::NotFound => ErrorClass::Permanent,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_transient_error_invokes_exactly_max_attempts() {
        let executor = RetryExecutor::new(fast_policy(3));
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_op = Arc::clone(&calls);
        let result: Result<(), _> = executor
            .execute(classify, move || {
                let calls = Arc::clone(&calls_in_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::ConnectionReset)
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(RetryError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, TestError::ConnectionReset));
            }
            other => panic!("expected Exhausted, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_permanent_error_never_retried() {
        let executor = RetryExecutor::new(fast_policy(5));
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_op = Arc::clone(&calls);
        let result: Result<(), _> = executor
            .execute(classify, move || {
                let calls = Arc::clone(&calls_in_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::NotFound)
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Permanent { .. })));
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let executor = RetryExecutor::new(fast_policy(5));
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_op = Arc::clone(&calls);
        let result = executor
            .execute(classify, move || {
                let calls = Arc::clone(&calls_in_op);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError::ConnectionReset)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_sequence_doubles_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(5), Duration::from_millis(500));
    }
}
