//! Retry with exponential backoff.
//!
//! [`RetryPolicy::run`] wraps an async operation: failures whose kind is in the
//! policy's retryable set are retried after a sleep that grows by
//! `backoff_factor`, every other failure is returned at once. The sleep is a
//! plain `tokio::time::sleep`, so dropping the returned future (for example
//! from a surrounding `tokio::time::timeout`) cancels the wait.

use crate::error::{AlertError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            retryable: vec![ErrorKind::Network, ErrorKind::Api, ErrorKind::Cache],
        }
    }
}

impl RetryPolicy {
    /// Build a policy, clamping to at least one attempt and a non-shrinking backoff.
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_factor: if backoff_factor.is_finite() {
                backoff_factor.max(1.0)
            } else {
                1.0
            },
            ..Self::default()
        }
    }

    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn is_retryable(&self, error: &AlertError) -> bool {
        self.retryable.contains(&error.kind())
    }

    /// Delay before the attempt following attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.initial_delay
            .mul_f64(self.backoff_factor.powi(exponent))
    }

    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, AlertError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AlertError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "✅ Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !self.is_retryable(&error) => {
                    debug!(
                        operation = operation_name,
                        kind = %error.kind(),
                        "Non-retryable failure, giving up"
                    );
                    return Err(error);
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %error,
                        "❌ Retries exhausted"
                    );
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "🔄 Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Free-function form of [`RetryPolicy::run`].
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, AlertError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AlertError>>,
{
    policy.run(operation_name, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds_with_backoff() {
        let policy = RetryPolicy::default();
        let attempts: Mutex<Vec<Instant>> = Mutex::new(Vec::new());
        let start = Instant::now();

        let result = policy
            .run("flaky", || {
                attempts.lock().push(Instant::now());
                let n = attempts.lock().len();
                async move {
                    if n < 3 {
                        Err(AlertError::Network("connection reset".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        let attempts = attempts.lock();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1] - start, Duration::from_secs(1));
        assert_eq!(attempts[2] - attempts[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), _> = policy
            .run("config", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AlertError::Configuration("no accounts".into())) }
            })
            .await;

        assert!(matches!(result, Err(AlertError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_failure() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&policy, "always_down", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(AlertError::api(format!("attempt {n} failed"))) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().message(), "attempt 3 failed");
    }

    #[test]
    fn test_policy_clamps_inputs() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1), 0.5);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff_factor, 1.0);
        assert_eq!(policy.delay_after(3), Duration::from_secs(1));
    }
}
