//! Retry logic for requests sent to the object storage API.

use std::time::Duration;

use crate::Result;

/// Tracing target for retry decisions.
pub const TRACING_TARGET: &str = "liara_storage::retry";

/// Bounded exponential backoff applied to every replayable request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means a single attempt)
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            ..Self::default()
        }
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Set the maximum backoff duration.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the backoff duration before retry number `attempt` (zero-based).
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let backoff_millis = (self.initial_backoff.as_millis() as f64)
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_millis as u64);
        backoff.min(self.max_backoff)
    }

    /// Run an async operation, retrying it while it fails with a retryable error.
    ///
    /// Non-retryable errors are returned after the first failure. Once the
    /// attempts are exhausted the last error is returned unchanged.
    pub async fn retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::debug!(
                    target: TRACING_TARGET,
                    error = %err,
                    "Non-retryable error, failing immediately"
                );
                return Err(err);
            }

            if attempt >= self.max_retries {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %err,
                    attempts = attempt + 1,
                    "Retry attempts exhausted"
                );
                return Err(err);
            }

            let backoff = self.backoff(attempt);
            attempt += 1;
            tracing::warn!(
                target: TRACING_TARGET,
                error = %err,
                attempt,
                max_retries = self.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying request after backoff"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::Error;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn test_max_backoff() {
        let policy = RetryPolicy::default().with_max_backoff(Duration::from_millis(300));
        assert_eq!(policy.backoff(2), Duration::from_millis(300));
    }

    #[test]
    fn test_builder_methods() {
        let policy = RetryPolicy::new(5, Duration::from_millis(50))
            .with_max_backoff(Duration::from_secs(1))
            .with_multiplier(3.0);

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
        assert_eq!(policy.max_backoff, Duration::from_secs(1));
        assert_eq!(policy.backoff_multiplier, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_retries() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .retry(|| {
                let calls = calls.clone();
                async move {
                    let current = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if current < 3 {
                        Err(Error::server(503, "unavailable"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = policy
            .retry(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::transport("connection reset"))
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = policy
            .retry(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::rejected(400, "bad request"))
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Rejected { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
