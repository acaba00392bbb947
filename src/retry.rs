use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::constants::{DEFAULT_SNAPSHOT_MAX_ATTEMPTS, DEFAULT_SNAPSHOT_RETRY_DELAY_MS};

/// Fixed-delay retry with a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_SNAPSHOT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_SNAPSHOT_RETRY_DELAY_MS),
        )
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds, `should_retry` rejects the error, or the
    /// attempts run out. `op` receives the 1-based attempt number. The last
    /// error is returned.
    pub async fn retry_async<T, E, F, Fut, P>(&self, mut op: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && should_retry(&e) => {
                    debug!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.max_attempts, e, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        let result = policy
            .retry_async(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(Error::Database("deadlock".into()))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                Error::is_retryable,
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(500));

        let result: Result<(), Error> = policy
            .retry_async(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Error::Database("still broken".into())) }
                },
                Error::is_retryable,
            )
            .await;

        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), Error> = RetryPolicy::default()
            .retry_async(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Error::Connectivity("refused".into())) }
                },
                Error::is_retryable,
            )
            .await;

        assert!(matches!(result, Err(Error::Connectivity(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
