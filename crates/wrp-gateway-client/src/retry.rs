//! Fixed-interval retry policy.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Errors that know whether the operation that produced them may be retried.
pub trait Retryable {
    /// Returns `true` if a further attempt may succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Result of the final attempt.
    pub result: Result<T, E>,
    /// Number of attempts made, including the first.
    pub attempts: u32,
}

/// Retry a failing operation up to `max_retries` times, `interval` apart.
///
/// Attempts are strictly sequential. Only errors reporting
/// [`Retryable::is_retryable`] are retried; anything else returns at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total attempts allowed, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. After exhaustion the last
    /// error is returned.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        error = %err,
                        retry_in = ?self.interval,
                        "Retrying after transient failure"
                    );
                    if !self.interval.is_zero() {
                        tokio::time::sleep(self.interval).await;
                    }
                    attempt += 1;
                }
                result => {
                    return RetryOutcome {
                        result,
                        attempts: attempt,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient(n: u32) -> TransportError {
        TransportError::Connect(format!("attempt {n}"))
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let outcome = RetryPolicy::new(3, Duration::ZERO)
            .run(|_| async { Ok::<_, TransportError>("ok") })
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn n_failures_then_success_takes_n_plus_one_attempts() {
        for max_retries in 0..5 {
            let outcome = RetryPolicy::new(max_retries, Duration::ZERO)
                .run(|attempt| async move {
                    if attempt <= max_retries {
                        Err(transient(attempt))
                    } else {
                        Ok(attempt)
                    }
                })
                .await;
            assert_eq!(outcome.attempts, max_retries + 1);
            assert_eq!(outcome.result.unwrap(), max_retries + 1);
        }
    }

    #[tokio::test]
    async fn always_failing_returns_last_error_after_n_plus_one_attempts() {
        for max_retries in 0..5 {
            let outcome = RetryPolicy::new(max_retries, Duration::ZERO)
                .run(|attempt| async move { Err::<(), _>(transient(attempt)) })
                .await;
            assert_eq!(outcome.attempts, max_retries + 1);
            assert_eq!(outcome.result.unwrap_err(), transient(max_retries + 1));
        }
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let outcome = RetryPolicy::new(5, Duration::ZERO)
            .run(|_| async { Err::<(), _>(TransportError::Body("eof".into())) })
            .await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_interval_between_attempts() {
        let start = tokio::time::Instant::now();
        let outcome = RetryPolicy::new(2, Duration::from_secs(2))
            .run(|attempt| async move { Err::<(), _>(transient(attempt)) })
            .await;
        assert_eq!(outcome.attempts, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[test]
    fn max_attempts_saturates() {
        assert_eq!(RetryPolicy::new(u32::MAX, Duration::ZERO).max_attempts(), u32::MAX);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }
}
