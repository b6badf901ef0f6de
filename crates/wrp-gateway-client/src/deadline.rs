//! Hard deadline over a whole operation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline elapsed; the inner future was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// An upper bound on how long an operation may run.
///
/// When the budget elapses the bounded future is dropped, which cancels
/// whatever it was awaiting (an in-flight attempt or a retry sleep).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    budget: Option<Duration>,
}

impl Deadline {
    /// A deadline of `budget` from the moment [`Deadline::bound`] is awaited.
    #[must_use]
    pub const fn new(budget: Duration) -> Self {
        Self {
            budget: Some(budget),
        }
    }

    /// No deadline.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { budget: None }
    }

    /// The configured budget, if any.
    #[must_use]
    pub const fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Run `fut` to completion or until the budget elapses.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineExceeded`] if the budget elapsed first.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        match self.budget {
            Some(budget) => tokio::time::timeout(budget, fut)
                .await
                .map_err(|_| DeadlineExceeded(budget)),
            None => Ok(fut.await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_future_completes() {
        let result = Deadline::new(Duration::from_secs(1))
            .bound(async { 7 })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_future_is_cut_off_at_budget() {
        let start = tokio::time::Instant::now();
        let result = Deadline::new(Duration::from_secs(5))
            .bound(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(result, Err(DeadlineExceeded(Duration::from_secs(5))));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_waits() {
        let result = Deadline::unbounded()
            .bound(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                "done"
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(Deadline::unbounded().budget(), None);
    }
}
