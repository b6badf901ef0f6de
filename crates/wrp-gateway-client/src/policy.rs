//! Timeout and retry policy.

use std::time::Duration;

use crate::deadline::Deadline;
use crate::error::{Result, TransactError};
use crate::retry::RetryPolicy;

/// Immutable timeout/retry settings for outbound transactions.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Per-attempt HTTP client timeout.
    pub client_timeout: Duration,
    /// TCP connect timeout.
    pub dial_timeout: Duration,
    /// Wait budget for the whole attempt sequence.
    pub request_timeout: Duration,
    /// Pause between attempts.
    pub retry_interval: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl TimeoutPolicy {
    /// Check that the policy can drive a transactor.
    ///
    /// # Errors
    ///
    /// Returns an error if any timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.client_timeout.is_zero() {
            return Err(TransactError::InvalidPolicy(
                "client timeout must be greater than zero".to_string(),
            ));
        }
        if self.dial_timeout.is_zero() {
            return Err(TransactError::InvalidPolicy(
                "dial timeout must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(TransactError::InvalidPolicy(
                "request wait timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The retry half of the policy.
    #[must_use]
    pub const fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_interval)
    }

    /// The deadline half of the policy.
    #[must_use]
    pub const fn deadline(&self) -> Deadline {
        Deadline::new(self.request_timeout)
    }

    /// Build an HTTP client honoring the client and dial timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.client_timeout)
            .connect_timeout(self.dial_timeout)
            .build()
            .map_err(|e| TransactError::InvalidPolicy(format!("failed to create HTTP client: {e}")))
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            client_timeout: Duration::from_secs(50),
            dial_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(40),
            retry_interval: Duration::from_secs(2),
            max_retries: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = TimeoutPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.retry().max_attempts(), 3);
        assert_eq!(policy.retry().interval(), Duration::from_secs(2));
        assert_eq!(policy.deadline().budget(), Some(Duration::from_secs(40)));
    }

    #[test]
    fn zero_timeouts_rejected() {
        let policy = TimeoutPolicy {
            request_timeout: Duration::ZERO,
            ..TimeoutPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(TransactError::InvalidPolicy(_))
        ));

        let policy = TimeoutPolicy {
            dial_timeout: Duration::ZERO,
            ..TimeoutPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn builds_client() {
        assert!(TimeoutPolicy::default().build_client().is_ok());
    }
}
