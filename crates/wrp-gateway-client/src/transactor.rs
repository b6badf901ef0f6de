//! The retrying transactor.

use std::sync::Arc;

use wrp_gateway_core::MetricsSink;

use crate::deadline::{Deadline, DeadlineExceeded};
use crate::error::{Result, TransactError, TransportError};
use crate::policy::TimeoutPolicy;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::transport::{OutboundRequest, TransactResponse, Transport};

/// Counter incremented once per attempt, labelled by outcome.
pub const ATTEMPTS_METRIC: &str = "outbound_request_attempts_total";

/// Histogram of retries used per resolved transaction.
pub const RETRIES_METRIC: &str = "outbound_request_retries";

/// Executes outbound requests under a retry policy and an overall deadline.
///
/// A `Transactor` holds no per-call mutable state and is shared behind an
/// `Arc` by every in-flight request.
pub struct Transactor<T: Transport> {
    transport: T,
    retry: RetryPolicy,
    deadline: Deadline,
    metrics: Arc<dyn MetricsSink>,
}

impl<T: Transport> Transactor<T> {
    /// Create a transactor driven by `policy`.
    #[must_use]
    pub fn new(transport: T, policy: &TimeoutPolicy, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_policies(transport, policy.retry(), policy.deadline(), metrics)
    }

    /// Create a transactor from separately built policies.
    #[must_use]
    pub fn with_policies(
        transport: T,
        retry: RetryPolicy,
        deadline: Deadline,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            transport,
            retry,
            deadline,
            metrics,
        }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute `request`, retrying transient failures within the wait budget.
    ///
    /// Downstream error statuses are returned as `Ok` responses.
    ///
    /// # Errors
    ///
    /// Returns [`TransactError::Timeout`] if the wait budget elapsed, or the
    /// last [`TransactError::Transport`] error once retries are exhausted or
    /// a non-retryable failure occurred.
    pub async fn execute(&self, request: OutboundRequest) -> Result<TransactResponse> {
        let request = &request;
        let outcome = self
            .deadline
            .bound(self.retry.run(move |attempt| self.attempt(request, attempt)))
            .await;

        match outcome {
            Ok(RetryOutcome { result, attempts }) => {
                let label = if result.is_ok() { "success" } else { "failure" };
                self.metrics.observe(
                    RETRIES_METRIC,
                    f64::from(attempts.saturating_sub(1)),
                    &[("outcome", label)],
                );
                result.map_err(TransactError::from)
            }
            Err(DeadlineExceeded(budget)) => {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    budget = ?budget,
                    "Outbound request exceeded wait budget"
                );
                self.metrics
                    .increment(ATTEMPTS_METRIC, &[("outcome", "deadline_exceeded")]);
                Err(TransactError::Timeout(budget))
            }
        }
    }

    async fn attempt(
        &self,
        request: &OutboundRequest,
        attempt: u32,
    ) -> std::result::Result<TransactResponse, TransportError> {
        let result = self.transport.send(request).await;

        match &result {
            Ok(response) => {
                tracing::debug!(
                    attempt,
                    method = %request.method,
                    url = %request.url,
                    status = response.status.as_u16(),
                    "Outbound request completed"
                );
                self.metrics.increment(
                    ATTEMPTS_METRIC,
                    &[("outcome", "response"), ("code", response.status.as_str())],
                );
            }
            Err(err) => {
                let retryable = err.is_retryable();
                tracing::warn!(
                    attempt,
                    method = %request.method,
                    url = %request.url,
                    error = %err,
                    retryable,
                    "Outbound request failed"
                );
                let outcome = if retryable {
                    "retryable_error"
                } else {
                    "error"
                };
                self.metrics
                    .increment(ATTEMPTS_METRIC, &[("outcome", outcome)]);
            }
        }

        result
    }
}
