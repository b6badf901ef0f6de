//! Transaction error types.

use std::time::Duration;

use thiserror::Error;

/// A result type using `TransactError`.
pub type Result<T> = std::result::Result<T, TransactError>;

/// Failure of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established (refused, unreachable, dial timeout).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection was reset or aborted mid-exchange.
    #[error("connection reset: {0}")]
    Reset(String),

    /// The transport timed out before a response arrived.
    #[error("transport timeout: {0}")]
    Timeout(String),

    /// A response arrived but its body could not be read.
    #[error("reading response failed: {0}")]
    Body(String),

    /// Any other request failure.
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the exchange may be retried.
    ///
    /// Only failures that happen before a response is read qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Reset(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            return Self::Timeout(message);
        }
        match io_error_kind(&err) {
            Some(
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe,
            ) => Self::Reset(message),
            Some(std::io::ErrorKind::TimedOut) => Self::Timeout(message),
            _ if err.is_connect() => Self::Connect(message),
            _ if err.is_body() || err.is_decode() => Self::Body(message),
            _ => Self::Other(message),
        }
    }
}

/// Walk the source chain looking for an I/O error.
fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut source = err.source();
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = e.source();
    }
    None
}

/// Failure of a whole transaction (all attempts).
#[derive(Debug, Error)]
pub enum TransactError {
    /// The wait budget elapsed before the transaction resolved.
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    /// The last attempt failed and no retries remained, or the failure was not retryable.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The timeout/retry policy is unusable.
    #[error("invalid transaction policy: {0}")]
    InvalidPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(TransportError::Reset("reset".into()).is_retryable());
        assert!(TransportError::Timeout("slow".into()).is_retryable());
        assert!(!TransportError::Body("eof".into()).is_retryable());
        assert!(!TransportError::Other("bad url".into()).is_retryable());
    }

    #[test]
    fn transact_error_wraps_transport() {
        let err = TransactError::from(TransportError::Connect("refused".into()));
        assert_eq!(err.to_string(), "connection failed: refused");
    }
}
