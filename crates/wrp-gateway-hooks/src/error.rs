//! Webhook error types.

use thiserror::Error;
use wrp_gateway_auth::AuthError;
use wrp_gateway_client::TransactError;

/// A result type using `HookError`.
pub type Result<T> = std::result::Result<T, HookError>;

/// Errors that can occur while registering or synchronizing webhooks.
#[derive(Debug, Error)]
pub enum HookError {
    /// The registration payload is invalid.
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),

    /// The store rejected or failed a request.
    #[error("webhook store error: {0}")]
    Store(String),

    /// The store could not be reached.
    #[error("webhook store unreachable: {0}")]
    Transport(#[from] TransactError),

    /// Credentials for the store could not be obtained.
    #[error(transparent)]
    Acquire(#[from] AuthError),

    /// Webhooks are not configured.
    #[error("webhooks are disabled")]
    Disabled,

    /// The store configuration is unusable.
    #[error("invalid webhook store configuration: {0}")]
    InvalidConfig(String),
}

impl HookError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidWebhook(_) => 400,
            Self::Disabled => 404,
            Self::Store(_) | Self::Transport(_) | Self::Acquire(_) | Self::InvalidConfig(_) => 500,
        }
    }
}
