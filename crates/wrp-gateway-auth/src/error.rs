//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while authenticating, authorizing or acquiring credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("missing authorization header")]
    MissingHeader,

    /// The `Authorization` header could not be split into scheme and credentials.
    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),

    /// The scheme is unknown or has no configured token factory.
    #[error("unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),

    /// Basic credentials are not in the allow-list.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The JWT could not be parsed or its signature is invalid.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The JWT `exp` is in the past, beyond leeway.
    #[error("token expired")]
    TokenExpired,

    /// The JWT `nbf` is in the future, beyond leeway.
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// No verification key exists for the token's key id.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Fetching verification keys failed.
    #[error("key fetch failed: {0}")]
    KeyFetchFailed(String),

    /// A validation rule rejected the principal.
    #[error("validation failed: {0}")]
    RuleFailed(&'static str),

    /// No capability grants the request.
    #[error("capability check failed: {0}")]
    CapabilityDenied(String),

    /// An outbound credential could not be obtained.
    #[error("token acquisition failed: {0}")]
    AcquireFailed(String),

    /// The auth configuration is unusable.
    #[error("invalid auth configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingHeader
            | Self::MalformedHeader(_)
            | Self::UnsupportedScheme(_)
            | Self::InvalidCredentials
            | Self::InvalidToken(_)
            | Self::TokenExpired
            | Self::TokenNotYetValid
            | Self::KeyNotFound(_)
            | Self::RuleFailed(_) => 401,
            Self::CapabilityDenied(_) => 403,
            Self::KeyFetchFailed(_) | Self::AcquireFailed(_) | Self::InvalidConfig(_) => 500,
        }
    }

    /// Short label used as the `reason` metric dimension.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::MalformedHeader(_) => "malformed_header",
            Self::UnsupportedScheme(_) => "unsupported_scheme",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::TokenNotYetValid => "token_not_yet_valid",
            Self::KeyNotFound(_) => "key_not_found",
            Self::KeyFetchFailed(_) => "key_fetch_failed",
            Self::RuleFailed(_) => "rule_failed",
            Self::CapabilityDenied(_) => "capability_denied",
            Self::AcquireFailed(_) => "acquire_failed",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}
