//! API error types and responses.
//!
//! This module defines the standard error format for all API responses,
//! and the startup configuration error.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use wrp_gateway_auth::AuthError;
use wrp_gateway_client::TransactError;
use wrp_gateway_hooks::HookError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The principal lacks a capability for this request.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The device cluster did not answer within the wait budget.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err.http_status_code() {
            401 => Self::Unauthorized(err.to_string()),
            403 => Self::Forbidden(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<TransactError> for ApiError {
    fn from(err: TransactError) -> Self {
        match err {
            TransactError::Timeout(budget) => {
                Self::ServiceUnavailable(format!("no device response within {budget:?}"))
            }
            // Each failed attempt is already logged by the transactor.
            TransactError::Transport(_) => Self::Internal("device cluster request failed".to_string()),
            TransactError::InvalidPolicy(msg) => {
                tracing::error!(error = %msg, "Invalid transaction policy");
                Self::Internal(msg)
            }
        }
    }
}

impl From<HookError> for ApiError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::InvalidWebhook(msg) => Self::BadRequest(msg),
            HookError::Disabled => Self::NotFound("webhooks are not configured".to_string()),
            HookError::Store(_)
            | HookError::Transport(_)
            | HookError::Acquire(_)
            | HookError::InvalidConfig(_) => Self::Internal("webhook store error".to_string()),
        }
    }
}

/// Errors that stop the gateway from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::GatewayConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// An authentication section is unusable.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The webhook store section is unusable.
    #[error(transparent)]
    Hooks(#[from] HookError),

    /// The timeout policy is unusable.
    #[error(transparent)]
    Policy(#[from] TransactError),
}
