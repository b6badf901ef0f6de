//! Authentication middleware.
//!
//! Every API route runs through [`require_principal`], which authenticates
//! the `Authorization` header with the configured [`AuthChain`] and stores
//! the resulting [`Principal`] in the request extensions.
//!
//! [`AuthChain`]: wrp_gateway_auth::AuthChain

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use wrp_gateway_auth::Principal;
use wrp_gateway_client::Transport;
use wrp_gateway_hooks::WebhookStore;

use crate::error::ApiError;
use crate::state::GatewayState;

const REDACTED: &str = "[REDACTED]";

/// Authenticate the request and attach its [`Principal`].
///
/// Runs inside an `http_request` span carrying the method, path and
/// headers, with the `Authorization` value redacted.
///
/// # Errors
///
/// Returns 401 when authentication fails and 403 when an enforced
/// capability check fails; the handler is not invoked.
pub async fn require_principal<T, S>(
    State(state): State<Arc<GatewayState<T, S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        headers = %redacted_headers(request.headers()),
    );

    async move {
        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let principal = state
            .auth
            .authenticate(authorization.as_deref(), method.as_str(), &path)
            .await?;

        request.extensions_mut().insert(principal);
        Ok(next.run(request).await)
    }
    .instrument(span)
    .await
}

/// Render headers as `name: value` pairs, hiding credentials.
fn redacted_headers(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        if !out.is_empty() {
            out.push_str(", ");
        }
        let value = if *name == AUTHORIZATION {
            REDACTED
        } else {
            value.to_str().unwrap_or("<binary>")
        };
        let _ = write!(out, "{name}: {value}");
    }
    out
}

/// The principal of an authenticated request.
///
/// Only available on routes behind [`require_principal`].
pub type AuthPrincipal = axum::Extension<Principal>;
