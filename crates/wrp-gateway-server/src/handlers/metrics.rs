//! Prometheus exposition endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

use wrp_gateway_client::Transport;
use wrp_gateway_hooks::WebhookStore;

use crate::error::ApiError;
use crate::state::GatewayState;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render every recorded metric in the Prometheus text format.
///
/// # Errors
///
/// Returns 404 when no exporter is installed.
pub async fn metrics<T, S>(
    State(state): State<Arc<GatewayState<T, S>>>,
) -> Result<Response, ApiError>
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("metrics exporter not installed".to_string()))?;

    let mut response = handle.render().into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(EXPOSITION_CONTENT_TYPE));
    Ok(response)
}
