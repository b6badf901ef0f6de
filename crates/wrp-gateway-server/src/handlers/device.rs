//! Device endpoints.
//!
//! Both endpoints forward to the device cluster and render its answer
//! verbatim; see [`crate::translation`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use wrp_gateway_client::Transport;
use wrp_gateway_hooks::WebhookStore;

use crate::error::ApiError;
use crate::state::GatewayState;
use crate::translation::{ServiceResponse, TranslationRequest};

/// Forward a REST request to a device service.
///
/// # Errors
///
/// Returns 400 for an unsupported service or malformed device id, 503 when
/// the device cluster does not answer in time, and 500 for other
/// forwarding failures.
pub async fn translate<T, S>(
    State(state): State<Arc<GatewayState<T, S>>>,
    Path((device_id, service)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ServiceResponse, ApiError>
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    state
        .translation
        .translate(TranslationRequest {
            device_id: &device_id,
            service: &service,
            method: &method,
            content_type,
            body,
        })
        .await
}

/// Fetch the connection status of a device.
///
/// # Errors
///
/// Returns 400 for a malformed device id and a 5xx error when the device
/// cluster cannot be reached.
pub async fn stat<T, S>(
    State(state): State<Arc<GatewayState<T, S>>>,
    Path(device_id): Path<String>,
) -> Result<ServiceResponse, ApiError>
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    state.translation.get_status(&device_id).await
}
