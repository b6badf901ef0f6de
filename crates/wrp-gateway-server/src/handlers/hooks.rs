//! Webhook registration endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;

use wrp_gateway_client::Transport;
use wrp_gateway_hooks::{HookError, Webhook, WebhookStore, WebhookSynchronizer};

use crate::auth::AuthPrincipal;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Response for a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// Always `Success`.
    pub message: &'static str,
    /// The registration as stored.
    pub webhook: Webhook,
}

fn synchronizer<T, S>(state: &GatewayState<T, S>) -> Result<&WebhookSynchronizer<S>, ApiError>
where
    T: Transport,
    S: WebhookStore,
{
    state
        .webhooks
        .as_deref()
        .ok_or_else(|| ApiError::from(HookError::Disabled))
}

/// Register a webhook on behalf of the authenticated caller.
///
/// The registration is stored remotely before this returns; nothing is
/// recorded if the store rejects it. The caller's socket address replaces
/// any `address` given in the payload.
///
/// # Errors
///
/// Returns 404 when webhooks are disabled, 400 for an invalid payload, and
/// 500 when the store push fails.
pub async fn register<T, S>(
    State(state): State<Arc<GatewayState<T, S>>>,
    axum::Extension(principal): AuthPrincipal,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, ApiError>
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    let webhooks = synchronizer(&state)?;
    let mut webhook: Webhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {e}")))?;
    webhook.address = peer.map(|ConnectInfo(addr)| addr.to_string()).unwrap_or_default();

    let webhook = webhooks.register(webhook, &principal.subject).await?;
    Ok(Json(RegisterResponse {
        message: "Success",
        webhook,
    }))
}

/// List the current webhook registrations, sorted by subscriber URL.
///
/// Served from the local snapshot; never waits on the store.
///
/// # Errors
///
/// Returns 404 when webhooks are disabled.
pub async fn list<T, S>(
    State(state): State<Arc<GatewayState<T, S>>>,
) -> Result<Json<Vec<Webhook>>, ApiError>
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    let webhooks = synchronizer(&state)?;
    Ok(Json(webhooks.list().as_ref().clone()))
}
