//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use wrp_gateway_client::Transport;
use wrp_gateway_hooks::WebhookStore;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Services requests may be translated for.
    pub services: Vec<String>,
    /// Number of webhooks in the local view, if a store is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhooks: Option<usize>,
}

/// Health check handler.
///
/// Public; does not require authentication.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "services": ["config"],
///   "webhooks": 3
/// }
/// ```
pub async fn health<T, S>(State(state): State<Arc<GatewayState<T, S>>>) -> impl IntoResponse
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        services: state.config.supported_services.clone(),
        webhooks: state.webhooks.as_ref().map(|w| w.list().len()),
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_count_is_omitted_without_store() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            services: vec!["config".to_string()],
            webhooks: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["services"][0], "config");
        assert!(json.get("webhooks").is_none());
    }
}
