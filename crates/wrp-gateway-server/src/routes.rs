//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use wrp_gateway_client::Transport;
use wrp_gateway_hooks::WebhookStore;

use crate::auth::require_principal;
use crate::handlers::{device, health, hooks, metrics};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /metrics` - Prometheus metrics
///
/// ## Webhooks (authenticated)
/// - `POST /api/v2/hook` - Register a webhook
/// - `GET /api/v2/hooks` - List webhooks
///
/// ## Devices (authenticated)
/// - `GET /api/v2/device/:device_id/stat` - Device connection status
/// - `GET|POST|PUT|PATCH|DELETE /api/v2/device/:device_id/:service` - Send a
///   WRP request to a device service
pub fn create_router<T, S>(state: GatewayState<T, S>) -> Router
where
    T: Transport + 'static,
    S: WebhookStore + 'static,
{
    // Extract config values before moving state
    let max_body_bytes = state.config.max_body_bytes;

    let state = Arc::new(state);

    let api = Router::new()
        .route("/api/v2/hook", post(hooks::register::<T, S>))
        .route("/api/v2/hooks", get(hooks::list::<T, S>))
        .route("/api/v2/device/:device_id/stat", get(device::stat::<T, S>))
        .route(
            "/api/v2/device/:device_id/:service",
            get(device::translate::<T, S>)
                .post(device::translate::<T, S>)
                .put(device::translate::<T, S>)
                .patch(device::translate::<T, S>)
                .delete(device::translate::<T, S>),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_principal::<T, S>,
        ));

    Router::new()
        // Public
        .route("/health", get(health::health::<T, S>))
        .route("/metrics", get(metrics::metrics::<T, S>))
        .merge(api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
