//! HTTP gateway between REST clients and a WRP device cluster.
//!
//! This crate provides the public-facing API of wrp-gateway. It handles:
//!
//! - Basic and Bearer/JWT authentication with capability checks
//! - Translation of device REST requests into WRP messages
//! - Device connection status
//! - Webhook registration against a shared remote store
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                         (HTTP)                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    wrp-gateway-server                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │ Translation │ │      Webhook        │    │
//! │  │   Chain     │ │  + Stat     │ │    Synchronizer     │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ JWT keys │   │  Device  │   │ Webhook  │
//!        │ + issuer │   │ Cluster  │   │  Store   │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wrp_gateway_core::RecorderSink;
//! use wrp_gateway_server::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::load(Some(std::path::Path::new("gateway.yaml")))?;
//! let listen_addr = config.listen_addr.clone();
//!
//! let state = GatewayState::from_config(config, Arc::new(RecorderSink))?;
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod translation;

pub use config::GatewayConfig;
pub use error::{ApiError, ConfigError};
pub use routes::create_router;
pub use state::GatewayState;
pub use translation::{ServiceResponse, TranslationService, TRANSACTION_ID_HEADER};
