//! Authentication and authorization for wrp-gateway.
//!
//! This crate provides:
//!
//! - The inbound [`AuthChain`]: Basic allow-list and Bearer JWT token
//!   factories, per-scheme validation rules, capability enforcement and
//!   outcome metrics
//! - Verification key resolution with caching ([`HttpKeyResolver`])
//! - Outbound credential acquisition ([`Acquirer`])
//!
//! # Architecture
//!
//! ```text
//!  Authorization header
//!          │
//!  ┌───────▼────────┐   Basic   ┌───────────────────┐
//!  │  split scheme  │──────────▶│ BasicTokenFactory │──┐
//!  └───────┬────────┘           └───────────────────┘  │
//!          │ Bearer                                    │
//!  ┌───────▼────────────┐      ┌──────────────┐        │
//!  │ BearerTokenFactory │─────▶│ KeyResolver  │        │
//!  └───────┬────────────┘      └──────────────┘        │
//!          │                                           │
//!  ┌───────▼─────────────────────┐  ┌──────────────────▼┐
//!  │ Bearer rules (+ capability) │  │ Basic: allow all  │
//!  └───────┬─────────────────────┘  └──────────┬────────┘
//!          └──────────────┬────────────────────┘
//!                 ┌───────▼────────┐
//!                 │ MetricListener │
//!                 └────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use wrp_gateway_auth::{
//!     AuthChain, BasicTokenFactory, BearerTokenFactory, CapabilityChecker, CheckMode,
//!     HttpKeyResolver,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = HttpKeyResolver::new(
//!     "https://issuer.example.com/keys/{keyId}",
//!     Duration::from_secs(86_400),
//!     Duration::from_secs(10),
//! )?;
//!
//! let chain = AuthChain::builder()
//!     .basic(BasicTokenFactory::from_encoded(&["dXNlcjpwYXNz"]))
//!     .bearer(BearerTokenFactory::new(Arc::new(resolver)))
//!     .capability_check(CapabilityChecker::new("x1:issuer/", "all")?, CheckMode::Enforce)
//!     .build();
//!
//! let principal = chain
//!     .authenticate(Some("Basic dXNlcjpwYXNz"), "GET", "/api/v2/device/mac:112233445566/stat")
//!     .await?;
//! println!("Authenticated {}", principal.subject);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acquire;
pub mod basic;
pub mod bearer;
pub mod capability;
pub mod chain;
pub mod error;
pub mod jwks;
pub mod listener;
pub mod principal;
pub mod rules;

pub use acquire::{Acquirer, RemoteBearerAcquirer, RemoteBearerOptions};
pub use basic::BasicTokenFactory;
pub use bearer::{BearerTokenFactory, Leeway, DEFAULT_KEY_ID};
pub use capability::{CapabilityChecker, CapabilityRule, CheckMode, Mismatch};
pub use chain::{AuthChain, AuthChainBuilder, DEFAULT_API_PREFIX};
pub use error::{AuthError, Result};
pub use jwks::{HttpKeyResolver, KeyResolver, ResolvedKey};
pub use listener::{EndpointBuckets, MetricListener};
pub use principal::{Principal, Scheme};
pub use rules::{RequestInfo, Rule};

#[cfg(any(test, feature = "test-utils"))]
pub use jwks::StaticKeyResolver;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::MissingHeader.http_status_code(), 401);
        assert_eq!(AuthError::TokenExpired.http_status_code(), 401);
        assert_eq!(AuthError::RuleFailed("empty principal").http_status_code(), 401);
        assert_eq!(AuthError::CapabilityDenied("x".into()).http_status_code(), 403);
        assert_eq!(AuthError::AcquireFailed("x".into()).http_status_code(), 500);
        assert_eq!(AuthError::KeyFetchFailed("x".into()).http_status_code(), 500);
    }

    #[test]
    fn auth_error_reasons_are_distinct_labels() {
        assert_eq!(AuthError::MissingHeader.reason(), "missing_header");
        assert_ne!(
            AuthError::TokenExpired.reason(),
            AuthError::TokenNotYetValid.reason()
        );
    }
}
