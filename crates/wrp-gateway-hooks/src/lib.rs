//! Webhook registration for wrp-gateway.
//!
//! Registrations live in a remote store shared by every gateway instance.
//! Each instance pushes new registrations synchronously and pulls the whole
//! bucket periodically, so all instances converge on the same listing.
//!
//! - [`Webhook`]: the registration payload and its validation
//! - [`WebhookStore`]: the store protocol, with [`HttpWebhookStore`] as the
//!   HTTP client
//! - [`WebhookSynchronizer`]: the local snapshot and pull loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod store;
pub mod sync;
pub mod types;

pub use error::{HookError, Result};
pub use store::{HttpWebhookStore, StoreItem, WebhookStore, OWNER_HEADER};
pub use sync::WebhookSynchronizer;
pub use types::{DeliveryConfig, Matcher, Webhook, DEFAULT_DURATION};

#[cfg(any(test, feature = "test-utils"))]
pub use store::MemoryWebhookStore;
