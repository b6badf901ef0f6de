//! Retrying HTTP transactor for wrp-gateway.
//!
//! Every outbound call the gateway makes (device transactions, status
//! queries) goes through a [`Transactor`]. It composes two independent
//! policies around a [`Transport`]:
//!
//! - [`RetryPolicy`]: retry transient transport failures a fixed number of
//!   times, a fixed interval apart
//! - [`Deadline`]: a hard ceiling over the whole attempt sequence
//!
//! ```text
//! execute(request)
//!   └─ Deadline::bound ─────────────── wait budget (whole sequence)
//!        └─ RetryPolicy::run ───────── attempts 1..=max_retries+1
//!             └─ Transport::send ───── one HTTP exchange
//! ```
//!
//! HTTP error statuses are not errors here: a 500 from downstream is a
//! successful transaction that carries status 500.
//!
//! Retries may deliver the same logical request to the downstream cluster
//! more than once. Downstream idempotency is assumed, not enforced.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod deadline;
pub mod error;
pub mod policy;
pub mod retry;
pub mod transactor;
pub mod transport;

pub use deadline::{Deadline, DeadlineExceeded};
pub use error::{Result, TransactError, TransportError};
pub use policy::TimeoutPolicy;
pub use retry::{RetryOutcome, RetryPolicy, Retryable};
pub use transactor::Transactor;
pub use transport::{OutboundRequest, ReqwestTransport, TransactResponse, Transport};
