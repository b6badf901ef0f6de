//! Core types and utilities for wrp-gateway.
//!
//! This crate provides the foundational types shared by every other crate in
//! the workspace:
//!
//! - **Identifiers**: validated device IDs and per-request transaction IDs
//! - **WRP**: the envelope exchanged with the device-communication cluster
//! - **Metrics**: the injectable sink all components report through
//! - **Durations**: Go-style duration strings used throughout configuration
//!
//! # Example
//!
//! ```
//! use wrp_gateway_core::{DeviceId, Message, TransactionId};
//!
//! let device = DeviceId::parse("mac:11:22:33:44:55:66").unwrap();
//! assert_eq!(device.as_str(), "mac:112233445566");
//!
//! let msg = Message::simple_request(
//!     "dns:gateway.example.com",
//!     &device,
//!     "config",
//!     TransactionId::generate(),
//! );
//! assert_eq!(msg.dest, "mac:112233445566/config");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod duration;
pub mod error;
pub mod ids;
pub mod telemetry;
pub mod wrp;

pub use duration::{parse_duration, DurationParseError};
pub use error::{CoreError, Result};
pub use ids::{DeviceId, IdError, TransactionId};
pub use telemetry::{MetricsSink, NoopSink, RecorderSink};
pub use wrp::{Message, MessageType};

#[cfg(any(test, feature = "test-utils"))]
pub use telemetry::{MemorySink, Observation};
