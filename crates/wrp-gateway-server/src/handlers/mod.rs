//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod device;
pub mod health;
pub mod hooks;
pub mod metrics;
