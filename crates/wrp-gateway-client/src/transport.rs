//! One HTTP exchange.
//!
//! The [`Transport`] trait abstracts a single request/response exchange so
//! the transactor can be exercised with scripted transports in tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};

use crate::error::{Result, TransportError};
use crate::policy::TimeoutPolicy;

/// A fully buffered outbound request.
///
/// The body is held as [`Bytes`] so every retry resends the same payload
/// without copying.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl OutboundRequest {
    /// Create a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set a header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A fully read downstream response.
#[derive(Debug, Clone)]
pub struct TransactResponse {
    /// Downstream status code.
    pub status: StatusCode,
    /// Downstream headers.
    pub headers: HeaderMap,
    /// Downstream body.
    pub body: Bytes,
}

/// A single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and read the whole response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classified by whether the failure
    /// happened before or after the response was read.
    async fn send(&self, request: &OutboundRequest) -> std::result::Result<TransactResponse, TransportError>;
}

/// [`Transport`] over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose client honors `policy`'s client and dial timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(policy: &TimeoutPolicy) -> Result<Self> {
        Ok(Self {
            client: policy.build_client()?,
        })
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> std::result::Result<TransactResponse, TransportError> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(TransactResponse {
            status,
            headers,
            body,
        })
    }
}
