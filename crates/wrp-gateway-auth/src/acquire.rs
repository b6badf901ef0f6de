//! Credentials for outbound requests.
//!
//! An [`Acquirer`] produces the `Authorization` header value the gateway
//! attaches to calls it makes on its own behalf (to the device cluster and
//! to the webhook store).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::{AuthError, Result};

/// Upper bound on how long a fetched token is cached.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Settings for fetching a bearer token from a remote issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBearerOptions {
    /// Token endpoint.
    pub auth_url: String,
    /// Timeout of the token request.
    pub timeout: Duration,
    /// Refresh this long before the token expires.
    pub buffer: Duration,
    /// Extra headers sent with the token request.
    pub request_headers: BTreeMap<String, String>,
}

impl RemoteBearerOptions {
    /// Returns `true` if URL, timeout and buffer are all set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.auth_url.is_empty() && !self.timeout.is_zero() && !self.buffer.is_zero()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "serviceAccessToken")]
    token: String,
    #[serde(rename = "expires_in")]
    expires_in_secs: f64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Fetches bearer tokens and caches them until `expiry - buffer`.
pub struct RemoteBearerAcquirer {
    options: RemoteBearerOptions,
    client: reqwest::Client,
    cached: RwLock<Option<Arc<CachedToken>>>,
    refresh: tokio::sync::Mutex<()>,
}

impl RemoteBearerAcquirer {
    /// Create an acquirer.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are incomplete or the HTTP client
    /// cannot be created.
    pub fn new(options: RemoteBearerOptions) -> Result<Self> {
        if !options.is_complete() {
            return Err(AuthError::InvalidConfig(
                "JWT acquirer needs authURL, timeout and buffer".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| AuthError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            options,
            client,
            cached: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
        })
    }

    fn fresh(&self) -> Option<String> {
        let cached = self.cached.read().clone()?;
        Instant::now()
            .checked_add(self.options.buffer)
            .is_some_and(|refresh_at| refresh_at < cached.expires_at)
            .then(|| cached.value.clone())
    }

    /// Return a cached token, fetching a new one if it is due for refresh.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AcquireFailed`] if the token endpoint fails.
    pub async fn acquire(&self) -> Result<String> {
        if let Some(value) = self.fresh() {
            return Ok(value);
        }

        // One refresh at a time; latecomers reuse the winner's token.
        let _guard = self.refresh.lock().await;
        if let Some(value) = self.fresh() {
            return Ok(value);
        }

        let token = self.fetch().await?;
        let value = format!("Bearer {}", token.token);
        let lifetime = Duration::try_from_secs_f64(token.expires_in_secs.max(0.0))
            .unwrap_or(MAX_TOKEN_LIFETIME)
            .min(MAX_TOKEN_LIFETIME);
        *self.cached.write() = Some(Arc::new(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        }));
        tracing::debug!(expires_in = ?lifetime, "Acquired outbound bearer token");
        Ok(value)
    }

    async fn fetch(&self) -> Result<TokenResponse> {
        let mut request = self.client.get(&self.options.auth_url);
        for (name, value) in &self.options.request_headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::AcquireFailed(format!("request failed: {e}")))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Token endpoint returned non-200");
            return Err(AuthError::AcquireFailed(format!("HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::AcquireFailed(format!("invalid response: {e}")))
    }
}

/// Source of outbound `Authorization` values.
pub enum Acquirer {
    /// Bearer token fetched from a remote issuer.
    RemoteBearer(RemoteBearerAcquirer),
    /// A fixed header value.
    Fixed(String),
}

impl Acquirer {
    /// Choose an acquirer from configuration: a complete JWT section wins
    /// over a Basic value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if neither is usable.
    pub fn from_options(jwt: Option<RemoteBearerOptions>, basic: Option<&str>) -> Result<Self> {
        if let Some(options) = jwt.filter(RemoteBearerOptions::is_complete) {
            return Ok(Self::RemoteBearer(RemoteBearerAcquirer::new(options)?));
        }
        match basic.map(str::trim).filter(|b| !b.is_empty()) {
            Some(basic) => Ok(Self::fixed(basic)),
            None => Err(AuthError::InvalidConfig(
                "auth acquirer not configured properly".to_string(),
            )),
        }
    }

    /// A fixed value. A bare credential is taken to be Basic.
    #[must_use]
    pub fn fixed(value: &str) -> Self {
        if value.contains(' ') {
            Self::Fixed(value.to_string())
        } else {
            Self::Fixed(format!("Basic {value}"))
        }
    }

    /// Produce the `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AcquireFailed`] if a remote token cannot be obtained.
    pub async fn acquire(&self) -> Result<String> {
        match self {
            Self::RemoteBearer(remote) => remote.acquire().await,
            Self::Fixed(value) => Ok(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(url: String) -> RemoteBearerOptions {
        RemoteBearerOptions {
            auth_url: url,
            timeout: Duration::from_secs(5),
            buffer: Duration::from_secs(10),
            request_headers: BTreeMap::from([("X-Client-Id".to_string(), "gateway".to_string())]),
        }
    }

    fn token(value: &str, expires_in: impl serde::Serialize) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "serviceAccessToken": value,
            "expires_in": expires_in,
        }))
    }

    #[tokio::test]
    async fn token_is_cached_until_buffer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("X-Client-Id", "gateway"))
            .respond_with(token("abc", 3600))
            .expect(1)
            .mount(&server)
            .await;

        let acquirer = Acquirer::from_options(Some(options(format!("{}/token", server.uri()))), None).unwrap();
        assert_eq!(acquirer.acquire().await.unwrap(), "Bearer abc");
        assert_eq!(acquirer.acquire().await.unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn token_inside_buffer_is_refreshed() {
        let server = MockServer::start().await;
        // Lifetime shorter than the buffer: every call refreshes.
        Mock::given(method("GET"))
            .respond_with(token("short", 5))
            .expect(2)
            .mount(&server)
            .await;

        let acquirer = RemoteBearerAcquirer::new(options(server.uri())).unwrap();
        acquirer.acquire().await.unwrap();
        acquirer.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn huge_expiry_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(token("long", 1e19))
            .expect(1)
            .mount(&server)
            .await;

        let acquirer = RemoteBearerAcquirer::new(options(server.uri())).unwrap();
        assert_eq!(acquirer.acquire().await.unwrap(), "Bearer long");
        assert_eq!(acquirer.acquire().await.unwrap(), "Bearer long");
    }

    #[tokio::test]
    async fn huge_buffer_refreshes_instead_of_overflowing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(token("abc", 3600))
            .expect(2)
            .mount(&server)
            .await;

        let mut opts = options(server.uri());
        opts.buffer = Duration::MAX;
        let acquirer = RemoteBearerAcquirer::new(opts).unwrap();
        acquirer.acquire().await.unwrap();
        acquirer.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn non_200_is_acquire_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let acquirer = RemoteBearerAcquirer::new(options(server.uri())).unwrap();
        let err = acquirer.acquire().await.unwrap_err();
        assert!(matches!(err, AuthError::AcquireFailed(_)));
        assert_eq!(err.http_status_code(), 500);
    }

    #[tokio::test]
    async fn jwt_preferred_over_basic() {
        let acquirer = Acquirer::from_options(
            Some(options("http://issuer.invalid/token".into())),
            Some("Basic dXNlcjpwYXNz"),
        )
        .unwrap();
        assert!(matches!(acquirer, Acquirer::RemoteBearer(_)));
    }

    #[tokio::test]
    async fn incomplete_jwt_falls_back_to_basic() {
        let mut jwt = options("http://issuer.invalid/token".into());
        jwt.buffer = Duration::ZERO;
        let acquirer = Acquirer::from_options(Some(jwt), Some("dXNlcjpwYXNz")).unwrap();
        assert_eq!(acquirer.acquire().await.unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn nothing_configured_is_error() {
        assert!(matches!(
            Acquirer::from_options(None, Some("  ")),
            Err(AuthError::InvalidConfig(_))
        ));
    }
}
