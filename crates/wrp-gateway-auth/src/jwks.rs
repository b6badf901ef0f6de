//! Verification key resolution and caching.
//!
//! Keys are fetched from a configured URI. The URI either names a whole
//! key set (a JWK set document) or contains a `{keyId}` template that is
//! expanded per key id, in which case the response may be a JWK set, a
//! single JWK, or a PEM public key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;

use crate::error::{AuthError, Result};

/// Placeholder in a key URI replaced by the requested key id.
pub const KEY_ID_TEMPLATE: &str = "{keyId}";

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const EC_ALGORITHMS: &[Algorithm] = &[Algorithm::ES256, Algorithm::ES384];
const ED_ALGORITHMS: &[Algorithm] = &[Algorithm::EdDSA];
const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// A verification key together with the algorithms it may verify.
#[derive(Clone)]
pub struct ResolvedKey {
    /// The decoding key.
    pub key: DecodingKey,
    /// Algorithms permitted with this key.
    pub algorithms: &'static [Algorithm],
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("key", &"[REDACTED]")
            .field("algorithms", &self.algorithms)
            .finish()
    }
}

impl ResolvedKey {
    /// An HMAC shared secret.
    #[must_use]
    pub fn hmac(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            algorithms: HMAC_ALGORITHMS,
        }
    }

    /// Returns `true` if `alg` may be verified with this key.
    #[must_use]
    pub fn permits(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let algorithms = match &jwk.algorithm {
            AlgorithmParameters::RSA(_) => RSA_ALGORITHMS,
            AlgorithmParameters::EllipticCurve(_) => EC_ALGORITHMS,
            AlgorithmParameters::OctetKeyPair(_) => ED_ALGORITHMS,
            AlgorithmParameters::OctetKey(_) => HMAC_ALGORITHMS,
        };
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::KeyFetchFailed(format!("unusable JWK: {e}")))?;
        Ok(Self { key, algorithms })
    }

    fn from_pem(pem: &[u8]) -> Result<Self> {
        if let Ok(key) = DecodingKey::from_rsa_pem(pem) {
            return Ok(Self {
                key,
                algorithms: RSA_ALGORITHMS,
            });
        }
        if let Ok(key) = DecodingKey::from_ec_pem(pem) {
            return Ok(Self {
                key,
                algorithms: EC_ALGORITHMS,
            });
        }
        if let Ok(key) = DecodingKey::from_ed_pem(pem) {
            return Ok(Self {
                key,
                algorithms: ED_ALGORITHMS,
            });
        }
        Err(AuthError::KeyFetchFailed(
            "PEM is not an RSA, EC or Ed25519 public key".to_string(),
        ))
    }
}

/// Resolves verification keys by key id.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve the key for `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if no such key exists, or
    /// [`AuthError::KeyFetchFailed`] if the key source is unreachable.
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey>;
}

struct CachedKey {
    key: ResolvedKey,
    fetched_at: Instant,
}

/// [`KeyResolver`] fetching keys over HTTP and caching them.
///
/// Cached keys are served until `refresh_interval` has elapsed since they
/// were fetched. The cache is an immutable snapshot replaced wholesale on
/// each fetch, so readers never observe a partial update.
pub struct HttpKeyResolver {
    uri: String,
    refresh_interval: Duration,
    client: reqwest::Client,
    cache: RwLock<Arc<HashMap<String, CachedKey>>>,
}

impl HttpKeyResolver {
    /// Create a resolver for `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is empty or the HTTP client cannot be created.
    pub fn new(uri: impl Into<String>, refresh_interval: Duration, timeout: Duration) -> Result<Self> {
        let uri = uri.into();
        if uri.is_empty() {
            return Err(AuthError::InvalidConfig("key URI must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            uri,
            refresh_interval,
            client,
            cache: RwLock::new(Arc::new(HashMap::new())),
        })
    }

    fn is_templated(&self) -> bool {
        self.uri.contains(KEY_ID_TEMPLATE)
    }

    fn cached(&self, kid: &str) -> Option<ResolvedKey> {
        let snapshot = Arc::clone(&self.cache.read());
        snapshot
            .get(kid)
            .filter(|entry| entry.fetched_at.elapsed() < self.refresh_interval)
            .map(|entry| entry.key.clone())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!(url = %url, "Fetching verification keys");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetchFailed(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AuthError::KeyNotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(AuthError::KeyFetchFailed(format!("HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| AuthError::KeyFetchFailed(e.to_string()))
    }

    /// Parse a key document into `(kid, key)` pairs.
    ///
    /// `requested` names the key for documents that carry no key id of
    /// their own (PEM, or a JWK without `kid`).
    fn parse_document(body: &str, requested: Option<&str>) -> Result<Vec<(String, ResolvedKey)>> {
        let trimmed = body.trim_start();
        if trimmed.starts_with("-----BEGIN") {
            let kid = requested.ok_or_else(|| {
                AuthError::KeyFetchFailed("PEM key requires a templated key URI".to_string())
            })?;
            return Ok(vec![(kid.to_string(), ResolvedKey::from_pem(trimmed.as_bytes())?)]);
        }

        let jwks: Vec<Jwk> = match serde_json::from_str::<JwkSet>(trimmed) {
            Ok(set) => set.keys,
            Err(_) => vec![serde_json::from_str::<Jwk>(trimmed)
                .map_err(|e| AuthError::KeyFetchFailed(format!("invalid key document: {e}")))?],
        };

        let mut keys = Vec::with_capacity(jwks.len());
        for jwk in &jwks {
            let Some(kid) = jwk.common.key_id.as_deref().or(requested) else {
                tracing::warn!("Skipping JWK without key id");
                continue;
            };
            match ResolvedKey::from_jwk(jwk) {
                Ok(key) => keys.push((kid.to_string(), key)),
                Err(e) => tracing::warn!(kid = kid, error = %e, "Skipping unusable JWK"),
            }
        }
        Ok(keys)
    }

    async fn refresh(&self, kid: &str) -> Result<()> {
        let templated = self.is_templated();
        let url = if templated {
            self.uri.replace(KEY_ID_TEMPLATE, kid)
        } else {
            self.uri.clone()
        };
        let body = self.fetch(&url).await?;
        let fetched = Self::parse_document(&body, templated.then_some(kid))?;
        let fetched_at = Instant::now();

        let mut cache = self.cache.write();
        let mut next: HashMap<String, CachedKey> = if templated {
            cache
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        CachedKey {
                            key: v.key.clone(),
                            fetched_at: v.fetched_at,
                        },
                    )
                })
                .collect()
        } else {
            HashMap::new()
        };
        for (id, key) in fetched {
            next.insert(id, CachedKey { key, fetched_at });
        }
        tracing::debug!(count = next.len(), "Cached verification keys");
        *cache = Arc::new(next);
        Ok(())
    }
}

#[async_trait]
impl KeyResolver for HttpKeyResolver {
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey> {
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        self.refresh(kid).await?;

        let snapshot = Arc::clone(&self.cache.read());
        snapshot
            .get(kid)
            .map(|entry| entry.key.clone())
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }
}

/// [`KeyResolver`] over a fixed in-memory key set.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, ResolvedKey>,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticKeyResolver {
    /// Resolver with a single HMAC key.
    #[must_use]
    pub fn hmac(kid: impl Into<String>, secret: &[u8]) -> Self {
        Self::default().with_key(kid, ResolvedKey::hmac(secret))
    }

    /// Add a key.
    #[must_use]
    pub fn with_key(mut self, kid: impl Into<String>, key: ResolvedKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }
}
