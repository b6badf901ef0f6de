//! Bearer JWT validation.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::jwks::KeyResolver;
use crate::principal::Principal;

/// Key id assumed when a token header carries none.
pub const DEFAULT_KEY_ID: &str = "current";

/// Clock skew tolerated on time claims, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Leeway {
    /// Tolerance past `exp`.
    pub exp: u64,
    /// Tolerance before `nbf`.
    pub nbf: u64,
    /// Tolerance before `iat`.
    pub iat: u64,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: Option<i64>,
    #[serde(default)]
    capabilities: Vec<String>,
}

/// Turns a Bearer JWT into a [`Principal`].
pub struct BearerTokenFactory {
    resolver: Arc<dyn KeyResolver>,
    default_kid: String,
    leeway: Leeway,
}

impl BearerTokenFactory {
    /// Create a factory resolving keys through `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn KeyResolver>) -> Self {
        Self {
            resolver,
            default_kid: DEFAULT_KEY_ID.to_string(),
            leeway: Leeway::default(),
        }
    }

    /// Set the time-claim leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Leeway) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set the key id used when a token names none.
    #[must_use]
    pub fn with_default_kid(mut self, kid: impl Into<String>) -> Self {
        self.default_kid = kid.into();
        self
    }

    /// Validate `token` and extract its principal.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be parsed, its key cannot be
    /// resolved, the signature is invalid, or a time claim is out of range.
    pub async fn parse(&self, token: &str) -> Result<Principal> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header.kid.as_deref().unwrap_or(&self.default_kid);

        let key = self.resolver.resolve(kid).await?;
        if !key.permits(header.alg) {
            return Err(AuthError::InvalidToken(format!(
                "algorithm {:?} not permitted for key {kid}",
                header.alg
            )));
        }

        // Time claims are checked below with per-claim leeway.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, &key.key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("invalid signature".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?
            .claims;

        self.check_times(&claims, chrono::Utc::now().timestamp())?;

        Ok(Principal::bearer(claims.sub, claims.capabilities))
    }

    fn check_times(&self, claims: &Claims, now: i64) -> Result<()> {
        let leeway = |secs: u64| i64::try_from(secs).unwrap_or(i64::MAX);

        if let Some(exp) = claims.exp {
            if now > exp.saturating_add(leeway(self.leeway.exp)) {
                return Err(AuthError::TokenExpired);
            }
        }
        if let Some(nbf) = claims.nbf {
            if now.saturating_add(leeway(self.leeway.nbf)) < nbf {
                return Err(AuthError::TokenNotYetValid);
            }
        }
        if let Some(iat) = claims.iat {
            if now.saturating_add(leeway(self.leeway.iat)) < iat {
                return Err(AuthError::InvalidToken("issued in the future".to_string()));
            }
        }
        Ok(())
    }
}
