//! Basic credentials against a static allow-list.

use std::collections::HashMap;

use base64::prelude::*;

use crate::error::{AuthError, Result};
use crate::principal::Principal;

/// Turns Basic credentials into a [`Principal`].
#[derive(Debug, Clone, Default)]
pub struct BasicTokenFactory {
    allowed: HashMap<String, String>,
}

impl BasicTokenFactory {
    /// Build the allow-list from base64-encoded `user:pass` entries.
    ///
    /// Entries that do not decode, or that carry no user name, are logged
    /// and skipped.
    #[must_use]
    pub fn from_encoded<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut allowed = HashMap::new();
        for entry in entries {
            let entry = entry.as_ref();
            let decoded = match BASE64_STANDARD.decode(entry.trim()) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable basic auth entry");
                    continue;
                }
            };
            let Ok(decoded) = String::from_utf8(decoded) else {
                tracing::warn!("Skipping basic auth entry that is not UTF-8");
                continue;
            };
            match decoded.split_once(':') {
                Some((user, pass)) if !user.is_empty() => {
                    allowed.insert(user.to_string(), pass.to_string());
                }
                _ => tracing::warn!("Skipping basic auth entry without user name"),
            }
        }
        tracing::debug!(users = allowed.len(), "Built basic auth allow-list");
        Self { allowed }
    }

    /// Returns `true` if no credentials are allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Authenticate the credential part of a `Basic` header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedHeader`] if the credentials do not
    /// decode to `user:pass`, or [`AuthError::InvalidCredentials`] if they
    /// are not in the allow-list.
    pub fn parse(&self, credentials: &str) -> Result<Principal> {
        let decoded = BASE64_STANDARD
            .decode(credentials.trim())
            .map_err(|e| AuthError::MalformedHeader(format!("invalid base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::MalformedHeader("credentials are not UTF-8".to_string()))?;
        let (user, pass) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::MalformedHeader("expected user:pass".to_string()))?;

        match self.allowed.get(user) {
            Some(expected) if expected == pass => Ok(Principal::basic(user)),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}
