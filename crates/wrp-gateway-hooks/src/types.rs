//! Webhook registrations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HookError, Result};

/// Registration lifetime applied when none is given.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Where and how events are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Subscriber URL.
    pub url: String,
    /// Delivery content type.
    #[serde(default = "default_content_type", rename = "content_type")]
    pub content_type: String,
    /// Shared secret used to sign deliveries.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,
    /// Fallback delivery URLs.
    #[serde(default, rename = "alt_urls", skip_serializing_if = "Vec::is_empty")]
    pub alternative_urls: Vec<String>,
}

fn default_content_type() -> String {
    "json".to_string()
}

/// Device filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    /// Device id patterns; empty matches every device.
    #[serde(default, rename = "device_id", skip_serializing_if = "Vec::is_empty")]
    pub device_id: Vec<String>,
}

/// A webhook registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    /// Delivery settings.
    pub config: DeliveryConfig,
    /// Event type patterns.
    #[serde(default)]
    pub events: Vec<String>,
    /// Device filter.
    #[serde(default)]
    pub matcher: Matcher,
    /// Notified when deliveries keep failing.
    #[serde(default, rename = "failure_url", skip_serializing_if = "String::is_empty")]
    pub failure_url: String,
    /// Requested lifetime in seconds; zero selects the default.
    #[serde(default)]
    pub duration: u64,
    /// Expiry, set on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    /// Address the registration was made from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
}

impl Webhook {
    /// Subscriber URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Store item id: hex BLAKE3 of the subscriber URL.
    ///
    /// Re-registering the same URL therefore replaces the previous entry.
    #[must_use]
    pub fn id(&self) -> String {
        hex::encode(blake3::hash(self.config.url.as_bytes()).as_bytes())
    }

    /// Lifetime, in seconds, after normalization.
    #[must_use]
    pub const fn ttl_secs(&self) -> u64 {
        self.duration
    }

    /// Validate and normalize a registration received at `now`.
    ///
    /// Fills the default duration and sets `until`.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidWebhook`] if a URL is not http(s), no
    /// events are given, or a pattern does not compile.
    pub fn validate(mut self, now: DateTime<Utc>) -> Result<Self> {
        check_url("config.url", &self.config.url)?;
        for alt in &self.config.alternative_urls {
            check_url("config.alt_urls", alt)?;
        }
        if !self.failure_url.is_empty() {
            check_url("failure_url", &self.failure_url)?;
        }

        if self.events.is_empty() {
            return Err(HookError::InvalidWebhook(
                "at least one event is required".to_string(),
            ));
        }
        for pattern in self.events.iter().chain(&self.matcher.device_id) {
            Regex::new(pattern).map_err(|e| {
                HookError::InvalidWebhook(format!("invalid pattern {pattern:?}: {e}"))
            })?;
        }

        if self.duration == 0 {
            self.duration = DEFAULT_DURATION.as_secs();
        }
        let lifetime = chrono::Duration::seconds(i64::try_from(self.duration).unwrap_or(i64::MAX));
        self.until = Some(now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC));

        Ok(self)
    }
}

fn check_url(field: &str, raw: &str) -> Result<()> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| HookError::InvalidWebhook(format!("{field}: invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HookError::InvalidWebhook(format!(
            "{field}: scheme must be http or https"
        )));
    }
    if url.host_str().filter(|host| !host.is_empty()).is_none() {
        return Err(HookError::InvalidWebhook(format!("{field}: missing host")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn webhook(url: &str) -> Webhook {
        Webhook {
            config: DeliveryConfig {
                url: url.to_string(),
                content_type: default_content_type(),
                secret: "s3cr3t".to_string(),
                alternative_urls: vec![],
            },
            events: vec![".*".to_string()],
            matcher: Matcher::default(),
            failure_url: String::new(),
            duration: 0,
            until: None,
            address: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn default_duration_is_five_minutes() {
        let hook = webhook("https://subscriber.example.com/events").validate(now()).unwrap();
        assert_eq!(hook.duration, 300);
        assert_eq!(hook.until, Some(now() + chrono::Duration::minutes(5)));
    }

    #[test]
    fn explicit_duration_is_kept() {
        let mut hook = webhook("http://subscriber.example.com/");
        hook.duration = 60;
        assert_eq!(hook.validate(now()).unwrap().ttl_secs(), 60);
    }

    #[test]
    fn rejects_non_http_urls() {
        for url in ["ftp://subscriber.example.com/", "not a url", "file:///tmp/x"] {
            assert!(
                matches!(webhook(url).validate(now()), Err(HookError::InvalidWebhook(_))),
                "{url}"
            );
        }
    }

    #[test]
    fn rejects_missing_events() {
        let mut hook = webhook("https://subscriber.example.com/");
        hook.events.clear();
        assert!(hook.validate(now()).is_err());
    }

    #[test]
    fn rejects_bad_patterns() {
        let mut hook = webhook("https://subscriber.example.com/");
        hook.events = vec!["(".to_string()];
        assert!(hook.clone().validate(now()).is_err());

        hook.events = vec!["device-status/.*".to_string()];
        hook.matcher.device_id = vec!["[".to_string()];
        assert!(hook.validate(now()).is_err());
    }

    #[test]
    fn id_is_stable_per_url() {
        let a = webhook("https://subscriber.example.com/events");
        let mut b = a.clone();
        b.events = vec!["other".into()];
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 64);
        assert_ne!(a.id(), webhook("https://other.example.com/").id());
    }

    #[test]
    fn deserializes_registration_payload() {
        let hook: Webhook = serde_json::from_str(
            r#"{
                "config": {"url": "https://subscriber.example.com/events", "secret": "abc"},
                "events": ["device-status/.*"],
                "matcher": {"device_id": ["mac:.*"]}
            }"#,
        )
        .unwrap();
        assert_eq!(hook.config.content_type, "json");
        assert_eq!(hook.matcher.device_id, vec!["mac:.*"]);
        assert_eq!(hook.duration, 0);
    }
}
