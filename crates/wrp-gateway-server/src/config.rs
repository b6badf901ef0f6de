//! Gateway configuration types.
//!
//! Configuration is read from a YAML file whose keys are camelCase. Every
//! key is optional: missing keys take their value from
//! [`GatewayConfig::default`]. Durations are written Go-style (`500ms`,
//! `5s`, `1m30s`).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use wrp_gateway_auth::{
    Acquirer, AuthChain, BasicTokenFactory, BearerTokenFactory, CapabilityChecker, CheckMode,
    EndpointBuckets, HttpKeyResolver, Leeway, RemoteBearerOptions,
};
use wrp_gateway_client::TimeoutPolicy;
use wrp_gateway_core::{parse_duration, MetricsSink};

use crate::error::ConfigError;

/// Timeout for fetching JWT verification keys.
const KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the gateway service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:6100").
    pub listen_addr: String,

    /// Device services requests may be translated for.
    pub supported_services: Vec<String>,

    /// Base URL of the device cluster.
    #[serde(rename = "targetURL")]
    pub target_url: String,

    /// TCP connect timeout for outbound calls.
    #[serde(deserialize_with = "go_duration")]
    pub net_dialer_timeout: Duration,

    /// Per-attempt HTTP client timeout.
    #[serde(deserialize_with = "go_duration")]
    pub client_timeout: Duration,

    /// Wait budget for one outbound transaction, retries included.
    #[serde(deserialize_with = "go_duration")]
    pub resp_wait_timeout: Duration,

    /// Pause between outbound attempts.
    #[serde(deserialize_with = "go_duration")]
    pub request_retry_interval: Duration,

    /// Retries after the first outbound attempt.
    pub request_max_retries: u32,

    /// WRP source locator stamped on every message.
    #[serde(rename = "WRPSource")]
    pub wrp_source: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Logging settings.
    pub log: LogConfig,

    /// Base64 `user:pass` entries accepted as Basic credentials.
    pub auth_header: Vec<String>,

    /// Bearer JWT validation; absent disables Bearer.
    pub jwt_validator: Option<JwtValidatorConfig>,

    /// Capability enforcement for Bearer principals.
    pub capability_check: Option<CapabilityCheckConfig>,

    /// Credentials for calls to the device cluster.
    pub auth_acquirer: Option<AcquirerConfig>,

    /// Remote webhook store; absent disables webhook endpoints.
    pub webhook_store: Option<WebhookStoreConfig>,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Downstream status codes whose transaction log is emitted at debug.
    pub reduced_logging_response_codes: Vec<u16>,
}

/// Bearer JWT validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwtValidatorConfig {
    /// Verification key source.
    pub keys: KeysConfig,
    /// Clock skew tolerated on time claims.
    pub leeway: LeewayConfig,
}

/// Verification key source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeysConfig {
    /// Key URI; may contain `{keyId}`.
    pub uri: String,
    /// How long fetched keys are trusted.
    #[serde(deserialize_with = "go_duration")]
    pub update_interval: Duration,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            update_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Leeway in seconds per time claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LeewayConfig {
    /// Tolerance past `exp`.
    pub exp: u64,
    /// Tolerance before `nbf`.
    pub nbf: u64,
    /// Tolerance before `iat`.
    pub iat: u64,
}

impl From<LeewayConfig> for Leeway {
    fn from(config: LeewayConfig) -> Self {
        Self {
            exp: config.exp,
            nbf: config.nbf,
            iat: config.iat,
        }
    }
}

/// Capability enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CapabilityCheckConfig {
    /// `enforce` or `monitor`.
    #[serde(rename = "type")]
    pub mode: String,
    /// Regex every capability must start with.
    pub prefix: String,
    /// Method token granting every method.
    pub accept_all_method: String,
    /// Endpoint regexes used as metric labels.
    pub endpoint_buckets: Vec<String>,
}

impl Default for CapabilityCheckConfig {
    fn default() -> Self {
        Self {
            mode: String::new(),
            prefix: String::new(),
            accept_all_method: "all".to_string(),
            endpoint_buckets: Vec::new(),
        }
    }
}

impl CapabilityCheckConfig {
    /// Build the checker and mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode is unknown or the prefix is not a valid regex.
    pub fn build(&self) -> Result<(CapabilityChecker, CheckMode), ConfigError> {
        let mode = CheckMode::parse(&self.mode).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "capabilityCheck.type must be enforce or monitor, got {:?}",
                self.mode
            ))
        })?;
        let checker = CapabilityChecker::new(&self.prefix, self.accept_all_method.clone())?;
        Ok((checker, mode))
    }
}

/// Outbound credentials: a remote JWT issuer, or a fixed Basic value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AcquirerConfig {
    /// Remote JWT issuer; preferred when complete.
    pub jwt: Option<RemoteBearerConfig>,
    /// Fixed Basic credential.
    pub basic: String,
}

impl AcquirerConfig {
    /// Build the acquirer.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a complete JWT section nor a Basic value is set.
    pub fn build(&self) -> Result<Acquirer, ConfigError> {
        let jwt = self.jwt.as_ref().map(RemoteBearerConfig::options);
        Ok(Acquirer::from_options(jwt, Some(self.basic.as_str()))?)
    }
}

/// Remote JWT issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteBearerConfig {
    /// Token endpoint.
    #[serde(rename = "authURL")]
    pub auth_url: String,
    /// Token request timeout.
    #[serde(deserialize_with = "go_duration")]
    pub timeout: Duration,
    /// Refresh this long before expiry.
    #[serde(deserialize_with = "go_duration")]
    pub buffer: Duration,
    /// Extra headers sent with the token request.
    pub request_headers: BTreeMap<String, String>,
}

impl RemoteBearerConfig {
    fn options(&self) -> RemoteBearerOptions {
        RemoteBearerOptions {
            auth_url: self.auth_url.clone(),
            timeout: self.timeout,
            buffer: self.buffer,
            request_headers: self.request_headers.clone(),
        }
    }
}

/// Remote webhook store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookStoreConfig {
    /// Store base URL.
    pub address: String,
    /// Bucket holding registrations.
    pub bucket: String,
    /// Interval between pulls; zero pulls only at startup.
    #[serde(deserialize_with = "go_duration")]
    pub pull_interval: Duration,
    /// Timeout of one store call.
    #[serde(deserialize_with = "go_duration")]
    pub timeout: Duration,
    /// Credentials for store calls.
    pub auth: Option<AcquirerConfig>,
}

impl Default for WebhookStoreConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            bucket: "webhooks".to_string(),
            pull_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            auth: None,
        }
    }
}

impl WebhookStoreConfig {
    /// The policy for store calls: the gateway's retry settings bounded by
    /// the store timeout.
    #[must_use]
    pub fn policy(&self, base: &TimeoutPolicy) -> TimeoutPolicy {
        TimeoutPolicy {
            client_timeout: self.timeout,
            request_timeout: self.timeout,
            ..*base
        }
    }
}

impl GatewayConfig {
    /// Parse a YAML document. An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not valid.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_slice(bytes)?)
    }

    /// Load from `path`, or use the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&bytes)
    }

    /// Apply command line and environment overrides.
    #[must_use]
    pub fn with_overrides(mut self, listen_addr: Option<String>, target_url: Option<String>) -> Self {
        if let Some(addr) = listen_addr {
            self.listen_addr = addr;
        }
        if let Some(url) = target_url {
            self.target_url = url;
        }
        self
    }

    /// The outbound timeout and retry settings.
    #[must_use]
    pub const fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            client_timeout: self.client_timeout,
            dial_timeout: self.net_dialer_timeout,
            request_timeout: self.resp_wait_timeout,
            retry_interval: self.request_retry_interval,
            max_retries: self.request_max_retries,
        }
    }

    /// Check the configuration and return the outbound policy.
    ///
    /// # Errors
    ///
    /// Returns the first problem found. Any error is fatal at startup.
    pub fn validate(&self) -> Result<TimeoutPolicy, ConfigError> {
        let policy = self.timeout_policy();
        policy.validate()?;

        if !(self.target_url.starts_with("http://") || self.target_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "targetURL must be an http(s) URL, got {:?}",
                self.target_url
            )));
        }
        if let Some(service) = self
            .supported_services
            .iter()
            .find(|s| s.is_empty() || s.contains('/'))
        {
            return Err(ConfigError::Invalid(format!(
                "invalid supported service {service:?}"
            )));
        }
        if self.wrp_source.is_empty() {
            return Err(ConfigError::Invalid("WRPSource must not be empty".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "maxBodyBytes must be greater than zero".to_string(),
            ));
        }

        if let Some(check) = &self.capability_check {
            check.build()?;
        }
        if let Some(jwt) = &self.jwt_validator {
            if jwt.keys.uri.is_empty() {
                return Err(ConfigError::Invalid(
                    "jwtValidator.keys.uri must not be empty".to_string(),
                ));
            }
        }
        if let Some(acquirer) = &self.auth_acquirer {
            acquirer.build()?;
        }
        if let Some(store) = &self.webhook_store {
            if store.address.is_empty() {
                return Err(ConfigError::Invalid(
                    "webhookStore.address must not be empty".to_string(),
                ));
            }
            if let Some(auth) = &store.auth {
                auth.build()?;
            }
            store.policy(&policy).validate()?;
        }

        if self.auth_header.is_empty() && self.jwt_validator.is_none() {
            tracing::warn!("No authHeader or jwtValidator configured; API requests will be rejected");
        }
        Ok(policy)
    }

    /// Build the inbound authentication chain.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured section cannot be built.
    pub fn auth_chain(&self, metrics: Arc<dyn MetricsSink>) -> Result<AuthChain, ConfigError> {
        let mut builder = AuthChain::builder()
            .metrics(metrics)
            .basic(BasicTokenFactory::from_encoded(&self.auth_header));

        if let Some(jwt) = &self.jwt_validator {
            let resolver = HttpKeyResolver::new(
                jwt.keys.uri.clone(),
                jwt.keys.update_interval,
                KEY_FETCH_TIMEOUT,
            )?;
            builder = builder
                .bearer(BearerTokenFactory::new(Arc::new(resolver)).with_leeway(jwt.leeway.into()));
        }

        if let Some(check) = &self.capability_check {
            let (checker, mode) = check.build()?;
            builder = builder
                .capability_check(checker, mode)
                .endpoint_buckets(EndpointBuckets::new(&check.endpoint_buckets));
        }

        Ok(builder.build())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let policy = TimeoutPolicy::default();
        Self {
            listen_addr: "0.0.0.0:6100".to_string(),
            supported_services: Vec::new(),
            target_url: "http://localhost:6000".to_string(),
            net_dialer_timeout: policy.dial_timeout,
            client_timeout: policy.client_timeout,
            resp_wait_timeout: policy.request_timeout,
            request_retry_interval: policy.retry_interval,
            request_max_retries: policy.max_retries,
            wrp_source: "dns:localhost".to_string(),
            max_body_bytes: 1024 * 1024, // 1 MiB
            log: LogConfig::default(),
            auth_header: Vec::new(),
            jwt_validator: None,
            capability_check: None,
            auth_acquirer: None,
            webhook_store: None,
        }
    }
}

/// Accept a Go-style duration string, or a bare integer of seconds.
fn go_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
    }
}
