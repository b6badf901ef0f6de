//! The inbound authentication chain.

use std::sync::Arc;

use wrp_gateway_core::{MetricsSink, NoopSink};

use crate::basic::BasicTokenFactory;
use crate::bearer::BearerTokenFactory;
use crate::capability::{CapabilityChecker, CapabilityRule, CheckMode};
use crate::error::{AuthError, Result};
use crate::listener::{EndpointBuckets, MetricListener};
use crate::principal::{Principal, Scheme};
use crate::rules::{RequestInfo, Rule};

/// Path prefix removed before capability and bucket matching.
pub const DEFAULT_API_PREFIX: &str = "/api/v2/";

/// Turns an `Authorization` header into an authorized [`Principal`].
///
/// Stages run in order and the first failure short-circuits:
/// token factory by scheme, the scheme's rules (including the optional
/// capability check for Bearer), then the metrics listener.
pub struct AuthChain {
    basic: Option<BasicTokenFactory>,
    bearer: Option<BearerTokenFactory>,
    basic_rules: Vec<Rule>,
    bearer_rules: Vec<Rule>,
    listener: MetricListener,
    api_prefix: String,
}

impl AuthChain {
    /// Start building a chain.
    #[must_use]
    pub fn builder() -> AuthChainBuilder {
        AuthChainBuilder::default()
    }

    /// Returns `true` if at least one scheme is configured.
    #[must_use]
    pub const fn has_factories(&self) -> bool {
        self.basic.is_some() || self.bearer.is_some()
    }

    /// Authenticate and authorize a request.
    ///
    /// `path` is the full request path; the API prefix is removed before
    /// rules see it.
    ///
    /// # Errors
    ///
    /// Returns an error whose [`AuthError::http_status_code`] is 401 for
    /// authentication failures and 403 for enforced capability failures.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        method: &str,
        path: &str,
    ) -> Result<Principal> {
        let request = RequestInfo {
            method,
            path: self.relative_path(path),
        };

        let (scheme, result) = match split_header(authorization) {
            Ok((scheme, credentials)) => (
                Some(scheme),
                self.authenticate_scheme(scheme, credentials, &request).await,
            ),
            Err(e) => (None, Err(e)),
        };

        match &result {
            Ok(principal) => {
                tracing::debug!(
                    scheme = %principal.scheme,
                    subject = %principal.subject,
                    "Request authenticated"
                );
                self.listener.on_accepted(principal.scheme, request.path);
            }
            Err(e) => {
                tracing::info!(
                    scheme = scheme.map_or("none", Scheme::as_str),
                    reason = e.reason(),
                    error = %e,
                    "Request rejected"
                );
                self.listener.on_rejected(scheme, e, request.path);
            }
        }

        result
    }

    async fn authenticate_scheme(
        &self,
        scheme: Scheme,
        credentials: &str,
        request: &RequestInfo<'_>,
    ) -> Result<Principal> {
        let (principal, rules) = match scheme {
            Scheme::Basic => {
                let factory = self
                    .basic
                    .as_ref()
                    .ok_or_else(|| AuthError::UnsupportedScheme(scheme.to_string()))?;
                (factory.parse(credentials)?, &self.basic_rules)
            }
            Scheme::Bearer => {
                let factory = self
                    .bearer
                    .as_ref()
                    .ok_or_else(|| AuthError::UnsupportedScheme(scheme.to_string()))?;
                (factory.parse(credentials).await?, &self.bearer_rules)
            }
        };

        for rule in rules {
            rule.check(&principal, request)?;
        }
        Ok(principal)
    }

    fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.api_prefix.as_str()).unwrap_or(path)
    }
}

fn split_header(authorization: Option<&str>) -> Result<(Scheme, &str)> {
    let header = authorization.ok_or(AuthError::MissingHeader)?;
    let (scheme, credentials) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::MalformedHeader("expected '<scheme> <credentials>'".to_string()))?;
    let scheme =
        Scheme::from_header(scheme).ok_or_else(|| AuthError::UnsupportedScheme(scheme.to_string()))?;
    let credentials = credentials.trim();
    if credentials.is_empty() {
        return Err(AuthError::MalformedHeader("empty credentials".to_string()));
    }
    Ok((scheme, credentials))
}

/// Builder for [`AuthChain`].
pub struct AuthChainBuilder {
    basic: Option<BasicTokenFactory>,
    bearer: Option<BearerTokenFactory>,
    capability: Option<(CapabilityChecker, CheckMode)>,
    buckets: EndpointBuckets,
    sink: Arc<dyn MetricsSink>,
    api_prefix: String,
}

impl Default for AuthChainBuilder {
    fn default() -> Self {
        Self {
            basic: None,
            bearer: None,
            capability: None,
            buckets: EndpointBuckets::default(),
            sink: Arc::new(NoopSink),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

impl AuthChainBuilder {
    /// Accept Basic credentials. An empty allow-list leaves Basic unconfigured.
    #[must_use]
    pub fn basic(mut self, factory: BasicTokenFactory) -> Self {
        self.basic = (!factory.is_empty()).then_some(factory);
        self
    }

    /// Accept Bearer JWTs.
    #[must_use]
    pub fn bearer(mut self, factory: BearerTokenFactory) -> Self {
        self.bearer = Some(factory);
        self
    }

    /// Add the capability check to the Bearer rules.
    #[must_use]
    pub fn capability_check(mut self, checker: CapabilityChecker, mode: CheckMode) -> Self {
        self.capability = Some((checker, mode));
        self
    }

    /// Endpoint buckets for metric labels.
    #[must_use]
    pub fn endpoint_buckets(mut self, buckets: EndpointBuckets) -> Self {
        self.buckets = buckets;
        self
    }

    /// Where validation and capability outcomes are reported.
    #[must_use]
    pub fn metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Path prefix removed before matching.
    #[must_use]
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Build the chain.
    #[must_use]
    pub fn build(self) -> AuthChain {
        let mut bearer_rules = Rule::bearer_defaults();
        if let Some((checker, mode)) = self.capability {
            bearer_rules.push(Rule::Capability(CapabilityRule::new(
                checker,
                mode,
                self.buckets.clone(),
                Arc::clone(&self.sink),
            )));
        }

        AuthChain {
            basic: self.basic,
            bearer: self.bearer,
            basic_rules: vec![Rule::AllowAll],
            bearer_rules,
            listener: MetricListener::new(self.sink, self.buckets),
            api_prefix: self.api_prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bearer::tests::{factory as bearer_factory, mint};
    use crate::capability::CAPABILITY_METRIC;
    use crate::listener::VALIDATION_METRIC;
    use wrp_gateway_core::MemorySink;

    const STAT_CAPABILITY: &str = "x1:issuer/device/.*/stat:all";

    fn chain(mode: Option<CheckMode>, sink: Arc<MemorySink>) -> AuthChain {
        let mut builder = AuthChain::builder()
            .basic(BasicTokenFactory::from_encoded(&["dXNlcjpwYXNz"]))
            .bearer(bearer_factory())
            .endpoint_buckets(EndpointBuckets::new(&["device/.*/stat", "device/.*"]))
            .metrics(sink);
        if let Some(mode) = mode {
            builder = builder.capability_check(CapabilityChecker::new("x1:issuer/", "all").unwrap(), mode);
        }
        builder.build()
    }

    fn bearer_header(capabilities: &[&str]) -> String {
        let token = mint(
            Some("current"),
            &serde_json::json!({
                "sub": "client-1",
                "exp": chrono::Utc::now().timestamp() + 300,
                "capabilities": capabilities,
            }),
        );
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn basic_principal_passes_capability_stage() {
        let sink = Arc::new(MemorySink::new());
        let chain = chain(Some(CheckMode::Enforce), sink.clone());

        let principal = chain
            .authenticate(Some("Basic dXNlcjpwYXNz"), "POST", "/api/v2/device/123/config")
            .await
            .unwrap();
        assert_eq!(principal.scheme, Scheme::Basic);
        assert_eq!(sink.count(CAPABILITY_METRIC, &[]), 0);
        assert_eq!(
            sink.count(VALIDATION_METRIC, &[("outcome", "accepted"), ("scheme", "basic")]),
            1
        );
    }

    #[tokio::test]
    async fn stat_capability_allows_stat_in_enforce_mode() {
        let chain = chain(Some(CheckMode::Enforce), Arc::new(MemorySink::new()));
        let principal = chain
            .authenticate(
                Some(&bearer_header(&[STAT_CAPABILITY])),
                "GET",
                "/api/v2/device/123/stat",
            )
            .await
            .unwrap();
        assert_eq!(principal.subject, "client-1");
    }

    #[tokio::test]
    async fn stat_capability_denies_config_in_enforce_mode() {
        let sink = Arc::new(MemorySink::new());
        let chain = chain(Some(CheckMode::Enforce), sink.clone());
        let err = chain
            .authenticate(
                Some(&bearer_header(&[STAT_CAPABILITY])),
                "POST",
                "/api/v2/device/123/config",
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(
            sink.count(
                VALIDATION_METRIC,
                &[
                    ("outcome", "rejected"),
                    ("reason", "capability_denied"),
                    ("endpoint", "device/.*")
                ]
            ),
            1
        );
    }

    #[tokio::test]
    async fn stat_capability_mismatch_is_recorded_in_monitor_mode() {
        let sink = Arc::new(MemorySink::new());
        let chain = chain(Some(CheckMode::Monitor), sink.clone());
        let principal = chain
            .authenticate(
                Some(&bearer_header(&[STAT_CAPABILITY])),
                "POST",
                "/api/v2/device/123/config",
            )
            .await
            .unwrap();
        assert_eq!(principal.scheme, Scheme::Bearer);
        assert_eq!(
            sink.count(CAPABILITY_METRIC, &[("outcome", "rejected"), ("mode", "monitor")]),
            1
        );
    }

    #[tokio::test]
    async fn no_capability_check_when_unconfigured() {
        let chain = chain(None, Arc::new(MemorySink::new()));
        assert!(chain
            .authenticate(Some(&bearer_header(&[])), "DELETE", "/api/v2/device/1/config")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn header_failures_are_401() {
        let chain = chain(None, Arc::new(MemorySink::new()));
        for header in [None, Some("Basic"), Some("Digest abc"), Some("Basic d3Jvbmc6cGFzcw==")] {
            let err = chain
                .authenticate(header, "GET", "/api/v2/hooks")
                .await
                .unwrap_err();
            assert_eq!(err.http_status_code(), 401, "header {header:?}");
        }
    }

    #[tokio::test]
    async fn unconfigured_scheme_is_unsupported() {
        let chain = AuthChain::builder()
            .basic(BasicTokenFactory::from_encoded(&["dXNlcjpwYXNz"]))
            .build();
        let err = chain
            .authenticate(Some(&bearer_header(&[])), "GET", "/api/v2/hooks")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn empty_basic_allow_list_disables_basic() {
        let chain = AuthChain::builder()
            .basic(BasicTokenFactory::from_encoded::<&str>(&[]))
            .build();
        assert!(!chain.has_factories());
    }
}
