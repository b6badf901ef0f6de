//! Capability checking.
//!
//! A capability has the form `{prefix}{endpoint}:{method}`. It grants a
//! request when the prefix matches, the endpoint pattern matches the start
//! of the request path (relative to the API base), and the method equals
//! the request method or the configured catch-all token.

use std::sync::Arc;

use regex::Regex;
use wrp_gateway_core::MetricsSink;

use crate::error::{AuthError, Result};
use crate::listener::EndpointBuckets;
use crate::principal::Principal;
use crate::rules::RequestInfo;

/// Counter of capability check outcomes.
pub const CAPABILITY_METRIC: &str = "auth_capability_check_total";

/// What happens when no capability grants a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Reject with 403.
    Enforce,
    /// Log and record, then allow.
    Monitor,
}

impl CheckMode {
    /// Parse a configured mode; anything else disables the check.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enforce" => Some(Self::Enforce),
            "monitor" => Some(Self::Monitor),
            _ => None,
        }
    }

    /// Mode name, also used as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enforce => "enforce",
            Self::Monitor => "monitor",
        }
    }
}

/// Why a principal's capabilities did not grant a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// The principal carries no capabilities at all.
    NoCapabilities,
    /// None of the capabilities matched.
    NoMatch,
}

impl Mismatch {
    /// Label for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoCapabilities => "no_capabilities",
            Self::NoMatch => "no_capability_match",
        }
    }
}

/// Matches capability strings against requests.
#[derive(Debug, Clone)]
pub struct CapabilityChecker {
    matcher: Regex,
    accept_all_method: String,
}

impl CapabilityChecker {
    /// Create a checker for capabilities starting with the `prefix` pattern.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if `prefix` is not a valid regex.
    pub fn new(prefix: &str, accept_all_method: impl Into<String>) -> Result<Self> {
        let matcher = Regex::new(&format!("^{prefix}(.+):(.+?)$"))
            .map_err(|e| AuthError::InvalidConfig(format!("invalid capability prefix: {e}")))?;
        Ok(Self {
            matcher,
            accept_all_method: accept_all_method.into(),
        })
    }

    /// Returns `true` if `capability` grants `method` on `path`.
    #[must_use]
    pub fn authorizes(&self, capability: &str, path: &str, method: &str) -> bool {
        let Some(caps) = self.matcher.captures(capability) else {
            return false;
        };
        let (Some(endpoint), Some(cap_method)) = (caps.get(1), caps.get(2)) else {
            return false;
        };

        let cap_method = cap_method.as_str();
        if cap_method != self.accept_all_method && !cap_method.eq_ignore_ascii_case(method) {
            return false;
        }

        match Regex::new(endpoint.as_str()) {
            Ok(re) => re.find(path).is_some_and(|m| m.start() == 0),
            Err(_) => false,
        }
    }

    /// Check whether any of `capabilities` grants the request.
    ///
    /// # Errors
    ///
    /// Returns the [`Mismatch`] reason if none does.
    pub fn check(&self, capabilities: &[String], path: &str, method: &str) -> std::result::Result<(), Mismatch> {
        if capabilities.is_empty() {
            return Err(Mismatch::NoCapabilities);
        }
        if capabilities
            .iter()
            .any(|c| self.authorizes(c, path, method))
        {
            Ok(())
        } else {
            Err(Mismatch::NoMatch)
        }
    }
}

/// The capability stage of the Bearer rule set.
#[derive(Clone)]
pub struct CapabilityRule {
    checker: CapabilityChecker,
    mode: CheckMode,
    buckets: EndpointBuckets,
    sink: Arc<dyn MetricsSink>,
}

impl CapabilityRule {
    /// Create the rule.
    #[must_use]
    pub fn new(
        checker: CapabilityChecker,
        mode: CheckMode,
        buckets: EndpointBuckets,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            checker,
            mode,
            buckets,
            sink,
        }
    }

    /// The configured mode.
    #[must_use]
    pub const fn mode(&self) -> CheckMode {
        self.mode
    }

    /// Check `principal` against `request`, recording the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CapabilityDenied`] in enforce mode when no
    /// capability grants the request.
    pub fn evaluate(&self, principal: &Principal, request: &RequestInfo<'_>) -> Result<()> {
        let endpoint = self.buckets.bucket(request.path);
        let outcome = self
            .checker
            .check(&principal.capabilities, request.path, request.method);

        let Err(mismatch) = outcome else {
            self.sink.increment(
                CAPABILITY_METRIC,
                &[
                    ("outcome", "accepted"),
                    ("reason", "none"),
                    ("endpoint", endpoint),
                    ("mode", self.mode.as_str()),
                ],
            );
            return Ok(());
        };

        self.sink.increment(
            CAPABILITY_METRIC,
            &[
                ("outcome", "rejected"),
                ("reason", mismatch.as_str()),
                ("endpoint", endpoint),
                ("mode", self.mode.as_str()),
            ],
        );

        match self.mode {
            CheckMode::Enforce => {
                tracing::info!(
                    subject = %principal.subject,
                    method = request.method,
                    path = request.path,
                    reason = mismatch.as_str(),
                    "Capability check failed"
                );
                Err(AuthError::CapabilityDenied(mismatch.as_str().to_string()))
            }
            CheckMode::Monitor => {
                tracing::info!(
                    subject = %principal.subject,
                    method = request.method,
                    path = request.path,
                    reason = mismatch.as_str(),
                    "Capability check failed, allowing in monitor mode"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrp_gateway_core::MemorySink;

    fn checker() -> CapabilityChecker {
        CapabilityChecker::new("x1:issuer/", "all").unwrap()
    }

    #[test]
    fn all_three_parts_must_match() {
        let c = checker();
        let cap = "x1:issuer/device/.*/stat:get";

        assert!(c.authorizes(cap, "device/123/stat", "GET"));
        // method
        assert!(!c.authorizes(cap, "device/123/stat", "POST"));
        // endpoint
        assert!(!c.authorizes(cap, "device/123/config", "GET"));
        // prefix
        assert!(!c.authorizes("x2:issuer/device/.*/stat:get", "device/123/stat", "GET"));
    }

    #[test]
    fn endpoint_must_match_at_start() {
        let c = checker();
        assert!(!c.authorizes("x1:issuer/stat:all", "device/123/stat", "GET"));
        assert!(c.authorizes("x1:issuer/device:all", "device/123/stat", "GET"));
    }

    #[test]
    fn accept_all_method_matches_any_method() {
        let c = checker();
        for method in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            assert!(c.authorizes("x1:issuer/device/.*:all", "device/1/config", method));
        }
    }

    #[test]
    fn any_capability_suffices_regardless_of_order() {
        let c = checker();
        let good = "x1:issuer/device/.*/stat:all".to_string();
        let bad = "x1:issuer/hook:post".to_string();

        let forward = vec![good.clone(), bad.clone()];
        let backward = vec![bad, good];
        assert_eq!(c.check(&forward, "device/123/stat", "GET"), Ok(()));
        assert_eq!(c.check(&backward, "device/123/stat", "GET"), Ok(()));
    }

    #[test]
    fn empty_and_unmatched_capabilities() {
        let c = checker();
        assert_eq!(c.check(&[], "device/1/stat", "GET"), Err(Mismatch::NoCapabilities));
        assert_eq!(
            c.check(&["x1:issuer/hook:all".into()], "device/1/stat", "GET"),
            Err(Mismatch::NoMatch)
        );
    }

    #[test]
    fn invalid_endpoint_pattern_never_matches() {
        assert!(!checker().authorizes("x1:issuer/(:all", "(", "GET"));
    }

    #[test]
    fn invalid_prefix_is_config_error() {
        assert!(matches!(
            CapabilityChecker::new("(", "all"),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    fn rule(mode: CheckMode, sink: Arc<MemorySink>) -> CapabilityRule {
        CapabilityRule::new(checker(), mode, EndpointBuckets::new(&["device/.*/stat"]), sink)
    }

    #[test]
    fn enforce_rejects_and_monitor_allows_mismatch() {
        let principal = Principal::bearer("svc", vec!["x1:issuer/device/.*/stat:all".into()]);
        let request = RequestInfo {
            method: "POST",
            path: "device/123/config",
        };

        let sink = Arc::new(MemorySink::new());
        let err = rule(CheckMode::Enforce, sink.clone())
            .evaluate(&principal, &request)
            .unwrap_err();
        assert_eq!(err.http_status_code(), 403);

        assert!(rule(CheckMode::Monitor, sink.clone())
            .evaluate(&principal, &request)
            .is_ok());
        assert_eq!(
            sink.count(CAPABILITY_METRIC, &[("outcome", "rejected"), ("mode", "monitor")]),
            1
        );
    }

    #[test]
    fn accepted_check_is_recorded_with_bucket() {
        let sink = Arc::new(MemorySink::new());
        let principal = Principal::bearer("svc", vec!["x1:issuer/device/.*/stat:all".into()]);
        let request = RequestInfo {
            method: "GET",
            path: "device/123/stat",
        };
        rule(CheckMode::Enforce, sink.clone())
            .evaluate(&principal, &request)
            .unwrap();
        assert_eq!(
            sink.count(
                CAPABILITY_METRIC,
                &[("outcome", "accepted"), ("endpoint", "device/.*/stat")]
            ),
            1
        );
    }
}
