//! Authentication metrics.

use std::sync::Arc;

use regex::Regex;
use wrp_gateway_core::MetricsSink;

use crate::error::AuthError;
use crate::principal::Scheme;

/// Counter of authentication outcomes.
pub const VALIDATION_METRIC: &str = "auth_validation_total";

/// Bucket label for paths matching no configured endpoint.
pub const NOT_RECOGNIZED: &str = "not_recognized";

/// Groups request paths into a bounded set of metric labels.
///
/// A path falls into the first pattern that matches it; the label is the
/// pattern source.
#[derive(Debug, Clone, Default)]
pub struct EndpointBuckets {
    patterns: Vec<Regex>,
}

impl EndpointBuckets {
    /// Compile `patterns`, logging and skipping any that are invalid.
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p.as_ref()) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!(regex = p.as_ref(), error = %e, "Failed to compile endpoint bucket");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// The bucket label for `path`.
    #[must_use]
    pub fn bucket(&self, path: &str) -> &str {
        self.patterns
            .iter()
            .find(|re| re.is_match(path))
            .map_or(NOT_RECOGNIZED, Regex::as_str)
    }

    /// Number of usable patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Records the final outcome of each authentication attempt.
#[derive(Clone)]
pub struct MetricListener {
    sink: Arc<dyn MetricsSink>,
    buckets: EndpointBuckets,
}

impl MetricListener {
    /// Create a listener reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn MetricsSink>, buckets: EndpointBuckets) -> Self {
        Self { sink, buckets }
    }

    /// The configured endpoint buckets.
    #[must_use]
    pub const fn buckets(&self) -> &EndpointBuckets {
        &self.buckets
    }

    /// A request passed every stage.
    pub fn on_accepted(&self, scheme: Scheme, path: &str) {
        self.sink.increment(
            VALIDATION_METRIC,
            &[
                ("outcome", "accepted"),
                ("scheme", scheme.as_str()),
                ("reason", "none"),
                ("endpoint", self.buckets.bucket(path)),
            ],
        );
    }

    /// A request was rejected.
    pub fn on_rejected(&self, scheme: Option<Scheme>, err: &AuthError, path: &str) {
        self.sink.increment(
            VALIDATION_METRIC,
            &[
                ("outcome", "rejected"),
                ("scheme", scheme.map_or("none", Scheme::as_str)),
                ("reason", err.reason()),
                ("endpoint", self.buckets.bucket(path)),
            ],
        );
    }
}
