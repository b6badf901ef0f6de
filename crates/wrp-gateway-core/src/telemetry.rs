//! Metrics sink abstraction.
//!
//! Components never talk to a metrics registry directly. They are handed an
//! `Arc<dyn MetricsSink>` at construction and report through it, so the
//! recorder can be swapped (or silenced) without touching business logic.

/// Label set attached to one observation.
pub type Labels<'a> = &'a [(&'static str, &'a str)];

/// Destination for counters, histograms and gauges.
pub trait MetricsSink: Send + Sync {
    /// Increment a counter by one.
    fn increment(&self, name: &'static str, labels: Labels<'_>);

    /// Record a histogram observation.
    fn observe(&self, name: &'static str, value: f64, labels: Labels<'_>);

    /// Set a gauge to an absolute value.
    fn gauge(&self, name: &'static str, value: f64, labels: Labels<'_>);
}

/// Sink backed by the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderSink;

fn to_labels(labels: Labels<'_>) -> Vec<metrics::Label> {
    labels
        .iter()
        .map(|(key, value)| metrics::Label::new(*key, (*value).to_string()))
        .collect()
}

impl MetricsSink for RecorderSink {
    fn increment(&self, name: &'static str, labels: Labels<'_>) {
        metrics::counter!(name, to_labels(labels)).increment(1);
    }

    fn observe(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        metrics::histogram!(name, to_labels(labels)).record(value);
    }

    fn gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        metrics::gauge!(name, to_labels(labels)).set(value);
    }
}

/// Sink that drops every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment(&self, _name: &'static str, _labels: Labels<'_>) {}

    fn observe(&self, _name: &'static str, _value: f64, _labels: Labels<'_>) {}

    fn gauge(&self, _name: &'static str, _value: f64, _labels: Labels<'_>) {}
}

/// One recorded observation, kept by [`MemorySink`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Metric name.
    pub name: &'static str,
    /// Value (1.0 for counter increments).
    pub value: f64,
    /// Labels as owned pairs.
    pub labels: Vec<(&'static str, String)>,
}

#[cfg(any(test, feature = "test-utils"))]
impl Observation {
    /// Return the value of a label, if present.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// In-memory sink for assertions in tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MemorySink {
    observations: parking_lot::Mutex<Vec<Observation>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All observations recorded under `name`, in order.
    #[must_use]
    pub fn observations(&self, name: &str) -> Vec<Observation> {
        self.observations
            .lock()
            .iter()
            .filter(|o| o.name == name)
            .cloned()
            .collect()
    }

    /// Number of observations under `name` whose labels include every pair in `labels`.
    #[must_use]
    pub fn count(&self, name: &str, labels: &[(&str, &str)]) -> usize {
        self.observations(name)
            .iter()
            .filter(|o| labels.iter().all(|(k, v)| o.label(k) == Some(*v)))
            .count()
    }

    fn push(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        self.observations.lock().push(Observation {
            name,
            value,
            labels: labels.iter().map(|(k, v)| (*k, (*v).to_string())).collect(),
        });
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MetricsSink for MemorySink {
    fn increment(&self, name: &'static str, labels: Labels<'_>) {
        self.push(name, 1.0, labels);
    }

    fn observe(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        self.push(name, value, labels);
    }

    fn gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        self.push(name, value, labels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_counts_by_label() {
        let sink = MemorySink::new();
        sink.increment("requests", &[("outcome", "accepted"), ("scheme", "basic")]);
        sink.increment("requests", &[("outcome", "rejected"), ("scheme", "basic")]);
        sink.observe("latency", 0.5, &[]);

        assert_eq!(sink.count("requests", &[]), 2);
        assert_eq!(sink.count("requests", &[("outcome", "accepted")]), 1);
        assert_eq!(sink.count("requests", &[("scheme", "bearer")]), 0);
        assert_eq!(sink.observations("latency")[0].value, 0.5);
    }

    #[test]
    fn recorder_and_noop_sinks_accept_observations() {
        // Without an installed recorder these are no-ops; they must not panic.
        RecorderSink.increment("requests", &[("outcome", "accepted")]);
        RecorderSink.observe("latency", 1.0, &[]);
        RecorderSink.gauge("size", 3.0, &[]);
        NoopSink.increment("requests", &[]);
    }
}
