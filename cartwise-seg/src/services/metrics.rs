//! Metrics sink collaborator
//!
//! Best-effort telemetry: recording never blocks or fails the main
//! segmentation path.

/// Best-effort metrics recorder.
pub trait MetricsSink: Send + Sync {
    /// Record a single measurement with unit and dimension tags.
    fn record(&self, name: &str, value: f64, unit: &str, tags: &[(&str, &str)]);
}

/// Sink that emits measurements as structured log lines.
#[derive(Debug, Default, Clone)]
pub struct TracingMetricsSink;

impl TracingMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsSink for TracingMetricsSink {
    fn record(&self, name: &str, value: f64, unit: &str, tags: &[(&str, &str)]) {
        tracing::info!(
            metric = name,
            value,
            unit,
            tags = ?tags,
            "metric recorded"
        );
    }
}

/// Sink that discards all measurements.
#[derive(Debug, Default, Clone)]
pub struct NullMetricsSink;

impl NullMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsSink for NullMetricsSink {
    fn record(&self, _name: &str, _value: f64, _unit: &str, _tags: &[(&str, &str)]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sinks_accept_measurements() {
        let tags = [("depth", "detailed")];
        TracingMetricsSink::new().record("segmentation.duration", 12.5, "ms", &tags);
        NullMetricsSink::new().record("segmentation.duration", 12.5, "ms", &tags);
    }
}
