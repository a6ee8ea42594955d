// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Operator-keyed metrics publication (§4.5).
//!
//! Grounded on the teacher's `otap_df_telemetry::reporter::MetricsReporter` /
//! `MetricSet` pattern: a cheaply-cloneable reporter handed to every
//! operator instance through the control plane, backed by a process-wide
//! `prometheus::Registry`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Identifies a metric family: the operator that reports it, its index
/// within the pipeline (for disambiguating repeated plugin names), and a
/// schema name describing the metric's shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricSchema {
    pub operator_name: String,
    pub operator_index: usize,
    pub metric_name: String,
}

impl MetricSchema {
    #[must_use]
    pub fn new(operator_name: impl Into<String>, operator_index: usize, metric_name: impl Into<String>) -> Self {
        Self {
            operator_name: operator_name.into(),
            operator_index,
            metric_name: metric_name.into(),
        }
    }

    fn prometheus_name(&self) -> String {
        format!("{}_{}_{}", self.operator_name, self.operator_index, self.metric_name)
            .replace(['-', '.'], "_")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to register metric `{0}`: {1}")]
    Registration(String, #[source] prometheus::Error),
}

#[derive(Default)]
struct Registry_ {
    registry: Registry,
    counters: HashMap<MetricSchema, IntCounter>,
    gauges: HashMap<MetricSchema, IntGauge>,
}

/// Process-wide (or test-scoped) metric registry. Construct one per
/// pipeline run via `MetricsReporter::new`.
#[derive(Clone, Default)]
pub struct MetricsReporter {
    inner: Arc<Mutex<Registry_>>,
}

impl MetricsReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments (creating on first use) a monotonic counter for this
    /// `(operator_name, operator_index, metric_schema)` key (§4.5).
    pub fn incr_counter(&self, schema: &MetricSchema, delta: u64) -> Result<(), TelemetryError> {
        let mut inner = self.inner.lock();
        if !inner.counters.contains_key(schema) {
            let counter = IntCounter::with_opts(Opts::new(schema.prometheus_name(), "tenzir operator counter"))
                .map_err(|e| TelemetryError::Registration(schema.prometheus_name(), e))?;
            inner
                .registry
                .register(Box::new(counter.clone()))
                .map_err(|e| TelemetryError::Registration(schema.prometheus_name(), e))?;
            inner.counters.insert(schema.clone(), counter);
        }
        inner.counters[schema].inc_by(delta);
        Ok(())
    }

    /// Sets a point-in-time gauge for this key.
    pub fn set_gauge(&self, schema: &MetricSchema, value: i64) -> Result<(), TelemetryError> {
        let mut inner = self.inner.lock();
        if !inner.gauges.contains_key(schema) {
            let gauge = IntGauge::with_opts(Opts::new(schema.prometheus_name(), "tenzir operator gauge"))
                .map_err(|e| TelemetryError::Registration(schema.prometheus_name(), e))?;
            inner
                .registry
                .register(Box::new(gauge.clone()))
                .map_err(|e| TelemetryError::Registration(schema.prometheus_name(), e))?;
            inner.gauges.insert(schema.clone(), gauge);
        }
        inner.gauges[schema].set(value);
        Ok(())
    }

    #[must_use]
    pub fn counter_value(&self, schema: &MetricSchema) -> Option<u64> {
        self.inner.lock().counters.get(schema).map(|c| c.get())
    }

    #[must_use]
    pub fn gauge_value(&self, schema: &MetricSchema) -> Option<i64> {
        self.inner.lock().gauges.get(schema).map(|g| g.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_per_key() {
        let reporter = MetricsReporter::new();
        let schema = MetricSchema::new("where", 2, "rows_dropped");
        reporter.incr_counter(&schema, 3).unwrap();
        reporter.incr_counter(&schema, 4).unwrap();
        assert_eq!(reporter.counter_value(&schema), Some(7));
    }

    #[test]
    fn different_operator_indices_are_distinct_keys() {
        let reporter = MetricsReporter::new();
        let a = MetricSchema::new("where", 0, "rows_dropped");
        let b = MetricSchema::new("where", 1, "rows_dropped");
        reporter.incr_counter(&a, 1).unwrap();
        assert_eq!(reporter.counter_value(&a), Some(1));
        assert_eq!(reporter.counter_value(&b), None);
    }
}
