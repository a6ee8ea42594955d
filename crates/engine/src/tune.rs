// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The `tune` decorator: wraps an operator and overrides its scheduling
//! knobs without touching its data-path behavior. Grounded verbatim on
//! `tune.cpp`'s `tune_operator`, which forwards every `Operator` method to
//! the wrapped operator except `idle_after`/`demand`/`name`, each of which
//! it overrides only when the corresponding argument was supplied.

use std::time::Duration;

use tenzir_diagnostics::Diagnostic;

use crate::control::ControlPlane;
use crate::demand::DemandSettings;
use crate::element::ElementType;
use crate::error::{OperatorError, OperatorErrorKind};
use crate::operator::{BoxGenerator, Location, Operator, OperatorInput, OptimizeResult};
use crate::optimizer::{EventOrder, Filter};

/// The subset of `DemandSettings` fields `tune` may override, plus
/// `idle_after`. All fields optional: unset fields fall through to the
/// wrapped operator's own value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuneArgs {
    pub idle_after: Option<Duration>,
    pub min_demand_elements: Option<u64>,
    pub max_demand_elements: Option<u64>,
    pub max_demand_batches: Option<u64>,
    pub min_backoff: Option<Duration>,
    pub max_backoff: Option<Duration>,
    pub backoff_rate: Option<f64>,
    pub detached: Option<bool>,
}

/// Decorates an operator, overriding its demand/backoff/idle_after/
/// detached knobs. The wrapped operator's data-path behavior (type,
/// `instantiate`, `optimize`) passes through unchanged.
#[derive(Debug)]
pub struct TuneOperator {
    inner: Box<dyn Operator>,
    args: TuneArgs,
}

impl TuneOperator {
    #[must_use]
    pub fn new(inner: Box<dyn Operator>, args: TuneArgs) -> Self {
        Self { inner, args }
    }
}

impl Operator for TuneOperator {
    fn name(&self) -> &str {
        "_tune"
    }

    fn input_type(&self) -> ElementType {
        self.inner.input_type()
    }

    fn output_type(&self) -> ElementType {
        self.inner.output_type()
    }

    fn location(&self) -> Location {
        self.inner.location()
    }

    fn detached(&self) -> bool {
        self.args.detached.unwrap_or_else(|| self.inner.detached())
    }

    fn internal(&self) -> bool {
        self.inner.internal()
    }

    fn input_independent(&self) -> bool {
        self.inner.input_independent()
    }

    fn idle_after(&self) -> Duration {
        self.args.idle_after.unwrap_or_else(|| self.inner.idle_after())
    }

    fn demand(&self) -> DemandSettings {
        let mut result = self.inner.demand();
        if let Some(v) = self.args.min_demand_elements {
            result.min_elements = v;
        }
        if let Some(v) = self.args.max_demand_elements {
            result.max_elements = v;
        }
        if let Some(v) = self.args.max_demand_batches {
            result.max_batches = v;
        }
        if let Some(v) = self.args.min_backoff {
            result.min_backoff = v;
        }
        if let Some(v) = self.args.max_backoff {
            result.max_backoff = v;
        }
        if let Some(v) = self.args.backoff_rate {
            result.backoff_rate = v;
        }
        result
    }

    fn optimize(&self, filter: Filter, order: EventOrder) -> OptimizeResult {
        self.inner.optimize(filter, order)
    }

    fn instantiate(&self, input: OperatorInput, control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let settings = self.demand();
        settings.validate().map_err(|e| {
            OperatorError::new(
                self.name(),
                control.self_id().0,
                OperatorErrorKind::Configuration,
                format!("invalid `tune` settings: {e}"),
            )
        })?;
        if settings.rate_is_flat() && self.args.max_backoff.is_some() {
            control.emit(Diagnostic::warning(
                "`tune`: `backoff_rate` is 1.0 (flat), so `max_backoff` has no effect",
            ));
        }
        self.inner.instantiate(input, control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlPlaneContext, OperatorId};
    use crate::demand::DemandSettings;
    use futures::stream;
    use tenzir_telemetry::MetricsReporter;

    #[derive(Debug)]
    struct Stub;
    impl Operator for Stub {
        fn name(&self) -> &str {
            "stub"
        }
        fn input_type(&self) -> ElementType {
            ElementType::Events
        }
        fn output_type(&self) -> ElementType {
            ElementType::Events
        }
        fn idle_after(&self) -> Duration {
            Duration::from_secs(5)
        }
        fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
            Ok(Box::pin(stream::empty()))
        }
    }

    #[test]
    fn unset_fields_fall_through_to_inner() {
        let tuned = TuneOperator::new(Box::new(Stub), TuneArgs::default());
        assert_eq!(tuned.idle_after(), Duration::from_secs(5));
        assert_eq!(tuned.demand().min_elements, DemandSettings::default().min_elements);
    }

    #[test]
    fn set_fields_override_inner() {
        let args = TuneArgs {
            idle_after: Some(Duration::from_secs(1)),
            max_demand_elements: Some(10),
            ..Default::default()
        };
        let tuned = TuneOperator::new(Box::new(Stub), args);
        assert_eq!(tuned.idle_after(), Duration::from_secs(1));
        assert_eq!(tuned.demand().max_elements, 10);
    }

    #[test]
    fn name_is_always_tune() {
        let tuned = TuneOperator::new(Box::new(Stub), TuneArgs::default());
        assert_eq!(tuned.name(), "_tune");
    }

    #[test]
    fn data_path_passes_through_unchanged() {
        let (bus, _rx) = tenzir_diagnostics::bus_channel(4);
        let ctx = ControlPlaneContext::new(bus, MetricsReporter::new());
        let control = ctx.control_plane_for(OperatorId(0), "stub", 0);
        let tuned = TuneOperator::new(Box::new(Stub), TuneArgs::default());
        let _gen = tuned.instantiate(OperatorInput::None, control).unwrap();
    }

    #[test]
    fn invalid_merged_settings_are_rejected_at_instantiate() {
        let (bus, _rx) = tenzir_diagnostics::bus_channel(4);
        let ctx = ControlPlaneContext::new(bus, MetricsReporter::new());
        let control = ctx.control_plane_for(OperatorId(0), "stub", 0);
        let args = TuneArgs {
            backoff_rate: Some(0.5),
            ..Default::default()
        };
        let tuned = TuneOperator::new(Box::new(Stub), args);
        let err = tuned.instantiate(OperatorInput::None, control).unwrap_err();
        assert_eq!(err.kind, crate::error::OperatorErrorKind::Configuration);
    }

    #[test]
    fn flat_rate_with_max_backoff_set_warns() {
        let (bus, rx) = tenzir_diagnostics::bus_channel(4);
        let ctx = ControlPlaneContext::new(bus, MetricsReporter::new());
        let control = ctx.control_plane_for(OperatorId(0), "stub", 0);
        let args = TuneArgs {
            backoff_rate: Some(1.0),
            max_backoff: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let tuned = TuneOperator::new(Box::new(Stub), args);
        let _gen = tuned.instantiate(OperatorInput::None, control).unwrap();

        struct Counter(usize);
        impl tenzir_diagnostics::DiagnosticHandler for Counter {
            fn handle(&mut self, _d: tenzir_diagnostics::Diagnostic) {
                self.0 += 1;
            }
        }
        let mut counter = Counter(0);
        rx.drain_into(&mut counter);
        assert_eq!(counter.0, 1);
    }
}
