// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Embedding API for the pipeline execution core (§6.5): no CLI lives
//! here. A host (the surface parser plus its connector/codec/storage
//! plugins) builds an operator list, hands it to [`build_pipeline`], and
//! drives the result with [`EmbeddedPipeline::run_to_completion`] or
//! [`EmbeddedPipeline::cancel`].
//!
//! Grounded on the teacher's `RuntimePipeline` (`runtime_pipeline.rs`):
//! a thin owner type pairing the assembled pipeline with its runtime
//! handles, kept separate from the lower-level `Pipeline`/`Scheduler`
//! types so the engine crate itself stays usable without this facade.

use tenzir_diagnostics::{DiagnosticHandler, DiagnosticReceiver};
use tenzir_engine::{EngineError, Operator, Pipeline, PipelineBuilder, RunSummary, Scheduler, ShutdownFlag};
use tenzir_telemetry::MetricsReporter;

// Re-exported for hosts implementing their own operators (§6.1-6.4):
// the closed type system and batch model, and the full operator contract.
pub use tenzir_diagnostics::{Diagnostic, Note, Severity, SourceRef};
pub use tenzir_engine::{
    ControlPlane, ControlPlaneContext, DemandSettings, Element, ElementType, EventOrder, Filter, Location,
    OperatorError, OperatorErrorKind, OperatorId, OperatorInput, OptimizeResult, SecretPlaintext, SecretRef,
    SecretRequest, SecretResolutionError, SecretResolver, StepOutcome, TuneArgs, TuneOperator,
};
pub use tenzir_types::{Attribute, Attributes, Batch, Field, Kind, Offset, RecordFields, Type, ValueView};

/// The aggregation contract and its concrete numeric reducers (§4.6),
/// re-exported for hosts implementing `aggregate(...)`-style operators.
pub use tenzir_engine::aggregate;

/// An assembled, checked, and optimized pipeline paired with the
/// diagnostic receiver a host drains, and the metrics reporter it reads
/// from (§4.5, §6.5).
pub struct EmbeddedPipeline {
    pipeline: Pipeline,
    diagnostics: DiagnosticReceiver,
    metrics: MetricsReporter,
}

/// Default capacity of the diagnostic bus's internal channel; generous
/// enough that a pipeline emitting diagnostics faster than a host drains
/// them backpressures via drop-on-full (`DiagnosticBus::emit`'s
/// best-effort send), not by blocking an operator.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 1024;

/// Type-checks, optimizes, and binds control-plane handles for `operators`
/// (§4.8), returning an executable pipeline a host can run or cancel.
pub fn build_pipeline(operators: Vec<Box<dyn Operator>>) -> Result<EmbeddedPipeline, EngineError> {
    build_pipeline_with_capacity(operators, DEFAULT_DIAGNOSTIC_CAPACITY)
}

/// As [`build_pipeline`], with an explicit diagnostic bus channel capacity.
pub fn build_pipeline_with_capacity(
    operators: Vec<Box<dyn Operator>>,
    diagnostic_capacity: usize,
) -> Result<EmbeddedPipeline, EngineError> {
    let (diagnostics_tx, diagnostics_rx) = tenzir_diagnostics::bus_channel(diagnostic_capacity);
    let metrics = MetricsReporter::new();
    let mut builder = PipelineBuilder::new();
    for operator in operators {
        builder = builder.push(operator);
    }
    let context = tenzir_engine::ControlPlaneContext::new(diagnostics_tx, metrics.clone());
    let pipeline = builder.build(context)?;
    Ok(EmbeddedPipeline {
        pipeline,
        diagnostics: diagnostics_rx,
        metrics,
    })
}

/// As [`build_pipeline`], but with a host-supplied [`SecretResolver`]
/// instead of the default [`tenzir_engine::control::NoSecretsResolver`],
/// for hosts whose operators resolve named secrets (§4.5).
pub fn build_pipeline_with_resolver(
    operators: Vec<Box<dyn Operator>>,
    resolver: std::rc::Rc<dyn SecretResolver>,
) -> Result<EmbeddedPipeline, EngineError> {
    let (diagnostics_tx, diagnostics_rx) = tenzir_diagnostics::bus_channel(DEFAULT_DIAGNOSTIC_CAPACITY);
    let metrics = MetricsReporter::new();
    let mut builder = PipelineBuilder::new();
    for operator in operators {
        builder = builder.push(operator);
    }
    let context = tenzir_engine::ControlPlaneContext::new(diagnostics_tx, metrics.clone()).with_resolver(resolver);
    let pipeline = builder.build(context)?;
    Ok(EmbeddedPipeline {
        pipeline,
        diagnostics: diagnostics_rx,
        metrics,
    })
}

impl EmbeddedPipeline {
    #[must_use]
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.pipeline.shutdown_flag()
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsReporter {
        &self.metrics
    }

    /// Drains every diagnostic buffered since the last drain into
    /// `handler`, without blocking (§6.5's diagnostic sink).
    pub fn drain_diagnostics(&self, handler: &mut dyn DiagnosticHandler) {
        self.diagnostics.drain_into(handler);
    }

    /// Requests cancellation; takes effect at the running pipeline's next
    /// suspension point (§4.4, §8 scenario 4).
    pub fn cancel(&self) {
        self.pipeline.shutdown_flag().request();
    }

    /// Instantiates and drives the pipeline to completion or cancellation
    /// (§6.5's "drives execution to completion or cancels it"). Fails only
    /// if instantiation itself fails (§10); once running, operator
    /// failures surface through [`Self::drain_diagnostics`] instead.
    pub async fn run_to_completion(&self) -> Result<RunSummary, EngineError> {
        let scheduler = Scheduler::new(self.pipeline.shutdown_flag());
        let generator = self.pipeline.instantiate()?;
        Ok(scheduler.run_to_completion(generator).await)
    }
}
