// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline assembly (§4.8): turning a checked, optimized operator list
//! into an executable generator chain.
//!
//! Optimization (§4.7) walks the operator list back to front: a filter or
//! relaxed order requirement a `where`/downstream transformer wants to push
//! upstream is only ever known once its own `optimize` call has run, so the
//! residual it returns becomes the input to the operator immediately to its
//! left. `PipelineBuilder::build` performs this right-to-left fold and then
//! keeps the (possibly replaced) operators in their original left-to-right
//! order, matching "collapsing replacements" in the assembly steps.

use std::fmt;

use crate::control::{ControlPlane, ControlPlaneContext, OperatorId, ShutdownFlag};
use crate::element::ElementType;
use crate::error::EngineError;
use crate::operator::{BoxGenerator, Operator, OperatorInput};
use crate::optimizer::{EventOrder, Filter};
use crate::scheduler::govern;

/// A checked, optimized, but not-yet-instantiated pipeline (§4.8 step 5).
/// `instantiate` may be called more than once; each call produces an
/// independent execution (§4 "checked, optimized, and then instantiated
/// once per execution").
pub struct Pipeline {
    operators: Vec<Box<dyn Operator>>,
    context: ControlPlaneContext,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("operators", &self.operators.iter().map(|o| o.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Pipeline {
    #[must_use]
    pub fn operators(&self) -> &[Box<dyn Operator>] {
        &self.operators
    }

    #[must_use]
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.context.shutdown.clone()
    }

    fn control_plane_for(&self, index: usize) -> ControlPlane {
        self.context
            .control_plane_for(OperatorId(index), self.operators[index].name(), index)
    }

    /// Builds the composed execution coroutine: each operator's generator,
    /// governed by its own demand/backoff/`idle_after` settings (§4.4),
    /// feeding the next. Fails if any operator's own `instantiate` does
    /// (e.g. a configuration problem only detectable once control-plane
    /// identity is bound), attributing the failure via `EngineError::Operator`.
    pub fn instantiate(&self) -> Result<BoxGenerator, EngineError> {
        let mut operators = self.operators.iter();
        let first = operators.next().expect("build() rejects empty pipelines");
        let control = self.control_plane_for(0);
        let mut generator = first.instantiate(OperatorInput::None, control.clone())?;
        generator = govern(
            generator,
            first.demand(),
            first.idle_after(),
            first.input_independent(),
            control,
        );

        for (index, operator) in operators.enumerate() {
            let index = index + 1;
            let control = self.control_plane_for(index);
            generator = operator.instantiate(OperatorInput::Upstream(generator), control.clone())?;
            generator = govern(
                generator,
                operator.demand(),
                operator.idle_after(),
                operator.input_independent(),
                control,
            );
        }

        Ok(generator)
    }
}

/// Assembles a [`Pipeline`] from an ordered operator list (§4.8).
pub struct PipelineBuilder {
    operators: Vec<Box<dyn Operator>>,
    standalone: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
            standalone: true,
        }
    }

    #[must_use]
    pub fn push(mut self, operator: Box<dyn Operator>) -> Self {
        self.operators.push(operator);
        self
    }

    /// Marks this pipeline as a fragment: it is not required to begin with
    /// a `void`-consuming source (§4.8 step 3).
    #[must_use]
    pub fn fragment(mut self) -> Self {
        self.standalone = false;
        self
    }

    /// Type-checks the operator list, optimizes it, and binds control-plane
    /// handles, producing an executable pipeline (§4.8).
    pub fn build(mut self, context: ControlPlaneContext) -> Result<Pipeline, EngineError> {
        if self.operators.is_empty() {
            return Err(EngineError::InvalidShape("pipeline has no operators".into()));
        }

        for window in self.operators.windows(2) {
            let (upstream, downstream) = (&window[0], &window[1]);
            if upstream.output_type() != downstream.input_type() {
                return Err(EngineError::ElementTypeMismatch {
                    upstream: upstream.name().to_string(),
                    upstream_type: upstream.output_type().label(),
                    downstream: downstream.name().to_string(),
                    downstream_type: downstream.input_type().label(),
                });
            }
        }

        let mut accumulated_filter = Filter::True;
        let mut accumulated_order = EventOrder::Ordered;
        for operator in self.operators.iter_mut().rev() {
            let result = operator.optimize(accumulated_filter, accumulated_order);
            if let Some(replacement) = result.replacement {
                *operator = replacement;
            }
            accumulated_filter = result.filter;
            accumulated_order = result.order;
        }

        if self.standalone {
            let head = &self.operators[0];
            if head.input_type() != ElementType::Void {
                return Err(EngineError::InvalidShape(format!(
                    "standalone pipeline must begin with a source (input_type void), but `{}` consumes {}",
                    head.name(),
                    head.input_type()
                )));
            }
            let tail = self.operators.last().expect("non-empty, checked above");
            if tail.output_type() != ElementType::Void {
                return Err(EngineError::InvalidShape(format!(
                    "standalone pipeline must end with a sink (output_type void), but `{}` produces {}",
                    tail.name(),
                    tail.output_type()
                )));
            }
        }

        Ok(Pipeline {
            operators: self.operators,
            context,
        })
    }
}
