// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline execution engine: the operator contract, the pull-based
//! scheduler, the control plane, the aggregation contract, and the
//! optimizer that together turn a list of operators into a running
//! pipeline.

pub mod aggregate;
pub mod control;
pub mod demand;
pub mod element;
pub mod error;
pub mod operator;
pub mod optimizer;
pub mod pipeline;
pub mod scheduler;
pub mod tune;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use control::{
    ControlPlane, ControlPlaneContext, OperatorId, SecretPlaintext, SecretRef, SecretRequest, SecretResolutionError,
    SecretResolver, ShutdownFlag,
};
pub use demand::{Backoff, DemandSettings, DemandSettingsError};
pub use element::{Element, ElementType};
pub use error::{EngineError, OperatorError, OperatorErrorKind};
pub use operator::{BoxGenerator, Location, Operator, OperatorInput, OptimizeResult, StepOutcome};
pub use optimizer::{EventOrder, Filter};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use scheduler::{RunSummary, Scheduler, govern};
pub use tune::{TuneArgs, TuneOperator};
