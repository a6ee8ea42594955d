// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the pipeline engine.
//!
//! Operator-level failures never unwind the scheduler; they are always
//! surfaced through the diagnostic bus (§4) or returned from assembly
//! (§10), never panics.

use std::fmt;

use tenzir_types::{DuplicateFieldError, PathError, SchemaMismatch};

/// High-level classification for operator failures, used to group related
/// causes for troubleshooting without inventing a new enum per operator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OperatorErrorKind {
    /// Invalid or incomplete operator configuration detected at build time.
    Configuration,
    /// Failures exchanging elements with neighboring operators at runtime.
    Transport,
    /// Failures encountered while tearing an operator down.
    Shutdown,
    /// Catch-all for operator failures that do not fit other categories.
    Other,
}

impl fmt::Display for OperatorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperatorErrorKind::Configuration => "configuration",
            OperatorErrorKind::Transport => "transport",
            OperatorErrorKind::Shutdown => "shutdown",
            OperatorErrorKind::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// An error raised by an operator implementation. Carries the operator's
/// name and index so the scheduler and diagnostic bus can attribute it
/// without the operator having to embed that context itself.
#[derive(Debug, thiserror::Error)]
#[error("operator `{operator_name}`[{operator_index}] ({kind}): {message}")]
pub struct OperatorError {
    pub operator_name: String,
    pub operator_index: usize,
    pub kind: OperatorErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl OperatorError {
    #[must_use]
    pub fn new(
        operator_name: impl Into<String>,
        operator_index: usize,
        kind: OperatorErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operator_name: operator_name.into(),
            operator_index,
            kind,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// All errors that can occur in pipeline assembly and execution (§10).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A type mismatch was detected while wiring two operators together.
    #[error("type mismatch wiring `{upstream}` -> `{downstream}`: {error}")]
    TypeMismatch {
        upstream: String,
        downstream: String,
        error: String,
    },

    /// An operator's declared input/output element type is incompatible
    /// with its neighbor's.
    #[error("element type mismatch wiring `{upstream}` ({upstream_type}) -> `{downstream}` ({downstream_type})")]
    ElementTypeMismatch {
        upstream: String,
        upstream_type: &'static str,
        downstream: String,
        downstream_type: &'static str,
    },

    /// A pipeline was assembled without a source, without a sink, or with
    /// a source/sink in a non-boundary position.
    #[error("invalid pipeline shape: {0}")]
    InvalidShape(String),

    /// Dotted-path resolution failed while binding a configuration field
    /// that names a record path (e.g. a `where`/aggregation key).
    #[error("path resolution failed: {0}")]
    PathError(#[from] PathError),

    /// Schema construction failed (duplicate field names).
    #[error("schema error: {0}")]
    SchemaError(#[from] DuplicateFieldError),

    /// A batch did not match its declared schema.
    #[error("batch schema mismatch: {0}")]
    BatchSchemaMismatch(#[from] SchemaMismatch),

    /// An operator failed during execution.
    #[error("operator failure: {0}")]
    Operator(#[from] OperatorError),

    /// An internal scheduler invariant was violated.
    #[error("internal engine error: {message}")]
    Internal { message: String },
}

impl EngineError {
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match self {
            EngineError::TypeMismatch { .. } => "TypeMismatch",
            EngineError::ElementTypeMismatch { .. } => "ElementTypeMismatch",
            EngineError::InvalidShape(_) => "InvalidShape",
            EngineError::PathError(_) => "PathError",
            EngineError::SchemaError(_) => "SchemaError",
            EngineError::BatchSchemaMismatch(_) => "BatchSchemaMismatch",
            EngineError::Operator(_) => "Operator",
            EngineError::Internal { .. } => "Internal",
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal {
            message: message.into(),
        }
    }
}
