// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use tenzir_types::Batch;

/// The coarse element type label carried by a pipeline edge (§3.4). An edge
/// has exactly one element type, fixed at assembly time; this enum is the
/// discriminant operators declare via `Operator::input_type`/`output_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Produced by sinks, consumed by sources. No data crosses the edge
    /// other than control ticks.
    Void,
    /// Unstructured byte chunks: raw I/O before parsing, or after
    /// formatting.
    Bytes,
    /// Columnar event batches (§3.2).
    Events,
    /// Operator-produced telemetry batches with a reserved schema family.
    Metrics,
}

impl ElementType {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ElementType::Void => "void",
            ElementType::Bytes => "bytes",
            ElementType::Events => "events",
            ElementType::Metrics => "metrics",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The data unit actually carried on an edge at runtime. The discriminant
/// always matches the edge's declared `ElementType`; mismatches are a
/// programming error caught at pipeline assembly (§4.8), never at runtime.
#[derive(Debug, Clone)]
pub enum Element {
    Void,
    Bytes(Bytes),
    Events(Batch),
    Metrics(Batch),
}

impl Element {
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Element::Void => ElementType::Void,
            Element::Bytes(_) => ElementType::Bytes,
            Element::Events(_) => ElementType::Events,
            Element::Metrics(_) => ElementType::Metrics,
        }
    }

    /// Row count for element types that carry batches; `0` for `void`/`bytes`.
    #[must_use]
    pub fn rows(&self) -> usize {
        match self {
            Element::Events(b) | Element::Metrics(b) => b.rows(),
            Element::Void | Element::Bytes(_) => 0,
        }
    }

    #[must_use]
    pub fn as_events(&self) -> Option<&Batch> {
        match self {
            Element::Events(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_events(self) -> Option<Batch> {
        match self {
            Element::Events(b) => Some(b),
            _ => None,
        }
    }
}
