// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The operator contract (§4.3): the trait every pipeline stage
//! implements, and the coroutine shape `instantiate` returns.
//!
//! Grounded on the teacher's receiver/processor/exporter trio
//! (`receiver.rs`/`processor.rs`/`exporter.rs`), collapsed into one trait
//! because this model's element-type dichotomy (`void`/`bytes`/`events`/
//! `metrics`) already distinguishes source/transform/sink shapes by
//! `input_type`/`output_type` rather than by three separate traits.
//! The execution coroutine itself is modeled as a `futures_core::Stream`
//! built with the `async-stream` crate, rather than the teacher's
//! message-passing `Send`/receive loop: a pull-based single-owner
//! scheduler (§4.4) falls naturally out of `Stream::poll_next` recursion,
//! whereas the teacher's push-based actors need explicit channels because
//! their scheduler runs many operators concurrently across a thread pool.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures_core::Stream;

use crate::control::{ControlPlane, SecretRequest};
use crate::demand::DemandSettings;
use crate::element::{Element, ElementType};
use crate::error::OperatorError;
use crate::optimizer::{EventOrder, Filter};

/// Scheduling hint: where the scheduler is permitted to run this operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    Remote,
    Anywhere,
}

impl Default for Location {
    fn default() -> Self {
        Location::Anywhere
    }
}

/// One step of an operator's execution coroutine (§4.3's "empty-batch
/// protocol"). The generator's `None` (stream termination) is EOF; it is
/// not a variant of this enum.
#[derive(Debug)]
pub enum StepOutcome {
    /// A produced element. Never empty-but-meaningful: an empty batch is
    /// always `Empty`, not `Data` carrying zero rows, so downstream code
    /// can match on the discriminant alone.
    Data(Element),
    /// "Still alive, no output yet" — neither EOF nor data.
    Empty,
    /// The operator is suspended awaiting secret resolution (§4.5). The
    /// scheduler must drive `ControlPlane::resolve_secrets` with these
    /// requests and resume the operator once satisfied.
    AwaitSecrets(Vec<SecretRequest>),
}

/// A boxed, pinned execution coroutine. `!Send` by design: this crate's
/// scheduler is single-owner per pipeline (§4.4), matching the teacher's
/// own `!Send` node futures.
pub type BoxGenerator = Pin<Box<dyn Stream<Item = StepOutcome>>>;

/// The upstream edge handed to `Operator::instantiate`. `None` for
/// sources (`input_type() == ElementType::Void`); `Some` otherwise,
/// carrying the already-instantiated predecessor generator so pulling
/// from it is just driving that `Stream`.
pub enum OperatorInput {
    None,
    Upstream(BoxGenerator),
}

impl OperatorInput {
    #[must_use]
    pub fn upstream(self) -> Option<BoxGenerator> {
        match self {
            OperatorInput::Upstream(g) => Some(g),
            OperatorInput::None => None,
        }
    }
}

/// The result of asking an operator to absorb a filter/order requirement
/// (§4.7).
pub struct OptimizeResult {
    /// `Some` when the operator can specialize itself to satisfy (part
    /// of) the requirement; `None` means the caller keeps the original
    /// operator and applies `filter` downstream unchanged.
    pub replacement: Option<Box<dyn Operator>>,
    /// The residual filter the caller must still apply.
    pub filter: Filter,
    /// The order the replacement (or, absent one, the original operator)
    /// promises to preserve.
    pub order: EventOrder,
}

impl OptimizeResult {
    #[must_use]
    pub fn passthrough(filter: Filter, order: EventOrder) -> Self {
        Self {
            replacement: None,
            filter,
            order,
        }
    }
}

impl fmt::Debug for OptimizeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizeResult")
            .field("replacement", &self.replacement.as_ref().map(|op| op.name().to_string()))
            .field("filter", &self.filter)
            .field("order", &self.order)
            .finish()
    }
}

/// Every pipeline stage (§4.3). Implementors are typically zero- or
/// small-sized configuration structs; the heavyweight state lives in the
/// `BoxGenerator` returned from `instantiate`.
pub trait Operator: fmt::Debug {
    /// Stable identifier used for metrics and diagnostics.
    fn name(&self) -> &str;

    fn input_type(&self) -> ElementType;
    fn output_type(&self) -> ElementType;

    /// Scheduling hint; operators that don't care return `Anywhere`.
    fn location(&self) -> Location {
        Location::Anywhere
    }

    /// If true, run on a dedicated worker because the operator may block.
    fn detached(&self) -> bool {
        false
    }

    /// If true, excluded from user-visible metrics and logs.
    fn internal(&self) -> bool {
        false
    }

    /// If true, the operator may emit output with no corresponding
    /// input — used by sources and heartbeats.
    fn input_independent(&self) -> bool {
        self.input_type() == ElementType::Void
    }

    /// Maximum time the scheduler may leave the operator dormant before
    /// polling it again.
    fn idle_after(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Producer-side batching/backoff policy.
    fn demand(&self) -> DemandSettings {
        DemandSettings::default()
    }

    /// Absorbs a filter/order requirement pushed down from downstream.
    /// The default declines: no replacement, filter passed through
    /// unchanged, order downgraded to `Unordered` since most operators
    /// make no ordering promise.
    fn optimize(&self, filter: Filter, _order: EventOrder) -> OptimizeResult {
        OptimizeResult::passthrough(filter, EventOrder::Unordered)
    }

    /// Builds the execution coroutine. Yields output lazily; may yield
    /// `StepOutcome::Empty` to signal "still alive, no output yet";
    /// stream termination is EOF. Fails only for setup-time problems
    /// (bad configuration, an unavailable resource) that are known before
    /// the first poll; once the coroutine is running, failures are raised
    /// through the control plane's diagnostic bus instead (§4.5), never
    /// by terminating the stream early.
    fn instantiate(&self, input: OperatorInput, control: ControlPlane) -> Result<BoxGenerator, OperatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_independent_defaults_from_input_type() {
        #[derive(Debug)]
        struct Source;
        impl Operator for Source {
            fn name(&self) -> &str {
                "source"
            }
            fn input_type(&self) -> ElementType {
                ElementType::Void
            }
            fn output_type(&self) -> ElementType {
                ElementType::Events
            }
            fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
                Ok(Box::pin(futures::stream::empty()))
            }
        }
        assert!(Source.input_independent());
    }

    #[test]
    fn default_optimize_passes_filter_through() {
        #[derive(Debug)]
        struct Passthrough;
        impl Operator for Passthrough {
            fn name(&self) -> &str {
                "passthrough"
            }
            fn input_type(&self) -> ElementType {
                ElementType::Events
            }
            fn output_type(&self) -> ElementType {
                ElementType::Events
            }
            fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
                Ok(Box::pin(futures::stream::empty()))
            }
        }
        let result = Passthrough.optimize(Filter::True, EventOrder::Ordered);
        assert!(result.replacement.is_none());
        assert!(result.filter.is_true());
        assert_eq!(result.order, EventOrder::Unordered);
    }
}
