// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Common testing utilities for engine components (§11): a generator
//! source, a row-collecting sink, and a batch-construction helper, used
//! across the `tests/*.rs` integration tests and this crate's own unit
//! tests. Grounded on the teacher's `testing.rs`, which plays the same
//! "shared test harness" role for its node traits.
//!
//! Gated behind the `test-utils` feature so the crate can depend on
//! itself as a dev-dependency (mirroring the teacher's own engine crate).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, RecordBatch};
use arrow_schema::{DataType, Field as ArrowField, Schema as ArrowSchema};
use async_stream::stream;
use futures::StreamExt;
use tenzir_types::{Batch, Field, RecordFields, Type};

use crate::control::ControlPlane;
use crate::element::{Element, ElementType};
use crate::error::OperatorError;
use crate::operator::{BoxGenerator, Location, Operator, OperatorInput, OptimizeResult};
use crate::optimizer::{EventOrder, Filter};

/// A single-column `{x: int64}` batch from the given (possibly null)
/// values, used throughout engine/aggregate unit tests.
#[must_use]
pub fn int_events_batch(values: &[i64]) -> Batch {
    int_events_batch_opt(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>())
}

/// As `int_events_batch`, but allowing explicit nulls.
#[must_use]
pub fn int_events_batch_opt(values: &[Option<i64>]) -> Batch {
    let schema = Type::record(RecordFields::new(vec![Field::new("x", Type::int64())]).expect("single field is unique"));
    let array: ArrayRef = Arc::new(Int64Array::from(values.to_vec()));
    let data = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![ArrowField::new("x", DataType::Int64, true)])),
        vec![array],
    )
    .expect("schema matches the single int64 column");
    Batch::try_new(schema, data).expect("field count matches column count")
}

/// A two-column `{a: int64, b: int64}` batch, used by push-down tests that
/// need more than one field to filter on.
#[must_use]
pub fn two_col_events_batch(a: &[i64], b: &[i64]) -> Batch {
    assert_eq!(a.len(), b.len(), "columns must have equal length");
    let schema = Type::record(
        RecordFields::new(vec![Field::new("a", Type::int64()), Field::new("b", Type::int64())])
            .expect("field names are unique"),
    );
    let a_array: ArrayRef = Arc::new(Int64Array::from(a.to_vec()));
    let b_array: ArrayRef = Arc::new(Int64Array::from(b.to_vec()));
    let data = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![
            ArrowField::new("a", DataType::Int64, true),
            ArrowField::new("b", DataType::Int64, true),
        ])),
        vec![a_array, b_array],
    )
    .expect("schema matches the two int64 columns");
    Batch::try_new(schema, data).expect("field count matches column count")
}

/// A source that replays a fixed sequence of batches, then terminates.
/// `input_type` is `Void`; `output_type` is `Events`.
#[derive(Debug)]
pub struct VecSource {
    batches: Vec<Batch>,
}

impl VecSource {
    #[must_use]
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }
}

impl Operator for VecSource {
    fn name(&self) -> &str {
        "vec_source"
    }

    fn input_type(&self) -> ElementType {
        ElementType::Void
    }

    fn output_type(&self) -> ElementType {
        ElementType::Events
    }

    fn location(&self) -> Location {
        Location::Local
    }

    fn optimize(&self, filter: Filter, _order: EventOrder) -> OptimizeResult {
        // A replayed fixed sequence has no natural notion of order beyond
        // "as recorded", which downstream is free to rely on.
        OptimizeResult::passthrough(filter, EventOrder::Ordered)
    }

    fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let batches = self.batches.clone();
        Ok(Box::pin(stream! {
            for batch in batches {
                yield crate::operator::StepOutcome::Data(Element::Events(batch));
            }
        }))
    }
}

/// A sink that collects every row-bearing batch it observes into a
/// shared `Rc<RefCell<Vec<Batch>>>` the test can inspect afterward.
/// `input_type` is `Events`; `output_type` is `Void`.
#[derive(Debug, Clone)]
pub struct CollectSink {
    collected: Rc<RefCell<Vec<Batch>>>,
}

impl CollectSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collected: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn collected(&self) -> Rc<RefCell<Vec<Batch>>> {
        Rc::clone(&self.collected)
    }
}

impl Default for CollectSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for CollectSink {
    fn name(&self) -> &str {
        "collect_sink"
    }

    fn input_type(&self) -> ElementType {
        ElementType::Events
    }

    fn output_type(&self) -> ElementType {
        ElementType::Void
    }

    fn location(&self) -> Location {
        Location::Local
    }

    fn instantiate(&self, input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let collected = Rc::clone(&self.collected);
        let Some(mut upstream) = input.upstream() else {
            return Ok(Box::pin(stream! {}));
        };
        Ok(Box::pin(stream! {
            while let Some(outcome) = upstream.next().await {
                match outcome {
                    crate::operator::StepOutcome::Data(Element::Events(batch)) => {
                        collected.borrow_mut().push(batch);
                        yield crate::operator::StepOutcome::Data(Element::Void);
                    }
                    crate::operator::StepOutcome::Data(_) => {
                        yield crate::operator::StepOutcome::Empty;
                    }
                    crate::operator::StepOutcome::Empty => yield crate::operator::StepOutcome::Empty,
                    crate::operator::StepOutcome::AwaitSecrets(r) => {
                        yield crate::operator::StepOutcome::AwaitSecrets(r);
                    }
                }
            }
        }))
    }
}
