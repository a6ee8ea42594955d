// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the whole-pipeline integration tests, mirroring the
//! teacher's `tests/common/mod.rs` convention of one small support module
//! reused across several `tests/*.rs` files.
//!
//! `where`-style predicates belong to the per-operator library, which is
//! out of scope for this crate (it is an external collaborator reached
//! only through the `Operator` trait). `Predicate` below is a minimal
//! stand-in, local to the test suite, just capable enough to exercise
//! predicate push-down end to end.

use std::cell::RefCell;
use std::rc::Rc;

use async_stream::stream;
use futures::StreamExt;
use tenzir_core::{
    BoxGenerator, ControlPlane, Element, ElementType, EventOrder, Filter, Location, Offset,
    Operator, OperatorError, OperatorInput, OptimizeResult, SecretRef, SecretRequest, SecretResolver,
    SecretResolutionError, StepOutcome, Batch, ValueView,
};

#[derive(Debug, Clone)]
pub struct Predicate {
    offset: Offset,
    rendered: String,
}

impl Predicate {
    #[must_use]
    pub fn new(offset: Offset, rendered: impl Into<String>) -> Self {
        Self { offset, rendered: rendered.into() }
    }

    fn own_filter(&self) -> Filter {
        Filter::Eq { path: self.offset.clone(), rendered: self.rendered.clone() }
    }

    fn matches(&self, batch: &Batch, row: usize) -> bool {
        match batch.at(row, &self.offset) {
            ValueView::Int64(v) => v.to_string() == self.rendered,
            ValueView::Double(v) => v.to_string() == self.rendered,
            ValueView::String(s) => s == self.rendered,
            _ => false,
        }
    }
}

impl Operator for Predicate {
    fn name(&self) -> &str {
        "where"
    }

    fn input_type(&self) -> ElementType {
        ElementType::Events
    }

    fn output_type(&self) -> ElementType {
        ElementType::Events
    }

    fn location(&self) -> Location {
        Location::Anywhere
    }

    fn optimize(&self, filter: Filter, order: EventOrder) -> OptimizeResult {
        OptimizeResult::passthrough(self.own_filter().and(filter), order)
    }

    fn instantiate(&self, input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let mut upstream = input.upstream().expect("where requires an upstream edge");
        let predicate = self.clone();
        Ok(Box::pin(stream! {
            let mut current: Option<(Batch, usize)> = None;
            loop {
                if let Some((batch, start)) = current.take() {
                    let mut row = start;
                    let mut found = None;
                    while row < batch.rows() {
                        if predicate.matches(&batch, row) {
                            found = Some(row);
                            break;
                        }
                        row += 1;
                    }
                    if let Some(r) = found {
                        let out = batch.subslice(r, r + 1);
                        if r + 1 < batch.rows() {
                            current = Some((batch, r + 1));
                        }
                        yield StepOutcome::Data(Element::Events(out));
                        continue;
                    }
                }
                match upstream.next().await {
                    Some(StepOutcome::Data(Element::Events(batch))) => {
                        current = Some((batch, 0));
                    }
                    Some(StepOutcome::Data(other)) => yield StepOutcome::Data(other),
                    Some(StepOutcome::Empty) => yield StepOutcome::Empty,
                    Some(StepOutcome::AwaitSecrets(requests)) => {
                        yield StepOutcome::AwaitSecrets(requests);
                    }
                    None => break,
                }
            }
        }))
    }
}

/// An identity transformer: re-yields whatever its upstream produces,
/// unchanged, preserving the empty-batch protocol exactly (§4.3).
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Operator for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn input_type(&self) -> ElementType {
        ElementType::Events
    }

    fn output_type(&self) -> ElementType {
        ElementType::Events
    }

    fn optimize(&self, filter: Filter, order: EventOrder) -> OptimizeResult {
        OptimizeResult::passthrough(filter, order)
    }

    fn instantiate(&self, input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let Some(mut upstream) = input.upstream() else {
            return Ok(Box::pin(stream! {}));
        };
        Ok(Box::pin(stream! {
            while let Some(outcome) = upstream.next().await {
                yield outcome;
            }
        }))
    }
}

/// A source that replays fixed batches, and additionally records the
/// residual filter it was offered at `optimize` time, so a test can inspect
/// what push-down actually delivered to the head of the pipeline.
#[derive(Debug)]
pub struct RecordingSource {
    batches: Vec<Batch>,
    seen_filter: Rc<RefCell<Option<Filter>>>,
}

impl RecordingSource {
    #[must_use]
    pub fn new(batches: Vec<Batch>) -> Self {
        Self {
            batches,
            seen_filter: Rc::new(RefCell::new(None)),
        }
    }

    #[must_use]
    pub fn seen_filter(&self) -> Rc<RefCell<Option<Filter>>> {
        Rc::clone(&self.seen_filter)
    }
}

impl Operator for RecordingSource {
    fn name(&self) -> &str {
        "recording_source"
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
        *self.seen_filter.borrow_mut() = Some(filter.clone());
        OptimizeResult::passthrough(filter, EventOrder::Ordered)
    }

    fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let batches = self.batches.clone();
        Ok(Box::pin(stream! {
            for batch in batches {
                yield StepOutcome::Data(Element::Events(batch));
            }
        }))
    }
}

/// A source that replays a fixed, literal sequence of step outcomes — unlike
/// `RecordingSource`/`VecSource`, which only ever yield `Data` — so a test
/// can exercise the empty-batch protocol's `[empty, empty, data, empty,
/// EOF]` shape directly.
#[derive(Debug)]
pub struct ScriptedSource {
    steps: RefCell<std::vec::IntoIter<Option<Batch>>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(steps: Vec<Option<Batch>>) -> Self {
        Self {
            steps: RefCell::new(steps.into_iter()),
        }
    }
}

impl Operator for ScriptedSource {
    fn name(&self) -> &str {
        "scripted_source"
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

    fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let steps: Vec<_> = self.steps.borrow_mut().by_ref().collect();
        Ok(Box::pin(stream! {
            for step in steps {
                match step {
                    Some(batch) => yield StepOutcome::Data(Element::Events(batch)),
                    None => yield StepOutcome::Empty,
                }
            }
        }))
    }
}

/// A void-input source with a configurable `idle_after`, used to exercise
/// the cancellation-latency scenario. Yields `Empty` a bounded number of
/// times rather than forever, so the generator has a natural end even if a
/// test forgets to cancel it.
#[derive(Debug)]
pub struct IdleSource {
    idle_after: std::time::Duration,
}

impl IdleSource {
    #[must_use]
    pub fn new(idle_after: std::time::Duration) -> Self {
        Self { idle_after }
    }
}

impl Operator for IdleSource {
    fn name(&self) -> &str {
        "idle_source"
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

    fn idle_after(&self) -> std::time::Duration {
        self.idle_after
    }

    fn instantiate(&self, _input: OperatorInput, _control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        Ok(Box::pin(stream! {
            for _ in 0..1_000 {
                yield StepOutcome::Empty;
            }
        }))
    }
}

/// A void-input source that waits to be asked for a secret before it ever
/// produces data, exercising the full suspend/resolve/resume cycle (§4.5):
/// the first poll yields `AwaitSecrets`, and once the scheduler has resumed
/// it the generator reads the plaintext back via
/// `ControlPlane::take_resolved_secrets` and emits it as a one-row batch.
#[derive(Debug)]
pub struct SecretGatedSource {
    request: SecretRequest,
}

impl SecretGatedSource {
    #[must_use]
    pub fn new(secret_name: impl Into<String>) -> Self {
        let name = secret_name.into();
        Self {
            request: SecretRequest {
                reference: SecretRef::Named(name.clone()),
                name,
            },
        }
    }
}

impl Operator for SecretGatedSource {
    fn name(&self) -> &str {
        "secret_gated_source"
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

    fn instantiate(&self, _input: OperatorInput, control: ControlPlane) -> Result<BoxGenerator, OperatorError> {
        let request = self.request.clone();
        Ok(Box::pin(stream! {
            yield StepOutcome::AwaitSecrets(vec![request]);
            match control.take_resolved_secrets() {
                Some(Ok(plaintexts)) => {
                    let rendered = plaintexts
                        .first()
                        .map(|p| p.expose().to_string())
                        .unwrap_or_default();
                    yield StepOutcome::Data(Element::Events(one_row_string_batch(&rendered)));
                }
                Some(Err(_)) | None => yield StepOutcome::Empty,
            }
        }))
    }
}

/// A single-column `{s: string}` batch holding one row, used by
/// [`SecretGatedSource`] to surface the resolved plaintext as ordinary data.
#[must_use]
pub fn one_row_string_batch(value: &str) -> Batch {
    use arrow_array::{ArrayRef, RecordBatch, StringArray};
    use arrow_schema::{DataType, Field as ArrowField, Schema as ArrowSchema};
    use std::sync::Arc;
    use tenzir_core::{Field, RecordFields, Type};

    let schema = Type::record(RecordFields::new(vec![Field::new("s", Type::string())]).expect("single field is unique"));
    let array: ArrayRef = Arc::new(StringArray::from(vec![value.to_string()]));
    let data = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![ArrowField::new("s", DataType::Utf8, false)])),
        vec![array],
    )
    .expect("schema matches the single string column");
    Batch::try_new(schema, data).expect("field count matches column count")
}

#[allow(dead_code)]
pub fn extract_rows(offset: Offset, batches: &[Batch]) -> Vec<i64> {
    batches
        .iter()
        .flat_map(|batch| (0..batch.rows()).map(move |row| (batch, row)))
        .filter_map(|(batch, row)| batch.at(row, &offset).as_i64())
        .collect()
}
