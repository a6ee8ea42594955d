// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The aggregation contract (§4.6): the `Aggregator` trait every reducer
//! implements, and the versioned save/restore envelope.

mod envelope;
pub mod numeric;

pub use envelope::{EnvelopeError, ReducerEnvelope};

use tenzir_diagnostics::DiagnosticBus;
use tenzir_types::Batch;

/// Numeric value an aggregator currently holds, matching the closed set
/// of result types the original aggregation functions can settle on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateValue {
    Null,
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Duration(i64),
    Time(i64),
}

/// A reducer instance (§4.6). `update` may emit warnings through
/// `session` but never returns an error: a reducer that cannot make sense
/// of a batch poisons itself and keeps running, per the numeric-aggregator
/// rules.
pub trait Aggregator {
    /// Stable identifier used in the envelope's `reducer_kind_id` and in
    /// diagnostics (e.g. `"sum"`, `"min"`, `"stddev"`).
    fn kind(&self) -> &'static str;

    /// Folds a batch's column at `path` into the running state.
    fn update(&mut self, batch: &Batch, path: &[usize], diagnostics: &DiagnosticBus);

    /// Produces the current result without mutating state.
    fn get(&self) -> AggregateValue;

    /// Returns to the reducer's initial (never-updated) state.
    fn reset(&mut self);

    /// Serializes state to a self-describing byte buffer (§6.6).
    fn save(&self) -> Vec<u8>;

    /// Inverse of `save`. On structural failure, emits a warning and
    /// leaves state at initial rather than partially applying it.
    fn restore(&mut self, bytes: &[u8], diagnostics: &DiagnosticBus);
}

#[cfg(test)]
pub(crate) fn test_bus() -> (DiagnosticBus, tenzir_diagnostics::DiagnosticReceiver) {
    tenzir_diagnostics::bus_channel(16)
}
