// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Concrete numeric reducers (§4.6), grounded verbatim-in-spirit on
//! `sum.cpp`, `min_max.cpp`, and `stddev_variance.cpp`: mixed int/double
//! promotes to double, integer overflow poisons, a null-only column
//! yields null, and `variance` alone rejects duration/time.

use serde::{Deserialize, Serialize};
use tenzir_diagnostics::{Diagnostic, DiagnosticBus};
use tenzir_types::{Batch, ValueView};

use super::envelope::ReducerEnvelope;
use super::{AggregateValue, Aggregator};

/// The running value a numeric reducer has settled into. `Poisoned` is
/// sticky: once set, `update` becomes a no-op until `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Lane {
    None,
    Poisoned,
    Int(i64),
    Double(f64),
    Duration(i64),
    Time(i64),
}

fn warn_incompatible(diagnostics: &DiagnosticBus, reducer: &str, got: &str) {
    diagnostics.emit(Diagnostic::warning(format!(
        "`{reducer}`: got incompatible types in successive batches (unexpected `{got}`)"
    )));
}

fn warn_promoted_to_double(diagnostics: &DiagnosticBus, reducer: &str) {
    diagnostics.emit(Diagnostic::warning(format!(
        "`{reducer}`: mixing int and double, promoting to double for the remainder of this reducer's lifetime"
    )));
}

fn warn_overflow(diagnostics: &DiagnosticBus, reducer: &str) {
    diagnostics.emit(Diagnostic::warning(format!("`{reducer}`: integer overflow")));
}

fn warn_unexpected_type(diagnostics: &DiagnosticBus, reducer: &str, expected: &str, got: &str) {
    diagnostics.emit(Diagnostic::warning(format!(
        "`{reducer}`: expected {expected}, got `{got}`"
    )));
}

fn restore_lane(bytes: &[u8], diagnostics: &DiagnosticBus, reducer: &'static str) -> Lane {
    match ReducerEnvelope::decode_expecting(bytes, reducer) {
        Ok(envelope) => match serde_json::from_slice::<Lane>(&envelope.body) {
            Ok(lane) => lane,
            Err(e) => {
                diagnostics.emit(
                    Diagnostic::warning(format!("invalid body for `{reducer}` aggregation instance"))
                        .with_note(e.to_string()),
                );
                Lane::None
            }
        },
        Err(e) => {
            diagnostics.emit(
                Diagnostic::warning(format!("failed to restore `{reducer}` aggregation instance"))
                    .with_note(e.to_string()),
            );
            Lane::None
        }
    }
}

fn lane_to_value(lane: Lane) -> AggregateValue {
    match lane {
        Lane::None | Lane::Poisoned => AggregateValue::Null,
        Lane::Int(v) => AggregateValue::Int64(v),
        Lane::Double(v) => AggregateValue::Double(v),
        Lane::Duration(v) => AggregateValue::Duration(v),
        Lane::Time(v) => AggregateValue::Time(v),
    }
}

/// `sum`: accepts `int`/`uint`/`double`/`duration`. Mixing int and double
/// promotes the lane to double; integer overflow poisons.
#[derive(Debug, Default)]
pub struct Sum {
    lane: Lane,
    mix_warned: bool,
}

impl Default for Lane {
    fn default() -> Self {
        Lane::None
    }
}

impl Sum {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fold_int(&mut self, v: i64, diagnostics: &DiagnosticBus) {
        self.lane = match self.lane {
            Lane::None => Lane::Int(v),
            Lane::Int(s) => match s.checked_add(v) {
                Some(sum) => Lane::Int(sum),
                None => {
                    warn_overflow(diagnostics, "sum");
                    Lane::Poisoned
                }
            },
            Lane::Double(s) => {
                if !self.mix_warned {
                    warn_promoted_to_double(diagnostics, "sum");
                    self.mix_warned = true;
                }
                Lane::Double(s + v as f64)
            }
            Lane::Duration(_) | Lane::Time(_) => {
                warn_incompatible(diagnostics, "sum", "int");
                Lane::Poisoned
            }
            Lane::Poisoned => Lane::Poisoned,
        };
    }

    fn fold_double(&mut self, v: f64, diagnostics: &DiagnosticBus) {
        self.lane = match self.lane {
            Lane::None => Lane::Double(v),
            Lane::Int(s) => {
                if !self.mix_warned {
                    warn_promoted_to_double(diagnostics, "sum");
                    self.mix_warned = true;
                }
                Lane::Double(s as f64 + v)
            }
            Lane::Double(s) => Lane::Double(s + v),
            Lane::Duration(_) | Lane::Time(_) => {
                warn_incompatible(diagnostics, "sum", "double");
                Lane::Poisoned
            }
            Lane::Poisoned => Lane::Poisoned,
        };
    }

    fn fold_duration(&mut self, v: i64, diagnostics: &DiagnosticBus) {
        self.lane = match self.lane {
            Lane::None => Lane::Duration(v),
            Lane::Duration(s) => match s.checked_add(v) {
                Some(sum) => Lane::Duration(sum),
                None => {
                    warn_overflow(diagnostics, "sum");
                    Lane::Poisoned
                }
            },
            Lane::Poisoned => Lane::Poisoned,
            _ => {
                warn_incompatible(diagnostics, "sum", "duration");
                Lane::Poisoned
            }
        };
    }
}

impl Aggregator for Sum {
    fn kind(&self) -> &'static str {
        "sum"
    }

    fn update(&mut self, batch: &Batch, path: &[usize], diagnostics: &DiagnosticBus) {
        if self.lane == Lane::Poisoned {
            return;
        }
        let offset = path.to_vec();
        for row in 0..batch.rows() {
            if self.lane == Lane::Poisoned {
                return;
            }
            match batch.at(row, &offset) {
                ValueView::Null => {}
                ValueView::Int64(v) => self.fold_int(v, diagnostics),
                ValueView::Uint64(v) => match i64::try_from(v) {
                    Ok(iv) => self.fold_int(iv, diagnostics),
                    Err(_) => {
                        warn_overflow(diagnostics, "sum");
                        self.lane = Lane::Poisoned;
                    }
                },
                ValueView::Double(v) => self.fold_double(v, diagnostics),
                ValueView::Duration(v) => self.fold_duration(v, diagnostics),
                other => {
                    warn_unexpected_type(diagnostics, "sum", "`int`, `uint`, `double` or `duration`", kind_label(&other));
                    self.lane = Lane::Poisoned;
                }
            }
        }
    }

    fn get(&self) -> AggregateValue {
        lane_to_value(self.lane)
    }

    fn reset(&mut self) {
        self.lane = Lane::None;
        self.mix_warned = false;
    }

    fn save(&self) -> Vec<u8> {
        ReducerEnvelope::new("sum", serde_json::to_vec(&self.lane).expect("Lane is JSON-serializable")).encode()
    }

    fn restore(&mut self, bytes: &[u8], diagnostics: &DiagnosticBus) {
        self.lane = restore_lane(bytes, diagnostics, "sum");
        self.mix_warned = false;
    }
}

/// `min`/`max`: accepts `int`/`uint`/`double`/`duration`/`time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

#[derive(Debug)]
pub struct MinMax {
    extremum: Extremum,
    lane: Lane,
    mix_warned: bool,
}

impl MinMax {
    #[must_use]
    pub fn new(extremum: Extremum) -> Self {
        Self {
            extremum,
            lane: Lane::None,
            mix_warned: false,
        }
    }

    fn better(&self, a: f64, b: f64) -> f64 {
        match self.extremum {
            Extremum::Min => a.min(b),
            Extremum::Max => a.max(b),
        }
    }

    fn better_i64(&self, a: i64, b: i64) -> i64 {
        match self.extremum {
            Extremum::Min => a.min(b),
            Extremum::Max => a.max(b),
        }
    }

    fn name(&self) -> &'static str {
        match self.extremum {
            Extremum::Min => "min",
            Extremum::Max => "max",
        }
    }

    fn fold_int(&mut self, v: i64, diagnostics: &DiagnosticBus) {
        let name = self.name();
        self.lane = match self.lane {
            Lane::None => Lane::Int(v),
            Lane::Int(s) => Lane::Int(self.better_i64(s, v)),
            Lane::Double(s) => {
                if !self.mix_warned {
                    warn_promoted_to_double(diagnostics, name);
                    self.mix_warned = true;
                }
                Lane::Double(self.better(s, v as f64))
            }
            Lane::Poisoned => Lane::Poisoned,
            _ => {
                warn_incompatible(diagnostics, name, "int");
                Lane::Poisoned
            }
        };
    }

    fn fold_double(&mut self, v: f64, diagnostics: &DiagnosticBus) {
        let name = self.name();
        self.lane = match self.lane {
            Lane::None => Lane::Double(v),
            Lane::Int(s) => {
                if !self.mix_warned {
                    warn_promoted_to_double(diagnostics, name);
                    self.mix_warned = true;
                }
                Lane::Double(self.better(s as f64, v))
            }
            Lane::Double(s) => Lane::Double(self.better(s, v)),
            Lane::Poisoned => Lane::Poisoned,
            _ => {
                warn_incompatible(diagnostics, name, "double");
                Lane::Poisoned
            }
        };
    }

    fn fold_duration(&mut self, v: i64, diagnostics: &DiagnosticBus) {
        let name = self.name();
        self.lane = match self.lane {
            Lane::None => Lane::Duration(v),
            Lane::Duration(s) => Lane::Duration(self.better_i64(s, v)),
            Lane::Poisoned => Lane::Poisoned,
            _ => {
                warn_incompatible(diagnostics, name, "duration");
                Lane::Poisoned
            }
        };
    }

    fn fold_time(&mut self, v: i64, diagnostics: &DiagnosticBus) {
        let name = self.name();
        self.lane = match self.lane {
            Lane::None => Lane::Time(v),
            Lane::Time(s) => Lane::Time(self.better_i64(s, v)),
            Lane::Poisoned => Lane::Poisoned,
            _ => {
                warn_incompatible(diagnostics, name, "time");
                Lane::Poisoned
            }
        };
    }
}

impl Aggregator for MinMax {
    fn kind(&self) -> &'static str {
        self.name()
    }

    fn update(&mut self, batch: &Batch, path: &[usize], diagnostics: &DiagnosticBus) {
        if self.lane == Lane::Poisoned {
            return;
        }
        let offset = path.to_vec();
        let name = self.name();
        for row in 0..batch.rows() {
            if self.lane == Lane::Poisoned {
                return;
            }
            match batch.at(row, &offset) {
                ValueView::Null => {}
                ValueView::Int64(v) => self.fold_int(v, diagnostics),
                ValueView::Uint64(v) => match i64::try_from(v) {
                    Ok(iv) => self.fold_int(iv, diagnostics),
                    Err(_) => {
                        warn_overflow(diagnostics, name);
                        self.lane = Lane::Poisoned;
                    }
                },
                ValueView::Double(v) => self.fold_double(v, diagnostics),
                ValueView::Duration(v) => self.fold_duration(v, diagnostics),
                ValueView::Time(v) => self.fold_time(v, diagnostics),
                other => {
                    warn_unexpected_type(
                        diagnostics,
                        name,
                        "`int`, `uint`, `double`, `duration`, or `time`",
                        kind_label(&other),
                    );
                    self.lane = Lane::Poisoned;
                }
            }
        }
    }

    fn get(&self) -> AggregateValue {
        lane_to_value(self.lane)
    }

    fn reset(&mut self) {
        self.lane = Lane::None;
        self.mix_warned = false;
    }

    fn save(&self) -> Vec<u8> {
        ReducerEnvelope::new(self.kind(), serde_json::to_vec(&self.lane).expect("Lane is JSON-serializable")).encode()
    }

    fn restore(&mut self, bytes: &[u8], diagnostics: &DiagnosticBus) {
        self.lane = restore_lane(bytes, diagnostics, self.kind());
        self.mix_warned = false;
    }
}

/// Shared Welford-style running moments for `mean`/`stddev`/`variance`,
/// grounded on `stddev_variance.cpp`'s single-pass `mean_`/`mean_squared_`
/// accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum MomentState {
    None,
    Poisoned,
    Numeric,
    Duration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Moments {
    state: MomentState,
    mean: f64,
    mean_squared: f64,
    count: u64,
}

impl Default for Moments {
    fn default() -> Self {
        Self {
            state: MomentState::None,
            mean: 0.0,
            mean_squared: 0.0,
            count: 0,
        }
    }
}

impl Moments {
    fn fold(&mut self, x: f64) {
        self.count += 1;
        let n = self.count as f64;
        self.mean += (x - self.mean) / n;
        self.mean_squared += (x * x - self.mean_squared) / n;
    }

    fn variance(&self) -> f64 {
        self.mean_squared - (self.mean * self.mean)
    }
}

/// `mean`: accepts `int`/`uint`/`double` only (no `duration`/`time`,
/// since there is no natural "average instant").
#[derive(Debug, Default)]
pub struct Mean {
    moments: Moments,
}

impl Mean {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for Mean {
    fn kind(&self) -> &'static str {
        "mean"
    }

    fn update(&mut self, batch: &Batch, path: &[usize], diagnostics: &DiagnosticBus) {
        if self.moments.state == MomentState::Poisoned {
            return;
        }
        let offset = path.to_vec();
        for row in 0..batch.rows() {
            let x = match batch.at(row, &offset) {
                ValueView::Null => continue,
                ValueView::Int64(v) => v as f64,
                ValueView::Uint64(v) => v as f64,
                ValueView::Double(v) if v.is_nan() => continue,
                ValueView::Double(v) => v,
                other => {
                    warn_unexpected_type(diagnostics, "mean", "`int`, `uint`, or `double`", kind_label(&other));
                    self.moments.state = MomentState::Poisoned;
                    return;
                }
            };
            self.moments.state = MomentState::Numeric;
            self.moments.fold(x);
        }
    }

    fn get(&self) -> AggregateValue {
        if self.moments.count == 0 {
            return AggregateValue::Null;
        }
        AggregateValue::Double(self.moments.mean)
    }

    fn reset(&mut self) {
        self.moments = Moments::default();
    }

    fn save(&self) -> Vec<u8> {
        ReducerEnvelope::new("mean", serde_json::to_vec(&self.moments).expect("Moments is JSON-serializable")).encode()
    }

    fn restore(&mut self, bytes: &[u8], diagnostics: &DiagnosticBus) {
        self.moments = restore_moments(bytes, diagnostics, "mean");
    }
}

fn restore_moments(bytes: &[u8], diagnostics: &DiagnosticBus, reducer: &'static str) -> Moments {
    match ReducerEnvelope::decode_expecting(bytes, reducer) {
        Ok(envelope) => match serde_json::from_slice::<Moments>(&envelope.body) {
            Ok(moments) => moments,
            Err(e) => {
                diagnostics.emit(
                    Diagnostic::warning(format!("invalid body for `{reducer}` aggregation instance"))
                        .with_note(e.to_string()),
                );
                Moments::default()
            }
        },
        Err(e) => {
            diagnostics.emit(
                Diagnostic::warning(format!("failed to restore `{reducer}` aggregation instance"))
                    .with_note(e.to_string()),
            );
            Moments::default()
        }
    }
}

/// `stddev`/`variance`. `stddev` additionally accepts `duration`, whose
/// result is reported back as a `duration`; `variance` rejects `duration`
/// and `time` outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spread {
    StdDev,
    Variance,
}

#[derive(Debug)]
pub struct StdDevVariance {
    spread: Spread,
    moments: Moments,
}

impl StdDevVariance {
    #[must_use]
    pub fn new(spread: Spread) -> Self {
        Self {
            spread,
            moments: Moments::default(),
        }
    }

    fn name(&self) -> &'static str {
        match self.spread {
            Spread::StdDev => "stddev",
            Spread::Variance => "variance",
        }
    }

    fn accepted_types(&self) -> &'static str {
        match self.spread {
            Spread::StdDev => "`int`, `uint`, `double` or `duration`",
            Spread::Variance => "`int`, `uint` or `double`",
        }
    }
}

impl Aggregator for StdDevVariance {
    fn kind(&self) -> &'static str {
        self.name()
    }

    fn update(&mut self, batch: &Batch, path: &[usize], diagnostics: &DiagnosticBus) {
        if self.moments.state == MomentState::Poisoned {
            return;
        }
        let offset = path.to_vec();
        let name = self.name();
        for row in 0..batch.rows() {
            if self.moments.state == MomentState::Poisoned {
                return;
            }
            match batch.at(row, &offset) {
                ValueView::Null => {}
                ValueView::Duration(v) => {
                    if self.spread == Spread::Variance {
                        warn_unexpected_type(diagnostics, name, self.accepted_types(), "duration");
                        self.moments.state = MomentState::Poisoned;
                        continue;
                    }
                    match self.moments.state {
                        MomentState::None | MomentState::Duration => {
                            self.moments.state = MomentState::Duration;
                            self.moments.fold(v as f64);
                        }
                        MomentState::Numeric => {
                            warn_incompatible(diagnostics, name, "duration");
                            self.moments.state = MomentState::Poisoned;
                        }
                        MomentState::Poisoned => {}
                    }
                }
                numeric => {
                    let x = match numeric {
                        ValueView::Int64(v) => v as f64,
                        ValueView::Uint64(v) => v as f64,
                        ValueView::Double(v) if v.is_nan() => continue,
                        ValueView::Double(v) => v,
                        other => {
                            warn_unexpected_type(diagnostics, name, self.accepted_types(), kind_label(&other));
                            self.moments.state = MomentState::Poisoned;
                            continue;
                        }
                    };
                    match self.moments.state {
                        MomentState::None | MomentState::Numeric => {
                            self.moments.state = MomentState::Numeric;
                            self.moments.fold(x);
                        }
                        MomentState::Duration => {
                            warn_incompatible(diagnostics, name, "number");
                            self.moments.state = MomentState::Poisoned;
                        }
                        MomentState::Poisoned => {}
                    }
                }
            }
        }
    }

    fn get(&self) -> AggregateValue {
        if self.moments.count == 0 {
            return AggregateValue::Null;
        }
        let variance = self.moments.variance();
        let result = match self.spread {
            Spread::StdDev => variance.sqrt(),
            Spread::Variance => variance,
        };
        match self.moments.state {
            MomentState::Duration => AggregateValue::Duration(result as i64),
            _ => AggregateValue::Double(result),
        }
    }

    fn reset(&mut self) {
        self.moments = Moments::default();
    }

    fn save(&self) -> Vec<u8> {
        ReducerEnvelope::new(self.kind(), serde_json::to_vec(&self.moments).expect("Moments is JSON-serializable")).encode()
    }

    fn restore(&mut self, bytes: &[u8], diagnostics: &DiagnosticBus) {
        self.moments = restore_moments(bytes, diagnostics, self.name());
    }
}

fn kind_label(value: &ValueView<'_>) -> &'static str {
    match value {
        ValueView::Null => "null",
        ValueView::Bool(_) => "bool",
        ValueView::Int64(_) => "int",
        ValueView::Uint64(_) => "uint",
        ValueView::Double(_) => "double",
        ValueView::Duration(_) => "duration",
        ValueView::Time(_) => "time",
        ValueView::String(_) => "string",
        ValueView::Blob(_) => "blob",
        ValueView::Ip(_) => "ip",
        ValueView::Subnet(_) => "subnet",
        ValueView::Enum(_) => "enum",
    }
}
