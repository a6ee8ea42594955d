// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The optimizer contract (§4.7): predicate push-down and order-invariance
//! propagation through `Operator::optimize`.
//!
//! `Filter` is a small boolean expression tree over dotted record paths,
//! sufficient to express push-down composition without depending on the
//! external pipeline-language parser's AST (that parser lives outside this
//! crate, per §1/§6.1).

use tenzir_types::Offset;

/// A boolean predicate over a single batch's rows, expressed structurally
/// so operators can combine, negate, and partially consume filters without
/// re-parsing text.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Always true; the identity element for push-down composition.
    True,
    /// Field at `path` equals the given scalar, compared as `f64`/`&str`
    /// depending on the declared type at assembly time. The comparison
    /// value is carried as a pre-rendered string so `Filter` stays
    /// `Clone`/`PartialEq` without depending on `tenzir_types::ValueView`'s
    /// borrowed lifetime.
    Eq { path: Offset, rendered: String },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    #[must_use]
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::True, f) | (f, Filter::True) => f,
            (a, b) => Filter::And(Box::new(a), Box::new(b)),
        }
    }

    #[must_use]
    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::True, _) | (_, Filter::True) => Filter::True,
            (a, b) => Filter::Or(Box::new(a), Box::new(b)),
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Filter::True)
    }
}

/// Whether a pipeline segment is promised to preserve row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrder {
    Ordered,
    Unordered,
}

// `OptimizeResult` itself lives in `operator.rs`: it carries an optional
// replacement `Box<dyn Operator>`, and `Operator` is the trait that module
// owns.
