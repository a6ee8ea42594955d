// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Universal schema type (§3.1), the columnar batch model (§3.2), and
//! `record` path resolution (§4.1's "key algorithm").
//!
//! The type system is a closed tagged union constructed programmatically;
//! no parsing lives here — that is the surface parser's job (§1, §6.1).
//! Batches adapt `arrow` (`RecordBatch`/`ArrayRef`) rather than reinventing a
//! columnar kernel library, matching the engine's explicit delegation of
//! compute kernels to a columnar library (spec Non-goals).

mod batch;
mod path;
mod ty;
mod value;

pub use batch::{Batch, Column, SchemaMismatch};
pub use path::{Offset, PathError, resolve_path};
pub use ty::{Attribute, Attributes, DuplicateFieldError, Field, Kind, RecordFields, Type};
pub use value::ValueView;
