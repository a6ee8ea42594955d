// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Adapts `arrow`'s columnar arrays to the engine's closed `Type` system
//! (§3.2, §4.1). The engine never reimplements compute kernels over these
//! arrays — it only reads scalar values out of them and hands whole arrays
//! to downstream operators untouched.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, DurationNanosecondArray, Float64Array,
    Int64Array, StringArray, StructArray, TimestampNanosecondArray, UInt32Array, UInt64Array,
};
use arrow::record_batch::RecordBatch;
use ipnet::IpNet;

use crate::path::Offset;
use crate::ty::{Kind, RecordFields, Type};
use crate::value::ValueView;

/// A contiguous set of rows sharing one `record` schema (§3.2).
///
/// Cloning a `Batch` is O(1): the underlying `arrow::record_batch::RecordBatch`
/// is reference counted and `subslice` shares buffers with its parent.
#[derive(Clone, Debug)]
pub struct Batch {
    schema: Type,
    data: RecordBatch,
    /// Monotonic import timestamp, nanoseconds since the Unix epoch.
    import_time: Option<i64>,
}

/// A programming error: the claimed schema does not structurally match the
/// arrow arrays backing a batch. Per §4.1 this is an assertion, not a
/// recoverable diagnostic — it indicates an operator constructed a batch
/// inconsistently with its own declared output schema.
#[derive(Debug, thiserror::Error)]
#[error("batch schema mismatch: expected {expected} top-level columns, arrow batch has {actual}")]
pub struct SchemaMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl Batch {
    /// Builds a batch from a record schema and a matching arrow
    /// `RecordBatch`. Asserts column-count agreement (§3.3); per-column type
    /// agreement is the caller's responsibility and is assumed, matching
    /// the "programming error" failure mode of §4.1.
    pub fn try_new(schema: Type, data: RecordBatch) -> Result<Self, SchemaMismatch> {
        let expected = match schema.kind() {
            Kind::Record(fields) => fields.len(),
            _ => 0,
        };
        if expected != data.num_columns() {
            return Err(SchemaMismatch { expected, actual: data.num_columns() });
        }
        Ok(Self { schema, data, import_time: None })
    }

    #[must_use]
    pub fn with_import_time(mut self, ts_ns: i64) -> Self {
        self.import_time = Some(ts_ns);
        self
    }

    #[must_use]
    pub fn import_time(&self) -> Option<i64> {
        self.import_time
    }

    #[must_use]
    pub fn schema(&self) -> &Type {
        &self.schema
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.num_rows()
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.data.num_columns()
    }

    #[must_use]
    pub fn fields(&self) -> &RecordFields {
        self.schema.fields().expect("batch schema is always a record, enforced at construction")
    }

    /// Returns a lazy view over column `i`. Panics (assertion, §4.1) if `i`
    /// is out of range — callers are expected to bound-check against
    /// `fields()` first.
    #[must_use]
    pub fn column(&self, i: usize) -> Column<'_> {
        let field = self.fields().get(i).expect("column index out of range");
        Column { array: self.data.column(i), ty: &field.ty }
    }

    /// O(1), zero-copy: shares buffers with `self` (§3.3).
    #[must_use]
    pub fn subslice(&self, begin: usize, end: usize) -> Batch {
        debug_assert!(begin <= end && end <= self.rows());
        Batch {
            schema: self.schema.clone(),
            data: self.data.slice(begin, end - begin),
            import_time: self.import_time,
        }
    }

    /// Reads the value at `row` along a resolved field-index path
    /// (§4.1: returns a structured view, a per-row type mismatch is the
    /// caller's job to turn into a warning — this function only reports
    /// whether the stored value itself is representable).
    #[must_use]
    pub fn at(&self, row: usize, offset: &Offset) -> ValueView<'_> {
        let mut array: ArrayRef = Arc::clone(self.data.column(*offset.first().unwrap_or(&0)));
        let mut ty = self
            .fields()
            .get(*offset.first().unwrap_or(&0))
            .map(|f| f.ty.clone())
            .unwrap_or_else(Type::null);
        let mut row = row;

        for &index in offset.iter().skip(1) {
            let Some(structs) = array.as_any().downcast_ref::<StructArray>() else {
                return ValueView::Null;
            };
            if structs.is_null(row) {
                return ValueView::Null;
            }
            array = Arc::clone(structs.column(index));
            ty = match ty.kind() {
                Kind::Record(fields) => fields.get(index).map(|f| f.ty.clone()).unwrap_or_else(Type::null),
                _ => Type::null(),
            };
            let _ = row; // struct children share the parent's logical row index
        }

        read_scalar(array.as_ref(), &ty, row)
    }
}

/// A lazily-evaluated view over one batch column: a typed array paired with
/// its declared element type (§3.2).
pub struct Column<'a> {
    array: &'a ArrayRef,
    ty: &'a Type,
}

impl<'a> Column<'a> {
    #[must_use]
    pub fn ty(&self) -> &Type {
        self.ty
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        self.array.is_null(row)
    }

    #[must_use]
    pub fn value(&self, row: usize) -> ValueView<'a> {
        read_scalar(self.array.as_ref(), self.ty, row)
    }

    #[must_use]
    pub fn array(&self) -> &'a ArrayRef {
        self.array
    }
}

fn read_scalar<'a>(array: &'a dyn Array, ty: &Type, row: usize) -> ValueView<'a> {
    if array.is_null(row) {
        return ValueView::Null;
    }
    match ty.kind() {
        Kind::Null => ValueView::Null,
        Kind::Bool => ValueView::Bool(downcast::<BooleanArray>(array).value(row)),
        Kind::Int64 => ValueView::Int64(downcast::<Int64Array>(array).value(row)),
        Kind::Uint64 => ValueView::Uint64(downcast::<UInt64Array>(array).value(row)),
        Kind::Double => ValueView::Double(downcast::<Float64Array>(array).value(row)),
        Kind::Duration => ValueView::Duration(downcast::<DurationNanosecondArray>(array).value(row)),
        Kind::Time => ValueView::Time(downcast::<TimestampNanosecondArray>(array).value(row)),
        Kind::String => ValueView::String(downcast::<StringArray>(array).value(row)),
        Kind::Blob => ValueView::Blob(downcast::<BinaryArray>(array).value(row)),
        Kind::Ip => {
            let text = downcast::<StringArray>(array).value(row);
            IpAddr::from_str(text).map(ValueView::Ip).unwrap_or(ValueView::Null)
        }
        Kind::Subnet => {
            let text = downcast::<StringArray>(array).value(row);
            IpNet::from_str(text).map(ValueView::Subnet).unwrap_or(ValueView::Null)
        }
        Kind::Enum(_) => ValueView::Enum(downcast::<UInt32Array>(array).value(row)),
        // Secrets never materialize as plaintext batch values (§4.5); a
        // `secret` column only ever carries opaque references elsewhere.
        Kind::Secret => ValueView::Null,
        // List/Record/Map are read structurally via `Batch::at`'s nested
        // descent, not as a single scalar view.
        Kind::List(_) | Kind::Record(_) | Kind::Map(_, _) => ValueView::Null,
    }
}

fn downcast<T: 'static>(array: &dyn Array) -> &T {
    array
        .as_any()
        .downcast_ref::<T>()
        .expect("column array type does not match declared field type (schema invariant violated)")
}
