// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use crate::ty::{Kind, Type};

/// A resolved path into a record: a sequence of field indices, one per
/// nesting level (§3.1, §4.1).
pub type Offset = Vec<usize>;

/// A dotted path did not resolve against a record type (§4.1: "Unresolved
/// paths return a structured 'not found' — never an exception").
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("field `{field}` not found at `{at}`")]
    FieldNotFound { field: String, at: String },
    #[error("`{at}` is not a record, cannot descend into `{field}`")]
    NotARecord { at: String, field: String },
}

/// Resolves a dotted path (`a.b.c`) against a record type, trying the
/// literal full string as a single field name first, then falling back to
/// dot-segmented traversal (§4.1's "key algorithm").
pub fn resolve_path(record: &Type, path: &str) -> Result<Offset, PathError> {
    let fields = match record.kind() {
        Kind::Record(fields) => fields,
        _ => {
            return Err(PathError::NotARecord {
                at: record.to_string(),
                field: path.to_owned(),
            });
        }
    };

    // Literal match first: a field can itself be named "a.b".
    if let Some(index) = fields.index_of(path) {
        return Ok(vec![index]);
    }

    // Fall back to dotted-segment traversal.
    let mut offset = Vec::new();
    let mut current = record.clone();
    let mut consumed = String::new();
    for (i, segment) in path.split('.').enumerate() {
        if i > 0 {
            consumed.push('.');
        }
        consumed.push_str(segment);

        let fields = match current.kind() {
            Kind::Record(fields) => fields,
            _ => {
                return Err(PathError::NotARecord {
                    at: consumed[..consumed.len() - segment.len()].trim_end_matches('.').to_owned(),
                    field: segment.to_owned(),
                });
            }
        };
        let Some(index) = fields.index_of(segment) else {
            return Err(PathError::FieldNotFound {
                field: segment.to_owned(),
                at: consumed.clone(),
            });
        };
        offset.push(index);
        current = fields.get(index).expect("index_of returned valid index").ty.clone();
    }
    Ok(offset)
}
