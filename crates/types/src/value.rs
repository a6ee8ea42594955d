// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use std::net::IpAddr;
use ipnet::IpNet;

/// A borrowed view of a single value read from a batch column (§3.2).
/// `ValueView` never owns data: it borrows from the batch's columnar
/// buffers and must not outlive the `Batch` it was read from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueView<'a> {
    Null,
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    /// Nanoseconds.
    Duration(i64),
    /// Nanoseconds since the Unix epoch.
    Time(i64),
    String(&'a str),
    Blob(&'a [u8]),
    Ip(IpAddr),
    Subnet(IpNet),
    /// Enum ordinal; resolve the name via `Type::enum_name`.
    Enum(u32),
}

impl<'a> ValueView<'a> {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ValueView::Null)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ValueView::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValueView::Double(v) => Some(*v),
            ValueView::Int64(v) => Some(*v as f64),
            ValueView::Uint64(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            ValueView::String(s) => Some(s),
            _ => None,
        }
    }
}
