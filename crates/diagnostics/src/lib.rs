// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The diagnostic bus: structured warnings and errors carried sideways out of
//! every operator instance, never as exceptions or panics.
//!
//! See `Diagnostic` for the wire shape and `DiagnosticHandler` for the sink
//! trait operators receive through the control plane.

mod bus;
mod diagnostic;

pub use bus::{DiagnosticBus, DiagnosticHandler, DiagnosticReceiver, TracingHandler, bus_channel};
pub use diagnostic::{Diagnostic, Note, Severity, SourceRef};
