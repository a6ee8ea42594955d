// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use crate::diagnostic::{Diagnostic, Severity};
use tenzir_channel::mpsc;

/// Receives diagnostics emitted by any operator instance in a pipeline.
///
/// Implementations MUST NOT block the emitting operator's cooperative
/// worker; the default `TracingHandler` only ever does a non-blocking
/// `tracing` event emission.
pub trait DiagnosticHandler {
    fn handle(&mut self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to the `tracing` subscriber at a level matching
/// its severity, the way the teacher's nodes route operational signals
/// through `tracing` rather than bespoke logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl DiagnosticHandler for TracingHandler {
    fn handle(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => tracing::error!(target: "tenzir::diagnostics", "{}", diagnostic.render_plain()),
            Severity::Warning => tracing::warn!(target: "tenzir::diagnostics", "{}", diagnostic.render_plain()),
            Severity::Note => tracing::info!(target: "tenzir::diagnostics", "{}", diagnostic.render_plain()),
        }
    }
}

/// The sending half of the diagnostic bus, cloned into every operator's
/// control-plane handle. Emitting `Error` sets a sticky flag the scheduler
/// polls at suspension points (§4.2).
#[derive(Clone)]
pub struct DiagnosticBus {
    sender: mpsc::Sender<Diagnostic>,
}

impl DiagnosticBus {
    pub fn emit(&self, diagnostic: Diagnostic) {
        // Diagnostics are best-effort: a full or closed bus (e.g. the
        // pipeline is already tearing down) must never block or panic the
        // emitting operator.
        let _ = self.sender.send(diagnostic);
    }
}

/// Creates a bound diagnostic bus: a cheaply-cloneable sender handed to
/// every operator instance, and a single receiver drained by the pipeline's
/// owner (or a test harness) into a `DiagnosticHandler`.
#[must_use]
pub fn bus_channel(capacity: usize) -> (DiagnosticBus, DiagnosticReceiver) {
    let (tx, rx) = mpsc::Channel::new(capacity);
    (DiagnosticBus { sender: tx }, DiagnosticReceiver { receiver: rx })
}

/// The receiving half of the diagnostic bus.
pub struct DiagnosticReceiver {
    receiver: mpsc::Receiver<Diagnostic>,
}

impl DiagnosticReceiver {
    /// Drains every diagnostic currently buffered, in FIFO order, into the
    /// given handler. Does not block.
    pub fn drain_into(&self, handler: &mut dyn DiagnosticHandler) {
        while let Ok(diagnostic) = self.receiver.try_recv() {
            handler.handle(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector(Vec<Diagnostic>);
    impl DiagnosticHandler for Collector {
        fn handle(&mut self, diagnostic: Diagnostic) {
            self.0.push(diagnostic);
        }
    }

    #[test]
    fn emitted_diagnostics_drain_in_order() {
        let (bus, rx) = bus_channel(8);
        bus.emit(Diagnostic::warning("first"));
        bus.emit(Diagnostic::error("second"));
        let mut collector = Collector(Vec::new());
        rx.drain_into(&mut collector);
        assert_eq!(collector.0.len(), 2);
        assert_eq!(collector.0[0].message, "first");
        assert_eq!(collector.0[1].message, "second");
        assert!(collector.0[1].is_error());
    }

    #[test]
    fn emit_on_closed_bus_does_not_panic() {
        let (bus, rx) = bus_channel(1);
        drop(rx);
        bus.emit(Diagnostic::note("nobody is listening"));
    }
}
