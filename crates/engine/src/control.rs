// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The control-plane handle every operator instance receives (§4.5).
//!
//! Grounded on the teacher's `control.rs`/`effect_handler.rs` pair: a
//! `!Send` handle threading diagnostics, metrics, and lifecycle signaling
//! through to node implementations. The shape here is narrower (no
//! timer/config messages — those are scheduler-internal in this model)
//! but keeps the same "cheap handle, shared atomics underneath" design.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tenzir_diagnostics::{Diagnostic, DiagnosticBus};
use tenzir_telemetry::{MetricSchema, MetricsReporter, TelemetryError};

/// A reference to a secret value, opaque to operators. Only a
/// `SecretResolver` may turn this into plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    /// The secret's value is the literal string (e.g. typed directly by a
    /// pipeline author); still routed through resolution so operators
    /// never special-case it.
    Literal(String),
    /// A name looked up through a host-configured provider.
    Named(String),
    /// Concatenation of nested references, resolved left to right.
    Concat(Vec<SecretRef>),
}

/// Plaintext secret material. Zeroized on drop so it does not linger in
/// freed heap memory after an operator instance is torn down (§4.5).
pub struct SecretPlaintext(String);

impl SecretPlaintext {
    #[must_use]
    pub fn new(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl SecretPlaintext {
    fn zeroize(&mut self) {
        // SAFETY: writing zero bytes over a String's own buffer in place;
        // the length is left unchanged so no allocator invariant is broken,
        // and the result ("\0\0...") remains valid UTF-8.
        unsafe {
            for byte in self.0.as_bytes_mut() {
                *byte = 0;
            }
        }
    }
}

impl Drop for SecretPlaintext {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for SecretPlaintext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretPlaintext(<redacted>)")
    }
}

/// A single secret to resolve: the caller-owned name and the reference to
/// resolve it from, paired so the resolver can report which one failed.
#[derive(Debug, Clone)]
pub struct SecretRequest {
    pub name: String,
    pub reference: SecretRef,
}

#[derive(Debug, thiserror::Error)]
pub enum SecretResolutionError {
    #[error("secret `{name}` could not be resolved: {reason}")]
    Failed { name: String, reason: String },
}

/// External collaborator that materializes secret plaintext. Injected by
/// the embedder (§6); the scheduler drives it on behalf of a suspended
/// operator.
pub trait SecretResolver {
    fn resolve(&self, requests: &[SecretRequest]) -> Result<Vec<SecretPlaintext>, SecretResolutionError>;
}

/// A resolver that always fails, used when no embedder-supplied resolver
/// is configured and an operator nonetheless asks for a named secret.
#[derive(Debug, Default)]
pub struct NoSecretsResolver;

impl SecretResolver for NoSecretsResolver {
    fn resolve(&self, requests: &[SecretRequest]) -> Result<Vec<SecretPlaintext>, SecretResolutionError> {
        requests
            .first()
            .map(|r| {
                Err(SecretResolutionError::Failed {
                    name: r.name.clone(),
                    reason: "no secret resolver configured".into(),
                })
            })
            .unwrap_or(Ok(Vec::new()))
    }
}

/// Opaque per-operator identity used by the scheduler for bookkeeping
/// (`self()` in §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorId(pub usize);

/// Shared shutdown flag. Cloneable handle over a single `AtomicBool`
/// owned by the scheduler; every operator's control plane reads from it.
#[derive(Debug, Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The control-plane handle passed to `Operator::instantiate` (§4.5).
/// `!Send` by design (mirrors the teacher's single-threaded node
/// handles): diagnostics and waiting state are `Rc<RefCell<_>>`, shared
/// only within the scheduler that owns this pipeline instance.
#[derive(Clone)]
pub struct ControlPlane {
    id: OperatorId,
    operator_name: Rc<str>,
    operator_index: usize,
    diagnostics: DiagnosticBus,
    metrics: MetricsReporter,
    shutdown: ShutdownFlag,
    waiting: Rc<Cell<bool>>,
    resolver: Rc<dyn SecretResolver>,
    pending_secrets: Rc<RefCell<Option<Result<Vec<SecretPlaintext>, SecretResolutionError>>>>,
}

impl ControlPlane {
    #[must_use]
    pub fn new(
        id: OperatorId,
        operator_name: impl Into<Rc<str>>,
        operator_index: usize,
        diagnostics: DiagnosticBus,
        metrics: MetricsReporter,
        shutdown: ShutdownFlag,
        resolver: Rc<dyn SecretResolver>,
    ) -> Self {
        Self {
            id,
            operator_name: operator_name.into(),
            operator_index,
            diagnostics,
            metrics,
            shutdown,
            waiting: Rc::new(Cell::new(false)),
            resolver,
            pending_secrets: Rc::new(RefCell::new(None)),
        }
    }

    #[must_use]
    pub fn self_id(&self) -> OperatorId {
        self.id
    }

    pub fn diagnostics(&self) -> &DiagnosticBus {
        &self.diagnostics
    }

    /// Emits a diagnostic. An `error`-severity diagnostic additionally
    /// requests pipeline shutdown (§4.2): the scheduler cancels at the
    /// next suspension point rather than unwinding immediately.
    pub fn emit(&self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.shutdown.request();
        }
        self.diagnostics.emit(diagnostic);
    }

    /// Publishes a metric under this operator's `(name, index,
    /// metric_schema)` key.
    pub fn metrics_counter(&self, metric_name: &str, delta: u64) -> Result<(), TelemetryError> {
        let schema = MetricSchema::new(self.operator_name.as_ref(), self.operator_index, metric_name);
        self.metrics.incr_counter(&schema, delta)
    }

    pub fn metrics_gauge(&self, metric_name: &str, value: i64) -> Result<(), TelemetryError> {
        let schema = MetricSchema::new(self.operator_name.as_ref(), self.operator_index, metric_name);
        self.metrics.set_gauge(&schema, value)
    }

    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }

    pub fn set_waiting(&self, waiting: bool) {
        self.waiting.set(waiting);
    }

    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting.get()
    }

    /// Resolves a batch of secret requests through the configured
    /// resolver. The operator contract requires suspending (yielding
    /// `StepOutcome::AwaitSecrets`) before calling this and reading the
    /// plaintext only after the scheduler resumes it (§4.5); this method
    /// itself is a plain blocking-free call the scheduler performs on the
    /// operator's behalf.
    pub fn resolve_secrets(
        &self,
        requests: &[SecretRequest],
    ) -> Result<Vec<SecretPlaintext>, SecretResolutionError> {
        self.resolver.resolve(requests)
    }

    /// Resolves `requests` and stashes the outcome for the operator to pick
    /// up via [`Self::take_resolved_secrets`] the next time its generator is
    /// polled. Called by the scheduler (`govern`) in response to a
    /// `StepOutcome::AwaitSecrets` yield; this is what "resume the operator"
    /// means in practice, since a `Stream` has no channel to push a value
    /// into a suspended poll other than driving it again.
    pub fn resume_with_resolved_secrets(&self, requests: &[SecretRequest]) {
        let result = self.resolve_secrets(requests);
        *self.pending_secrets.borrow_mut() = Some(result);
    }

    /// Takes the most recently resolved secret batch, if any. An operator
    /// that yields `AwaitSecrets` calls this immediately after being polled
    /// again; `None` means no resolution has landed yet.
    pub fn take_resolved_secrets(&self) -> Option<Result<Vec<SecretPlaintext>, SecretResolutionError>> {
        self.pending_secrets.borrow_mut().take()
    }
}

/// Pipeline-wide state shared across all operator control planes: the
/// shutdown flag and the secret resolver, assembled once and handed to
/// every operator's `ControlPlane::new` at instantiation time.
pub struct ControlPlaneContext {
    pub diagnostics: DiagnosticBus,
    pub metrics: MetricsReporter,
    pub shutdown: ShutdownFlag,
    pub resolver: Rc<dyn SecretResolver>,
}

impl ControlPlaneContext {
    #[must_use]
    pub fn new(diagnostics: DiagnosticBus, metrics: MetricsReporter) -> Self {
        Self {
            diagnostics,
            metrics,
            shutdown: ShutdownFlag::new(),
            resolver: Rc::new(NoSecretsResolver),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Rc<dyn SecretResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn control_plane_for(&self, id: OperatorId, operator_name: &str, operator_index: usize) -> ControlPlane {
        ControlPlane::new(
            id,
            operator_name,
            operator_index,
            self.diagnostics.clone(),
            self.metrics.clone(),
            self.shutdown.clone(),
            Rc::clone(&self.resolver),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ControlPlaneContext {
        let (bus, _rx) = tenzir_diagnostics::bus_channel(16);
        ControlPlaneContext::new(bus, MetricsReporter::new())
    }

    #[test]
    fn shutdown_flag_is_shared_across_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_requested());
        flag.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn emitting_error_requests_shutdown() {
        let ctx = context();
        let plane = ctx.control_plane_for(OperatorId(0), "where", 0);
        assert!(!ctx.shutdown.is_requested());
        plane.emit(Diagnostic::error("boom"));
        assert!(ctx.shutdown.is_requested());
    }

    #[test]
    fn emitting_warning_does_not_request_shutdown() {
        let ctx = context();
        let plane = ctx.control_plane_for(OperatorId(0), "where", 0);
        plane.emit(Diagnostic::warning("hmm"));
        assert!(!ctx.shutdown.is_requested());
    }

    #[test]
    fn waiting_state_round_trips() {
        let ctx = context();
        let plane = ctx.control_plane_for(OperatorId(0), "where", 0);
        assert!(!plane.is_waiting());
        plane.set_waiting(true);
        assert!(plane.is_waiting());
    }

    #[test]
    fn metrics_are_keyed_by_operator_name_and_index() {
        let ctx = context();
        let a = ctx.control_plane_for(OperatorId(0), "where", 0);
        let b = ctx.control_plane_for(OperatorId(1), "where", 1);
        a.metrics_counter("rows_dropped", 5).unwrap();
        assert_eq!(
            ctx.metrics
                .counter_value(&MetricSchema::new("where", 0, "rows_dropped")),
            Some(5)
        );
        assert_eq!(
            ctx.metrics
                .counter_value(&MetricSchema::new("where", 1, "rows_dropped")),
            None
        );
        let _ = b;
    }

    #[test]
    fn no_secrets_resolver_fails_named_requests() {
        let resolver = NoSecretsResolver;
        let requests = vec![SecretRequest {
            name: "api_key".into(),
            reference: SecretRef::Named("api_key".into()),
        }];
        assert!(resolver.resolve(&requests).is_err());
    }

    #[test]
    fn secret_plaintext_zeroizes_before_drop() {
        let mut plaintext = SecretPlaintext::new("s3cr3t".to_string());
        plaintext.zeroize();
        assert!(plaintext.expose().bytes().all(|b| b == 0));
    }
}
