// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Severity of a diagnostic. Only `Error` changes control flow: it marks the
/// emitting operator instance as failed (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Secondary, non-actionable context. Never affects control flow.
    Note,
    /// A recoverable per-row or per-batch problem. Never affects control flow.
    Warning,
    /// Marks the emitting operator instance as failed and asks the scheduler
    /// to cancel the pipeline at the next suspension point.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// A byte range into the original pipeline text, used to point diagnostics at
/// the source that produced them. The surface parser (external) is the only
/// producer of the text these ranges index into; this crate only carries the
/// offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRef {
    /// Inclusive byte offset of the start of the referenced range.
    pub lo: u32,
    /// Exclusive byte offset of the end of the referenced range.
    pub hi: u32,
}

impl SourceRef {
    #[must_use]
    pub fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(lo <= hi, "source ref must not be inverted");
        Self { lo, hi }
    }
}

/// A secondary message attached to a diagnostic, with its own optional
/// source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
    pub source_ref: Option<SourceRef>,
}

impl Note {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_ref: None,
        }
    }

    #[must_use]
    pub fn at(message: impl Into<String>, source_ref: SourceRef) -> Self {
        Self {
            message: message.into(),
            source_ref: Some(source_ref),
        }
    }
}

/// A structured diagnostic emitted by an operator instance through the
/// control plane (§4.2). Diagnostics are data, never a control-flow
/// construct: only the scheduler interprets `severity == Error` specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub source_refs: Vec<SourceRef>,
    pub notes: Vec<Note>,
    pub docs_url: Option<String>,
    pub usage_string: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            source_refs: Vec::new(),
            notes: Vec::new(),
            docs_url: None,
            usage_string: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    #[must_use]
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    #[must_use]
    pub fn primary(mut self, source_ref: SourceRef) -> Self {
        self.source_refs.push(source_ref);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    #[must_use]
    pub fn with_docs(mut self, url: impl Into<String>) -> Self {
        self.docs_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage_string = Some(usage.into());
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders a single-line, `tracing`-friendly representation:
    /// `severity: message (at lo..hi)`.
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = format!("{}: {}", self.severity, self.message);
        if let Some(first) = self.source_refs.first() {
            out.push_str(&format!(" (at {}..{})", first.lo, first.hi));
        }
        for note in &self.notes {
            out.push_str(&format!("\n  note: {}", note.message));
        }
        out
    }
}
