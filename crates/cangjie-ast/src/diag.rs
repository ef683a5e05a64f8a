//! Diagnostics emitted by the frontend and republished by the scheduler.

use crate::pos::Range;
use serde::{Deserialize, Serialize};

/// Severity mirroring the LSP scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticSeverity {
    /// Compilation error.
    Error = 1,
    /// Warning.
    Warning = 2,
    /// Informational note.
    Information = 3,
    /// Hint.
    Hint = 4,
}

/// One diagnostic against a file version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source extent the diagnostic covers.
    pub range: Range,
    /// Severity.
    pub severity: DiagnosticSeverity,
    /// Human-readable message.
    pub message: String,
    /// Stable machine code, when one exists.
    pub code: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(range: Range, message: impl Into<String>) -> Self {
        Self { range, severity: DiagnosticSeverity::Error, message: message.into(), code: None }
    }

    /// Create a warning diagnostic.
    pub fn warning(range: Range, message: impl Into<String>) -> Self {
        Self { range, severity: DiagnosticSeverity::Warning, message: message.into(), code: None }
    }

    /// Attach a machine code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}
