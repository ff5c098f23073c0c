//! Structured diagnostic values with severity, code, location and notes.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a diagnostic applies.
///
/// Reference-binding problems have no source span; they point at the
/// offending entry of the compilation's reference list, or at the symbol
/// whose use revealed the problem.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Location {
    /// No specific location.
    None,
    /// The reference at this index of the compilation's reference list.
    Reference(usize),
    /// The display name of the symbol being used.
    UseSite(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::None => Ok(()),
            Location::Reference(index) => write!(f, "reference #{index}"),
            Location::UseSite(symbol) => write!(f, "use of `{symbol}`"),
        }
    }
}

/// A structured diagnostic message.
///
/// Each diagnostic includes a severity, a unique code, the primary message,
/// where it applies, and optional explanatory notes and help text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The reference or use site the diagnostic concerns.
    pub location: Location,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self::new(Severity::Error, code, message, location)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self::new(Severity::Warning, code, message, location)
    }

    fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Returns `true` for error-severity diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if self.location != Location::None {
            write!(f, " ({})", self.location)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::error(3);
        let diag = Diagnostic::error(code, "duplicate reference", Location::Reference(2));
        assert_eq!(diag.severity, Severity::Error);
        assert!(diag.is_error());
        assert_eq!(diag.message, "duplicate reference");
        assert_eq!(format!("{}", diag.code), "E003");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::warning(1);
        let diag = Diagnostic::warning(code, "assuming unified version", Location::None);
        assert_eq!(diag.severity, Severity::Warning);
        assert!(!diag.is_error());
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::error(7);
        let diag = Diagnostic::error(code, "unresolved", Location::UseSite("Lib.C".into()))
            .with_note("referenced by L2")
            .with_help("add a reference to Lib");
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn display_includes_location() {
        let code = DiagnosticCode::error(1);
        let diag = Diagnostic::error(code, "metadata file not found", Location::Reference(0));
        assert_eq!(
            diag.to_string(),
            "error[E001]: metadata file not found (reference #0)"
        );
        let bare = Diagnostic::error(code, "oops", Location::None);
        assert_eq!(bare.to_string(), "error[E001]: oops");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::warning(1);
        let diag = Diagnostic::warning(code, "w", Location::UseSite("T".into())).with_note("n");
        let json = serde_json::to_string(&diag).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(diag, back);
    }
}
