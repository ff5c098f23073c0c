//! Thread-safe diagnostic accumulator.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A thread-safe accumulator for diagnostics emitted during a resolve pass.
///
/// Multiple threads can emit diagnostics concurrently via [`emit`](Self::emit);
/// image loading runs in parallel, so emission order is not meaningful until
/// [`sorted`](Self::sorted) is applied. The error count is tracked atomically
/// for fast `has_errors` checks without locking the diagnostic vector.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Emits a diagnostic into the sink.
    ///
    /// If the diagnostic has [`Severity::Error`], the error count is incremented atomically.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.diagnostics.lock().push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Drains the sink and orders the result by location, then code.
    pub fn sorted(&self) -> Vec<Diagnostic> {
        let mut all = self.take_all();
        all.sort_by(|a, b| {
            location_rank(a)
                .cmp(&location_rank(b))
                .then_with(|| a.code.number.cmp(&b.code.number))
                .then_with(|| a.message.cmp(&b.message))
        });
        all
    }
}

fn location_rank(diag: &Diagnostic) -> (u8, usize) {
    match diag.location {
        crate::Location::Reference(index) => (0, index),
        crate::Location::UseSite(_) => (1, 0),
        crate::Location::None => (2, 0),
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
