//! Per-translation-unit diagnostic collector.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::cell::{Cell, RefCell};

/// Collects diagnostics for one translation unit.
///
/// Stages only hold a shared reference, so emission goes through interior
/// mutability. The transpiler processes one file at a time on one thread and
/// creates a fresh sink per file, which keeps a bad file from leaking
/// diagnostics into the next.
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: RefCell<Vec<Diagnostic>>,
    errors: Cell<usize>,
    warnings: Cell<usize>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.errors.set(self.errors.get() + 1),
            Severity::Warning => self.warnings.set(self.warnings.get() + 1),
            Severity::Note => {}
        }
        self.diagnostics.borrow_mut().push(diag);
    }

    /// True once any error has been emitted.
    pub fn has_errors(&self) -> bool {
        self.errors.get() > 0
    }

    /// Number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    /// Number of warnings emitted so far.
    pub fn warning_count(&self) -> usize {
        self.warnings.get()
    }

    /// True if a diagnostic with `code` has been emitted.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.borrow().iter().any(|d| d.code == code)
    }

    /// Number of diagnostics with `code`.
    pub fn count_code(&self, code: DiagnosticCode) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.code == code)
            .count()
    }

    /// Returns a copy of everything collected so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Drains the collected diagnostics. Counters are not reset.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;
    use hybrid_source::Span;

    const W101: DiagnosticCode = DiagnosticCode::new(Category::Warning, 101);
    const E001: DiagnosticCode = DiagnosticCode::new(Category::Error, 1);

    #[test]
    fn empty_sink() {
        let sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.warning_count(), 0);
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn counts_by_severity() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::warning(W101, "skipped", Span::DUMMY));
        sink.emit(Diagnostic::warning(W101, "skipped again", Span::DUMMY));
        sink.emit(Diagnostic::error(E001, "unreadable", Span::DUMMY));
        sink.emit(Diagnostic::note(W101, "context", Span::DUMMY));
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.warning_count(), 2);
        assert!(sink.has_errors());
        assert_eq!(sink.count_code(W101), 3);
        assert!(sink.has_code(E001));
    }

    #[test]
    fn take_all_drains_but_keeps_counts() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::error(E001, "unreadable", Span::DUMMY));
        assert_eq!(sink.take_all().len(), 1);
        assert!(sink.take_all().is_empty());
        assert_eq!(sink.error_count(), 1);
    }
}
