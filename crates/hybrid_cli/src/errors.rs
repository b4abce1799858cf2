//! Diagnostic codes emitted by the command-line front end.

use hybrid_diagnostics::{Category, DiagnosticCode};

/// An input file is missing or unreadable.
pub const E001: DiagnosticCode = DiagnosticCode::new(Category::Error, 1);
