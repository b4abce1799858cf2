//! Diagnostic codes for structural parse gaps.
//!
//! Warning codes `W101`--`W103` cover declarations the parser skipped and
//! structural problems it recovered from. None of them are fatal.

use hybrid_diagnostics::{Category, DiagnosticCode};

/// A declaration could not be recognized and was omitted.
pub const W101: DiagnosticCode = DiagnosticCode::new(Category::Warning, 101);

/// Braces do not balance; the enclosing construct runs to end of input.
pub const W102: DiagnosticCode = DiagnosticCode::new(Category::Warning, 102);

/// An out-of-line definition has no matching in-class declaration.
pub const W103: DiagnosticCode = DiagnosticCode::new(Category::Warning, 103);
