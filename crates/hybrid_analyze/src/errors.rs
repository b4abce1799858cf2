//! Diagnostic codes emitted by the feature analyzers.

use hybrid_diagnostics::{Category, DiagnosticCode};

/// A `throw` can escape a function declared `noexcept` or `throw()`.
pub const W201: DiagnosticCode = DiagnosticCode::new(Category::Warning, 201);

/// A `template<...>` header could not be split into parameters.
pub const W202: DiagnosticCode = DiagnosticCode::new(Category::Warning, 202);
