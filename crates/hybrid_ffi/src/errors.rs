//! Diagnostic codes emitted by the FFI subsystem.

use hybrid_diagnostics::{Category, DiagnosticCode};

/// A declaration cannot cross the C ABI and was left out of the bindings.
pub const W401: DiagnosticCode = DiagnosticCode::new(Category::Warning, 401);
