//! Diagnostic codes emitted by the code generators.

use hybrid_diagnostics::{Category, DiagnosticCode};

/// No generator is registered under the requested target name.
pub const E002: DiagnosticCode = DiagnosticCode::new(Category::Error, 2);

/// A construct has no lowering rule for the target and was emitted as a
/// marked placeholder.
pub const W301: DiagnosticCode = DiagnosticCode::new(Category::Warning, 301);

/// Two bases of one class declare the same method.
pub const W302: DiagnosticCode = DiagnosticCode::new(Category::Warning, 302);

/// The base-class graph contains a cycle.
pub const W303: DiagnosticCode = DiagnosticCode::new(Category::Warning, 303);
