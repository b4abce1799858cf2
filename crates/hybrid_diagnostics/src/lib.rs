//! Structured warnings and errors for every pipeline stage.
//!
//! Nothing in the transpiler fails silently. A declaration the parser cannot
//! recognize, a construct a generator cannot lower, or a signature that cannot
//! cross the C ABI is reported as a [`Diagnostic`] with a stable
//! [`DiagnosticCode`] and pushed into a [`DiagnosticSink`]. The CLI renders the
//! collected diagnostics with a [`TerminalRenderer`] or a [`JsonRenderer`].

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
