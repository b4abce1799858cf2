//! Rust and Go code generation from the analyzed IR.
//!
//! Each target implements [`CodeGenerator`]: a pure function of the IR and
//! the [`GenOptions`] that returns the translated source text. Generation is
//! total. A construct a target cannot lower is written as a marked
//! placeholder and reported as `W301`; it never aborts the unit.
//!
//! Function bodies reach the generators as raw text. The [`lower`] module
//! reads them into a statement tree that both printers walk.
//!
//! Targets are looked up by name in a [`GeneratorRegistry`], which reports
//! `E002` for a name nothing is registered under.

#![warn(missing_docs)]

pub mod errors;
mod facts;
pub mod go;
mod inheritance;
pub mod lower;
mod naming;
mod options;
mod registry;
pub mod rust;
mod typing;
mod writer;

pub use go::GoGenerator;
pub use options::{Commentary, GenOptions};
pub use registry::GeneratorRegistry;
pub use rust::RustGenerator;
pub use writer::CodeWriter;

use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::Ir;

/// Output of one generator run over one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    /// The translated source file.
    pub source: String,
    /// A separate test file, for targets whose tests live beside the code
    /// (Go's `_test.go`).
    pub test_source: Option<String>,
}

/// A target language printer.
pub trait CodeGenerator {
    /// Target name used on the command line (e.g. "rust").
    fn name(&self) -> &'static str;

    /// Extension of generated files, without the dot.
    fn file_extension(&self) -> &'static str;

    /// Translates `ir`. Deterministic: the same IR and options always give
    /// the same text.
    fn generate(&self, ir: &Ir, opts: &GenOptions, sink: &DiagnosticSink) -> GeneratedCode;
}

/// Generates code for `target` with the builtin registry.
///
/// Returns `None` and emits `E002` when no generator is registered under
/// `target`.
pub fn generate(
    target: &str,
    ir: &Ir,
    opts: &GenOptions,
    sink: &DiagnosticSink,
) -> Option<GeneratedCode> {
    let registry = GeneratorRegistry::with_builtins();
    let generator = registry.resolve(target, sink)?;
    Some(generator.generate(ir, opts, sink))
}
