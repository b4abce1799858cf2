//! Feature analyzers that annotate the parsed IR in place.
//!
//! Four analyzers run over every function body and class:
//!
//! - **Templates** ([`TemplateAnalyzer`]): parameters, defaults, packs,
//!   concept constraints and specializations from the raw `template<...>`
//!   header.
//! - **Exceptions** ([`ExceptionAnalyzer`]): `try`/`catch` regions, `throw`
//!   sites and the `may_throw` flag.
//! - **Threading** ([`ThreadingAnalyzer`]): threads, lock scopes, atomics and
//!   condition variables, plus the class-level mutex/guarded-field map.
//! - **Async** ([`AsyncAnalyzer`]): coroutine keywords, futures, promises and
//!   `std::async` launches.
//!
//! Analyzers are independent of each other and of the order they run in. The
//! [`AnalysisEngine`] runs the registered set; [`analyze`] runs the builtins.

#![warn(missing_docs)]

mod body;
mod coroutines;
mod engine;
pub mod errors;
mod exceptions;
mod templates;
mod threading;

pub use coroutines::AsyncAnalyzer;
pub use engine::AnalysisEngine;
pub use exceptions::ExceptionAnalyzer;
pub use templates::{parse_template_header, TemplateAnalyzer};
pub use threading::ThreadingAnalyzer;

use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::{ClassDecl, Function, Ir};

/// One feature analyzer.
///
/// `analyze_function` is called for every free function. Classes go through
/// `analyze_class`, which by default analyzes each method; analyzers that
/// gather class-wide facts override it.
pub trait FeatureAnalyzer {
    /// Short kebab-case name (e.g. "exceptions").
    fn name(&self) -> &str;

    /// Annotates one function.
    fn analyze_function(&self, function: &mut Function, sink: &DiagnosticSink);

    /// Annotates a class and its methods.
    fn analyze_class(&self, class: &mut ClassDecl, sink: &DiagnosticSink) {
        for method in &mut class.methods {
            self.analyze_function(method, sink);
        }
    }
}

/// Runs every builtin analyzer over `ir`.
pub fn analyze(ir: &mut Ir, sink: &DiagnosticSink) {
    AnalysisEngine::with_builtins().run(ir, sink);
}
