//! Conformance test helpers for the hybrid transpiler.
//!
//! Runs C++ source text through the full pipeline (parse → analyze →
//! generate, or parse → FFI analysis → bindings) and returns structured
//! results for assertion in integration tests.

#![warn(missing_docs)]

use hybrid_codegen::{CodeGenerator, GenOptions, GeneratedCode, GoGenerator, RustGenerator};
use hybrid_config::{FfiTarget, Target};
use hybrid_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};
use hybrid_ffi::{FfiFile, FfiOptions};
use hybrid_ir::Ir;
use hybrid_source::SourceDb;

/// Result of running parse → analyze → generate.
pub struct PipelineResult {
    /// The analyzed IR.
    pub ir: Ir,
    /// Generated source, plus a separate test file for Go.
    pub code: GeneratedCode,
    /// All diagnostics emitted during the pipeline.
    pub diagnostics: Vec<Diagnostic>,
    /// Whether any errors were emitted.
    pub has_errors: bool,
    /// Number of error-severity diagnostics.
    pub error_count: usize,
    /// Number of warning-severity diagnostics.
    pub warning_count: usize,
}

impl PipelineResult {
    /// True if a diagnostic with `code` was emitted.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// The generated source text.
    pub fn source(&self) -> &str {
        &self.code.source
    }
}

/// Result of running the FFI pipeline.
pub struct FfiResult {
    /// Generated files in output order.
    pub files: Vec<FfiFile>,
    /// All diagnostics emitted.
    pub diagnostics: Vec<Diagnostic>,
}

impl FfiResult {
    /// Contents of the file called `name`, if generated.
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.contents.as_str())
    }

    /// Number of diagnostics with `code`.
    pub fn count_code(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }
}

/// Parses and analyzes `source` without generating anything.
pub fn analyze(source: &str) -> (Ir, Vec<Diagnostic>) {
    let mut db = SourceDb::new();
    let sink = DiagnosticSink::new();
    let file = db.add_source("test.cpp", source.to_string());
    let mut ir = hybrid_cpp_parser::parse_source(file, &db, &sink);
    hybrid_analyze::analyze(&mut ir, &sink);
    (ir, sink.take_all())
}

/// Runs the full pipeline with default generation options.
pub fn transpile(source: &str, target: Target) -> PipelineResult {
    transpile_with(source, target, &GenOptions::default())
}

/// Runs the full pipeline with explicit generation options.
pub fn transpile_with(source: &str, target: Target, opts: &GenOptions) -> PipelineResult {
    let mut db = SourceDb::new();
    let sink = DiagnosticSink::new();
    let file = db.add_source("test.cpp", source.to_string());
    let mut ir = hybrid_cpp_parser::parse_source(file, &db, &sink);
    hybrid_analyze::analyze(&mut ir, &sink);
    let code = generator(target).generate(&ir, opts, &sink);
    finish(ir, code, &sink)
}

/// Runs the FFI pipeline for `target`, with the wrapper including
/// `<library>.hpp`.
pub fn ffi(source: &str, library: &str, target: FfiTarget) -> FfiResult {
    let sink = DiagnosticSink::new();
    let opts = FfiOptions {
        include: Some(format!("{library}.hpp")),
        ..FfiOptions::default()
    };
    let files = hybrid_ffi::generate(source, library, target, &opts, &sink);
    FfiResult {
        files,
        diagnostics: sink.take_all(),
    }
}

fn generator(target: Target) -> &'static dyn CodeGenerator {
    match target {
        Target::Rust => &RustGenerator,
        Target::Go => &GoGenerator,
    }
}

fn finish(ir: Ir, code: GeneratedCode, sink: &DiagnosticSink) -> PipelineResult {
    let diagnostics = sink.take_all();
    let error_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warning_count = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();
    PipelineResult {
        ir,
        code,
        diagnostics,
        has_errors: error_count > 0,
        error_count,
        warning_count,
    }
}
