//! Bindings for C++ code that is called rather than translated.
//!
//! A narrower pipeline than translation. [`FfiAnalyzer`] parses the source
//! and keeps only what can cross the C ABI, producing an [`FfiModule`]. Each
//! [`FfiTarget`] then renders that model:
//!
//! - `c-wrapper`: an `extern "C"` header plus the C++ file implementing it,
//! - `rust`: an `extern "C"` block with `#[repr(C)]` structs and safe,
//!   `Drop`-owning wrappers,
//! - `go`: cgo bindings with wrapper types and an explicit `Delete`.
//!
//! The Rust and Go bindings link against the library built from the C
//! wrapper layer.

#![warn(missing_docs)]

pub mod analyzer;
pub mod c_wrapper;
pub mod errors;
pub mod go;
pub mod model;
pub mod rust;

pub use analyzer::FfiAnalyzer;
pub use hybrid_config::FfiTarget;
pub use model::{FfiClass, FfiFunction, FfiModule, FfiStruct, FfiType, Incompatibility};

use hybrid_diagnostics::DiagnosticSink;
use tracing::debug;

/// Rendering switches shared by the binding generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiOptions {
    /// Header the wrapper implementation includes for the C++ declarations.
    pub include: Option<String>,
    /// `// SAFETY:` notes on Rust `unsafe` blocks.
    pub safety_comments: bool,
    /// File banners and doc comments.
    pub comments: bool,
    /// Go package name; the library prefix when absent.
    pub package: Option<String>,
}

impl Default for FfiOptions {
    fn default() -> Self {
        Self {
            include: None,
            safety_comments: true,
            comments: true,
            package: None,
        }
    }
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiFile {
    /// File name, without a directory.
    pub name: String,
    /// File contents.
    pub contents: String,
}

/// Analyzes `source` and renders the bindings for `target`.
pub fn generate(
    source: &str,
    library: &str,
    target: FfiTarget,
    opts: &FfiOptions,
    sink: &DiagnosticSink,
) -> Vec<FfiFile> {
    let module = FfiAnalyzer::new(library).analyze(source, sink);
    render(&module, target, opts)
}

/// Renders an analyzed module for `target`.
pub fn render(module: &FfiModule, target: FfiTarget, opts: &FfiOptions) -> Vec<FfiFile> {
    let files = match target {
        FfiTarget::CWrapper => vec![
            FfiFile {
                name: format!("{}.h", module.library),
                contents: c_wrapper::header(module, opts),
            },
            FfiFile {
                name: format!("{}_wrapper.cpp", module.library),
                contents: c_wrapper::implementation(module, opts),
            },
        ],
        FfiTarget::Rust => vec![FfiFile {
            name: format!("{}_ffi.rs", module.prefix),
            contents: rust::bindings(module, opts),
        }],
        FfiTarget::Go => vec![FfiFile {
            name: format!("{}_ffi.go", module.prefix),
            contents: go::bindings(module, opts),
        }],
    };
    debug!(
        ffi_target = %target,
        files = files.len(),
        entry_points = module.entry_points().count(),
        "ffi bindings rendered"
    );
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::W401;

    const SOURCE: &str = r#"
int32_t add(int32_t a, int32_t b) { return a + b; }
int sum(const std::vector<int>& values) { return 0; }
class Counter {
public:
    void bump() { n++; }
    int get() const { return n; }
private:
    int n = 0;
};
"#;

    #[test]
    fn c_wrapper_writes_header_and_implementation() {
        let sink = DiagnosticSink::new();
        let files = generate(SOURCE, "counter", FfiTarget::CWrapper, &FfiOptions::default(), &sink);
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["counter.h", "counter_wrapper.cpp"]);
        assert!(files[0].contents.contains("void* counter_counter_new(void);"));
        assert!(files[1].contents.contains("return new Counter();"));
    }

    #[test]
    fn each_target_names_its_file() {
        let sink = DiagnosticSink::new();
        let rust = generate(SOURCE, "my-lib", FfiTarget::Rust, &FfiOptions::default(), &sink);
        assert_eq!(rust[0].name, "my_lib_ffi.rs");
        let go = generate(SOURCE, "my-lib", FfiTarget::Go, &FfiOptions::default(), &sink);
        assert_eq!(go[0].name, "my_lib_ffi.go");
        assert!(go[0].contents.contains("package mylib"));
    }

    #[test]
    fn incompatible_declarations_are_reported_once_per_run() {
        let sink = DiagnosticSink::new();
        let files = generate(SOURCE, "counter", FfiTarget::Rust, &FfiOptions::default(), &sink);
        assert_eq!(sink.count_code(W401), 1);
        let reported: Vec<String> = sink
            .diagnostics()
            .into_iter()
            .filter(|d| d.code == W401)
            .map(|d| d.message)
            .collect();
        assert!(reported[0].contains("`sum`"), "{reported:?}");
        assert!(!files[0].contents.contains("sum("));
    }
}
