//! Shared pipeline helpers for CLI commands.
//!
//! Configuration loading, input reading (with `E001` for unreadable files),
//! the parse and analyze step, diagnostic rendering and output writing.

use std::path::{Path, PathBuf};

use hybrid_config::{ConfigError, HybridConfig};
use hybrid_diagnostics::{
    Diagnostic, DiagnosticRenderer, DiagnosticSink, JsonRenderer, TerminalRenderer,
};
use hybrid_ir::Ir;
use hybrid_source::{FileId, SourceDb, Span};
use tracing::debug;

use crate::errors::E001;
use crate::{GlobalArgs, ReportFormat};

/// Failures that stop a command before or after the pipeline runs.
///
/// Problems inside the pipeline are diagnostics, not errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// `hybrid.toml` is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The working directory could not be determined.
    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    /// A generated file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The IR could not be serialized.
    #[error("failed to serialize IR: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads the configuration named by `--config`, or `hybrid.toml` in the
/// current directory when present.
pub fn load_config(global: &GlobalArgs) -> Result<HybridConfig, PipelineError> {
    let config = match &global.config {
        Some(path) => hybrid_config::load_config_file(Path::new(path))?,
        None => {
            let cwd = std::env::current_dir().map_err(PipelineError::CurrentDir)?;
            hybrid_config::load_config(&cwd)?
        }
    };
    Ok(config)
}

/// Reads `path` into `db`. An unreadable file is reported as `E001` and
/// yields `None`.
pub fn read_input(path: &Path, db: &mut SourceDb, sink: &DiagnosticSink) -> Option<FileId> {
    match db.load_file(path) {
        Ok(id) => {
            debug!(path = %path.display(), bytes = db.text(id).len(), "input loaded");
            Some(id)
        }
        Err(e) => {
            sink.emit(
                Diagnostic::error(
                    E001,
                    format!("cannot read input file `{}`: {e}", path.display()),
                    Span::DUMMY,
                )
                .with_help("check the file path and its permissions"),
            );
            None
        }
    }
}

/// Parses one loaded file and runs the feature analyzers over it.
pub fn parse_and_analyze(file: FileId, db: &SourceDb, sink: &DiagnosticSink) -> Ir {
    let mut ir = hybrid_cpp_parser::parse_source(file, db, sink);
    hybrid_analyze::analyze(&mut ir, sink);
    ir
}

/// Renders diagnostics: text to stderr, JSON lines to stdout.
pub fn render_diagnostics(
    diagnostics: &[Diagnostic],
    db: &SourceDb,
    format: ReportFormat,
    color: bool,
) {
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(color);
            for diag in diagnostics {
                eprint!("{}", renderer.render(diag, db));
            }
        }
        ReportFormat::Json => print!("{}", JsonRenderer.render_all(diagnostics, db)),
    }
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_output(path: &Path, contents: &str) -> Result<(), PipelineError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)
    };
    write().map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "output written");
    Ok(())
}

/// File name without directory or extension; "out" when there is none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string())
}

/// Directory containing `path`, or `.` for a bare file name.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config,
        }
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[transpile]\ntarget = \"go\"\nopt_level = 3\n").unwrap();
        let config = load_config(&global(Some(path.display().to_string()))).unwrap();
        assert_eq!(config.transpile.target, hybrid_config::Target::Go);
        assert_eq!(config.transpile.opt_level, 3);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = load_config(&global(Some(path.display().to_string()))).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::IoError(_))));
    }

    #[test]
    fn invalid_config_reports_validation_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hybrid.toml");
        fs::write(&path, "[transpile]\nopt_level = 9\n").unwrap();
        let err = load_config(&global(Some(path.display().to_string()))).unwrap_err();
        assert!(err.to_string().contains("opt_level"), "{err}");
    }

    #[test]
    fn unreadable_input_reports_e001() {
        let tmp = TempDir::new().unwrap();
        let mut db = SourceDb::new();
        let sink = DiagnosticSink::new();
        assert!(read_input(&tmp.path().join("missing.cpp"), &mut db, &sink).is_none());
        assert!(sink.has_code(E001));
        assert!(db.is_empty());
    }

    #[test]
    fn readable_input_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("add.cpp");
        fs::write(&path, "int add(int a, int b) { return a + b; }\n").unwrap();
        let mut db = SourceDb::new();
        let sink = DiagnosticSink::new();
        let file = read_input(&path, &mut db, &sink).unwrap();
        let ir = parse_and_analyze(file, &db, &sink);
        assert_eq!(ir.functions.len(), 1);
        assert!(!sink.has_errors());
    }

    #[test]
    fn write_output_creates_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gen").join("nested").join("a.rs");
        write_output(&path, "fn main() {}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fn main() {}\n");
    }

    #[test]
    fn stems_and_parents() {
        assert_eq!(file_stem(Path::new("src/point.cpp")), "point");
        assert_eq!(file_stem(Path::new("vector.hpp")), "vector");
        assert_eq!(parent_dir(Path::new("point.cpp")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("src/point.cpp")), PathBuf::from("src"));
    }
}
