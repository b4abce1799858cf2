//! `hybrid transpile`: C++ to Rust or Go.
//!
//! 1. Load `hybrid.toml` and merge the command-line flags over it
//! 2. Resolve the target in the generator registry (`E002` stops here)
//! 3. For each input, in order: read (`E001`), parse, analyze, generate
//! 4. Write `<stem>.rs` or `<stem>.go`, plus `<stem>_test.go` for Go tests
//! 5. Render each input's diagnostics

use std::path::{Path, PathBuf};

use hybrid_codegen::{GenOptions, GeneratorRegistry};
use hybrid_config::{HybridConfig, TranspileConfig};
use hybrid_diagnostics::DiagnosticSink;
use hybrid_source::SourceDb;
use tracing::{debug, info};

use crate::pipeline::{
    self, file_stem, parent_dir, read_input, render_diagnostics, write_output, PipelineError,
};
use crate::{GlobalArgs, ReportFormat, TranspileArgs};

/// Where generated files go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    /// Beside each input.
    BesideInput,
    /// Into one directory.
    Dir(PathBuf),
    /// Exactly this file (single input only).
    File(PathBuf),
}

/// Runs the `hybrid transpile` command. Returns exit code 1 when any input
/// failed.
pub fn run(args: &TranspileArgs, global: &GlobalArgs) -> Result<i32, PipelineError> {
    let config = pipeline::load_config(global)?;
    let merged = merge_transpile_config(&config, args);
    let target = args
        .target
        .clone()
        .unwrap_or_else(|| merged.target.name().to_string());

    let registry = GeneratorRegistry::with_builtins();
    let mut db = SourceDb::new();
    let setup = DiagnosticSink::new();
    let Some(generator) = registry.resolve(&target, &setup) else {
        render_diagnostics(&setup.take_all(), &db, args.format, global.color);
        return Ok(1);
    };

    let opts = GenOptions::from_config(&merged);
    let destination = destination(args, &merged);
    debug!(
        generator = generator.name(),
        opt_level = opts.opt_level,
        ?destination,
        "transpile"
    );

    let mut failed = 0usize;
    let mut warnings = 0usize;
    for input in &args.inputs {
        let input = Path::new(input);
        let sink = DiagnosticSink::new();
        let outcome = match read_input(input, &mut db, &sink) {
            Some(file) => {
                let ir = pipeline::parse_and_analyze(file, &db, &sink);
                let code = generator.generate(&ir, &opts, &sink);
                let out = output_path(&destination, input, generator.file_extension());
                write_output(&out, &code.source)?;
                if let Some(tests) = &code.test_source {
                    let test_out = test_path(&out, generator.file_extension());
                    write_output(&test_out, tests)?;
                }
                Some(out)
            }
            None => None,
        };

        let diagnostics = sink.take_all();
        render_diagnostics(&diagnostics, &db, args.format, global.color);
        warnings += diagnostics
            .iter()
            .filter(|d| d.severity == hybrid_diagnostics::Severity::Warning)
            .count();
        let errors = diagnostics.iter().any(|d| d.severity.is_error());

        match outcome {
            Some(out) if !errors => {
                info!(input = %input.display(), output = %out.display(), "translated");
                if !global.quiet && args.format == ReportFormat::Text {
                    eprintln!("  Transpiled {} -> {}", input.display(), out.display());
                }
            }
            _ => failed += 1,
        }
    }

    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "      Result: {} file(s) translated, {} failed, {} warning(s)",
            args.inputs.len() - failed,
            failed,
            warnings
        );
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

/// Merges command-line flags over the `[transpile]` section. Flags win.
fn merge_transpile_config(config: &HybridConfig, args: &TranspileArgs) -> TranspileConfig {
    let mut merged = config.transpile.clone();
    if let Some(level) = args.opt_level {
        merged.opt_level = level;
    }
    if args.no_safety_checks {
        merged.safety_checks = false;
    }
    if args.no_comments {
        merged.preserve_comments = false;
    }
    if args.gen_tests {
        merged.generate_tests = true;
    }
    if let Some(output) = &args.output {
        merged.output_dir = Some(output.clone());
    }
    merged
}

/// `-o` names a file when there is one input and the path has an extension
/// and is not an existing directory. Otherwise it names a directory.
fn destination(args: &TranspileArgs, merged: &TranspileConfig) -> Destination {
    match (&args.output, &merged.output_dir) {
        (Some(out), _) => {
            let path = PathBuf::from(out);
            if args.inputs.len() == 1 && path.extension().is_some() && !path.is_dir() {
                Destination::File(path)
            } else {
                Destination::Dir(path)
            }
        }
        (None, Some(dir)) => Destination::Dir(PathBuf::from(dir)),
        (None, None) => Destination::BesideInput,
    }
}

fn output_path(destination: &Destination, input: &Path, extension: &str) -> PathBuf {
    let name = format!("{}.{extension}", file_stem(input));
    match destination {
        Destination::BesideInput => parent_dir(input).join(name),
        Destination::Dir(dir) => dir.join(name),
        Destination::File(file) => file.clone(),
    }
}

/// `<stem>_test.<ext>` beside the generated file.
fn test_path(output: &Path, extension: &str) -> PathBuf {
    parent_dir(output).join(format!("{}_test.{extension}", file_stem(output)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_config::Target;
    use std::fs;
    use tempfile::TempDir;

    const POINT: &str = r#"
class Point {
public:
    Point(double x, double y) : x_(x), y_(y) {}
    double getX() const { return x_; }
    double distance(const Point& other) const {
        double dx = x_ - other.x_;
        double dy = y_ - other.y_;
        return std::sqrt(dx * dx + dy * dy);
    }
private:
    double x_;
    double y_;
};
"#;

    fn args(inputs: Vec<String>) -> TranspileArgs {
        TranspileArgs {
            inputs,
            output: None,
            target: None,
            opt_level: None,
            no_safety_checks: false,
            no_comments: false,
            gen_tests: false,
            format: ReportFormat::Text,
        }
    }

    /// A config file in the temp dir keeps the test independent of the
    /// working directory.
    fn global(tmp: &TempDir, config: &str) -> GlobalArgs {
        let path = tmp.path().join("hybrid.toml");
        fs::write(&path, config).unwrap();
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(path.display().to_string()),
        }
    }

    fn write_point(tmp: &TempDir) -> String {
        let path = tmp.path().join("point.cpp");
        fs::write(&path, POINT).unwrap();
        path.display().to_string()
    }

    #[test]
    fn writes_rust_beside_the_input() {
        let tmp = TempDir::new().unwrap();
        let input = write_point(&tmp);
        let code = run(&args(vec![input]), &global(&tmp, "")).unwrap();
        assert_eq!(code, 0);
        let out = fs::read_to_string(tmp.path().join("point.rs")).unwrap();
        assert!(out.contains("pub struct Point {"), "{out}");
        assert!(out.contains("pub fn new(x: f64, y: f64) -> Self {"), "{out}");
    }

    #[test]
    fn go_target_with_tests_writes_two_files() {
        let tmp = TempDir::new().unwrap();
        let input = write_point(&tmp);
        let mut a = args(vec![input]);
        a.target = Some("go".to_string());
        a.gen_tests = true;
        assert_eq!(run(&a, &global(&tmp, "")).unwrap(), 0);
        let go = fs::read_to_string(tmp.path().join("point.go")).unwrap();
        assert!(go.contains("type Point struct {"), "{go}");
        let tests = fs::read_to_string(tmp.path().join("point_test.go")).unwrap();
        assert!(tests.contains("func TestNewPoint(t *testing.T) {"), "{tests}");
    }

    #[test]
    fn config_target_applies_without_flag() {
        let tmp = TempDir::new().unwrap();
        let input = write_point(&tmp);
        let code = run(&args(vec![input]), &global(&tmp, "[transpile]\ntarget = \"go\"\n")).unwrap();
        assert_eq!(code, 0);
        assert!(tmp.path().join("point.go").exists());
        assert!(!tmp.path().join("point.rs").exists());
    }

    #[test]
    fn unknown_target_fails_before_reading_inputs() {
        let tmp = TempDir::new().unwrap();
        let input = write_point(&tmp);
        let mut a = args(vec![input]);
        a.target = Some("python".to_string());
        assert_eq!(run(&a, &global(&tmp, "")).unwrap(), 1);
        assert!(!tmp.path().join("point.rs").exists());
    }

    #[test]
    fn missing_input_fails_but_others_are_translated() {
        let tmp = TempDir::new().unwrap();
        let input = write_point(&tmp);
        let missing = tmp.path().join("missing.cpp").display().to_string();
        let mut a = args(vec![missing, input]);
        a.output = Some(tmp.path().join("gen").display().to_string());
        assert_eq!(run(&a, &global(&tmp, "")).unwrap(), 1);
        assert!(tmp.path().join("gen").join("point.rs").exists());
        assert!(!tmp.path().join("gen").join("missing.rs").exists());
    }

    #[test]
    fn single_input_output_file() {
        let tmp = TempDir::new().unwrap();
        let input = write_point(&tmp);
        let mut a = args(vec![input]);
        let out = tmp.path().join("renamed.rs");
        a.output = Some(out.display().to_string());
        assert_eq!(run(&a, &global(&tmp, "")).unwrap(), 0);
        assert!(out.exists());
    }

    #[test]
    fn flags_override_config() {
        let config = HybridConfig {
            transpile: TranspileConfig {
                target: Target::Go,
                opt_level: 0,
                ..TranspileConfig::default()
            },
            ..HybridConfig::default()
        };
        let mut a = args(vec!["a.cpp".to_string()]);
        a.opt_level = Some(3);
        a.no_safety_checks = true;
        a.no_comments = true;
        a.gen_tests = true;
        let merged = merge_transpile_config(&config, &a);
        assert_eq!(merged.target, Target::Go);
        assert_eq!(merged.opt_level, 3);
        assert!(!merged.safety_checks);
        assert!(!merged.preserve_comments);
        assert!(merged.generate_tests);
    }

    #[test]
    fn output_paths() {
        let input = Path::new("src/point.cpp");
        assert_eq!(
            output_path(&Destination::BesideInput, input, "rs"),
            PathBuf::from("src/point.rs")
        );
        assert_eq!(
            output_path(&Destination::Dir(PathBuf::from("out")), input, "go"),
            PathBuf::from("out/point.go")
        );
        assert_eq!(
            test_path(Path::new("out/point.go"), "go"),
            PathBuf::from("out/point_test.go")
        );
    }

    #[test]
    fn output_flag_with_several_inputs_is_a_directory() {
        let mut a = args(vec!["a.cpp".to_string(), "b.cpp".to_string()]);
        a.output = Some("gen.rs".to_string());
        let merged = merge_transpile_config(&HybridConfig::default(), &a);
        assert_eq!(destination(&a, &merged), Destination::Dir(PathBuf::from("gen.rs")));
    }
}
