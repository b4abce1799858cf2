//! `hybrid ffi`: bindings for C++ code that stays native.
//!
//! `c-wrapper` writes `<lib>.h` and `<lib>_wrapper.cpp`; `rust` and `go`
//! write bindings that link against the library built from them.

use std::path::{Path, PathBuf};

use hybrid_config::{FfiConfig, FfiTarget, HybridConfig};
use hybrid_diagnostics::DiagnosticSink;
use hybrid_ffi::FfiOptions;
use hybrid_source::SourceDb;
use tracing::info;

use crate::pipeline::{
    self, file_stem, parent_dir, read_input, render_diagnostics, write_output, PipelineError,
};
use crate::{FfiArgs, GlobalArgs, ReportFormat};

/// Runs the `hybrid ffi` command.
pub fn run(args: &FfiArgs, global: &GlobalArgs) -> Result<i32, PipelineError> {
    let config = pipeline::load_config(global)?;
    let target = match &args.target {
        Some(name) => name.parse::<FfiTarget>()?,
        None => config.ffi.target,
    };
    let input = Path::new(&args.input);
    let library = library_name(args, &config, input);

    let mut db = SourceDb::new();
    let sink = DiagnosticSink::new();
    let Some(file) = read_input(input, &mut db, &sink) else {
        render_diagnostics(&sink.take_all(), &db, ReportFormat::Text, global.color);
        return Ok(1);
    };

    let opts = FfiOptions {
        include: input.file_name().map(|n| n.to_string_lossy().into_owned()),
        ..FfiOptions::default()
    };
    let files = hybrid_ffi::generate(db.text(file), &library, target, &opts, &sink);

    let out_dir = args
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| parent_dir(input));
    for generated in &files {
        let path = out_dir.join(&generated.name);
        write_output(&path, &generated.contents)?;
        info!(output = %path.display(), ffi_target = %target, "bindings written");
        if !global.quiet {
            eprintln!("   Generated {}", path.display());
        }
    }

    let diagnostics = sink.take_all();
    render_diagnostics(&diagnostics, &db, ReportFormat::Text, global.color);
    Ok(if diagnostics.iter().any(|d| d.severity.is_error()) {
        1
    } else {
        0
    })
}

/// `--lib`, then a library named in `[ffi]`, then the input's stem.
fn library_name(args: &FfiArgs, config: &HybridConfig, input: &Path) -> String {
    if let Some(lib) = &args.lib {
        return lib.clone();
    }
    if config.ffi.library != FfiConfig::default().library {
        return config.ffi.library.clone();
    }
    file_stem(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CALC: &str = r#"
int32_t add(int32_t a, int32_t b) { return a + b; }
class Calculator {
public:
    explicit Calculator(int32_t v) : value_(v) {}
    int32_t getValue() const { return value_; }
private:
    int32_t value_;
};
"#;

    fn setup(config: &str) -> (TempDir, String, GlobalArgs) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("calc.hpp");
        fs::write(&input, CALC).unwrap();
        let cfg = tmp.path().join("hybrid.toml");
        fs::write(&cfg, config).unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(cfg.display().to_string()),
        };
        (tmp, input.display().to_string(), global)
    }

    fn args(input: String, target: Option<&str>) -> FfiArgs {
        FfiArgs {
            input,
            target: target.map(str::to_string),
            lib: None,
            output: None,
        }
    }

    #[test]
    fn c_wrapper_is_the_default() {
        let (tmp, input, global) = setup("");
        assert_eq!(run(&args(input, None), &global).unwrap(), 0);
        let header = fs::read_to_string(tmp.path().join("calc.h")).unwrap();
        assert!(header.contains("int32_t calc_add(int32_t a, int32_t b);"), "{header}");
        let cpp = fs::read_to_string(tmp.path().join("calc_wrapper.cpp")).unwrap();
        assert!(cpp.contains("#include \"calc.hpp\""), "{cpp}");
    }

    #[test]
    fn rust_bindings_use_the_named_library() {
        let (tmp, input, global) = setup("");
        let mut a = args(input, Some("rust"));
        a.lib = Some("mathlib".to_string());
        a.output = Some(tmp.path().join("bindings").display().to_string());
        assert_eq!(run(&a, &global).unwrap(), 0);
        let rs = fs::read_to_string(tmp.path().join("bindings").join("mathlib_ffi.rs")).unwrap();
        assert!(rs.contains("#[link(name = \"mathlib\")]"), "{rs}");
    }

    #[test]
    fn config_supplies_target_and_library() {
        let (tmp, input, global) = setup("[ffi]\nlibrary = \"native_calc\"\ntarget = \"go\"\n");
        assert_eq!(run(&args(input, None), &global).unwrap(), 0);
        assert!(tmp.path().join("native_calc_ffi.go").exists());
    }

    #[test]
    fn unknown_target_is_an_error() {
        let (_tmp, input, global) = setup("");
        let err = run(&args(input, Some("python")), &global).unwrap_err();
        assert!(err.to_string().contains("python"), "{err}");
    }

    #[test]
    fn missing_input_exits_one() {
        let (tmp, _input, global) = setup("");
        let missing = tmp.path().join("nope.hpp").display().to_string();
        assert_eq!(run(&args(missing, Some("go")), &global).unwrap(), 1);
    }
}
