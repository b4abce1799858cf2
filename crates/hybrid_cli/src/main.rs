//! Hybrid CLI: translates C++ sources to Rust or Go and generates FFI
//! bindings for C++ code that stays native.
//!
//! `hybrid transpile` runs the parse, analyze and generate pipeline over each
//! input, `hybrid ffi` produces C wrapper, Rust or Go bindings, and
//! `hybrid dump-ir` prints the analyzed IR as JSON.

#![warn(missing_docs)]

mod dump_ir;
mod errors;
mod ffi;
mod pipeline;
mod transpile;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Hybrid, a C++ to Rust and Go transpiler.
#[derive(Parser, Debug)]
#[command(name = "hybrid", version, about = "C++ to Rust / Go transpiler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `hybrid.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate C++ sources to Rust or Go.
    Transpile(TranspileArgs),
    /// Generate FFI bindings for a C++ source.
    Ffi(FfiArgs),
    /// Print the analyzed IR of a C++ source as JSON.
    DumpIr(DumpIrArgs),
}

/// Arguments for `hybrid transpile`.
#[derive(Parser, Debug)]
pub struct TranspileArgs {
    /// C++ source files, translated one after another.
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output file (single input) or directory.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Target language (rust, go).
    #[arg(short, long)]
    pub target: Option<String>,

    /// Commentary level, 0 (verbose) to 3 (none).
    #[arg(short = 'O', long = "opt-level", value_parser = clap::value_parser!(u8).range(0..=3))]
    pub opt_level: Option<u8>,

    /// Omit `// SAFETY:` notes.
    #[arg(long)]
    pub no_safety_checks: bool,

    /// Omit the original C++ text from untranslated placeholders.
    #[arg(long)]
    pub no_comments: bool,

    /// Emit test scaffolding.
    #[arg(long)]
    pub gen_tests: bool,

    /// Diagnostic output format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for `hybrid ffi`.
#[derive(Parser, Debug)]
pub struct FfiArgs {
    /// C++ source declaring the interface to bind.
    pub input: String,

    /// Binding flavor (rust, go, c-wrapper).
    #[arg(short, long)]
    pub target: Option<String>,

    /// Native library name; the input's stem when neither this nor the
    /// configuration names one.
    #[arg(long)]
    pub lib: Option<String>,

    /// Output directory; the input's directory by default.
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for `hybrid dump-ir`.
#[derive(Parser, Debug)]
pub struct DumpIrArgs {
    /// C++ source to parse and analyze.
    pub input: String,

    /// Print compact JSON on one line.
    #[arg(long)]
    pub compact: bool,
}

/// Color output choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal support automatically.
    Auto,
    /// Always emit color codes.
    Always,
    /// Never emit color codes.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// One JSON object per diagnostic.
    Json,
}

/// Resolved global arguments passed to subcommand handlers.
#[derive(Debug)]
pub struct GlobalArgs {
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable verbose output.
    pub verbose: bool,
    /// Whether to use colored output (resolved from `ColorChoice`).
    pub color: bool,
    /// Optional config file path.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.quiet, cli.verbose);

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Transpile(ref args) => transpile::run(args, &global),
        Command::Ffi(ref args) => ffi::run(args, &global),
        Command::DumpIr(ref args) => dump_ir::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(quiet, verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_transpile_defaults() {
        let cli = Cli::parse_from(["hybrid", "transpile", "point.cpp"]);
        match cli.command {
            Command::Transpile(ref args) => {
                assert_eq!(args.inputs, vec!["point.cpp"]);
                assert!(args.output.is_none());
                assert!(args.target.is_none());
                assert!(args.opt_level.is_none());
                assert!(!args.no_safety_checks);
                assert!(!args.no_comments);
                assert!(!args.gen_tests);
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Transpile command"),
        }
    }

    #[test]
    fn parse_transpile_with_args() {
        let cli = Cli::parse_from([
            "hybrid",
            "transpile",
            "a.cpp",
            "b.cpp",
            "-o",
            "out",
            "-t",
            "go",
            "-O",
            "2",
            "--no-safety-checks",
            "--no-comments",
            "--gen-tests",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Transpile(ref args) => {
                assert_eq!(args.inputs, vec!["a.cpp", "b.cpp"]);
                assert_eq!(args.output.as_deref(), Some("out"));
                assert_eq!(args.target.as_deref(), Some("go"));
                assert_eq!(args.opt_level, Some(2));
                assert!(args.no_safety_checks);
                assert!(args.no_comments);
                assert!(args.gen_tests);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Transpile command"),
        }
    }

    #[test]
    fn transpile_requires_an_input() {
        assert!(Cli::try_parse_from(["hybrid", "transpile"]).is_err());
    }

    #[test]
    fn opt_level_above_three_is_rejected() {
        assert!(Cli::try_parse_from(["hybrid", "transpile", "a.cpp", "-O", "4"]).is_err());
    }

    #[test]
    fn unknown_target_reaches_the_registry() {
        let cli = Cli::parse_from(["hybrid", "transpile", "a.cpp", "-t", "python"]);
        match cli.command {
            Command::Transpile(ref args) => assert_eq!(args.target.as_deref(), Some("python")),
            _ => panic!("expected Transpile command"),
        }
    }

    #[test]
    fn parse_ffi() {
        let cli = Cli::parse_from([
            "hybrid", "ffi", "calc.hpp", "-t", "c-wrapper", "--lib", "calc", "-o", "gen",
        ]);
        match cli.command {
            Command::Ffi(ref args) => {
                assert_eq!(args.input, "calc.hpp");
                assert_eq!(args.target.as_deref(), Some("c-wrapper"));
                assert_eq!(args.lib.as_deref(), Some("calc"));
                assert_eq!(args.output.as_deref(), Some("gen"));
            }
            _ => panic!("expected Ffi command"),
        }
    }

    #[test]
    fn parse_dump_ir() {
        let cli = Cli::parse_from(["hybrid", "dump-ir", "point.cpp", "--compact"]);
        match cli.command {
            Command::DumpIr(ref args) => {
                assert_eq!(args.input, "point.cpp");
                assert!(args.compact);
            }
            _ => panic!("expected DumpIr command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["hybrid", "--quiet", "--color", "never", "dump-ir", "a.cpp"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["hybrid", "transpile", "a.cpp", "-v", "--config", "h.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("h.toml"));
    }

    #[test]
    fn log_level_follows_flags() {
        assert_eq!(default_level(false, false), "warn");
        assert_eq!(default_level(false, true), "debug");
        assert_eq!(default_level(true, true), "error");
    }
}
