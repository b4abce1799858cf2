//! `hybrid dump-ir`: the analyzed IR of one file as JSON on stdout.

use std::path::Path;

use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::Ir;
use hybrid_source::SourceDb;

use crate::pipeline::{self, read_input, render_diagnostics, PipelineError};
use crate::{DumpIrArgs, GlobalArgs, ReportFormat};

/// Runs the `hybrid dump-ir` command.
pub fn run(args: &DumpIrArgs, global: &GlobalArgs) -> Result<i32, PipelineError> {
    let mut db = SourceDb::new();
    let sink = DiagnosticSink::new();
    let Some(file) = read_input(Path::new(&args.input), &mut db, &sink) else {
        render_diagnostics(&sink.take_all(), &db, ReportFormat::Text, global.color);
        return Ok(1);
    };
    let ir = pipeline::parse_and_analyze(file, &db, &sink);
    println!("{}", to_json(&ir, args.compact)?);

    if !global.quiet {
        render_diagnostics(&sink.take_all(), &db, ReportFormat::Text, global.color);
    }
    Ok(0)
}

fn to_json(ir: &Ir, compact: bool) -> Result<String, PipelineError> {
    let json = if compact {
        serde_json::to_string(ir)?
    } else {
        serde_json::to_string_pretty(ir)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_carries_analysis_results() {
        let sink = DiagnosticSink::new();
        let mut ir = hybrid_cpp_parser::parse_str(
            "int divide(int a, int b) { if (b == 0) throw std::runtime_error(\"zero\"); return a / b; }",
            &sink,
        );
        hybrid_analyze::analyze(&mut ir, &sink);
        let json = to_json(&ir, true).unwrap();
        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["functions"][0]["name"], "divide");
        let back: Ir = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ir);
    }

    #[test]
    fn pretty_output_is_multiline() {
        let ir = hybrid_cpp_parser::parse_str("struct Empty {};", &DiagnosticSink::new());
        assert!(to_json(&ir, false).unwrap().contains('\n'));
    }
}
