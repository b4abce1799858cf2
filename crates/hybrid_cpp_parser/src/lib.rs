//! Structural C++ parser producing the transpiler IR.
//!
//! The main entry point is [`parse_source`], which lexes a file held in a
//! [`SourceDb`] and recovers its classes, free functions, globals and enums
//! into an [`Ir`]. Function bodies are kept as text; the feature analyzers
//! and code generators work from that text.
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): tokens with spans; comments and preprocessor
//!   lines are dropped, `>>` is split for template argument lists.
//! - **Parser** ([`parser`]): recursive descent over declarations with
//!   token-level brace matching and `;`/`{}` recovery.
//! - **Types** ([`types`]): spelling-to-[`hybrid_ir::Type`] resolution with
//!   knowledge of the user types and aliases seen so far.
//!
//! Nothing here is fatal: unrecognized declarations are skipped with
//! [`errors::W101`], unbalanced braces are reported with [`errors::W102`].

#![warn(missing_docs)]

pub mod errors;
/// Lexical analyzer for C++ source text.
pub mod lexer;
/// Recursive descent structural parser with error recovery.
pub mod parser;
/// Token types for the C++ lexer.
pub mod token;
pub mod types;

pub use parser::CppParser;
pub use token::{CppToken, Token};
pub use types::{resolve_type, TypeResolver};

use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::Ir;
use hybrid_source::{FileId, SourceDb};

/// Parses a C++ source file into an [`Ir`].
///
/// Warnings for skipped declarations and unbalanced braces are reported to
/// the sink; the returned IR holds everything that was recovered.
pub fn parse_source(file_id: FileId, source_db: &SourceDb, sink: &DiagnosticSink) -> Ir {
    let source = source_db.text(file_id);
    let tokens = lexer::lex(source, file_id);
    CppParser::new(tokens, source, file_id, sink).parse_translation_unit()
}

/// Parses source text that is not backed by a [`SourceDb`].
pub fn parse_str(source: &str, sink: &DiagnosticSink) -> Ir {
    let tokens = lexer::lex(source, FileId::DUMMY);
    CppParser::new(tokens, source, FileId::DUMMY, sink).parse_translation_unit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_diagnostics::Diagnostic;

    fn parse(source: &str) -> (Ir, Vec<Diagnostic>) {
        let mut db = SourceDb::new();
        let file_id = db.add_source("test.cpp", source.to_string());
        let sink = DiagnosticSink::new();
        let ir = parse_source(file_id, &db, &sink);
        (ir, sink.take_all())
    }

    #[test]
    fn empty_input_gives_empty_ir() {
        let (ir, diags) = parse("");
        assert!(ir.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn whitespace_and_comments_only() {
        let (ir, diags) = parse("  // nothing\n/* here */\n#pragma once\n");
        assert!(ir.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn spans_point_into_the_file() {
        let source = "struct A { int x; };\nint f() { return 1; }";
        let mut db = SourceDb::new();
        let file_id = db.add_source("spans.cpp", source.to_string());
        let sink = DiagnosticSink::new();
        let ir = parse_source(file_id, &db, &sink);
        let f = ir.find_function("f").unwrap();
        assert_eq!(db.snippet(f.span), "int f() { return 1; }");
        assert_eq!(db.snippet(f.body_span), "{ return 1; }");
        assert_eq!(db.snippet(ir.classes[0].fields[0].span), "x");
    }

    #[test]
    fn warnings_carry_codes() {
        let (_, diags) = parse("struct { int x; } anon;\n+ 1;\n");
        assert!(diags.iter().all(|d| d.code == errors::W101));
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn parse_str_matches_parse_source() {
        let source = "class Widget { public: void draw() const; };";
        let sink = DiagnosticSink::new();
        let from_str = parse_str(source, &sink);
        let (from_db, _) = parse(source);
        assert_eq!(from_str.classes.len(), from_db.classes.len());
        assert_eq!(
            from_str.classes[0].methods[0].name,
            from_db.classes[0].methods[0].name
        );
    }

    #[test]
    fn ir_serializes_to_json() {
        let (ir, _) = parse("struct P { int x; };\nvoid f(P p);");
        let json = serde_json::to_value(&ir).unwrap();
        assert_eq!(json["classes"][0]["name"], "P");
        assert_eq!(json["functions"][0]["params"][0]["ty"]["name"], "P");
    }
}
