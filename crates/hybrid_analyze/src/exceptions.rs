//! Exception analysis: `try`/`catch` regions and `throw` sites.

use hybrid_cpp_parser::types::split_declarator;
use hybrid_cpp_parser::CppToken;
use hybrid_diagnostics::{Diagnostic, DiagnosticSink, Label};
use hybrid_ir::type_map::normalize;
use hybrid_ir::{CatchClause, ExceptionInfo, Function, ThrowSite, TryCatchBlock};
use tracing::trace;

use crate::body::Body;
use crate::errors::W201;
use crate::FeatureAnalyzer;

/// Fills [`ExceptionInfo`] from function bodies.
///
/// `may_throw` is set iff the body contains a `throw`; `can_throw`
/// additionally requires that the declared specification allows it.
pub struct ExceptionAnalyzer;

impl FeatureAnalyzer for ExceptionAnalyzer {
    fn name(&self) -> &str {
        "exceptions"
    }

    fn analyze_function(&self, function: &mut Function, sink: &DiagnosticSink) {
        let spec = function.exceptions.spec.clone();
        let mut info = ExceptionInfo {
            spec,
            ..ExceptionInfo::default()
        };
        if let Some(text) = function.body.as_deref() {
            let body = Body::new(text);
            let regions = collect_try_blocks(&body, &mut info.try_blocks);
            collect_throw_sites(&body, &regions, &mut info.throw_sites);
        }
        info.may_throw = !info.throw_sites.is_empty();
        info.can_throw = info.may_throw && !info.spec.is_nothrow();

        let escaping = info.throw_sites.iter().filter(|t| !t.inside_try).count();
        if info.spec.is_nothrow() && escaping > 0 {
            sink.emit(
                Diagnostic::warning(
                    W201,
                    format!(
                        "`{}` is declared non-throwing but contains `throw`",
                        function.name
                    ),
                    function.span,
                )
                .with_label(Label::primary(function.span, "declared here"))
                .with_note("an exception leaving this function calls std::terminate"),
            );
        }
        if info.may_throw || !info.try_blocks.is_empty() {
            trace!(
                function = %function.name,
                throws = info.throw_sites.len(),
                try_blocks = info.try_blocks.len(),
                "exception facts"
            );
        }
        function.exceptions = info;
    }
}

/// Records every `try` block and returns the token ranges of the protected
/// bodies.
fn collect_try_blocks(body: &Body<'_>, blocks: &mut Vec<TryCatchBlock>) -> Vec<(usize, usize)> {
    let mut regions = Vec::new();
    for i in 0..body.len() {
        if body.kind(i) != CppToken::Try || body.kind(i + 1) != CppToken::LeftBrace {
            continue;
        }
        let Some(close) = body.closing(i + 1) else {
            continue;
        };
        regions.push((i + 1, close));
        let mut block = TryCatchBlock {
            try_body: body.between(i + 1, close).to_string(),
            catches: Vec::new(),
        };
        let mut j = close + 1;
        while body.kind(j) == CppToken::Catch && body.kind(j + 1) == CppToken::LeftParen {
            let Some(paren_close) = body.closing(j + 1) else {
                break;
            };
            let decl = body.between(j + 1, paren_close);
            let mut clause = catch_clause(decl);
            j = paren_close + 1;
            if body.kind(j) == CppToken::LeftBrace {
                if let Some(handler_close) = body.closing(j) {
                    clause.body = body.between(j, handler_close).to_string();
                    j = handler_close + 1;
                }
            }
            block.catches.push(clause);
        }
        blocks.push(block);
    }
    regions
}

fn catch_clause(decl: &str) -> CatchClause {
    if decl.trim() == "..." {
        return CatchClause {
            exception_type: None,
            variable: None,
            body: String::new(),
        };
    }
    let (variable, ty) = split_declarator(decl);
    CatchClause {
        exception_type: Some(bare_type(&ty)),
        variable,
        body: String::new(),
    }
}

/// Strips cv and reference qualifiers: `const std::exception&` → `std::exception`.
fn bare_type(ty: &str) -> String {
    let ty = normalize(ty);
    let ty = ty.trim_end_matches('&').trim_end();
    let ty = ty.strip_prefix("const ").unwrap_or(ty);
    let ty = ty.strip_suffix(" const").unwrap_or(ty);
    ty.trim().to_string()
}

fn collect_throw_sites(body: &Body<'_>, regions: &[(usize, usize)], sites: &mut Vec<ThrowSite>) {
    for i in 0..body.len() {
        if body.kind(i) != CppToken::Throw {
            continue;
        }
        let end = body.expression_end(i + 1);
        let expression = body.slice(i + 1, end);
        let expression = (!expression.is_empty()).then(|| expression.to_string());
        sites.push(ThrowSite {
            exception_type: expression.as_ref().and_then(|_| constructed_type(body, i + 1)),
            expression,
            inside_try: regions.iter().any(|&(open, close)| open < i && i < close),
        });
    }
}

/// The type named by `T(...)`, `T{...}` or `ns::T(...)` at `start`.
fn constructed_type(body: &Body<'_>, start: usize) -> Option<String> {
    let mut i = start;
    if body.kind(i) == CppToken::ColonColon {
        i += 1;
    }
    loop {
        if body.kind(i) != CppToken::Identifier {
            return None;
        }
        i += 1;
        i = body.skip_angles(i);
        if body.kind(i) != CppToken::ColonColon {
            break;
        }
        i += 1;
    }
    matches!(body.kind(i), CppToken::LeftParen | CppToken::LeftBrace)
        .then(|| normalize(body.slice(start, i)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::{ExceptionSpec, Type};

    fn analyzed(body: &str, spec: ExceptionSpec) -> (Function, DiagnosticSink) {
        let mut f = Function::new("f", Type::void());
        f.body = Some(body.to_string());
        f.exceptions.spec = spec;
        let sink = DiagnosticSink::new();
        ExceptionAnalyzer.analyze_function(&mut f, &sink);
        (f, sink)
    }

    #[test]
    fn throw_sets_may_throw() {
        let (f, _) = analyzed(
            "if (x < 0) throw std::invalid_argument(\"negative\");\nreturn;",
            ExceptionSpec::Unspecified,
        );
        let info = &f.exceptions;
        assert!(info.may_throw && info.can_throw);
        assert_eq!(info.throw_sites.len(), 1);
        let site = &info.throw_sites[0];
        assert_eq!(
            site.expression.as_deref(),
            Some("std::invalid_argument(\"negative\")")
        );
        assert_eq!(site.exception_type.as_deref(), Some("std::invalid_argument"));
        assert!(!site.inside_try);
    }

    #[test]
    fn no_throw_means_no_flag() {
        let (f, _) = analyzed("return a + b;", ExceptionSpec::Unspecified);
        assert!(!f.exceptions.may_throw);
        assert!(f.exceptions.throw_sites.is_empty());
    }

    #[test]
    fn throw_in_strings_and_comments_is_ignored() {
        let (f, _) = analyzed(
            "log(\"throw here\"); // throw later\n/* throw */ return;",
            ExceptionSpec::Unspecified,
        );
        assert!(!f.exceptions.may_throw);
    }

    #[test]
    fn try_catch_clauses() {
        let (f, _) = analyzed(
            "try { risky(); } catch (const std::runtime_error& e) { log(e.what()); } \
             catch (int code) { } catch (...) { throw; }",
            ExceptionSpec::Unspecified,
        );
        let info = &f.exceptions;
        assert_eq!(info.try_blocks.len(), 1);
        let block = &info.try_blocks[0];
        assert_eq!(block.try_body, "risky();");
        assert_eq!(block.catches.len(), 3);
        assert_eq!(
            block.catches[0].exception_type.as_deref(),
            Some("std::runtime_error")
        );
        assert_eq!(block.catches[0].variable.as_deref(), Some("e"));
        assert_eq!(block.catches[0].body, "log(e.what());");
        assert_eq!(block.catches[1].exception_type.as_deref(), Some("int"));
        assert!(block.catches[2].is_catch_all());
        // The rethrow sits in a handler, outside the protected body.
        assert_eq!(info.throw_sites.len(), 1);
        assert!(info.throw_sites[0].expression.is_none());
        assert!(!info.throw_sites[0].inside_try);
    }

    #[test]
    fn throw_inside_try_is_marked() {
        let (f, sink) = analyzed(
            "try { throw Oops{}; } catch (Oops&) { }",
            ExceptionSpec::Noexcept,
        );
        let site = &f.exceptions.throw_sites[0];
        assert!(site.inside_try);
        assert_eq!(site.exception_type.as_deref(), Some("Oops"));
        assert_eq!(f.exceptions.try_blocks[0].catches[0].variable, None);
        assert!(!sink.has_code(W201));
    }

    #[test]
    fn noexcept_with_throw_warns() {
        let (f, sink) = analyzed("throw 42;", ExceptionSpec::Noexcept);
        assert!(sink.has_code(W201));
        assert!(f.exceptions.may_throw);
        assert!(!f.exceptions.can_throw);

        let (_, sink) = analyzed("throw 42;", ExceptionSpec::Dynamic(vec![]));
        assert!(sink.has_code(W201));
        let (_, sink) = analyzed("throw 42;", ExceptionSpec::Unspecified);
        assert!(!sink.has_code(W201));
    }

    #[test]
    fn function_try_block_body() {
        let (f, _) = analyzed(
            "try { return parse(s); } catch (std::exception& e) { return -1; }",
            ExceptionSpec::Unspecified,
        );
        assert_eq!(f.exceptions.try_blocks.len(), 1);
        assert_eq!(f.exceptions.try_blocks[0].try_body, "return parse(s);");
    }

    #[test]
    fn nested_try_blocks_in_source_order() {
        let (f, _) = analyzed(
            "try { try { a(); } catch (...) {} b(); } catch (...) {}",
            ExceptionSpec::Unspecified,
        );
        let blocks = &f.exceptions.try_blocks;
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].try_body.starts_with("try { a(); }"));
        assert_eq!(blocks[1].try_body, "a();");
    }

    #[test]
    fn declaration_only_keeps_spec() {
        let mut f = Function::new("g", Type::void());
        f.exceptions.spec = ExceptionSpec::Noexcept;
        ExceptionAnalyzer.analyze_function(&mut f, &DiagnosticSink::new());
        assert_eq!(f.exceptions.spec, ExceptionSpec::Noexcept);
        assert!(!f.exceptions.may_throw);
    }
}
