//! Template header analysis.
//!
//! Splits the raw `template<...>` header recorded by the parser into typed
//! [`TemplateParameter`]s and records specializations. Concept constraints
//! come from two places: a constrained parameter (`std::integral T`) and the
//! conjuncts of a `requires` clause (`requires Hashable<K> && Small<V>`).

use hybrid_common::{find_matching, find_top_level, split_top_level, trim_matching};
use hybrid_diagnostics::{Diagnostic, DiagnosticSink};
use hybrid_ir::type_map::{builtin_kind, normalize};
use hybrid_ir::{
    ClassDecl, Function, SpecializationKind, TemplateInfo, TemplateParamKind, TemplateParameter,
    TemplateSpecialization,
};
use hybrid_source::Span;
use tracing::trace;

use crate::errors::W202;
use crate::FeatureAnalyzer;

/// Fills [`TemplateInfo`] on template functions and classes.
pub struct TemplateAnalyzer;

impl FeatureAnalyzer for TemplateAnalyzer {
    fn name(&self) -> &str {
        "templates"
    }

    fn analyze_function(&self, function: &mut Function, sink: &DiagnosticSink) {
        function.template = analyze(
            function.template_header.as_deref(),
            function.template_args.as_deref(),
            function.template.requires.take(),
            function.span,
            sink,
        );
        if function.template.is_template() {
            trace!(function = %function.name, params = function.template.params.len(), "template function");
        }
    }

    fn analyze_class(&self, class: &mut ClassDecl, sink: &DiagnosticSink) {
        class.template = analyze(
            class.template_header.as_deref(),
            class.template_args.as_deref(),
            class.template.requires.take(),
            class.span,
            sink,
        );
        for method in &mut class.methods {
            self.analyze_function(method, sink);
        }
    }
}

fn analyze(
    header: Option<&str>,
    specialization_args: Option<&str>,
    trailing_requires: Option<String>,
    span: Span,
    sink: &DiagnosticSink,
) -> TemplateInfo {
    let Some(header) = header else {
        return TemplateInfo {
            requires: trailing_requires,
            ..TemplateInfo::default()
        };
    };
    let (params, header_requires) = match parse_template_header(header) {
        Some(parsed) => parsed,
        None => {
            sink.emit(
                Diagnostic::warning(W202, format!("malformed template header `{header}`"), span)
                    .with_note("the declaration is treated as a non-template"),
            );
            return TemplateInfo {
                requires: trailing_requires,
                ..TemplateInfo::default()
            };
        }
    };

    let requires = match (header_requires, trailing_requires) {
        (Some(h), Some(t)) if t.contains(&h) => Some(t),
        (Some(h), Some(t)) => Some(format!("{h} && {t}")),
        (h, t) => h.or(t),
    };
    let mut params = params;
    if let Some(clause) = &requires {
        apply_requires(clause, &mut params);
    }

    let specialization = specialization_args.map(|args| TemplateSpecialization {
        kind: if params.is_empty() {
            SpecializationKind::Full
        } else {
            SpecializationKind::Partial
        },
        args: split_top_level(args, ',')
            .into_iter()
            .map(normalize)
            .collect(),
    });

    TemplateInfo {
        params,
        specialization,
        requires,
    }
}

/// Splits a `template<...>` header into parameters and the text of a
/// trailing `requires` clause. Returns `None` when the angle brackets do not
/// balance.
///
/// ```
/// use hybrid_analyze::parse_template_header;
/// use hybrid_ir::TemplateParamKind;
/// let (params, requires) = parse_template_header("template<typename T, size_t N = 4>").unwrap();
/// assert_eq!(params[1].kind, TemplateParamKind::NonType);
/// assert_eq!(params[1].default.as_deref(), Some("4"));
/// assert!(requires.is_none());
/// ```
pub fn parse_template_header(header: &str) -> Option<(Vec<TemplateParameter>, Option<String>)> {
    let header = header.trim();
    let rest = header.strip_prefix("template")?;
    let open = header.len() - rest.len() + rest.find('<')?;
    if !header[header.len() - rest.len()..open].trim().is_empty() {
        return None;
    }
    let close = find_matching(header, open)?;
    let params = split_top_level(&header[open + 1..close], ',')
        .into_iter()
        .enumerate()
        .map(|(index, text)| parse_parameter(text, index))
        .collect();
    let tail = header[close + 1..].trim();
    let requires = tail
        .strip_prefix("requires")
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(str::to_string);
    Some((params, requires))
}

fn parse_parameter(text: &str, index: usize) -> TemplateParameter {
    let (decl, default) = match find_top_level(text, '=') {
        Some(eq) => (text[..eq].trim(), Some(text[eq + 1..].trim().to_string())),
        None => (text.trim(), None),
    };
    let mut param = TemplateParameter {
        name: String::new(),
        kind: TemplateParamKind::Type,
        value_type: None,
        default,
        constraints: Vec::new(),
        is_pack: decl.contains("..."),
    };
    let decl = decl.replace("...", " ");
    let decl = decl.trim();

    if let Some(rest) = decl.strip_prefix("template") {
        param.kind = TemplateParamKind::Template;
        let after = rest
            .find('<')
            .and_then(|open| find_matching(rest, open))
            .map_or(rest, |close| &rest[close + 1..]);
        let (_, name) = split_last_word(after.trim());
        param.name = name_or_placeholder(name, index);
        return param;
    }

    let (head, name) = split_last_word(decl);
    let head = head.trim();
    if matches!(decl, "typename" | "class") || matches!(head, "typename" | "class") {
        param.name = name_or_placeholder(if head.is_empty() { "" } else { name }, index);
        return param;
    }

    // Unnamed non-type parameter: the whole declaration is the type.
    let (value_type, name) = if head.is_empty() || is_non_type(decl) {
        (decl, "")
    } else {
        (head, name)
    };
    if is_non_type(value_type) {
        param.kind = TemplateParamKind::NonType;
        param.value_type = Some(normalize(value_type));
    } else {
        param.constraints.push(normalize(value_type));
    }
    param.name = name_or_placeholder(name, index);
    param
}

/// True if `ty` spells a value type rather than a concept.
fn is_non_type(ty: &str) -> bool {
    let ty = normalize(ty);
    ty == "auto"
        || ty.ends_with('*')
        || ty.ends_with('&')
        || builtin_kind(&ty).is_some()
        || builtin_kind(ty.trim_start_matches("const ")).is_some()
}

/// Splits off the trailing identifier. Returns `("", text)` when `text` is
/// a single word.
fn split_last_word(text: &str) -> (&str, &str) {
    let start = text
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(0, |i| i + 1);
    (&text[..start], &text[start..])
}

fn name_or_placeholder(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("_{index}")
    } else {
        name.to_string()
    }
}

/// Attaches `Concept<T>` conjuncts of a `requires` clause to parameter `T`.
fn apply_requires(clause: &str, params: &mut [TemplateParameter]) {
    // Splitting on `&` drops the empty piece inside every `&&`.
    for conjunct in split_top_level(clause, '&') {
        let conjunct = trim_matching(conjunct);
        let Some(open) = conjunct.find('<') else {
            continue;
        };
        let Some(close) = find_matching(conjunct, open) else {
            continue;
        };
        if close + 1 != conjunct.len() {
            continue;
        }
        let concept = conjunct[..open].trim();
        if concept.is_empty() || concept.contains(|c: char| c.is_whitespace() || c == '|') {
            continue;
        }
        let args = split_top_level(&conjunct[open + 1..close], ',');
        let Some((subject, extra)) = args.split_first() else {
            continue;
        };
        let constraint = if extra.is_empty() {
            concept.to_string()
        } else {
            format!("{concept}<{}>", extra.join(", "))
        };
        if let Some(param) = params
            .iter_mut()
            .find(|p| p.name == *subject && p.kind == TemplateParamKind::Type)
        {
            if !param.constraints.contains(&constraint) {
                param.constraints.push(constraint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_cpp_parser::parse_str;

    fn header(text: &str) -> Vec<TemplateParameter> {
        parse_template_header(text).unwrap().0
    }

    #[test]
    fn type_and_non_type_parameters() {
        let params = header("template<typename T, class U = int, std::size_t N = 8, bool Flag>");
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].name, "T");
        assert_eq!(params[0].kind, TemplateParamKind::Type);
        assert_eq!(params[1].default.as_deref(), Some("int"));
        assert_eq!(params[2].kind, TemplateParamKind::NonType);
        assert_eq!(params[2].value_type.as_deref(), Some("size_t"));
        assert_eq!(params[2].default.as_deref(), Some("8"));
        assert_eq!(params[3].value_type.as_deref(), Some("bool"));
    }

    #[test]
    fn nested_defaults_split_at_depth_zero() {
        let params = header("template<typename K, typename V = std::map<int, std::vector<K>>>");
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].default.as_deref(), Some("std::map<int, std::vector<K>>"));
    }

    #[test]
    fn packs_and_template_templates() {
        let params = header("template<template<typename, typename> class Container, typename... Ts>");
        assert_eq!(params[0].kind, TemplateParamKind::Template);
        assert_eq!(params[0].name, "Container");
        assert!(params[1].is_pack);
        assert_eq!(params[1].name, "Ts");
    }

    #[test]
    fn concept_constrained_parameters() {
        let params = header("template<std::integral T, auto V>");
        assert_eq!(params[0].kind, TemplateParamKind::Type);
        assert_eq!(params[0].constraints, vec!["std::integral"]);
        assert_eq!(params[1].kind, TemplateParamKind::NonType);
        assert_eq!(params[1].value_type.as_deref(), Some("auto"));
    }

    #[test]
    fn unnamed_parameters_get_placeholders() {
        let params = header("template<typename, int>");
        assert_eq!(params[0].name, "_0");
        assert_eq!(params[1].name, "_1");
        assert_eq!(params[1].kind, TemplateParamKind::NonType);
    }

    #[test]
    fn requires_clause_adds_constraints() {
        let (mut params, requires) =
            parse_template_header("template<typename K, typename V> requires Hashable<K> && std::convertible_to<V, int>")
                .unwrap();
        let clause = requires.unwrap();
        assert_eq!(clause, "Hashable<K> && std::convertible_to<V, int>");
        apply_requires(&clause, &mut params);
        assert_eq!(params[0].constraints, vec!["Hashable"]);
        assert_eq!(params[1].constraints, vec!["std::convertible_to<int>"]);
    }

    #[test]
    fn malformed_header_warns() {
        let sink = DiagnosticSink::new();
        let mut f = Function::new("f", hybrid_ir::Type::void());
        f.template_header = Some("template<typename T".into());
        TemplateAnalyzer.analyze_function(&mut f, &sink);
        assert!(sink.has_code(W202));
        assert!(!f.template.is_template());
    }

    #[test]
    fn specializations() {
        let sink = DiagnosticSink::new();
        let mut ir = parse_str(
            "template<typename T> class Box { T v; };\n\
             template<> class Box<bool> { bool v; };\n\
             template<typename T> class Box<T*> { T* v; };",
            &sink,
        );
        for class in &mut ir.classes {
            TemplateAnalyzer.analyze_class(class, &sink);
        }
        assert!(ir.classes[0].template.specialization.is_none());
        let full = ir.classes[1].template.specialization.as_ref().unwrap();
        assert_eq!(full.kind, SpecializationKind::Full);
        assert_eq!(full.args, vec!["bool"]);
        let partial = ir.classes[2].template.specialization.as_ref().unwrap();
        assert_eq!(partial.kind, SpecializationKind::Partial);
        assert_eq!(partial.args, vec!["T*"]);
    }

    #[test]
    fn trailing_requires_is_kept_and_rerun_is_stable() {
        let sink = DiagnosticSink::new();
        let mut ir = parse_str(
            "template<typename T> requires Small<T>\nT id(T v) requires Copyable<T> { return v; }",
            &sink,
        );
        let f = &mut ir.functions[0];
        TemplateAnalyzer.analyze_function(f, &sink);
        let first = f.template.clone();
        assert_eq!(first.requires.as_deref(), Some("Small<T> && Copyable<T>"));
        assert_eq!(first.params[0].constraints, vec!["Small", "Copyable"]);
        TemplateAnalyzer.analyze_function(f, &sink);
        assert_eq!(f.template, first);
    }

    #[test]
    fn non_templates_are_untouched() {
        let sink = DiagnosticSink::new();
        let mut f = Function::new("plain", hybrid_ir::Type::void());
        TemplateAnalyzer.analyze_function(&mut f, &sink);
        assert!(!f.template.is_template());
        assert_eq!(sink.warning_count(), 0);
    }
}
