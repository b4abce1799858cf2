//! Template headers as Rust generic parameter lists.

use hybrid_common::to_pascal_case;
use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::{strip_std, to_rust};
use hybrid_ir::{ClassDecl, Function, TemplateInfo, TemplateParamKind};

use super::{Out, RustUnit};
use crate::lower::scope::visit_exprs;
use crate::lower::{parse_body, BinOp, Expr};
use crate::typing::requires_constraints;

/// `<T: Bound, const N: usize>` and the matching `<T, N>`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Generics {
    pub decl: String,
    pub args: String,
}

const ARITHMETIC: &str = "std::ops::Add<Output = {T}> + std::ops::Sub<Output = {T}> \
                          + std::ops::Mul<Output = {T}> + std::ops::Div<Output = {T}>";

impl RustUnit<'_> {
    pub(super) fn class_generics(&self, out: &mut Out, class: &ClassDecl) -> Generics {
        if class.template.specialization.is_some() {
            return Generics::default();
        }
        let bodies: Vec<&str> = class
            .methods
            .iter()
            .filter_map(|m| m.body.as_deref())
            .collect();
        self.generics(out, &class.template, &bodies, class.span)
    }

    pub(super) fn function_generics(&self, out: &mut Out, f: &Function) -> Generics {
        let bodies: Vec<&str> = f.body.as_deref().into_iter().collect();
        self.generics(out, &f.template, &bodies, f.span)
    }

    fn generics(
        &self,
        out: &mut Out,
        info: &TemplateInfo,
        bodies: &[&str],
        span: hybrid_source::Span,
    ) -> Generics {
        if info.params.is_empty() {
            return Generics::default();
        }
        let required = info
            .requires
            .as_deref()
            .map(requires_constraints)
            .unwrap_or_default();
        let mut decl = Vec::new();
        let mut args = Vec::new();
        for p in &info.params {
            if p.is_pack {
                self.gap(span, format!("the parameter pack `{}`", p.name));
                continue;
            }
            match p.kind {
                TemplateParamKind::Type => {
                    let mut concepts: Vec<&str> = p.constraints.iter().map(String::as_str).collect();
                    concepts.extend(
                        required
                            .iter()
                            .filter(|(_, t)| *t == p.name)
                            .map(|(c, _)| c.as_str()),
                    );
                    let bounds = if concepts.is_empty() {
                        inferred_bounds(&p.name, bodies)
                    } else {
                        concept_bounds(&p.name, &concepts, out)
                    };
                    if bounds.is_empty() {
                        decl.push(p.name.clone());
                    } else {
                        decl.push(format!("{}: {}", p.name, bounds.join(" + ")));
                    }
                    args.push(p.name.clone());
                }
                TemplateParamKind::NonType => {
                    let ty = p
                        .value_type
                        .as_deref()
                        .map_or("usize".to_string(), |t| to_rust(&resolve_type(t)));
                    decl.push(format!("const {}: {ty}", p.name));
                    args.push(p.name.clone());
                }
                TemplateParamKind::Template => {
                    self.gap(span, format!("the template template parameter `{}`", p.name));
                }
            }
        }
        if decl.is_empty() {
            return Generics::default();
        }
        Generics {
            decl: format!("<{}>", decl.join(", ")),
            args: format!("<{}>", args.join(", ")),
        }
    }
}

/// Rust bounds standing in for C++ concepts. Standard concepts map to the
/// nearest trait; user concepts become marker traits.
fn concept_bounds(param: &str, concepts: &[&str], out: &mut Out) -> Vec<String> {
    let mut bounds: Vec<String> = Vec::new();
    let mut push = |b: String| {
        if !bounds.contains(&b) {
            bounds.push(b);
        }
    };
    for concept in concepts {
        let name = concept.split('<').next().unwrap_or(concept).trim();
        let std_name = strip_std(name);
        match std_name {
            "integral" | "signed_integral" | "unsigned_integral" => {
                push("Copy".into());
                push("Ord".into());
                push(ARITHMETIC.replace("{T}", param));
            }
            "floating_point" => {
                push("Copy".into());
                push("PartialOrd".into());
                push(ARITHMETIC.replace("{T}", param));
            }
            "copyable" | "copy_constructible" | "semiregular" | "regular" => push("Clone".into()),
            "equality_comparable" => push("PartialEq".into()),
            "totally_ordered" => push("PartialOrd".into()),
            "default_initializable" => push("Default".into()),
            "convertible_to" => {
                let target = concept
                    .find('<')
                    .and_then(|i| concept.rfind('>').map(|j| &concept[i + 1..j]))
                    .map(|t| to_rust(&resolve_type(t)));
                if let Some(target) = target {
                    push(format!("Into<{target}>"));
                }
            }
            _ if name.starts_with("std::") => {}
            _ => {
                let marker = to_pascal_case(name);
                out.concepts.insert(marker.clone());
                push(marker);
            }
        }
    }
    bounds
}

/// Bounds implied by what the bodies do with values of type `param`:
/// arithmetic, comparisons and copies.
fn inferred_bounds(param: &str, bodies: &[&str]) -> Vec<String> {
    let mut ops: Vec<BinOp> = Vec::new();
    for body in bodies {
        visit_exprs(&parse_body(body), true, &mut |e| {
            let op = match e {
                Expr::Binary { op, .. } | Expr::Assign { op: Some(op), .. } => *op,
                _ => return,
            };
            if !ops.contains(&op) {
                ops.push(op);
            }
        });
    }
    let mut bounds = vec!["Copy".to_string()];
    if ops.iter().any(|op| matches!(op, BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge)) {
        bounds.push("PartialOrd".into());
    } else if ops.iter().any(|op| matches!(op, BinOp::Eq | BinOp::Ne)) {
        bounds.push("PartialEq".into());
    }
    for (op, name) in [
        (BinOp::Add, "Add"),
        (BinOp::Sub, "Sub"),
        (BinOp::Mul, "Mul"),
        (BinOp::Div, "Div"),
    ] {
        if ops.contains(&op) {
            bounds.push(format!("std::ops::{name}<Output = {param}>"));
        }
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_follow_body_operators() {
        let bounds = inferred_bounds("T", &["return a > b ? a : b;"]);
        assert_eq!(bounds, vec!["Copy", "PartialOrd"]);
        let bounds = inferred_bounds("T", &["return a + b;"]);
        assert_eq!(bounds, vec!["Copy", "std::ops::Add<Output = T>"]);
    }
}
