//! Template headers as Go type parameter lists.

use std::collections::BTreeSet;

use hybrid_ir::type_map::strip_std;
use hybrid_ir::{ClassDecl, Function, TemplateInfo, TemplateParamKind, Type, TypeKind};
use hybrid_source::Span;

use super::{GoUnit, Out};
use crate::lower::scope::visit_exprs;
use crate::lower::{parse_body, BinOp, Expr, Stmt};
use crate::typing::requires_constraints;

/// `[T cmp.Ordered, U any]` and the matching `[T, U]`, plus marker lines
/// for parameters Go cannot express.
#[derive(Debug, Clone, Default)]
pub(crate) struct GoGenerics {
    pub decl: String,
    pub args: String,
    pub markers: Vec<String>,
}

/// What the bodies need of a type parameter, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Need {
    Any,
    Comparable,
    Ordered,
    Numeric,
}

impl GoUnit<'_> {
    pub(super) fn class_generics(&self, out: &mut Out, class: &ClassDecl) -> GoGenerics {
        if class.template.specialization.is_some() {
            return GoGenerics::default();
        }
        let functions: Vec<&Function> = class.methods.iter().collect();
        let mut typed: Vec<(String, Type)> = class
            .instance_fields()
            .map(|f| (f.name.clone(), f.ty.clone()))
            .collect();
        typed.extend(
            functions
                .iter()
                .flat_map(|m| m.params.iter().map(|p| (p.name.clone(), p.ty.clone()))),
        );
        self.generics(out, &class.template, &functions, &typed, class.span)
    }

    pub(super) fn function_generics(&self, out: &mut Out, f: &Function) -> GoGenerics {
        let typed: Vec<(String, Type)> = f
            .params
            .iter()
            .map(|p| (p.name.clone(), p.ty.clone()))
            .collect();
        self.generics(out, &f.template, &[f], &typed, f.span)
    }

    fn generics(
        &self,
        out: &mut Out,
        info: &TemplateInfo,
        functions: &[&Function],
        typed: &[(String, Type)],
        span: Span,
    ) -> GoGenerics {
        if info.params.is_empty() {
            return GoGenerics::default();
        }
        let required = info
            .requires
            .as_deref()
            .map(requires_constraints)
            .unwrap_or_default();
        let bodies: Vec<Vec<Stmt>> = functions
            .iter()
            .filter_map(|f| f.body.as_deref().map(parse_body))
            .collect();
        let mut decl = Vec::new();
        let mut args = Vec::new();
        let mut markers = Vec::new();
        for p in &info.params {
            if p.is_pack {
                self.gap(span, format!("the parameter pack `{}`", p.name));
                markers.push(format!("// UNTRANSLATABLE: parameter pack `{}`", p.name));
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
                    let need = if concepts.is_empty() {
                        inferred_need(&p.name, &bodies, typed)
                    } else {
                        concept_need(&concepts)
                    };
                    let constraint = match need {
                        Need::Any => "any",
                        Need::Comparable => "comparable",
                        Need::Ordered => {
                            out.imports.insert("cmp");
                            "cmp.Ordered"
                        }
                        Need::Numeric => {
                            out.helpers.insert("Number");
                            "Number"
                        }
                    };
                    decl.push(format!("{} {constraint}", p.name));
                    args.push(p.name.clone());
                }
                TemplateParamKind::NonType => {
                    let ty = p.value_type.as_deref().unwrap_or("auto");
                    self.gap(
                        span,
                        format!("the non-type template parameter `{ty} {}`", p.name),
                    );
                    markers.push(format!(
                        "// UNTRANSLATABLE: non-type template parameter `{ty} {}`",
                        p.name
                    ));
                }
                TemplateParamKind::Template => {
                    self.gap(span, format!("the template template parameter `{}`", p.name));
                    markers.push(format!(
                        "// UNTRANSLATABLE: template template parameter `{}`",
                        p.name
                    ));
                }
            }
        }
        if decl.is_empty() {
            return GoGenerics {
                markers,
                ..GoGenerics::default()
            };
        }
        GoGenerics {
            decl: format!("[{}]", decl.join(", ")),
            args: format!("[{}]", args.join(", ")),
            markers,
        }
    }
}

/// Standard concepts mapped onto Go constraints; user concepts impose
/// nothing Go can check.
fn concept_need(concepts: &[&str]) -> Need {
    concepts
        .iter()
        .map(|concept| {
            let name = concept.split('<').next().unwrap_or(concept).trim();
            match strip_std(name) {
                "integral" | "signed_integral" | "unsigned_integral" | "floating_point"
                | "arithmetic" => Need::Numeric,
                "totally_ordered" => Need::Ordered,
                "equality_comparable" | "regular" => Need::Comparable,
                _ => Need::Any,
            }
        })
        .max()
        .unwrap_or(Need::Any)
}

/// The constraint implied by operators applied to values of type `param`.
fn inferred_need(param: &str, bodies: &[Vec<Stmt>], typed: &[(String, Type)]) -> Need {
    let mut names: BTreeSet<String> = typed
        .iter()
        .filter(|(_, ty)| is_param_type(ty, param))
        .map(|(n, _)| n.clone())
        .collect();
    for body in bodies {
        for s in body {
            s.walk(&mut |s| {
                if let Stmt::Decl(d) = s {
                    if is_param_type(&d.ty, param) {
                        names.insert(d.name.clone());
                    }
                }
            });
        }
    }
    let is_typed = |e: &Expr| match e.unparen() {
        Expr::Name(n) => names.contains(n),
        Expr::Member { base, name, .. } => {
            matches!(base.unparen(), Expr::This) && names.contains(name)
        }
        _ => false,
    };
    let mut need = Need::Any;
    for body in bodies {
        visit_exprs(body, true, &mut |e| {
            let (op, lhs, rhs) = match e {
                Expr::Binary { op, lhs, rhs } => (*op, lhs.as_ref(), rhs.as_ref()),
                Expr::Assign {
                    op: Some(op),
                    target,
                    value,
                } => (*op, target.as_ref(), value.as_ref()),
                _ => return,
            };
            if !is_typed(lhs) && !is_typed(rhs) {
                return;
            }
            let found = match op {
                BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => Need::Numeric,
                BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Add => Need::Ordered,
                BinOp::Eq | BinOp::Ne => Need::Comparable,
                _ => Need::Any,
            };
            need = need.max(found);
        });
    }
    need
}

fn is_param_type(ty: &Type, param: &str) -> bool {
    let ty = ty.without_reference();
    match &ty.kind {
        TypeKind::TemplateParam => ty.name == param,
        _ => ty.base_name() == param,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::Parameter;

    fn typed(names: &[&str]) -> Vec<(String, Type)> {
        names
            .iter()
            .map(|n| (n.to_string(), Type::new("T", TypeKind::TemplateParam)))
            .collect()
    }

    #[test]
    fn comparisons_need_ordered() {
        let body = vec![parse_body("return a > b ? a : b;")];
        assert_eq!(inferred_need("T", &body, &typed(&["a", "b"])), Need::Ordered);
    }

    #[test]
    fn subtraction_needs_numbers() {
        let body = vec![parse_body("T d = a - b; return d;")];
        assert_eq!(inferred_need("T", &body, &typed(&["a", "b"])), Need::Numeric);
    }

    #[test]
    fn operators_on_other_values_impose_nothing() {
        let body = vec![parse_body("return items.size() > 0;")];
        assert_eq!(inferred_need("T", &body, &typed(&["value"])), Need::Any);
        let p = Parameter::new("v", Type::integer("int"));
        assert!(!is_param_type(&p.ty, "T"));
    }

    #[test]
    fn standard_concepts() {
        assert_eq!(concept_need(&["std::integral"]), Need::Numeric);
        assert_eq!(concept_need(&["std::totally_ordered"]), Need::Ordered);
        assert_eq!(concept_need(&["Printable"]), Need::Any);
    }
}
