//! Facts about names inside one body: local types, which locals are
//! written, and which names a run of statements mentions.

use std::collections::{BTreeMap, BTreeSet};

use hybrid_cpp_parser::resolve_type;
use hybrid_ir::{Ownership, Parameter, Type};

use super::ast::{BinOp, Expr, Init, Stmt, UnaryOp};

/// Block-structured local variable types.
#[derive(Debug, Default)]
pub struct Locals {
    scopes: Vec<BTreeMap<String, Type>>,
}

impl Locals {
    /// A function scope holding `params`.
    pub fn new(params: &[Parameter]) -> Self {
        let mut locals = Self {
            scopes: vec![BTreeMap::new()],
        };
        for p in params {
            locals.declare(&p.name, p.ty.clone());
        }
        locals
    }

    /// Opens a block.
    pub fn push(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    /// Closes the innermost block; the function scope stays.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Binds `name` in the innermost block.
    pub fn declare(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    /// The innermost binding of `name`.
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// True if `name` is a visible local.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Container methods that modify their receiver.
const MUTATING_METHODS: &[&str] = &[
    "push_back",
    "emplace_back",
    "push_front",
    "emplace_front",
    "pop_back",
    "pop_front",
    "insert",
    "emplace",
    "erase",
    "clear",
    "resize",
    "reserve",
    "swap",
    "push",
    "pop",
    "append",
    "join",
    "detach",
    "lock",
    "unlock",
    "set_value",
    "set_exception",
    "sort",
];

/// Plain names that are assigned, incremented, address-taken or used as
/// the receiver of a mutating method anywhere in `stmts`.
pub fn mutated_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    visit_exprs(stmts, true, &mut |e| match e {
        Expr::Assign { target, .. } => note_root(target, &mut out),
        Expr::Unary {
            op: UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::AddrOf,
            operand,
        }
        | Expr::Postfix { operand, .. } => note_root(operand, &mut out),
        Expr::Call { callee, .. } => {
            if let Expr::Member { base, name, .. } = callee.as_ref() {
                if MUTATING_METHODS.contains(&name.as_str()) {
                    note_root(base, &mut out);
                }
            }
        }
        _ => {}
    });
    for s in stmts {
        s.walk(&mut |s| {
            if let Stmt::Delete(e) = s {
                note_root(e, &mut out);
            }
        });
    }
    out
}

fn note_root(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr.unparen() {
        Expr::Name(n) => {
            out.insert(n.clone());
        }
        Expr::Member { base, .. } | Expr::Index { base, .. } => note_root(base, out),
        Expr::Unary {
            op: UnaryOp::Deref,
            operand,
        } => note_root(operand, out),
        _ => {}
    }
}

/// Every plain name mentioned in `stmts`, lambda bodies included.
pub fn mentioned_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    visit_exprs(stmts, true, &mut |e| {
        if let Expr::Name(n) = e {
            out.insert(n.clone());
        }
    });
    out
}

/// Visits every expression in `stmts`, descending into lambda bodies when
/// `lambdas` is set.
pub fn visit_exprs(stmts: &[Stmt], lambdas: bool, f: &mut dyn FnMut(&Expr)) {
    for s in stmts {
        s.walk(&mut |s| {
            for e in s.expressions() {
                visit_expr(e, lambdas, f);
            }
        });
    }
}

fn visit_expr(expr: &Expr, lambdas: bool, f: &mut dyn FnMut(&Expr)) {
    f(expr);
    if let Expr::Lambda(l) = expr {
        if lambdas {
            visit_exprs(&l.body, lambdas, f);
        }
    }
    for child in expr.children() {
        visit_expr(child, lambdas, f);
    }
}

/// True if a `return` appears in `stmts` outside any lambda.
pub fn has_return(stmts: &[Stmt]) -> bool {
    super::ast::any_stmt(stmts, &mut |s| matches!(s, Stmt::Return(_)))
}

/// True if control cannot fall off the end of `stmts`. Follows Go's
/// definition of a terminating statement list.
pub fn is_terminating(stmts: &[Stmt]) -> bool {
    match stmts.last() {
        Some(Stmt::Return(_) | Stmt::Throw(_)) => true,
        Some(Stmt::Block(b)) => is_terminating(b),
        Some(Stmt::If {
            then,
            otherwise: Some(o),
            ..
        }) => is_terminating(then) && is_terminating(o),
        Some(Stmt::While {
            cond: Expr::Bool(true),
            body,
        }) => !super::ast::any_stmt(body, &mut |s| matches!(s, Stmt::Break)),
        Some(Stmt::Switch { cases, .. }) => {
            cases.iter().any(|c| c.is_default)
                && cases.iter().all(|c| is_terminating(&c.body))
        }
        _ => false,
    }
}

/// True if a child expression must be parenthesized under `parent`. The
/// rule is conservative enough to hold for both Rust and Go precedence:
/// only multiplicative under additive, comparisons under logical, and
/// left-nested chains of one associative operator stay bare.
pub fn needs_parens(parent: BinOp, child: &Expr, is_rhs: bool) -> bool {
    let child = match child {
        Expr::Binary { op, .. } => *op,
        Expr::Assign { .. } | Expr::Ternary { .. } => return true,
        _ => return false,
    };
    let multiplicative = |op| matches!(op, BinOp::Mul | BinOp::Div | BinOp::Rem);
    let additive = |op| matches!(op, BinOp::Add | BinOp::Sub);
    let logical = |op| matches!(op, BinOp::And | BinOp::Or);
    let relational = |op: BinOp| op.is_comparison() && !logical(op);
    if multiplicative(child) && additive(parent) {
        return false;
    }
    if relational(child) && logical(parent) {
        return false;
    }
    if logical(child) && logical(parent) && child == parent {
        return false;
    }
    if !is_rhs && child == parent && (additive(parent) || multiplicative(parent)) {
        return false;
    }
    if !is_rhs && additive(child) && additive(parent) {
        return false;
    }
    true
}

/// The type a declaration's initializer implies, for `auto` locals.
pub fn infer_type(init: &Init) -> Option<Type> {
    let expr = match init {
        Init::Expr(e) => e,
        _ => return None,
    };
    match expr.unparen() {
        Expr::Call { callee, .. } => match callee.as_ref() {
            Expr::Template { name, args } if args.len() == 1 => {
                let inner = resolve_type(&args[0]);
                match name.as_str() {
                    "std::make_unique" | "make_unique" => {
                        Some(Type::pointer(inner, Ownership::Unique))
                    }
                    "std::make_shared" | "make_shared" => {
                        Some(Type::pointer(inner, Ownership::Shared))
                    }
                    _ => None,
                }
            }
            Expr::Name(name) if is_type_like(name) => Some(resolve_type(name)),
            _ => None,
        },
        Expr::List { ty: Some(ty), .. } => Some(resolve_type(ty)),
        Expr::Str(_) => Some(Type::string()),
        Expr::Cast { ty, .. } => Some(ty.clone()),
        Expr::New { ty, array: false, .. } => {
            Some(Type::pointer(resolve_type(ty), Ownership::Raw))
        }
        _ => None,
    }
}

/// Names that read as types when called: `std::thread(...)`, `Point(...)`.
fn is_type_like(name: &str) -> bool {
    let simple = name.rsplit("::").next().unwrap_or(name);
    matches!(simple, "thread" | "jthread" | "string" | "mutex")
        || simple.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::{parse_body, parse_expression};
    use hybrid_ir::TypeKind;

    #[test]
    fn terminating_statements() {
        assert!(is_terminating(&parse_body("if (x) { return 1; } else { throw 2; }")));
        assert!(!is_terminating(&parse_body("if (x) { return 1; }")));
        assert!(is_terminating(&parse_body("while (true) { step(); }")));
        assert!(!is_terminating(&parse_body("while (true) { break; }")));
    }

    #[test]
    fn scopes_shadow_and_unwind() {
        let mut locals = Locals::new(&[Parameter::new("n", Type::integer("int"))]);
        locals.push();
        locals.declare("n", Type::float("double"));
        assert_eq!(locals.get("n").map(|t| t.name.as_str()), Some("double"));
        locals.pop();
        assert_eq!(locals.get("n").map(|t| t.name.as_str()), Some("int"));
        assert!(!locals.contains("m"));
    }

    #[test]
    fn writes_are_found_through_members_and_lambdas() {
        let body = parse_body(
            "int a = 0; int b = 1; std::vector<int> v; int c = 2;\n\
             a += 1; v.push_back(b); auto f = [&] { c++; }; b.size();",
        );
        let mutated = mutated_names(&body);
        assert!(mutated.contains("a"));
        assert!(mutated.contains("v"));
        assert!(mutated.contains("c"));
        assert!(!mutated.contains("b"));
    }

    #[test]
    fn parenthesization() {
        let sum = parse_expression("a + b").unwrap();
        let product = parse_expression("a * b").unwrap();
        let compare = parse_expression("a < b").unwrap();
        assert!(!needs_parens(BinOp::Add, &product, true));
        assert!(needs_parens(BinOp::Mul, &sum, false));
        assert!(!needs_parens(BinOp::Sub, &sum, false));
        assert!(needs_parens(BinOp::Sub, &sum, true));
        assert!(!needs_parens(BinOp::And, &compare, false));
        assert!(needs_parens(BinOp::BitAnd, &compare, true));
        assert!(needs_parens(BinOp::Shl, &sum, false));
    }

    #[test]
    fn auto_types_from_initializers() {
        let Stmt::Decl(d) = &parse_body("auto p = std::make_unique<Node>(1);")[0] else {
            panic!("not a decl");
        };
        let ty = infer_type(&d.init).unwrap();
        assert!(matches!(ty.kind, TypeKind::Pointer { ownership: Ownership::Unique, .. }));
        let Stmt::Decl(t) = &parse_body("auto t = std::thread(work, 1);")[0] else {
            panic!("not a decl");
        };
        assert!(infer_type(&t.init).unwrap().threading_kind().is_some());
        let Stmt::Decl(x) = &parse_body("auto x = y + 1;")[0] else {
            panic!("not a decl");
        };
        assert_eq!(infer_type(&x.init), None);
    }
}
