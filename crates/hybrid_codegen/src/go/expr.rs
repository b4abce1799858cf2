//! Expression lowering for Go: names, operators, casts, literals, and the
//! conversions Go's strict typing asks for where C++ converts implicitly.

use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::go_token;
use hybrid_ir::{AsyncKind, ContainerKind, Ownership, ThreadingKind, Type, TypeKind};

use super::body::{
    atom, element_type, go_string, indent_lines, is_map_type, is_string_type, negated, pointee,
    FnScope, GoLowering,
};
use super::{composite, VarKind};
use crate::lower::scope::infer_type;
use crate::lower::{BinOp, Expr, IncDec, Init, Lambda, UnaryOp};
use crate::naming::{go_local, go_member, simple_name};

/// An integer literal without C++ suffixes; digit separators become `_`.
pub(super) fn int_literal(text: &str) -> String {
    let text = text.trim();
    let hex = text.starts_with("0x") || text.starts_with("0X");
    let body = if hex {
        text.trim_end_matches(['u', 'U', 'l', 'L'])
    } else {
        text.trim_end_matches(['u', 'U', 'l', 'L', 'z', 'Z'])
    };
    body.replace('\'', "_")
}

fn float_literal(text: &str) -> String {
    let body = text.trim().trim_end_matches(['f', 'F', 'l', 'L']).replace('\'', "_");
    if body.ends_with('.') {
        format!("{body}0")
    } else {
        body
    }
}

/// Constants of the C and C++ standard libraries.
fn std_constant(name: &str) -> Option<&'static str> {
    Some(match name {
        "std::string::npos" | "string::npos" | "npos" => "-1",
        "INT_MAX" => "math.MaxInt32",
        "INT_MIN" => "math.MinInt32",
        "LONG_MAX" | "LLONG_MAX" => "math.MaxInt64",
        "LONG_MIN" | "LLONG_MIN" => "math.MinInt64",
        "UINT_MAX" => "math.MaxUint32",
        "SIZE_MAX" => "math.MaxUint",
        "M_PI" => "math.Pi",
        "M_E" => "math.E",
        "EXIT_SUCCESS" => "0",
        "EXIT_FAILURE" => "1",
        "std::nullopt" | "nullopt" => "nil",
        "std::endl" | "endl" => "\"\\n\"",
        _ => return None,
    })
}

/// The Go spelling of a basic type, or nothing for other types.
pub(super) fn go_primitive(ty: &Type) -> Option<&'static str> {
    match ty.kind {
        TypeKind::Bool | TypeKind::Integer | TypeKind::Float => Some(go_token(&ty.name)),
        _ => None,
    }
}

/// Binding strength of a Go binary operator.
fn go_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Mul | BinOp::Div | BinOp::Rem | BinOp::Shl | BinOp::Shr | BinOp::BitAnd => 5,
        BinOp::Add | BinOp::Sub | BinOp::BitOr | BinOp::BitXor => 4,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 3,
        BinOp::And => 2,
        BinOp::Or => 1,
    }
}

/// True if `child` must be parenthesized as an operand of `parent` under
/// Go's precedence table.
fn go_needs_parens(parent: BinOp, child: &Expr, is_rhs: bool) -> bool {
    match child {
        Expr::Binary { op, .. } => {
            let (p, c) = (go_precedence(parent), go_precedence(*op));
            c < p || (c == p && is_rhs)
        }
        _ => false,
    }
}

impl GoLowering<'_> {
    // ========================================================================
    // Types of expressions
    // ========================================================================

    /// The C++ type of `e`, where it can be told.
    pub(super) fn type_of(&self, e: &Expr) -> Option<Type> {
        match e {
            Expr::Name(n) => self.name_type(n),
            Expr::This => self
                .site
                .class
                .map(|c| Type::pointer(Type::class(c.name.clone()), Ownership::Raw)),
            Expr::Int(text) => Some(if text.to_ascii_lowercase().ends_with("ull") || text.ends_with("UL") {
                Type::integer("unsigned long")
            } else if text.ends_with(['l', 'L']) {
                Type::integer("long")
            } else {
                Type::integer("int")
            }),
            Expr::Float(text) => Some(if text.ends_with(['f', 'F']) {
                Type::float("float")
            } else {
                Type::float("double")
            }),
            Expr::Str(_) => Some(Type::string()),
            Expr::Char(_) => Some(Type::integer("char")),
            Expr::Bool(_) => Some(Type::bool()),
            Expr::Null => None,
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Some(Type::bool()),
                UnaryOp::Deref => self
                    .type_of(operand)
                    .and_then(|t| t.without_reference().element().cloned()),
                UnaryOp::AddrOf => self
                    .type_of(operand)
                    .map(|t| Type::pointer(t.without_reference().clone(), Ownership::Raw)),
                _ => self.type_of(operand),
            },
            Expr::Postfix { operand, .. } => self.type_of(operand),
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() {
                    return Some(Type::bool());
                }
                let l = self.type_of(lhs);
                let r = self.type_of(rhs);
                match (&l, &r) {
                    (Some(a), Some(b))
                        if matches!(a.without_reference().kind, TypeKind::Integer)
                            && matches!(b.without_reference().kind, TypeKind::Float) =>
                    {
                        r.clone()
                    }
                    (Some(a), _) if is_string_type(a) && *op == BinOp::Add => Some(Type::string()),
                    (_, Some(b)) if is_string_type(b) && *op == BinOp::Add => Some(Type::string()),
                    _ => l.clone().or_else(|| r.clone()),
                }
            }
            Expr::Assign { target, .. } => self.type_of(target),
            Expr::Ternary {
                then, otherwise, ..
            } => self.type_of(then).or_else(|| self.type_of(otherwise)),
            Expr::Call { callee, args } => self.call_type(callee, args),
            Expr::Member { base, name, .. } => {
                if let Expr::Name(var) = base.unparen() {
                    if let Some(t) = self.locals.get(&format!("{var}.{name}")) {
                        return Some(t.clone());
                    }
                }
                let base_ty = self.type_of(base)?;
                let owner = pointee(base_ty.without_reference());
                self.member_type(&owner, name)
            }
            Expr::Index { base, .. } => {
                let base_ty = self.type_of(base)?;
                let base_ty = base_ty.without_reference();
                if is_map_type(base_ty) {
                    return base_ty.args().get(1).cloned();
                }
                if is_string_type(base_ty) {
                    return Some(Type::integer("unsigned char"));
                }
                element_type(base_ty)
            }
            Expr::Cast { ty, .. } => Some(ty.clone()),
            Expr::Template { .. } => None,
            Expr::Lambda(l) => {
                let ret = l
                    .ret
                    .clone()
                    .or_else(|| l.single_return().and_then(|e| self.type_of(e)))
                    .unwrap_or_else(Type::void);
                Some(Type::new(
                    "std::function",
                    TypeKind::Function {
                        ret: Box::new(ret),
                        params: l.params.iter().map(|p| p.ty.clone()).collect(),
                        erased: true,
                    },
                ))
            }
            Expr::List { ty, .. } => ty.as_deref().map(resolve_type),
            Expr::New { ty, array, .. } => {
                let elem = resolve_type(ty);
                Some(if *array {
                    Type::array(elem, None)
                } else {
                    Type::pointer(elem, Ownership::Raw)
                })
            }
            Expr::SizeOf(_) => Some(Type::integer("uintptr_t")),
            Expr::Await(inner) => {
                let t = self.type_of(inner)?;
                match t.async_kind() {
                    Some(_) => t.args().first().cloned(),
                    None => Some(t),
                }
            }
            Expr::Paren(inner) => self.type_of(inner),
        }
    }

    fn name_type(&self, name: &str) -> Option<Type> {
        if let Some(t) = self.locals.get(name) {
            return Some(t.clone());
        }
        if let Some(class) = self.site.class {
            if let Some(f) = class.field(name) {
                return Some(f.ty.clone());
            }
            if let Some(path) = self.unit.hierarchy.field_path(self.unit.ir, &class.name, name) {
                let owner = path.last().and_then(|b| self.unit.ir.find_class(b));
                if let Some(f) = owner.and_then(|c| c.field(name)) {
                    return Some(f.ty.clone());
                }
            }
        }
        if let Some((class, field)) = name.rsplit_once("::") {
            if let Some(f) = self.unit.facts.class(class).and_then(|c| c.field(field)) {
                return Some(f.ty.clone());
            }
            if self.unit.ir.enums.iter().any(|e| e.name == simple_name(class)) {
                return Some(Type::new(simple_name(class), TypeKind::Enum));
            }
        }
        if let Some(g) = self.unit.ir.globals.iter().find(|g| g.name == name) {
            return Some(g.ty.clone());
        }
        if name.ends_with("npos") {
            return Some(Type::integer("ptrdiff_t"));
        }
        self.unit
            .ir
            .enums
            .iter()
            .find(|e| !e.is_scoped && e.variants.iter().any(|(v, _)| v == name))
            .map(|e| Type::new(e.name.clone(), TypeKind::Enum))
    }

    /// Type of a field or pair component of a value of type `owner`.
    fn member_type(&self, owner: &Type, name: &str) -> Option<Type> {
        if let TypeKind::Container {
            kind: ContainerKind::Pair,
            args,
        } = &owner.kind
        {
            return match name {
                "first" => args.first().cloned(),
                "second" => args.get(1).cloned(),
                _ => None,
            };
        }
        let class = self.unit.facts.class(&owner.name)?;
        if let Some(f) = class.field(name) {
            return Some(f.ty.clone());
        }
        let path = self.unit.hierarchy.field_path(self.unit.ir, &class.name, name)?;
        let decl = self.unit.ir.find_class(path.last()?)?;
        decl.field(name).map(|f| f.ty.clone())
    }

    fn call_type(&self, callee: &Expr, args: &[Expr]) -> Option<Type> {
        match callee.unparen() {
            Expr::Member { base, name, .. } => {
                let base_ty = self.type_of(base)?;
                let owner = pointee(base_ty.without_reference());
                if let Some(t) = std_method_type(&owner, name) {
                    return Some(t);
                }
                let class = self.unit.facts.class(&owner.name)?;
                let m = class.methods.iter().find(|m| &m.name == name)?;
                Some(self.result_type(m))
            }
            Expr::Name(name) => {
                let simple = name.strip_prefix("std::").unwrap_or(name);
                match simple {
                    "to_string" | "string" => return Some(Type::string()),
                    "stoi" | "atoi" => return Some(Type::integer("int")),
                    "stol" | "stoll" | "atol" => return Some(Type::integer("long")),
                    "stod" | "stof" | "atof" => return Some(Type::float("double")),
                    "move" | "forward" | "max" | "min" | "abs" => {
                        return args.first().and_then(|a| self.type_of(a))
                    }
                    "sqrt" | "pow" | "sin" | "cos" | "tan" | "exp" | "log" | "floor" | "ceil"
                    | "round" | "fabs" | "fmod" | "hypot" | "atan2" => {
                        return Some(Type::float("double"))
                    }
                    "async" => {
                        let inner = args
                            .iter()
                            .find(|a| !matches!(a.unparen(), Expr::Name(n) if n.contains("launch::")))
                            .and_then(|f| match f.unparen() {
                                Expr::Lambda(l) => l
                                    .ret
                                    .clone()
                                    .or_else(|| l.single_return().and_then(|e| self.type_of(e))),
                                Expr::Name(n) => self.unit.facts.free_return_type(n).cloned(),
                                _ => None,
                            })
                            .unwrap_or_else(Type::void);
                        return Some(future_of(inner));
                    }
                    _ => {}
                }
                if let Some(t) = self.locals.get(name) {
                    if let TypeKind::Function { ret, .. } = &t.kind {
                        return Some(ret.as_ref().clone());
                    }
                }
                if let Some(class) = self.site.class {
                    if let Some(m) = class.methods.iter().find(|m| &m.name == name && !m.is_constructor) {
                        return Some(self.result_type(m));
                    }
                }
                if let Some((class, method)) = name.rsplit_once("::") {
                    if let Some(m) = self
                        .unit
                        .facts
                        .class(class)
                        .and_then(|c| c.methods.iter().find(|m| m.name == method))
                    {
                        return Some(self.result_type(m));
                    }
                }
                if let Some(f) = self.unit.ir.functions.iter().find(|f| &f.name == name) {
                    return Some(self.result_type(f));
                }
                if self.unit.facts.class(name).is_some() {
                    return Some(Type::class(name.clone()));
                }
                infer_type(&Init::Expr(Expr::Call {
                    callee: Box::new(callee.clone()),
                    args: Vec::new(),
                }))
            }
            Expr::Template { .. } => infer_type(&Init::Expr(Expr::Call {
                callee: Box::new(callee.clone()),
                args: Vec::new(),
            })),
            _ => None,
        }
    }

    /// What a call to `f` yields in Go: async functions hand back a channel.
    fn result_type(&self, f: &hybrid_ir::Function) -> Type {
        let ret = crate::facts::effective_return(f).unwrap_or_else(Type::void);
        if f.is_async() {
            future_of(ret)
        } else {
            ret
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// A name read as a value.
    fn name(&mut self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        if let Some(ty) = self.locals.get(name).cloned() {
            let ident = go_local(name);
            if ty.threading_kind() == Some(ThreadingKind::Atomic) {
                return format!("{ident}.Load()");
            }
            if is_pointer_ref(&ty) {
                return format!("*{ident}");
            }
            return ident;
        }
        if self.caught.contains(&go_local(name)) {
            return go_local(name);
        }
        if let Some(text) = self.field(name, false) {
            return text;
        }
        if let Some(text) = self.static_ref(name, false) {
            return text;
        }
        if let Some(ident) = self.enumerator(name) {
            return ident;
        }
        if let Some(c) = std_constant(name) {
            if c.starts_with("math.") {
                self.imports.insert("math");
            }
            return c.to_string();
        }
        if let Some(limit) = super::calls::numeric_limit(name) {
            self.imports.insert("math");
            return limit;
        }
        if self.unit.ir.functions.iter().any(|f| f.name == name) {
            return self.unit.free_ident(name, 1);
        }
        go_local(simple_name(name))
    }

    /// A field of the enclosing class; embedded bases promote theirs.
    /// `place` keeps atomics as locations instead of loading them.
    fn field(&mut self, name: &str, place: bool) -> Option<String> {
        let class = self.site.class?;
        let owner = if class.field(name).is_some_and(|f| !f.is_static) {
            class
        } else {
            let path = self.unit.hierarchy.field_path(self.unit.ir, &class.name, name)?;
            self.unit.ir.find_class(path.last()?)?
        };
        let field = owner.field(name)?;
        if field.is_static || self.site.receiver.is_empty() {
            return None;
        }
        let text = format!("{}.{}", self.site.receiver, go_member(name, field.access));
        if field.ty.threading_kind() == Some(ThreadingKind::Atomic) && !place {
            return Some(format!("{text}.Load()"));
        }
        Some(text)
    }

    /// A global or class static.
    fn static_ref(&mut self, name: &str, place: bool) -> Option<String> {
        let key = if self.unit.statics.contains_key(name) {
            name.to_string()
        } else if let Some(class) = self.site.class.filter(|c| c.field(name).is_some()) {
            format!("{}::{name}", class.name)
        } else {
            let (class, field) = name.rsplit_once("::")?;
            format!("{}::{field}", simple_name(class))
        };
        let item = self.unit.statics.get(&key)?;
        Some(match item.kind {
            VarKind::Atomic if !place => format!("{}.Load()", item.ident),
            _ => item.ident.clone(),
        })
    }

    fn enumerator(&self, name: &str) -> Option<String> {
        if let Some(ident) = self.unit.enumerators.get(name) {
            return Some(ident.clone());
        }
        let (owner, variant) = name.rsplit_once("::")?;
        self.unit
            .enumerators
            .get(&format!("{}::{variant}", simple_name(owner)))
            .cloned()
    }

    // ========================================================================
    // Value, place and condition forms
    // ========================================================================

    /// `e` as a Go value expression.
    pub(super) fn expr(&mut self, e: &Expr) -> String {
        match e {
            Expr::Name(n) => self.name(n),
            Expr::This => self.site.receiver.clone(),
            Expr::Int(text) => int_literal(text),
            Expr::Float(text) => float_literal(text),
            Expr::Str(s) => format!("\"{}\"", go_string(s)),
            Expr::Char(c) => rune_literal(c),
            Expr::Bool(b) => b.to_string(),
            Expr::Null => "nil".to_string(),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Postfix { op, operand } => {
                let place = self.place(operand);
                let old = self.temp("old");
                self.before(format!("{old} := {place}"));
                let step = if self.is_atomic_place(operand) {
                    format!("{place}.Add({})", if *op == IncDec::Inc { "1" } else { "-1" })
                } else {
                    format!("{place}{}", if *op == IncDec::Inc { "++" } else { "--" })
                };
                self.before(step);
                old
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Assign { op, target, value } => {
                let place = self.place(target);
                let v = self.expr(value);
                let op = op.map_or("", |o| o.symbol());
                self.before(format!("{place} {op}= {v}"));
                self.expr(target)
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => self.ternary(cond, then, otherwise),
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Member { base, name, .. } => self.member(base, name, false),
            Expr::Index { base, index } => self.index(base, index),
            Expr::Cast { ty, operand } => self.cast(ty, operand),
            Expr::Template { name, args } => {
                let ident = self.unit.free_ident(name, 1);
                let types: Vec<String> = args.iter().map(|a| self.go_type(&resolve_type(a))).collect();
                format!("{ident}[{}]", types.join(", "))
            }
            Expr::Lambda(l) => self.lambda(l),
            Expr::List { ty: Some(ty), items } => {
                let ty = resolve_type(ty);
                self.list_value(&ty, items)
            }
            Expr::List { ty: None, items } => {
                let elem = items.first().and_then(|i| self.type_of(i));
                match elem {
                    Some(t) => self.list_value(&Type::array(t.without_reference().clone(), None), items),
                    None => {
                        let values: Vec<String> = items.iter().map(|i| self.expr(i)).collect();
                        format!("[]any{{{}}}", values.join(", "))
                    }
                }
            }
            Expr::New { ty, args, array } => {
                let ty = resolve_type(ty);
                self.new_value(&ty, args, *array)
            }
            Expr::SizeOf(t) => {
                self.imports.insert("unsafe");
                if self.locals.contains(t) {
                    format!("unsafe.Sizeof({})", go_local(t))
                } else {
                    let ty = self.go_type(&resolve_type(t));
                    format!("unsafe.Sizeof(*new({ty}))")
                }
            }
            Expr::Await(inner) => {
                let text = self.expr(inner);
                format!("<-{}", atom(&text))
            }
            Expr::Paren(inner) => match inner.unparen() {
                e @ Expr::Binary { .. } => format!("({})", self.expr(e)),
                e => self.expr(e),
            },
        }
    }

    /// `e` as an assignment target.
    pub(super) fn place(&mut self, e: &Expr) -> String {
        match e.unparen() {
            Expr::Name(n) => {
                if let Some(alias) = self.aliases.get(n) {
                    return alias.clone();
                }
                if let Some(ty) = self.locals.get(n) {
                    let ident = go_local(n);
                    return if is_pointer_ref(ty) {
                        format!("*{ident}")
                    } else {
                        ident
                    };
                }
                if let Some(text) = self.field(n, true) {
                    return text;
                }
                if let Some(text) = self.static_ref(n, true) {
                    return text;
                }
                go_local(simple_name(n))
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let p = self.expr(operand);
                format!("*{}", atom(&p))
            }
            Expr::Member { base, name, .. } => self.member(base, name, true),
            Expr::Index { base, index } => {
                let recv = self.receiver(base);
                let i = self.expr(index);
                format!("{recv}[{i}]")
            }
            other => self.expr(other),
        }
    }

    /// `e` as the operand of a selector or index: reference locals and
    /// pointers are used without dereferencing, since Go selects through
    /// pointers.
    pub(super) fn receiver(&mut self, e: &Expr) -> String {
        match e.unparen() {
            Expr::Name(n) => {
                if let Some(alias) = self.aliases.get(n) {
                    return alias.clone();
                }
                if self.locals.contains(n) {
                    return go_local(n);
                }
                if let Some(text) = self.field(n, true) {
                    return text;
                }
                if let Some(text) = self.static_ref(n, true) {
                    return text;
                }
                self.name(n)
            }
            Expr::This => self.site.receiver.clone(),
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            } => self.receiver(operand),
            Expr::Member { base, name, .. } => self.member(base, name, true),
            other => {
                let text = self.expr(other);
                atom(&text)
            }
        }
    }

    /// A slice or map operand: reference locals are dereferenced because
    /// Go does not index through pointers.
    pub(super) fn container(&mut self, e: &Expr) -> String {
        let text = self.place(e);
        if text.starts_with('*') {
            format!("({text})")
        } else {
            text
        }
    }

    /// `e` as a `bool`.
    pub(super) fn condition(&mut self, e: &Expr) -> String {
        match e.unparen() {
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => negated(&self.condition(operand)),
            Expr::Binary { op, .. } if op.is_comparison() => self.expr(e),
            Expr::Bool(_) => self.expr(e),
            other => {
                let ty = self.type_of(other);
                let text = self.expr(other);
                match ty.as_ref().map(|t| t.without_reference()) {
                    Some(t) if is_string_type(t) && matches!(t.kind, TypeKind::Pointer { .. }) => {
                        format!("{text} != \"\"")
                    }
                    Some(t) => match &t.kind {
                        TypeKind::Integer | TypeKind::Float | TypeKind::Enum => {
                            format!("{} != 0", atom(&text))
                        }
                        TypeKind::Pointer { .. }
                        | TypeKind::Function { .. }
                        | TypeKind::Container {
                            kind: ContainerKind::Optional,
                            ..
                        } => format!("{} != nil", atom(&text)),
                        _ => text,
                    },
                    None => text,
                }
            }
        }
    }

    /// True if `e` names an atomic variable or field.
    pub(super) fn is_atomic_place(&self, e: &Expr) -> bool {
        self.type_of(e)
            .is_some_and(|t| t.without_reference().threading_kind() == Some(ThreadingKind::Atomic))
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> String {
        match op {
            UnaryOp::Neg => format!("-{}", atom(&self.expr(operand))),
            UnaryOp::Plus => self.expr(operand),
            UnaryOp::Not => negated(&self.condition(operand)),
            UnaryOp::BitNot => format!("^{}", atom(&self.expr(operand))),
            UnaryOp::Deref => {
                if matches!(operand.unparen(), Expr::This) {
                    return format!("*{}", self.site.receiver);
                }
                let ty = self.type_of(operand);
                let text = self.expr(operand);
                match ty.as_ref().map(|t| &t.without_reference().kind) {
                    Some(TypeKind::Pointer { .. })
                    | Some(TypeKind::Container {
                        kind: ContainerKind::Optional,
                        ..
                    }) => format!("*{}", atom(&text)),
                    _ => text,
                }
            }
            UnaryOp::AddrOf => {
                if matches!(operand.unparen(), Expr::This) {
                    return self.site.receiver.clone();
                }
                let place = self.place(operand);
                match place.strip_prefix('*') {
                    Some(pointer) => pointer.to_string(),
                    None => format!("&{place}"),
                }
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let place = self.place(operand);
                let inc = op == UnaryOp::PreInc;
                if self.is_atomic_place(operand) {
                    return format!("{place}.Add({})", if inc { "1" } else { "-1" });
                }
                self.before(format!("{place}{}", if inc { "++" } else { "--" }));
                self.expr(operand)
            }
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> String {
        if let Some(text) = self.search_comparison(op, lhs, rhs) {
            return text;
        }
        if matches!(op, BinOp::Eq | BinOp::Ne) {
            let other = match (lhs.unparen(), rhs.unparen()) {
                (other, Expr::Null) | (Expr::Null, other) => Some(other),
                _ => None,
            };
            if let Some(other) = other {
                let text = self.expr(other);
                return format!("{} {} nil", atom(&text), op.symbol());
            }
        }
        if op == BinOp::And || op == BinOp::Or {
            let l = self.condition(lhs);
            let r = self.condition(rhs);
            let l = if go_needs_parens(op, lhs, false) { format!("({l})") } else { l };
            let r = if go_needs_parens(op, rhs, true) { format!("({r})") } else { r };
            return format!("{l} {} {r}", op.symbol());
        }
        let lt = self.type_of(lhs).map(|t| t.without_reference().clone());
        let rt = self.type_of(rhs).map(|t| t.without_reference().clone());
        if op == BinOp::Add
            && (lt.as_ref().is_some_and(is_string_type) || rt.as_ref().is_some_and(is_string_type))
        {
            let l = self.string_value(lhs);
            let r = self.string_value(rhs);
            return format!("{l} + {r}");
        }
        if let Some(method) = lt.as_ref().and_then(|t| self.operator_method(t, op, false)) {
            let recv = self.receiver(lhs);
            let arg = self.expr(rhs);
            return format!("{recv}.{method}({arg})");
        }
        if op == BinOp::Rem
            && [&lt, &rt]
                .iter()
                .any(|t| t.as_ref().is_some_and(|t| matches!(t.kind, TypeKind::Float)))
        {
            self.imports.insert("math");
            let float = Type::float("double");
            let a = self.coerce(lhs, &float);
            let b = self.coerce(rhs, &float);
            return format!("math.Mod({a}, {b})");
        }
        let mut l = self.expr(lhs);
        let mut r = self.expr(rhs);
        if let (Some(a), Some(b)) = (&lt, &rt) {
            if matches!(op, BinOp::Shl | BinOp::Shr) {
                // Shift counts take any integer type.
            } else if let (Some(ta), Some(tb)) = (go_primitive(a), go_primitive(b)) {
                let (lit_l, lit_r) = (is_literal(lhs), is_literal(rhs));
                let int_float = matches!(a.kind, TypeKind::Integer) && matches!(b.kind, TypeKind::Float);
                let float_int = matches!(a.kind, TypeKind::Float) && matches!(b.kind, TypeKind::Integer);
                if ta != tb {
                    if int_float && !lit_l {
                        l = format!("{tb}({l})");
                    } else if float_int && !lit_r {
                        r = format!("{ta}({r})");
                    } else if !lit_l && !lit_r && ta != "bool" && tb != "bool" {
                        r = format!("{ta}({r})");
                    }
                }
            }
        }
        if go_needs_parens(op, lhs, false) {
            l = format!("({l})");
        }
        if go_needs_parens(op, rhs, true) {
            r = format!("({r})");
        }
        format!("{l} {} {r}", op.symbol())
    }

    /// The method an overloaded operator of `ty` became, if any.
    pub(super) fn operator_method(&self, ty: &Type, op: BinOp, compound: bool) -> Option<String> {
        if !ty.is_user_defined() {
            return None;
        }
        let class = self.unit.facts.class(&ty.name)?;
        let symbol = if compound {
            format!("operator{}=", op.symbol())
        } else {
            format!("operator{}", op.symbol())
        };
        let m = class.method(&symbol)?;
        Some(self.unit.method_ident(Some(class), m))
    }

    /// `s.find(x) != npos` and `m.find(k) != m.end()` as membership tests.
    fn search_comparison(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<String> {
        if !matches!(op, BinOp::Eq | BinOp::Ne) {
            return None;
        }
        let (base, args) = match lhs.unparen().method_call() {
            Some((base, "find", args)) if args.len() == 1 => (base, args),
            _ => return None,
        };
        let is_end = match rhs.unparen() {
            Expr::Name(n) => n.ends_with("npos"),
            e => matches!(e.method_call(), Some((_, "end", _))),
        };
        if !is_end {
            return None;
        }
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        let recv = self.container(base);
        let needle = self.expr(&args[0]);
        let text = match base_ty.as_ref() {
            Some(t) if is_map_type(t) || super::body::is_set_type(t) => {
                format!("func() bool {{ _, ok := {recv}[{needle}]; return ok }}()")
            }
            Some(t) if is_string_type(t) => {
                self.imports.insert("strings");
                let needle = match args[0].unparen() {
                    Expr::Char(_) => format!("string(rune({needle}))"),
                    _ => needle,
                };
                format!("strings.Contains({recv}, {needle})")
            }
            _ => {
                self.imports.insert("slices");
                format!("slices.Contains({recv}, {needle})")
            }
        };
        Some(if op == BinOp::Eq { negated(&text) } else { text })
    }

    fn ternary(&mut self, cond: &Expr, then: &Expr, otherwise: &Expr) -> String {
        let c = self.condition(cond);
        let ty = self.type_of(then).or_else(|| self.type_of(otherwise));
        let (a, b, go_ty) = match &ty {
            Some(t) => {
                let t = t.without_reference().clone();
                let a = self.coerce(then, &t);
                let b = self.coerce(otherwise, &t);
                (a, b, self.go_type(&t))
            }
            None => (self.expr(then), self.expr(otherwise), "any".to_string()),
        };
        format!("func() {go_ty} {{\n\tif {c} {{\n\t\treturn {a}\n\t}}\n\treturn {b}\n}}()")
    }

    // ========================================================================
    // Members, indexing and casts
    // ========================================================================

    fn member(&mut self, base: &Expr, name: &str, place: bool) -> String {
        if let Expr::Name(var) = base.unparen() {
            if let Some(alias) = self.aliases.get(&format!("{var}.{name}")) {
                return alias.clone();
            }
        }
        if matches!(base.unparen(), Expr::This) {
            if let Some(text) = self.field(name, place) {
                return text;
            }
            return format!("{}.{}", self.site.receiver, go_local(name));
        }
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        let owner = base_ty.as_ref().map(pointee);
        let recv = self.receiver(base);
        if let Some(TypeKind::Container {
            kind: ContainerKind::Pair,
            ..
        }) = owner.as_ref().map(|t| &t.kind)
        {
            let field = if name == "first" { "First" } else { "Second" };
            return format!("{recv}.{field}");
        }
        let mut ident = go_local(name);
        let mut is_atomic = false;
        if let Some(class) = owner.as_ref().and_then(|t| self.unit.facts.class(&t.name)) {
            let decl = match class.field(name) {
                Some(_) => Some(class),
                None => self
                    .unit
                    .hierarchy
                    .field_path(self.unit.ir, &class.name, name)
                    .and_then(|p| p.last().and_then(|b| self.unit.ir.find_class(b))),
            };
            if let Some(f) = decl.and_then(|c| c.field(name)) {
                ident = go_member(name, f.access);
                is_atomic = f.ty.threading_kind() == Some(ThreadingKind::Atomic);
            }
        }
        let text = format!("{recv}.{ident}");
        if is_atomic && !place {
            return format!("{text}.Load()");
        }
        text
    }

    fn index(&mut self, base: &Expr, index: &Expr) -> String {
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        let i = self.expr(index);
        match base_ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Pointer {
                ownership: Ownership::Raw,
                pointee: target,
            }) if !matches!(target.kind, TypeKind::Array { .. })
                && !base_ty.as_ref().is_some_and(is_string_type) =>
            {
                self.imports.insert("unsafe");
                let p = self.expr(base);
                format!("unsafe.Slice({p}, {}+1)[{i}]", atom(&i))
            }
            _ => {
                let recv = self.container(base);
                format!("{recv}[{i}]")
            }
        }
    }

    fn cast(&mut self, ty: &Type, operand: &Expr) -> String {
        if let Some(target) = go_primitive(ty) {
            let from = self.type_of(operand);
            let text = self.expr(operand);
            let from = from.as_ref().map(|f| f.without_reference());
            if from.and_then(go_primitive) == Some(target) {
                return text;
            }
            if matches!(ty.kind, TypeKind::Bool) {
                return format!("{} != 0", atom(&text));
            }
            if from.is_some_and(|f| matches!(f.kind, TypeKind::Bool)) {
                return format!("func() {target} {{\n\tif {text} {{\n\t\treturn 1\n\t}}\n\treturn 0\n}}()");
            }
            return format!("{target}({text})");
        }
        if let TypeKind::Enum = ty.kind {
            let go_ty = self.go_type(ty);
            let text = self.expr(operand);
            return format!("{go_ty}({text})");
        }
        if let TypeKind::Pointer { pointee: target, .. } = &ty.kind {
            let from = self.type_of(operand).map(|t| pointee(t.without_reference()));
            let from_interface = from.as_ref().is_some_and(|f| {
                f.name != target.name
                    && self
                        .unit
                        .hierarchy
                        .base(&f.name)
                        .is_some_and(|b| b.has_trait())
            });
            if from_interface && target.is_user_defined() {
                let go_ty = self.go_type(ty);
                let text = self.expr(operand);
                return format!(
                    "func() {go_ty} {{\n\tv, _ := {}.({go_ty})\n\treturn v\n}}()",
                    atom(&text)
                );
            }
        }
        self.coerce(operand, ty)
    }

    // ========================================================================
    // Lambdas
    // ========================================================================

    fn lambda(&mut self, l: &Lambda) -> String {
        let hint = self.lambda_hint.take();
        let (hint_ret, hint_params) = match hint.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Function { ret, params, .. }) => (Some(ret.as_ref().clone()), params.clone()),
            _ => (None, Vec::new()),
        };
        self.locals.push();
        let mut params = Vec::new();
        for (i, p) in l.params.iter().enumerate() {
            let ty = if p.ty.without_reference().base_name() == "auto" {
                hint_params.get(i).cloned()
            } else {
                Some(p.ty.clone())
            };
            let go_ty = match &ty {
                Some(t) => self.go_type(t),
                None => "any".to_string(),
            };
            self.locals
                .declare(&p.name, ty.unwrap_or_else(|| Type::class("auto")));
            params.push(format!("{} {go_ty}", go_local(&p.name)));
        }
        let ret = l
            .ret
            .clone()
            .or(hint_ret)
            .or_else(|| l.single_return().and_then(|e| self.type_of(e)))
            .map(|t| t.without_reference().clone())
            .filter(|t| !t.is_void());
        let ret_text = match &ret {
            Some(t) => format!(" {}", self.go_type(t)),
            None => String::new(),
        };
        let single = match (l.single_return(), &ret) {
            (Some(e), Some(t)) => self.inline(|this| this.coerce(e, t)),
            _ => None,
        };
        let text = match single {
            Some(v) => format!("func({}){ret_text} {{ return {v} }}", params.join(", ")),
            None => {
                let body = self.closure_body(&l.body, FnScope::Lambda(ret.clone()));
                if body.is_empty() {
                    format!("func({}){ret_text} {{}}", params.join(", "))
                } else {
                    format!("func({}){ret_text} {{\n{}\n}}", params.join(", "), indent_lines(&body))
                }
            }
        };
        self.locals.pop();
        text
    }

    // ========================================================================
    // Coercions and construction
    // ========================================================================

    /// `e` converted to a value of type `ty`.
    pub fn coerce(&mut self, e: &Expr, ty: &Type) -> String {
        let e = e.unparen();
        if let TypeKind::Reference {
            referent,
            rvalue: false,
        } = &ty.kind
        {
            if !referent.is_const {
                return self.address_of(e);
            }
        }
        let target = ty.without_reference();
        match (&target.kind, e) {
            (_, Expr::Null) => return "nil".into(),
            (_, Expr::Name(n)) if n == "std::nullopt" || n == "nullopt" => return "nil".into(),
            (TypeKind::Pointer { .. }, Expr::New { ty: t, args, array }) => {
                let inner = resolve_type(t);
                return self.new_value(&inner, args, *array);
            }
            (
                TypeKind::Container {
                    kind: ContainerKind::Optional,
                    args,
                },
                _,
            ) => {
                let from_optional = self.type_of(e).is_some_and(|t| {
                    matches!(
                        t.without_reference().kind,
                        TypeKind::Container {
                            kind: ContainerKind::Optional,
                            ..
                        }
                    )
                });
                if from_optional {
                    return self.expr(e);
                }
                let v = match args.first() {
                    Some(t) => self.coerce(e, t),
                    None => self.expr(e),
                };
                self.helpers.insert("ptrTo");
                return format!("ptrTo({v})");
            }
            (TypeKind::Container { .. } | TypeKind::Array { .. }, Expr::List { items, ty: None }) => {
                return self.list_value(target, items);
            }
            (TypeKind::Struct | TypeKind::Class, Expr::List { items, ty: None }) => {
                return self.construct(target, items);
            }
            (TypeKind::Function { .. }, Expr::Lambda(_)) => {
                self.lambda_hint = Some(target.clone());
                return self.expr(e);
            }
            _ => {}
        }
        if matches!(e, Expr::Call { .. })
            && target.async_kind().is_none()
            && target.base_name() != "auto"
            && self
                .type_of(e)
                .is_some_and(|t| t.async_kind() == Some(AsyncKind::Future))
        {
            let text = self.expr(e);
            return format!("<-{text}");
        }
        if is_string_type(target) {
            return self.string_value(e);
        }
        if target.is_primitive() || matches!(target.kind, TypeKind::Enum) {
            return self.primitive_value(e, target);
        }
        self.expr(e)
    }

    /// A pointer to `e` for a non-const reference parameter.
    fn address_of(&mut self, e: &Expr) -> String {
        if let Expr::Name(n) = e {
            if self.locals.get(n).is_some_and(is_pointer_ref) {
                return go_local(n);
            }
        }
        match e {
            Expr::This => self.site.receiver.clone(),
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            } => self.expr(operand),
            Expr::Name(_) | Expr::Member { .. } | Expr::Index { .. } => {
                let place = self.place(e);
                match place.strip_prefix('*') {
                    Some(pointer) => pointer.to_string(),
                    None => format!("&{place}"),
                }
            }
            _ => {
                let v = self.expr(e);
                self.helpers.insert("ptrTo");
                format!("ptrTo({v})")
            }
        }
    }

    /// `e` as a Go `string`; characters are converted.
    pub(super) fn string_value(&mut self, e: &Expr) -> String {
        match e.unparen() {
            Expr::Str(s) => format!("\"{}\"", go_string(s)),
            Expr::Char(c) => {
                let text = rune_literal(c);
                format!("string({text})")
            }
            other => {
                let ty = self.type_of(other);
                let text = self.expr(other);
                match ty.as_ref().map(|t| t.without_reference()) {
                    Some(t) if matches!(t.kind, TypeKind::Integer) => {
                        format!("string(rune({text}))")
                    }
                    _ => text,
                }
            }
        }
    }

    fn primitive_value(&mut self, e: &Expr, target: &Type) -> String {
        match (e, &target.kind) {
            (Expr::Int(text), TypeKind::Bool) => {
                return (int_literal(text).trim_start_matches('0') != "").to_string()
            }
            (Expr::Int(_) | Expr::Char(_), TypeKind::Integer | TypeKind::Float | TypeKind::Enum)
            | (Expr::Float(_), TypeKind::Float)
            | (Expr::Bool(_), TypeKind::Bool) => return self.expr(e),
            (Expr::Unary { op: UnaryOp::Neg, operand }, TypeKind::Integer | TypeKind::Float)
                if is_literal(operand) =>
            {
                return self.expr(e)
            }
            _ => {}
        }
        let from = self.type_of(e);
        let text = self.expr(e);
        let Some(from) = from else {
            return text;
        };
        let from = from.without_reference();
        if matches!(target.kind, TypeKind::Bool) && !matches!(from.kind, TypeKind::Bool) {
            return match from.kind {
                TypeKind::Integer | TypeKind::Float => format!("{} != 0", atom(&text)),
                TypeKind::Pointer { .. } => format!("{} != nil", atom(&text)),
                _ => text,
            };
        }
        if matches!(target.kind, TypeKind::Enum) {
            return if from.name == target.name || matches!(from.kind, TypeKind::Enum) && simple_name(&from.name) == simple_name(&target.name) {
                text
            } else {
                let go_ty = self.go_type(target);
                format!("{go_ty}({text})")
            };
        }
        let token = go_token(&target.name);
        let from_token = match from.kind {
            TypeKind::Enum => Some(""),
            _ => go_primitive(from),
        };
        match from_token {
            Some(t) if t != token && !matches!(from.kind, TypeKind::Bool) => {
                if is_constant_expr(e) {
                    text
                } else {
                    format!("{token}({text})")
                }
            }
            _ => text,
        }
    }

    /// Zero value of `ty`, built the way a declaration without an
    /// initializer would be in C++.
    pub fn default_value(&mut self, ty: &Type) -> String {
        let ty = ty.without_reference();
        match &ty.kind {
            TypeKind::Void => String::new(),
            TypeKind::Bool => "false".into(),
            TypeKind::Integer | TypeKind::Float => "0".into(),
            TypeKind::Pointer { .. } if is_string_type(ty) => "\"\"".into(),
            TypeKind::Pointer { .. } | TypeKind::Function { .. } | TypeKind::Async { .. } => {
                "nil".into()
            }
            TypeKind::Reference { .. } => "nil".into(),
            TypeKind::Array { len: Some(_), .. } => {
                let go_ty = self.go_type(ty);
                format!("{go_ty}{{}}")
            }
            TypeKind::Array { .. } => "nil".into(),
            TypeKind::Enum => self
                .unit
                .ir
                .enums
                .iter()
                .find(|e| simple_name(&e.name) == ty.base_name())
                .and_then(|e| {
                    e.variants.first().and_then(|(v, _)| {
                        self.unit
                            .enumerators
                            .get(&format!("{}::{v}", simple_name(&e.name)))
                            .cloned()
                    })
                })
                .unwrap_or_else(|| "0".into()),
            TypeKind::TemplateParam => format!("*new({})", self.go_type(ty)),
            TypeKind::Struct | TypeKind::Class => {
                if self.unit.facts.class(&ty.name).is_some() {
                    self.construct_class(ty, &[], false)
                } else {
                    let go_ty = self.go_type(ty);
                    format!("{go_ty}{{}}")
                }
            }
            TypeKind::Container { kind, .. } => match kind {
                ContainerKind::String | ContainerKind::StringView => "\"\"".into(),
                ContainerKind::Optional => "nil".into(),
                ContainerKind::Vector | ContainerKind::List | ContainerKind::Deque => "nil".into(),
                _ => {
                    let go_ty = self.go_type(ty);
                    format!("{go_ty}{{}}")
                }
            },
            TypeKind::Threading { kind, .. } => match kind {
                ThreadingKind::ConditionVariable => "nil".into(),
                _ => {
                    let go_ty = self.go_type(ty);
                    format!("{go_ty}{{}}")
                }
            },
        }
    }

    /// The zero value for a rendered Go type.
    pub(super) fn zero_value(&self, go_ty: &str) -> String {
        match go_ty {
            "string" => "\"\"".into(),
            "bool" => "false".into(),
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
            | "uint32" | "uint64" | "uintptr" | "float32" | "float64" | "rune" | "byte" => {
                "0".into()
            }
            "any" | "error" => "nil".into(),
            t if t.starts_with('*')
                || t.starts_with("[]")
                || t.starts_with("map[")
                || t.starts_with("chan ")
                || t.starts_with("<-chan")
                || t.starts_with("func(") =>
            {
                "nil".into()
            }
            t if self.is_interface(t) => "nil".into(),
            t if self.is_type_param(t) => format!("*new({t})"),
            t if self.unit.ir.enums.iter().any(|e| simple_name(&e.name) == t) => "0".into(),
            t => format!("{t}{{}}"),
        }
    }

    fn is_interface(&self, go_ty: &str) -> bool {
        self.unit
            .hierarchy
            .bases()
            .any(|b| b.has_trait() && super::GoUnit::interface_name(b) == go_ty)
    }

    fn is_type_param(&self, go_ty: &str) -> bool {
        let in_function = self
            .site
            .function
            .is_some_and(|f| f.template.params.iter().any(|p| p.name == go_ty));
        let in_class = self
            .site
            .class
            .is_some_and(|c| c.template.params.iter().any(|p| p.name == go_ty));
        in_function || in_class
    }

    /// A braced list as a value of `ty`.
    pub fn list_value(&mut self, ty: &Type, items: &[Expr]) -> String {
        let ty = ty.without_reference();
        let element = element_type(ty);
        let elems = |this: &mut Self, items: &[Expr]| -> Vec<String> {
            items
                .iter()
                .map(|i| match &element {
                    Some(t) => this.coerce(i, t),
                    None => this.expr(i),
                })
                .collect()
        };
        match &ty.kind {
            TypeKind::Container { kind, args } => match kind {
                ContainerKind::Vector | ContainerKind::List | ContainerKind::Deque => {
                    let go_ty = self.go_type(ty);
                    format!("{go_ty}{{{}}}", elems(self, items).join(", "))
                }
                ContainerKind::Map | ContainerKind::UnorderedMap => {
                    let go_ty = self.go_type(ty);
                    let pairs: Vec<String> = items
                        .iter()
                        .map(|i| match i.unparen() {
                            Expr::List { items: kv, .. } if kv.len() == 2 => {
                                let k = match args.first() {
                                    Some(t) => self.coerce(&kv[0], t),
                                    None => self.expr(&kv[0]),
                                };
                                let v = match args.get(1) {
                                    Some(t) => self.coerce(&kv[1], t),
                                    None => self.expr(&kv[1]),
                                };
                                format!("{k}: {v}")
                            }
                            other => self.expr(other),
                        })
                        .collect();
                    format!("{go_ty}{{{}}}", pairs.join(", "))
                }
                ContainerKind::Set | ContainerKind::UnorderedSet => {
                    let go_ty = self.go_type(ty);
                    let keys: Vec<String> = elems(self, items)
                        .into_iter()
                        .map(|k| format!("{k}: {{}}"))
                        .collect();
                    format!("{go_ty}{{{}}}", keys.join(", "))
                }
                ContainerKind::Pair | ContainerKind::Tuple => {
                    let go_ty = self.go_type(ty);
                    let parts: Vec<String> = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| match args.get(i) {
                            Some(t) => self.coerce(item, t),
                            None => self.expr(item),
                        })
                        .collect();
                    format!("{go_ty}{{{}}}", parts.join(", "))
                }
                ContainerKind::String | ContainerKind::StringView | ContainerKind::Optional => {
                    match items {
                        [single] => self.coerce(single, ty),
                        _ => self.default_value(ty),
                    }
                }
            },
            TypeKind::Array { .. } => {
                let go_ty = self.go_type(ty);
                format!("{go_ty}{{{}}}", elems(self, items).join(", "))
            }
            TypeKind::Struct | TypeKind::Class => self.construct(ty, items),
            _ => match items {
                [single] => self.coerce(single, ty),
                _ => self.default_value(ty),
            },
        }
    }

    /// `T(args)` for a value of type `ty`.
    pub fn construct(&mut self, ty: &Type, args: &[Expr]) -> String {
        let ty = ty.without_reference();
        match &ty.kind {
            TypeKind::Struct | TypeKind::Class => self.construct_class(ty, args, false),
            TypeKind::Container { kind, args: targs } => match (kind, args) {
                (_, []) => self.default_value(ty),
                (ContainerKind::String, [n, c]) => {
                    self.imports.insert("strings");
                    let n = self.expr(n);
                    let c = self.string_value(c);
                    format!("strings.Repeat({c}, int({n}))")
                }
                (ContainerKind::Vector | ContainerKind::Deque, [n])
                    if !matches!(n.unparen(), Expr::List { .. }) && !self.type_of(n).is_some_and(|t| t.is_container()) =>
                {
                    let go_ty = self.go_type(ty);
                    let n = self.expr(n);
                    format!("make({go_ty}, {n})")
                }
                (ContainerKind::Vector | ContainerKind::Deque, [n, v]) => {
                    self.imports.insert("slices");
                    let go_ty = self.go_type(ty);
                    let n = self.expr(n);
                    let v = match targs.first() {
                        Some(t) => self.coerce(v, t),
                        None => self.expr(v),
                    };
                    format!("slices.Repeat({go_ty}{{{v}}}, int({n}))")
                }
                (_, [single]) => self.coerce(single, ty),
                _ => self.list_value(ty, args),
            },
            _ => match args {
                [single] => self.coerce(single, ty),
                _ => self.default_value(ty),
            },
        }
    }

    /// A class value, or a pointer to one with `pointer`, built by its
    /// constructor function or as a composite literal for aggregates.
    pub(super) fn construct_class(&mut self, ty: &Type, args: &[Expr], pointer: bool) -> String {
        let deref = if pointer { "" } else { "*" };
        let addr = if pointer { "&" } else { "" };
        let Some(class) = self.unit.facts.class(&ty.name) else {
            let go_ty = self.go_type(ty);
            if args.is_empty() {
                return format!("{addr}{go_ty}{{}}");
            }
            let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
            return format!("{deref}New{}({})", simple_name(&go_ty), values.join(", "));
        };
        let generic_args = match (ty.name.find('<'), class.template.specialization.is_none()) {
            (Some(_), true) => {
                let text = self.go_type(ty);
                text.find('[').map_or_else(String::new, |i| text[i..].to_string())
            }
            _ => String::new(),
        };
        let ctors: Vec<&hybrid_ir::Function> = class.constructors().collect();
        if ctors.is_empty() && !args.is_empty() && self.unit.hierarchy.data_base(&class.name).is_none() {
            let fields: Vec<(String, Type, hybrid_ir::AccessLevel)> = class
                .instance_fields()
                .map(|f| (f.name.clone(), f.ty.clone(), f.access))
                .collect();
            let mut parts = Vec::new();
            for (i, (field, fty, access)) in fields.iter().enumerate() {
                if let Some(a) = args.get(i) {
                    let value = self.coerce(a, fty);
                    parts.push((go_member(field, *access), value));
                }
            }
            let name = format!("{}{generic_args}", self.unit.type_name(class));
            return format!("{addr}{}", composite(&name, &parts));
        }
        let index = self.unit.select_constructor(class, args.len());
        let ident = self.unit.ctor_ident(class, index);
        let values = match ctors.get(index) {
            Some(ctor) => self.args_for(&ctor.params, args),
            None => Vec::new(),
        };
        let call = format!("{ident}{generic_args}({})", values.join(", "));
        let fallible = ctors
            .get(index)
            .is_some_and(|c| self.unit.facts.is_fallible(Some(&class.name), c));
        if fallible {
            let temp = self.hoist(call, true);
            return format!("{deref}{temp}");
        }
        format!("{deref}{call}")
    }

    /// `new T(args)` and `new T[n]`.
    pub(super) fn new_value(&mut self, ty: &Type, args: &[Expr], array: bool) -> String {
        if array {
            let go_ty = self.go_type(ty);
            return match args.first() {
                Some(n) => {
                    let n = self.expr(n);
                    format!("make([]{go_ty}, {n})")
                }
                None => "nil".into(),
            };
        }
        match &ty.kind {
            TypeKind::Struct | TypeKind::Class => self.construct_class(ty, args, true),
            _ => match args {
                [] => {
                    let go_ty = self.go_type(ty);
                    format!("new({go_ty})")
                }
                _ => {
                    let v = self.construct(ty, args);
                    self.helpers.insert("ptrTo");
                    format!("ptrTo({v})")
                }
            },
        }
    }
}

/// Result types of standard container and string methods, with sizes as
/// Go's `int`.
fn std_method_type(owner: &Type, method: &str) -> Option<Type> {
    let TypeKind::Container { kind, args } = &owner.kind else {
        return match (owner.threading_kind(), method) {
            (Some(ThreadingKind::Atomic), "load" | "exchange" | "fetch_add" | "fetch_sub") => {
                owner.args().first().cloned()
            }
            (Some(ThreadingKind::Atomic), _) if method.starts_with("compare_exchange") => {
                Some(Type::bool())
            }
            _ if owner.async_kind().is_some() && method == "get" => owner.args().first().cloned(),
            _ if matches!(owner.async_kind(), Some(AsyncKind::Promise)) && method == "get_future" => {
                Some(future_of(owner.args().first().cloned().unwrap_or_else(Type::void)))
            }
            _ => None,
        };
    };
    match method {
        "size" | "length" | "count" | "capacity" => Some(Type::integer("ptrdiff_t")),
        "empty" | "contains" | "has_value" => Some(Type::bool()),
        "substr" | "c_str" => Some(Type::string()),
        "find" | "rfind" if matches!(kind, ContainerKind::String) => Some(Type::integer("ptrdiff_t")),
        "at" | "front" | "back" | "top" | "value" | "value_or" => match kind {
            ContainerKind::Map | ContainerKind::UnorderedMap => args.get(1).cloned(),
            ContainerKind::String => Some(Type::integer("unsigned char")),
            _ => args.first().cloned(),
        },
        _ => None,
    }
}

fn future_of(inner: Type) -> Type {
    let name = format!("std::future<{}>", inner.spelling());
    Type::new(
        name,
        TypeKind::Async {
            kind: AsyncKind::Future,
            args: vec![inner],
        },
    )
}

/// Non-const lvalue references are held as Go pointers.
fn is_pointer_ref(ty: &Type) -> bool {
    matches!(&ty.kind, TypeKind::Reference { referent, rvalue: false } if !referent.is_const)
}

fn is_literal(e: &Expr) -> bool {
    matches!(e.unparen(), Expr::Int(_) | Expr::Float(_) | Expr::Char(_))
}

fn is_constant_expr(e: &Expr) -> bool {
    match e.unparen() {
        Expr::Int(_) | Expr::Float(_) | Expr::Char(_) => true,
        Expr::Unary { operand, .. } => is_constant_expr(operand),
        Expr::Binary { lhs, rhs, .. } => is_constant_expr(lhs) && is_constant_expr(rhs),
        _ => false,
    }
}

/// A C++ character literal as a Go rune literal.
fn rune_literal(c: &str) -> String {
    let inner = c
        .trim_start_matches(['L', 'u', 'U'])
        .trim_start_matches('8');
    match inner {
        "'\\?'" => "'?'".to_string(),
        "'\\0'" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_drop_cpp_suffixes() {
        assert_eq!(int_literal("10u"), "10");
        assert_eq!(int_literal("1'000'000"), "1_000_000");
        assert_eq!(int_literal("0xFFul"), "0xFF");
        assert_eq!(float_literal("1.5f"), "1.5");
        assert_eq!(float_literal("2."), "2.0");
    }

    #[test]
    fn standard_constants() {
        assert_eq!(std_constant("std::string::npos"), Some("-1"));
        assert_eq!(std_constant("M_PI"), Some("math.Pi"));
        assert_eq!(std_constant("value"), None);
    }

    #[test]
    fn go_precedence_decides_parentheses() {
        let sum = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Name("a".into())),
            rhs: Box::new(Expr::Name("b".into())),
        };
        assert!(go_needs_parens(BinOp::Shl, &sum, false));
        assert!(!go_needs_parens(BinOp::Lt, &sum, false));
        assert!(go_needs_parens(BinOp::Sub, &sum, true));
    }

    #[test]
    fn character_literals() {
        assert_eq!(rune_literal("'a'"), "'a'");
        assert_eq!(rune_literal("'\\0'"), "0");
        assert_eq!(rune_literal("L'x'"), "'x'");
    }
}
