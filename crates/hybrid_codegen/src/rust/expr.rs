//! Expression lowering: names, operators, casts, literals and the
//! coercions that make a C++ value fit its Rust destination.

use hybrid_common::to_pascal_case;
use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::{rust_atomic, rust_token};
use hybrid_ir::{ContainerKind, Ownership, ThreadingKind, Type, TypeKind};

use super::body::{atom, element_type, escape_braces, is_map_type, is_string_type, negated, Lowering};
use super::StaticKind;
use crate::lower::scope::{infer_type, needs_parens};
use crate::lower::{BinOp, Expr, IncDec, Init, Lambda, UnaryOp};
use crate::naming::{rust_const, rust_ident, simple_name};
use crate::typing::pointee;
use crate::writer::CodeWriter;

/// An integer literal without C++ suffixes or digit separators.
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
    } else if body.contains(['.', 'e', 'E']) {
        body
    } else {
        format!("{body}.0")
    }
}

/// Constants of the C and C++ standard libraries.
fn std_constant(name: &str) -> Option<&'static str> {
    Some(match name {
        "std::string::npos" | "string::npos" | "npos" => "usize::MAX",
        "INT_MAX" => "i32::MAX",
        "INT_MIN" => "i32::MIN",
        "LONG_MAX" | "LLONG_MAX" => "i64::MAX",
        "LONG_MIN" | "LLONG_MIN" => "i64::MIN",
        "UINT_MAX" => "u32::MAX",
        "SIZE_MAX" => "usize::MAX",
        "M_PI" => "std::f64::consts::PI",
        "M_E" => "std::f64::consts::E",
        "EXIT_SUCCESS" => "0",
        "EXIT_FAILURE" => "1",
        "std::nullopt" | "nullopt" => "None",
        "std::endl" | "endl" => "\"\\n\"",
        _ => return None,
    })
}

impl Lowering<'_> {
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
                UnaryOp::Deref => self.type_of(operand).and_then(|t| {
                    t.without_reference().element().cloned()
                }),
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
                        r
                    }
                    (Some(a), _) if is_string_type(a) && *op == BinOp::Add => Some(Type::string()),
                    (_, Some(b)) if is_string_type(b) && *op == BinOp::Add => Some(Type::string()),
                    _ => l.or(r),
                }
            }
            Expr::Assign { target, .. } => self.type_of(target),
            Expr::Ternary {
                then, otherwise, ..
            } => self.type_of(then).or_else(|| self.type_of(otherwise)),
            Expr::Call { callee, args } => self.call_type(callee, args),
            Expr::Member { base, name, .. } => {
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
                element_type(base_ty)
            }
            Expr::Cast { ty, .. } => Some(ty.clone()),
            Expr::Template { .. } | Expr::Lambda(_) => None,
            Expr::List { ty, .. } => ty.as_deref().map(resolve_type),
            Expr::New { ty, array, .. } => {
                let elem = resolve_type(ty);
                Some(if *array {
                    Type::array(elem, None)
                } else {
                    Type::pointer(elem, Ownership::Raw)
                })
            }
            Expr::SizeOf(_) => Some(Type::integer("size_t")),
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
                std_method_type(&owner, name).or_else(|| {
                    self.unit
                        .facts
                        .method_return_type(&owner.name, name)
                        .cloned()
                })
            }
            Expr::Name(name) => {
                let simple = name.strip_prefix("std::").unwrap_or(name);
                match simple {
                    "to_string" => return Some(Type::string()),
                    "move" | "forward" | "max" | "min" | "abs" => {
                        return args.first().and_then(|a| self.type_of(a))
                    }
                    "sqrt" | "pow" | "sin" | "cos" | "tan" | "exp" | "log" | "floor" | "ceil"
                    | "round" | "fabs" => return Some(Type::float("double")),
                    _ => {}
                }
                if let Some(t) = self.locals.get(name) {
                    if let TypeKind::Function { ret, .. } = &t.kind {
                        return Some(ret.as_ref().clone());
                    }
                }
                if let Some(class) = self.site.class {
                    if let Some(t) = self.unit.facts.method_return_type(&class.name, name) {
                        return Some(t.clone());
                    }
                }
                if let Some((class, method)) = name.rsplit_once("::") {
                    if let Some(t) = self.unit.facts.method_return_type(class, method) {
                        return Some(t.clone());
                    }
                }
                if let Some(t) = self.unit.facts.free_return_type(name) {
                    return Some(t.clone());
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

    // ========================================================================
    // Names
    // ========================================================================

    /// A name read as a value.
    fn name(&mut self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        if !self.locals.contains(name) {
            if let Some(binding) = self.guards.get(name).cloned() {
                let primitive = self.type_of(&Expr::Name(name.to_string())).is_some_and(|t| t.is_primitive());
                return if primitive { format!("*{binding}") } else { binding };
            }
        }
        if let Some(ty) = self.locals.get(name).cloned() {
            let ident = rust_ident(name);
            if ty.threading_kind() == Some(ThreadingKind::Atomic) {
                self.imports.insert("std::sync::atomic::Ordering");
                return format!("{ident}.load(Ordering::SeqCst)");
            }
            if let TypeKind::Reference { referent, rvalue: false } = &ty.kind {
                if referent.is_primitive() {
                    return format!("*{ident}");
                }
            }
            return ident;
        }
        if self.caught.iter().any(|c| c == name) {
            return name.to_string();
        }
        if let Some(text) = self.field(name, false) {
            return text;
        }
        if let Some(text) = self.static_ref(name, false) {
            return text;
        }
        if let Some(variant) = self.enum_variant(name) {
            return variant;
        }
        if self.is_generic_param(name) {
            return name.to_string();
        }
        if let Some(c) = std_constant(name) {
            return c.to_string();
        }
        if self.unit.ir.find_function(name).is_some() {
            return rust_ident(name);
        }
        rust_path(name)
    }

    /// A field of the enclosing class, reached through its data bases.
    /// `place` keeps guarded and atomic fields as locations instead of
    /// loading them.
    fn field(&mut self, name: &str, place: bool) -> Option<String> {
        let class = self.site.class?;
        let path = if class.field(name).is_some_and(|f| !f.is_static) {
            Vec::new()
        } else {
            self.unit.hierarchy.field_path(self.unit.ir, &class.name, name)?
        };
        let owner = match path.last() {
            Some(base) => self.unit.ir.find_class(base)?,
            None => class,
        };
        let field = owner.field(name)?;
        if field.is_static {
            return None;
        }
        let mut text = self.site.receiver.to_string();
        for _ in &path {
            text.push_str(".base");
        }
        text.push('.');
        text.push_str(&rust_ident(name));
        if let Some(guard) = owner.threading.guard_of(name) {
            let method = if guard.is_shared && !place { "read" } else if guard.is_shared { "write" } else { "lock" };
            let locked = format!("{text}.{method}().unwrap()");
            return Some(if place || field.ty.is_primitive() {
                format!("*{locked}")
            } else {
                locked
            });
        }
        if field.ty.threading_kind() == Some(ThreadingKind::Atomic) && !place {
            self.imports.insert("std::sync::atomic::Ordering");
            return Some(format!("{text}.load(Ordering::SeqCst)"));
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
        let path = item.path.clone();
        Some(match item.kind {
            StaticKind::Const => path,
            StaticKind::Atomic if place => path,
            StaticKind::Atomic => {
                self.imports.insert("std::sync::atomic::Ordering");
                format!("{path}.load(Ordering::SeqCst)")
            }
            StaticKind::Mutex { .. } | StaticKind::Condvar => path,
            StaticKind::Locked if place || item.ty.is_primitive() => {
                format!("*{path}.lock().unwrap()")
            }
            StaticKind::Locked => format!("{path}.lock().unwrap()"),
        })
    }

    fn enum_variant(&self, name: &str) -> Option<String> {
        if let Some((owner, variant)) = name.rsplit_once("::") {
            let owner = simple_name(owner);
            let decl = self.unit.ir.enums.iter().find(|e| e.name == owner)?;
            return decl
                .variants
                .iter()
                .any(|(v, _)| v == variant)
                .then(|| format!("{}::{}", decl.name, to_pascal_case(variant)));
        }
        self.unit
            .ir
            .enums
            .iter()
            .find(|e| !e.is_scoped && e.variants.iter().any(|(v, _)| v == name))
            .map(|e| format!("{}::{}", e.name, to_pascal_case(name)))
    }

    fn is_generic_param(&self, name: &str) -> bool {
        let in_function = self
            .site
            .function
            .is_some_and(|f| f.template.params.iter().any(|p| p.name == name));
        let in_class = self
            .site
            .class
            .is_some_and(|c| c.template.params.iter().any(|p| p.name == name));
        in_function || in_class
    }

    // ========================================================================
    // Value, place and receiver forms
    // ========================================================================

    /// `e` as a Rust value expression.
    pub(super) fn expr(&mut self, e: &Expr) -> String {
        match e {
            Expr::Name(n) => self.name(n),
            Expr::This => self.site.receiver.to_string(),
            Expr::Int(text) => int_literal(text),
            Expr::Float(text) => float_literal(text),
            Expr::Str(s) => format!("\"{s}\""),
            Expr::Char(c) => format!("b{c} as i8"),
            Expr::Bool(b) => b.to_string(),
            Expr::Null => "std::ptr::null_mut()".to_string(),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Postfix { op, operand } => {
                let place = self.place(operand);
                let sign = if *op == IncDec::Inc { "+" } else { "-" };
                format!("{{ let old = {place}; {place} {sign}= 1; old }}")
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Assign { op, target, value } => {
                let place = self.place(target);
                let v = self.expr(value);
                let op = op.map_or("", |o| o.symbol());
                format!("{{ {place} {op}= {v}; {place} }}")
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = self.condition(cond);
                let ty = self.type_of(then).or_else(|| self.type_of(otherwise));
                let (a, b) = match &ty {
                    Some(t) => (self.coerce(then, t), self.coerce(otherwise, t)),
                    None => (self.expr(then), self.expr(otherwise)),
                };
                format!("if {c} {{ {a} }} else {{ {b} }}")
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Member { base, name, arrow } => self.member(base, name, *arrow, false),
            Expr::Index { base, index } => self.index(base, index),
            Expr::Cast { ty, operand } => self.cast(ty, operand),
            Expr::Template { name, .. } => rust_path(name),
            Expr::Lambda(l) => self.lambda(l),
            Expr::List { ty: Some(ty), items } => {
                let ty = resolve_type(ty);
                self.list_value(&ty, items)
            }
            Expr::List { ty: None, items } => {
                let items: Vec<String> = items.iter().map(|i| self.expr(i)).collect();
                format!("vec![{}]", items.join(", "))
            }
            Expr::New { ty, args, array } => {
                let ty = resolve_type(ty);
                if *array {
                    self.new_array(&ty, args)
                } else {
                    let value = self.construct(&ty, args);
                    format!("Box::into_raw(Box::new({value}))")
                }
            }
            Expr::SizeOf(t) => {
                let ty = resolve_type(t);
                let t = self.rust_type(&ty);
                format!("std::mem::size_of::<{t}>()")
            }
            Expr::Await(inner) => self.await_expr(inner),
            Expr::Paren(inner) => match inner.unparen() {
                e @ (Expr::Binary { .. } | Expr::Ternary { .. }) => format!("({})", self.expr(e)),
                e => self.expr(e),
            },
        }
    }

    fn await_expr(&mut self, inner: &Expr) -> String {
        let is_task = self
            .type_of(inner)
            .is_some_and(|t| t.async_kind().is_some());
        let text = self.expr(inner);
        if text.ends_with(".await") || text.ends_with(".await?") || text.ends_with(".await.unwrap()") {
            return text;
        }
        if is_task {
            format!("{}.await.unwrap()", atom(&text))
        } else {
            format!("{}.await", atom(&text))
        }
    }

    /// `e` as an assignment target.
    pub(super) fn place(&mut self, e: &Expr) -> String {
        match e.unparen() {
            Expr::Name(n) => {
                if !self.locals.contains(n) {
                    if let Some(binding) = self.guards.get(n.as_str()).cloned() {
                        return format!("*{binding}");
                    }
                }
                if let Some(ty) = self.locals.get(n) {
                    let ident = rust_ident(n);
                    return match &ty.kind {
                        TypeKind::Reference { rvalue: false, .. } => format!("*{ident}"),
                        _ => ident,
                    };
                }
                if let Some(text) = self.field(n, true) {
                    return text;
                }
                if let Some(text) = self.static_ref(n, true) {
                    return text;
                }
                rust_ident(n)
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let is_raw = self.is_raw_pointer(operand);
                let p = self.expr(operand);
                if is_raw {
                    self.unsafe_place = true;
                }
                format!("*{}", atom(&p))
            }
            Expr::Member { base, name, arrow } => self.member(base, name, *arrow, true),
            Expr::Index { base, index } => {
                let recv = self.receiver(base);
                let i = self.index_value(index);
                format!("{recv}[{i}]")
            }
            other => self.expr(other),
        }
    }

    /// `e` as the receiver of a method call or field access: locations stay
    /// unloaded and references are used through auto-deref.
    pub(super) fn receiver(&mut self, e: &Expr) -> String {
        match e.unparen() {
            Expr::Name(n) => {
                if let Some(alias) = self.aliases.get(n) {
                    return alias.clone();
                }
                if !self.locals.contains(n) {
                    if let Some(binding) = self.guards.get(n.as_str()).cloned() {
                        return binding;
                    }
                }
                if self.locals.contains(n) {
                    return rust_ident(n);
                }
                if let Some(text) = self.field(n, true) {
                    return text.strip_prefix('*').map_or(text.clone(), str::to_string);
                }
                if let Some(text) = self.static_ref(n, true) {
                    return text.strip_prefix('*').map_or(text.clone(), str::to_string);
                }
                self.name(n)
            }
            Expr::This => self.site.receiver.to_string(),
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                if self.is_raw_pointer(operand) {
                    self.raw_deref = true;
                    format!("(*{})", atom(&self.expr(operand)))
                } else {
                    self.receiver(operand)
                }
            }
            Expr::Member { base, name, arrow } => {
                let text = self.member(base, name, *arrow, true);
                text.strip_prefix('*').map_or(text.clone(), str::to_string)
            }
            other => {
                let text = self.expr(other);
                atom(&text)
            }
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
                match ty.as_ref().map(|t| &t.without_reference().kind) {
                    Some(TypeKind::Integer | TypeKind::Float) => format!("{} != 0", atom(&text)),
                    Some(TypeKind::Pointer {
                        ownership: Ownership::Raw,
                        ..
                    }) => format!("!{}.is_null()", atom(&text)),
                    Some(TypeKind::Container {
                        kind: ContainerKind::Optional,
                        ..
                    }) => format!("{}.is_some()", atom(&text)),
                    _ => text,
                }
            }
        }
    }

    fn is_raw_pointer(&self, e: &Expr) -> bool {
        self.type_of(e).is_some_and(|t| {
            matches!(
                t.without_reference().kind,
                TypeKind::Pointer {
                    ownership: Ownership::Raw,
                    ..
                }
            )
        })
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> String {
        match op {
            UnaryOp::Neg => format!("-{}", atom(&self.expr(operand))),
            UnaryOp::Plus => self.expr(operand),
            UnaryOp::Not => negated(&self.condition(operand)),
            UnaryOp::BitNot => format!("!{}", atom(&self.expr(operand))),
            UnaryOp::Deref => {
                let ty = self.type_of(operand);
                let text = self.expr(operand);
                match ty.as_ref().map(|t| &t.without_reference().kind) {
                    Some(TypeKind::Pointer {
                        ownership: Ownership::Raw,
                        ..
                    }) => {
                        self.raw_deref = true;
                        format!("unsafe {{ *{} }}", atom(&text))
                    }
                    Some(TypeKind::Pointer { .. }) => format!("*{}", atom(&text)),
                    _ => text,
                }
            }
            UnaryOp::AddrOf => {
                let mutable = match operand.unparen() {
                    Expr::Name(n) => self.mutated.contains(n),
                    _ => true,
                };
                let place = self.receiver(operand);
                if mutable {
                    format!("&mut {place}")
                } else {
                    format!("&{place}")
                }
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let place = self.place(operand);
                let sign = if op == UnaryOp::PreInc { "+" } else { "-" };
                format!("{{ {place} {sign}= 1; {place} }}")
            }
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> String {
        if let Some(text) = self.search_comparison(op, lhs, rhs) {
            return text;
        }
        if matches!(op, BinOp::Eq | BinOp::Ne) {
            let null_side = match (lhs.unparen(), rhs.unparen()) {
                (other, Expr::Null) | (Expr::Null, other) => Some(other),
                _ => None,
            };
            if let Some(other) = null_side {
                return self.null_check(op, other);
            }
        }
        if op == BinOp::And || op == BinOp::Or {
            let l = self.condition(lhs);
            let r = self.condition(rhs);
            let l = if needs_parens(op, lhs.unparen(), false) { atom(&l) } else { l };
            let r = if needs_parens(op, rhs.unparen(), true) { atom(&r) } else { r };
            return format!("{l} {} {r}", op.symbol());
        }
        let lt = self.type_of(lhs).map(|t| t.without_reference().clone());
        let rt = self.type_of(rhs).map(|t| t.without_reference().clone());
        if op == BinOp::Add && (lt.as_ref().is_some_and(is_string_type) || rt.as_ref().is_some_and(is_string_type)) {
            return self.concat(lhs, rhs);
        }
        if let Some(class) = lt.as_ref().filter(|t| t.is_user_defined()) {
            let operator = format!("operator{}", op.symbol());
            if self
                .unit
                .facts
                .class(&class.name)
                .is_some_and(|c| c.method(&operator).is_some())
            {
                let call = Expr::Call {
                    callee: Box::new(Expr::Member {
                        base: Box::new(lhs.clone()),
                        name: operator,
                        arrow: false,
                    }),
                    args: vec![rhs.clone()],
                };
                return self.expr(&call);
            }
        }
        let mut l = self.expr(lhs);
        let mut r = self.expr(rhs);
        if needs_parens(op, lhs.unparen(), false) {
            l = format!("({l})");
        }
        if needs_parens(op, rhs.unparen(), true) {
            r = format!("({r})");
        }
        if let (Some(a), Some(b)) = (&lt, &rt) {
            if matches!(op, BinOp::Shl | BinOp::Shr) {
                // Shift amounts take any integer type.
            } else if a.is_primitive() && b.is_primitive() && is_literal(lhs) && !is_literal(rhs) {
                l = self.literal_as(lhs, b);
            } else if a.is_primitive() && b.is_primitive() && !is_literal(rhs) {
                let (ta, tb) = (rust_token(&a.name), rust_token(&b.name));
                if ta != tb && !is_literal(lhs) {
                    if matches!(a.kind, TypeKind::Integer) && matches!(b.kind, TypeKind::Float) {
                        l = format!("({} as {tb})", atom(&l));
                    } else {
                        r = format!("({} as {ta})", atom(&r));
                    }
                }
            } else if matches!(a.kind, TypeKind::Float) && is_literal(rhs) {
                r = self.literal_as(rhs, a);
            }
        }
        format!("{l} {} {r}", op.symbol())
    }

    fn literal_as(&mut self, e: &Expr, ty: &Type) -> String {
        match (e.unparen(), &ty.kind) {
            (Expr::Int(text), TypeKind::Float) => float_literal(text),
            (Expr::Char(c), TypeKind::Integer) => format!("b{c} as {}", rust_token(&ty.name)),
            _ => self.expr(e),
        }
    }

    /// `s.find(x) != npos` and `m.find(k) != m.end()` as `contains`.
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
        let recv = self.receiver(base);
        let needle = &args[0];
        let text = match base_ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Container {
                kind: ContainerKind::Map | ContainerKind::UnorderedMap,
                ..
            }) => format!("{recv}.contains_key(&{})", atom(&self.expr(needle))),
            Some(TypeKind::Container {
                kind: ContainerKind::String | ContainerKind::StringView,
                ..
            }) => match needle.unparen() {
                Expr::Char(c) => format!("{recv}.contains({c})"),
                Expr::Str(s) => format!("{recv}.contains(\"{s}\")"),
                other => format!("{recv}.contains({}.as_str())", atom(&self.receiver(other))),
            },
            _ => format!("{recv}.contains(&{})", atom(&self.expr(needle))),
        };
        Some(if op == BinOp::Eq { negated(&text) } else { text })
    }

    fn null_check(&mut self, op: BinOp, other: &Expr) -> String {
        let ty = self.type_of(other);
        let text = self.receiver(other);
        let check = match ty.as_ref().map(|t| &t.without_reference().kind) {
            Some(TypeKind::Pointer {
                ownership: Ownership::Raw,
                ..
            })
            | None => format!("{text}.is_null()"),
            Some(TypeKind::Pointer {
                ownership: Ownership::Weak,
                ..
            }) => format!("{text}.upgrade().is_none()"),
            Some(TypeKind::Container {
                kind: ContainerKind::Optional,
                ..
            }) => format!("{text}.is_none()"),
            Some(_) => {
                self.gap("a null comparison of an owning pointer");
                "false".to_string()
            }
        };
        if op == BinOp::Eq {
            check
        } else {
            negated(&check)
        }
    }

    /// A chain of `+` over strings as one `format!`.
    fn concat(&mut self, lhs: &Expr, rhs: &Expr) -> String {
        let mut parts = Vec::new();
        flatten_add(lhs, &mut parts);
        flatten_add(rhs, &mut parts);
        let mut format = String::new();
        let mut args = Vec::new();
        for part in parts {
            match part.unparen() {
                Expr::Str(s) => format.push_str(&escape_braces(s)),
                Expr::Char(c) => format.push_str(&escape_braces(c.trim_matches('\''))),
                e => {
                    let is_char = self
                        .type_of(e)
                        .is_some_and(|t| matches!(t.kind, TypeKind::Integer) && t.name == "char");
                    let text = self.expr(e);
                    format.push_str("{}");
                    args.push(if is_char {
                        format!("{} as u8 as char", atom(&text))
                    } else {
                        text
                    });
                }
            }
        }
        if args.is_empty() {
            return format!("String::from(\"{format}\")");
        }
        format!("format!(\"{format}\", {})", args.join(", "))
    }

    // ========================================================================
    // Members, indexing and casts
    // ========================================================================

    fn member(&mut self, base: &Expr, name: &str, arrow: bool, place: bool) -> String {
        if matches!(base.unparen(), Expr::This) {
            if let Some(text) = self.field(name, place) {
                return text;
            }
            return format!("{}.{}", self.site.receiver, rust_ident(name));
        }
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        let owner = base_ty.as_ref().map(pointee);
        let raw = arrow
            && matches!(
                base_ty.as_ref().map(|t| &t.kind),
                Some(TypeKind::Pointer {
                    ownership: Ownership::Raw,
                    ..
                })
            );
        let recv = if raw {
            format!("(*{})", atom(&self.expr(base)))
        } else {
            self.receiver(base)
        };
        if let Some(TypeKind::Container {
            kind: ContainerKind::Pair,
            ..
        }) = owner.as_ref().map(|t| &t.kind)
        {
            let index = if name == "first" { "0" } else { "1" };
            return format!("{recv}.{index}");
        }
        let mut path = String::new();
        let mut is_atomic = false;
        if let Some(class) = owner.as_ref().and_then(|t| self.unit.facts.class(&t.name)) {
            if class.field(name).is_none() {
                if let Some(bases) = self.unit.hierarchy.field_path(self.unit.ir, &class.name, name) {
                    for _ in bases {
                        path.push_str(".base");
                    }
                }
            }
            is_atomic = self
                .member_type(&Type::class(class.name.clone()), name)
                .is_some_and(|t| t.threading_kind() == Some(ThreadingKind::Atomic));
        }
        let text = format!("{recv}{path}.{}", rust_ident(name));
        if is_atomic && !place {
            self.imports.insert("std::sync::atomic::Ordering");
            return format!("{text}.load(Ordering::SeqCst)");
        }
        if raw {
            if place {
                self.unsafe_place = true;
                return text;
            }
            self.raw_deref = true;
            return format!("unsafe {{ {text} }}");
        }
        text
    }

    fn index(&mut self, base: &Expr, index: &Expr) -> String {
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        let recv = self.receiver(base);
        match base_ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Container {
                kind: ContainerKind::Map | ContainerKind::UnorderedMap,
                ..
            }) => {
                let key = self.expr(index);
                format!("{recv}[&{}]", atom(&key))
            }
            Some(TypeKind::Container {
                kind: ContainerKind::String | ContainerKind::StringView,
                ..
            }) => {
                let i = self.index_value(index);
                format!("({recv}.as_bytes()[{i}] as i8)")
            }
            Some(TypeKind::Pointer {
                ownership: Ownership::Raw,
                ..
            }) => {
                let i = self.index_value(index);
                self.raw_deref = true;
                format!("unsafe {{ *{recv}.add({i}) }}")
            }
            _ => {
                let i = self.index_value(index);
                format!("{recv}[{i}]")
            }
        }
    }

    /// An index converted to `usize`.
    pub(super) fn index_value(&mut self, index: &Expr) -> String {
        let ty = self.type_of(index);
        let text = self.expr(index);
        match index.unparen() {
            Expr::Int(_) => text,
            _ if ty.as_ref().is_some_and(|t| rust_token(&t.without_reference().name) == "usize") => text,
            _ => format!("{} as usize", atom(&text)),
        }
    }

    fn cast(&mut self, ty: &Type, operand: &Expr) -> String {
        if ty.is_primitive() {
            let from = self.type_of(operand);
            let text = self.expr(operand);
            let target = rust_token(&ty.name);
            if from.as_ref().is_some_and(|f| rust_token(&f.without_reference().name) == target) {
                return text;
            }
            if matches!(ty.kind, TypeKind::Bool) {
                return format!("{} != 0", atom(&text));
            }
            return format!("{} as {target}", atom(&text));
        }
        if let TypeKind::Enum = ty.kind {
            self.gap(format!("a cast to the enum `{}`", ty.name));
        }
        self.coerce(operand, ty)
    }

    // ========================================================================
    // Lambdas
    // ========================================================================

    fn lambda(&mut self, l: &Lambda) -> String {
        self.locals.push();
        let params: Vec<String> = l
            .params
            .iter()
            .map(|p| {
                self.locals.declare(&p.name, p.ty.clone());
                if p.ty.without_reference().base_name() == "auto" {
                    rust_ident(&p.name)
                } else {
                    let t = self.rust_type(&p.ty);
                    format!("{}: {t}", rust_ident(&p.name))
                }
            })
            .collect();
        let moving = if l.captures_by_value() && !l.captures.contains("this") {
            "move "
        } else {
            ""
        };
        let text = match l.single_return() {
            Some(e) if l.ret.is_none() => {
                let body = self.expr(e);
                format!("{moving}|{}| {body}", params.join(", "))
            }
            _ => {
                let ret = match &l.ret {
                    Some(t) if !t.is_void() => format!(" -> {}", self.rust_type(t)),
                    _ => String::new(),
                };
                let body = self.closure_body(&l.body);
                let mut w = CodeWriter::spaces();
                w.open(format!("{moving}|{}|{ret} {{", params.join(", ")));
                w.line(body);
                w.close("}");
                let out = w.finish();
                out.trim_end().to_string()
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
        let target = ty.without_reference();
        if let TypeKind::Reference { referent, .. } = &ty.kind {
            return self.borrow(e, referent);
        }
        match (&target.kind, e) {
            (_, Expr::Name(n)) if n == "std::nullopt" || n == "nullopt" => return "None".into(),
            (
                TypeKind::Pointer {
                    ownership: Ownership::Raw,
                    pointee,
                },
                Expr::Null,
            ) => {
                return if pointee.is_const {
                    "std::ptr::null()".into()
                } else {
                    "std::ptr::null_mut()".into()
                }
            }
            (TypeKind::Pointer { .. }, Expr::Null) => {
                self.gap("a null owning pointer");
                return "unreachable!(\"null owning pointer\")".into();
            }
            (TypeKind::Pointer { ownership, .. }, Expr::New { ty: t, args, array: false }) => {
                let inner = resolve_type(t);
                let value = self.construct(&inner, args);
                return match ownership {
                    Ownership::Raw => format!("Box::into_raw(Box::new({value}))"),
                    Ownership::Shared => {
                        self.imports.insert("std::rc::Rc");
                        format!("Rc::new({value})")
                    }
                    _ => format!("Box::new({value})"),
                };
            }
            (
                TypeKind::Pointer {
                    ownership: Ownership::Raw,
                    pointee,
                },
                Expr::Unary {
                    op: UnaryOp::AddrOf,
                    operand,
                },
            ) => {
                let place = self.receiver(operand);
                let t = self.rust_type(pointee);
                return if pointee.is_const {
                    format!("&{place} as *const {t}")
                } else {
                    format!("&mut {place} as *mut {t}")
                };
            }
            (TypeKind::Container { kind: ContainerKind::Optional, args }, _) => {
                let inner = args.first().cloned();
                let v = match inner {
                    Some(t) => self.coerce(e, &t),
                    None => self.expr(e),
                };
                return format!("Some({v})");
            }
            (TypeKind::Container { .. } | TypeKind::Array { .. }, Expr::List { items, ty: None }) => {
                return self.list_value(target, items);
            }
            (TypeKind::Struct | TypeKind::Class, Expr::List { items, ty: None }) => {
                return self.construct(target, items);
            }
            (_, Expr::List { items, ty: None }) if items.is_empty() && target.is_primitive() => {
                return self.default_value(target);
            }
            (TypeKind::Threading { kind: ThreadingKind::Thread | ThreadingKind::JThread, .. }, _) => {
                let text = self.expr(e);
                return if text.starts_with("std::thread::spawn") {
                    format!("Some({text})")
                } else {
                    text
                };
            }
            (TypeKind::Function { erased: true, .. }, Expr::Lambda(_)) => {
                let closure = self.expr(e);
                return format!("Box::new({closure})");
            }
            _ => {}
        }
        if is_string_type(target) && !matches!(target.kind, TypeKind::Pointer { .. }) {
            return self.string_value(e, target);
        }
        if target.is_primitive() {
            return self.primitive_value(e, target);
        }
        let text = self.expr(e);
        if needs_clone(e, target) && !text.starts_with("format!") {
            format!("{}.clone()", atom(&text))
        } else {
            text
        }
    }

    fn borrow(&mut self, e: &Expr, referent: &Type) -> String {
        let is_ref_local = match e {
            Expr::Name(n) => self
                .locals
                .get(n)
                .is_some_and(|t| matches!(t.kind, TypeKind::Reference { .. })),
            _ => false,
        };
        if is_string_type(referent) && referent.is_const {
            return match e {
                Expr::Str(s) => format!("\"{s}\""),
                _ if is_ref_local => rust_ident(simple_name(&e_name(e))),
                _ => {
                    let ty = self.type_of(e);
                    let text = self.receiver(e);
                    if ty.is_some_and(|t| matches!(t.kind, TypeKind::Reference { .. }) || t.name.contains("string_view")) {
                        text
                    } else {
                        format!("&{text}")
                    }
                }
            };
        }
        if is_ref_local {
            return rust_ident(&e_name(e));
        }
        match e {
            Expr::Name(_) | Expr::Member { .. } | Expr::Index { .. } | Expr::This => {
                let text = self.receiver(e);
                if matches!(e, Expr::This) {
                    return text;
                }
                if referent.is_const {
                    format!("&{text}")
                } else {
                    format!("&mut {text}")
                }
            }
            _ => {
                let text = self.coerce(e, referent);
                if referent.is_const {
                    format!("&{}", atom(&text))
                } else {
                    format!("&mut {}", atom(&text))
                }
            }
        }
    }

    fn string_value(&mut self, e: &Expr, target: &Type) -> String {
        let view = matches!(
            target.kind,
            TypeKind::Container {
                kind: ContainerKind::StringView,
                ..
            }
        );
        match e {
            Expr::Str(s) if view => format!("\"{s}\""),
            Expr::Str(s) => format!("String::from(\"{s}\")"),
            _ => {
                let ty = self.type_of(e);
                let text = self.expr(e);
                let borrowed = ty.as_ref().is_some_and(|t| {
                    matches!(t.kind, TypeKind::Reference { .. } | TypeKind::Pointer { .. })
                        || matches!(
                            t.kind,
                            TypeKind::Container {
                                kind: ContainerKind::StringView,
                                ..
                            }
                        )
                });
                if view {
                    if borrowed {
                        text
                    } else {
                        format!("&{text}")
                    }
                } else if borrowed {
                    format!("{}.to_string()", atom(&text))
                } else if is_place(e) {
                    format!("{}.clone()", atom(&text))
                } else {
                    text
                }
            }
        }
    }

    fn primitive_value(&mut self, e: &Expr, target: &Type) -> String {
        let token = rust_token(&target.name);
        match (e, &target.kind) {
            (Expr::Int(text), TypeKind::Float) => return float_literal(text),
            (Expr::Int(text), TypeKind::Bool) => return (text != "0").to_string(),
            (Expr::Int(_), _) | (Expr::Float(_), TypeKind::Float) | (Expr::Bool(_), _) => {
                return self.expr(e)
            }
            (Expr::Char(c), TypeKind::Integer) => {
                return if token == "u8" {
                    format!("b{c}")
                } else {
                    format!("b{c} as {token}")
                }
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
                _ => text,
            };
        }
        if from.is_primitive() && rust_token(&from.name) != token && !matches!(from.kind, TypeKind::Bool) {
            return format!("{} as {token}", atom(&text));
        }
        text
    }

    /// Zero value of `ty`.
    pub fn default_value(&mut self, ty: &Type) -> String {
        let ty = ty.without_reference();
        match &ty.kind {
            TypeKind::Void => "()".into(),
            TypeKind::Bool => "false".into(),
            TypeKind::Integer => "0".into(),
            TypeKind::Float => "0.0".into(),
            TypeKind::Pointer { ownership, pointee } => match ownership {
                Ownership::Raw if is_string_type(ty) => "\"\"".into(),
                Ownership::Raw if pointee.is_const => "std::ptr::null()".into(),
                Ownership::Raw => "std::ptr::null_mut()".into(),
                Ownership::Unique => format!("Box::new({})", self.default_value(pointee)),
                Ownership::Shared => {
                    self.imports.insert("std::rc::Rc");
                    format!("Rc::new({})", self.default_value(pointee))
                }
                Ownership::Weak => {
                    self.imports.insert("std::rc::Weak");
                    "Weak::new()".into()
                }
            },
            TypeKind::Array { element, len: Some(n) } => {
                format!("[{}; {n}]", self.default_value(element))
            }
            TypeKind::Array { .. } => "Vec::new()".into(),
            TypeKind::Enum => self
                .unit
                .ir
                .enums
                .iter()
                .find(|e| e.name == ty.base_name())
                .and_then(|e| e.variants.first().map(|(v, _)| format!("{}::{}", e.name, to_pascal_case(v))))
                .unwrap_or_else(|| "Default::default()".into()),
            TypeKind::Struct | TypeKind::Class => {
                if self.unit.facts.class(&ty.name).is_some() {
                    self.construct(ty, &[])
                } else {
                    "Default::default()".into()
                }
            }
            TypeKind::Container { kind, args } => match kind {
                ContainerKind::String => "String::new()".into(),
                ContainerKind::StringView => "\"\"".into(),
                ContainerKind::Optional => "None".into(),
                ContainerKind::Pair | ContainerKind::Tuple => {
                    let items: Vec<String> = args.iter().map(|a| self.default_value(a)).collect();
                    format!("({})", items.join(", "))
                }
                _ => {
                    let text = self.rust_type(ty);
                    let head = text.split('<').next().unwrap_or(&text).to_string();
                    format!("{head}::new()")
                }
            },
            TypeKind::Threading { kind, args } => match kind {
                ThreadingKind::Thread | ThreadingKind::JThread => "None".into(),
                ThreadingKind::SharedMutex => {
                    self.imports.insert("std::sync::RwLock");
                    "RwLock::new(())".into()
                }
                k if k.is_mutex() => {
                    self.imports.insert("std::sync::Mutex");
                    "Mutex::new(())".into()
                }
                ThreadingKind::ConditionVariable => {
                    self.imports.insert("std::sync::Condvar");
                    "Condvar::new()".into()
                }
                ThreadingKind::Atomic => {
                    let value = args.first().cloned().unwrap_or_else(|| Type::integer("int"));
                    let atomic = rust_atomic(&value);
                    self.import_atomic(&atomic);
                    let zero = self.default_value(&value);
                    let head = atomic.split('<').next().unwrap_or(&atomic).to_string();
                    format!("{head}::new({zero})")
                }
                _ => "Default::default()".into(),
            },
            _ => "Default::default()".into(),
        }
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
                ContainerKind::Vector => format!("vec![{}]", elems(self, items).join(", ")),
                ContainerKind::Map | ContainerKind::UnorderedMap => {
                    let text = self.rust_type(ty);
                    let head = text.split('<').next().unwrap_or(&text).to_string();
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
                                format!("({k}, {v})")
                            }
                            other => self.expr(other),
                        })
                        .collect();
                    if pairs.is_empty() {
                        format!("{head}::new()")
                    } else {
                        format!("{head}::from([{}])", pairs.join(", "))
                    }
                }
                ContainerKind::Pair | ContainerKind::Tuple => {
                    let parts: Vec<String> = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| match args.get(i) {
                            Some(t) => self.coerce(item, t),
                            None => self.expr(item),
                        })
                        .collect();
                    format!("({})", parts.join(", "))
                }
                ContainerKind::String | ContainerKind::StringView | ContainerKind::Optional => {
                    match items {
                        [single] => self.coerce(single, ty),
                        _ => self.default_value(ty),
                    }
                }
                _ => {
                    let text = self.rust_type(ty);
                    let head = text.split('<').next().unwrap_or(&text).to_string();
                    let values = elems(self, items);
                    if values.is_empty() {
                        format!("{head}::new()")
                    } else {
                        format!("{head}::from([{}])", values.join(", "))
                    }
                }
            },
            TypeKind::Array { element: elem, len } => {
                let values = elems(self, items);
                match (len, values.as_slice()) {
                    (Some(n), []) => format!("[{}; {n}]", self.default_value(elem)),
                    (Some(n), [single]) if n.parse::<usize>().map_or(true, |n| n > 1) => {
                        format!("[{single}; {n}]")
                    }
                    (Some(_), _) => format!("[{}]", values.join(", ")),
                    (None, _) => format!("vec![{}]", values.join(", ")),
                }
            }
            TypeKind::Struct | TypeKind::Class | TypeKind::Threading { .. } => {
                self.construct(ty, items)
            }
            _ => match items {
                [single] => self.coerce(single, ty),
                _ => self.default_value(ty),
            },
        }
    }

    /// `T(args)` for a type `ty`.
    pub fn construct(&mut self, ty: &Type, args: &[Expr]) -> String {
        let ty = ty.without_reference();
        match &ty.kind {
            TypeKind::Struct | TypeKind::Class => self.construct_class(ty, args),
            TypeKind::Container { kind, args: targs } => match (kind, args) {
                (_, []) => self.default_value(ty),
                (ContainerKind::String, [Expr::Str(s)]) => format!("String::from(\"{s}\")"),
                (ContainerKind::String, [n, c]) => {
                    let n = self.index_value(n);
                    let c = self.expr(c);
                    format!("({} as u8 as char).to_string().repeat({n})", atom(&c))
                }
                (ContainerKind::Vector | ContainerKind::Deque, [n]) => {
                    let n = self.index_value(n);
                    let zero = targs.first().map_or("0".to_string(), |t| self.default_value(t));
                    format!("vec![{zero}; {n}]")
                }
                (ContainerKind::Vector, [n, v]) => {
                    let n = self.index_value(n);
                    let v = match targs.first() {
                        Some(t) => self.coerce(v, t),
                        None => self.expr(v),
                    };
                    format!("vec![{v}; {n}]")
                }
                _ => self.list_value(ty, args),
            },
            TypeKind::Threading { kind, args: targs } => match kind {
                ThreadingKind::Thread | ThreadingKind::JThread => match args.split_first() {
                    Some((f, rest)) => self.spawn(f, rest),
                    None => "None".into(),
                },
                ThreadingKind::Atomic => {
                    let value = targs.first().cloned().unwrap_or_else(|| Type::integer("int"));
                    let atomic = rust_atomic(&value);
                    self.import_atomic(&atomic);
                    let init = match args.first() {
                        Some(a) => self.coerce(a, &value),
                        None => self.default_value(&value),
                    };
                    let head = atomic.split('<').next().unwrap_or(&atomic).to_string();
                    format!("{head}::new({init})")
                }
                _ => self.default_value(ty),
            },
            TypeKind::Pointer {
                ownership: Ownership::Unique | Ownership::Shared,
                ..
            } => match args {
                [single] => self.coerce(single, ty),
                _ => self.default_value(ty),
            },
            _ => match args {
                [single] => self.coerce(single, ty),
                _ => self.default_value(ty),
            },
        }
    }

    fn construct_class(&mut self, ty: &Type, args: &[Expr]) -> String {
        let Some(class) = self.unit.facts.class(&ty.name) else {
            let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
            return format!("{}::new({})", rust_path(&ty.name), values.join(", "));
        };
        let name = self.unit.type_name(class);
        let generic_args = match (ty.name.find('<'), class.template.specialization.is_none()) {
            (Some(_), true) => {
                let text = self.rust_type(ty);
                text.find('<').map_or_else(String::new, |i| format!("::{}", &text[i..]))
            }
            _ => String::new(),
        };
        let ctors: Vec<&hybrid_ir::Function> = class.constructors().collect();
        if ctors.is_empty() && !args.is_empty() {
            if self.unit.hierarchy.data_base(&class.name).is_none() {
                let fields: Vec<(String, Type)> = class
                    .instance_fields()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect();
                let mut parts = Vec::new();
                for (i, (field, fty)) in fields.iter().enumerate() {
                    let value = match args.get(i) {
                        Some(a) => self.coerce(a, fty),
                        None => self.default_value(fty),
                    };
                    parts.push(format!("{}: {value}", rust_ident(field)));
                }
                return format!("{name} {{ {} }}", parts.join(", "));
            }
            self.gap(format!("aggregate initialization of `{}`", class.name));
        }
        if ctors.is_empty() {
            return format!("{name}{generic_args}::new()");
        }
        let index = self.unit.select_constructor(class, args.len());
        let ident = self.unit.ctor_ident(class, index);
        let ctor = ctors[index.min(ctors.len() - 1)];
        let values = self.args_for(&ctor.params, args);
        let call = format!("{name}{generic_args}::{ident}({})", values.join(", "));
        let fallible = self.unit.facts.is_fallible(Some(&class.name), ctor);
        self.finish_call(call, fallible, false)
    }

    /// `new T[n]` as a vector.
    pub fn new_array(&mut self, elem: &Type, args: &[Expr]) -> String {
        let zero = self.default_value(elem);
        match args.first() {
            Some(n) => {
                let n = self.index_value(n);
                format!("vec![{zero}; {n}]")
            }
            None => "Vec::new()".into(),
        }
    }
}

/// Result types of standard container and string methods.
fn std_method_type(owner: &Type, method: &str) -> Option<Type> {
    let TypeKind::Container { kind, args } = &owner.kind else {
        return match (owner.threading_kind(), method) {
            (Some(ThreadingKind::Atomic), "load" | "exchange" | "fetch_add" | "fetch_sub") => {
                owner.args().first().cloned()
            }
            _ if owner.async_kind().is_some() && method == "get" => owner.args().first().cloned(),
            _ => None,
        };
    };
    match method {
        "size" | "length" | "count" | "capacity" => Some(Type::integer("size_t")),
        "empty" | "contains" | "has_value" => Some(Type::bool()),
        "substr" | "c_str" => Some(Type::string()),
        "find" | "rfind" if matches!(kind, ContainerKind::String) => Some(Type::integer("size_t")),
        "at" | "front" | "back" | "top" | "value" => match kind {
            ContainerKind::Map | ContainerKind::UnorderedMap => args.get(1).cloned(),
            ContainerKind::String => Some(Type::integer("char")),
            _ => args.first().cloned(),
        },
        _ => None,
    }
}

fn is_literal(e: &Expr) -> bool {
    matches!(e.unparen(), Expr::Int(_) | Expr::Float(_) | Expr::Char(_))
}

fn is_place(e: &Expr) -> bool {
    matches!(e.unparen(), Expr::Name(_) | Expr::Member { .. } | Expr::Index { .. })
}

fn e_name(e: &Expr) -> String {
    match e {
        Expr::Name(n) => n.clone(),
        _ => String::new(),
    }
}

/// Places of non-`Copy` types are cloned when used as values.
fn needs_clone(e: &Expr, target: &Type) -> bool {
    if !is_place(e) {
        return false;
    }
    match &target.kind {
        TypeKind::Container { kind, .. } => !matches!(kind, ContainerKind::StringView),
        TypeKind::Array { len: None, .. } => true,
        TypeKind::Class => true,
        TypeKind::Pointer {
            ownership: Ownership::Shared | Ownership::Weak,
            ..
        } => true,
        _ => false,
    }
}

fn flatten_add<'e>(e: &'e Expr, out: &mut Vec<&'e Expr>) {
    match e.unparen() {
        Expr::Binary {
            op: BinOp::Add,
            lhs,
            rhs,
        } => {
            flatten_add(lhs, out);
            flatten_add(rhs, out);
        }
        other => out.push(other),
    }
}

/// A C++ qualified name as a Rust path: namespaces snake-cased, the last
/// segment kept for types and constants.
pub(super) fn rust_path(name: &str) -> String {
    let name = name.strip_prefix("::").unwrap_or(name);
    let name = name.strip_prefix("std::").unwrap_or(name);
    let segments: Vec<&str> = name.split("::").collect();
    let last = segments.len() - 1;
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let s = s.split('<').next().unwrap_or(s);
            if i < last {
                if s.starts_with(char::is_uppercase) {
                    s.to_string()
                } else {
                    rust_ident(s)
                }
            } else if s.starts_with(char::is_uppercase) {
                if s.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()) {
                    rust_const(s)
                } else {
                    s.to_string()
                }
            } else {
                rust_ident(s)
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_drop_cpp_suffixes() {
        assert_eq!(int_literal("10ULL"), "10");
        assert_eq!(int_literal("1'000'000"), "1_000_000");
        assert_eq!(int_literal("0xFFu"), "0xFF");
        assert_eq!(float_literal("2.5f"), "2.5");
        assert_eq!(float_literal("3."), "3.0");
        assert_eq!(float_literal("1e9"), "1e9");
    }

    #[test]
    fn qualified_names_become_paths() {
        assert_eq!(rust_path("std::chrono::steady_clock"), "chrono::steady_clock");
        assert_eq!(rust_path("Shape::Kind"), "Shape::Kind");
        assert_eq!(rust_path("geometry::MAX_SIDES"), "geometry::MAX_SIDES");
        assert_eq!(rust_path("getValue"), "get_value");
    }

    #[test]
    fn standard_constants() {
        assert_eq!(std_constant("std::string::npos"), Some("usize::MAX"));
        assert_eq!(std_constant("M_PI"), Some("std::f64::consts::PI"));
        assert_eq!(std_constant("counter"), None);
    }
}
