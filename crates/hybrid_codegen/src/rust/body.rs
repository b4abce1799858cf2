//! Statement lowering for Rust bodies.
//!
//! # Architecture
//!
//! - A [`Lowering`] walks one body. It tracks local types, which locals are
//!   written (so only those are `mut`), lock guards in scope, and the
//!   enclosing `try` frames and loops.
//! - A `try` block becomes an immediately called closure returning
//!   `Result`; a `return` inside it is carried out as `Ok(Some(value))`.
//! - Expressions and calls are lowered in the sibling `expr` and `calls`
//!   modules, which extend the same type.

use std::collections::{BTreeMap, BTreeSet};

use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::{atomic_import, rust_atomic};
use hybrid_ir::{
    AsyncKind, ClassDecl, Function, Ownership, ThreadingKind, Type, TypeKind,
};
use hybrid_source::Span;

use super::RustUnit;
use crate::facts::effective_return;
use crate::lower::exceptions::{caught_kinds, needs_dispatch, thrown_kind, UNTYPED_KIND};
use crate::lower::scope::{has_return, infer_type, is_terminating, mutated_names, Locals};
use crate::lower::{parse_body, parse_expression, BinOp, Decl, Expr, Handler, IncDec, Init, Stmt, UnaryOp};
use crate::naming::rust_ident;
pub(super) use crate::typing::{element_type, is_map_type, is_string_type};
pub(super) use crate::writer::{atom, negated};
use crate::writer::CodeWriter;

/// Where a body lives.
#[derive(Clone)]
pub(crate) struct Site<'u> {
    pub class: Option<&'u ClassDecl>,
    pub function: Option<&'u Function>,
    /// The function returns `Result`.
    pub fallible: bool,
    pub is_main: bool,
    pub is_async: bool,
    /// `self`, or `this` inside constructor bodies.
    pub receiver: &'static str,
    /// The value type returned, `Result` aside.
    pub return_type: Option<Type>,
}

impl<'u> Site<'u> {
    /// Code outside any function: static initializers and test scaffolds.
    pub fn detached() -> Self {
        Self {
            class: None,
            function: None,
            fallible: false,
            is_main: false,
            is_async: false,
            receiver: "self",
            return_type: None,
        }
    }

    pub fn function(class: Option<&'u ClassDecl>, f: &'u Function, fallible: bool) -> Self {
        Self {
            class,
            function: Some(f),
            fallible,
            is_main: false,
            is_async: f.is_async(),
            receiver: "self",
            return_type: effective_return(f),
        }
    }
}

/// A lock guard declared in the body.
#[derive(Debug, Clone)]
struct GuardVar {
    /// `(field, binding)` per guarded field it locks; empty when the mutex
    /// guards nothing known.
    bindings: Vec<(String, String)>,
    /// Binding of the whole guard when it holds no fields.
    binding: String,
    /// Lock calls that re-acquire it.
    relock: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct TryFrame {
    depth: usize,
    returns: bool,
}

#[derive(Debug, Clone)]
enum LoopKind {
    Plain,
    /// A `for` lowered to `while`; `continue` runs the step first.
    Step(Expr),
    /// `do ... while`; `continue` checks the condition first.
    DoWhile(Expr),
}

pub(crate) struct Lowering<'u> {
    pub unit: &'u RustUnit<'u>,
    pub site: Site<'u>,
    pub imports: BTreeSet<&'static str>,
    pub(super) locals: Locals,
    pub(super) mutated: BTreeSet<String>,
    /// Guarded field → guard binding in scope.
    pub(super) guards: BTreeMap<String, String>,
    guard_vars: BTreeMap<String, GuardVar>,
    /// Locals holding a bare `JoinHandle`.
    pub(super) handles: BTreeSet<String>,
    /// Names standing for another expression, such as the receiving half
    /// of a promise's channel.
    pub(super) aliases: BTreeMap<String, String>,
    pub(super) caught: Vec<String>,
    tries: Vec<TryFrame>,
    pub(super) closure_depth: usize,
    loops: Vec<LoopKind>,
    jthreads: Vec<Vec<String>>,
    /// The statement being written dereferences a raw pointer.
    pub(super) raw_deref: bool,
    /// The statement being written assigns through a raw pointer.
    pub(super) unsafe_place: bool,
}

impl<'u> Lowering<'u> {
    pub fn new(unit: &'u RustUnit<'u>, site: Site<'u>) -> Self {
        let (locals, mutated) = match site.function {
            Some(f) => (
                Locals::new(&f.params),
                f.body
                    .as_deref()
                    .map(|b| mutated_names(&parse_body(b)))
                    .unwrap_or_default(),
            ),
            None => (Locals::new(&[]), BTreeSet::new()),
        };
        Self {
            unit,
            site,
            imports: BTreeSet::new(),
            locals,
            mutated,
            guards: BTreeMap::new(),
            guard_vars: BTreeMap::new(),
            handles: BTreeSet::new(),
            aliases: BTreeMap::new(),
            caught: Vec::new(),
            tries: Vec::new(),
            closure_depth: 0,
            loops: Vec::new(),
            jthreads: Vec::new(),
            raw_deref: false,
            unsafe_place: false,
        }
    }

    /// Reports a construct with no lowering against the current function.
    pub(super) fn gap(&self, what: impl Into<String>) {
        let span = self.site.function.map_or(Span::DUMMY, |f| f.span);
        self.unit.gap(span, format!("no Rust lowering for {}", what.into()));
    }

    /// Renders a type, recording its imports.
    pub fn rust_type(&mut self, ty: &Type) -> String {
        self.unit.type_text(ty, &mut self.imports)
    }

    pub fn import_atomic(&mut self, atomic: &str) {
        if let Some(path) = atomic_import(atomic) {
            self.imports.insert(path);
        }
        if atomic.starts_with("Mutex<") {
            self.imports.insert("std::sync::Mutex");
        }
    }

    /// The value of a declared initializer, or the type's default.
    pub fn initial_value(&mut self, init: Option<&Expr>, ty: &Type) -> String {
        match init {
            Some(e) => self.coerce(e, ty),
            None => self.default_value(ty),
        }
    }

    /// True where a failure can be handed to the caller with `?` or `Err`.
    pub(super) fn fallible_context(&self) -> bool {
        match self.tries.last() {
            Some(frame) if frame.depth == self.closure_depth => true,
            _ => self.closure_depth == 0 && self.site.fallible,
        }
    }

    /// Body of a function with nothing in it.
    pub fn empty_body(&self) -> String {
        match (&self.site.return_type, self.site.fallible) {
            (None, false) => String::new(),
            (None, true) => " Ok(()) ".to_string(),
            (Some(_), false) => " Default::default() ".to_string(),
            (Some(_), true) => " Ok(Default::default()) ".to_string(),
        }
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// A whole function body. A trailing `return` becomes the tail
    /// expression.
    pub fn function_body(&mut self, stmts: &[Stmt], w: &mut CodeWriter) {
        self.jthreads.push(Vec::new());
        let (last, init) = match stmts.split_last() {
            Some((last, init)) => (Some(last), init),
            None => (None, stmts),
        };
        let tail = match last {
            Some(Stmt::Return(value) | Stmt::CoReturn(value)) if !self.site.is_main => {
                for s in init {
                    self.stmt(s, w);
                }
                Some(value.as_ref())
            }
            _ => {
                for s in stmts {
                    self.stmt(s, w);
                }
                None
            }
        };
        self.join_jthreads(w);
        match tail {
            Some(Some(value)) if self.site.return_type.is_some() => {
                let ty = self.site.return_type.clone();
                let v = match &ty {
                    Some(ty) => self.coerce(value, ty),
                    None => self.expr(value),
                };
                let v = if self.site.fallible { format!("Ok({v})") } else { v };
                self.write_stmt(w, v);
            }
            Some(Some(value)) => {
                let v = self.expr(value);
                self.write_stmt(w, format!("{v};"));
                if self.site.fallible {
                    w.line("Ok(())");
                }
            }
            Some(None) | None => {
                let ends_in_return = matches!(last, Some(Stmt::Return(_) | Stmt::Throw(_)));
                let returns_value = self.site.return_type.is_some() && !self.site.is_main;
                if returns_value {
                    if tail.is_none() && !is_terminating(stmts) {
                        w.line("unreachable!(\"missing return\")");
                    }
                } else if self.site.fallible && (tail.is_some() || !ends_in_return) {
                    w.line("Ok(())");
                }
            }
        }
    }

    /// Statements of a constructor body, written into the enclosing block.
    pub fn statements(&mut self, stmts: &[Stmt], w: &mut CodeWriter) {
        for s in stmts {
            self.stmt(s, w);
        }
    }

    fn block(&mut self, stmts: &[Stmt], w: &mut CodeWriter) {
        let saved_guards = self.guards.clone();
        self.locals.push();
        self.jthreads.push(Vec::new());
        for s in stmts {
            self.stmt(s, w);
        }
        self.join_jthreads(w);
        self.locals.pop();
        self.guards = saved_guards;
    }

    fn join_jthreads(&mut self, w: &mut CodeWriter) {
        for name in self.jthreads.pop().unwrap_or_default().iter().rev() {
            w.line(format!("{}.join().unwrap();", rust_ident(name)));
        }
    }

    /// Writes one statement, wrapping it in `unsafe` when it assigns
    /// through a raw pointer.
    fn write_stmt(&mut self, w: &mut CodeWriter, text: String) {
        if (self.raw_deref || self.unsafe_place) && self.unit.opts.safety_comments {
            w.line("// SAFETY: the pointer comes from the C++ code and is assumed valid.");
        }
        if self.unsafe_place {
            w.line(format!("unsafe {{ {text} }}"));
        } else {
            w.line(text);
        }
        self.raw_deref = false;
        self.unsafe_place = false;
    }

    fn untranslated(&mut self, w: &mut CodeWriter, what: &str, text: &str) {
        self.gap(what.to_string());
        let first = text.lines().next().unwrap_or("").trim();
        if self.unit.opts.preserve_comments && !first.is_empty() {
            w.line(format!("// UNTRANSLATED: {first}"));
        } else {
            w.line(format!("// UNTRANSLATED: {what}"));
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn stmt(&mut self, s: &Stmt, w: &mut CodeWriter) {
        match s {
            Stmt::Decl(d) => self.decl(d, w),
            Stmt::Expr(e) => self.effect(e, w),
            Stmt::Return(value) | Stmt::CoReturn(value) => self.ret(value.as_ref(), w),
            Stmt::If { .. } => self.if_chain(s, w),
            Stmt::While { cond, body } => {
                let head = match cond.unparen() {
                    Expr::Bool(true) => "loop {".to_string(),
                    c => format!("while {} {{", self.condition(c)),
                };
                self.loop_body(head, LoopKind::Plain, body, w);
            }
            Stmt::DoWhile { body, cond } => {
                self.loops.push(LoopKind::DoWhile(cond.clone()));
                w.open("loop {");
                self.block(body, w);
                let c = self.condition(cond);
                w.line(format!("if {} {{", negated(&c)));
                w.indent();
                w.line("break;");
                w.close("}");
                w.close("}");
                self.loops.pop();
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.for_loop(init, cond.as_ref(), step.as_ref(), body, w),
            Stmt::ForRange {
                ty,
                name,
                range,
                body,
            } => self.range_for(ty, name, range, body, w),
            Stmt::Switch { scrutinee, cases } => self.switch(scrutinee, cases, w),
            Stmt::Block(stmts) => {
                w.open("{");
                self.block(stmts, w);
                w.close("}");
            }
            Stmt::Try { body, handlers } => self.try_block(body, handlers, w),
            Stmt::Throw(value) => self.throw(value.as_ref(), w),
            Stmt::CoYield(e) => {
                let text = format!("co_yield {};", self.expr(e));
                self.untranslated(w, "`co_yield`", &text);
            }
            Stmt::Break => w.line("break;"),
            Stmt::Continue => self.continue_stmt(w),
            Stmt::Print {
                to_stderr,
                items,
                newline,
            } => self.print(*to_stderr, items, *newline, w),
            Stmt::Delete(e) => self.delete(e, w),
            Stmt::Unsupported(text) => self.untranslated(w, "a statement", text),
        }
    }

    fn if_chain(&mut self, s: &Stmt, w: &mut CodeWriter) {
        let mut current = s;
        let mut keyword = "if";
        loop {
            let Stmt::If {
                cond,
                then,
                otherwise,
            } = current
            else {
                return;
            };
            let c = self.condition(cond);
            if keyword == "if" {
                w.open(format!("if {c} {{"));
            } else {
                w.close(format!("}} else if {c} {{"));
                w.indent();
            }
            self.block(then, w);
            match otherwise.as_deref() {
                Some([next @ Stmt::If { .. }]) => {
                    current = next;
                    keyword = "else if";
                }
                Some(stmts) => {
                    w.close("} else {");
                    w.indent();
                    self.block(stmts, w);
                    w.close("}");
                    return;
                }
                None => {
                    w.close("}");
                    return;
                }
            }
        }
    }

    fn loop_body(&mut self, head: String, kind: LoopKind, body: &[Stmt], w: &mut CodeWriter) {
        self.loops.push(kind);
        w.open(head);
        self.block(body, w);
        w.close("}");
        self.loops.pop();
    }

    fn continue_stmt(&mut self, w: &mut CodeWriter) {
        match self.loops.last().cloned() {
            Some(LoopKind::Step(step)) => {
                self.effect(&step, w);
                w.line("continue;");
            }
            Some(LoopKind::DoWhile(cond)) => {
                let c = self.condition(&cond);
                w.line(format!("if {} {{", negated(&c)));
                w.indent();
                w.line("break;");
                w.close("}");
                w.line("continue;");
            }
            _ => w.line("continue;"),
        }
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn for_loop(
        &mut self,
        init: &[Stmt],
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &[Stmt],
        w: &mut CodeWriter,
    ) {
        if let Some(range) = self.counting_range(init, cond, step, body) {
            let (name, ty, head) = range;
            self.locals.push();
            self.locals.declare(&name, ty);
            self.loop_body(head, LoopKind::Plain, body, w);
            self.locals.pop();
            return;
        }
        let scoped = !init.is_empty();
        if scoped {
            w.open("{");
            self.locals.push();
            for s in init {
                self.stmt(s, w);
            }
        }
        let head = match cond {
            Some(c) => format!("while {} {{", self.condition(c)),
            None => "loop {".to_string(),
        };
        let kind = step.map_or(LoopKind::Plain, |s| LoopKind::Step(s.clone()));
        self.loops.push(kind);
        w.open(head);
        self.block(body, w);
        if let Some(step) = step {
            self.effect(step, w);
        }
        w.close("}");
        self.loops.pop();
        if scoped {
            self.locals.pop();
            w.close("}");
        }
    }

    /// `for (int i = a; i < b; ++i)` as `for i in a..b`, when the body
    /// leaves `i` alone.
    fn counting_range(
        &mut self,
        init: &[Stmt],
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &[Stmt],
    ) -> Option<(String, Type, String)> {
        let [Stmt::Decl(Decl {
            ty,
            name,
            init: Init::Expr(start),
            ..
        })] = init
        else {
            return None;
        };
        let ty = if ty.base_name() == "auto" {
            self.type_of(start).unwrap_or_else(|| Type::integer("int"))
        } else {
            ty.clone()
        };
        if !matches!(ty.kind, TypeKind::Integer) || mutated_names(body).contains(name) {
            return None;
        }
        let Expr::Binary { op, lhs, rhs } = cond?.unparen() else {
            return None;
        };
        if !matches!(lhs.unparen(), Expr::Name(n) if n == name) {
            return None;
        }
        let upward = match step?.unparen() {
            Expr::Unary {
                op: UnaryOp::PreInc,
                operand,
            }
            | Expr::Postfix {
                op: IncDec::Inc,
                operand,
            } if matches!(operand.unparen(), Expr::Name(n) if n == name) => true,
            Expr::Unary {
                op: UnaryOp::PreDec,
                operand,
            }
            | Expr::Postfix {
                op: IncDec::Dec,
                operand,
            } if matches!(operand.unparen(), Expr::Name(n) if n == name) => false,
            _ => return None,
        };
        let from = self.coerce(start, &ty);
        let bound = self.coerce(rhs, &ty);
        let ident = rust_ident(name);
        let head = match (op, upward) {
            (BinOp::Lt, true) => format!("for {ident} in {}..{} {{", atom(&from), atom(&bound)),
            (BinOp::Le, true) => format!("for {ident} in {}..={} {{", atom(&from), atom(&bound)),
            (BinOp::Gt, false) => format!(
                "for {ident} in (({} + 1)..={}).rev() {{",
                atom(&bound),
                atom(&from)
            ),
            (BinOp::Ge, false) => {
                format!("for {ident} in ({}..={}).rev() {{", atom(&bound), atom(&from))
            }
            _ => return None,
        };
        Some((name.clone(), ty, head))
    }

    fn range_for(&mut self, ty: &Type, name: &str, range: &Expr, body: &[Stmt], w: &mut CodeWriter) {
        let range_ty = self.type_of(range);
        let element = range_ty
            .as_ref()
            .map(|t| t.without_reference())
            .and_then(element_type);
        let declared = if ty.without_reference().base_name() == "auto" {
            element.clone().unwrap_or_else(|| Type::class("auto"))
        } else {
            ty.without_reference().clone()
        };
        let by_ref = matches!(ty.kind, TypeKind::Reference { .. });
        let writes = by_ref && !ty.without_reference().is_const && mutated_names(body).contains(name);

        self.locals.push();
        let is_thread = declared.threading_kind().is_some_and(|k| {
            matches!(k, ThreadingKind::Thread | ThreadingKind::JThread)
        });
        let (pattern, source) = if let Some(names) = name.strip_prefix('[') {
            let names: Vec<String> = names
                .trim_end_matches(']')
                .split(',')
                .map(|n| n.trim().to_string())
                .collect();
            let parts = element
                .as_ref()
                .map(|e| e.args().to_vec())
                .unwrap_or_default();
            for (i, n) in names.iter().enumerate() {
                let part = parts.get(i).cloned().unwrap_or_else(|| Type::class("auto"));
                self.locals.declare(n, Type::reference(part.with_const(!writes), false));
            }
            let idents: Vec<String> = names.iter().map(|n| rust_ident(n)).collect();
            let pattern = format!("({})", idents.join(", "));
            (pattern, self.range_source(range, writes))
        } else if is_thread {
            self.handles.insert(name.to_string());
            self.locals.declare(name, declared.clone());
            let source = format!("{}.drain(..).flatten()", self.receiver(range));
            (rust_ident(name), source)
        } else if declared.is_primitive() && !writes {
            self.locals.declare(name, declared.clone());
            let source = self.range_source(range, false);
            let pattern = if source.starts_with('&') {
                format!("&{}", rust_ident(name))
            } else {
                rust_ident(name)
            };
            (pattern, source)
        } else {
            let source = self.range_source(range, writes);
            if source.starts_with('&') || source.ends_with(".iter_mut()") {
                self.locals
                    .declare(name, Type::reference(declared.clone().with_const(!writes), false));
            } else {
                self.locals.declare(name, declared.clone());
            }
            (rust_ident(name), source)
        };
        self.loop_body(format!("for {pattern} in {source} {{"), LoopKind::Plain, body, w);
        self.locals.pop();
    }

    /// What a range-for iterates: a borrow of a place, the items of a
    /// braced list, or a temporary by value.
    fn range_source(&mut self, range: &Expr, writes: bool) -> String {
        match range.unparen() {
            Expr::List { items, .. } => {
                let items: Vec<String> = items.iter().map(|i| self.expr(i)).collect();
                format!("[{}]", items.join(", "))
            }
            e @ (Expr::Name(_) | Expr::Member { .. } | Expr::Index { .. }) => {
                let is_ref = matches!(
                    self.type_of(e).map(|t| t.kind),
                    Some(TypeKind::Reference { .. })
                );
                let recv = self.receiver(e);
                if writes {
                    format!("{recv}.iter_mut()")
                } else if is_ref && matches!(e, Expr::Name(_)) {
                    format!("{recv}.iter()")
                } else {
                    format!("&{recv}")
                }
            }
            e => self.expr(e),
        }
    }

    fn switch(&mut self, scrutinee: &Expr, cases: &[crate::lower::Case], w: &mut CodeWriter) {
        let chars = cases
            .iter()
            .flat_map(|c| c.labels.iter())
            .any(|l| matches!(l, Expr::Char(_)));
        let s = self.expr(scrutinee);
        let s = if chars { format!("({} as u8)", atom(&s)) } else { s };
        w.open(format!("match {s} {{"));
        let mut has_default = false;
        for case in cases {
            let mut labels: Vec<String> = case
                .labels
                .iter()
                .map(|l| match l {
                    Expr::Char(c) => format!("b{c}"),
                    other => self.expr(other),
                })
                .collect();
            if case.is_default {
                has_default = true;
                labels = vec!["_".to_string()];
            }
            let pattern = labels.join(" | ");
            if case.body.is_empty() {
                w.line(format!("{pattern} => {{}}"));
            } else {
                w.open(format!("{pattern} => {{"));
                self.block(&case.body, w);
                w.close("}");
            }
        }
        if !has_default {
            w.line("_ => {}");
        }
        w.close("}");
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn decl(&mut self, d: &Decl, w: &mut CodeWriter) {
        if d.is_static {
            self.gap(format!("the static local `{}`", d.name));
        }
        let ty = if d.is_auto() {
            infer_type(&d.init)
                .or_else(|| match &d.init {
                    Init::Expr(e) => self.type_of(e),
                    _ => None,
                })
                .unwrap_or_else(|| d.ty.clone())
        } else {
            d.ty.clone()
        };
        let ident = rust_ident(&d.name);
        let binding = if self.mutated.contains(&d.name) {
            format!("mut {ident}")
        } else {
            ident.clone()
        };

        if let Some(kind) = ty.threading_kind() {
            if self.threading_decl(d, kind, &ty, &binding, w) {
                return;
            }
        }
        if let Some(kind) = ty.async_kind() {
            if self.async_decl(d, kind, &ty, w) {
                return;
            }
        }

        // `T* a = new T[n]` holds a vector.
        if let Init::Expr(Expr::New {
            ty: elem,
            args,
            array: true,
        }) = &d.init
        {
            let elem = resolve_type(elem);
            let value = self.new_array(&elem, args);
            self.locals.declare(&d.name, Type::array(elem, None));
            self.write_stmt(w, format!("let {binding} = {value};"));
            return;
        }

        if let TypeKind::Reference { referent, .. } = &ty.kind {
            if let Init::Expr(e) = &d.init {
                let target = if referent.is_const {
                    format!("&{}", self.receiver(e))
                } else {
                    format!("&mut {}", self.receiver(e))
                };
                let shown = if d.is_auto() {
                    self.type_of(e)
                        .map(|t| Type::reference(t.without_reference().clone().with_const(referent.is_const), false))
                        .unwrap_or_else(|| ty.clone())
                } else {
                    ty.clone()
                };
                self.locals.declare(&d.name, shown);
                self.write_stmt(w, format!("let {binding} = {target};"));
                return;
            }
        }

        let value = match &d.init {
            Init::Default => self.default_value(&ty),
            Init::Expr(e) => self.coerce(e, &ty),
            Init::Args(args) => self.construct(&ty, args),
            Init::List(items) => self.list_value(&ty, items),
        };
        let annotate = !d.is_auto()
            && !matches!(
                ty.kind,
                TypeKind::Function { .. } | TypeKind::Class | TypeKind::TemplateParam
            )
            && !(matches!(ty.kind, TypeKind::Struct) && !ty.name.contains('<'));
        let text = if annotate {
            let t = self.rust_type(&ty);
            format!("let {binding}: {t} = {value};")
        } else {
            format!("let {binding} = {value};")
        };
        self.locals.declare(&d.name, ty);
        self.write_stmt(w, text);
    }

    /// Threads, locks, atomics and condition variables declared locally.
    /// Returns false to fall back to a plain declaration.
    fn threading_decl(
        &mut self,
        d: &Decl,
        kind: ThreadingKind,
        ty: &Type,
        binding: &str,
        w: &mut CodeWriter,
    ) -> bool {
        match kind {
            ThreadingKind::LockGuard
            | ThreadingKind::UniqueLock
            | ThreadingKind::SharedLock
            | ThreadingKind::ScopedLock => {
                let mutexes: Vec<Expr> = match &d.init {
                    Init::Args(args) | Init::List(args) => args
                        .iter()
                        .filter(|a| !matches!(a, Expr::Name(n) if n.contains("defer_lock") || n.contains("adopt_lock")))
                        .cloned()
                        .collect(),
                    Init::Expr(e) => vec![e.clone()],
                    Init::Default => Vec::new(),
                };
                let shared = kind == ThreadingKind::SharedLock;
                self.lock(&d.name, &mutexes, shared, w);
                true
            }
            ThreadingKind::Thread | ThreadingKind::JThread => {
                let (Init::Args(args) | Init::List(args)) = &d.init else {
                    if let Init::Expr(e) = &d.init {
                        let value = self.expr(e);
                        self.handles.insert(d.name.clone());
                        self.locals.declare(&d.name, ty.clone());
                        self.write_stmt(w, format!("let {binding} = {value};"));
                        return true;
                    }
                    return false;
                };
                if args.is_empty() {
                    return false;
                }
                let spawn = self.spawn(&args[0], &args[1..]);
                self.handles.insert(d.name.clone());
                self.locals.declare(&d.name, ty.clone());
                if kind == ThreadingKind::JThread {
                    if let Some(frame) = self.jthreads.last_mut() {
                        frame.push(d.name.clone());
                    }
                }
                self.write_stmt(w, format!("let {} = {spawn};", rust_ident(&d.name)));
                true
            }
            _ => false,
        }
    }

    /// `std::promise<T> p;` opens a oneshot channel; the future taken from
    /// it becomes the receiving half.
    fn async_decl(&mut self, d: &Decl, kind: AsyncKind, ty: &Type, w: &mut CodeWriter) -> bool {
        match kind {
            AsyncKind::Promise => {
                let value = ty
                    .args()
                    .first()
                    .map_or("()".to_string(), |t| self.rust_type(t));
                let ident = rust_ident(&d.name);
                self.locals.declare(&d.name, ty.clone());
                self.aliases
                    .insert(format!("{}.get_future", d.name), format!("{ident}_rx"));
                w.line(format!(
                    "let ({ident}, {ident}_rx) = tokio::sync::oneshot::channel::<{value}>();"
                ));
                true
            }
            AsyncKind::Future | AsyncKind::SharedFuture => {
                let Init::Expr(e) = &d.init else {
                    return false;
                };
                let Some((base, "get_future", _)) = e.method_call() else {
                    return false;
                };
                let Expr::Name(promise) = base.unparen() else {
                    return false;
                };
                let Some(rx) = self.aliases.get(&format!("{promise}.get_future")).cloned() else {
                    return false;
                };
                self.locals.declare(&d.name, ty.clone());
                self.aliases.insert(d.name.clone(), rx);
                true
            }
            AsyncKind::CoroutineHandle => false,
        }
    }

    /// Binds guards for the fields `mutexes` protect. A mutex guarding no
    /// known field gets one guard binding named after the lock variable.
    fn lock(&mut self, var: &str, mutexes: &[Expr], shared: bool, w: &mut CodeWriter) {
        let class = self.site.class;
        let mut guard = GuardVar {
            bindings: Vec::new(),
            binding: format!("_{}", rust_ident(var).trim_start_matches('_')),
            relock: Vec::new(),
        };
        for m in mutexes {
            let name = match m.unparen() {
                Expr::Name(n) => n.clone(),
                Expr::Member { base, name, .. } if matches!(base.unparen(), Expr::This) => {
                    name.clone()
                }
                _ => String::new(),
            };
            let info = class.and_then(|c| c.threading.mutexes.iter().find(|i| i.name == name));
            match info {
                Some(info) if !info.guarded_fields.is_empty() => {
                    let method = if shared {
                        "read"
                    } else if info.is_shared {
                        "write"
                    } else {
                        "lock"
                    };
                    for field in &info.guarded_fields {
                        let binding = rust_ident(field);
                        let path = format!("{}.{}", self.site.receiver, binding);
                        let call = format!("{path}.{method}().unwrap()");
                        w.line(format!("let mut {binding} = {call};"));
                        self.guards.insert(field.clone(), binding.clone());
                        guard.bindings.push((field.clone(), binding.clone()));
                        guard.relock.push(format!("{binding} = {call};"));
                    }
                }
                _ => {
                    let path = self.receiver(m);
                    let method = match self.type_of(m).and_then(|t| t.threading_kind()) {
                        Some(ThreadingKind::SharedMutex) if shared => "read",
                        Some(ThreadingKind::SharedMutex) => "write",
                        _ => "lock",
                    };
                    let call = format!("{path}.{method}().unwrap()");
                    w.line(format!("let mut {} = {call};", guard.binding));
                    guard.relock.push(format!("{} = {call};", guard.binding));
                }
            }
        }
        self.guard_vars.insert(var.to_string(), guard);
    }

    fn unlock(&mut self, var: &str, w: &mut CodeWriter) {
        let Some(guard) = self.guard_vars.get(var).cloned() else {
            return;
        };
        if guard.bindings.is_empty() {
            w.line(format!("drop({});", guard.binding));
        }
        for (field, binding) in &guard.bindings {
            w.line(format!("drop({binding});"));
            self.guards.remove(field);
        }
    }

    // ========================================================================
    // Control transfer
    // ========================================================================

    fn ret(&mut self, value: Option<&Expr>, w: &mut CodeWriter) {
        if let Some(frame) = self.tries.last().copied() {
            if frame.depth == self.closure_depth && frame.returns {
                let v = match (value, self.site.return_type.clone()) {
                    (Some(e), Some(ty)) if self.closure_depth == 0 => self.coerce(e, &ty),
                    (Some(e), _) => self.expr(e),
                    (None, _) => "()".to_string(),
                };
                self.write_stmt(w, format!("return Ok(Some({v}));"));
                return;
            }
        }
        if self.closure_depth > 0 {
            let text = match value {
                Some(e) => format!("return {};", self.expr(e)),
                None => "return;".to_string(),
            };
            self.write_stmt(w, text);
            return;
        }
        if self.site.is_main {
            let code = value.map(|e| self.expr(e));
            let done = if self.site.fallible { "return Ok(());" } else { "return;" };
            match code.as_deref() {
                None | Some("0") | Some("EXIT_SUCCESS") => w.line(done),
                Some(code) => self.write_stmt(w, format!("std::process::exit({code});")),
            }
            return;
        }
        let text = match (value, self.site.return_type.clone()) {
            (Some(e), Some(ty)) => {
                let v = self.coerce(e, &ty);
                if self.site.fallible {
                    format!("return Ok({v});")
                } else {
                    format!("return {v};")
                }
            }
            (Some(e), None) => {
                let v = self.expr(e);
                let done = if self.site.fallible { "return Ok(());" } else { "return;" };
                format!("{v};\n{done}")
            }
            (None, _) if self.site.fallible => "return Ok(());".to_string(),
            (None, _) => "return;".to_string(),
        };
        self.write_stmt(w, text);
    }

    fn throw(&mut self, value: Option<&Expr>, w: &mut CodeWriter) {
        let Some(value) = value else {
            let Some(caught) = self.caught.last().cloned() else {
                self.gap("a rethrow outside a handler");
                w.line("panic!(\"rethrown exception\");");
                return;
            };
            if self.fallible_context() {
                w.line(format!("return Err({caught});"));
            } else {
                w.line(format!("panic!(\"{{}}\", {caught});"));
            }
            return;
        };
        let message = self.exception_message(value);
        let kind = value
            .unparen()
            .call_name()
            .filter(|n| n.starts_with("std::") || self.unit.ir.find_class(n).is_some())
            .and_then(thrown_kind);
        let text = if let (Some(kind), true) = (kind, self.fallible_context()) {
            self.unit.exception_type.set(true);
            let text = match &message {
                Message::Literal(s) => format!("\"{s}\""),
                Message::Text(t) => t.clone(),
                Message::Display(t) => format!("format!(\"{{}}\", {t})"),
            };
            format!("return Err(Exception::new(\"{kind}\", {text}).into());")
        } else if self.fallible_context() {
            match &message {
                Message::Literal(s) => format!("return Err(\"{s}\".into());"),
                Message::Text(t) => format!("return Err({t}.into());"),
                Message::Display(t) => format!("return Err(format!(\"{{}}\", {t}).into());"),
            }
        } else {
            match &message {
                Message::Literal(s) => format!("panic!(\"{}\");", escape_braces(s)),
                Message::Text(t) | Message::Display(t) => format!("panic!(\"{{}}\", {t});"),
            }
        };
        self.write_stmt(w, text);
    }

    /// The message an exception object carries: the first constructor
    /// argument of `std::runtime_error("...")` and friends.
    fn exception_message(&mut self, value: &Expr) -> Message {
        let inner = match value.unparen() {
            Expr::Call { args, .. } if args.len() == 1 => &args[0],
            Expr::List { items, .. } if items.len() == 1 => &items[0],
            other => other,
        };
        match inner.unparen() {
            Expr::Str(s) => Message::Literal(s.clone()),
            e => {
                let is_string = self.type_of(e).is_some_and(|t| is_string_type(&t));
                let text = self.expr(e);
                if is_string || text.starts_with("format!(") {
                    Message::Text(text)
                } else {
                    Message::Display(text)
                }
            }
        }
    }

    fn try_block(&mut self, body: &[Stmt], handlers: &[Handler], w: &mut CodeWriter) {
        let returns = has_return(body);
        let value = self
            .site
            .return_type
            .clone()
            .filter(|_| self.closure_depth == 0)
            .map_or("()".to_string(), |t| self.rust_type(&t));
        let ok = if returns {
            format!("Option<{value}>")
        } else {
            "()".to_string()
        };
        w.open(format!(
            "let result = (|| -> Result<{ok}, Box<dyn std::error::Error>> {{"
        ));
        self.tries.push(TryFrame {
            depth: self.closure_depth,
            returns,
        });
        self.block(body, w);
        self.tries.pop();
        w.line(if returns { "Ok(None)" } else { "Ok(())" });
        w.close("})();");

        let Some(first) = handlers.first() else {
            return;
        };
        let dispatch = needs_dispatch(handlers.iter().map(|h| h.ty.as_deref()));
        let rethrows = crate::lower::ast::any_stmt(&first.body, &mut |s| {
            matches!(s, Stmt::Throw(None))
        });
        let binding = match &first.var {
            _ if dispatch => "error".to_string(),
            Some(v) => rust_ident(v),
            None if rethrows => "error".to_string(),
            None => "_".to_string(),
        };
        if returns {
            w.open("match result {");
            let give = if self.site.fallible && self.closure_depth == 0 {
                "return Ok(value)"
            } else {
                "return value"
            };
            w.line(format!("Ok(Some(value)) => {give},"));
            w.line("Ok(None) => {}");
            w.open(format!("Err({binding}) => {{"));
        } else {
            w.open(format!("if let Err({binding}) = result {{"));
        }
        if dispatch {
            self.dispatch_handlers(handlers, w);
        } else {
            self.handler(first, &binding, w);
        }
        w.close("}");
        if returns {
            w.close("}");
        }
    }

    /// Body of one handler with the caught error bound to `binding`.
    fn handler(&mut self, handler: &Handler, binding: &str, w: &mut CodeWriter) {
        self.caught.push(binding.to_string());
        self.locals.push();
        if let Some(v) = &handler.var {
            self.locals.declare(v, Type::class("std::exception"));
        }
        self.block(&handler.body, w);
        self.locals.pop();
        self.caught.pop();
    }

    /// Picks a handler by the kind of the caught `error`. Handlers after
    /// one that catches everything are never reached.
    fn dispatch_handlers(&mut self, handlers: &[Handler], w: &mut CodeWriter) {
        self.unit.exception_type.set(true);
        w.line(format!(
            "let kind = error.downcast_ref::<Exception>().map_or(\"{UNTYPED_KIND}\", |e| e.kind);"
        ));
        w.open("match kind {");
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut catch_all = false;
        for h in handlers {
            let pattern = match caught_kinds(h.ty.as_deref()) {
                Some(kinds) => {
                    let fresh: Vec<String> = kinds
                        .into_iter()
                        .filter(|k| seen.insert(k.clone()))
                        .map(|k| format!("\"{k}\""))
                        .collect();
                    if fresh.is_empty() {
                        continue;
                    }
                    fresh.join(" | ")
                }
                None => {
                    catch_all = true;
                    "_".to_string()
                }
            };
            w.open(format!("{pattern} => {{"));
            let used = h.var.as_ref().is_some_and(|v| {
                crate::lower::scope::mentioned_names(&h.body).contains(v)
            });
            let binding = match &h.var {
                Some(v) if used => {
                    let name = rust_ident(v);
                    w.line(format!("let {name} = error;"));
                    name
                }
                _ => "error".to_string(),
            };
            self.handler(h, &binding, w);
            w.close("}");
            if catch_all {
                break;
            }
        }
        if !catch_all {
            let rethrow = if self.fallible_context() {
                "_ => return Err(error),"
            } else {
                "_ => panic!(\"{}\", error),"
            };
            w.line(rethrow);
        }
        w.close("}");
    }

    // ========================================================================
    // Output and cleanup
    // ========================================================================

    fn print(&mut self, to_stderr: bool, items: &[Expr], newline: bool, w: &mut CodeWriter) {
        let mut format = String::new();
        let mut args = Vec::new();
        for item in items {
            match item.unparen() {
                Expr::Str(s) => format.push_str(&escape_braces(s)),
                Expr::Char(c) => {
                    format.push_str(&escape_braces(c.trim_matches('\'')));
                }
                e => {
                    let is_char = self.type_of(e).is_some_and(|t| {
                        matches!(t.kind, TypeKind::Integer) && t.name == "char"
                    });
                    let text = self.expr(e);
                    format.push_str("{}");
                    if is_char {
                        args.push(format!("{} as u8 as char", atom(&text)));
                    } else {
                        args.push(text);
                    }
                }
            }
        }
        let mac = match (to_stderr, newline) {
            (false, true) => "println!",
            (false, false) => "print!",
            (true, true) => "eprintln!",
            (true, false) => "eprint!",
        };
        let text = if args.is_empty() {
            if format.is_empty() {
                format!("{mac}();")
            } else {
                format!("{mac}(\"{format}\");")
            }
        } else {
            format!("{mac}(\"{format}\", {});", args.join(", "))
        };
        self.write_stmt(w, text);
    }

    fn delete(&mut self, e: &Expr, w: &mut CodeWriter) {
        let ty = self.type_of(e);
        let target = self.expr(e);
        match ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Pointer {
                ownership: Ownership::Raw,
                ..
            }) => {
                if self.unit.opts.safety_comments {
                    w.line("// SAFETY: the pointer was created by `Box::into_raw` and is freed once.");
                }
                w.line(format!("drop(unsafe {{ Box::from_raw({target}) }});"));
            }
            Some(TypeKind::Array { .. }) => w.line(format!("drop({target});")),
            _ => {
                let text = format!("delete {target};");
                self.untranslated(w, "`delete` of a value that is not a pointer", &text);
            }
        }
    }

    // ========================================================================
    // Expression statements
    // ========================================================================

    /// An expression evaluated for its effect.
    pub(super) fn effect(&mut self, e: &Expr, w: &mut CodeWriter) {
        match e.unparen() {
            Expr::Postfix { op, operand } => {
                let delta = if *op == IncDec::Inc { BinOp::Add } else { BinOp::Sub };
                self.compound(operand, delta, &Expr::Int("1".into()), w);
            }
            Expr::Unary {
                op: op @ (UnaryOp::PreInc | UnaryOp::PreDec),
                operand,
            } => {
                let delta = if *op == UnaryOp::PreInc { BinOp::Add } else { BinOp::Sub };
                self.compound(operand, delta, &Expr::Int("1".into()), w);
            }
            Expr::Assign {
                op: Some(op),
                target,
                value,
            } => self.compound(target, *op, value, w),
            Expr::Assign {
                op: None,
                target,
                value,
            } => self.assign(target, value, w),
            Expr::Call { callee, args } => {
                if !self.call_statement(callee, args, w) {
                    let text = self.expr(e);
                    self.write_stmt(w, format!("{text};"));
                }
            }
            Expr::Await(inner) => {
                let text = self.expr(inner);
                let text = if text.ends_with(".await") || !self.site.is_async {
                    text
                } else {
                    format!("{text}.await")
                };
                self.write_stmt(w, format!("{text};"));
            }
            other => {
                let text = self.expr(other);
                self.write_stmt(w, format!("{text};"));
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, w: &mut CodeWriter) {
        let target_ty = self.type_of(target);
        if let Expr::Index { base, index } = target.unparen() {
            if self.type_of(base).is_some_and(|t| is_map_type(t.without_reference())) {
                let map = self.receiver(base);
                let key_ty = self
                    .type_of(base)
                    .and_then(|t| t.without_reference().args().first().cloned());
                let key = match &key_ty {
                    Some(t) => self.coerce(index, t),
                    None => self.expr(index),
                };
                let v = match target_ty.as_ref() {
                    Some(t) => self.coerce(value, t),
                    None => self.expr(value),
                };
                self.write_stmt(w, format!("{map}.insert({key}, {v});"));
                return;
            }
        }
        if let Some(ty) = &target_ty {
            if ty.threading_kind() == Some(ThreadingKind::Atomic) {
                let recv = self.receiver(target);
                let inner = ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                let v = self.coerce(value, &inner);
                self.imports.insert("std::sync::atomic::Ordering");
                self.write_stmt(w, format!("{recv}.store({v}, Ordering::SeqCst);"));
                return;
            }
        }
        let place = self.place(target);
        let v = match &target_ty {
            Some(t) => self.coerce(value, t.without_reference()),
            None => self.expr(value),
        };
        self.write_stmt(w, format!("{place} = {v};"));
    }

    fn compound(&mut self, target: &Expr, op: BinOp, value: &Expr, w: &mut CodeWriter) {
        let target_ty = self.type_of(target).map(|t| t.without_reference().clone());
        if let Some(ty) = &target_ty {
            if ty.threading_kind() == Some(ThreadingKind::Atomic) {
                let recv = self.receiver(target);
                let inner = ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                let v = self.coerce(value, &inner);
                let method = match op {
                    BinOp::Add => "fetch_add",
                    BinOp::Sub => "fetch_sub",
                    BinOp::BitAnd => "fetch_and",
                    BinOp::BitOr => "fetch_or",
                    BinOp::BitXor => "fetch_xor",
                    _ => {
                        self.gap(format!("`{}=` on an atomic", op.symbol()));
                        "fetch_update"
                    }
                };
                self.imports.insert("std::sync::atomic::Ordering");
                self.write_stmt(w, format!("{recv}.{method}({v}, Ordering::SeqCst);"));
                return;
            }
            if is_string_type(ty) && op == BinOp::Add {
                let recv = self.receiver(target);
                let text = match value.unparen() {
                    Expr::Str(s) => format!("{recv}.push_str(\"{s}\");"),
                    Expr::Char(c) => format!("{recv}.push({});", char_literal(c)),
                    v => {
                        let is_char = self
                            .type_of(v)
                            .is_some_and(|t| matches!(t.kind, TypeKind::Integer));
                        let text = self.expr(v);
                        if is_char {
                            format!("{recv}.push({} as u8 as char);", atom(&text))
                        } else {
                            format!("{recv}.push_str(&{});", atom(&text))
                        }
                    }
                };
                self.write_stmt(w, text);
                return;
            }
        }
        let place = self.place(target);
        let v = match &target_ty {
            Some(t) if t.is_primitive() => self.coerce(value, t),
            _ => self.expr(value),
        };
        self.write_stmt(w, format!("{place} {}= {v};", op.symbol()));
    }

    /// Calls whose statement form differs from their expression form:
    /// joins, unlocks, condition waits and promise fulfilment.
    fn call_statement(&mut self, callee: &Expr, args: &[Expr], w: &mut CodeWriter) -> bool {
        let Expr::Member { base, name, .. } = callee.unparen() else {
            return false;
        };
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        let base_name = match base.unparen() {
            Expr::Name(n) => Some(n.clone()),
            _ => None,
        };
        match name.as_str() {
            "unlock" => {
                if let Some(var) = base_name.as_ref().filter(|n| self.guard_vars.contains_key(*n)) {
                    let var = var.clone();
                    self.unlock(&var, w);
                    return true;
                }
                if let Some(var) = base_name.map(|n| format!("{n}#manual")) {
                    if self.guard_vars.contains_key(&var) {
                        self.unlock(&var, w);
                        return true;
                    }
                }
                false
            }
            "lock" => {
                if let Some(var) = base_name.as_ref().filter(|n| self.guard_vars.contains_key(*n)) {
                    let guard = self.guard_vars.get(var).cloned();
                    if let Some(guard) = guard {
                        for line in &guard.relock {
                            w.line(line);
                        }
                        for (field, binding) in guard.bindings {
                            self.guards.insert(field, binding);
                        }
                    }
                    return true;
                }
                if base_ty.as_ref().and_then(Type::threading_kind).is_some_and(|k| k.is_mutex()) {
                    let var = format!("{}#manual", base_name.unwrap_or_default());
                    self.lock(&var, &[base.as_ref().clone()], false, w);
                    return true;
                }
                false
            }
            "join" | "detach"
                if base_ty.as_ref().and_then(Type::threading_kind).is_some_and(|k| {
                    matches!(k, ThreadingKind::Thread | ThreadingKind::JThread)
                }) =>
            {
                let is_handle = base_name.as_ref().is_some_and(|n| self.handles.contains(n));
                let recv = self.receiver(base);
                let text = match (name.as_str(), is_handle) {
                    ("join", true) => format!("{recv}.join().unwrap();"),
                    ("join", false) => format!(
                        "if let Some(handle) = {recv}.take() {{\n    handle.join().unwrap();\n}}"
                    ),
                    (_, true) => format!("drop({recv});"),
                    (_, false) => format!("{recv}.take();"),
                };
                if let Some(frame) = self.jthreads.last_mut() {
                    if let Some(n) = &base_name {
                        frame.retain(|j| j != n);
                    }
                }
                w.line(text);
                true
            }
            "wait" | "wait_for" | "wait_until"
                if base_ty.as_ref().and_then(Type::threading_kind)
                    == Some(ThreadingKind::ConditionVariable) =>
            {
                self.condvar_wait(base, name, args, w);
                true
            }
            "set_value"
                if base_ty.as_ref().and_then(Type::async_kind) == Some(AsyncKind::Promise) =>
            {
                let recv = self.receiver(base);
                let value = match (args.first(), base_ty.as_ref().and_then(|t| t.args().first().cloned())) {
                    (Some(a), Some(t)) => self.coerce(a, &t),
                    (Some(a), None) => self.expr(a),
                    (None, _) => "()".to_string(),
                };
                w.line(format!("let _ = {recv}.send({value});"));
                true
            }
            _ => false,
        }
    }

    /// `cv.wait(lock, pred)` reassigns the guard from `wait_while`.
    fn condvar_wait(&mut self, cv: &Expr, method: &str, args: &[Expr], w: &mut CodeWriter) {
        let recv = self.receiver(cv);
        let Some(Expr::Name(lock)) = args.first().map(Expr::unparen) else {
            self.gap("a condition wait without a lock");
            w.line(format!("// UNTRANSLATED: {recv}.{method}(...)"));
            return;
        };
        let Some(guard) = self.guard_vars.get(lock).cloned() else {
            self.gap("a condition wait on an unknown lock");
            w.line(format!("// UNTRANSLATED: {recv}.{method}({lock}, ...)"));
            return;
        };
        let binding = guard
            .bindings
            .first()
            .map_or(guard.binding.clone(), |(_, b)| b.clone());
        if guard.bindings.len() > 1 {
            self.gap("a condition wait on a lock guarding several fields");
        }
        let (timeout, pred) = match method {
            "wait" => (None, args.get(1)),
            _ => (args.get(1), args.get(2)),
        };
        let predicate = pred.map(|p| {
            let body = match p.unparen() {
                Expr::Lambda(l) => l.single_return().cloned(),
                other => Some(Expr::Call {
                    callee: Box::new(other.clone()),
                    args: Vec::new(),
                }),
            };
            body.map_or_else(|| "true".to_string(), |b| self.condition(&b))
        });
        let param = if guard.bindings.is_empty() { "_" } else { binding.as_str() };
        let text = match (timeout, predicate) {
            (None, None) => format!("{binding} = {recv}.wait({binding}).unwrap();"),
            (None, Some(p)) => format!(
                "{binding} = {recv}.wait_while({binding}, |{param}| {}).unwrap();",
                negated(&p)
            ),
            (Some(t), None) => {
                let t = self.expr(t);
                format!("{binding} = {recv}.wait_timeout({binding}, {t}).unwrap().0;")
            }
            (Some(t), Some(p)) => {
                let t = self.expr(t);
                format!(
                    "{binding} = {recv}.wait_timeout_while({binding}, {t}, |{param}| {}).unwrap().0;",
                    negated(&p)
                )
            }
        };
        w.line(text);
    }

    /// Lowers a nested statement list into text, for closures.
    pub(super) fn closure_body(&mut self, stmts: &[Stmt]) -> String {
        let mut w = CodeWriter::spaces();
        let saved_loops = std::mem::take(&mut self.loops);
        self.closure_depth += 1;
        self.block(stmts, &mut w);
        self.closure_depth -= 1;
        self.loops = saved_loops;
        w.finish().trim_end().to_string()
    }

    /// Field initializers of a constructor: the member-initializer list,
    /// then declared defaults, then type defaults.
    pub fn field_inits(&mut self, class: &ClassDecl, ctor: Option<&Function>) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(base) = self.unit.hierarchy.data_base(&class.name) {
            let base_name = base.name.clone();
            let init = ctor.and_then(|c| {
                c.initializers
                    .iter()
                    .find(|i| crate::naming::simple_name(&i.member) == base_name)
            });
            let value = match init {
                Some(init) => {
                    let args = init_args(&init.value);
                    self.construct(&Type::class(init.member.clone()), &args)
                }
                None => self.default_value(&Type::class(base_name)),
            };
            lines.push(format!("base: {value},"));
        }
        for field in class.instance_fields() {
            if super::RustUnit::omitted_mutex(class, field) {
                continue;
            }
            let ident = rust_ident(&field.name);
            let init = ctor.and_then(|c| c.initializers.iter().find(|i| i.member == field.name));
            let mut value = match init {
                Some(init) => {
                    let args = init_args(&init.value);
                    match args.as_slice() {
                        [single] if !matches!(single, Expr::List { .. }) || field.ty.is_primitive() => {
                            self.coerce(single, &field.ty)
                        }
                        _ => self.construct(&field.ty, &args),
                    }
                }
                None => match field.initializer.as_deref().and_then(parse_expression) {
                    Some(e) => self.coerce(&e, &field.ty),
                    None => self.default_value(&field.ty),
                },
            };
            if let Some(ThreadingKind::Atomic) = field.ty.threading_kind() {
                if !value.contains("::new(") {
                    let value_ty = field.ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                    let atomic = rust_atomic(&value_ty);
                    self.import_atomic(&atomic);
                    let head = atomic.split('<').next().unwrap_or(&atomic).to_string();
                    value = format!("{head}::new({value})");
                }
            }
            if let Some(guard) = class.threading.guard_of(&field.name) {
                let lock = if guard.is_shared { "RwLock" } else { "Mutex" };
                value = format!("{lock}::new({value})");
            }
            if value == ident {
                lines.push(format!("{ident},"));
            } else {
                lines.push(format!("{ident}: {value},"));
            }
        }
        lines
    }
}

/// The arguments of a member initializer's value text.
fn init_args(value: &str) -> Vec<Expr> {
    match parse_expression(&format!("__init({value})")) {
        Some(Expr::Call { args, .. }) => args,
        _ => parse_expression(value).into_iter().collect(),
    }
}

enum Message {
    /// String literal content.
    Literal(String),
    /// An expression already of string type.
    Text(String),
    /// Any other value, shown with `Display`.
    Display(String),
}

/// `'a'` → `'a'` as a Rust `char`.
pub(super) fn char_literal(text: &str) -> String {
    text.to_string()
}

/// Doubles braces so text can sit inside a format string.
pub(super) fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_strings_escape_braces() {
        assert_eq!(escape_braces("{x}"), "{{x}}");
    }

    #[test]
    fn coroutine_tasks_unwrap_to_their_result() {
        let mut f = Function::new("compute", Type::class("Task<int>"));
        f.async_info.coroutine.operations.push(hybrid_ir::AsyncOperation {
            kind: hybrid_ir::AsyncOpKind::Return,
            expression: "1".into(),
        });
        assert_eq!(effective_return(&f).map(|t| t.name), Some("int".to_string()));
        let plain = Function::new("run", Type::void());
        assert!(effective_return(&plain).is_none());
    }
}
