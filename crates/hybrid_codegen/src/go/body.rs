//! Statement lowering for Go bodies.
//!
//! # Architecture
//!
//! - A [`GoLowering`] walks one body. Calls that can fail are hoisted
//!   ahead of the statement using them as `v1, err := f()`, followed by
//!   the error check that fits the enclosing scope.
//! - Lock releases live on a stack of frames. Function-level frames
//!   release with `defer`; inner blocks release at their end and before
//!   any jump out of them.
//! - A `try` block becomes a closure with a deferred `recover`. A
//!   `return` inside it reports `done` so the caller can return too.
//! - A coroutine runs its body in a goroutine feeding the channel the
//!   function returns.
//! - Expressions and calls are lowered in the sibling `expr` and `calls`
//!   modules, which extend the same type.

use std::collections::{BTreeMap, BTreeSet};

use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::go_atomic;
use hybrid_ir::{AsyncKind, ClassDecl, Function, ThreadingKind, Type, TypeKind};

use super::{needs_make, GoUnit};
use crate::facts::effective_return;
use crate::lower::exceptions::{caught_kinds, needs_dispatch, thrown_kind, UNTYPED_KIND};
use crate::lower::scope::{has_return, infer_type, is_terminating, Locals};
use crate::lower::{parse_body, parse_expression, BinOp, Case, Decl, Expr, Handler, IncDec, Init, Stmt, UnaryOp};
use crate::naming::{go_local, go_member};
pub(super) use crate::typing::{
    element_type, is_map_type, is_set_type, is_string_type, is_thread_collection, pointee,
};
pub(super) use crate::writer::{atom, negated};
use crate::writer::CodeWriter;

/// Where a body lives.
#[derive(Clone)]
pub(crate) struct GoSite<'u> {
    pub class: Option<&'u ClassDecl>,
    pub function: Option<&'u Function>,
    /// The function returns a trailing `error`.
    pub fallible: bool,
    pub is_constructor: bool,
    pub is_main: bool,
    /// Receiver of methods; the new value inside constructors.
    pub receiver: String,
    /// The value type returned, `error` aside.
    pub return_type: Option<Type>,
    /// Element type of the channel a coroutine hands back.
    pub channel: Option<Type>,
    /// Template parameters written as `any`.
    pub anys: BTreeSet<String>,
}

impl<'u> GoSite<'u> {
    /// Code outside any function: package initializers and test scaffolds.
    pub fn detached() -> Self {
        Self {
            class: None,
            function: None,
            fallible: false,
            is_constructor: false,
            is_main: false,
            receiver: String::new(),
            return_type: None,
            channel: None,
            anys: BTreeSet::new(),
        }
    }

    pub fn function(
        class: Option<&'u ClassDecl>,
        f: &'u Function,
        fallible: bool,
        receiver: String,
    ) -> Self {
        let coroutine = f.is_async();
        let return_type = effective_return(f);
        Self {
            class,
            function: Some(f),
            fallible: fallible && !coroutine,
            is_constructor: false,
            is_main: false,
            receiver,
            channel: coroutine.then(|| return_type.clone().unwrap_or_else(Type::void)),
            return_type,
            anys: BTreeSet::new(),
        }
    }
}

/// A block of statements and the releases owed when leaving it.
#[derive(Debug, Default)]
struct Frame {
    /// Releases are written as `defer` when taken.
    deferred: bool,
    /// The body of a loop; `break` and `continue` stop here.
    breakable: bool,
    releases: Vec<String>,
}

#[derive(Debug, Clone)]
pub(super) struct TryFrame {
    /// The protected body contains a `return`.
    returns: bool,
    /// Value type that `return` carries out.
    value: Option<Type>,
}

/// A function-like scope nested in the body.
#[derive(Debug, Clone)]
pub(super) enum FnScope {
    Try(TryFrame),
    /// A func literal returning the given type.
    Lambda(Option<Type>),
    /// The body of a `go` statement.
    Goroutine,
    /// The goroutine feeding a coroutine's channel.
    Coroutine,
}

#[derive(Debug, Clone)]
enum LoopKind {
    Plain,
    /// A `for` whose step runs at the end of the body; `continue` runs it
    /// first.
    Step(Expr),
    /// `do ... while`; `continue` checks the condition first.
    DoWhile(Expr),
}

/// A lock guard declared in the body.
#[derive(Debug, Clone, Default)]
struct GuardVar {
    unlock: Vec<String>,
    lock: Vec<String>,
}

/// Work that must be written before the statement using its result.
#[derive(Debug, Clone)]
enum Pending {
    Line(String),
    /// A call returning an `error`; `temp` receives its value.
    Call {
        temp: Option<String>,
        call: String,
    },
}

/// Initializers of a constructor's composite literal, plus the statements
/// that must follow it.
#[derive(Debug, Default)]
pub(crate) struct FieldInits {
    pub fields: Vec<(String, String)>,
    pub post: Vec<String>,
}

pub(crate) struct GoLowering<'u> {
    pub unit: &'u GoUnit<'u>,
    pub site: GoSite<'u>,
    pub imports: BTreeSet<&'static str>,
    pub helpers: BTreeSet<&'static str>,
    pub(super) locals: Locals,
    /// Names whose value is read somewhere in the body.
    read: BTreeSet<String>,
    /// Names in use, avoided by temporaries.
    taken: BTreeSet<String>,
    /// Lock guards the body unlocks or relocks by hand.
    manual_locks: BTreeSet<String>,
    guard_vars: BTreeMap<String, GuardVar>,
    /// Locals and fields standing for a `sync.WaitGroup`.
    pub(super) wait_groups: BTreeSet<String>,
    /// Names standing for another expression, such as `p.get_future`.
    pub(super) aliases: BTreeMap<String, String>,
    /// Error variables of the enclosing handlers, innermost last.
    pub(super) caught: Vec<String>,
    scopes: Vec<FnScope>,
    frames: Vec<Frame>,
    loops: Vec<LoopKind>,
    pending: Vec<Pending>,
    temps: usize,
    /// Channel a coroutine body sends to.
    channel: String,
    /// Expected type of the lambda being lowered.
    pub(super) lambda_hint: Option<Type>,
    /// The whole body, for lookups ahead of the statement being written.
    body: Vec<Stmt>,
}

impl<'u> GoLowering<'u> {
    pub fn new(unit: &'u GoUnit<'u>, site: GoSite<'u>) -> Self {
        let (locals, body) = match site.function {
            Some(f) => (
                Locals::new(&f.params),
                f.body.as_deref().map(parse_body).unwrap_or_default(),
            ),
            None => (Locals::new(&[]), Vec::new()),
        };
        let read = read_names(&body);
        let mut taken = crate::lower::scope::mentioned_names(&body);
        if let Some(f) = site.function {
            taken.extend(f.params.iter().map(|p| go_local(&p.name)));
        }
        if !site.receiver.is_empty() {
            taken.insert(site.receiver.clone());
        }
        let manual_locks = manual_lock_names(&body);
        Self {
            unit,
            site,
            imports: BTreeSet::new(),
            helpers: BTreeSet::new(),
            locals,
            read,
            taken,
            manual_locks,
            guard_vars: BTreeMap::new(),
            wait_groups: BTreeSet::new(),
            aliases: BTreeMap::new(),
            caught: Vec::new(),
            scopes: Vec::new(),
            frames: Vec::new(),
            loops: Vec::new(),
            pending: Vec::new(),
            temps: 0,
            channel: String::new(),
            lambda_hint: None,
            body,
        }
    }

    pub(super) fn gap(&self, what: impl Into<String>) {
        let span = self.site.function.map(|f| f.span).unwrap_or_default();
        self.unit.gap(span, what.into());
    }

    /// Renders `ty` with the imports it needs.
    pub fn go_type(&mut self, ty: &Type) -> String {
        let text = self.unit.type_text(ty, &mut self.imports);
        super::erase_params(&text, &self.site.anys)
    }

    /// A package-level initializer for a value of type `ty`.
    pub fn initial_value(&mut self, init: Option<&Expr>, ty: &Type) -> String {
        match init {
            Some(e) => self.coerce(e, ty),
            None => self.default_value(ty),
        }
    }

    /// A fresh local name starting with `stem`.
    pub(super) fn temp(&mut self, stem: &str) -> String {
        loop {
            self.temps += 1;
            let name = format!("{stem}{}", self.temps);
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// `stem` itself when free, else a numbered variant.
    fn fresh(&mut self, stem: &str) -> String {
        if self.taken.insert(stem.to_string()) {
            stem.to_string()
        } else {
            self.temp(stem)
        }
    }

    /// The line for a function that has no statements.
    pub fn empty_body(&mut self) -> Option<String> {
        if self.site.is_main || self.site.is_constructor {
            return None;
        }
        match self.site.return_type.clone() {
            Some(ty) if !ty.is_void() => {
                let zero = self.zero_of(&ty);
                let nil = if self.site.fallible { ", nil" } else { "" };
                Some(format!("return {zero}{nil}"))
            }
            _ if self.site.fallible => Some("return nil".to_string()),
            _ => None,
        }
    }

    fn zero_of(&mut self, ty: &Type) -> String {
        let text = self.go_type(ty);
        self.zero_value(&text)
    }

    // ========================================================================
    // Hoisted calls
    // ========================================================================

    /// Queues a call returning an `error` and yields the name holding its
    /// value, or nothing for calls without one.
    pub(super) fn hoist(&mut self, call: String, has_value: bool) -> String {
        let temp = has_value.then(|| self.temp("v"));
        let text = temp.clone().unwrap_or_default();
        self.pending.push(Pending::Call { temp, call });
        text
    }

    /// Queues a statement to run before the current one.
    pub(super) fn before(&mut self, line: impl Into<String>) {
        self.pending.push(Pending::Line(line.into()));
    }

    /// Runs `lower` and keeps its text only if it queued nothing.
    pub(super) fn inline(&mut self, lower: impl FnOnce(&mut Self) -> String) -> Option<String> {
        let pending = std::mem::take(&mut self.pending);
        let text = lower(self);
        let queued = !self.pending.is_empty();
        self.pending = pending;
        (!queued).then_some(text)
    }

    /// Takes back the last hoisted call if it produced `text`, so the
    /// caller can use the call in place.
    fn take_call(&mut self, text: &str) -> Option<(String, bool)> {
        match self.pending.last() {
            Some(Pending::Call { temp, .. }) if temp.as_deref().unwrap_or("") == text => {}
            _ => return None,
        }
        match self.pending.pop() {
            Some(Pending::Call { temp, call }) => Some((call, temp.is_some())),
            _ => None,
        }
    }

    /// Writes queued work.
    pub fn flush_into(&mut self, w: &mut CodeWriter) {
        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            match p {
                Pending::Line(line) => w.line(line),
                Pending::Call {
                    temp: Some(temp),
                    call,
                } => {
                    w.line(format!("{temp}, err := {call}"));
                    w.open("if err != nil {");
                    let check = self.propagate("err");
                    w.line(check);
                    w.close("}");
                }
                Pending::Call { temp: None, call } => {
                    w.open(format!("if err := {call}; err != nil {{"));
                    let check = self.propagate("err");
                    w.line(check);
                    w.close("}");
                }
            }
        }
    }

    /// What hands `err` to the caller from the current scope.
    fn propagate(&mut self, err: &str) -> String {
        let mut lines = self.releases(false);
        match self.scopes.last().cloned() {
            Some(FnScope::Try(frame)) => {
                let value = frame.value.clone();
                lines.push(match (frame.returns, value) {
                    (false, _) => format!("return {err}"),
                    (true, None) => format!("return false, {err}"),
                    (true, Some(ty)) => {
                        let zero = self.zero_of(&ty);
                        format!("return false, {zero}, {err}")
                    }
                });
            }
            Some(_) => {
                lines.clear();
                lines.push(format!("panic({err})"));
            }
            None if self.site.fallible => {
                lines.push(if self.site.is_constructor {
                    format!("return nil, {err}")
                } else {
                    match self.site.return_type.clone() {
                        Some(ty) if !ty.is_void() => {
                            let zero = self.zero_of(&ty);
                            format!("return {zero}, {err}")
                        }
                        _ => format!("return {err}"),
                    }
                });
            }
            None => {
                lines.clear();
                lines.push(format!("panic({err})"));
            }
        }
        lines.join("\n")
    }

    /// Releases owed when leaving toward the function, or toward the
    /// innermost loop with `stop_at_loop`.
    fn releases(&self, stop_at_loop: bool) -> Vec<String> {
        let mut lines = Vec::new();
        for frame in self.frames.iter().rev() {
            if frame.deferred {
                break;
            }
            lines.extend(frame.releases.iter().rev().cloned());
            if stop_at_loop && frame.breakable {
                break;
            }
        }
        lines
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    /// Writes a whole function body.
    pub fn function_body(&mut self, stmts: &[Stmt], w: &mut CodeWriter) {
        if let Some(elem) = self.site.channel.clone() {
            self.coroutine_body(stmts, &elem, w);
            return;
        }
        self.frames.push(Frame {
            deferred: true,
            ..Frame::default()
        });
        let stmts = match (self.site.is_main, stmts.last()) {
            (true, Some(Stmt::Return(v))) if v.as_ref().map_or(true, is_zero) => {
                &stmts[..stmts.len() - 1]
            }
            _ => stmts,
        };
        for s in stmts {
            self.stmt(s, w);
        }
        self.frames.pop();
        if is_terminating(stmts) || self.site.is_main || self.site.is_constructor {
            return;
        }
        let returns_value = self.site.return_type.as_ref().is_some_and(|t| !t.is_void());
        if returns_value {
            w.line("panic(\"unreachable: missing return\")");
        } else if self.site.fallible {
            w.line("return nil");
        }
    }

    fn coroutine_body(&mut self, stmts: &[Stmt], elem: &Type, w: &mut CodeWriter) {
        let generator = self
            .site
            .function
            .is_some_and(|f| f.async_info.coroutine.is_generator());
        let elem_text = if elem.is_void() {
            "struct{}".to_string()
        } else {
            self.go_type(elem)
        };
        let ch = self.fresh("ch");
        self.channel = ch.clone();
        if generator {
            w.line(format!("{ch} := make(chan {elem_text})"));
        } else {
            w.line(format!("{ch} := make(chan {elem_text}, 1)"));
        }
        w.open("go func() {");
        w.line(format!("defer close({ch})"));
        self.scopes.push(FnScope::Coroutine);
        self.frames.push(Frame {
            deferred: true,
            ..Frame::default()
        });
        for s in stmts {
            self.stmt(s, w);
        }
        self.frames.pop();
        self.scopes.pop();
        w.close("}()");
        w.line(format!("return {ch}"));
    }

    /// Writes statements at the current level, as constructors do after
    /// building their value.
    pub fn statements(&mut self, stmts: &[Stmt], w: &mut CodeWriter) {
        let outer = self.frames.is_empty();
        if outer {
            self.frames.push(Frame {
                deferred: true,
                ..Frame::default()
            });
        }
        for s in stmts {
            self.stmt(s, w);
        }
        if outer {
            self.frames.pop();
        }
    }

    fn block(&mut self, stmts: &[Stmt], breakable: bool, w: &mut CodeWriter) {
        self.locals.push();
        self.frames.push(Frame {
            breakable,
            ..Frame::default()
        });
        for s in stmts {
            self.stmt(s, w);
        }
        if let Some(frame) = self.frames.pop() {
            if !stmts.last().is_some_and(is_jump) {
                for line in frame.releases.iter().rev() {
                    w.line(line);
                }
            }
        }
        self.locals.pop();
    }

    /// Registers `release` to run when the current block ends.
    fn on_exit(&mut self, release: String, w: &mut CodeWriter) {
        match self.frames.last_mut() {
            Some(frame) if frame.deferred => w.line(format!("defer {release}")),
            Some(frame) => frame.releases.push(release),
            None => w.line(format!("defer {release}")),
        }
    }

    /// Lowers `stmts` as the body of a func literal.
    pub(super) fn closure_body(&mut self, stmts: &[Stmt], scope: FnScope) -> String {
        let pending = std::mem::take(&mut self.pending);
        let loops = std::mem::take(&mut self.loops);
        self.scopes.push(scope);
        self.frames.push(Frame {
            deferred: true,
            ..Frame::default()
        });
        self.locals.push();
        let mut w = CodeWriter::tabs();
        for s in stmts {
            self.stmt(s, &mut w);
        }
        self.locals.pop();
        self.frames.pop();
        self.scopes.pop();
        self.loops = loops;
        self.pending = pending;
        let text = w.finish();
        text.trim_end().to_string()
    }

    fn untranslated(&mut self, w: &mut CodeWriter, what: &str, text: &str) {
        self.gap(format!("the {what} `{}`", text.trim()));
        w.line(format!("// UNTRANSLATED: {}", text.trim().replace('\n', " ")));
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn stmt(&mut self, s: &Stmt, w: &mut CodeWriter) {
        match s {
            Stmt::Decl(d) => self.decl(d, w),
            Stmt::Expr(e) => self.effect(e, w),
            Stmt::Return(value) => self.ret(value.as_ref(), w),
            Stmt::If { .. } => self.if_chain(s, w),
            Stmt::While { cond, body } => self.while_loop(cond, body, w),
            Stmt::DoWhile { body, cond } => {
                w.open("for {");
                self.loops.push(LoopKind::DoWhile(cond.clone()));
                self.block(body, true, w);
                self.loops.pop();
                let c = self.condition(cond);
                self.flush_into(w);
                w.open(format!("if {} {{", negated(&c)));
                w.line("break");
                w.close("}");
                w.close("}");
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
                self.block(stmts, false, w);
                w.close("}");
            }
            Stmt::Try { body, handlers } => self.try_block(body, handlers, w),
            Stmt::Throw(value) => self.throw(value.as_ref(), w),
            Stmt::CoReturn(value) => self.co_return(value.as_ref(), w),
            Stmt::CoYield(value) => {
                let v = match self.site.channel.clone() {
                    Some(elem) if !elem.is_void() => self.coerce(value, &elem),
                    _ => self.expr(value),
                };
                self.flush_into(w);
                w.line(format!("{} <- {v}", self.channel));
            }
            Stmt::Break => {
                for line in self.releases(true) {
                    w.line(line);
                }
                w.line("break");
            }
            Stmt::Continue => self.continue_stmt(w),
            Stmt::Print {
                to_stderr,
                items,
                newline,
            } => self.print(*to_stderr, items, *newline, w),
            Stmt::Delete(e) => {
                let place = self.place(e);
                self.flush_into(w);
                w.line(format!("{place} = nil"));
            }
            Stmt::Unsupported(text) => self.untranslated(w, "statement", text),
        }
    }

    fn if_chain(&mut self, s: &Stmt, w: &mut CodeWriter) {
        let Stmt::If {
            cond,
            then,
            otherwise,
        } = s
        else {
            return;
        };
        let c = self.condition(cond);
        self.flush_into(w);
        w.open(format!("if {c} {{"));
        self.block(then, false, w);
        let mut rest = otherwise.as_deref();
        while let Some(branch) = rest {
            match branch {
                [Stmt::If {
                    cond,
                    then,
                    otherwise,
                }] => {
                    let c = self.condition(cond);
                    if self.pending.is_empty() {
                        w.dedent();
                        w.open(format!("}} else if {c} {{"));
                        self.block(then, false, w);
                        rest = otherwise.as_deref();
                    } else {
                        w.dedent();
                        w.open("} else {");
                        self.flush_into(w);
                        w.open(format!("if {c} {{"));
                        self.block(then, false, w);
                        if let Some(o) = otherwise {
                            w.dedent();
                            w.open("} else {");
                            self.block(o, false, w);
                        }
                        w.close("}");
                        rest = None;
                    }
                }
                stmts => {
                    w.dedent();
                    w.open("} else {");
                    self.block(stmts, false, w);
                    rest = None;
                }
            }
        }
        w.close("}");
    }

    fn while_loop(&mut self, cond: &Expr, body: &[Stmt], w: &mut CodeWriter) {
        let c = self.condition(cond);
        self.loops.push(LoopKind::Plain);
        if self.pending.is_empty() {
            if c == "true" {
                w.open("for {");
            } else {
                w.open(format!("for {c} {{"));
            }
        } else {
            w.open("for {");
            self.flush_into(w);
            w.open(format!("if {} {{", negated(&c)));
            w.line("break");
            w.close("}");
        }
        self.block(body, true, w);
        w.close("}");
        self.loops.pop();
    }

    fn continue_stmt(&mut self, w: &mut CodeWriter) {
        for line in self.releases(true) {
            w.line(line);
        }
        match self.loops.last().cloned() {
            Some(LoopKind::Step(step)) => {
                self.effect(&step, w);
            }
            Some(LoopKind::DoWhile(cond)) => {
                let c = self.condition(&cond);
                self.flush_into(w);
                w.open(format!("if {} {{", negated(&c)));
                w.line("break");
                w.close("}");
            }
            _ => {}
        }
        w.line("continue");
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
        self.locals.push();
        let header = self.for_header(init, cond, step);
        match header {
            Some(header) => {
                w.open(format!("for {header} {{"));
                self.loops.push(LoopKind::Plain);
                self.block(body, true, w);
                self.loops.pop();
                w.close("}");
            }
            None => {
                w.open("{");
                for s in init {
                    self.stmt(s, w);
                }
                let c = cond.map(|c| self.condition(c));
                let head = match c {
                    Some(c) if self.pending.is_empty() => format!("for {c} {{"),
                    Some(c) => {
                        w.open("for {");
                        self.flush_into(w);
                        w.open(format!("if {} {{", negated(&c)));
                        w.line("break");
                        w.close("}");
                        w.dedent();
                        String::new()
                    }
                    None => "for {".to_string(),
                };
                if !head.is_empty() {
                    w.open(head);
                } else {
                    w.indent();
                }
                let kind = step.map_or(LoopKind::Plain, |s| LoopKind::Step(s.clone()));
                self.loops.push(kind);
                self.block(body, true, w);
                self.loops.pop();
                if let Some(step) = step {
                    if !body.last().is_some_and(is_jump) {
                        self.effect(step, w);
                    }
                }
                w.close("}");
                w.close("}");
            }
        }
        self.locals.pop();
    }

    /// `i := 0; i < n; i++` when the loop fits a one-line header.
    fn for_header(&mut self, init: &[Stmt], cond: Option<&Expr>, step: Option<&Expr>) -> Option<String> {
        let init_text = match init {
            [] => String::new(),
            [Stmt::Decl(d)] => {
                let Init::Expr(e) = &d.init else {
                    return None;
                };
                let counting = matches!(e.unparen(), Expr::Int(_))
                    && matches!(d.ty.kind, TypeKind::Integer | TypeKind::Class);
                let ty = if counting {
                    Type::integer("ptrdiff_t")
                } else if d.is_auto() {
                    self.type_of(e).or_else(|| infer_type(&d.init))?
                } else {
                    d.ty.clone()
                };
                let v = self.coerce(e, &ty);
                if !self.pending.is_empty() {
                    self.pending.clear();
                    return None;
                }
                self.locals.declare(&d.name, ty);
                format!("{} := {v}", go_local(&d.name))
            }
            [Stmt::Expr(e @ Expr::Assign { op: None, .. })] => self.simple_effect(e)?,
            _ => return None,
        };
        let cond_text = match cond {
            Some(c) => {
                let text = self.condition(c);
                if !self.pending.is_empty() {
                    self.pending.clear();
                    return None;
                }
                text
            }
            None => String::new(),
        };
        let step_text = match step {
            Some(s) => self.simple_effect(s)?,
            None => String::new(),
        };
        if init_text.is_empty() && step_text.is_empty() {
            return Some(cond_text);
        }
        Some(format!("{init_text}; {cond_text}; {step_text}"))
    }

    /// A one-line statement for `i++`, `i += 2` or `i = j`, when lowering
    /// needs nothing hoisted.
    fn simple_effect(&mut self, e: &Expr) -> Option<String> {
        let mut w = CodeWriter::tabs();
        let before = self.pending.len();
        self.effect(e, &mut w);
        if self.pending.len() != before {
            self.pending.truncate(before);
            return None;
        }
        let text = w.finish();
        let text = text.trim_end();
        (!text.is_empty() && !text.contains('\n')).then(|| text.to_string())
    }

    fn range_for(&mut self, ty: &Type, name: &str, range: &Expr, body: &[Stmt], w: &mut CodeWriter) {
        let range_ty = self.type_of(range);
        let range_ty = range_ty.as_ref().map(|t| t.without_reference().clone());

        if let (Some(rt), Expr::Name(group)) = (&range_ty, range.unparen()) {
            if is_thread_collection(rt) && is_join_of(body, name) {
                w.line(format!("{}.Wait()", go_local(group)));
                return;
            }
        }

        let src = self.expr(range);
        self.flush_into(w);
        self.locals.push();
        let used = self.read.contains(name);
        let var = go_local(name);
        let elem = if ty.without_reference().base_name() == "auto" {
            range_ty.as_ref().and_then(element_type)
        } else {
            Some(ty.without_reference().clone())
        };
        let head = match &range_ty {
            Some(rt) if rt.async_kind().is_some() => {
                if let Some(e) = rt.args().first() {
                    self.locals.declare(name, e.clone());
                }
                format!("for {var} := range {src} {{")
            }
            Some(rt) if is_map_type(rt) => self.map_range(rt, name, &src, body),
            Some(rt) if is_set_type(rt) => {
                if let Some(e) = rt.args().first() {
                    self.locals.declare(name, e.clone());
                }
                if !used {
                    format!("for range {src} {{")
                } else if ordered(rt) {
                    self.imports.insert("maps");
                    self.imports.insert("slices");
                    format!("for _, {var} := range slices.Sorted(maps.Keys({src})) {{")
                } else {
                    format!("for {var} := range {src} {{")
                }
            }
            Some(rt) if is_string_type(rt) => {
                self.locals.declare(name, Type::integer("unsigned char"));
                if used {
                    format!("for _, {var} := range []byte({src}) {{")
                } else {
                    format!("for range {src} {{")
                }
            }
            _ => {
                let mutable_ref = matches!(
                    &ty.kind,
                    TypeKind::Reference { rvalue: false, referent } if !referent.is_const
                ) && writes_through(body, name);
                let elem = elem.clone().unwrap_or_else(|| Type::class("auto"));
                if mutable_ref {
                    let index = self.temp("i");
                    self.locals
                        .declare(name, Type::reference(elem, false));
                    w.open(format!("for {index} := range {src} {{"));
                    w.line(format!("{var} := &{}[{index}]", atom(&src)));
                    self.range_body(body, w);
                    self.locals.pop();
                    return;
                }
                self.locals.declare(name, elem);
                if used {
                    format!("for _, {var} := range {src} {{")
                } else {
                    format!("for range {src} {{")
                }
            }
        };
        w.open(head);
        if let Some(rt) = &range_ty {
            if is_map_type(rt) && ordered(rt) {
                let key = format!("{name}.first");
                let value = format!("{name}.second");
                if let (Some(k), Some(v)) = (self.aliases.get(&key).cloned(), self.aliases.get(&value).cloned()) {
                    if v != "_" {
                        w.line(format!("{v} := {src}[{k}]"));
                    }
                }
            }
        }
        self.range_body(body, w);
        self.locals.pop();
    }

    fn range_body(&mut self, body: &[Stmt], w: &mut CodeWriter) {
        self.loops.push(LoopKind::Plain);
        self.block(body, true, w);
        self.loops.pop();
        w.close("}");
    }

    /// Header for a map loop; the pair variable's members become aliases.
    fn map_range(&mut self, rt: &Type, name: &str, src: &str, body: &[Stmt]) -> String {
        let stem = go_local(name);
        let uses_key = mentions_member(body, name, "first");
        let uses_value = mentions_member(body, name, "second");
        let key = if uses_key { format!("{stem}Key") } else { "_".to_string() };
        let value = if uses_value { format!("{stem}Value") } else { "_".to_string() };
        let key = if key != "_" { self.fresh(&key) } else { key };
        let value = if value != "_" { self.fresh(&value) } else { value };
        self.aliases.insert(format!("{name}.first"), key.clone());
        self.aliases.insert(format!("{name}.second"), value.clone());
        if let Some(k) = rt.args().first() {
            self.locals.declare(&format!("{name}.first"), k.clone());
        }
        if let Some(v) = rt.args().get(1) {
            self.locals.declare(&format!("{name}.second"), v.clone());
        }
        if ordered(rt) && (key != "_" || value != "_") {
            self.imports.insert("maps");
            self.imports.insert("slices");
            let k = if key == "_" { self.temp("k") } else { key };
            self.aliases.insert(format!("{name}.first"), k.clone());
            return format!("for _, {k} := range slices.Sorted(maps.Keys({src})) {{");
        }
        match (key.as_str(), value.as_str()) {
            ("_", "_") => format!("for range {src} {{"),
            (k, "_") => format!("for {k} := range {src} {{"),
            (k, v) => format!("for {k}, {v} := range {src} {{"),
        }
    }

    fn switch(&mut self, scrutinee: &Expr, cases: &[Case], w: &mut CodeWriter) {
        let s = self.expr(scrutinee);
        let scrutinee_ty = self.type_of(scrutinee);
        self.flush_into(w);
        w.open(format!("switch {s} {{"));
        for case in cases {
            let labels: Vec<String> = case
                .labels
                .iter()
                .map(|l| match &scrutinee_ty {
                    Some(t) => self.coerce(l, t),
                    None => self.expr(l),
                })
                .collect();
            w.dedent();
            match (labels.is_empty(), case.is_default) {
                (true, _) => w.open("default:"),
                (false, false) => w.open(format!("case {}:", labels.join(", "))),
                (false, true) => {
                    w.open(format!("case {}:", labels.join(", ")));
                    w.line("fallthrough");
                    w.dedent();
                    w.open("default:");
                }
            }
            let body: Vec<Stmt> = match case.body.split_last() {
                Some((Stmt::Break, rest)) => rest.to_vec(),
                _ => case.body.clone(),
            };
            self.locals.push();
            for st in &body {
                self.stmt(st, w);
            }
            self.locals.pop();
        }
        w.close("}");
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn decl(&mut self, d: &Decl, w: &mut CodeWriter) {
        if d.is_static {
            self.gap(format!("the static local `{}`; it is a plain local in Go", d.name));
            w.line(format!("// UNTRANSLATED: static storage of `{}`", d.name));
        }
        let ident = go_local(&d.name);
        let ty = if d.is_auto() {
            let inferred = match &d.init {
                Init::Expr(e) => self.type_of(e),
                _ => None,
            };
            inferred
                .or_else(|| infer_type(&d.init))
                .unwrap_or_else(|| d.ty.clone())
        } else {
            d.ty.clone()
        };
        let value_ty = ty.without_reference().clone();

        if let Some(kind) = value_ty.threading_kind() {
            self.threading_decl(d, kind, &value_ty, w);
            self.locals.declare(&d.name, ty);
            return;
        }
        if is_thread_collection(&value_ty) {
            self.imports.insert("sync");
            w.line(format!("var {ident} sync.WaitGroup"));
            self.wait_groups.insert(d.name.clone());
            self.locals.declare(&d.name, ty);
            return;
        }
        if let Some(AsyncKind::Promise) = value_ty.async_kind() {
            let elem = value_ty.args().first().cloned().unwrap_or_else(Type::void);
            let elem_text = if elem.is_void() {
                "struct{}".to_string()
            } else {
                self.go_type(&elem)
            };
            w.line(format!("{ident} := make(chan {elem_text}, 1)"));
            self.aliases.insert(format!("{}.get_future", d.name), ident.clone());
            self.locals.declare(&d.name, ty);
            self.mark_unused(&d.name, &ident, w);
            return;
        }

        let reference = matches!(
            &ty.kind,
            TypeKind::Reference { rvalue: false, referent } if !referent.is_const
        );
        let text = match &d.init {
            Init::Default => {
                let go_ty = self.go_type(&value_ty);
                if self.unit.facts.class(value_ty.base_name()).is_some()
                    && matches!(value_ty.kind, TypeKind::Class | TypeKind::Struct)
                {
                    let v = self.default_value(&value_ty);
                    self.flush_into(w);
                    format!("{ident} := {v}")
                } else if needs_make(&value_ty) {
                    format!("{ident} := {go_ty}{{}}")
                } else {
                    format!("var {ident} {go_ty}")
                }
            }
            Init::Expr(e) if reference => {
                let place = self.place(e);
                self.flush_into(w);
                let place = place.strip_prefix('*').map_or_else(|| format!("&{place}"), str::to_string);
                format!("{ident} := {place}")
            }
            Init::Expr(e) => {
                let v = self.coerce(e, &value_ty);
                if let Some((call, has_value)) = self.take_call(&v) {
                    self.flush_into(w);
                    if has_value {
                        w.line(format!("{ident}, err := {call}"));
                        w.open("if err != nil {");
                    } else {
                        w.open(format!("if err := {call}; err != nil {{"));
                    }
                    let check = self.propagate("err");
                    w.line(check);
                    w.close("}");
                    self.locals.declare(&d.name, ty);
                    self.mark_unused(&d.name, &ident, w);
                    return;
                }
                self.flush_into(w);
                if self.explicit_type(&value_ty, e) {
                    let go_ty = self.go_type(&value_ty);
                    format!("var {ident} {go_ty} = {v}")
                } else {
                    format!("{ident} := {v}")
                }
            }
            Init::Args(args) => {
                let v = if args.is_empty() {
                    self.default_value(&value_ty)
                } else {
                    self.construct(&value_ty, args)
                };
                self.flush_into(w);
                format!("{ident} := {v}")
            }
            Init::List(items) => {
                let v = if items.is_empty() {
                    self.default_value(&value_ty)
                } else {
                    self.list_value(&value_ty, items)
                };
                self.flush_into(w);
                if value_ty.is_primitive() {
                    let go_ty = self.go_type(&value_ty);
                    format!("var {ident} {go_ty} = {v}")
                } else {
                    format!("{ident} := {v}")
                }
            }
        };
        w.line(text);
        self.locals.declare(&d.name, ty);
        self.mark_unused(&d.name, &ident, w);
    }

    /// `_ = x` for locals Go would reject as unused.
    fn mark_unused(&mut self, name: &str, ident: &str, w: &mut CodeWriter) {
        if !self.read.contains(name) {
            w.line(format!("_ = {ident}"));
        }
    }

    /// True if a declaration must spell its type: untyped constants would
    /// otherwise default to `int` or `float64`.
    fn explicit_type(&self, ty: &Type, init: &Expr) -> bool {
        match &ty.kind {
            TypeKind::Integer | TypeKind::Float | TypeKind::Bool => {
                is_constant(init) || self.type_of(init).map_or(true, |t| {
                    super::expr::go_primitive(t.without_reference()) != super::expr::go_primitive(ty)
                })
            }
            TypeKind::Pointer { .. } | TypeKind::Function { .. } | TypeKind::Enum => {
                matches!(init.unparen(), Expr::Null | Expr::Lambda(_) | Expr::Int(_))
            }
            TypeKind::Container {
                kind: hybrid_ir::ContainerKind::Optional,
                ..
            } => matches!(init.unparen(), Expr::Null | Expr::Name(_)),
            _ => false,
        }
    }

    fn threading_decl(&mut self, d: &Decl, kind: ThreadingKind, ty: &Type, w: &mut CodeWriter) {
        let ident = go_local(&d.name);
        let args: Vec<Expr> = match &d.init {
            Init::Default => Vec::new(),
            Init::Expr(e) => vec![e.clone()],
            Init::Args(a) | Init::List(a) => a.clone(),
        };
        match kind {
            ThreadingKind::Mutex
            | ThreadingKind::RecursiveMutex
            | ThreadingKind::SharedMutex
            | ThreadingKind::TimedMutex => {
                if kind == ThreadingKind::RecursiveMutex {
                    self.gap(format!("recursive locking of `{}`; Go mutexes are not reentrant", d.name));
                }
                let go_ty = self.go_type(ty);
                w.line(format!("var {ident} {go_ty}"));
            }
            ThreadingKind::LockGuard
            | ThreadingKind::UniqueLock
            | ThreadingKind::ScopedLock
            | ThreadingKind::SharedLock => {
                self.lock(&d.name, &args, kind == ThreadingKind::SharedLock, w);
            }
            ThreadingKind::Thread | ThreadingKind::JThread => {
                self.imports.insert("sync");
                w.line(format!("var {ident} sync.WaitGroup"));
                self.wait_groups.insert(d.name.clone());
                if let Some((f, rest)) = args.split_first() {
                    let spawn = self.spawn(&ident, f, rest);
                    self.flush_into(w);
                    w.line(spawn);
                }
                if kind == ThreadingKind::JThread {
                    self.on_exit(format!("{ident}.Wait()"), w);
                }
            }
            ThreadingKind::Atomic => {
                let value_ty = ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                let atomic = go_atomic(&value_ty);
                self.imports.insert("sync/atomic");
                w.line(format!("var {ident} {atomic}"));
                if let Some(init) = args.first().filter(|e| !is_zero(e)) {
                    let v = self.coerce(init, &value_ty);
                    self.flush_into(w);
                    w.line(format!("{ident}.Store({v})"));
                }
            }
            ThreadingKind::ConditionVariable => {
                self.imports.insert("sync");
                let mutex = condvar_mutex(&self.body, &d.name)
                    .map(|m| self.expr(&Expr::Name(m)))
                    .unwrap_or_else(|| "sync.Mutex{}".to_string());
                w.line(format!("{ident} := sync.NewCond(&{mutex})"));
            }
        }
    }

    /// Locks `mutexes` for the guard `var` and schedules the release.
    fn lock(&mut self, var: &str, args: &[Expr], shared: bool, w: &mut CodeWriter) {
        let deferred = args
            .iter()
            .any(|a| matches!(a, Expr::Name(n) if n.ends_with("defer_lock")));
        let adopted = args
            .iter()
            .any(|a| matches!(a, Expr::Name(n) if n.ends_with("adopt_lock")));
        let mutexes: Vec<&Expr> = args
            .iter()
            .filter(|a| !matches!(a, Expr::Name(n) if n.ends_with("_lock") && n.contains("::")))
            .collect();
        let mut guard = GuardVar::default();
        for m in mutexes {
            let place = self.place(m);
            let is_rw = self
                .type_of(m)
                .and_then(|t| t.without_reference().threading_kind())
                == Some(ThreadingKind::SharedMutex);
            let (lock, unlock) = if shared && is_rw {
                ("RLock", "RUnlock")
            } else {
                ("Lock", "Unlock")
            };
            guard.lock.push(format!("{place}.{lock}()"));
            guard.unlock.push(format!("{place}.{unlock}()"));
        }
        self.flush_into(w);
        if !deferred && !adopted {
            for line in &guard.lock {
                w.line(line);
            }
        }
        if !deferred && !self.manual_locks.contains(var) {
            for release in guard.unlock.clone() {
                self.on_exit(release, w);
            }
        }
        self.guard_vars.insert(var.to_string(), guard);
    }

    /// `lk.unlock()` / `lk.lock()` on a guard declared in the body.
    pub(super) fn guard_call(&mut self, var: &str, method: &str) -> Option<String> {
        let guard = self.guard_vars.get(var)?;
        match method {
            "unlock" => Some(guard.unlock.join("\n")),
            "lock" => Some(guard.lock.join("\n")),
            "owns_lock" => Some("true".to_string()),
            _ => None,
        }
    }

    // ========================================================================
    // Returns and exceptions
    // ========================================================================

    /// The value type a `return` in the current scope carries.
    fn current_return_type(&self) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            match scope {
                FnScope::Try(_) => continue,
                FnScope::Lambda(ty) => return ty.clone(),
                FnScope::Goroutine => return None,
                FnScope::Coroutine => return self.site.channel.clone().filter(|t| !t.is_void()),
            }
        }
        if self.site.is_constructor {
            return None;
        }
        self.site.return_type.clone().filter(|t| !t.is_void())
    }

    fn ret(&mut self, value: Option<&Expr>, w: &mut CodeWriter) {
        let ty = self.current_return_type();
        let v = match (value, &ty) {
            (Some(e), Some(t)) => Some(self.coerce(e, t)),
            (Some(e), None) if self.scopes.is_empty() && self.site.is_main => Some(self.expr(e)),
            (Some(e), None) => {
                self.effect(e, w);
                None
            }
            (None, _) => None,
        };
        let releases = self.releases(false);
        let scope = self.scopes.last().cloned();

        if scope.is_none() && self.site.fallible && !self.site.is_constructor && releases.is_empty() {
            if let Some(text) = v.as_deref() {
                if self.pending.len() == 1 {
                    if let Some((call, true)) = self.take_call(text) {
                        w.line(format!("return {call}"));
                        return;
                    }
                }
            }
        }
        self.flush_into(w);
        let v = match v {
            Some(text) if !releases.is_empty() && !is_simple(&text) => {
                let temp = self.temp("result");
                w.line(format!("{temp} := {text}"));
                Some(temp)
            }
            other => other,
        };
        for line in &releases {
            w.line(line);
        }
        w.line(self.return_line(v.as_deref()));
    }

    /// The statement returning `value` from the current scope.
    fn return_line(&mut self, value: Option<&str>) -> String {
        match self.scopes.last().cloned() {
            Some(FnScope::Try(frame)) => match (value, frame.value.is_some()) {
                (Some(v), true) => format!("return true, {v}, nil"),
                (None, true) => {
                    let zero = frame
                        .value
                        .as_ref()
                        .map(|t| self.zero_of(t))
                        .unwrap_or_default();
                    format!("return true, {zero}, nil")
                }
                (_, false) if frame.returns => "return true, nil".to_string(),
                _ => "return nil".to_string(),
            },
            Some(FnScope::Lambda(_)) => match value {
                Some(v) => format!("return {v}"),
                None => "return".to_string(),
            },
            Some(FnScope::Goroutine) => "return".to_string(),
            Some(FnScope::Coroutine) => match value {
                Some(v) => format!("{} <- {v}\nreturn", self.channel),
                None => "return".to_string(),
            },
            None if self.site.is_main => match value {
                Some(v) if v != "0" => {
                    self.imports.insert("os");
                    format!("os.Exit(int({v}))")
                }
                _ => "return".to_string(),
            },
            None if self.site.is_constructor => {
                let nil = if self.site.fallible { ", nil" } else { "" };
                format!("return {}{nil}", self.site.receiver)
            }
            None => {
                let nil = if self.site.fallible { ", nil" } else { "" };
                match value {
                    Some(v) => format!("return {v}{nil}"),
                    None if self.site.fallible => "return nil".to_string(),
                    None => "return".to_string(),
                }
            }
        }
    }

    fn co_return(&mut self, value: Option<&Expr>, w: &mut CodeWriter) {
        let v = match (value, self.site.channel.clone()) {
            (Some(e), Some(elem)) if !elem.is_void() => Some(self.coerce(e, &elem)),
            (Some(e), _) => {
                self.effect(e, w);
                None
            }
            (None, _) => None,
        };
        self.flush_into(w);
        if let Some(v) = v {
            w.line(format!("{} <- {v}", self.channel));
        }
        w.line("return");
    }

    fn throw(&mut self, value: Option<&Expr>, w: &mut CodeWriter) {
        let err = match value {
            None => match self.caught.last() {
                Some(var) => var.clone(),
                None => {
                    self.imports.insert("errors");
                    "errors.New(\"rethrown outside a handler\")".to_string()
                }
            },
            Some(e) => self.error_value(e),
        };
        self.flush_into(w);
        let lines = self.propagate(&err);
        w.line(lines);
    }

    /// An `error` built from a thrown value.
    fn error_value(&mut self, e: &Expr) -> String {
        let kind = e
            .unparen()
            .call_name()
            .filter(|n| n.starts_with("std::") || self.unit.ir.find_class(n).is_some())
            .and_then(thrown_kind);
        if let Some(kind) = kind {
            self.helpers.insert("Exception");
            let message = match e.unparen() {
                Expr::Call { args, .. } => args.first(),
                _ => None,
            };
            let text = match message.map(Expr::unparen) {
                Some(Expr::Str(s)) => format!("\"{}\"", go_string(s)),
                Some(m) if self.type_of(m).is_some_and(|t| is_string_type(&t)) => self.expr(m),
                Some(m) => {
                    self.imports.insert("fmt");
                    format!("fmt.Sprint({})", self.expr(m))
                }
                None => format!("\"{kind}\""),
            };
            return format!("&Exception{{Kind: \"{kind}\", Message: {text}}}");
        }
        let message = match e.unparen() {
            Expr::Call { args, .. } if e.call_name().is_some() => args.first(),
            Expr::Name(n) if self.caught.contains(&go_local(n)) => return go_local(n),
            other => Some(other),
        };
        match message.map(Expr::unparen) {
            Some(Expr::Str(s)) => {
                self.imports.insert("errors");
                format!("errors.New(\"{}\")", go_string(s))
            }
            Some(m) => {
                let is_text = self.type_of(m).is_some_and(|t| is_string_type(&t))
                    || matches!(m, Expr::Binary { op: BinOp::Add, .. });
                let text = self.expr(m);
                if is_text {
                    self.imports.insert("errors");
                    format!("errors.New({text})")
                } else {
                    self.imports.insert("fmt");
                    format!("fmt.Errorf(\"%v\", {text})")
                }
            }
            None => {
                self.imports.insert("errors");
                let name = e.call_name().unwrap_or("exception");
                format!("errors.New(\"{}\")", name.rsplit("::").next().unwrap_or(name))
            }
        }
    }

    fn try_block(&mut self, body: &[Stmt], handlers: &[Handler], w: &mut CodeWriter) {
        let returns = has_return(body);
        let value = if returns { self.current_return_type() } else { None };
        let handler = handlers.first();
        let dispatch = needs_dispatch(handlers.iter().map(|h| h.ty.as_deref()));
        let err = handler
            .and_then(|h| h.var.as_deref())
            .filter(|_| !dispatch)
            .map(go_local)
            .unwrap_or_else(|| "err".to_string());

        let frame = TryFrame {
            returns,
            value: value.clone(),
        };
        let inner = self.closure_body(body, FnScope::Try(frame));
        self.imports.insert("fmt");
        let recover = "defer func() {\n\tif r := recover(); r != nil {\n\t\tif e, ok := r.(error); ok {\n\t\t\terr = e\n\t\t} else {\n\t\t\terr = fmt.Errorf(\"%v\", r)\n\t\t}\n\t}\n}()";
        let value_text = value.as_ref().map(|t| self.go_type(t));
        let (results, binding, fallthrough) = match (returns, &value_text) {
            (false, _) => ("(err error)".to_string(), err.clone(), "return nil".to_string()),
            (true, None) => {
                let done = self.temp("done");
                (
                    "(done bool, err error)".to_string(),
                    format!("{done}, {err}"),
                    "return false, nil".to_string(),
                )
            }
            (true, Some(t)) => {
                let done = self.temp("done");
                let ret = self.temp("ret");
                let zero = self.zero_value(t);
                (
                    format!("(done bool, ret {t}, err error)"),
                    format!("{done}, {ret}, {err}"),
                    format!("return false, {zero}, nil"),
                )
            }
        };
        let mut closure = format!("func() {results} {{\n{}\n", indent_lines(recover));
        if !inner.is_empty() {
            closure.push_str(&indent_lines(&inner));
            closure.push('\n');
        }
        if !is_terminating(body) {
            closure.push_str(&format!("\t{fallthrough}\n"));
        }
        closure.push_str("}()");
        w.open(format!("if {binding} := {closure}; {err} != nil {{"));
        if dispatch {
            self.dispatch_handlers(handlers, &err, w);
        } else if let Some(h) = handler {
            let uses = h.var.as_ref().is_some_and(|v| {
                crate::lower::scope::mentioned_names(&h.body).contains(v)
            }) || any_rethrow(&h.body);
            if !uses && err != "err" {
                w.line(format!("_ = {err}"));
            }
            self.handler(h, &err, w);
        }
        if returns {
            let parts: Vec<&str> = binding.split(", ").collect();
            let done = parts.first().copied().unwrap_or("done");
            w.dedent();
            w.open(format!("}} else if {done} {{"));
            let ret = (parts.len() == 3).then(|| parts[1].to_string());
            let releases = self.releases(false);
            for line in releases {
                w.line(line);
            }
            let line = self.return_line(ret.as_deref());
            w.line(line);
        }
        w.close("}");
    }

    /// Body of one handler with the caught error bound to `err`.
    fn handler(&mut self, h: &Handler, err: &str, w: &mut CodeWriter) {
        self.caught.push(err.to_string());
        self.locals.push();
        if let Some(var) = &h.var {
            self.locals.declare(var, Type::class("std::exception"));
        }
        self.block(&h.body, false, w);
        self.locals.pop();
        self.caught.pop();
    }

    /// Picks a handler by the kind of the caught `err`. Handlers after one
    /// that catches everything are never reached.
    fn dispatch_handlers(&mut self, handlers: &[Handler], err: &str, w: &mut CodeWriter) {
        self.imports.insert("errors");
        self.helpers.insert("Exception");
        w.line(format!("kind := \"{UNTYPED_KIND}\""));
        w.line("var exception *Exception");
        w.open(format!("if errors.As({err}, &exception) {{"));
        w.line("kind = exception.Kind");
        w.close("}");
        w.open("switch kind {");
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut catch_all = false;
        for h in handlers {
            w.dedent();
            match caught_kinds(h.ty.as_deref()) {
                Some(kinds) => {
                    let fresh: Vec<String> = kinds
                        .into_iter()
                        .filter(|k| seen.insert(k.clone()))
                        .map(|k| format!("\"{k}\""))
                        .collect();
                    if fresh.is_empty() {
                        w.indent();
                        continue;
                    }
                    w.open(format!("case {}:", fresh.join(", ")));
                }
                None => {
                    catch_all = true;
                    w.open("default:");
                }
            }
            let used = h.var.as_ref().is_some_and(|v| {
                crate::lower::scope::mentioned_names(&h.body).contains(v)
            });
            let binding = match &h.var {
                Some(v) if used && go_local(v) != err => {
                    let name = go_local(v);
                    w.line(format!("{name} := {err}"));
                    name
                }
                _ => err.to_string(),
            };
            self.handler(h, &binding, w);
            if catch_all {
                break;
            }
        }
        if !catch_all {
            w.dedent();
            w.open("default:");
            self.flush_into(w);
            let lines = self.propagate(err);
            w.line(lines);
        }
        w.close("}");
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn print(&mut self, to_stderr: bool, items: &[Expr], newline: bool, w: &mut CodeWriter) {
        self.imports.insert("fmt");
        let mut format = String::new();
        let mut args = Vec::new();
        let mut precision: Option<String> = None;
        for item in items {
            match item.unparen() {
                Expr::Str(s) => format.push_str(&go_string(s).replace('%', "%%")),
                Expr::Char(c) => format.push_str(&char_text(c).replace('%', "%%")),
                Expr::Name(n) if n.ends_with("fixed") || n.ends_with("boolalpha") => {}
                Expr::Call { args: a, .. }
                    if item.call_name().is_some_and(|n| n.ends_with("setprecision")) =>
                {
                    precision = a.first().map(|p| self.expr(p));
                }
                Expr::Call { .. } if item.call_name().is_some_and(|n| n.ends_with("setw")) => {}
                other => {
                    let ty = self.type_of(other);
                    let verb = match &ty {
                        Some(t) if is_char(t.without_reference()) => "%c".to_string(),
                        Some(t) if matches!(t.without_reference().kind, TypeKind::Float) => {
                            match &precision {
                                Some(p) => format!("%.{p}f"),
                                None => "%v".to_string(),
                            }
                        }
                        _ => "%v".to_string(),
                    };
                    format.push_str(&verb);
                    args.push(self.expr(other));
                }
            }
        }
        self.flush_into(w);
        let (prefix, stream) = if to_stderr {
            self.imports.insert("os");
            ("Fprint", "os.Stderr, ")
        } else {
            ("Print", "")
        };
        let line = if args.is_empty() {
            let text = format.replace("%%", "%");
            if newline {
                format!("fmt.{prefix}ln({stream}\"{text}\")")
            } else {
                format!("fmt.{prefix}({stream}\"{text}\")")
            }
        } else {
            if newline {
                format.push_str("\\n");
            }
            format!("fmt.{prefix}f({stream}\"{format}\", {})", args.join(", "))
        };
        w.line(line);
    }

    // ========================================================================
    // Expression statements
    // ========================================================================

    /// Writes an expression evaluated for its effect.
    pub(super) fn effect(&mut self, e: &Expr, w: &mut CodeWriter) {
        match e.unparen() {
            Expr::Assign {
                op: None,
                target,
                value,
            } => self.assign(target, value, w),
            Expr::Assign {
                op: Some(op),
                target,
                value,
            } => self.compound(target, *op, value, w),
            Expr::Postfix { op, operand } => {
                let delta = if *op == IncDec::Inc { "1" } else { "-1" };
                self.step(operand, *op == IncDec::Inc, delta, w);
            }
            Expr::Unary {
                op: op @ (UnaryOp::PreInc | UnaryOp::PreDec),
                operand,
            } => {
                let inc = *op == UnaryOp::PreInc;
                self.step(operand, inc, if inc { "1" } else { "-1" }, w);
            }
            Expr::Call { callee, args } => {
                if self.call_statement(callee, args, w) {
                    return;
                }
                let text = self.expr(e);
                self.write_call(text, w);
            }
            Expr::Await(inner) => {
                let v = self.expr(inner);
                self.flush_into(w);
                w.line(format!("<-{}", atom(&v)));
            }
            other => {
                let text = self.expr(other);
                self.flush_into(w);
                if !text.is_empty() {
                    w.line(format!("_ = {text}"));
                }
            }
        }
    }

    /// Writes a rendered call, checking its error in place when it can fail.
    fn write_call(&mut self, text: String, w: &mut CodeWriter) {
        if let Some((call, has_value)) = self.take_call(&text) {
            self.flush_into(w);
            let head = if has_value {
                format!("if _, err := {call}; err != nil {{")
            } else {
                format!("if err := {call}; err != nil {{")
            };
            w.open(head);
            let check = self.propagate("err");
            w.line(check);
            w.close("}");
            return;
        }
        self.flush_into(w);
        if text.is_empty() {
            return;
        }
        let is_call = text.ends_with(')') || text.starts_with("<-") || text.contains('\n');
        if is_call {
            w.line(text);
        } else {
            w.line(format!("_ = {text}"));
        }
    }

    fn step(&mut self, target: &Expr, inc: bool, delta: &str, w: &mut CodeWriter) {
        if self.is_atomic_place(target) {
            let place = self.place(target);
            self.flush_into(w);
            w.line(format!("{place}.Add({delta})"));
            return;
        }
        let place = self.place(target);
        self.flush_into(w);
        w.line(format!("{}{}", place, if inc { "++" } else { "--" }));
    }

    fn assign(&mut self, target: &Expr, value: &Expr, w: &mut CodeWriter) {
        let target_ty = self.type_of(target);
        if let Some(t) = &target_ty {
            if t.without_reference().threading_kind() == Some(ThreadingKind::Atomic) {
                let value_ty = t.without_reference().args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                let place = self.place(target);
                let v = self.coerce(value, &value_ty);
                self.flush_into(w);
                w.line(format!("{place}.Store({v})"));
                return;
            }
            if matches!(
                t.without_reference().threading_kind(),
                Some(ThreadingKind::Thread | ThreadingKind::JThread)
            ) {
                if let Some((f, rest)) = thread_parts(value) {
                    let place = self.place(target);
                    let spawn = self.spawn(&place, &f, &rest);
                    self.flush_into(w);
                    w.line(spawn);
                    return;
                }
            }
        }
        if let Expr::Index { base, index } = target.unparen() {
            if self.type_of(base).is_some_and(|t| is_string_type(t.without_reference())) {
                let s = self.place(base);
                let i = self.expr(index);
                let c = self.expr(value);
                self.flush_into(w);
                w.line(format!(
                    "{s} = {s}[:{i}] + string(rune({c})) + {s}[{i}+1:]"
                ));
                return;
            }
        }
        let place = self.place(target);
        let v = match &target_ty {
            Some(t) => self.coerce(value, t.without_reference()),
            None => self.expr(value),
        };
        self.flush_into(w);
        w.line(format!("{place} = {v}"));
    }

    fn compound(&mut self, target: &Expr, op: BinOp, value: &Expr, w: &mut CodeWriter) {
        let target_ty = self.type_of(target).map(|t| t.without_reference().clone());
        if let Some(t) = &target_ty {
            if t.threading_kind() == Some(ThreadingKind::Atomic)
                && matches!(op, BinOp::Add | BinOp::Sub)
            {
                let value_ty = t.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                let place = self.place(target);
                let v = self.coerce(value, &value_ty);
                self.flush_into(w);
                if op == BinOp::Add {
                    w.line(format!("{place}.Add({v})"));
                } else {
                    w.line(format!("{place}.Add(-{})", atom(&v)));
                }
                return;
            }
            if is_string_type(t) && op == BinOp::Add {
                let place = self.place(target);
                let v = self.string_value(value);
                self.flush_into(w);
                w.line(format!("{place} += {v}"));
                return;
            }
        }
        if let Some(method) = target_ty.as_ref().and_then(|t| self.operator_method(t, op, true)) {
            let place = self.place(target);
            let v = self.expr(value);
            self.flush_into(w);
            w.line(format!("{place}.{method}({v})"));
            return;
        }
        let place = self.place(target);
        let v = match &target_ty {
            Some(t) if t.is_primitive() && op != BinOp::Shl && op != BinOp::Shr => {
                if matches!(t.kind, TypeKind::Float) && op == BinOp::Rem {
                    self.imports.insert("math");
                    let v = self.coerce(value, t);
                    self.flush_into(w);
                    w.line(format!("{place} = math.Mod({place}, {v})"));
                    return;
                }
                self.coerce(value, t)
            }
            _ => self.expr(value),
        };
        self.flush_into(w);
        w.line(format!("{place} {}= {v}", op.symbol()));
    }

    /// Statements with no expression form. Returns false when `callee` is
    /// an ordinary call.
    fn call_statement(&mut self, callee: &Expr, args: &[Expr], w: &mut CodeWriter) -> bool {
        match callee.unparen() {
            Expr::Member { base, name, .. } => {
                if let Expr::Name(var) = base.unparen() {
                    if let Some(lines) = self.guard_call(var, name) {
                        if name != "owns_lock" {
                            self.flush_into(w);
                            w.line(lines);
                        }
                        return true;
                    }
                }
                let base_ty = self.type_of(base).map(|t| pointee(t.without_reference()));
                let Some(ty) = base_ty else {
                    return false;
                };
                match ty.threading_kind() {
                    Some(ThreadingKind::Thread | ThreadingKind::JThread) => {
                        let place = self.place(base);
                        self.flush_into(w);
                        match name.as_str() {
                            "join" => w.line(format!("{place}.Wait()")),
                            "detach" => {}
                            _ => return false,
                        }
                        return true;
                    }
                    Some(ThreadingKind::ConditionVariable) if name.starts_with("wait") => {
                        self.condvar_wait(base, name, args, w);
                        return true;
                    }
                    Some(ThreadingKind::Atomic) if matches!(name.as_str(), "fetch_add" | "fetch_sub") => {
                        let value_ty = ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                        let place = self.place(base);
                        let v = match args.first() {
                            Some(a) => self.coerce(a, &value_ty),
                            None => "1".to_string(),
                        };
                        self.flush_into(w);
                        if name == "fetch_add" {
                            w.line(format!("{place}.Add({v})"));
                        } else {
                            w.line(format!("{place}.Add(-{})", atom(&v)));
                        }
                        return true;
                    }
                    _ => {}
                }
                if is_thread_collection(&ty) && matches!(name.as_str(), "emplace_back" | "push_back") {
                    let group = self.place(base);
                    let parts = match args {
                        [single] => thread_parts(single),
                        [f, rest @ ..] => Some((f.clone(), rest.to_vec())),
                        [] => None,
                    };
                    if let Some((f, rest)) = parts {
                        let spawn = self.spawn(&group, &f, &rest);
                        self.flush_into(w);
                        w.line(spawn);
                        return true;
                    }
                }
                if let Some(AsyncKind::Promise) = ty.async_kind() {
                    if name == "set_value" {
                        let place = self.place(base);
                        let elem = ty.args().first().cloned().unwrap_or_else(Type::void);
                        let v = match args.first() {
                            Some(a) if !elem.is_void() => self.coerce(a, &elem),
                            _ => "struct{}{}".to_string(),
                        };
                        self.flush_into(w);
                        w.line(format!("{place} <- {v}"));
                        return true;
                    }
                    if name == "set_exception" {
                        self.gap("`set_exception` on a promise; its channel carries values only");
                        w.line("// UNTRANSLATED: promise.set_exception(...)");
                        return true;
                    }
                }
                if matches!(ty.kind, TypeKind::Pointer { .. }) || matches!(self.type_of(base).map(|t| t.kind), Some(TypeKind::Pointer { .. })) {
                    if name == "reset" {
                        let place = self.place(base);
                        let v = match args.first() {
                            Some(a) => self.expr(a),
                            None => "nil".to_string(),
                        };
                        self.flush_into(w);
                        w.line(format!("{place} = {v}"));
                        return true;
                    }
                }
                if let Some(lines) = self.container_statement(base, &ty, name, args) {
                    self.flush_into(w);
                    w.line(lines);
                    return true;
                }
                false
            }
            Expr::Name(n) | Expr::Template { name: n, .. } => {
                let simple = n.strip_prefix("std::").unwrap_or(n);
                match simple {
                    "assert" => {
                        let Some(c) = args.first() else {
                            return true;
                        };
                        let text = self.condition(c);
                        self.flush_into(w);
                        w.open(format!("if {} {{", negated(&text)));
                        w.line(format!("panic(\"assertion failed: {}\")", go_string(&text.replace('"', "'"))));
                        w.close("}");
                        true
                    }
                    "swap" if args.len() == 2 => {
                        let a = self.place(&args[0]);
                        let b = self.place(&args[1]);
                        self.flush_into(w);
                        w.line(format!("{a}, {b} = {b}, {a}"));
                        true
                    }
                    "lock" if args.len() > 1 => {
                        let mut lines = Vec::new();
                        for a in args {
                            let place = self.place(a);
                            lines.push(format!("{place}.Lock()"));
                        }
                        self.flush_into(w);
                        for line in lines {
                            w.line(line);
                        }
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn condvar_wait(&mut self, cv: &Expr, method: &str, args: &[Expr], w: &mut CodeWriter) {
        let cv_text = self.place(cv);
        if method != "wait" {
            self.gap(format!("the timeout of `{method}`; it waits without one"));
        }
        let predicate = match method {
            "wait" => args.get(1),
            _ => args.get(2),
        };
        match predicate.map(Expr::unparen) {
            Some(Expr::Lambda(l)) => {
                let cond = match l.single_return() {
                    Some(e) => self.condition(e),
                    None => {
                        let body = self.closure_body(&l.body, FnScope::Lambda(Some(Type::bool())));
                        format!("func() bool {{\n{}\n}}()", indent_lines(&body))
                    }
                };
                self.flush_into(w);
                w.open(format!("for {} {{", negated(&cond)));
                w.line(format!("{cv_text}.Wait()"));
                w.close("}");
            }
            Some(other) => {
                let f = self.expr(other);
                self.flush_into(w);
                w.open(format!("for !{}() {{", atom(&f)));
                w.line(format!("{cv_text}.Wait()"));
                w.close("}");
            }
            None => {
                self.flush_into(w);
                w.line(format!("{cv_text}.Wait()"));
            }
        }
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Field initializers of a constructor's composite literal.
    pub fn field_inits(&mut self, class: &ClassDecl, ctor: Option<&Function>) -> FieldInits {
        let mut inits = FieldInits::default();
        let recv = self.site.receiver.clone();
        if let Some(base) = self.unit.hierarchy.data_base(&class.name) {
            let base_name = crate::naming::simple_name(&base.name).to_string();
            let init = ctor.and_then(|c| {
                c.initializers
                    .iter()
                    .find(|i| crate::naming::simple_name(&i.member) == base_name)
            });
            let spelled = class
                .bases
                .iter()
                .find(|b| crate::naming::simple_name(&b.name) == base_name)
                .map_or(base.name.clone(), |b| b.name.clone());
            let base_ty = resolve_type(&spelled);
            let args = init.map(|i| init_args(&i.value)).unwrap_or_default();
            let value = self.construct_class(&base_ty, &args, false);
            inits.fields.push((base_name, value));
        }
        let bodies: Vec<Vec<Stmt>> = class
            .methods
            .iter()
            .filter_map(|m| m.body.as_deref().map(parse_body))
            .collect();
        for field in class.instance_fields() {
            let ident = go_member(&field.name, field.access);
            let init = ctor.and_then(|c| c.initializers.iter().find(|i| i.member == field.name));
            match field.ty.threading_kind() {
                Some(k) if k.is_mutex() => continue,
                Some(ThreadingKind::Thread | ThreadingKind::JThread) => continue,
                Some(ThreadingKind::Atomic) => {
                    let value_ty = field.ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
                    let e = match init {
                        Some(i) => init_args(&i.value).into_iter().next(),
                        None => field.initializer.as_deref().and_then(parse_expression),
                    };
                    if let Some(e) = e.filter(|e| !is_zero(e)) {
                        let v = self.coerce(&e, &value_ty);
                        inits.post.push(format!("{recv}.{ident}.Store({v})"));
                    }
                    continue;
                }
                Some(ThreadingKind::ConditionVariable) => {
                    self.imports.insert("sync");
                    let mutex = bodies
                        .iter()
                        .find_map(|b| condvar_mutex(b, &field.name))
                        .and_then(|m| class.field(&m).map(|f| go_member(&f.name, f.access)));
                    let line = match mutex {
                        Some(m) => format!("{recv}.{ident} = sync.NewCond(&{recv}.{m})"),
                        None => format!("{recv}.{ident} = sync.NewCond(&sync.Mutex{{}})"),
                    };
                    inits.post.push(line);
                    continue;
                }
                _ => {}
            }
            let value = match init {
                Some(init) => {
                    let args = init_args(&init.value);
                    match args.as_slice() {
                        [single] if !matches!(single, Expr::List { .. }) || field.ty.is_primitive() => {
                            Some(self.coerce(single, &field.ty))
                        }
                        [] => Some(self.default_value(&field.ty)),
                        _ => Some(self.construct(&field.ty, &args)),
                    }
                }
                None => match field.initializer.as_deref().and_then(parse_expression) {
                    Some(e) => Some(self.coerce(&e, &field.ty)),
                    None if needs_make(&field.ty) => Some(self.default_value(&field.ty)),
                    None if self.has_constructor(&field.ty) => Some(self.default_value(&field.ty)),
                    None => None,
                },
            };
            if let Some(v) = value {
                inits.fields.push((ident, v));
            }
        }
        inits
    }

    /// True for class values whose zero value skips a constructor.
    fn has_constructor(&self, ty: &Type) -> bool {
        matches!(ty.kind, TypeKind::Class | TypeKind::Struct)
            && self
                .unit
                .facts
                .class(ty.base_name())
                .is_some_and(|c| c.constructors().next().is_some())
    }
}

/// The C++ mutex a condition variable named `cv` waits with, found from
/// the lock passed to its `wait`.
pub(crate) fn condvar_mutex(stmts: &[Stmt], cv: &str) -> Option<String> {
    let mut locks: BTreeMap<String, String> = BTreeMap::new();
    for s in stmts {
        s.walk(&mut |s| {
            if let Stmt::Decl(d) = s {
                if d.ty.threading_kind().is_some_and(|k| {
                    matches!(
                        k,
                        ThreadingKind::UniqueLock | ThreadingKind::LockGuard | ThreadingKind::ScopedLock
                    )
                }) {
                    if let Init::Args(args) | Init::List(args) = &d.init {
                        if let Some(Expr::Name(m)) = args.first().map(Expr::unparen) {
                            locks.insert(d.name.clone(), m.clone());
                        }
                    }
                }
            }
        });
    }
    let mut found = None;
    crate::lower::scope::visit_exprs(stmts, true, &mut |e| {
        if found.is_some() {
            return;
        }
        if let Some((base, method, args)) = e.method_call() {
            if method.starts_with("wait") && matches!(base.unparen(), Expr::Name(n) if n == cv) {
                if let Some(Expr::Name(lk)) = args.first().map(Expr::unparen) {
                    found = locks.get(lk).cloned();
                }
            }
        }
    });
    found
}

/// Names whose value is read: everything mentioned except the bare
/// targets of assignments and increments.
fn read_names(stmts: &[Stmt]) -> BTreeSet<String> {
    fn visit(e: &Expr, out: &mut BTreeSet<String>) {
        match e {
            Expr::Name(n) => {
                out.insert(n.clone());
            }
            Expr::Assign { target, value, .. } => {
                if !matches!(target.unparen(), Expr::Name(_)) {
                    visit(target, out);
                }
                visit(value, out);
            }
            Expr::Postfix { operand, .. }
            | Expr::Unary {
                op: UnaryOp::PreInc | UnaryOp::PreDec,
                operand,
            } => {
                if !matches!(operand.unparen(), Expr::Name(_)) {
                    visit(operand, out);
                }
            }
            Expr::Lambda(l) => {
                out.extend(read_names(&l.body));
            }
            other => {
                for child in other.children() {
                    visit(child, out);
                }
            }
        }
    }
    let mut out = BTreeSet::new();
    for s in stmts {
        s.walk(&mut |s| {
            for e in s.expressions() {
                visit(e, &mut out);
            }
            if let Stmt::Decl(d) = s {
                if d.ty.threading_kind().is_some() {
                    out.insert(d.name.clone());
                }
            }
        });
    }
    out
}

/// Lock guards the body unlocks or relocks by name.
fn manual_lock_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    crate::lower::scope::visit_exprs(stmts, true, &mut |e| {
        if let Some((base, method, _)) = e.method_call() {
            if matches!(method, "unlock" | "lock") {
                if let Expr::Name(n) = base.unparen() {
                    out.insert(n.clone());
                }
            }
        }
    });
    out
}

/// The arguments of a member initializer's value text.
pub(super) fn init_args(value: &str) -> Vec<Expr> {
    match parse_expression(&format!("__init({value})")) {
        Some(Expr::Call { args, .. }) => args,
        _ => parse_expression(value).into_iter().collect(),
    }
}

/// `(callable, args)` of a `std::thread(f, args...)` value.
fn thread_parts(value: &Expr) -> Option<(Expr, Vec<Expr>)> {
    match value.unparen() {
        Expr::Call { callee, args } => {
            let name = match callee.unparen() {
                Expr::Name(n) | Expr::Template { name: n, .. } => n.as_str(),
                _ => return None,
            };
            if !matches!(name.strip_prefix("std::").unwrap_or(name), "thread" | "jthread") {
                return None;
            }
            let (f, rest) = args.split_first()?;
            Some((f.clone(), rest.to_vec()))
        }
        Expr::Lambda(_) => Some((value.clone(), Vec::new())),
        _ => None,
    }
}

/// True if `stmts` reads `var.member`.
fn mentions_member(stmts: &[Stmt], var: &str, member: &str) -> bool {
    let mut found = false;
    crate::lower::scope::visit_exprs(stmts, true, &mut |e| {
        if let Expr::Member { base, name, .. } = e {
            if name == member && matches!(base.unparen(), Expr::Name(n) if n == var) {
                found = true;
            }
        }
    });
    found
}

/// True if `body` is just `var.join();`.
fn is_join_of(body: &[Stmt], var: &str) -> bool {
    match body {
        [Stmt::Expr(e)] => e.method_call().is_some_and(|(base, method, _)| {
            method == "join" && matches!(base.unparen(), Expr::Name(n) if n == var)
        }),
        _ => false,
    }
}

/// True if `body` assigns to `var` or calls a mutating method on it.
fn writes_through(body: &[Stmt], var: &str) -> bool {
    crate::lower::scope::mutated_names(body).contains(var)
}

fn ordered(ty: &Type) -> bool {
    matches!(
        ty.kind,
        TypeKind::Container {
            kind: hybrid_ir::ContainerKind::Map | hybrid_ir::ContainerKind::Set,
            ..
        }
    )
}

fn is_jump(s: &Stmt) -> bool {
    matches!(
        s,
        Stmt::Return(_) | Stmt::Throw(_) | Stmt::Break | Stmt::Continue | Stmt::CoReturn(_)
    )
}

fn any_rethrow(stmts: &[Stmt]) -> bool {
    crate::lower::ast::any_stmt(stmts, &mut |s| matches!(s, Stmt::Throw(None)))
}

fn is_zero(e: &Expr) -> bool {
    match e.unparen() {
        Expr::Int(v) => super::expr::int_literal(v).trim_start_matches('0').is_empty(),
        Expr::Bool(false) | Expr::Null => true,
        _ => false,
    }
}

fn is_constant(e: &Expr) -> bool {
    match e.unparen() {
        Expr::Int(_) | Expr::Float(_) | Expr::Char(_) | Expr::Bool(_) => true,
        Expr::Unary { operand, .. } => is_constant(operand),
        Expr::Binary { lhs, rhs, .. } => is_constant(lhs) && is_constant(rhs),
        _ => false,
    }
}

fn is_simple(text: &str) -> bool {
    text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        || text.parse::<f64>().is_ok()
        || (text.starts_with('"') && text.ends_with('"') && !text[1..text.len() - 1].contains('"'))
}

fn is_char(ty: &Type) -> bool {
    matches!(ty.kind, TypeKind::Integer)
        && matches!(ty.base_name(), "char" | "signed char" | "wchar_t" | "char8_t")
}

/// String literal content as Go writes it.
pub(super) fn go_string(text: &str) -> String {
    text.replace("\\'", "'")
}

/// The text a character literal prints as.
fn char_text(literal: &str) -> String {
    let inner = literal
        .trim_start_matches(['L', 'u', 'U'])
        .trim_start_matches('8')
        .trim_matches('\'');
    match inner {
        "\\'" => "'".to_string(),
        "\"" => "\\\"".to_string(),
        other => other.to_string(),
    }
}

/// Prefixes every non-empty line with a tab.
pub(super) fn indent_lines(text: &str) -> String {
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("\t{l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condvar_mutex_follows_the_wait_lock() {
        let body = parse_body(
            "std::unique_lock<std::mutex> lk(mtx); cv.wait(lk, [&] { return ready; });",
        );
        assert_eq!(condvar_mutex(&body, "cv").as_deref(), Some("mtx"));
        assert_eq!(condvar_mutex(&body, "other"), None);
    }

    #[test]
    fn assignment_targets_are_not_reads() {
        let body = parse_body("int a = 0; int b = 1; a = b; a++; return;");
        let read = read_names(&body);
        assert!(read.contains("b"));
        assert!(!read.contains("a"));
    }

    #[test]
    fn manual_locks_are_found() {
        let body = parse_body("std::unique_lock<std::mutex> lk(m); lk.unlock(); work();");
        assert!(manual_lock_names(&body).contains("lk"));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(go_string("it\\'s"), "it's");
        assert_eq!(char_text("'\"'"), "\\\"");
        assert_eq!(indent_lines("a\n\nb"), "\ta\n\n\tb");
    }
}
