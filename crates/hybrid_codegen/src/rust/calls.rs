//! Call lowering: standard library functions, container and threading
//! methods, user functions with overloads, defaults and failure
//! propagation.

use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::rust_token;
use hybrid_ir::{AsyncKind, ClassDecl, ContainerKind, Function, Ownership, Parameter, ThreadingKind, Type, TypeKind};

use super::body::{atom, escape_braces, Lowering};
use super::expr::rust_path;
use crate::lower::{parse_expression, Expr, UnaryOp};
use crate::naming::{rust_ident, simple_name};

impl<'u> Lowering<'u> {
    /// A call expression.
    pub(super) fn call(&mut self, callee: &Expr, args: &[Expr]) -> String {
        match callee.unparen() {
            Expr::Member { base, name, arrow } => self.method_call(base, name, *arrow, args),
            Expr::Name(name) => self.named_call(name, &[], args),
            Expr::Template { name, args: targs } => self.named_call(name, targs, args),
            Expr::Lambda(_) => {
                let f = self.expr(callee);
                let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("({f})({})", values.join(", "))
            }
            other => {
                let f = self.expr(other);
                let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("{}({})", atom(&f), values.join(", "))
            }
        }
    }

    /// Adds `.await` for async callees and `?` or `.unwrap()` for fallible
    /// ones.
    pub(super) fn finish_call(&mut self, call: String, fallible: bool, is_async: bool) -> String {
        let mut text = call;
        if is_async {
            if self.site.is_async && self.closure_depth == 0 {
                text.push_str(".await");
            } else {
                text = format!("tokio::runtime::Runtime::new().unwrap().block_on({text})");
            }
        }
        if fallible {
            if self.fallible_context() {
                text.push('?');
            } else {
                text.push_str(".unwrap()");
            }
        }
        text
    }

    /// Arguments converted to the declared parameter types; omitted
    /// trailing arguments take their declared defaults.
    pub(super) fn args_for(&mut self, params: &[Parameter], args: &[Expr]) -> Vec<String> {
        let mut out = Vec::new();
        for (i, p) in params.iter().enumerate() {
            match args.get(i) {
                Some(a) => out.push(self.coerce(a, &p.ty)),
                None => match p.default_value.as_deref().and_then(parse_expression) {
                    Some(d) => out.push(self.coerce(&d, &p.ty)),
                    None => break,
                },
            }
        }
        for extra in args.iter().skip(params.len()) {
            out.push(self.expr(extra));
        }
        out
    }

    // ========================================================================
    // Free and static calls
    // ========================================================================

    fn named_call(&mut self, name: &str, targs: &[String], args: &[Expr]) -> String {
        if let Some(text) = self.std_call(name, targs, args) {
            return text;
        }
        if self.locals.contains(name) {
            let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
            return format!("{}({})", rust_ident(name), values.join(", "));
        }
        if let Some(class) = self.unit.facts.class(name).filter(|c| simple_name(name) == c.name) {
            let ty = if targs.is_empty() {
                Type::class(class.name.clone())
            } else {
                Type::class(format!("{}<{}>", class.name, targs.join(", ")))
            };
            return self.construct(&ty, args);
        }
        if let Some(class) = self.site.class {
            if class.methods.iter().any(|m| m.name == name && !m.is_constructor) {
                return self.method_call(&Expr::This, name, true, args);
            }
        }
        if let Some((owner, method)) = name.rsplit_once("::") {
            if let Some(text) = self.qualified_call(owner, method, args) {
                return text;
            }
        }
        let arity = args.len();
        let candidates: Vec<&Function> = self
            .unit
            .ir
            .functions
            .iter()
            .filter(|f| f.name == name)
            .collect();
        if let Some(&first) = candidates.first() {
            let ordinal = self.unit.facts.select_overload(None, name, arity);
            let f = candidates.get(ordinal - 1).copied().unwrap_or(first);
            let ident = if ordinal > 1 {
                format!("{}_{ordinal}", rust_ident(name))
            } else {
                rust_ident(name)
            };
            let generic = if targs.is_empty() {
                String::new()
            } else {
                let types: Vec<String> = targs.iter().map(|t| self.rust_type(&resolve_type(t))).collect();
                format!("::<{}>", types.join(", "))
            };
            let values = self.args_for(&f.params, args);
            let call = format!("{ident}{generic}({})", values.join(", "));
            let fallible = self.unit.facts.is_fallible(None, f);
            return self.finish_call(call, fallible, f.is_async());
        }
        let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        format!("{}({})", rust_path(name), values.join(", "))
    }

    /// `Base::method(...)` from a derived class and `Class::static_fn(...)`.
    fn qualified_call(&mut self, owner: &str, method: &str, args: &[Expr]) -> Option<String> {
        let class = self.unit.facts.class(owner)?;
        let m = class.methods.iter().find(|m| m.name == method)?;
        let values = self.args_for(&m.params, args);
        let ident = self.unit.method_ident(Some(class), m);
        let fallible = self.unit.method_fallible(&class.name, method);
        if m.is_static {
            let call = format!("{}::{ident}({})", self.unit.type_name(class), values.join(", "));
            return Some(self.finish_call(call, fallible, m.is_async()));
        }
        let current = self.site.class?;
        let path = if current.name == class.name {
            String::new()
        } else {
            let mut path = String::new();
            let mut at = current.name.clone();
            while at != class.name {
                let base = self.unit.hierarchy.data_base(&at)?;
                path.push_str(".base");
                at = base.name.clone();
            }
            path
        };
        let call = format!("{}{path}.{ident}({})", self.site.receiver, values.join(", "));
        Some(self.finish_call(call, fallible, m.is_async()))
    }

    /// Calls into the C and C++ standard libraries.
    fn std_call(&mut self, name: &str, targs: &[String], args: &[Expr]) -> Option<String> {
        let short = name.strip_prefix("std::").unwrap_or(name);
        if let Some(limit) = numeric_limit(name) {
            return Some(limit);
        }
        let arg = |this: &mut Self, i: usize| args.get(i).map_or_else(String::new, |a| this.expr(a));
        let float_arg = |this: &mut Self, i: usize| match args.get(i) {
            Some(a) => this.coerce(a, &Type::float("double")),
            None => String::new(),
        };
        Some(match short {
            "move" | "forward" => arg(self, 0),
            "to_string" => format!("{}.to_string()", atom(&arg(self, 0))),
            "stoi" | "atoi" => format!("{}.trim().parse::<i32>().unwrap()", atom(&arg(self, 0))),
            "stol" | "stoll" | "atol" => format!("{}.trim().parse::<i64>().unwrap()", atom(&arg(self, 0))),
            "stod" | "stof" | "atof" => format!("{}.trim().parse::<f64>().unwrap()", atom(&arg(self, 0))),
            "max" | "min" if args.len() == 2 => {
                let is_float = args
                    .iter()
                    .any(|a| self.type_of(a).is_some_and(|t| matches!(t.without_reference().kind, TypeKind::Float)));
                if is_float {
                    let (a, b) = (float_arg(self, 0), float_arg(self, 1));
                    format!("{}.{short}({b})", atom(&a))
                } else {
                    let ty = self.type_of(&args[0]).map(|t| t.without_reference().clone());
                    let (a, b) = match ty {
                        Some(t) if t.is_primitive() => (self.coerce(&args[0], &t), self.coerce(&args[1], &t)),
                        _ => (arg(self, 0), arg(self, 1)),
                    };
                    format!("std::cmp::{short}({a}, {b})")
                }
            }
            "abs" | "fabs" => format!("{}.abs()", atom(&arg(self, 0))),
            "sqrt" | "sin" | "cos" | "tan" | "exp" | "floor" | "ceil" | "round" => {
                format!("{}.{short}()", atom(&float_arg(self, 0)))
            }
            "log" => format!("{}.ln()", atom(&float_arg(self, 0))),
            "pow" => format!("{}.powf({})", atom(&float_arg(self, 0)), float_arg(self, 1)),
            "swap" if args.len() == 2 => {
                let a = self.receiver(&args[0]);
                let b = self.receiver(&args[1]);
                format!("std::mem::swap(&mut {a}, &mut {b})")
            }
            "make_unique" | "make_shared" => {
                let inner = targs.first().map(|t| resolve_type(t))?;
                let value = self.construct(&inner, args);
                if short == "make_shared" {
                    self.imports.insert("std::rc::Rc");
                    format!("Rc::new({value})")
                } else {
                    format!("Box::new({value})")
                }
            }
            "make_pair" | "make_tuple" | "tie" => {
                let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("({})", values.join(", "))
            }
            "get" if targs.len() == 1 => format!("{}.{}", atom(&self.receiver(args.first()?)), targs[0]),
            "sort" | "stable_sort" => self.sort_call(args)?,
            "reverse" => format!("{}.reverse()", self.range_owner(args.first()?)?),
            "accumulate" if args.len() >= 3 => {
                let owner = self.range_owner(&args[0])?;
                let init = self.expr(&args[2]);
                format!("{owner}.iter().fold({init}, |acc, x| acc + x)")
            }
            "count" if args.len() == 3 => {
                let owner = self.range_owner(&args[0])?;
                let needle = self.expr(&args[2]);
                format!("{owner}.iter().filter(|x| **x == {needle}).count()")
            }
            "this_thread::sleep_for" => format!("std::thread::sleep({})", arg(self, 0)),
            "this_thread::yield" => "std::thread::yield_now()".to_string(),
            "this_thread::get_id" => "std::thread::current().id()".to_string(),
            "chrono::milliseconds" => self.duration("from_millis", args),
            "chrono::seconds" => self.duration("from_secs", args),
            "chrono::microseconds" => self.duration("from_micros", args),
            "chrono::nanoseconds" => self.duration("from_nanos", args),
            "chrono::steady_clock::now" | "chrono::high_resolution_clock::now" | "chrono::system_clock::now" => {
                "std::time::Instant::now()".to_string()
            }
            "async" => self.async_task(args)?,
            "exit" => format!("std::process::exit({})", arg(self, 0)),
            "abort" => "std::process::abort()".to_string(),
            "assert" => format!("assert!({})", self.condition(args.first()?)),
            "printf" => self.printf(args)?,
            "ref" | "cref" => arg(self, 0),
            "thread" => {
                let (f, rest) = args.split_first()?;
                self.spawn(f, rest)
            }
            _ => return None,
        })
    }

    /// The container a `begin()`/`end()` pair ranges over.
    fn range_owner(&mut self, begin: &Expr) -> Option<String> {
        let (owner, method, _) = begin.unparen().method_call()?;
        matches!(method, "begin" | "cbegin" | "rbegin").then(|| self.receiver(owner))
    }

    fn sort_call(&mut self, args: &[Expr]) -> Option<String> {
        let owner_expr = args.first()?.unparen().method_call()?.0.clone();
        let owner = self.range_owner(args.first()?)?;
        let floats = self.type_of(&owner_expr).is_some_and(|t| {
            t.without_reference()
                .args()
                .first()
                .is_some_and(|e| matches!(e.kind, TypeKind::Float))
        });
        Some(match args.get(2) {
            Some(cmp) => {
                let cmp = self.expr(cmp);
                format!(
                    "{owner}.sort_by(|a, b| if ({cmp})(a, b) {{ std::cmp::Ordering::Less }} else {{ std::cmp::Ordering::Greater }})"
                )
            }
            None if floats => format!("{owner}.sort_by(|a, b| a.partial_cmp(b).unwrap())"),
            None => format!("{owner}.sort()"),
        })
    }

    fn duration(&mut self, constructor: &str, args: &[Expr]) -> String {
        let value = match args.first() {
            Some(a) => self.coerce(a, &Type::integer("unsigned long")),
            None => "0".to_string(),
        };
        format!("std::time::Duration::{constructor}({value})")
    }

    /// `std::async(policy, f, args...)` runs `f` on tokio's blocking pool.
    fn async_task(&mut self, args: &[Expr]) -> Option<String> {
        let args = match args.first().map(Expr::unparen) {
            Some(Expr::Name(n)) if n.contains("launch::") => &args[1..],
            Some(Expr::Binary { .. }) => &args[1..],
            _ => args,
        };
        let (f, rest) = args.split_first()?;
        let body = self.invocation(f, rest);
        Some(format!("tokio::task::spawn_blocking(move || {body})"))
    }

    /// `f(args)` for a callable in thread and task constructors.
    fn invocation(&mut self, f: &Expr, args: &[Expr]) -> String {
        match f.unparen() {
            Expr::Lambda(l) if l.params.is_empty() => {
                self.closure_depth += 1;
                let body = match l.single_return() {
                    Some(e) => self.expr(e),
                    None => {
                        self.closure_depth -= 1;
                        let text = self.closure_body(&l.body);
                        self.closure_depth += 1;
                        format!("{{\n{}\n}}", indent(&text))
                    }
                };
                self.closure_depth -= 1;
                body
            }
            Expr::Name(name) => self.named_call(name, &[], args),
            other => {
                let callee = self.expr(other);
                let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("({callee})({})", values.join(", "))
            }
        }
    }

    /// `std::thread(f, args...)` as a spawned closure.
    pub(super) fn spawn(&mut self, f: &Expr, args: &[Expr]) -> String {
        if let Expr::Unary {
            op: UnaryOp::AddrOf,
            operand,
        } = f.unparen()
        {
            if let Expr::Name(member) = operand.unparen() {
                if member.contains("::") {
                    self.gap(format!("a thread running the member function `{member}`"));
                    return format!(
                        "std::thread::spawn(|| unimplemented!(\"thread running `{member}`\"))"
                    );
                }
            }
        }
        if let Expr::Lambda(l) = f.unparen() {
            let uses_this = l.captures.contains("this")
                || crate::lower::ast::any_expr(&l.body, &mut |e| matches!(e, Expr::This));
            if uses_this {
                self.gap("a thread whose closure captures `this`");
                return "std::thread::spawn(|| unimplemented!(\"thread capturing `this`\"))".to_string();
            }
        }
        let body = self.invocation(f, args);
        format!("std::thread::spawn(move || {body})")
    }

    /// C `printf` as `print!`.
    fn printf(&mut self, args: &[Expr]) -> Option<String> {
        let Expr::Str(format) = args.first()?.unparen() else {
            return None;
        };
        let mut out = String::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push_str(&escape_braces(&c.to_string()));
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }
            let mut spec = String::new();
            while let Some(&n) = chars.peek() {
                chars.next();
                if n.is_ascii_alphabetic() && !matches!(n, 'l' | 'h' | 'z') {
                    spec.push(n);
                    break;
                }
                spec.push(n);
            }
            let precision = spec
                .split_once('.')
                .map(|(_, p)| p.trim_end_matches(|c: char| c.is_ascii_alphabetic()).to_string());
            match precision {
                Some(p) if !p.is_empty() => out.push_str(&format!("{{:.{p}}}")),
                _ => out.push_str("{}"),
            }
        }
        let values: Vec<String> = args[1..].iter().map(|a| self.expr(a)).collect();
        Some(if values.is_empty() {
            format!("print!(\"{out}\")")
        } else {
            format!("print!(\"{out}\", {})", values.join(", "))
        })
    }

    // ========================================================================
    // Method calls
    // ========================================================================

    fn method_call(&mut self, base: &Expr, name: &str, arrow: bool, args: &[Expr]) -> String {
        if let Expr::Name(var) = base.unparen() {
            if let Some(alias) = self.aliases.get(&format!("{var}.{name}")) {
                return alias.clone();
            }
        }
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        if let Some(ty) = &base_ty {
            if let Some(text) = self.typed_method(base, ty, name, arrow, args) {
                return text;
            }
        }
        if self.caught.iter().any(|c| matches!(base.unparen(), Expr::Name(n) if n == c)) && name == "what" {
            return format!("{}.to_string()", self.expr(base));
        }
        if matches!(base.unparen(), Expr::Name(n) if self.locals.get(n).is_some_and(|t| t.name == "std::exception"))
            && name == "what"
        {
            return format!("{}.to_string()", self.expr(base));
        }
        let recv = self.receiver(base);
        let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        let ident = crate::naming::operator_method(name)
            .map(str::to_string)
            .unwrap_or_else(|| rust_ident(name));
        format!("{recv}.{ident}({})", values.join(", "))
    }

    fn typed_method(
        &mut self,
        base: &Expr,
        ty: &Type,
        name: &str,
        arrow: bool,
        args: &[Expr],
    ) -> Option<String> {
        match &ty.kind {
            TypeKind::Threading { kind, args: targs } => self.threading_method(base, *kind, targs, name, args),
            TypeKind::Async { kind, .. } => self.async_method(base, *kind, name),
            TypeKind::Container { kind, args: targs } => {
                self.container_method(base, *kind, targs, name, args)
            }
            TypeKind::Pointer { pointee, ownership } => {
                match (ownership, name) {
                    (Ownership::Shared, "use_count") => {
                        self.imports.insert("std::rc::Rc");
                        return Some(format!("Rc::strong_count(&{})", self.receiver(base)));
                    }
                    (Ownership::Weak, "lock") => {
                        return Some(format!("{}.upgrade()", self.receiver(base)));
                    }
                    (Ownership::Unique | Ownership::Shared, "get") if !arrow => {
                        return Some(format!("&*{}", self.receiver(base)));
                    }
                    _ => {}
                }
                let raw = *ownership == Ownership::Raw && arrow;
                if raw {
                    let text = self.user_method(base, pointee, name, args, true)?;
                    self.raw_deref = true;
                    return Some(format!("unsafe {{ {text} }}"));
                }
                self.user_method(base, pointee, name, args, false)
            }
            TypeKind::Struct | TypeKind::Class => self.user_method(base, ty, name, args, false),
            _ => None,
        }
    }

    fn user_method(
        &mut self,
        base: &Expr,
        owner: &Type,
        name: &str,
        args: &[Expr],
        raw: bool,
    ) -> Option<String> {
        let class = self.unit.facts.class(&owner.name)?;
        let (decl, methods) = self.method_owner(class, name)?;
        let ordinal = self.unit.facts.select_overload(Some(&decl.name), name, args.len());
        let m = methods.get(ordinal - 1).copied().or_else(|| methods.first().copied())?;
        let ident = self.unit.method_ident(Some(decl), m);
        let values = self.args_for(&m.params, args);
        let recv = if raw {
            format!("(*{})", atom(&self.expr(base)))
        } else {
            self.receiver(base)
        };
        let fallible = self.unit.method_fallible(&decl.name, name);
        if m.is_static {
            let call = format!("{}::{ident}({})", self.unit.type_name(decl), values.join(", "));
            return Some(self.finish_call(call, fallible, m.is_async()));
        }
        let call = format!("{recv}.{ident}({})", values.join(", "));
        Some(self.finish_call(call, fallible, m.is_async()))
    }

    /// The class declaring `method`, searching `class` and then its data
    /// bases.
    fn method_owner(&self, class: &'u ClassDecl, method: &str) -> Option<(&'u ClassDecl, Vec<&'u Function>)> {
        let mut at = class;
        loop {
            let own: Vec<&Function> = at
                .methods
                .iter()
                .filter(|m| m.name == method && !m.is_constructor)
                .collect();
            if !own.is_empty() {
                return Some((at, own));
            }
            let base = self.unit.hierarchy.data_base(&at.name)?;
            at = self.unit.facts.class(&base.name)?;
        }
    }

    fn threading_method(
        &mut self,
        base: &Expr,
        kind: ThreadingKind,
        targs: &[Type],
        name: &str,
        args: &[Expr],
    ) -> Option<String> {
        let recv = self.receiver(base);
        let value_ty = targs.first().cloned().unwrap_or_else(|| Type::integer("int"));
        let value = |this: &mut Self, i: usize| match args.get(i) {
            Some(a) => this.coerce(a, &value_ty),
            None => String::new(),
        };
        let ordering = |this: &mut Self| {
            this.imports.insert("std::sync::atomic::Ordering");
            "Ordering::SeqCst"
        };
        Some(match (kind, name) {
            (ThreadingKind::Atomic, "load") => format!("{recv}.load({})", ordering(self)),
            (ThreadingKind::Atomic, "store") => {
                let v = value(self, 0);
                format!("{recv}.store({v}, {})", ordering(self))
            }
            (ThreadingKind::Atomic, "exchange") => {
                let v = value(self, 0);
                format!("{recv}.swap({v}, {})", ordering(self))
            }
            (ThreadingKind::Atomic, "fetch_add" | "fetch_sub" | "fetch_and" | "fetch_or" | "fetch_xor") => {
                let v = value(self, 0);
                format!("{recv}.{name}({v}, {})", ordering(self))
            }
            (ThreadingKind::Atomic, "compare_exchange_strong" | "compare_exchange_weak") => {
                let expected = value(self, 0);
                let desired = value(self, 1);
                let o = ordering(self);
                format!("{recv}.compare_exchange({expected}, {desired}, {o}, {o}).is_ok()")
            }
            (k, "lock") if k.is_mutex() => format!("{recv}.lock().unwrap()"),
            (k, "try_lock") if k.is_mutex() => format!("{recv}.try_lock().is_ok()"),
            (ThreadingKind::ConditionVariable, "notify_one" | "notify_all") => format!("{recv}.{name}()"),
            (ThreadingKind::Thread | ThreadingKind::JThread, "joinable") => {
                let is_handle = matches!(base.unparen(), Expr::Name(n) if self.handles.contains(n));
                if is_handle {
                    format!("!{recv}.is_finished()")
                } else {
                    format!("{recv}.is_some()")
                }
            }
            (ThreadingKind::Thread | ThreadingKind::JThread, "get_id") => {
                format!("{recv}.as_ref().map(|h| h.thread().id())")
            }
            _ => return None,
        })
    }

    fn async_method(&mut self, base: &Expr, kind: AsyncKind, name: &str) -> Option<String> {
        let recv = self.receiver(base);
        let from_promise = recv.ends_with("_rx");
        Some(match (kind, name) {
            (AsyncKind::Future | AsyncKind::SharedFuture, "get") => {
                if self.site.is_async && self.closure_depth == 0 {
                    format!("{recv}.await.unwrap()")
                } else if from_promise {
                    format!("{recv}.blocking_recv().unwrap()")
                } else {
                    format!("tokio::runtime::Runtime::new().unwrap().block_on({recv}).unwrap()")
                }
            }
            (AsyncKind::Future | AsyncKind::SharedFuture, "valid") => "true".to_string(),
            (AsyncKind::Future | AsyncKind::SharedFuture, "wait") => {
                self.gap("`wait` on a future");
                "()".to_string()
            }
            _ => return None,
        })
    }

    fn container_method(
        &mut self,
        base: &Expr,
        kind: ContainerKind,
        targs: &[Type],
        name: &str,
        args: &[Expr],
    ) -> Option<String> {
        let recv = self.receiver(base);
        let element = targs.first().cloned();
        let value_at = |this: &mut Self, i: usize, ty: Option<&Type>| match (args.get(i), ty) {
            (Some(a), Some(t)) => this.coerce(a, t),
            (Some(a), None) => this.expr(a),
            (None, _) => String::new(),
        };
        let is_string = matches!(kind, ContainerKind::String | ContainerKind::StringView);
        let is_map = matches!(kind, ContainerKind::Map | ContainerKind::UnorderedMap);
        let is_set = matches!(kind, ContainerKind::Set | ContainerKind::UnorderedSet);
        let copy_element = element.as_ref().is_some_and(Type::is_primitive);
        Some(match name {
            "size" | "length" => format!("{recv}.len()"),
            "empty" => format!("{recv}.is_empty()"),
            "clear" => format!("{recv}.clear()"),
            "push_back" | "emplace_back" if is_string => {
                let c = self.expr(args.first()?);
                format!("{recv}.push({} as u8 as char)", atom(&c))
            }
            "push_back" | "emplace_back" => {
                let v = if name == "emplace_back" && args.len() != 1 {
                    let ty = element.clone()?;
                    self.construct(&ty, args)
                } else {
                    value_at(self, 0, element.as_ref())
                };
                let method = match kind {
                    ContainerKind::Deque | ContainerKind::List => "push_back",
                    _ => "push",
                };
                format!("{recv}.{method}({v})")
            }
            "push_front" | "emplace_front" => {
                let v = value_at(self, 0, element.as_ref());
                format!("{recv}.push_front({v})")
            }
            "push" | "emplace" if !is_map && !is_set => {
                let v = value_at(self, 0, element.as_ref());
                format!("{recv}.push({v})")
            }
            "pop_back" | "pop" => format!("{recv}.pop()"),
            "pop_front" => format!("{recv}.pop_front()"),
            "front" | "back" | "top" => {
                let method = if name == "front" { "first" } else { "last" };
                let method = match (kind, method) {
                    (ContainerKind::Deque | ContainerKind::List, "first") => "front",
                    (ContainerKind::Deque | ContainerKind::List, _) => "back",
                    (_, m) => m,
                };
                if copy_element {
                    format!("*{recv}.{method}().unwrap()")
                } else {
                    format!("{recv}.{method}().unwrap()")
                }
            }
            "at" if is_map => {
                let k = self.expr(args.first()?);
                format!("{recv}[&{}]", atom(&k))
            }
            "at" => {
                let i = self.index_value(args.first()?);
                if is_string {
                    format!("({recv}.as_bytes()[{i}] as i8)")
                } else {
                    format!("{recv}[{i}]")
                }
            }
            "insert" | "emplace" if is_map => match args {
                [pair] => match pair.unparen() {
                    Expr::List { items, .. } if items.len() == 2 => {
                        let key = self.coerce(&items[0], targs.first()?);
                        let value = self.coerce(&items[1], targs.get(1)?);
                        format!("{recv}.insert({key}, {value})")
                    }
                    Expr::Call { args: kv, .. } if kv.len() == 2 => {
                        let key = self.coerce(&kv[0], targs.first()?);
                        let value = self.coerce(&kv[1], targs.get(1)?);
                        format!("{recv}.insert({key}, {value})")
                    }
                    _ => return None,
                },
                [k, v] => {
                    let key = self.coerce(k, targs.first()?);
                    let value = self.coerce(v, targs.get(1)?);
                    format!("{recv}.insert({key}, {value})")
                }
                _ => return None,
            },
            "insert" | "emplace" if is_set => {
                let v = value_at(self, 0, element.as_ref());
                format!("{recv}.insert({v})")
            }
            "erase" if is_map || is_set => {
                let k = self.expr(args.first()?);
                format!("{recv}.remove(&{})", atom(&k))
            }
            "count" if is_map => {
                let k = self.expr(args.first()?);
                format!("usize::from({recv}.contains_key(&{}))", atom(&k))
            }
            "count" if is_set => {
                let k = self.expr(args.first()?);
                format!("usize::from({recv}.contains(&{}))", atom(&k))
            }
            "contains" if is_map => {
                let k = self.expr(args.first()?);
                format!("{recv}.contains_key(&{})", atom(&k))
            }
            "contains" => {
                let k = self.expr(args.first()?);
                format!("{recv}.contains(&{})", atom(&k))
            }
            "find" if is_string => {
                let needle = match args.first()?.unparen() {
                    Expr::Char(c) => c.clone(),
                    Expr::Str(s) => format!("\"{s}\""),
                    other => format!("{}.as_str()", atom(&self.receiver(other))),
                };
                format!("{recv}.find({needle}).unwrap_or(usize::MAX)")
            }
            "substr" if is_string => {
                let start = match args.first() {
                    Some(a) => self.index_value(a),
                    None => "0".to_string(),
                };
                match args.get(1) {
                    Some(len) => {
                        let len = self.index_value(len);
                        format!("{recv}[{start}..{start} + {len}].to_string()")
                    }
                    None => format!("{recv}[{start}..].to_string()"),
                }
            }
            "c_str" | "data" if is_string => format!("{recv}.as_str()"),
            "append" if is_string => {
                let v = self.expr(args.first()?);
                match args.first()?.unparen() {
                    Expr::Str(_) => format!("{recv}.push_str({v})"),
                    _ => format!("{recv}.push_str(&{})", atom(&v)),
                }
            }
            "reserve" => {
                let n = self.index_value(args.first()?);
                format!("{recv}.reserve({n})")
            }
            "resize" => {
                let n = self.index_value(args.first()?);
                let fill = match (args.get(1), element.as_ref()) {
                    (Some(v), Some(t)) => self.coerce(v, t),
                    (None, Some(t)) => self.default_value(t),
                    _ => "Default::default()".to_string(),
                };
                format!("{recv}.resize({n}, {fill})")
            }
            "has_value" => format!("{recv}.is_some()"),
            "value" => {
                if copy_element {
                    format!("{recv}.unwrap()")
                } else {
                    format!("{recv}.as_ref().unwrap()")
                }
            }
            "value_or" => {
                let d = value_at(self, 0, element.as_ref());
                if copy_element {
                    format!("{recv}.unwrap_or({d})")
                } else {
                    format!("{recv}.clone().unwrap_or({d})")
                }
            }
            "reset" if kind == ContainerKind::Optional => format!("{recv} = None"),
            "begin" | "cbegin" => format!("{recv}.iter()"),
            "end" | "cend" => format!("{recv}.iter().skip({recv}.len())"),
            _ => return None,
        })
    }
}

/// `std::numeric_limits<T>::max` and friends.
fn numeric_limit(name: &str) -> Option<String> {
    let rest = name
        .strip_prefix("std::numeric_limits<")
        .or_else(|| name.strip_prefix("numeric_limits<"))?;
    let (ty, member) = rest.rsplit_once(">::")?;
    let token = rust_token(ty.trim());
    Some(match member {
        "max" => format!("{token}::MAX"),
        "min" if token.starts_with('f') => format!("{token}::MIN_POSITIVE"),
        "min" | "lowest" => format!("{token}::MIN"),
        "epsilon" => format!("{token}::EPSILON"),
        "infinity" => format!("{token}::INFINITY"),
        _ => return None,
    })
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("    {l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::super::body::is_string_type;
    use super::*;

    #[test]
    fn numeric_limits_map_to_associated_constants() {
        assert_eq!(numeric_limit("std::numeric_limits<int>::max").as_deref(), Some("i32::MAX"));
        assert_eq!(numeric_limit("std::numeric_limits<double>::min").as_deref(), Some("f64::MIN_POSITIVE"));
        assert_eq!(numeric_limit("std::numeric_limits<long>::lowest").as_deref(), Some("i64::MIN"));
        assert_eq!(numeric_limit("std::max"), None);
    }

    #[test]
    fn closure_bodies_indent() {
        assert_eq!(indent("a;\n\nb;"), "    a;\n\n    b;");
    }

    #[test]
    fn strings_are_recognized() {
        assert!(is_string_type(&Type::string()));
        assert!(!is_string_type(&Type::integer("int")));
    }
}
