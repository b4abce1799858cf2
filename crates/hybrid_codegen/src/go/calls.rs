//! Call lowering for Go: the standard library, container and threading
//! methods, user calls with overloads and defaults, goroutines.

use hybrid_common::to_pascal_case;
use hybrid_cpp_parser::resolve_type;
use hybrid_ir::type_map::go_token;
use hybrid_ir::{
    AsyncKind, ClassDecl, ContainerKind, Function, Ownership, Parameter, ThreadingKind, Type,
    TypeKind,
};

use super::body::{atom, go_string, indent_lines, FnScope, GoLowering};
use crate::lower::{parse_expression, BinOp, Expr, Stmt, UnaryOp};
use crate::naming::{go_local, simple_name};

impl<'u> GoLowering<'u> {
    /// A call expression.
    pub(super) fn call(&mut self, callee: &Expr, args: &[Expr]) -> String {
        match callee.unparen() {
            Expr::Member { base, name, arrow } => self.method_call(base, name, *arrow, args),
            Expr::Name(name) => self.named_call(name, &[], args),
            Expr::Template { name, args: targs } => self.named_call(name, targs, args),
            other => {
                let f = self.expr(other);
                let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                let f = if matches!(other, Expr::Lambda(_)) { f } else { atom(&f) };
                format!("{f}({})", values.join(", "))
            }
        }
    }

    /// Hoists a call that returns an `error` so the value can be used.
    fn finish_call(&mut self, call: String, fallible: bool, has_value: bool) -> String {
        if fallible {
            self.hoist(call, has_value)
        } else {
            call
        }
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
            return format!("{}({})", go_local(name), values.join(", "));
        }
        if let Some(class) = self
            .unit
            .facts
            .class(name)
            .filter(|c| simple_name(name) == simple_name(&c.name))
        {
            let ty = if targs.is_empty() {
                Type::class(class.name.clone())
            } else {
                resolve_type(&format!("{}<{}>", class.name, targs.join(", ")))
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
        let candidates: Vec<&Function> = self
            .unit
            .ir
            .functions
            .iter()
            .filter(|f| f.name == name)
            .collect();
        if let Some(&first) = candidates.first() {
            let ordinal = self.unit.facts.select_overload(None, name, args.len());
            let f = candidates.get(ordinal - 1).copied().unwrap_or(first);
            let ident = self.unit.free_ident(name, ordinal);
            let generic = if targs.is_empty() {
                String::new()
            } else {
                let types: Vec<String> = targs.iter().map(|t| self.go_type(&resolve_type(t))).collect();
                format!("[{}]", types.join(", "))
            };
            let values = self.args_for(&f.params, args);
            let call = format!("{ident}{generic}({})", values.join(", "));
            let fallible = self.unit.facts.is_fallible(None, f);
            return self.finish_call(call, fallible, returns_value(f));
        }
        let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        format!("{}({})", simple_name(name), values.join(", "))
    }

    /// `Base::method(...)` from a derived class and `Class::static_fn(...)`.
    fn qualified_call(&mut self, owner: &str, method: &str, args: &[Expr]) -> Option<String> {
        let class = self.unit.facts.class(owner)?;
        let m = class.methods.iter().find(|m| m.name == method)?;
        let values = self.args_for(&m.params, args);
        let fallible = self.unit.method_fallible(&class.name, method);
        if m.is_static {
            let call = format!("{}({})", self.unit.static_ident(class, m), values.join(", "));
            return Some(self.finish_call(call, fallible, returns_value(m)));
        }
        let ident = self.unit.method_ident(Some(class), m);
        let current = self.site.class?;
        let mut path = String::new();
        let mut at = current.name.clone();
        while at != class.name {
            let base = self.unit.hierarchy.data_base(&at)?;
            path.push('.');
            path.push_str(simple_name(&base.name));
            at = base.name.clone();
        }
        let call = format!("{}{path}.{ident}({})", self.site.receiver, values.join(", "));
        Some(self.finish_call(call, fallible, returns_value(m)))
    }

    /// Calls into the C and C++ standard libraries.
    fn std_call(&mut self, name: &str, targs: &[String], args: &[Expr]) -> Option<String> {
        let short = name.strip_prefix("std::").unwrap_or(name);
        if let Some(limit) = numeric_limit(name) {
            self.imports.insert("math");
            return Some(limit);
        }
        let arg = |this: &mut Self, i: usize| args.get(i).map_or_else(String::new, |a| this.expr(a));
        let float_arg = |this: &mut Self, i: usize| match args.get(i) {
            Some(a) => this.coerce(a, &Type::float("double")),
            None => String::new(),
        };
        let parse = |this: &mut Self, f: &str, go_ty: &str| {
            this.imports.insert("strconv");
            this.imports.insert("strings");
            let s = arg(this, 0);
            format!(
                "func() {go_ty} {{\n\tv, _ := strconv.{f}(strings.TrimSpace({s}))\n\treturn {go_ty}(v)\n}}()"
            )
        };
        Some(match short {
            "move" | "forward" | "ref" | "cref" => arg(self, 0),
            "to_string" => {
                self.imports.insert("fmt");
                let is_float = args.first().and_then(|a| self.type_of(a)).is_some_and(|t| {
                    matches!(t.without_reference().kind, TypeKind::Float)
                });
                let v = arg(self, 0);
                if is_float {
                    format!("fmt.Sprintf(\"%f\", {v})")
                } else {
                    format!("fmt.Sprint({v})")
                }
            }
            "stoi" | "atoi" => parse(self, "Atoi", "int32"),
            "stol" | "stoll" | "atol" => {
                self.imports.insert("strconv");
                self.imports.insert("strings");
                let s = arg(self, 0);
                format!("func() int64 {{\n\tv, _ := strconv.ParseInt(strings.TrimSpace({s}), 10, 64)\n\treturn v\n}}()")
            }
            "stod" | "stof" | "atof" => {
                self.imports.insert("strconv");
                self.imports.insert("strings");
                let s = arg(self, 0);
                format!("func() float64 {{\n\tv, _ := strconv.ParseFloat(strings.TrimSpace({s}), 64)\n\treturn v\n}}()")
            }
            "max" | "min" if args.len() == 2 => {
                let ty = args
                    .iter()
                    .filter_map(|a| self.type_of(a))
                    .map(|t| t.without_reference().clone())
                    .max_by_key(|t| matches!(t.kind, TypeKind::Float));
                let (a, b) = match ty {
                    Some(t) if t.is_primitive() => (self.coerce(&args[0], &t), self.coerce(&args[1], &t)),
                    _ => (arg(self, 0), arg(self, 1)),
                };
                format!("{short}({a}, {b})")
            }
            "abs" | "fabs" => {
                self.imports.insert("math");
                let ty = args.first().and_then(|a| self.type_of(a)).map(|t| t.without_reference().clone());
                match ty {
                    Some(t) if matches!(t.kind, TypeKind::Integer) => {
                        let v = arg(self, 0);
                        format!("{}(math.Abs(float64({v})))", go_token(&t.name))
                    }
                    _ => format!("math.Abs({})", float_arg(self, 0)),
                }
            }
            "sqrt" | "sin" | "cos" | "tan" | "exp" | "floor" | "ceil" | "round" | "log"
            | "log2" | "log10" | "cbrt" | "trunc" => {
                self.imports.insert("math");
                format!("math.{}({})", to_pascal_case(short), float_arg(self, 0))
            }
            "pow" | "hypot" | "atan2" | "fmod" => {
                self.imports.insert("math");
                let f = match short {
                    "fmod" => "Mod".to_string(),
                    other => to_pascal_case(other),
                };
                format!("math.{f}({}, {})", float_arg(self, 0), float_arg(self, 1))
            }
            "swap" if args.len() == 2 => {
                let a = self.place(&args[0]);
                let b = self.place(&args[1]);
                format!("func() {{\n\t{a}, {b} = {b}, {a}\n}}()")
            }
            "make_unique" | "make_shared" => {
                let inner = resolve_type(targs.first()?);
                self.new_value(&inner, args, false)
            }
            "make_pair" | "make_tuple" | "tie" => {
                let types: Vec<String> = args
                    .iter()
                    .map(|a| {
                        self.type_of(a)
                            .map_or_else(|| "auto".to_string(), |t| t.without_reference().spelling())
                    })
                    .collect();
                let template = if short == "make_pair" { "std::pair" } else { "std::tuple" };
                let ty = resolve_type(&format!("{template}<{}>", types.join(", ")));
                self.list_value(&ty, args)
            }
            "get" if targs.len() == 1 => {
                let owner = args.first()?;
                let is_pair = self.type_of(owner).is_some_and(|t| {
                    matches!(
                        t.without_reference().kind,
                        TypeKind::Container {
                            kind: ContainerKind::Pair,
                            ..
                        }
                    )
                });
                let recv = self.receiver(owner);
                match (is_pair, targs[0].trim()) {
                    (true, "0") => format!("{recv}.First"),
                    (true, _) => format!("{recv}.Second"),
                    (false, n) => format!("{recv}.F{n}"),
                }
            }
            "sort" | "stable_sort" => self.sort_call(short == "stable_sort", args)?,
            "reverse" => {
                self.imports.insert("slices");
                format!("slices.Reverse({})", self.range_owner(args.first()?)?)
            }
            "accumulate" if args.len() >= 3 => {
                let owner = self.range_owner(&args[0])?;
                let init_ty = self.type_of(&args[2]).map(|t| t.without_reference().clone());
                let go_ty = match &init_ty {
                    Some(t) => self.go_type(t),
                    None => "int32".to_string(),
                };
                let init = self.expr(&args[2]);
                let acc = self.temp("acc");
                format!(
                    "func() {go_ty} {{\n\t{acc} := {init}\n\tfor _, x := range {owner} {{\n\t\t{acc} += {go_ty}(x)\n\t}}\n\treturn {acc}\n}}()"
                )
            }
            "count" if args.len() == 3 => {
                let owner = self.range_owner(&args[0])?;
                let needle = self.expr(&args[2]);
                let n = self.temp("n");
                format!(
                    "func() int {{\n\t{n} := 0\n\tfor _, x := range {owner} {{\n\t\tif x == {needle} {{\n\t\t\t{n}++\n\t\t}}\n\t}}\n\treturn {n}\n}}()"
                )
            }
            "this_thread::sleep_for" => {
                self.imports.insert("time");
                format!("time.Sleep({})", arg(self, 0))
            }
            "this_thread::yield" => {
                self.imports.insert("runtime");
                "runtime.Gosched()".to_string()
            }
            "chrono::milliseconds" => self.duration("Millisecond", args),
            "chrono::seconds" => self.duration("Second", args),
            "chrono::microseconds" => self.duration("Microsecond", args),
            "chrono::nanoseconds" => self.duration("Nanosecond", args),
            "chrono::steady_clock::now" | "chrono::high_resolution_clock::now" | "chrono::system_clock::now" => {
                self.imports.insert("time");
                "time.Now()".to_string()
            }
            "async" => self.async_task(args)?,
            "exit" => {
                self.imports.insert("os");
                let code = match args.first() {
                    Some(a) => self.coerce(a, &Type::integer("ptrdiff_t")),
                    None => "0".to_string(),
                };
                format!("os.Exit({code})")
            }
            "abort" => "panic(\"abort\")".to_string(),
            "printf" => self.printf(args)?,
            _ => return None,
        })
    }

    /// The container a `begin()`/`end()` pair ranges over.
    fn range_owner(&mut self, begin: &Expr) -> Option<String> {
        let (owner, method, _) = begin.unparen().method_call()?;
        matches!(method, "begin" | "cbegin").then(|| self.container(owner))
    }

    fn sort_call(&mut self, stable: bool, args: &[Expr]) -> Option<String> {
        let owner_expr = args.first()?.unparen().method_call()?.0.clone();
        let owner = self.range_owner(args.first()?)?;
        let Some(cmp) = args.get(2) else {
            self.imports.insert("slices");
            return Some(format!("slices.Sort({owner})"));
        };
        let element = self
            .type_of(&owner_expr)
            .and_then(|t| t.without_reference().args().first().cloned())
            .unwrap_or_else(|| Type::class("auto"));
        self.lambda_hint = Some(Type::new(
            "std::function",
            TypeKind::Function {
                ret: Box::new(Type::bool()),
                params: vec![element.clone(), element],
                erased: true,
            },
        ));
        let f = self.expr(cmp);
        self.lambda_hint = None;
        self.imports.insert("sort");
        let sorter = if stable { "SliceStable" } else { "Slice" };
        Some(format!(
            "sort.{sorter}({owner}, func(i, j int) bool {{\n\treturn {}({owner}[i], {owner}[j])\n}})",
            atom(&f)
        ))
    }

    fn duration(&mut self, unit: &str, args: &[Expr]) -> String {
        self.imports.insert("time");
        match args.first() {
            Some(a) => {
                let v = self.expr(a);
                format!("time.Duration({v}) * time.{unit}")
            }
            None => "0".to_string(),
        }
    }

    /// `std::async(policy, f, args...)` as a goroutine feeding a buffered
    /// channel.
    fn async_task(&mut self, args: &[Expr]) -> Option<String> {
        let args = match args.first().map(Expr::unparen) {
            Some(Expr::Name(n)) if n.contains("launch::") => &args[1..],
            Some(Expr::Binary { .. }) => &args[1..],
            _ => args,
        };
        let (f, rest) = args.split_first()?;
        let call = Expr::Call {
            callee: Box::new(f.clone()),
            args: rest.to_vec(),
        };
        let value_ty = self
            .type_of(&call)
            .map(|t| t.without_reference().clone())
            .filter(|t| !t.is_void());
        let ch = self.temp("ch");
        let (elem, body) = match value_ty {
            Some(t) => {
                let elem = self.go_type(&t);
                let body = match self.inline(|this| this.coerce(&call, &t)) {
                    Some(v) => format!("{ch} <- {v}"),
                    None => {
                        let text = self.closure_body(&[Stmt::Return(Some(call))], FnScope::Lambda(Some(t)));
                        format!("{ch} <- func() {elem} {{\n{}\n}}()", indent_lines(&text))
                    }
                };
                (elem, body)
            }
            None => {
                let text = self.closure_body(&[Stmt::Expr(call)], FnScope::Goroutine);
                ("struct{}".to_string(), format!("{text}\n{ch} <- struct{{}}{{}}"))
            }
        };
        Some(format!(
            "func() <-chan {elem} {{\n\t{ch} := make(chan {elem}, 1)\n\tgo func() {{\n{}\n\t}}()\n\treturn {ch}\n}}()",
            indent_lines(&indent_lines(&body))
        ))
    }

    /// `group.Add(1)` and a goroutine running `f(args)`, marked done on
    /// exit.
    pub(super) fn spawn(&mut self, group: &str, f: &Expr, args: &[Expr]) -> String {
        let body = match f.unparen() {
            Expr::Lambda(l) if l.params.is_empty() => {
                self.closure_body(&l.body, FnScope::Goroutine)
            }
            Expr::Unary {
                op: UnaryOp::AddrOf,
                operand,
            } => match (operand.unparen(), args.split_first()) {
                (Expr::Name(member), Some((object, rest))) if member.contains("::") => {
                    let method = member.rsplit_once("::").map_or(member.as_str(), |(_, m)| m);
                    let call = Expr::Call {
                        callee: Box::new(Expr::Member {
                            base: Box::new(object.clone()),
                            name: method.to_string(),
                            arrow: true,
                        }),
                        args: rest.to_vec(),
                    };
                    self.closure_body(&[Stmt::Expr(call)], FnScope::Goroutine)
                }
                _ => {
                    let call = Expr::Call {
                        callee: Box::new(operand.as_ref().clone()),
                        args: args.to_vec(),
                    };
                    self.closure_body(&[Stmt::Expr(call)], FnScope::Goroutine)
                }
            },
            _ => {
                let call = Expr::Call {
                    callee: Box::new(f.clone()),
                    args: args.to_vec(),
                };
                self.closure_body(&[Stmt::Expr(call)], FnScope::Goroutine)
            }
        };
        let mut text = format!("{group}.Add(1)\ngo func() {{\n\tdefer {group}.Done()\n");
        if !body.is_empty() {
            text.push_str(&indent_lines(&body));
            text.push('\n');
        }
        text.push_str("}()");
        text
    }

    /// C `printf` as `fmt.Printf`; length modifiers have no Go meaning.
    fn printf(&mut self, args: &[Expr]) -> Option<String> {
        let Expr::Str(format) = args.first()?.unparen() else {
            return None;
        };
        self.imports.insert("fmt");
        let mut out = String::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            out.push('%');
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }
            while let Some(&n) = chars.peek() {
                chars.next();
                match n {
                    'l' | 'h' | 'z' | 'j' | 't' | 'L' => continue,
                    'u' | 'i' => {
                        out.push('d');
                        break;
                    }
                    n if n.is_ascii_alphabetic() => {
                        out.push(n);
                        break;
                    }
                    n => out.push(n),
                }
            }
        }
        let mut values = Vec::new();
        for a in &args[1..] {
            values.push(self.expr(a));
        }
        let format = go_string(&out);
        Some(if values.is_empty() {
            format!("fmt.Printf(\"{format}\")")
        } else {
            format!("fmt.Printf(\"{format}\", {})", values.join(", "))
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
            if name == "what" && self.caught.contains(&go_local(var)) {
                return format!("{}.Error()", go_local(var));
            }
        }
        let base_ty = self.type_of(base).map(|t| t.without_reference().clone());
        if let Some(ty) = &base_ty {
            if ty.name.ends_with("exception") && name == "what" {
                let recv = self.receiver(base);
                return format!("{recv}.Error()");
            }
            if let Some(text) = self.typed_method(base, ty, name, arrow, args) {
                return text;
            }
        }
        let recv = self.receiver(base);
        let values: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        let ident = crate::naming::operator_method(name)
            .map(to_pascal_case)
            .unwrap_or_else(|| to_pascal_case(name));
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
            TypeKind::Threading { kind, args: targs } => {
                self.threading_method(base, *kind, targs, name, args)
            }
            TypeKind::Async { kind, .. } => self.async_method(base, *kind, name),
            TypeKind::Container { kind, args: targs } => {
                self.container_method(base, *kind, targs, name, args)
            }
            TypeKind::Pointer { pointee, ownership } => {
                match (ownership, name) {
                    (Ownership::Shared, "use_count") => {
                        self.gap("`use_count`; Go values are garbage collected");
                        return Some("1".to_string());
                    }
                    (Ownership::Weak, "lock") | (Ownership::Unique | Ownership::Shared, "get")
                        if !arrow =>
                    {
                        return Some(self.receiver(base));
                    }
                    (Ownership::Weak, "expired") if !arrow => {
                        let recv = self.receiver(base);
                        return Some(format!("{recv} == nil"));
                    }
                    _ => {}
                }
                self.user_method(base, pointee, name, args)
            }
            TypeKind::Struct | TypeKind::Class => self.user_method(base, ty, name, args),
            _ => None,
        }
    }

    fn user_method(&mut self, base: &Expr, owner: &Type, name: &str, args: &[Expr]) -> Option<String> {
        let class = self.unit.facts.class(&owner.name)?;
        let (decl, methods) = self.method_owner(class, name)?;
        let ordinal = self.unit.facts.select_overload(Some(&decl.name), name, args.len());
        let m = methods.get(ordinal - 1).copied().or_else(|| methods.first().copied())?;
        let values = self.args_for(&m.params, args);
        let fallible = self.unit.method_fallible(&decl.name, name);
        if m.is_static {
            let call = format!("{}({})", self.unit.static_ident(decl, m), values.join(", "));
            return Some(self.finish_call(call, fallible, returns_value(m)));
        }
        let ident = self.unit.method_ident(Some(decl), m);
        let recv = self.receiver(base);
        let call = format!("{recv}.{ident}({})", values.join(", "));
        Some(self.finish_call(call, fallible, returns_value(m)))
    }

    /// The class declaring `method`, searching `class` and then its data
    /// bases, which embedding promotes.
    fn method_owner(
        &self,
        class: &'u ClassDecl,
        method: &str,
    ) -> Option<(&'u ClassDecl, Vec<&'u Function>)> {
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
        Some(match (kind, name) {
            (ThreadingKind::Atomic, "load") => format!("{recv}.Load()"),
            (ThreadingKind::Atomic, "store") => format!("{recv}.Store({})", value(self, 0)),
            (ThreadingKind::Atomic, "exchange") => format!("{recv}.Swap({})", value(self, 0)),
            (ThreadingKind::Atomic, "fetch_add") => {
                let v = value(self, 0);
                format!("({recv}.Add({v}) - {})", atom(&v))
            }
            (ThreadingKind::Atomic, "fetch_sub") => {
                let v = value(self, 0);
                format!("({recv}.Add(-{}) + {})", atom(&v), atom(&v))
            }
            (ThreadingKind::Atomic, "fetch_and") => format!("{recv}.And({})", value(self, 0)),
            (ThreadingKind::Atomic, "fetch_or") => format!("{recv}.Or({})", value(self, 0)),
            (ThreadingKind::Atomic, "compare_exchange_strong" | "compare_exchange_weak") => {
                let expected = value(self, 0);
                let desired = value(self, 1);
                format!("{recv}.CompareAndSwap({expected}, {desired})")
            }
            (ThreadingKind::Atomic, "is_lock_free") => "true".to_string(),
            (k, "lock") if k.is_mutex() => format!("{recv}.Lock()"),
            (k, "unlock") if k.is_mutex() => format!("{recv}.Unlock()"),
            (k, "try_lock") if k.is_mutex() => format!("{recv}.TryLock()"),
            (ThreadingKind::SharedMutex, "lock_shared") => format!("{recv}.RLock()"),
            (ThreadingKind::SharedMutex, "unlock_shared") => format!("{recv}.RUnlock()"),
            (ThreadingKind::ConditionVariable, "notify_one") => format!("{recv}.Signal()"),
            (ThreadingKind::ConditionVariable, "notify_all") => format!("{recv}.Broadcast()"),
            (ThreadingKind::Thread | ThreadingKind::JThread, "joinable") => "true".to_string(),
            (ThreadingKind::Thread | ThreadingKind::JThread, "join") => format!("{recv}.Wait()"),
            _ => return None,
        })
    }

    fn async_method(&mut self, base: &Expr, kind: AsyncKind, name: &str) -> Option<String> {
        let recv = self.receiver(base);
        Some(match (kind, name) {
            (AsyncKind::Future | AsyncKind::SharedFuture, "get") => format!("<-{recv}"),
            (AsyncKind::Future | AsyncKind::SharedFuture, "valid") => format!("{recv} != nil"),
            (AsyncKind::Future | AsyncKind::SharedFuture, "wait") => {
                self.gap("`wait` on a future; the value is received by `get`");
                String::new()
            }
            (AsyncKind::Promise, "get_future") => recv,
            _ => return None,
        })
    }

    /// Value-producing container methods.
    fn container_method(
        &mut self,
        base: &Expr,
        kind: ContainerKind,
        targs: &[Type],
        name: &str,
        args: &[Expr],
    ) -> Option<String> {
        let is_string = matches!(kind, ContainerKind::String | ContainerKind::StringView);
        let is_map = matches!(kind, ContainerKind::Map | ContainerKind::UnorderedMap);
        let is_set = matches!(kind, ContainerKind::Set | ContainerKind::UnorderedSet);
        let element = targs.first().cloned();
        let recv = self.container(base);
        Some(match name {
            "size" | "length" => format!("len({recv})"),
            "empty" => format!("len({recv}) == 0"),
            "at" => {
                let k = self.expr(args.first()?);
                format!("{recv}[{k}]")
            }
            "front" => format!("{recv}[0]"),
            "back" | "top" => format!("{recv}[len({recv})-1]"),
            "contains" | "count" if is_map || is_set => {
                let k = match element.as_ref() {
                    Some(t) => self.coerce(args.first()?, t),
                    None => self.expr(args.first()?),
                };
                if name == "contains" {
                    format!("func() bool {{ _, ok := {recv}[{k}]; return ok }}()")
                } else {
                    format!("func() int {{\n\tif _, ok := {recv}[{k}]; ok {{\n\t\treturn 1\n\t}}\n\treturn 0\n}}()")
                }
            }
            "find" | "rfind" if is_string => {
                self.imports.insert("strings");
                let needle = self.string_value(args.first()?);
                let f = if name == "find" { "Index" } else { "LastIndex" };
                format!("strings.{f}({recv}, {needle})")
            }
            "substr" if is_string => {
                let start = match args.first() {
                    Some(a) => self.expr(a),
                    None => "0".to_string(),
                };
                match args.get(1) {
                    Some(len) => {
                        let len = self.expr(len);
                        format!("{recv}[{start}:{}+{}]", start, atom(&len))
                    }
                    None => format!("{recv}[{start}:]"),
                }
            }
            "compare" if is_string => {
                self.imports.insert("strings");
                let other = self.string_value(args.first()?);
                format!("strings.Compare({recv}, {other})")
            }
            "c_str" | "data" | "str" if is_string => recv,
            "has_value" => format!("{recv} != nil"),
            "value" => format!("*{}", atom(&recv)),
            "value_or" => {
                let ty = element.unwrap_or_else(|| Type::class("auto"));
                let go_ty = self.go_type(&ty);
                let d = self.coerce(args.first()?, &ty);
                format!("func() {go_ty} {{\n\tif {recv} != nil {{\n\t\treturn *{recv}\n\t}}\n\treturn {d}\n}}()")
            }
            _ => return None,
        })
    }

    /// Container methods that only exist as statements in Go, such as
    /// `append` and `delete`.
    pub(super) fn container_statement(
        &mut self,
        base: &Expr,
        ty: &Type,
        method: &str,
        args: &[Expr],
    ) -> Option<String> {
        let TypeKind::Container { kind, args: targs } = &ty.kind else {
            return None;
        };
        let kind = *kind;
        let is_string = matches!(kind, ContainerKind::String | ContainerKind::StringView);
        let is_map = matches!(kind, ContainerKind::Map | ContainerKind::UnorderedMap);
        let is_set = matches!(kind, ContainerKind::Set | ContainerKind::UnorderedSet);
        let is_slice = matches!(kind, ContainerKind::Vector | ContainerKind::List | ContainerKind::Deque);
        let element = targs.first().cloned();
        let value_at = |this: &mut Self, i: usize| match (args.get(i), element.as_ref()) {
            (Some(a), Some(t)) => this.coerce(a, t),
            (Some(a), None) => this.expr(a),
            (None, _) => String::new(),
        };
        let p = self.place(base);
        Some(match method {
            "push_back" | "emplace_back" | "append" | "push" if is_string => {
                let v = match args.first() {
                    Some(a) => self.string_value(a),
                    None => return None,
                };
                format!("{p} += {v}")
            }
            "push_back" | "emplace_back" | "push" | "emplace" if is_slice => {
                let v = if method.starts_with("emplace") && args.len() != 1 {
                    let t = element.clone()?;
                    self.construct(&t, args)
                } else {
                    value_at(self, 0)
                };
                format!("{p} = append({p}, {v})")
            }
            "push_front" | "emplace_front" if is_slice => {
                let v = value_at(self, 0);
                let go_ty = self.go_type(ty);
                format!("{p} = append({go_ty}{{{v}}}, {p}...)")
            }
            "pop_back" | "pop" if is_slice => format!("{p} = {p}[:len({p})-1]"),
            "pop_front" if is_slice => format!("{p} = {p}[1:]"),
            "clear" if is_string => format!("{p} = \"\""),
            "clear" if is_slice => format!("{p} = {p}[:0]"),
            "clear" if is_map || is_set => format!("clear({p})"),
            "insert" | "emplace" | "insert_or_assign" if is_map => {
                let (k, v) = match args {
                    [pair] => match pair.unparen() {
                        Expr::List { items, .. } | Expr::Call { args: items, .. } if items.len() == 2 => {
                            (items[0].clone(), items[1].clone())
                        }
                        _ => return None,
                    },
                    [k, v] => (k.clone(), v.clone()),
                    _ => return None,
                };
                let key = self.coerce(&k, targs.first()?);
                let value = self.coerce(&v, targs.get(1)?);
                if method == "insert_or_assign" {
                    format!("{p}[{key}] = {value}")
                } else {
                    format!("if _, ok := {p}[{key}]; !ok {{\n\t{p}[{key}] = {value}\n}}")
                }
            }
            "insert" | "emplace" if is_set => format!("{p}[{}] = struct{{}}{{}}", value_at(self, 0)),
            "insert" if is_slice && args.len() == 2 => {
                self.imports.insert("slices");
                let at = self.position(&args[0], &p);
                let v = value_at(self, 1);
                format!("{p} = slices.Insert({p}, {at}, {v})")
            }
            "erase" if is_map || is_set => {
                let k = self.expr(args.first()?);
                format!("delete({p}, {k})")
            }
            "erase" if is_slice => {
                self.imports.insert("slices");
                let from = self.position(args.first()?, &p);
                let to = match args.get(1) {
                    Some(end) => self.position(end, &p),
                    None => format!("{}+1", from),
                };
                format!("{p} = slices.Delete({p}, {from}, {to})")
            }
            "reserve" if is_slice => {
                self.imports.insert("slices");
                let n = self.expr(args.first()?);
                format!("{p} = slices.Grow({p}, int({n}))")
            }
            "resize" if is_slice => {
                let n = self.expr(args.first()?);
                let fill = match (args.get(1), element.as_ref()) {
                    (Some(_), _) => value_at(self, 1),
                    (None, Some(t)) => self.default_value(t),
                    (None, None) => "nil".to_string(),
                };
                let n = atom(&n);
                format!(
                    "for len({p}) < {n} {{\n\t{p} = append({p}, {fill})\n}}\n{p} = {p}[:{n}]"
                )
            }
            "swap" => {
                let other = self.place(args.first()?);
                format!("{p}, {other} = {other}, {p}")
            }
            "reset" if kind == ContainerKind::Optional => format!("{p} = nil"),
            "emplace" if kind == ContainerKind::Optional => {
                let v = match element.as_ref() {
                    Some(t) => self.construct(t, args),
                    None => self.expr(args.first()?),
                };
                self.helpers.insert("ptrTo");
                format!("{p} = ptrTo({v})")
            }
            _ => return None,
        })
    }

    /// An iterator argument as a slice index: `v.begin() + i` is `i`.
    fn position(&mut self, e: &Expr, owner: &str) -> String {
        match e.unparen() {
            Expr::Binary {
                op: op @ (BinOp::Add | BinOp::Sub),
                lhs,
                rhs,
            } => {
                let from = self.position(lhs, owner);
                let offset = self.expr(rhs);
                let sign = if *op == BinOp::Add { "+" } else { "-" };
                match from.as_str() {
                    "0" if *op == BinOp::Add => offset,
                    _ => format!("{from}{sign}{}", atom(&offset)),
                }
            }
            other => match other.method_call() {
                Some((_, "begin" | "cbegin", _)) => "0".to_string(),
                Some((_, "end" | "cend", _)) => format!("len({owner})"),
                _ => self.expr(other),
            },
        }
    }
}

fn returns_value(f: &Function) -> bool {
    crate::facts::effective_return(f).is_some_and(|t| !t.is_void())
        || f.is_async()
}

/// `std::numeric_limits<T>::max` and friends, as `math` constants.
pub(super) fn numeric_limit(name: &str) -> Option<String> {
    let rest = name
        .strip_prefix("std::numeric_limits<")
        .or_else(|| name.strip_prefix("numeric_limits<"))?;
    let (ty, member) = rest.rsplit_once(">::")?;
    let token = go_token(ty.trim());
    let is_float = token.starts_with("float");
    let is_unsigned = token.starts_with("uint");
    let suffix = to_pascal_case(token);
    Some(match member {
        "max" => format!("math.Max{suffix}"),
        "min" if is_float => format!("math.SmallestNonzero{suffix}"),
        "min" | "lowest" if is_unsigned => "0".to_string(),
        "lowest" if is_float => format!("-math.Max{suffix}"),
        "min" | "lowest" => format!("math.Min{suffix}"),
        "infinity" if is_float => "math.Inf(1)".to_string(),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_limits_map_to_math_constants() {
        assert_eq!(numeric_limit("std::numeric_limits<int>::max").as_deref(), Some("math.MaxInt32"));
        assert_eq!(numeric_limit("std::numeric_limits<double>::lowest").as_deref(), Some("-math.MaxFloat64"));
        assert_eq!(numeric_limit("std::numeric_limits<unsigned int>::min").as_deref(), Some("0"));
        assert_eq!(numeric_limit("std::max"), None);
    }

    #[test]
    fn declared_results_count_as_values() {
        let f = Function::new("area", Type::float("double"));
        assert!(returns_value(&f));
        let g = Function::new("reset", Type::void());
        assert!(!returns_value(&g));
    }
}
