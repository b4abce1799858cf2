//! Go code generation.
//!
//! # Architecture
//!
//! - [`GoUnit`] holds the facts every item needs: the inheritance plan,
//!   which functions can fail, and how globals and class statics are
//!   stored.
//! - Async functions (coroutines, or bodies using futures and `std::async`)
//!   return a receive channel fed by a goroutine.
//! - Items are written in a fixed order: enums, package variables,
//!   interfaces, structs with their constructors and methods, then free
//!   functions. Imports and small generic helpers are collected while
//!   writing and placed after the package clause.
//! - Bodies are lowered by [`body::GoLowering`].
//! - With `generate_tests` a companion `_test.go` file holds one
//!   constructor smoke test per class.

mod body;
mod calls;
mod expr;
mod generics;

use std::collections::{BTreeMap, BTreeSet};

use hybrid_common::to_pascal_case;
use hybrid_cpp_parser::resolve_type;
use hybrid_diagnostics::{Diagnostic, DiagnosticSink, Label};
use hybrid_ir::type_map::{go_imports, to_go};
use hybrid_ir::{
    AccessLevel, ClassDecl, EnumDecl, Function, Ir, ThreadingKind, Type, TypeKind, Variable,
};
use hybrid_source::Span;
use tracing::debug;

use self::body::{GoLowering, GoSite};
use self::generics::GoGenerics;
use crate::errors::W301;
use crate::facts::{effective_return, overload_ordinal, UnitFacts};
use crate::inheritance::{BaseInfo, BaseKind, Hierarchy};
use crate::lower::scope::mentioned_names;
use crate::lower::{parse_body, parse_expression, Expr, Stmt};
use crate::naming::{go_local, go_member, operator_method, simple_name};
use crate::options::{Commentary, GenOptions};
use crate::writer::CodeWriter;
use crate::{CodeGenerator, GeneratedCode};

/// Generates one Go source file per translation unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoGenerator;

impl CodeGenerator for GoGenerator {
    fn name(&self) -> &'static str {
        "go"
    }

    fn file_extension(&self) -> &'static str {
        "go"
    }

    fn generate(&self, ir: &Ir, opts: &GenOptions, sink: &DiagnosticSink) -> GeneratedCode {
        let unit = GoUnit::new(ir, opts, sink);
        let source = unit.emit();
        let test_source = opts.generate_tests.then(|| unit.tests());
        debug!(
            bytes = source.len(),
            units = ir.unit_count(),
            tests = test_source.is_some(),
            "go source generated"
        );
        GeneratedCode {
            source,
            test_source,
        }
    }
}

// ============================================================================
// Unit facts
// ============================================================================

/// How a global or class static is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarKind {
    /// `const` of a basic type with a literal value.
    Const,
    /// `atomic.Int32` and friends; reads go through `Load`.
    Atomic,
    /// `sync.Mutex` / `sync.RWMutex`.
    Mutex,
    /// `*sync.Cond` built over the mutex it waits with.
    Condvar,
    /// Any other package variable.
    Plain,
}

#[derive(Debug, Clone)]
pub(crate) struct PackageVar {
    pub ident: String,
    pub kind: VarKind,
    /// Declared type; for atomics, the value type.
    pub ty: Type,
}

fn package_var(var: &Variable, ident: String) -> PackageVar {
    let (kind, ty) = match var.ty.threading_kind() {
        Some(ThreadingKind::Atomic) => (
            VarKind::Atomic,
            var.ty.args().first().cloned().unwrap_or_else(|| Type::integer("int")),
        ),
        Some(k) if k.is_mutex() => (VarKind::Mutex, var.ty.clone()),
        Some(ThreadingKind::ConditionVariable) => (VarKind::Condvar, var.ty.clone()),
        _ if (var.is_const || var.ty.is_const) && is_const_literal(var) => {
            (VarKind::Const, var.ty.clone())
        }
        _ => (VarKind::Plain, var.ty.clone()),
    };
    PackageVar { ident, kind, ty }
}

/// Go constants only hold basic types with constant values.
fn is_const_literal(var: &Variable) -> bool {
    let basic = var.ty.is_primitive()
        || matches!(
            var.ty.kind,
            TypeKind::Container {
                kind: hybrid_ir::ContainerKind::String,
                ..
            }
        );
    let literal = match var.initializer.as_deref().and_then(parse_expression) {
        Some(e) => is_constant_expr(&e),
        None => false,
    };
    basic && literal
}

fn is_constant_expr(e: &Expr) -> bool {
    match e.unparen() {
        Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Char(_) | Expr::Bool(_) => true,
        Expr::Unary { operand, .. } => is_constant_expr(operand),
        Expr::Binary { lhs, rhs, .. } => is_constant_expr(lhs) && is_constant_expr(rhs),
        _ => false,
    }
}

pub(crate) struct GoUnit<'a> {
    pub ir: &'a Ir,
    pub opts: &'a GenOptions,
    pub sink: &'a DiagnosticSink,
    pub facts: UnitFacts<'a>,
    pub hierarchy: Hierarchy,
    /// Globals by name, class statics by `Class::name`.
    pub statics: BTreeMap<String, PackageVar>,
    /// Enumerators by `Enum::name`, and by bare name for unscoped enums.
    pub enumerators: BTreeMap<String, String>,
}

/// Text being written plus the imports and helpers it needs.
pub(crate) struct Out {
    pub w: CodeWriter,
    pub imports: BTreeSet<&'static str>,
    /// Generic helpers declared once per file.
    pub helpers: BTreeSet<&'static str>,
}

impl Out {
    fn new() -> Self {
        Self {
            w: CodeWriter::tabs(),
            imports: BTreeSet::new(),
            helpers: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, lowering: &mut GoLowering<'_>) {
        self.imports.extend(std::mem::take(&mut lowering.imports));
        self.helpers.extend(std::mem::take(&mut lowering.helpers));
    }
}

impl<'a> GoUnit<'a> {
    fn new(ir: &'a Ir, opts: &'a GenOptions, sink: &'a DiagnosticSink) -> Self {
        let hierarchy = Hierarchy::build(ir, sink);
        let mut statics = BTreeMap::new();
        for g in &ir.globals {
            statics.insert(g.name.clone(), package_var(g, go_local(&g.name)));
        }
        for class in &ir.classes {
            for f in class.fields.iter().filter(|f| f.is_static) {
                let ident = format!("{}{}", go_local(&class.name), to_pascal_case(&f.name));
                statics.insert(format!("{}::{}", class.name, f.name), package_var(f, ident));
            }
        }
        let mut enumerators = BTreeMap::new();
        for e in &ir.enums {
            let enum_name = simple_name(&e.name);
            for (variant, _) in &e.variants {
                let ident = format!("{enum_name}{}", to_pascal_case(variant));
                enumerators.insert(format!("{enum_name}::{variant}"), ident.clone());
                if !e.is_scoped {
                    enumerators.entry(variant.clone()).or_insert(ident);
                }
            }
        }
        Self {
            ir,
            opts,
            sink,
            facts: UnitFacts::new(ir),
            hierarchy,
            statics,
            enumerators,
        }
    }

    /// Reports a construct with no Go lowering.
    pub fn gap(&self, span: Span, message: String) {
        self.sink.emit(
            Diagnostic::warning(W301, message, span)
                .with_label(Label::primary(span, "emitted as a marked placeholder")),
        );
    }

    /// Renders `ty`, recording the imports it needs. Pointers to classes
    /// that became interfaces are the interface itself.
    pub fn type_text(&self, ty: &Type, imports: &mut BTreeSet<&'static str>) -> String {
        go_imports(ty, imports);
        let mut text = to_go(ty);
        for base in self.hierarchy.bases() {
            if base.has_trait() {
                let pattern = format!("*{}", simple_name(&base.name));
                text = replace_word(&text, &pattern, &Self::interface_name(base));
            }
        }
        text
    }

    /// The struct name of `class`; specializations append their arguments.
    pub fn type_name(&self, class: &ClassDecl) -> String {
        match &class.template.specialization {
            Some(spec) => {
                let suffix: String = spec
                    .args
                    .iter()
                    .map(|a| {
                        let text = to_go(&resolve_type(a));
                        let word: String = text
                            .chars()
                            .map(|c| if c.is_alphanumeric() { c } else { '_' })
                            .collect();
                        to_pascal_case(&word)
                    })
                    .collect();
                format!("{}{suffix}", simple_name(&class.name))
            }
            None => simple_name(&class.name).to_string(),
        }
    }

    /// `NewPoint` for the first constructor, `NewPoint2` onwards for the
    /// rest.
    pub fn ctor_ident(&self, class: &ClassDecl, index: usize) -> String {
        let name = self.type_name(class);
        if index == 0 {
            format!("New{name}")
        } else {
            format!("New{name}{}", index + 1)
        }
    }

    /// The constructor a call with `arity` arguments selects.
    pub fn select_constructor(&self, class: &ClassDecl, arity: usize) -> usize {
        class
            .constructors()
            .position(|c| {
                let required = c.params.iter().filter(|p| p.default_value.is_none()).count();
                arity >= required && arity <= c.params.len()
            })
            .unwrap_or(0)
    }

    /// Name of the method receiver: the class's initial, or `recv` when a
    /// body already uses that letter.
    pub fn receiver(&self, class: &ClassDecl) -> String {
        let letter = self
            .type_name(class)
            .chars()
            .next()
            .map_or_else(|| "r".to_string(), |c| c.to_ascii_lowercase().to_string());
        let taken = class.methods.iter().any(|m| {
            m.params.iter().any(|p| go_local(&p.name) == letter)
                || m.body.as_deref().is_some_and(|b| {
                    mentioned_names(&parse_body(b))
                        .iter()
                        .any(|n| go_local(n) == letter)
                })
        });
        if taken {
            "recv".to_string()
        } else {
            letter
        }
    }

    /// True if `method` of `class` is part of an interface the class
    /// satisfies, so its name must be exported.
    fn in_interface(&self, class: &str, method: &str) -> bool {
        self.hierarchy.is_trait_method(class, method)
            || self
                .hierarchy
                .base(class)
                .is_some_and(|b| b.has_trait() && b.method(method).is_some())
    }

    /// Go name of a method, overload suffix included.
    pub fn method_ident(&self, class: Option<&ClassDecl>, method: &Function) -> String {
        let exported = method.access == AccessLevel::Public
            || class.map_or(true, |c| self.in_interface(&c.name, &method.name));
        let base = match operator_method(&method.name) {
            Some(op) => to_pascal_case(op),
            None if exported => to_pascal_case(&method.name),
            None => go_local(&method.name),
        };
        let ordinal = class
            .and_then(|c| {
                c.methods
                    .iter()
                    .position(|m| std::ptr::eq(m, method))
                    .map(|i| overload_ordinal(&c.methods, i))
            })
            .unwrap_or(1);
        let ident = if ordinal > 1 {
            format!("{base}{ordinal}")
        } else {
            base
        };
        let clashes = class.is_some_and(|c| {
            c.instance_fields()
                .any(|f| go_member(&f.name, f.access) == ident)
        });
        if clashes {
            let getter = format!("Get{}", to_pascal_case(&ident));
            if exported {
                getter
            } else {
                go_local(&getter)
            }
        } else {
            ident
        }
    }

    /// A static method is a package function prefixed by its class.
    pub fn static_ident(&self, class: &ClassDecl, method: &Function) -> String {
        let ordinal = class
            .methods
            .iter()
            .position(|m| std::ptr::eq(m, method))
            .map_or(1, |i| overload_ordinal(&class.methods, i));
        let base = format!("{}{}", self.type_name(class), to_pascal_case(&method.name));
        if ordinal > 1 {
            format!("{base}{ordinal}")
        } else {
            base
        }
    }

    /// Go name of the free function at `index`.
    pub fn function_ident(&self, index: usize) -> String {
        let Some(f) = self.ir.functions.get(index) else {
            return String::new();
        };
        if f.name == "main" {
            return "main".to_string();
        }
        let ordinal = overload_ordinal(&self.ir.functions, index);
        let base = if f.is_static {
            go_local(&f.name)
        } else {
            to_pascal_case(simple_name(&f.name))
        };
        let base = if self.is_type_name(&base) {
            format!("{base}Func")
        } else {
            base
        };
        if ordinal > 1 {
            format!("{base}{ordinal}")
        } else {
            base
        }
    }

    /// Go name of the `ordinal`th overload of the free function `name`.
    pub fn free_ident(&self, name: &str, ordinal: usize) -> String {
        let mut seen = 0;
        for (i, f) in self.ir.functions.iter().enumerate() {
            if f.name == name || simple_name(&f.name) == simple_name(name) {
                seen += 1;
                if seen == ordinal {
                    return self.function_ident(i);
                }
            }
        }
        to_pascal_case(simple_name(name))
    }

    fn is_type_name(&self, ident: &str) -> bool {
        self.ir.classes.iter().any(|c| self.type_name(c) == ident)
            || self.ir.enums.iter().any(|e| simple_name(&e.name) == ident)
            || self.hierarchy.bases().any(|b| Self::interface_name(b) == ident)
    }

    /// The interface a base becomes.
    pub fn interface_name(base: &BaseInfo) -> String {
        match base.kind {
            BaseKind::Interface => simple_name(&base.name).to_string(),
            BaseKind::Data => format!("{}Interface", simple_name(&base.name)),
        }
    }

    /// True if the interface method `method` of `base` returns an error:
    /// the base or any class implementing it can fail there.
    pub fn interface_method_fallible(&self, base: &BaseInfo, method: &str) -> bool {
        self.facts.method_is_fallible(&base.name, method)
            || self.ir.classes.iter().any(|c| {
                self.hierarchy
                    .direct_bases(&c.name)
                    .iter()
                    .any(|b| b.name == base.name)
                    && self.facts.method_is_fallible(&c.name, method)
            })
    }

    /// Bases whose interface `class` satisfies, its own first.
    pub fn implemented_interfaces(&self, class: &str) -> Vec<&BaseInfo> {
        let mut found: Vec<&BaseInfo> = Vec::new();
        if let Some(own) = self.hierarchy.base(class) {
            if own.kind == BaseKind::Data && own.has_trait() {
                found.push(own);
            }
        }
        found.extend(
            self.hierarchy
                .direct_bases(class)
                .into_iter()
                .filter(|b| b.has_trait()),
        );
        found
    }

    /// True if `class::method` returns an error.
    pub fn method_fallible(&self, class: &str, method: &str) -> bool {
        if self.facts.method_is_fallible(class, method) {
            return true;
        }
        self.implemented_interfaces(class)
            .into_iter()
            .filter(|b| b.method(method).is_some())
            .any(|b| self.interface_method_fallible(b, method))
    }

    /// True if a data base of `class` declares `method`, which embedding
    /// then promotes.
    fn promoted(&self, class: &str, method: &str) -> bool {
        let mut current = class.to_string();
        for _ in 0..32 {
            let Some(base) = self.hierarchy.data_base(&current) else {
                return false;
            };
            if self
                .facts
                .class(&base.name)
                .is_some_and(|c| c.methods.iter().any(|m| m.name == method))
            {
                return true;
            }
            current = base.name.clone();
        }
        false
    }

    // ========================================================================
    // Items
    // ========================================================================

    fn emit(&self) -> String {
        let mut out = Out::new();
        for e in &self.ir.enums {
            self.enumeration(&mut out, e);
        }
        self.package_vars(&mut out);
        self.interfaces(&mut out);
        for &index in &self.hierarchy.order {
            self.class(&mut out, &self.ir.classes[index]);
        }
        for (index, f) in self.ir.functions.iter().enumerate() {
            self.free_function(&mut out, index, f);
        }

        let mut head = CodeWriter::tabs();
        if self.opts.commentary() == Commentary::Verbose {
            head.line("// Code generated by hybrid from C++ source. DO NOT EDIT.");
            head.line(format!("// Translated units: {}", self.ir.unit_count()));
            head.blank();
        }
        head.line(format!("package {}", self.opts.package));
        write_imports(&mut head, &out.imports);
        for helper in &out.helpers {
            head.blank();
            head.line(helper_source(helper));
        }
        let body = out.w.finish();
        if body.trim().is_empty() {
            head.finish()
        } else {
            format!("{}\n{body}", head.finish())
        }
    }

    /// Origin commentary for an item named `ident` in Go.
    fn origin(&self, out: &mut Out, kind: &str, name: &str, ident: &str) {
        let doc = format!("// {ident} is translated from the C++ {kind} `{name}`.");
        match self.opts.commentary() {
            Commentary::Verbose => {
                out.w.line(format!("// origin: C++ {kind} `{name}`"));
                out.w.line(doc);
            }
            Commentary::Doc => out.w.line(doc),
            Commentary::Silent => {}
        }
    }

    fn enumeration(&self, out: &mut Out, e: &EnumDecl) {
        let name = simple_name(&e.name);
        let underlying = e
            .underlying
            .as_deref()
            .map_or_else(|| "int32".to_string(), |u| to_go(&resolve_type(u)));
        out.w.blank();
        self.origin(out, "enum", &e.name, name);
        out.w.line(format!("type {name} {underlying}"));
        if e.variants.is_empty() {
            return;
        }
        out.w.blank();
        out.w.open("const (");
        let implicit = e.variants.iter().all(|(_, v)| v.is_none());
        for (i, (variant, value)) in e.variants.iter().enumerate() {
            let ident = format!("{name}{}", to_pascal_case(variant));
            if implicit {
                if i == 0 {
                    out.w.line(format!("{ident} {name} = iota"));
                } else {
                    out.w.line(ident);
                }
                continue;
            }
            match value.as_deref() {
                Some(v) if is_int_literal(v) => {
                    out.w.line(format!("{ident} {name} = {}", expr::int_literal(v)));
                }
                Some(v) => {
                    self.gap(
                        e.span,
                        format!("enumerator `{variant}` of `{}` has a non-literal value `{v}`", e.name),
                    );
                    out.w.line(format!("{ident} {name} = {i} // UNTRANSLATED: = {v}"));
                }
                None => out.w.line(format!("{ident} {name} = {i}")),
            }
        }
        out.w.close(")");
    }

    /// Globals and class statics, all at package level.
    fn package_vars(&self, out: &mut Out) {
        let mut lowering = GoLowering::new(self, GoSite::detached());
        let mut inits: Vec<String> = Vec::new();
        for g in &self.ir.globals {
            if let Some(var) = self.statics.get(&g.name) {
                out.w.blank();
                self.package_var_decl(out, &mut lowering, g, var, &mut inits);
            }
        }
        for class in &self.ir.classes {
            for f in class.fields.iter().filter(|f| f.is_static) {
                if let Some(var) = self.statics.get(&format!("{}::{}", class.name, f.name)) {
                    out.w.blank();
                    self.package_var_decl(out, &mut lowering, f, var, &mut inits);
                }
            }
        }
        if !inits.is_empty() {
            out.w.blank();
            out.w.open("func init() {");
            for line in inits {
                out.w.line(line);
            }
            out.w.close("}");
        }
        out.absorb(&mut lowering);
    }

    fn package_var_decl(
        &self,
        out: &mut Out,
        lowering: &mut GoLowering<'_>,
        var: &Variable,
        item: &PackageVar,
        inits: &mut Vec<String>,
    ) {
        let init = var.initializer.as_deref().and_then(parse_expression);
        let ident = &item.ident;
        match item.kind {
            VarKind::Const => {
                let ty = lowering.go_type(&item.ty);
                let v = lowering.initial_value(init.as_ref(), &item.ty);
                lowering.flush_into(&mut out.w);
                out.w.line(format!("const {ident} {ty} = {v}"));
            }
            VarKind::Atomic => {
                let atomic = hybrid_ir::type_map::go_atomic(&item.ty);
                lowering.imports.insert("sync/atomic");
                out.w.line(format!("var {ident} {atomic}"));
                if let Some(e) = init.as_ref().filter(|e| !is_zero_literal(e)) {
                    let v = lowering.coerce(e, &item.ty);
                    inits.push(format!("{ident}.Store({v})"));
                }
            }
            VarKind::Mutex => {
                let ty = lowering.go_type(&item.ty);
                out.w.line(format!("var {ident} {ty}"));
            }
            VarKind::Condvar => {
                lowering.imports.insert("sync");
                let mutex = self
                    .global_condvar_mutex(&var.name)
                    .unwrap_or_else(|| "sync.Mutex{}".to_string());
                out.w.line(format!("var {ident} = sync.NewCond(&{mutex})"));
            }
            VarKind::Plain => {
                let ty = lowering.go_type(&item.ty);
                match init {
                    Some(e) => {
                        let v = lowering.coerce(&e, &item.ty);
                        lowering.flush_into(&mut out.w);
                        out.w.line(format!("var {ident} {ty} = {v}"));
                    }
                    None if needs_make(&item.ty) => {
                        out.w.line(format!("var {ident} = {ty}{{}}"));
                    }
                    None => out.w.line(format!("var {ident} {ty}")),
                }
            }
        }
    }

    /// The package mutex a global condition variable waits with.
    fn global_condvar_mutex(&self, cv: &str) -> Option<String> {
        let bodies: Vec<Vec<Stmt>> = self
            .ir
            .all_functions()
            .filter_map(|f| f.body.as_deref().map(parse_body))
            .collect();
        let mutex = bodies
            .iter()
            .find_map(|b| body::condvar_mutex(b, cv))?;
        self.statics.get(&mutex).map(|v| v.ident.clone())
    }

    // ========================================================================
    // Interfaces
    // ========================================================================

    fn interfaces(&self, out: &mut Out) {
        let mut seen = BTreeSet::new();
        let mut bases: Vec<&BaseInfo> = Vec::new();
        for &index in &self.hierarchy.order {
            let class = &self.ir.classes[index];
            if let Some(base) = self.hierarchy.base(&class.name) {
                if base.has_trait() && seen.insert(base.name.clone()) {
                    bases.push(base);
                }
            }
        }
        for base in self.hierarchy.bases() {
            if !base.parsed && base.has_trait() && seen.insert(base.name.clone()) {
                bases.push(base);
            }
        }
        for base in bases {
            self.interface_decl(out, base);
        }
    }

    fn interface_decl(&self, out: &mut Out, base: &BaseInfo) {
        let decl = self.ir.find_class(&base.name);
        let generics = decl
            .map(|c| self.class_generics(out, c))
            .unwrap_or_default();
        let name = Self::interface_name(base);
        out.w.blank();
        let kind = if base.parsed { "class" } else { "base class" };
        self.origin(out, kind, &base.name, &name);
        for marker in &generics.markers {
            out.w.line(marker);
        }
        out.w.open(format!("type {name}{} interface {{", generics.decl));
        for m in &base.methods {
            let fallible = self.interface_method_fallible(base, &m.name);
            let ident = self.method_ident(decl, m);
            let anys = method_anys(m);
            let params = self.params(out, m, &anys);
            let result = self.result(out, m, fallible, &anys);
            out.w.line(format!("{ident}({params}){result}"));
        }
        out.w.close("}");
    }

    // ========================================================================
    // Classes
    // ========================================================================

    fn class(&self, out: &mut Out, class: &ClassDecl) {
        if self.hierarchy.is_interface(&class.name) {
            return;
        }
        let name = self.type_name(class);
        let generics = self.class_generics(out, class);

        out.w.blank();
        self.origin(out, if class.is_struct { "struct" } else { "class" }, &class.name, &name);
        for marker in &generics.markers {
            out.w.line(marker);
        }
        let rows = self.struct_fields(out, class);
        if rows.is_empty() {
            out.w.line(format!("type {name}{} struct{{}}", generics.decl));
        } else {
            out.w.open(format!("type {name}{} struct {{", generics.decl));
            let width = rows
                .iter()
                .filter(|(_, ty)| !ty.is_empty())
                .map(|(ident, _)| ident.len())
                .max()
                .unwrap_or(0);
            for (ident, ty) in rows {
                if ty.is_empty() {
                    out.w.line(ident);
                } else {
                    out.w.line(format!("{ident:<width$} {ty}"));
                }
            }
            out.w.close("}");
        }

        if generics.decl.is_empty() {
            let interfaces = self.implemented_interfaces(&class.name);
            if !interfaces.is_empty() {
                out.w.blank();
                for base in interfaces {
                    out.w.line(format!(
                        "var _ {} = (*{name})(nil)",
                        Self::interface_name(base)
                    ));
                }
            }
        }

        let ctors: Vec<&Function> = class.constructors().collect();
        if ctors.is_empty() {
            out.w.blank();
            self.constructor(out, class, None, 0, &generics);
        }
        for (i, ctor) in ctors.iter().enumerate() {
            out.w.blank();
            self.constructor(out, class, Some(ctor), i, &generics);
        }
        for m in &class.methods {
            if m.is_constructor || m.is_destructor {
                continue;
            }
            out.w.blank();
            self.method(out, class, m, &generics);
        }
        self.interface_methods(out, class, &generics);
        self.close_method(out, class, &generics);
    }

    /// `(ident, type)` rows; an embedded base has an empty type.
    fn struct_fields(&self, out: &mut Out, class: &ClassDecl) -> Vec<(String, String)> {
        let mut rows = Vec::new();
        if let Some(base) = self.hierarchy.data_base(&class.name) {
            rows.push((self.base_type(class, base, &mut out.imports), String::new()));
        }
        for f in class.instance_fields() {
            let ty = self.type_text(&f.ty, &mut out.imports);
            rows.push((go_member(&f.name, f.access), ty));
        }
        rows
    }

    /// The embedded base as spelled in the derived class.
    pub fn base_type(
        &self,
        class: &ClassDecl,
        base: &BaseInfo,
        imports: &mut BTreeSet<&'static str>,
    ) -> String {
        let spelled = class
            .bases
            .iter()
            .find(|b| simple_name(&b.name) == simple_name(&base.name))
            .map_or(base.name.as_str(), |b| b.name.as_str());
        self.type_text(&resolve_type(spelled), imports)
    }

    fn constructor(
        &self,
        out: &mut Out,
        class: &ClassDecl,
        ctor: Option<&Function>,
        index: usize,
        generics: &GoGenerics,
    ) {
        let name = self.type_name(class);
        let ident = self.ctor_ident(class, index);
        let fallible = ctor.is_some_and(|c| self.facts.is_fallible(Some(&class.name), c));
        let recv = self.receiver(class);
        let mut site = GoSite::detached();
        site.class = Some(class);
        site.function = ctor;
        site.fallible = fallible;
        site.is_constructor = true;
        site.receiver = recv.clone();
        site.return_type = Some(Type::pointer(
            Type::class(class.name.clone()),
            hybrid_ir::Ownership::Raw,
        ));
        let mut lowering = GoLowering::new(self, site);

        if let Some(c) = ctor {
            let kind = if c.params.is_empty() {
                "default constructor"
            } else {
                "constructor"
            };
            self.origin(out, kind, &class.name, &ident);
        }
        let params = ctor.map_or_else(String::new, |c| self.params(out, c, &BTreeSet::new()));
        let self_type = format!("{name}{}", generics.args);
        let ret = if fallible {
            format!("(*{self_type}, error)")
        } else {
            format!("*{self_type}")
        };
        out.w.open(format!("func {ident}{}({params}) {ret} {{", generics.decl));
        let inits = lowering.field_inits(class, ctor);
        lowering.flush_into(&mut out.w);
        let body = ctor
            .and_then(|c| c.body.as_deref())
            .map(parse_body)
            .unwrap_or_default();
        let literal = composite(&self_type, &inits.fields);
        let nil = if fallible { ", nil" } else { "" };
        if body.is_empty() && inits.post.is_empty() {
            out.w.line(format!("return &{literal}{nil}"));
        } else {
            out.w.line(format!("{recv} := &{literal}"));
            for line in &inits.post {
                out.w.line(line);
            }
            lowering.statements(&body, &mut out.w);
            if !matches!(body.last(), Some(Stmt::Return(_) | Stmt::Throw(_))) {
                out.w.line(format!("return {recv}{nil}"));
            }
        }
        out.w.close("}");
        out.absorb(&mut lowering);
    }

    fn method(&self, out: &mut Out, class: &ClassDecl, m: &Function, generics: &GoGenerics) {
        let fallible = self.method_fallible(&class.name, &m.name);
        let name = self.type_name(class);
        let ident = if m.is_static {
            self.static_ident(class, m)
        } else {
            self.method_ident(Some(class), m)
        };
        self.origin(out, "method", &format!("{}::{}", class.name, m.name), &ident);
        let recv = self.receiver(class);
        let mut site = GoSite::function(Some(class), m, fallible, recv.clone());
        if m.is_static {
            let own = self.function_generics(out, m);
            let decl = merge_type_params(&generics.decl, &own.decl);
            for marker in &own.markers {
                out.w.line(marker);
            }
            let params = self.params(out, m, &BTreeSet::new());
            let result = self.result(out, m, fallible, &BTreeSet::new());
            let header = format!("func {ident}{decl}({params}){result}");
            self.function_block(out, site, header);
            return;
        }
        if !m.template.params.is_empty() {
            self.gap(
                m.span,
                format!(
                    "type parameters of the method `{}::{}`; Go methods cannot declare them",
                    class.name, m.name
                ),
            );
            site.anys = method_anys(m);
        }
        let params = self.params(out, m, &site.anys);
        let result = self.result(out, m, fallible, &site.anys);
        let header = format!("func ({recv} *{name}{}) {ident}({params}){result}", generics.args);
        if m.is_pure_virtual || (m.body.is_none() && m.is_virtual) {
            out.w.open(format!("{header} {{"));
            out.w.line(format!(
                "panic(\"`{}` is abstract in `{}`\")",
                m.name, class.name
            ));
            out.w.close("}");
            return;
        }
        self.function_block(out, site, header);
    }

    /// Interface methods `class` does not declare itself: default bodies
    /// copied from the interface, or a panicking stub.
    fn interface_methods(&self, out: &mut Out, class: &ClassDecl, generics: &GoGenerics) {
        let name = self.type_name(class);
        let recv = self.receiver(class);
        let mut done: BTreeSet<String> = class
            .methods
            .iter()
            .filter(|m| !m.is_constructor && !m.is_destructor)
            .map(|m| m.name.clone())
            .collect();
        for base in self.implemented_interfaces(&class.name) {
            for bm in &base.methods {
                if !done.insert(bm.name.clone()) || self.promoted(&class.name, &bm.name) {
                    continue;
                }
                let fallible = self.interface_method_fallible(base, &bm.name);
                let ident = self.method_ident(None, bm);
                let anys = method_anys(bm);
                let params = self.params(out, bm, &anys);
                let result = self.result(out, bm, fallible, &anys);
                let header =
                    format!("func ({recv} *{name}{}) {ident}({params}){result}", generics.args);
                out.w.blank();
                if base.kind == BaseKind::Interface && !bm.is_pure_virtual && bm.body.is_some() {
                    self.origin(out, "method", &format!("{}::{}", base.name, bm.name), &ident);
                    let mut site = GoSite::function(Some(class), bm, fallible, recv.clone());
                    site.anys = anys;
                    self.function_block(out, site, header);
                } else {
                    out.w.open(format!("{header} {{"));
                    out.w.line(format!(
                        "panic(\"`{}` is abstract in `{}`\")",
                        bm.name, class.name
                    ));
                    out.w.close("}");
                }
            }
        }
    }

    /// A destructor with a body becomes `Close`.
    fn close_method(&self, out: &mut Out, class: &ClassDecl, generics: &GoGenerics) {
        let Some(dtor) = class.methods.iter().find(|m| m.is_destructor) else {
            return;
        };
        if dtor.body.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return;
        }
        let name = self.type_name(class);
        let recv = self.receiver(class);
        out.w.blank();
        self.origin(out, "destructor", &dtor.name, "Close");
        let header = format!("func ({recv} *{name}{}) Close()", generics.args);
        self.function_block(out, GoSite::function(Some(class), dtor, false, recv), header);
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn free_function(&self, out: &mut Out, index: usize, f: &Function) {
        out.w.blank();
        let is_main = f.name == "main";
        let ident = self.function_ident(index);
        let coroutine = f.is_async();
        let fallible = !is_main && !coroutine && self.facts.is_fallible(None, f);
        self.origin(out, "function", &f.name, &ident);

        if is_main {
            if !f.params.is_empty() {
                self.gap(f.span, "the parameters of `main`".to_string());
            }
            let mut site = GoSite::function(None, f, false, String::new());
            site.is_main = true;
            site.return_type = None;
            site.channel = None;
            self.function_block(out, site, "func main()".to_string());
            return;
        }

        let generics = self.function_generics(out, f);
        for marker in &generics.markers {
            out.w.line(marker);
        }
        let params = self.params(out, f, &BTreeSet::new());
        let result = self.result(out, f, fallible, &BTreeSet::new());
        let header = format!("func {ident}{}({params}){result}", generics.decl);
        if f.body.is_none() {
            out.w.open(format!("{header} {{"));
            out.w.line(format!(
                "panic(\"`{}` is declared but not defined in this unit\")",
                f.name
            ));
            out.w.close("}");
            return;
        }
        self.function_block(out, GoSite::function(None, f, fallible, String::new()), header);
    }

    /// `header { body }` for a function with a body.
    fn function_block(&self, out: &mut Out, site: GoSite<'_>, header: String) {
        let stmts = site
            .function
            .and_then(|f| f.body.as_deref())
            .map(parse_body)
            .unwrap_or_default();
        let mut lowering = GoLowering::new(self, site);
        if stmts.is_empty() && lowering.site.channel.is_none() {
            match lowering.empty_body() {
                Some(line) => {
                    out.w.open(format!("{header} {{"));
                    out.w.line(line);
                    out.w.close("}");
                }
                None => out.w.line(format!("{header} {{}}")),
            }
        } else {
            out.w.open(format!("{header} {{"));
            lowering.function_body(&stmts, &mut out.w);
            out.w.close("}");
        }
        out.absorb(&mut lowering);
    }

    /// `name type, ...`; unnamed parameters get positional names.
    fn params(&self, out: &mut Out, f: &Function, anys: &BTreeSet<String>) -> String {
        f.params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let ident = if p.name.is_empty() {
                    format!("arg{i}")
                } else {
                    go_local(&p.name)
                };
                let ty = erase_params(&self.type_text(&p.ty, &mut out.imports), anys);
                format!("{ident} {ty}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Result list with its leading space: a channel for coroutines, an
    /// extra `error` for functions that can fail.
    fn result(&self, out: &mut Out, f: &Function, fallible: bool, anys: &BTreeSet<String>) -> String {
        let value = effective_return(f)
            .map(|t| erase_params(&self.type_text(&t, &mut out.imports), anys))
            .filter(|t| !t.is_empty());
        if f.is_async() {
            return format!(" <-chan {}", value.unwrap_or_else(|| "struct{}".to_string()));
        }
        match (value, fallible) {
            (None, false) => String::new(),
            (Some(v), false) => format!(" {v}"),
            (None, true) => " error".to_string(),
            (Some(v), true) => format!(" ({v}, error)"),
        }
    }

    // ========================================================================
    // Tests
    // ========================================================================

    /// The `_test.go` companion: one constructor smoke test per class.
    fn tests(&self) -> String {
        let classes: Vec<&ClassDecl> = self
            .hierarchy
            .order
            .iter()
            .map(|&i| &self.ir.classes[i])
            .filter(|c| !self.hierarchy.is_interface(&c.name) && c.template.params.is_empty())
            .collect();
        let mut out = Out::new();
        let mut lowering = GoLowering::new(self, GoSite::detached());
        for class in &classes {
            let args: Vec<String> = class
                .constructors()
                .next()
                .map(|c| {
                    c.params
                        .iter()
                        .filter(|p| p.default_value.is_none())
                        .map(|p| lowering.default_value(&p.ty))
                        .collect()
                })
                .unwrap_or_default();
            let index = self.select_constructor(class, args.len());
            let ctor_ident = self.ctor_ident(class, index);
            let fallible = class
                .constructors()
                .nth(index)
                .is_some_and(|c| self.facts.is_fallible(Some(&class.name), c));
            let call = format!("{ctor_ident}({})", args.join(", "));
            out.w.blank();
            out.w.open(format!("func Test{ctor_ident}(t *testing.T) {{"));
            if fallible {
                out.w.open(format!("if _, err := {call}; err != nil {{"));
                out.w.line("t.Fatal(err)");
            } else {
                out.w.open(format!("if {call} == nil {{"));
                out.w.line(format!("t.Fatal(\"{ctor_ident} returned nil\")"));
            }
            out.w.close("}");
            out.w.close("}");
        }
        out.absorb(&mut lowering);
        if !classes.is_empty() {
            out.imports.insert("testing");
        }
        let mut head = CodeWriter::tabs();
        if self.opts.commentary() == Commentary::Verbose {
            head.line("// Code generated by hybrid from C++ source. DO NOT EDIT.");
            head.blank();
        }
        head.line(format!("package {}", self.opts.package));
        write_imports(&mut head, &out.imports);
        let body = out.w.finish();
        if body.trim().is_empty() {
            head.finish()
        } else {
            format!("{}\n{body}", head.finish())
        }
    }
}

fn write_imports(head: &mut CodeWriter, imports: &BTreeSet<&'static str>) {
    match imports.len() {
        0 => {}
        1 => {
            head.blank();
            for import in imports {
                head.line(format!("import \"{import}\""));
            }
        }
        _ => {
            head.blank();
            head.open("import (");
            for import in imports {
                head.line(format!("\"{import}\""));
            }
            head.close(")");
        }
    }
}

/// Source of a generic helper the lowered code refers to.
fn helper_source(name: &str) -> &'static str {
    match name {
        "ptrTo" => "func ptrTo[T any](v T) *T {\n\treturn &v\n}",
        "Exception" => {
            "// Exception is a C++ exception: the class it was thrown as and its message.\ntype Exception struct {\n\tKind    string\n\tMessage string\n}\n\nfunc (e *Exception) Error() string {\n\treturn e.Message\n}"
        }
        "Number" => {
            "type Number interface {\n\t~int | ~int8 | ~int16 | ~int32 | ~int64 | ~uint | ~uint8 | ~uint16 | ~uint32 | ~uint64 | ~float32 | ~float64\n}"
        }
        _ => "",
    }
}

/// Template parameters of a method, which Go writes as `any`.
fn method_anys(m: &Function) -> BTreeSet<String> {
    m.template.params.iter().map(|p| p.name.clone()).collect()
}

/// Replaces whole-word occurrences of `anys` in a rendered type.
pub(crate) fn erase_params(text: &str, anys: &BTreeSet<String>) -> String {
    anys.iter()
        .fold(text.to_string(), |acc, name| replace_word(&acc, name, "any"))
}

fn merge_type_params(class: &str, own: &str) -> String {
    match (class.is_empty(), own.is_empty()) {
        (true, _) => own.to_string(),
        (false, true) => class.to_string(),
        (false, false) => format!(
            "[{}, {}]",
            class.trim_start_matches('[').trim_end_matches(']'),
            own.trim_start_matches('[').trim_end_matches(']')
        ),
    }
}

/// `Type{a: x, b: y}`, broken over lines when long.
pub(crate) fn composite(ty: &str, fields: &[(String, String)]) -> String {
    if fields.is_empty() {
        return format!("{ty}{{}}");
    }
    let inline: Vec<String> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    let one_line = format!("{ty}{{{}}}", inline.join(", "));
    if fields.len() <= 3 && one_line.len() <= 72 && !one_line.contains('\n') {
        return one_line;
    }
    let mut text = format!("{ty}{{\n");
    for (k, v) in fields {
        text.push_str(&format!("\t{k}: {},\n", v.replace('\n', "\n\t")));
    }
    text.push('}');
    text
}

/// Maps need an allocated value before writes.
pub(crate) fn needs_make(ty: &Type) -> bool {
    matches!(
        ty.kind,
        TypeKind::Container {
            kind: hybrid_ir::ContainerKind::Map
                | hybrid_ir::ContainerKind::UnorderedMap
                | hybrid_ir::ContainerKind::Set
                | hybrid_ir::ContainerKind::UnorderedSet,
            ..
        }
    )
}

fn is_zero_literal(e: &Expr) -> bool {
    match e.unparen() {
        Expr::Int(v) => expr::int_literal(v).trim_start_matches('0').is_empty(),
        Expr::Bool(false) | Expr::Null => true,
        _ => false,
    }
}

fn is_int_literal(text: &str) -> bool {
    let digits = text.trim().trim_start_matches('-');
    !digits.is_empty()
        && digits
            .trim_end_matches(['u', 'U', 'l', 'L'])
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == 'x' || c == 'X' || c == '\'')
        && digits.starts_with(|c: char| c.is_ascii_digit())
}

/// Replaces `pattern` with `replacement` where it stands as a whole word.
pub(crate) fn replace_word(text: &str, pattern: &str, replacement: &str) -> String {
    let ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(pattern) {
        let end = pos + pattern.len();
        let starts_word = pattern.starts_with(ident);
        let boundary_before = !starts_word || !rest[..pos].ends_with(ident);
        let boundary_after = !rest[end..].starts_with(ident);
        out.push_str(&rest[..pos]);
        if boundary_before && boundary_after {
            out.push_str(replacement);
        } else {
            out.push_str(pattern);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests;
