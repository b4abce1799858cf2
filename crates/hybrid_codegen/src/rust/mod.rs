//! Rust code generation.
//!
//! # Architecture
//!
//! - [`RustUnit`] holds the facts every item needs: the inheritance plan,
//!   which functions can fail, and how globals and class statics are stored.
//! - Items are written in a fixed order: enums, statics, traits, structs
//!   with their impls, free functions, then the optional test module.
//! - Bodies are lowered by [`body::Lowering`]. `use` lines are collected
//!   while writing and prepended once the items are done.

mod body;
mod calls;
mod expr;
mod generics;

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use hybrid_common::to_pascal_case;
use hybrid_cpp_parser::resolve_type;
use hybrid_diagnostics::{Diagnostic, DiagnosticSink, Label};
use hybrid_ir::type_map::{rust_atomic, to_rust};
use hybrid_ir::{
    AccessLevel, ClassDecl, EnumDecl, Function, Ir, Ownership, ThreadingKind, Type, TypeKind,
    Variable,
};
use hybrid_source::Span;
use tracing::debug;

use self::body::{Lowering, Site};
use self::generics::Generics;
use crate::errors::W301;
use crate::facts::{effective_return, overload_ordinal, UnitFacts};
use crate::inheritance::{BaseInfo, BaseKind, Hierarchy};
use crate::lower::ast::any_expr;
use crate::lower::scope::mutated_names;
use crate::lower::{parse_body, parse_expression, Stmt};
use crate::naming::{operator_method, rust_const, rust_ident, simple_name};
use crate::options::{Commentary, GenOptions};
use crate::writer::CodeWriter;
use crate::{CodeGenerator, GeneratedCode};

/// Generates one Rust source file per translation unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustGenerator;

impl CodeGenerator for RustGenerator {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_extension(&self) -> &'static str {
        "rs"
    }

    fn generate(&self, ir: &Ir, opts: &GenOptions, sink: &DiagnosticSink) -> GeneratedCode {
        let unit = RustUnit::new(ir, opts, sink);
        let source = unit.emit();
        debug!(bytes = source.len(), units = ir.unit_count(), "rust source generated");
        GeneratedCode {
            source,
            test_source: None,
        }
    }
}

// ============================================================================
// Unit facts
// ============================================================================

/// How a global or class static is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StaticKind {
    /// `const` item.
    Const,
    /// `static` atomic.
    Atomic,
    /// `static Mutex<()>` / `RwLock<()>`.
    Mutex { shared: bool },
    /// `static Condvar`.
    Condvar,
    /// Mutable state behind `LazyLock<Mutex<T>>`.
    Locked,
}

#[derive(Debug, Clone)]
pub(crate) struct StaticItem {
    /// Path used at every reference.
    pub path: String,
    pub kind: StaticKind,
    /// Stored type; for atomics, the value type.
    pub ty: Type,
}

fn static_item(var: &Variable, path: String) -> StaticItem {
    let atomic_value = var.ty.args().first().cloned().unwrap_or_else(|| Type::integer("int"));
    let (kind, ty) = match var.ty.threading_kind() {
        Some(ThreadingKind::Atomic) if rust_atomic(&atomic_value).starts_with("Atomic") => {
            (StaticKind::Atomic, atomic_value)
        }
        Some(ThreadingKind::Atomic) => (StaticKind::Locked, atomic_value),
        Some(ThreadingKind::SharedMutex) => (StaticKind::Mutex { shared: true }, var.ty.clone()),
        Some(k) if k.is_mutex() => (StaticKind::Mutex { shared: false }, var.ty.clone()),
        Some(ThreadingKind::ConditionVariable) => (StaticKind::Condvar, var.ty.clone()),
        _ if var.is_const || var.ty.is_const => (StaticKind::Const, var.ty.clone()),
        _ => (StaticKind::Locked, var.ty.clone()),
    };
    StaticItem { path, kind, ty }
}

/// Error type for exceptions thrown as a class other than
/// `std::runtime_error`, so handlers can tell them apart.
const EXCEPTION_TYPE: &str = "/// A C++ exception: the class it was thrown as and its message.
#[derive(Debug)]
pub struct Exception {
    pub kind: &'static str,
    pub message: String,
}

impl Exception {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl std::fmt::Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Exception {}";

pub(crate) struct RustUnit<'a> {
    pub ir: &'a Ir,
    pub opts: &'a GenOptions,
    pub sink: &'a DiagnosticSink,
    pub facts: UnitFacts<'a>,
    pub hierarchy: Hierarchy,
    /// Globals by name, class statics by `Class::name`.
    pub statics: BTreeMap<String, StaticItem>,
    /// `main` runs on the tokio runtime.
    pub async_main: bool,
    /// Classes whose fields all clone, so the struct derives `Clone`.
    pub plain: BTreeSet<String>,
    /// Some lowered code throws or catches by exception kind.
    pub exception_type: Cell<bool>,
}

/// Text being written plus the `use` lines it needs.
pub(crate) struct Out {
    pub w: CodeWriter,
    pub imports: BTreeSet<&'static str>,
    /// User concepts referenced as bounds; each becomes a marker trait.
    pub concepts: BTreeSet<String>,
}

impl<'a> RustUnit<'a> {
    fn new(ir: &'a Ir, opts: &'a GenOptions, sink: &'a DiagnosticSink) -> Self {
        let hierarchy = Hierarchy::build(ir, sink);
        let mut statics = BTreeMap::new();
        for g in &ir.globals {
            statics.insert(g.name.clone(), static_item(g, rust_const(&g.name)));
        }
        for class in &ir.classes {
            for f in class.fields.iter().filter(|f| f.is_static) {
                let mut item = static_item(f, String::new());
                item.path = match item.kind {
                    StaticKind::Const => format!("{}::{}", class.name, rust_const(&f.name)),
                    _ => format!("{}_{}", rust_const(&class.name), rust_const(&f.name)),
                };
                statics.insert(format!("{}::{}", class.name, f.name), item);
            }
        }
        let async_fns: BTreeSet<String> = ir
            .all_functions()
            .filter(|f| f.is_async())
            .map(|f| f.name.clone())
            .collect();
        let async_main = ir.find_function("main").is_some_and(|main| {
            main.is_async() || calls_any(main.body.as_deref().unwrap_or(""), &async_fns)
        });
        let plain = plain_classes(ir, &hierarchy);
        Self {
            ir,
            opts,
            sink,
            facts: UnitFacts::new(ir),
            hierarchy,
            statics,
            async_main,
            plain,
            exception_type: Cell::new(false),
        }
    }

    /// Reports a construct with no Rust lowering.
    pub fn gap(&self, span: Span, message: String) {
        self.sink.emit(
            Diagnostic::warning(W301, message, span)
                .with_label(Label::primary(span, "emitted as a marked placeholder")),
        );
    }

    /// Renders `ty`, recording the imports it needs.
    pub fn type_text(&self, ty: &Type, imports: &mut BTreeSet<&'static str>) -> String {
        hybrid_ir::type_map::rust_imports(ty, imports);
        let mut text = to_rust(ty);
        for base in self.hierarchy.bases() {
            if base.kind == BaseKind::Interface && base.has_trait() {
                for prefix in ["Box<", "Rc<", "Weak<", "&mut ", "&", "*mut ", "*const "] {
                    text = insert_dyn(&text, prefix, &base.name);
                }
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
                        let text = to_rust(&resolve_type(a));
                        let word: String = text
                            .chars()
                            .map(|c| if c.is_alphanumeric() { c } else { '_' })
                            .collect();
                        to_pascal_case(&word)
                    })
                    .collect();
                format!("{}{suffix}", class.name)
            }
            None => class.name.clone(),
        }
    }

    /// Rust name of the constructor at `index` among the class's
    /// constructors.
    pub fn ctor_ident(&self, class: &ClassDecl, index: usize) -> String {
        let ctors: Vec<&Function> = class.constructors().collect();
        let Some(ctor) = ctors.get(index) else {
            return "new".to_string();
        };
        if index == 0 {
            return "new".to_string();
        }
        if ctor.params.is_empty() {
            return "new_default".to_string();
        }
        let names = |f: &Function| -> Vec<String> {
            f.params
                .iter()
                .map(|p| rust_ident(&p.name).trim_start_matches("r#").to_string())
                .collect()
        };
        let ident = format!("with_{}", names(ctor).join("_"));
        let clash = ctors[1..index]
            .iter()
            .any(|c| !c.params.is_empty() && names(c) == names(ctor));
        if clash {
            format!("{ident}_{index}")
        } else {
            ident
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

    /// Rust name of a method, overload suffix included.
    pub fn method_ident(&self, class: Option<&ClassDecl>, method: &Function) -> String {
        let base = operator_method(&method.name)
            .map(str::to_string)
            .unwrap_or_else(|| rust_ident(&method.name));
        let ordinal = class
            .and_then(|c| {
                c.methods
                    .iter()
                    .position(|m| std::ptr::eq(m, method))
                    .map(|i| overload_ordinal(&c.methods, i))
            })
            .unwrap_or(1);
        if ordinal > 1 {
            format!("{base}_{ordinal}")
        } else {
            base
        }
    }

    /// The trait a base becomes.
    pub fn trait_name(base: &BaseInfo) -> String {
        match base.kind {
            BaseKind::Interface => simple_name(&base.name).to_string(),
            BaseKind::Data => format!("{}Trait", simple_name(&base.name)),
        }
    }

    /// True if the trait method `method` of `base` returns a `Result`: the
    /// base or any class implementing it can fail there.
    pub fn trait_method_fallible(&self, base: &BaseInfo, method: &str) -> bool {
        self.facts.method_is_fallible(&base.name, method)
            || self.ir.classes.iter().any(|c| {
                self.hierarchy
                    .direct_bases(&c.name)
                    .iter()
                    .any(|b| b.name == base.name)
                    && self.facts.method_is_fallible(&c.name, method)
            })
    }

    /// Bases whose trait `class` implements, its own trait first.
    pub fn implemented_traits(&self, class: &str) -> Vec<&BaseInfo> {
        let mut traits: Vec<&BaseInfo> = Vec::new();
        if let Some(own) = self.hierarchy.base(class) {
            if own.kind == BaseKind::Data && own.has_trait() {
                traits.push(own);
            }
        }
        traits.extend(
            self.hierarchy
                .direct_bases(class)
                .into_iter()
                .filter(|b| b.has_trait()),
        );
        traits
    }

    /// True if `class::method` returns a `Result`.
    pub fn method_fallible(&self, class: &str, method: &str) -> bool {
        if self.facts.method_is_fallible(class, method) {
            return true;
        }
        self.implemented_traits(class)
            .into_iter()
            .filter(|b| b.method(method).is_some())
            .any(|b| self.trait_method_fallible(b, method))
    }

    /// True if `method` lives in a trait impl of `class` rather than its
    /// inherent impl.
    fn in_trait(&self, class: &ClassDecl, method: &Function) -> bool {
        self.implemented_traits(&class.name)
            .iter()
            .any(|b| b.method(&method.name).is_some())
    }

    // ========================================================================
    // Items
    // ========================================================================

    fn emit(&self) -> String {
        let mut out = Out {
            w: CodeWriter::spaces(),
            imports: BTreeSet::new(),
            concepts: BTreeSet::new(),
        };
        for e in &self.ir.enums {
            self.enumeration(&mut out, e);
        }
        self.statics(&mut out);
        self.traits(&mut out);
        for &index in &self.hierarchy.order {
            self.class(&mut out, &self.ir.classes[index]);
        }
        for (index, f) in self.ir.functions.iter().enumerate() {
            self.free_function(&mut out, index, f);
        }
        if self.opts.generate_tests {
            self.tests(&mut out);
        }

        let mut head = CodeWriter::spaces();
        let mut has_head = false;
        if self.opts.commentary() == Commentary::Verbose {
            head.line("// Generated by hybrid from C++ source. Edits will be overwritten.");
            head.line(format!("// Translated units: {}", self.ir.unit_count()));
            head.blank();
            has_head = true;
        }
        for import in &out.imports {
            head.line(format!("use {import};"));
            has_head = true;
        }
        if self.exception_type.get() {
            head.blank();
            head.line(EXCEPTION_TYPE);
            has_head = true;
        }
        for concept in &out.concepts {
            head.blank();
            head.line(format!(
                "/// Stands in for the C++ concept `{concept}`; the constraint is not checked."
            ));
            head.line(format!("pub trait {concept} {{}}"));
            head.line(format!("impl<T: ?Sized> {concept} for T {{}}"));
            has_head = true;
        }
        let body = out.w.finish();
        if has_head {
            format!("{}\n{body}", head.finish())
        } else {
            body
        }
    }

    /// Origin commentary for an item.
    fn origin(&self, out: &mut Out, kind: &str, name: &str) {
        let doc = format!("/// Translated from the C++ {kind} `{name}`.");
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
        out.w.blank();
        self.origin(out, "enum", &e.name);
        out.w.line("#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]");
        let explicit = e.variants.iter().any(|(_, v)| v.is_some());
        match e.underlying.as_deref() {
            Some(underlying) => {
                out.w.line(format!("#[repr({})]", to_rust(&resolve_type(underlying))));
            }
            None if explicit => out.w.line("#[repr(i32)]"),
            None => {}
        }
        out.w.open(format!("pub enum {} {{", e.name));
        for (i, (name, value)) in e.variants.iter().enumerate() {
            if i == 0 {
                out.w.line("#[default]");
            }
            let variant = to_pascal_case(name);
            match value.as_deref() {
                Some(v) if is_int_literal(v) => {
                    out.w.line(format!("{variant} = {},", expr::int_literal(v)));
                }
                Some(v) => {
                    self.gap(
                        e.span,
                        format!("enumerator `{name}` of `{}` has a non-literal value `{v}`", e.name),
                    );
                    out.w.line(format!("{variant}, // UNTRANSLATED: = {v}"));
                }
                None => out.w.line(format!("{variant},")),
            }
        }
        out.w.close("}");
    }

    fn statics(&self, out: &mut Out) {
        let mut lowering = Lowering::new(self, Site::detached());
        for g in &self.ir.globals {
            if let Some(item) = self.statics.get(&g.name) {
                out.w.blank();
                self.static_decl(out, &mut lowering, g, item, "pub ");
            }
        }
        out.imports.extend(std::mem::take(&mut lowering.imports));
    }

    /// One global or non-const class static.
    fn static_decl(
        &self,
        out: &mut Out,
        lowering: &mut Lowering<'_>,
        var: &Variable,
        item: &StaticItem,
        vis: &str,
    ) {
        let init = var.initializer.as_deref().and_then(parse_expression);
        let path = &item.path;
        match item.kind {
            StaticKind::Const => {
                let is_string = matches!(
                    &item.ty.without_reference().kind,
                    TypeKind::Container { kind: hybrid_ir::ContainerKind::String, .. }
                );
                if is_string {
                    let literal = match &init {
                        Some(crate::lower::Expr::Str(s)) => format!("\"{s}\""),
                        _ => "\"\"".to_string(),
                    };
                    out.w.line(format!("{vis}const {path}: &str = {literal};"));
                } else {
                    let ty = lowering.rust_type(&item.ty);
                    let v = lowering.initial_value(init.as_ref(), &item.ty);
                    out.w.line(format!("{vis}const {path}: {ty} = {v};"));
                }
            }
            StaticKind::Atomic => {
                let atomic = rust_atomic(&item.ty);
                lowering.import_atomic(&atomic);
                let v = lowering.initial_value(init.as_ref(), &item.ty);
                out.w.line(format!("{vis}static {path}: {atomic} = {atomic}::new({v});"));
            }
            StaticKind::Mutex { shared } => {
                let (ty, import) = if shared {
                    ("RwLock", "std::sync::RwLock")
                } else {
                    ("Mutex", "std::sync::Mutex")
                };
                out.imports.insert(import);
                out.w.line(format!("{vis}static {path}: {ty}<()> = {ty}::new(());"));
            }
            StaticKind::Condvar => {
                out.imports.insert("std::sync::Condvar");
                out.w.line(format!("{vis}static {path}: Condvar = Condvar::new();"));
            }
            StaticKind::Locked => {
                out.imports.insert("std::sync::LazyLock");
                out.imports.insert("std::sync::Mutex");
                let ty = lowering.rust_type(&item.ty);
                let v = lowering.initial_value(init.as_ref(), &item.ty);
                out.w.line(format!(
                    "{vis}static {path}: LazyLock<Mutex<{ty}>> = LazyLock::new(|| Mutex::new({v}));"
                ));
            }
        }
    }

    // ========================================================================
    // Traits
    // ========================================================================

    fn traits(&self, out: &mut Out) {
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
            self.trait_decl(out, base);
        }
    }

    fn trait_decl(&self, out: &mut Out, base: &BaseInfo) {
        let decl = self.ir.find_class(&base.name);
        let generics = decl
            .map(|c| self.class_generics(out, c))
            .unwrap_or_default();
        out.w.blank();
        let kind = if base.parsed { "class" } else { "base class" };
        self.origin(out, kind, &base.name);
        out.w.open(format!(
            "pub trait {}{} {{",
            Self::trait_name(base),
            generics.decl
        ));
        for (i, m) in base.methods.iter().enumerate() {
            let fallible = self.trait_method_fallible(base, &m.name);
            let ident = self.method_ident(None, m);
            let header = self.signature(out, decl, m, &ident, "", fallible);
            let has_default =
                base.kind == BaseKind::Interface && !m.is_pure_virtual && m.body.is_some();
            if has_default {
                if i > 0 {
                    out.w.blank();
                }
                self.function_block(out, Site::function(decl, m, fallible), header);
            } else {
                out.w.line(format!("{header};"));
            }
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
        self.class_statics(out, class);

        out.w.blank();
        self.origin(out, if class.is_struct { "struct" } else { "class" }, &class.name);
        let fields = self.struct_fields(out, class);
        if self.plain.contains(&class.name) {
            out.w.line("#[derive(Debug, Clone)]");
        }
        if fields.is_empty() {
            out.w.line(format!("pub struct {name}{} {{}}", generics.decl));
        } else {
            out.w.open(format!("pub struct {name}{} {{", generics.decl));
            for field in fields {
                out.w.line(field);
            }
            out.w.close("}");
        }

        self.inherent_impl(out, class, &name, &generics);
        self.trait_impls(out, class, &name, &generics);
        self.drop_impl(out, class, &name, &generics);
    }

    /// Non-const class statics live at module level.
    fn class_statics(&self, out: &mut Out, class: &ClassDecl) {
        let mut lowering = Lowering::new(self, Site::detached());
        for f in class.fields.iter().filter(|f| f.is_static) {
            let key = format!("{}::{}", class.name, f.name);
            if let Some(item) = self.statics.get(&key) {
                if item.kind != StaticKind::Const {
                    out.w.blank();
                    self.static_decl(out, &mut lowering, f, item, "");
                }
            }
        }
        out.imports.extend(std::mem::take(&mut lowering.imports));
    }

    /// A mutex whose guarded fields carry their own locks is not stored.
    fn omitted_mutex(class: &ClassDecl, field: &Variable) -> bool {
        field.ty.threading_kind().is_some_and(|k| k.is_mutex())
            && class
                .threading
                .mutexes
                .iter()
                .any(|m| m.name == field.name && !m.guarded_fields.is_empty())
    }

    fn struct_fields(&self, out: &mut Out, class: &ClassDecl) -> Vec<String> {
        let mut fields = Vec::new();
        if let Some(base) = self.hierarchy.data_base(&class.name) {
            let ty = self.base_type(class, base, &mut out.imports);
            fields.push(format!("base: {ty},"));
        }
        for f in class.instance_fields() {
            if Self::omitted_mutex(class, f) {
                continue;
            }
            let vis = if f.access == AccessLevel::Public { "pub " } else { "" };
            let ty = self.field_type(class, f, &mut out.imports);
            fields.push(format!("{vis}{}: {ty},", rust_ident(&f.name)));
        }
        fields
    }

    /// The stored type of a base as spelled in the derived class.
    pub fn base_type(
        &self,
        class: &ClassDecl,
        base: &BaseInfo,
        imports: &mut BTreeSet<&'static str>,
    ) -> String {
        let spelled = class
            .bases
            .iter()
            .find(|b| simple_name(&b.name) == base.name)
            .map_or(base.name.as_str(), |b| b.name.as_str());
        self.type_text(&resolve_type(spelled), imports)
    }

    /// A field's type; guarded fields are wrapped in their own lock.
    pub fn field_type(
        &self,
        class: &ClassDecl,
        field: &Variable,
        imports: &mut BTreeSet<&'static str>,
    ) -> String {
        let inner = self.type_text(&field.ty, imports);
        match class.threading.guard_of(&field.name) {
            Some(m) if m.is_shared => {
                imports.insert("std::sync::RwLock");
                format!("RwLock<{inner}>")
            }
            Some(_) => {
                imports.insert("std::sync::Mutex");
                format!("Mutex<{inner}>")
            }
            None => inner,
        }
    }

    fn inherent_impl(&self, out: &mut Out, class: &ClassDecl, name: &str, generics: &Generics) {
        out.w.blank();
        out.w.open(format!("impl{} {name}{} {{", generics.decl, generics.args));
        let mut first = true;
        let mut lowering = Lowering::new(self, Site::detached());
        for f in class.fields.iter().filter(|f| f.is_static) {
            let key = format!("{}::{}", class.name, f.name);
            let Some(item) = self.statics.get(&key) else {
                continue;
            };
            if item.kind == StaticKind::Const {
                let vis = if f.access == AccessLevel::Public { "pub " } else { "" };
                let ty = lowering.rust_type(&item.ty);
                let value = match f.initializer.as_deref().and_then(parse_expression) {
                    Some(e) => lowering.coerce(&e, &item.ty),
                    None => lowering.default_value(&item.ty),
                };
                out.w.line(format!("{vis}const {}: {ty} = {value};", rust_const(&f.name)));
                first = false;
            }
        }
        out.imports.extend(std::mem::take(&mut lowering.imports));

        let ctors: Vec<&Function> = class.constructors().collect();
        if ctors.is_empty() {
            if !first {
                out.w.blank();
            }
            self.constructor(out, class, None, "new");
            first = false;
        }
        for (i, ctor) in ctors.iter().enumerate() {
            if !first {
                out.w.blank();
            }
            let ident = self.ctor_ident(class, i);
            self.constructor(out, class, Some(ctor), &ident);
            first = false;
        }
        for m in &class.methods {
            if m.is_constructor || m.is_destructor || self.in_trait(class, m) {
                continue;
            }
            if !first {
                out.w.blank();
            }
            let vis = if m.access == AccessLevel::Public { "pub " } else { "" };
            self.method(out, class, m, vis, self.method_fallible(&class.name, &m.name));
            first = false;
        }
        out.w.close("}");
    }

    fn constructor(&self, out: &mut Out, class: &ClassDecl, ctor: Option<&Function>, ident: &str) {
        let fallible = ctor.is_some_and(|c| self.facts.is_fallible(Some(&class.name), c));
        let mut site = Site::detached();
        site.class = Some(class);
        site.function = ctor;
        site.fallible = fallible;
        site.receiver = "this";
        let mut lowering = Lowering::new(self, site);

        let params = ctor.map_or_else(String::new, |c| self.params(out, c));
        let ret = if fallible {
            "Result<Self, Box<dyn std::error::Error>>"
        } else {
            "Self"
        };
        let vis = ctor.map_or("pub ", |c| {
            if c.access == AccessLevel::Public {
                "pub "
            } else {
                ""
            }
        });
        if let Some(c) = ctor {
            let kind = if c.params.is_empty() {
                "default constructor"
            } else {
                "constructor"
            };
            self.origin(out, kind, &class.name);
        }
        out.w.open(format!("{vis}fn {ident}({params}) -> {ret} {{"));
        let inits = lowering.field_inits(class, ctor);
        let body = ctor
            .and_then(|c| c.body.as_deref())
            .map(parse_body)
            .unwrap_or_default();
        let wrap = |v: &str| {
            if fallible {
                format!("Ok({v})")
            } else {
                v.to_string()
            }
        };
        if body.is_empty() {
            if inits.is_empty() {
                out.w.line(wrap("Self {}"));
            } else {
                out.w.open(format!("{}Self {{", if fallible { "Ok(" } else { "" }));
                for line in &inits {
                    out.w.line(line);
                }
                out.w.close(if fallible { "})" } else { "}" });
            }
        } else {
            if inits.is_empty() {
                out.w.line("let mut this = Self {};");
            } else {
                out.w.open("let mut this = Self {");
                for line in &inits {
                    out.w.line(line);
                }
                out.w.close("};");
            }
            lowering.statements(&body, &mut out.w);
            out.w.line(wrap("this"));
        }
        out.w.close("}");
        out.imports.extend(std::mem::take(&mut lowering.imports));
    }

    fn method(&self, out: &mut Out, class: &ClassDecl, m: &Function, vis: &str, fallible: bool) {
        self.origin(out, "method", &format!("{}::{}", class.name, m.name));
        let ident = self.method_ident(Some(class), m);
        if self.opts.inline_small_methods()
            && parse_body(m.body.as_deref().unwrap_or("")).len() == 1
        {
            out.w.line("#[inline]");
        }
        let header = self.signature(out, Some(class), m, &ident, vis, fallible);
        self.function_block(out, Site::function(Some(class), m, fallible), header);
    }

    fn trait_impls(&self, out: &mut Out, class: &ClassDecl, name: &str, generics: &Generics) {
        for base in self.implemented_traits(&class.name) {
            let trait_args = if base.name == class.name {
                generics.args.clone()
            } else {
                let spelled = self.base_type(class, base, &mut out.imports);
                spelled
                    .find('<')
                    .map_or_else(String::new, |i| spelled[i..].to_string())
            };
            out.w.blank();
            out.w.open(format!(
                "impl{} {}{trait_args} for {name}{} {{",
                generics.decl,
                Self::trait_name(base),
                generics.args
            ));
            let mut first = true;
            for bm in &base.methods {
                if self.trait_method(out, class, base, bm, first) {
                    first = false;
                }
            }
            out.w.close("}");
        }
    }

    /// Writes one method of a trait impl. Returns false when the trait's
    /// default body is used.
    fn trait_method(
        &self,
        out: &mut Out,
        class: &ClassDecl,
        base: &BaseInfo,
        bm: &Function,
        first: bool,
    ) -> bool {
        let fallible = self.trait_method_fallible(base, &bm.name);
        let ident = self.method_ident(None, bm);
        let own = class
            .methods
            .iter()
            .find(|m| m.name == bm.name && !m.is_constructor && !m.is_destructor);
        let delegate_to = |out: &mut Out, header: String, call: String| {
            out.w.open(format!("{header} {{"));
            out.w.line(call);
            out.w.close("}");
        };
        let args: Vec<String> = bm.params.iter().map(|p| rust_ident(&p.name)).collect();
        let awaited = if bm.is_async() { ".await" } else { "" };

        if let Some(owner) = self.hierarchy.collision_owner(&class.name, &bm.name) {
            if owner != base.name {
                if let Some(owner_base) = self.hierarchy.base(owner) {
                    if !first {
                        out.w.blank();
                    }
                    let header = self.signature(out, None, bm, &ident, "", fallible);
                    let receiver = if bm.is_static { vec![] } else { vec!["self".to_string()] };
                    let call_args: Vec<String> = receiver.into_iter().chain(args).collect();
                    let call = format!(
                        "<Self as {}>::{ident}({}){awaited}",
                        Self::trait_name(owner_base),
                        call_args.join(", ")
                    );
                    delegate_to(out, header, call);
                    return true;
                }
            }
        }
        if !first {
            out.w.blank();
        }
        if let Some(own) = own {
            let header = self.signature(out, Some(class), own, &ident, "", fallible);
            self.function_block(out, Site::function(Some(class), own, fallible), header);
            return true;
        }
        if base.kind == BaseKind::Data && base.parsed && base.name != class.name {
            let header = self.signature(out, None, bm, &ident, "", fallible);
            let call = format!("self.base.{ident}({}){awaited}", args.join(", "));
            delegate_to(out, header, call);
            return true;
        }
        if base.kind == BaseKind::Interface && !bm.is_pure_virtual && bm.body.is_some() {
            return false;
        }
        let header = self.signature(out, None, bm, &ident, "", fallible);
        let call = format!("unimplemented!(\"`{}` is abstract in `{}`\")", bm.name, class.name);
        delegate_to(out, header, call);
        true
    }

    fn drop_impl(&self, out: &mut Out, class: &ClassDecl, name: &str, generics: &Generics) {
        let Some(dtor) = class.methods.iter().find(|m| m.is_destructor) else {
            return;
        };
        if dtor.body.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return;
        }
        out.w.blank();
        out.w.open(format!("impl{} Drop for {name}{} {{", generics.decl, generics.args));
        self.origin(out, "destructor", &dtor.name);
        self.function_block(
            out,
            Site::function(Some(class), dtor, false),
            "fn drop(&mut self)".to_string(),
        );
        out.w.close("}");
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn free_function(&self, out: &mut Out, index: usize, f: &Function) {
        out.w.blank();
        let is_main = f.name == "main";
        let ordinal = overload_ordinal(&self.ir.functions, index);
        let ident = if is_main {
            "main".to_string()
        } else if ordinal > 1 {
            format!("{}_{ordinal}", rust_ident(&f.name))
        } else {
            rust_ident(&f.name)
        };
        let fallible = self.facts.is_fallible(None, f);
        self.origin(out, "function", &f.name);
        let vis = if f.is_static || is_main { "" } else { "pub " };

        if f.body.is_none() {
            let header = self.signature(out, None, f, &ident, vis, fallible);
            out.w.open(format!("{header} {{"));
            out.w.line(format!(
                "unimplemented!(\"`{}` is declared but not defined in this unit\")",
                f.name
            ));
            out.w.close("}");
            return;
        }

        if !is_main {
            let header = self.signature(out, None, f, &ident, vis, fallible);
            self.function_block(out, Site::function(None, f, fallible), header);
            return;
        }

        if !f.params.is_empty() {
            self.gap(f.span, "the parameters of `main`".to_string());
        }
        let asyncness = if self.async_main {
            out.w.line("#[tokio::main]");
            "async "
        } else {
            ""
        };
        let ret = if fallible {
            " -> Result<(), Box<dyn std::error::Error>>"
        } else {
            ""
        };
        let mut site = Site::function(None, f, fallible);
        site.is_main = true;
        site.is_async = self.async_main;
        site.return_type = None;
        self.function_block(out, site, format!("{asyncness}fn main(){ret}"));
    }

    /// `header { body }` for a function with a body.
    fn function_block(&self, out: &mut Out, site: Site<'_>, header: String) {
        let stmts = site
            .function
            .and_then(|f| f.body.as_deref())
            .map(parse_body)
            .unwrap_or_default();
        let mut lowering = Lowering::new(self, site);
        if stmts.is_empty() {
            let tail = lowering.empty_body();
            out.w.line(format!("{header} {{{tail}}}"));
        } else {
            out.w.open(format!("{header} {{"));
            lowering.function_body(&stmts, &mut out.w);
            out.w.close("}");
        }
        out.imports.extend(std::mem::take(&mut lowering.imports));
    }

    /// `vis async fn name<G>(receiver, params) -> R`.
    fn signature(
        &self,
        out: &mut Out,
        class: Option<&ClassDecl>,
        m: &Function,
        ident: &str,
        vis: &str,
        fallible: bool,
    ) -> String {
        let receiver = match (m.is_static || class.is_none() && !m.is_virtual, m.is_const) {
            (true, _) => None,
            (false, true) => Some("&self"),
            (false, false) => Some("&mut self"),
        };
        let generics = self.function_generics(out, m);
        let params = self.params(out, m);
        let params = match (receiver, params.is_empty()) {
            (Some(r), true) => r.to_string(),
            (Some(r), false) => format!("{r}, {params}"),
            (None, _) => params,
        };
        let ret = self.return_text(out, m, fallible);
        let asyncness = if m.is_async() { "async " } else { "" };
        format!("{vis}{asyncness}fn {ident}{}({params}){ret}", generics.decl)
    }

    /// Parameter list; by-value parameters the body writes to are `mut`.
    fn params(&self, out: &mut Out, f: &Function) -> String {
        let mutated = f
            .body
            .as_deref()
            .map(|b| mutated_names(&parse_body(b)))
            .unwrap_or_default();
        f.params
            .iter()
            .map(|p| {
                let by_value = !matches!(
                    p.ty.kind,
                    TypeKind::Reference { .. } | TypeKind::Pointer { .. }
                );
                let mutable = if by_value && mutated.contains(&p.name) { "mut " } else { "" };
                format!(
                    "{mutable}{}: {}",
                    rust_ident(&p.name),
                    self.type_text(&p.ty, &mut out.imports)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn return_text(&self, out: &mut Out, f: &Function, fallible: bool) -> String {
        let value = effective_return(f).map(|t| self.type_text(&t, &mut out.imports));
        match (value, fallible) {
            (None, false) => String::new(),
            (Some(v), false) => format!(" -> {v}"),
            (v, true) => format!(
                " -> Result<{}, Box<dyn std::error::Error>>",
                v.unwrap_or_else(|| "()".to_string())
            ),
        }
    }

    // ========================================================================
    // Tests
    // ========================================================================

    fn tests(&self, out: &mut Out) {
        let classes: Vec<&ClassDecl> = self
            .hierarchy
            .order
            .iter()
            .map(|&i| &self.ir.classes[i])
            .filter(|c| !self.hierarchy.is_interface(&c.name) && c.template.params.is_empty())
            .collect();
        if classes.is_empty() {
            return;
        }
        out.w.blank();
        out.w.line("#[cfg(test)]");
        out.w.open("mod tests {");
        out.w.line("use super::*;");
        let mut lowering = Lowering::new(self, Site::detached());
        for class in classes {
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
            let ctor = class.constructors().next();
            let call = match ctor {
                Some(c) if c.params.iter().any(|p| p.default_value.is_some()) => {
                    let index = self.select_constructor(class, args.len());
                    format!("{}::{}", self.type_name(class), self.ctor_ident(class, index))
                }
                _ => format!("{}::new", self.type_name(class)),
            };
            out.w.blank();
            out.w.line("#[test]");
            out.w.open(format!("fn {}_constructs() {{", rust_ident(&class.name)));
            out.w.line(format!("let _value = {call}({});", args.join(", ")));
            out.w.close("}");
        }
        out.w.close("}");
        out.imports.extend(std::mem::take(&mut lowering.imports));
    }
}

/// Classes that can derive `Debug` and `Clone`, found to a fixed point.
fn plain_classes(ir: &Ir, hierarchy: &Hierarchy) -> BTreeSet<String> {
    let enums: BTreeSet<&str> = ir.enums.iter().map(|e| e.name.as_str()).collect();
    let mut plain: BTreeSet<String> = BTreeSet::new();
    loop {
        let mut changed = false;
        for class in &ir.classes {
            if plain.contains(&class.name) || hierarchy.is_interface(&class.name) {
                continue;
            }
            let base_ok = hierarchy
                .data_base(&class.name)
                .map_or(true, |b| plain.contains(&b.name));
            let fields_ok = class
                .instance_fields()
                .all(|f| is_plain(&f.ty, &plain, &enums));
            if base_ok && fields_ok {
                plain.insert(class.name.clone());
                changed = true;
            }
        }
        if !changed {
            return plain;
        }
    }
}

fn is_plain(ty: &Type, plain: &BTreeSet<String>, enums: &BTreeSet<&str>) -> bool {
    match &ty.kind {
        TypeKind::Void
        | TypeKind::Bool
        | TypeKind::Integer
        | TypeKind::Float
        | TypeKind::Enum
        | TypeKind::TemplateParam => true,
        TypeKind::Pointer { pointee, ownership } => match ownership {
            Ownership::Raw | Ownership::Weak => true,
            _ => is_plain(pointee, plain, enums),
        },
        TypeKind::Reference { .. } => false,
        TypeKind::Array { element, .. } => is_plain(element, plain, enums),
        TypeKind::Struct | TypeKind::Class => {
            let name = ty.base_name();
            plain.contains(name) || enums.contains(name)
        }
        TypeKind::Function { erased, .. } => !erased,
        TypeKind::Container { args, .. } => args.iter().all(|a| is_plain(a, plain, enums)),
        TypeKind::Threading { .. } | TypeKind::Async { .. } => false,
    }
}

/// True if `body` calls any of `names`.
fn calls_any(body: &str, names: &BTreeSet<String>) -> bool {
    if names.is_empty() {
        return false;
    }
    let stmts: Vec<Stmt> = parse_body(body);
    any_expr(&stmts, &mut |e| {
        e.call_name()
            .is_some_and(|n| names.contains(simple_name(n)))
    })
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

/// Rewrites `{prefix}{name}` to `{prefix}dyn {name}` at word boundaries.
fn insert_dyn(text: &str, prefix: &str, name: &str) -> String {
    let pattern = format!("{prefix}{name}");
    let ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(&pattern) {
        let end = pos + pattern.len();
        let boundary_after = !rest[end..].starts_with(ident);
        let boundary_before = !rest[..pos].ends_with(ident);
        out.push_str(&rest[..pos]);
        if boundary_after && boundary_before {
            out.push_str(prefix);
            out.push_str("dyn ");
            out.push_str(name);
        } else {
            out.push_str(&pattern);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests;
