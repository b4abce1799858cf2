//! Rust bindings: an `extern "C"` block over the wrapper symbols, `#[repr(C)]`
//! mirrors of plain structs, and safe wrappers. Each handle class becomes an
//! owning struct whose `Drop` calls the class's `_delete`.

use std::collections::BTreeSet;

use hybrid_codegen::CodeWriter;
use hybrid_ir::type_map::rust_token;

use crate::model::{FfiClass, FfiFunction, FfiFunctionKind, FfiModule, FfiStruct, FfiType, Passing};
use crate::FfiOptions;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "super", "trait", "true", "type", "unsafe",
    "use", "where", "while", "yield",
];

/// The `<prefix>_ffi.rs` module.
pub fn bindings(module: &FfiModule, opts: &FfiOptions) -> String {
    let mut body = CodeWriter::spaces();
    for s in &module.structs {
        body.blank();
        plain_struct(&mut body, s, opts);
    }

    body.blank();
    body.line(format!("#[link(name = \"{}\")]", module.library));
    body.open("extern \"C\" {");
    for f in module.entry_points() {
        body.line(format!("fn {};", raw_signature(f)));
    }
    body.close("}");

    for f in &module.functions {
        body.blank();
        free_function(&mut body, module, f, opts);
    }
    for class in &module.classes {
        body.blank();
        handle(&mut body, module, class, opts);
    }
    let body = body.finish();

    let mut ffi: BTreeSet<&str> = BTreeSet::new();
    for (needle, item) in [("c_void", "c_void"), ("c_char", "c_char"), ("CStr", "CStr")] {
        if body.contains(needle) {
            ffi.insert(item);
        }
    }

    let mut head = CodeWriter::spaces();
    if opts.comments {
        head.line(format!(
            "//! Rust bindings for the `{}` C interface. Generated by hybrid; do not edit.",
            module.library
        ));
        head.blank();
    }
    match ffi.len() {
        0 => {}
        1 => head.line(format!("use std::ffi::{};", ffi.iter().next().copied().unwrap_or_default())),
        _ => head.line(format!(
            "use std::ffi::{{{}}};",
            ffi.into_iter().collect::<Vec<_>>().join(", ")
        )),
    }
    format!("{}\n{body}", head.finish())
}

fn plain_struct(w: &mut CodeWriter, s: &FfiStruct, opts: &FfiOptions) {
    if opts.comments {
        w.line(format!("/// Mirror of the C++ struct `{}`.", s.name));
    }
    w.line("#[repr(C)]");
    w.line("#[derive(Debug, Clone, Copy, PartialEq)]");
    w.open(format!("pub struct {} {{", s.name));
    for field in &s.fields {
        w.line(format!("pub {}: {},", ident(&field.name), field.ty.rust_raw()));
    }
    w.close("}");
}

/// `calc_add(a: i32, b: i32) -> i32`
fn raw_signature(f: &FfiFunction) -> String {
    let mut params = Vec::new();
    if f.takes_handle() {
        let ptr = if f.is_const { "*const" } else { "*mut" };
        params.push(format!("handle: {ptr} c_void"));
    }
    params.extend(
        f.params
            .iter()
            .map(|p| format!("{}: {}", ident(&p.name), p.ty.rust_raw())),
    );
    format!("{}({}){}", f.c_name, params.join(", "), arrow(&f.ret.rust_raw()))
}

fn arrow(ty: &str) -> String {
    if ty == "()" {
        String::new()
    } else {
        format!(" -> {ty}")
    }
}

fn free_function(w: &mut CodeWriter, module: &FfiModule, f: &FfiFunction, opts: &FfiOptions) {
    if opts.comments {
        w.line(format!("/// Calls the C++ function `{}`.", f.name));
    }
    let name = local_name(module, None, f);
    wrapper(w, f, &format!("pub {}fn {name}", unsafe_kw(f)), None, opts);
}

fn handle(w: &mut CodeWriter, module: &FfiModule, class: &FfiClass, opts: &FfiOptions) {
    let name = &class.name;
    if opts.comments {
        w.line(format!("/// Handle to a C++ `{name}` object."));
    }
    w.open(format!("pub struct {name} {{"));
    w.line("ptr: *mut c_void,");
    w.line("owned: bool,");
    w.close("}");
    w.blank();
    w.open(format!("impl {name} {{"));
    for ctor in &class.constructors {
        let fn_name = local_name(module, Some(name), ctor);
        wrapper(w, ctor, &format!("pub {}fn {fn_name}", unsafe_kw(ctor)), None, opts);
        w.blank();
    }
    w.line("/// Takes ownership of a handle created by this library.");
    w.line("///");
    w.line("/// # Safety");
    w.line("///");
    w.line(format!(
        "/// `ptr` must point to a live `{name}` that nothing else will delete."
    ));
    w.open("pub unsafe fn from_raw(ptr: *mut c_void) -> Self {");
    w.line("Self { ptr, owned: true }");
    w.close("}");
    w.blank();
    w.line("/// The underlying handle.");
    w.open("pub fn as_ptr(&self) -> *mut c_void {");
    w.line("self.ptr");
    w.close("}");
    for m in &class.methods {
        w.blank();
        let fn_name = local_name(module, Some(name), m);
        let receiver = match m.kind {
            FfiFunctionKind::Method if m.is_const => Some("&self"),
            FfiFunctionKind::Method => Some("&mut self"),
            _ => None,
        };
        wrapper(w, m, &format!("pub {}fn {fn_name}", unsafe_kw(m)), receiver, opts);
    }
    w.close("}");
    w.blank();
    w.open(format!("impl Drop for {name} {{"));
    w.open("fn drop(&mut self) {");
    w.open("if self.owned {");
    if opts.safety_comments {
        w.line("// SAFETY: an owned handle is deleted exactly once, here.");
    }
    w.line(format!("unsafe {{ {}(self.ptr) }}", class.destructor.c_name));
    w.close("}");
    w.close("}");
    w.close("}");
}

/// Writes one safe wrapper: `head(params) -> ret { unsafe { call } }`.
fn wrapper(w: &mut CodeWriter, f: &FfiFunction, head: &str, receiver: Option<&str>, opts: &FfiOptions) {
    if f.params.iter().any(|p| p.ty.is_unchecked()) {
        w.line("///");
        w.line("/// # Safety");
        w.line("///");
        w.line("/// Pointer arguments must be valid for the C++ callee.");
    }
    let mut params: Vec<String> = receiver.map(str::to_string).into_iter().collect();
    params.extend(
        f.params
            .iter()
            .map(|p| format!("{}: {}", ident(&p.name), safe_type(&p.ty))),
    );
    let mut args: Vec<String> = Vec::new();
    if f.takes_handle() {
        args.push("self.ptr".to_string());
    }
    args.extend(f.params.iter().map(|p| argument(&p.ty, &ident(&p.name))));
    let call = format!("{}({})", f.c_name, args.join(", "));

    let ret = if f.kind == FfiFunctionKind::Constructor {
        "Self".to_string()
    } else {
        safe_return(&f.ret)
    };
    w.open(format!("{head}({}){} {{", params.join(", "), arrow(&ret)));
    if opts.safety_comments {
        w.line(format!("// SAFETY: {}", safety_note(f)));
    }
    match &f.ret {
        FfiType::CStr { .. } => {
            w.line(format!("let raw = unsafe {{ {call} }};"));
            w.open("if raw.is_null() {");
            w.line("return String::new();");
            w.close("}");
            w.line("unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()");
        }
        FfiType::Handle { class, passing, .. } => {
            let owned = *passing == Passing::Value;
            let ptr = if f.ret.rust_raw().starts_with("*const") {
                format!("unsafe {{ {call} }}.cast_mut()")
            } else {
                format!("unsafe {{ {call} }}")
            };
            let ty = if f.kind == FfiFunctionKind::Constructor {
                "Self"
            } else {
                class.as_str()
            };
            w.line(format!("{ty} {{ ptr: {ptr}, owned: {owned} }}"));
        }
        _ => w.line(format!("unsafe {{ {call} }}")),
    }
    w.close("}");
}

fn safety_note(f: &FfiFunction) -> &'static str {
    if f.takes_handle() {
        "`self.ptr` is a live handle and the arguments match the C signature."
    } else if f.params.iter().any(|p| p.ty.is_unchecked()) {
        "the caller upholds the pointer contract documented above."
    } else {
        "the arguments match the C signature."
    }
}

fn unsafe_kw(f: &FfiFunction) -> &'static str {
    if f.params.iter().any(|p| p.ty.is_unchecked()) {
        "unsafe "
    } else {
        ""
    }
}

/// Parameter type of a safe wrapper.
fn safe_type(ty: &FfiType) -> String {
    match ty {
        FfiType::CStr { mutable: false } => "&CStr".to_string(),
        FfiType::ScalarPtr {
            target,
            mutable,
            by_ref: true,
        } => borrow(*mutable, rust_token(target)),
        FfiType::StructPtr { name, mutable, .. } => borrow(*mutable, name),
        FfiType::Handle {
            class,
            mutable,
            passing,
        } => borrow(*mutable && *passing != Passing::Value, class),
        other => other.rust_raw(),
    }
}

fn borrow(mutable: bool, pointee: &str) -> String {
    if mutable {
        format!("&mut {pointee}")
    } else {
        format!("&{pointee}")
    }
}

fn argument(ty: &FfiType, name: &str) -> String {
    match ty {
        FfiType::CStr { mutable: false } => format!("{name}.as_ptr()"),
        FfiType::Handle { .. } => format!("{name}.ptr"),
        _ => name.to_string(),
    }
}

fn safe_return(ty: &FfiType) -> String {
    match ty {
        FfiType::CStr { .. } => "String".to_string(),
        FfiType::Handle { class, .. } => class.clone(),
        other => other.rust_raw(),
    }
}

/// The wrapper's own name: the C symbol without the library and class
/// prefix (`calc_calculator_get_value` → `get_value`).
fn local_name(module: &FfiModule, class: Option<&str>, f: &FfiFunction) -> String {
    let mut prefix = format!("{}_", module.prefix);
    if let Some(class) = class {
        prefix.push_str(&hybrid_common::to_snake_case(class));
        prefix.push('_');
    }
    ident(f.c_name.strip_prefix(&prefix).unwrap_or(&f.c_name))
}

fn ident(name: &str) -> String {
    let snake = hybrid_common::to_snake_case(name);
    if snake == "self" || snake == "Self" {
        format!("{snake}_")
    } else if KEYWORDS.contains(&snake.as_str()) {
        format!("r#{snake}")
    } else {
        snake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FfiAnalyzer;
    use hybrid_diagnostics::DiagnosticSink;

    const SOURCE: &str = r#"
struct Point {
    float x;
    float y;
};
int32_t add(int32_t a, int32_t b) { return a + b; }
float point_distance(const Point* p) { return p->x; }
void fill(int32_t* values, size_t length) {}
size_t name_length(const char* name) { return 0; }
class Calculator {
public:
    explicit Calculator(int32_t v) : value_(v) {}
    int32_t getValue() const { return value_; }
    void setValue(int32_t v) { value_ = v; }
private:
    int32_t value_;
};
"#;

    fn generate() -> String {
        let module = FfiAnalyzer::new("calc").analyze(SOURCE, &DiagnosticSink::new());
        bindings(&module, &FfiOptions::default())
    }

    #[test]
    fn extern_block_links_the_library() {
        let out = generate();
        assert!(out.contains("use std::ffi::{CStr, c_char, c_void};"), "{out}");
        assert!(out.contains("#[link(name = \"calc\")]\nextern \"C\" {"), "{out}");
        assert!(out.contains("    fn calc_add(a: i32, b: i32) -> i32;"), "{out}");
        assert!(out.contains("    fn calc_calculator_new(v: i32) -> *mut c_void;"), "{out}");
        assert!(
            out.contains("    fn calc_calculator_get_value(handle: *const c_void) -> i32;"),
            "{out}"
        );
        assert!(out.contains("    fn calc_calculator_delete(handle: *mut c_void);"), "{out}");
    }

    #[test]
    fn plain_structs_are_repr_c() {
        let out = generate();
        assert!(out.contains("#[repr(C)]\n#[derive(Debug, Clone, Copy, PartialEq)]\npub struct Point {"), "{out}");
        assert!(out.contains("    pub x: f32,"), "{out}");
        assert!(out.contains("pub fn point_distance(p: &Point) -> f32 {"), "{out}");
    }

    #[test]
    fn safe_wrappers_and_unsafe_pointer_functions() {
        let out = generate();
        assert!(out.contains("pub fn add(a: i32, b: i32) -> i32 {"), "{out}");
        assert!(out.contains("    // SAFETY: the arguments match the C signature."), "{out}");
        assert!(out.contains("    unsafe { calc_add(a, b) }"), "{out}");
        assert!(out.contains("pub unsafe fn fill(values: *mut i32, length: usize) {"), "{out}");
        assert!(out.contains("pub fn name_length(name: &CStr) -> usize {"), "{out}");
        assert!(out.contains("calc_name_length(name.as_ptr())"), "{out}");
    }

    #[test]
    fn handles_own_and_drop_the_object() {
        let out = generate();
        assert!(out.contains("pub struct Calculator {\n    ptr: *mut c_void,\n    owned: bool,\n}"), "{out}");
        assert!(out.contains("    pub fn new(v: i32) -> Self {"), "{out}");
        assert!(out.contains("Self { ptr: unsafe { calc_calculator_new(v) }, owned: true }"), "{out}");
        assert!(out.contains("    pub fn get_value(&self) -> i32 {"), "{out}");
        assert!(out.contains("    pub fn set_value(&mut self, v: i32) {"), "{out}");
        assert!(out.contains("unsafe { calc_calculator_set_value(self.ptr, v) }"), "{out}");
        assert!(out.contains("impl Drop for Calculator {"), "{out}");
        assert!(out.contains("unsafe { calc_calculator_delete(self.ptr) }"), "{out}");
    }

    #[test]
    fn returned_pointers_borrow_the_object() {
        let source = r#"
class Node {
public:
    Node() {}
    Node* next() { return next_; }
private:
    Node* next_;
};
"#;
        let module = FfiAnalyzer::new("graph").analyze(source, &DiagnosticSink::new());
        let out = bindings(&module, &FfiOptions::default());
        assert!(out.contains("    pub fn new() -> Self {"), "{out}");
        assert!(out.contains("owned: true }"), "{out}");
        assert!(out.contains("    pub fn next(&mut self) -> Node {"), "{out}");
        assert!(
            out.contains("Node { ptr: unsafe { graph_node_next(self.ptr) }, owned: false }"),
            "{out}"
        );
        assert!(out.contains("if self.owned {"), "{out}");
    }

    #[test]
    fn safety_comments_can_be_turned_off() {
        let module = FfiAnalyzer::new("calc").analyze(SOURCE, &DiagnosticSink::new());
        let opts = FfiOptions {
            safety_comments: false,
            comments: false,
            ..FfiOptions::default()
        };
        let out = bindings(&module, &opts);
        assert!(!out.contains("SAFETY"), "{out}");
        assert!(!out.contains("Generated by hybrid"), "{out}");
    }
}
