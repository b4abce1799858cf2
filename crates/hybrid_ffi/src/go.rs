//! Go bindings through cgo. The preamble includes the generated C header;
//! plain structs get layout-identical Go mirrors converted with
//! `unsafe.Pointer` casts, and each handle class becomes a wrapper type with
//! an explicit `Delete`.

use hybrid_codegen::CodeWriter;
use hybrid_common::{to_camel_case, to_pascal_case, to_snake_case};

use crate::model::{FfiClass, FfiFunction, FfiFunctionKind, FfiModule, FfiStruct, FfiType, Passing};
use crate::FfiOptions;

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for",
    "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
];

/// The `<prefix>_ffi.go` file.
pub fn bindings(module: &FfiModule, opts: &FfiOptions) -> String {
    let package = opts
        .package
        .clone()
        .unwrap_or_else(|| module.prefix.replace('_', ""));
    let mut w = CodeWriter::tabs();
    if opts.comments {
        w.line("// Code generated by hybrid; DO NOT EDIT.");
        w.blank();
        w.line(format!(
            "// Package {package} binds the {} C interface through cgo.",
            module.library
        ));
    }
    w.line(format!("package {package}"));
    w.blank();
    w.line("/*");
    w.line(format!("#cgo LDFLAGS: -L. -l{} -lstdc++", module.library));
    w.line("#include <stdlib.h>");
    w.line(format!("#include \"{}.h\"", module.library));
    w.line("*/");
    w.line("import \"C\"");
    w.blank();
    w.line("import \"unsafe\"");

    for s in &module.structs {
        w.blank();
        plain_struct(&mut w, s, opts);
    }
    for f in &module.functions {
        w.blank();
        let name = to_pascal_case(&local_name(module, None, f));
        if opts.comments {
            w.line(format!("// {name} calls the C++ function `{}`.", f.name));
        }
        function(&mut w, f, &format!("func {name}"), None);
    }
    for class in &module.classes {
        w.blank();
        handle(&mut w, module, class, opts);
    }
    w.finish()
}

fn plain_struct(w: &mut CodeWriter, s: &FfiStruct, opts: &FfiOptions) {
    if opts.comments {
        w.line(format!("// {} mirrors the C struct `{}`.", s.name, s.name));
    }
    let rows: Vec<(String, String)> = s
        .fields
        .iter()
        .map(|f| (to_pascal_case(&f.name), f.ty.go_type()))
        .collect();
    let width = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    w.open(format!("type {} struct {{", s.name));
    for (name, ty) in rows {
        w.line(format!("{name:<width$} {ty}"));
    }
    w.close("}");
}

fn handle(w: &mut CodeWriter, module: &FfiModule, class: &FfiClass, opts: &FfiOptions) {
    let name = &class.name;
    if opts.comments {
        w.line(format!(
            "// {name} wraps a C++ `{name}` object. Call Delete to free it."
        ));
    }
    w.open(format!("type {name} struct {{"));
    w.line("ptr   unsafe.Pointer");
    w.line("owned bool");
    w.close("}");

    let recv = receiver(class);
    for ctor in &class.constructors {
        w.blank();
        let suffix = local_name(module, Some(name), ctor);
        let suffix = to_pascal_case(suffix.trim_start_matches("new").trim_start_matches('_'));
        let fn_name = format!("New{name}{suffix}");
        if opts.comments {
            w.line(format!("// {fn_name} constructs a `{name}`."));
        }
        function(w, ctor, &format!("func {fn_name}"), None);
    }

    w.blank();
    if opts.comments {
        w.line("// Delete frees the C++ object. The handle is unusable afterwards.");
    }
    w.open(format!("func ({recv} *{name}) Delete() {{"));
    w.open(format!("if {recv}.ptr != nil && {recv}.owned {{"));
    w.line(format!("C.{}({recv}.ptr)", class.destructor.c_name));
    w.close("}");
    w.line(format!("{recv}.ptr = nil"));
    w.close("}");

    for m in &class.methods {
        w.blank();
        let method = to_pascal_case(&local_name(module, Some(name), m));
        match m.kind {
            FfiFunctionKind::Static => {
                let fn_name = format!("{name}{method}");
                if opts.comments {
                    w.line(format!("// {fn_name} calls the static `{name}::{}`.", m.name));
                }
                function(w, m, &format!("func {fn_name}"), None);
            }
            _ => {
                if opts.comments {
                    w.line(format!("// {method} calls `{name}::{}`.", m.name));
                }
                function(w, m, &format!("func ({recv} *{name}) {method}"), Some(&recv));
            }
        }
    }
}

/// Writes one wrapper function. `recv` names the receiver whose handle is
/// passed first.
fn function(w: &mut CodeWriter, f: &FfiFunction, head: &str, recv: Option<&str>) {
    let params: Vec<String> = f
        .params
        .iter()
        .map(|p| format!("{} {}", ident(&p.name), p.ty.go_type()))
        .collect();
    let mut prelude = Vec::new();
    let mut args: Vec<String> = recv.map(|r| format!("{r}.ptr")).into_iter().collect();
    for p in &f.params {
        let name = ident(&p.name);
        args.push(argument(&p.ty, &name, &mut prelude));
    }
    let call = format!("C.{}({})", f.c_name, args.join(", "));
    let ret = f.ret.go_type();
    let ret = if ret.is_empty() { ret } else { format!(" {ret}") };

    w.open(format!("{head}({}){ret} {{", params.join(", ")));
    for line in prelude {
        w.line(line);
    }
    match &f.ret {
        FfiType::Void => w.line(call),
        FfiType::Struct(name) => {
            w.line(format!("r := {call}"));
            w.line(format!("return *(*{name})(unsafe.Pointer(&r))"));
        }
        other => w.line(format!("return {}", result(other, &call))),
    }
    w.close("}");
}

/// The C argument for a Go parameter, with any setup it needs.
fn argument(ty: &FfiType, name: &str, prelude: &mut Vec<String>) -> String {
    match ty {
        FfiType::Scalar(_) | FfiType::Enum(_) => format!("{}({name})", ty.cgo_type()),
        FfiType::CStr { .. } => {
            let c = format!("c{}", to_pascal_case(name));
            prelude.push(format!("{c} := C.CString({name})"));
            prelude.push(format!("defer C.free(unsafe.Pointer({c}))"));
            c
        }
        FfiType::ScalarPtr { .. } | FfiType::StructPtr { .. } => {
            format!("({})(unsafe.Pointer({name}))", ty.cgo_type())
        }
        FfiType::Struct(_) => format!("*(*{})(unsafe.Pointer(&{name}))", ty.cgo_type()),
        FfiType::Handle { .. } => format!("{name}.ptr"),
        FfiType::Opaque { .. } | FfiType::Void => name.to_string(),
    }
}

/// `call` converted to the wrapper's Go return type.
fn result(ty: &FfiType, call: &str) -> String {
    match ty {
        FfiType::Scalar(_) | FfiType::Enum(_) => format!("{}({call})", ty.go_type()),
        FfiType::CStr { .. } => format!("C.GoString({call})"),
        FfiType::ScalarPtr { .. } | FfiType::StructPtr { .. } => {
            format!("({})(unsafe.Pointer({call}))", ty.go_type())
        }
        FfiType::Handle { class, passing, .. } => {
            if *passing == Passing::Value {
                format!("&{class}{{ptr: {call}, owned: true}}")
            } else {
                format!("&{class}{{ptr: {call}}}")
            }
        }
        FfiType::Opaque { .. } | FfiType::Struct(_) | FfiType::Void => call.to_string(),
    }
}

/// The class's lowercase initial, unless a parameter already uses it.
fn receiver(class: &FfiClass) -> String {
    let letter = class
        .name
        .chars()
        .next()
        .map_or_else(|| "h".to_string(), |c| c.to_ascii_lowercase().to_string());
    let taken = class
        .methods
        .iter()
        .flat_map(|m| m.params.iter())
        .any(|p| ident(&p.name) == letter);
    if taken {
        "recv".to_string()
    } else {
        letter
    }
}

/// The C symbol without the library and class prefix.
fn local_name(module: &FfiModule, class: Option<&str>, f: &FfiFunction) -> String {
    let mut prefix = format!("{}_", module.prefix);
    if let Some(class) = class {
        prefix.push_str(&to_snake_case(class));
        prefix.push('_');
    }
    f.c_name.strip_prefix(&prefix).unwrap_or(&f.c_name).to_string()
}

fn ident(name: &str) -> String {
    let camel = to_camel_case(name);
    if KEYWORDS.contains(&camel.as_str()) {
        format!("{camel}_")
    } else {
        camel
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
Point create_point(float x, float y) { Point p; p.x = x; p.y = y; return p; }
size_t name_length(const char* name) { return 0; }
class Calculator {
public:
    explicit Calculator(int32_t initial_value) : value_(initial_value) {}
    int32_t getValue() const { return value_; }
    void setValue(int32_t v) { value_ = v; }
    static int32_t limit() { return 100; }
private:
    int32_t value_;
};
"#;

    fn generate() -> String {
        let module = FfiAnalyzer::new("calc").analyze(SOURCE, &DiagnosticSink::new());
        bindings(&module, &FfiOptions::default())
    }

    #[test]
    fn preamble_links_the_wrapper_library() {
        let out = generate();
        assert!(out.contains("package calc\n"), "{out}");
        assert!(out.contains("#cgo LDFLAGS: -L. -lcalc -lstdc++"), "{out}");
        assert!(out.contains("#include \"calc.h\"\n*/\nimport \"C\""), "{out}");
        assert!(out.contains("import \"unsafe\""), "{out}");
    }

    #[test]
    fn functions_convert_arguments_and_results() {
        let out = generate();
        assert!(out.contains("func Add(a int32, b int32) int32 {"), "{out}");
        assert!(out.contains("\treturn int32(C.calc_add(C.int32_t(a), C.int32_t(b)))"), "{out}");
        assert!(out.contains("func CreatePoint(x float32, y float32) Point {"), "{out}");
        assert!(out.contains("\tr := C.calc_create_point(C.float(x), C.float(y))"), "{out}");
        assert!(out.contains("\treturn *(*Point)(unsafe.Pointer(&r))"), "{out}");
        assert!(out.contains("\tcName := C.CString(name)"), "{out}");
        assert!(out.contains("\tdefer C.free(unsafe.Pointer(cName))"), "{out}");
        assert!(out.contains("\treturn uint(C.calc_name_length(cName))"), "{out}");
    }

    #[test]
    fn structs_mirror_the_c_layout() {
        let out = generate();
        assert!(out.contains("type Point struct {\n\tX float32\n\tY float32\n}"), "{out}");
    }

    #[test]
    fn handle_types_expose_delete() {
        let out = generate();
        assert!(out.contains("type Calculator struct {\n\tptr   unsafe.Pointer\n\towned bool\n}"), "{out}");
        assert!(out.contains("func NewCalculator(initialValue int32) *Calculator {"), "{out}");
        assert!(
            out.contains(
                "\treturn &Calculator{ptr: C.calc_calculator_new(C.int32_t(initialValue)), owned: true}"
            ),
            "{out}"
        );
        assert!(out.contains("func (c *Calculator) Delete() {"), "{out}");
        assert!(out.contains("\t\tC.calc_calculator_delete(c.ptr)"), "{out}");
        assert!(out.contains("func (c *Calculator) GetValue() int32 {"), "{out}");
        assert!(out.contains("\treturn int32(C.calc_calculator_get_value(c.ptr))"), "{out}");
        assert!(out.contains("\tC.calc_calculator_set_value(c.ptr, C.int32_t(v))"), "{out}");
        assert!(out.contains("func CalculatorLimit() int32 {"), "{out}");
    }
}
