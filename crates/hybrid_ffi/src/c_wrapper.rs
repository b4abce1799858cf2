//! `extern "C"` wrapper layer: a C header and the C++ file implementing it.
//!
//! Plain structs are declared in the header for C consumers only; C++
//! translation units see the original definition through the included
//! source. Handles are `void*` and every class gets a `_delete`.

use hybrid_codegen::CodeWriter;

use crate::model::{FfiFunction, FfiFunctionKind, FfiModule, FfiType, Passing};
use crate::FfiOptions;

/// `<library>.h`
pub fn header(module: &FfiModule, opts: &FfiOptions) -> String {
    let guard = format!("{}_H", module.prefix.to_ascii_uppercase());
    let mut w = CodeWriter::spaces();
    if opts.comments {
        w.line(format!(
            "/* C interface to {}. Generated by hybrid; do not edit. */",
            module.library
        ));
    }
    w.line(format!("#ifndef {guard}"));
    w.line(format!("#define {guard}"));
    w.blank();
    w.line("#include <stddef.h>");
    w.line("#include <stdint.h>");
    w.line("#ifndef __cplusplus");
    w.line("#include <stdbool.h>");
    w.line("#endif");
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("extern \"C\" {");
    w.line("#endif");

    if !module.structs.is_empty() {
        w.blank();
        w.line("#ifndef __cplusplus");
        for s in &module.structs {
            w.open(format!("typedef struct {} {{", s.name));
            for field in &s.fields {
                w.line(format!("{} {};", field.ty.c_type(), field.name));
            }
            w.close(format!("}} {};", s.name));
        }
        w.line("#endif");
    }

    if !module.functions.is_empty() {
        w.blank();
        for f in &module.functions {
            w.line(format!("{};", signature(f)));
        }
    }
    for class in &module.classes {
        w.blank();
        if opts.comments {
            w.line(format!("/* {} */", class.name));
        }
        for f in class
            .constructors
            .iter()
            .chain(std::iter::once(&class.destructor))
            .chain(&class.methods)
        {
            w.line(format!("{};", signature(f)));
        }
    }

    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("}");
    w.line("#endif");
    w.blank();
    w.line(format!("#endif /* {guard} */"));
    w.finish()
}

/// `<library>_wrapper.cpp`
pub fn implementation(module: &FfiModule, opts: &FfiOptions) -> String {
    let mut w = CodeWriter::spaces();
    if opts.comments {
        w.line(format!(
            "// extern \"C\" wrappers for {}. Generated by hybrid; do not edit.",
            module.library
        ));
        w.blank();
    }
    if let Some(include) = &opts.include {
        w.line(format!("#include \"{include}\""));
    }
    w.line(format!("#include \"{}.h\"", module.library));
    w.blank();
    w.line("extern \"C\" {");
    for f in &module.functions {
        w.blank();
        definition(&mut w, f, None);
    }
    for class in &module.classes {
        for f in class
            .constructors
            .iter()
            .chain(std::iter::once(&class.destructor))
            .chain(&class.methods)
        {
            w.blank();
            definition(&mut w, f, Some(&class.name));
        }
    }
    w.blank();
    w.line("}  // extern \"C\"");
    w.finish()
}

/// `int32_t calc_add(int32_t a, int32_t b)`
pub fn signature(f: &FfiFunction) -> String {
    let mut params = Vec::new();
    if f.takes_handle() {
        let konst = if f.is_const { "const " } else { "" };
        params.push(format!("{konst}void* handle"));
    }
    params.extend(f.params.iter().map(|p| format!("{} {}", p.ty.c_type(), p.name)));
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    format!("{} {}({params})", f.ret.c_type(), f.c_name)
}

fn definition(w: &mut CodeWriter, f: &FfiFunction, class: Option<&str>) {
    w.open(format!("{} {{", signature(f)));
    let args: Vec<String> = f.params.iter().map(|p| argument(&p.ty, &p.name)).collect();
    let args = args.join(", ");
    let target = match (f.kind, class) {
        (FfiFunctionKind::Destructor, Some(class)) => {
            w.line(format!("delete static_cast<{class}*>(handle);"));
            w.close("}");
            return;
        }
        (FfiFunctionKind::Constructor, Some(class)) => {
            w.line(format!("return new {class}({args});"));
            w.close("}");
            return;
        }
        (FfiFunctionKind::Method, Some(class)) => {
            let konst = if f.is_const { "const " } else { "" };
            format!("static_cast<{konst}{class}*>(handle)->{}", f.name)
        }
        (FfiFunctionKind::Static, Some(class)) => format!("{class}::{}", f.name),
        _ => f.name.clone(),
    };
    let call = format!("{target}({args})");
    w.line(result(&f.ret, &call));
    w.close("}");
}

/// The C++ argument for a C parameter.
fn argument(ty: &FfiType, name: &str) -> String {
    match ty {
        FfiType::Enum(e) => format!("static_cast<{e}>({name})"),
        FfiType::ScalarPtr { by_ref: true, .. } | FfiType::StructPtr { by_ref: true, .. } => {
            format!("*{name}")
        }
        FfiType::Handle {
            class,
            mutable,
            passing,
        } => {
            let konst = if *mutable { "" } else { "const " };
            match passing {
                Passing::Pointer => format!("static_cast<{konst}{class}*>({name})"),
                Passing::Value | Passing::Reference => {
                    format!("*static_cast<{konst}{class}*>({name})")
                }
            }
        }
        _ => name.to_string(),
    }
}

/// The statement returning `call` as the C type.
fn result(ret: &FfiType, call: &str) -> String {
    match ret {
        FfiType::Void => format!("{call};"),
        FfiType::Enum(_) => format!("return static_cast<int>({call});"),
        FfiType::ScalarPtr { by_ref: true, .. } | FfiType::StructPtr { by_ref: true, .. } => {
            format!("return &{call};")
        }
        FfiType::Handle {
            class, passing, ..
        } => match passing {
            Passing::Value => format!("return new {class}({call});"),
            Passing::Reference => format!("return &{call};"),
            Passing::Pointer => format!("return {call};"),
        },
        _ => format!("return {call};"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FfiAnalyzer;
    use hybrid_diagnostics::DiagnosticSink;

    const SOURCE: &str = r#"
enum Mode { Fast, Slow };
struct Point {
    float x;
    float y;
};
int32_t add(int32_t a, int32_t b) { return a + b; }
void scale(Point& p, double& factor) {}
Mode current() { return Fast; }
class Calculator {
public:
    explicit Calculator(int32_t v) : value_(v) {}
    int32_t getValue() const { return value_; }
    void absorb(const Calculator& other) { value_ += other.value_; }
    Calculator doubled() const { return Calculator(value_ * 2); }
    static int32_t limit() { return 100; }
private:
    int32_t value_;
};
"#;

    fn module() -> FfiModule {
        FfiAnalyzer::new("calc").analyze(SOURCE, &DiagnosticSink::new())
    }

    fn opts() -> FfiOptions {
        FfiOptions {
            include: Some("calc.hpp".to_string()),
            ..FfiOptions::default()
        }
    }

    #[test]
    fn header_declares_structs_for_c_only() {
        let h = header(&module(), &opts());
        assert!(h.contains("#ifndef CALC_H"), "{h}");
        assert!(h.contains("#ifndef __cplusplus\ntypedef struct Point {\n    float x;"), "{h}");
        assert!(h.contains("int32_t calc_add(int32_t a, int32_t b);"), "{h}");
        assert!(h.contains("void* calc_calculator_new(int32_t v);"), "{h}");
        assert!(h.contains("void calc_calculator_delete(void* handle);"), "{h}");
        assert!(h.contains("int32_t calc_calculator_get_value(const void* handle);"), "{h}");
        assert!(h.contains("int32_t calc_calculator_limit(void);"), "{h}");
        assert!(h.contains("int calc_current(void);"), "{h}");
    }

    #[test]
    fn implementation_forwards_each_call() {
        let cpp = implementation(&module(), &opts());
        assert!(cpp.contains("#include \"calc.hpp\"\n#include \"calc.h\""), "{cpp}");
        assert!(cpp.contains("    return add(a, b);"), "{cpp}");
        assert!(cpp.contains("    scale(*p, *factor);"), "{cpp}");
        assert!(cpp.contains("    return static_cast<int>(current());"), "{cpp}");
        assert!(cpp.contains("    return new Calculator(v);"), "{cpp}");
        assert!(cpp.contains("    delete static_cast<Calculator*>(handle);"), "{cpp}");
        assert!(
            cpp.contains("    return static_cast<const Calculator*>(handle)->getValue();"),
            "{cpp}"
        );
        assert!(
            cpp.contains(
                "    static_cast<Calculator*>(handle)->absorb(*static_cast<const Calculator*>(other));"
            ),
            "{cpp}"
        );
        assert!(
            cpp.contains(
                "    return new Calculator(static_cast<const Calculator*>(handle)->doubled());"
            ),
            "{cpp}"
        );
        assert!(cpp.contains("    return Calculator::limit();"), "{cpp}");
        assert!(cpp.trim_end().ends_with("}  // extern \"C\""), "{cpp}");
    }
}
