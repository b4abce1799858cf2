//! Decides what crosses the C ABI and how.
//!
//! The source is parsed with the structural parser, then each declaration is
//! projected onto the [`FfiModule`] model. Classes with public data only and
//! no members become plain structs mirrored on every side; every other class
//! is reached through an opaque handle. A declaration that cannot be
//! expressed is dropped with a W401 warning naming the first reason found.

use std::collections::{BTreeMap, BTreeSet};

use hybrid_common::to_snake_case;
use hybrid_cpp_parser::{lexer::lex_texts, CppToken};
use hybrid_diagnostics::{Diagnostic, DiagnosticSink, Label};
use hybrid_ir::type_map::lookup;
use hybrid_ir::{AccessLevel, ClassDecl, ExceptionSpec, Function, Ir, Ownership, Type, TypeKind};
use hybrid_source::Span;
use tracing::debug;

use crate::errors::W401;
use crate::model::{
    FfiClass, FfiFunction, FfiFunctionKind, FfiModule, FfiParam, FfiStruct, FfiType,
    Incompatibility, Passing, Skipped,
};

/// Builds the FFI model of one C++ source file.
#[derive(Debug, Default)]
pub struct FfiAnalyzer {
    library: String,
    prefix: String,
    enums: BTreeSet<String>,
    structs: BTreeSet<String>,
    handles: BTreeSet<String>,
    symbols: BTreeMap<String, usize>,
    skipped: Vec<Skipped>,
}

impl FfiAnalyzer {
    /// An analyzer whose exported symbols start with `library`'s prefix.
    pub fn new(library: &str) -> Self {
        Self {
            library: library.to_string(),
            prefix: symbol_prefix(library),
            ..Self::default()
        }
    }

    /// Parses `source` and classifies every declaration. Parser warnings and
    /// W401 reports go to `sink`.
    pub fn analyze(mut self, source: &str, sink: &DiagnosticSink) -> FfiModule {
        let ir = hybrid_cpp_parser::parse_str(source, sink);
        let module = self.module(&ir);
        for skip in &module.skipped {
            sink.emit(
                Diagnostic::warning(
                    W401,
                    format!("`{}` is not exposed through C: {}", skip.name, skip.reason),
                    skip.span,
                )
                .with_label(Label::primary(skip.span, "left out of the bindings")),
            );
        }
        debug!(
            library = %module.library,
            structs = module.structs.len(),
            classes = module.classes.len(),
            functions = module.functions.len(),
            skipped = module.skipped.len(),
            "ffi module analyzed"
        );
        module
    }

    fn module(&mut self, ir: &Ir) -> FfiModule {
        self.enums = ir
            .enums
            .iter()
            .map(|e| base_name(&e.name).to_string())
            .collect();

        let mut structs = Vec::new();
        let mut handle_decls = Vec::new();
        for class in &ir.classes {
            if class.template_header.is_some() {
                self.skip(&class.name, Incompatibility::Template, class.span);
                continue;
            }
            match self.plain_struct(class) {
                Some(s) => {
                    self.structs.insert(s.name.clone());
                    structs.push(s);
                }
                None => {
                    self.handles.insert(base_name(&class.name).to_string());
                    handle_decls.push(class);
                }
            }
        }

        let classes: Vec<FfiClass> = handle_decls.into_iter().map(|c| self.class(c)).collect();

        let mut functions = Vec::new();
        for f in &ir.functions {
            if f.name == "main" || f.name.contains("::") {
                continue;
            }
            match self.function(f, None) {
                Ok(func) => functions.push(func),
                Err(reason) => self.skip(&f.name, reason, f.span),
            }
        }

        let mut skipped = std::mem::take(&mut self.skipped);
        skipped.sort_by_key(|s| s.span.start);
        FfiModule {
            library: self.library.clone(),
            prefix: self.prefix.clone(),
            structs,
            classes,
            functions,
            skipped,
        }
    }

    /// A class with public data members only and nothing else.
    fn plain_struct(&self, class: &ClassDecl) -> Option<FfiStruct> {
        if !class.methods.is_empty() || !class.bases.is_empty() {
            return None;
        }
        let mut fields = Vec::new();
        for field in class.instance_fields() {
            if field.access != AccessLevel::Public {
                return None;
            }
            let ty = match self.classify(&field.ty) {
                Ok(ty @ (FfiType::Scalar(_) | FfiType::Struct(_) | FfiType::Enum(_))) => ty,
                _ => return None,
            };
            fields.push(FfiParam {
                name: field.name.clone(),
                ty,
            });
        }
        if fields.is_empty() {
            return None;
        }
        Some(FfiStruct {
            name: base_name(&class.name).to_string(),
            fields,
        })
    }

    fn class(&mut self, class: &ClassDecl) -> FfiClass {
        let name = base_name(&class.name).to_string();
        let class_snake = to_snake_case(&name);
        let is_abstract = class.methods.iter().any(|m| m.is_pure_virtual);

        let mut constructors = Vec::new();
        if !is_abstract {
            let declared: Vec<&Function> = class.constructors().collect();
            if declared.is_empty() {
                constructors.push(FfiFunction {
                    name: name.clone(),
                    c_name: self.symbol(format!("{}_{class_snake}_new", self.prefix)),
                    kind: FfiFunctionKind::Constructor,
                    params: Vec::new(),
                    ret: owned_handle(&name),
                    is_const: false,
                    span: class.span,
                });
            }
            for ctor in declared {
                if ctor.access != AccessLevel::Public || is_move_constructor(ctor, &name) {
                    continue;
                }
                match self.function(ctor, Some(&name)) {
                    Ok(f) => constructors.push(f),
                    Err(reason) => self.skip(&format!("{name}::{name}"), reason, ctor.span),
                }
            }
        }

        let destructor = FfiFunction {
            name: format!("~{name}"),
            c_name: self.symbol(format!("{}_{class_snake}_delete", self.prefix)),
            kind: FfiFunctionKind::Destructor,
            params: Vec::new(),
            ret: FfiType::Void,
            is_const: false,
            span: class.span,
        };

        let mut methods = Vec::new();
        for m in &class.methods {
            if m.is_constructor || m.is_destructor || m.access != AccessLevel::Public {
                continue;
            }
            match self.function(m, Some(&name)) {
                Ok(f) => methods.push(f),
                Err(reason) => self.skip(&format!("{name}::{}", m.name), reason, m.span),
            }
        }

        FfiClass {
            name,
            constructors,
            destructor,
            methods,
            is_abstract,
        }
    }

    fn function(&mut self, f: &Function, owner: Option<&str>) -> Result<FfiFunction, Incompatibility> {
        if f.template_header.is_some() {
            return Err(Incompatibility::Template);
        }
        if f.name.starts_with("operator") {
            return Err(Incompatibility::Operator);
        }
        if may_throw(f) {
            return Err(Incompatibility::Throws);
        }
        let kind = match owner {
            None => FfiFunctionKind::Free,
            Some(_) if f.is_constructor => FfiFunctionKind::Constructor,
            Some(_) if f.is_static => FfiFunctionKind::Static,
            Some(_) => FfiFunctionKind::Method,
        };
        let ret = match (kind, owner) {
            (FfiFunctionKind::Constructor, Some(class)) => owned_handle(class),
            _ => match &f.return_type {
                Some(ty) => self.classify(ty)?,
                None => FfiType::Void,
            },
        };
        let params = f
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let name = if p.name.is_empty() {
                    format!("arg{i}")
                } else {
                    p.name.clone()
                };
                self.classify(&p.ty).map(|ty| FfiParam { name, ty })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let base = match (kind, owner) {
            (FfiFunctionKind::Constructor, Some(class)) => {
                format!("{}_{}_new", self.prefix, to_snake_case(class))
            }
            (_, Some(class)) => format!(
                "{}_{}_{}",
                self.prefix,
                to_snake_case(class),
                to_snake_case(&f.name)
            ),
            (_, None) => format!("{}_{}", self.prefix, to_snake_case(&f.name)),
        };
        Ok(FfiFunction {
            name: f.name.clone(),
            c_name: self.symbol(base),
            kind,
            params,
            ret,
            is_const: f.is_const,
            span: f.span,
        })
    }

    /// Resolves a C++ type to its boundary shape.
    pub fn classify(&self, ty: &Type) -> Result<FfiType, Incompatibility> {
        match &ty.kind {
            TypeKind::Void => Ok(FfiType::Void),
            TypeKind::Bool | TypeKind::Integer | TypeKind::Float => self.scalar(ty),
            TypeKind::TemplateParam => Err(Incompatibility::Template),
            TypeKind::Container { .. } | TypeKind::Threading { .. } | TypeKind::Async { .. } => {
                Err(Incompatibility::StdType(ty.spelling()))
            }
            TypeKind::Function { .. } => Err(Incompatibility::Unmappable(ty.spelling())),
            TypeKind::Pointer { pointee, ownership } => {
                if *ownership != Ownership::Raw {
                    return Err(Incompatibility::StdType(ty.spelling()));
                }
                let mutable = !pointee.is_const;
                match &pointee.kind {
                    TypeKind::Void => Ok(FfiType::Opaque { mutable }),
                    TypeKind::Integer if pointee.name == "char" => Ok(FfiType::CStr { mutable }),
                    TypeKind::Bool | TypeKind::Integer | TypeKind::Float => {
                        let FfiType::Scalar(target) = self.scalar(pointee)? else {
                            return Err(Incompatibility::Unmappable(ty.spelling()));
                        };
                        Ok(FfiType::ScalarPtr {
                            target,
                            mutable,
                            by_ref: false,
                        })
                    }
                    TypeKind::Struct | TypeKind::Class | TypeKind::Enum => {
                        match self.named(pointee)? {
                            FfiType::Struct(name) => Ok(FfiType::StructPtr {
                                name,
                                mutable,
                                by_ref: false,
                            }),
                            FfiType::Handle { class, .. } => Ok(FfiType::Handle {
                                class,
                                mutable,
                                passing: Passing::Pointer,
                            }),
                            _ => Err(Incompatibility::Unmappable(ty.spelling())),
                        }
                    }
                    _ => Err(Incompatibility::Unmappable(ty.spelling())),
                }
            }
            TypeKind::Reference { referent, rvalue } => {
                if *rvalue {
                    return Err(Incompatibility::Unmappable(ty.spelling()));
                }
                let mutable = !referent.is_const;
                match &referent.kind {
                    TypeKind::Bool | TypeKind::Integer | TypeKind::Float => {
                        let scalar = self.scalar(referent)?;
                        match scalar {
                            FfiType::Scalar(target) if mutable => Ok(FfiType::ScalarPtr {
                                target,
                                mutable,
                                by_ref: true,
                            }),
                            other => Ok(other),
                        }
                    }
                    TypeKind::Container { .. }
                    | TypeKind::Threading { .. }
                    | TypeKind::Async { .. } => Err(Incompatibility::StdType(referent.spelling())),
                    TypeKind::Struct | TypeKind::Class | TypeKind::Enum => {
                        match self.named(referent)? {
                            FfiType::Struct(name) => Ok(FfiType::StructPtr {
                                name,
                                mutable,
                                by_ref: true,
                            }),
                            FfiType::Handle { class, .. } => Ok(FfiType::Handle {
                                class,
                                mutable,
                                passing: Passing::Reference,
                            }),
                            FfiType::Enum(name) if !mutable => Ok(FfiType::Enum(name)),
                            _ => Err(Incompatibility::Unmappable(ty.spelling())),
                        }
                    }
                    _ => Err(Incompatibility::Unmappable(ty.spelling())),
                }
            }
            TypeKind::Array { element, .. } => {
                if ty.name.starts_with("std::") {
                    return Err(Incompatibility::StdType(ty.spelling()));
                }
                match self.scalar(element) {
                    Ok(FfiType::Scalar(target)) => Ok(FfiType::ScalarPtr {
                        target,
                        mutable: !element.is_const,
                        by_ref: false,
                    }),
                    _ => Err(Incompatibility::Unmappable(ty.spelling())),
                }
            }
            TypeKind::Struct | TypeKind::Class | TypeKind::Enum => self.named(ty),
        }
    }

    fn scalar(&self, ty: &Type) -> Result<FfiType, Incompatibility> {
        match lookup(&ty.name) {
            Some(mapping) => Ok(FfiType::Scalar(mapping.cpp.to_string())),
            None => Err(Incompatibility::Unmappable(ty.spelling())),
        }
    }

    /// A user-declared type by value.
    fn named(&self, ty: &Type) -> Result<FfiType, Incompatibility> {
        if ty.name.starts_with("std::") {
            return Err(Incompatibility::StdType(ty.spelling()));
        }
        if ty.name.contains('<') {
            return Err(Incompatibility::Template);
        }
        let name = ty.base_name();
        if self.structs.contains(name) {
            Ok(FfiType::Struct(name.to_string()))
        } else if self.handles.contains(name) {
            Ok(FfiType::Handle {
                class: name.to_string(),
                mutable: !ty.is_const,
                passing: Passing::Value,
            })
        } else if self.enums.contains(name) {
            Ok(FfiType::Enum(name.to_string()))
        } else {
            Err(Incompatibility::Unmappable(ty.spelling()))
        }
    }

    /// Reserves `base`, suffixing a counter for overloads.
    fn symbol(&mut self, base: String) -> String {
        let count = self.symbols.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}_{count}")
        }
    }

    fn skip(&mut self, name: &str, reason: Incompatibility, span: Span) {
        self.skipped.push(Skipped {
            name: name.to_string(),
            reason,
            span,
        });
    }
}

/// `my-lib` → `my_lib`: a valid C identifier prefix.
pub fn symbol_prefix(library: &str) -> String {
    let snake = to_snake_case(library);
    let mut prefix: String = snake
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if prefix.is_empty() || prefix.starts_with(|c: char| c.is_ascii_digit()) {
        prefix.insert_str(0, "lib");
    }
    prefix
}

fn base_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

fn owned_handle(class: &str) -> FfiType {
    FfiType::Handle {
        class: class.to_string(),
        mutable: true,
        passing: Passing::Value,
    }
}

fn is_move_constructor(ctor: &Function, class: &str) -> bool {
    match ctor.params.as_slice() {
        [only] => matches!(
            &only.ty.kind,
            TypeKind::Reference { referent, rvalue: true } if referent.base_name() == class
        ),
        _ => false,
    }
}

/// A `throw` in the body or a dynamic exception list, unless the function
/// promises not to throw.
fn may_throw(f: &Function) -> bool {
    let spec = &f.exceptions.spec;
    if spec.is_nothrow() {
        return false;
    }
    if matches!(spec, ExceptionSpec::Dynamic(types) if !types.is_empty()) {
        return true;
    }
    f.body
        .as_deref()
        .is_some_and(|body| lex_texts(body).iter().any(|(kind, _)| *kind == CppToken::Throw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_cpp_parser::resolve_type;

    const CALC: &str = r#"
#include <cstdint>
extern "C" int32_t add(int32_t a, int32_t b) { return a + b; }
struct Point {
    float x;
    float y;
};
float point_distance(const Point* p) { return p->x * p->x + p->y * p->y; }
class Calculator {
private:
    int32_t value_;
public:
    Calculator() : value_(0) {}
    explicit Calculator(int32_t v) : value_(v) {}
    int32_t getValue() const { return value_; }
    void setValue(int32_t v) { value_ = v; }
};
"#;

    fn analyze(source: &str) -> (FfiModule, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let module = FfiAnalyzer::new("calc").analyze(source, &sink);
        (module, sink)
    }

    #[test]
    fn functions_structs_and_handles() {
        let (module, sink) = analyze(CALC);
        assert!(!sink.has_code(W401));
        assert_eq!(module.prefix, "calc");

        let names: Vec<&str> = module.functions.iter().map(|f| f.c_name.as_str()).collect();
        assert_eq!(names, ["calc_add", "calc_point_distance"]);

        assert_eq!(module.structs.len(), 1);
        assert_eq!(module.structs[0].name, "Point");
        assert_eq!(module.structs[0].fields[1].ty, FfiType::Scalar("float".to_string()));

        let calc = &module.classes[0];
        assert_eq!(calc.name, "Calculator");
        let ctors: Vec<&str> = calc.constructors.iter().map(|c| c.c_name.as_str()).collect();
        assert_eq!(ctors, ["calc_calculator_new", "calc_calculator_new_2"]);
        assert_eq!(calc.destructor.c_name, "calc_calculator_delete");
        let get = &calc.methods[0];
        assert_eq!(get.c_name, "calc_calculator_get_value");
        assert!(get.is_const);
        assert!(get.takes_handle());
    }

    #[test]
    fn throwing_template_and_std_signatures_are_reported() {
        let (module, sink) = analyze(
            r#"
int divide(int a, int b) { if (b == 0) throw std::runtime_error("zero"); return a / b; }
template<typename T> T twice(T v) { return v + v; }
int total(const std::vector<int>& values) { return 0; }
int safe(int a) noexcept { return a; }
"#,
        );
        assert_eq!(sink.count_code(W401), 3);
        let reasons: Vec<&Incompatibility> = module.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(reasons[0], &Incompatibility::Throws);
        assert_eq!(reasons[1], &Incompatibility::Template);
        assert!(matches!(reasons[2], Incompatibility::StdType(_)));
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "safe");
    }

    #[test]
    fn private_methods_are_not_bound() {
        let (module, sink) = analyze(
            r#"
class Counter {
public:
    void bump() { step(); }
private:
    void step() { n++; }
    int n = 0;
};
"#,
        );
        let names: Vec<&str> = module.classes[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["bump"]);
        assert!(!sink.has_code(W401));
    }

    #[test]
    fn abstract_classes_have_no_constructor() {
        let (module, _) = analyze(
            r#"
class Shape {
public:
    virtual double area() const = 0;
    virtual ~Shape() {}
};
"#,
        );
        let shape = &module.classes[0];
        assert!(shape.is_abstract);
        assert!(shape.constructors.is_empty());
        assert_eq!(shape.methods[0].c_name, "calc_shape_area");
    }

    #[test]
    fn reference_classification() {
        let analyzer = FfiAnalyzer::new("x");
        assert_eq!(
            analyzer.classify(&resolve_type("const int&")),
            Ok(FfiType::Scalar("int".to_string()))
        );
        assert_eq!(
            analyzer.classify(&resolve_type("double&")),
            Ok(FfiType::ScalarPtr {
                target: "double".to_string(),
                mutable: true,
                by_ref: true,
            })
        );
        assert_eq!(
            analyzer.classify(&resolve_type("const char*")),
            Ok(FfiType::CStr { mutable: false })
        );
        assert!(matches!(
            analyzer.classify(&resolve_type("std::unique_ptr<int>")),
            Err(Incompatibility::StdType(_))
        ));
        assert!(matches!(
            analyzer.classify(&resolve_type("Unknown")),
            Err(Incompatibility::Unmappable(_))
        ));
    }

    #[test]
    fn prefixes_are_c_identifiers() {
        assert_eq!(symbol_prefix("my-lib"), "my_lib");
        assert_eq!(symbol_prefix("MathUtils"), "math_utils");
        assert_eq!(symbol_prefix("3d"), "lib3d");
    }
}
