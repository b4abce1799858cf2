//! The signature model the binding generators work from.
//!
//! Far narrower than the translation IR: only what crosses the C ABI is
//! recorded, and every type has already been resolved to one of the shapes
//! in [`FfiType`].

use std::fmt;

use hybrid_ir::type_map::{c_token, go_token, rust_token};
use hybrid_source::Span;

/// How a class handle is passed to the C++ callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passing {
    /// `T`: copied out of the handle.
    Value,
    /// `T*`
    Pointer,
    /// `T&`
    Reference,
}

/// A value that can cross the C boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfiType {
    /// `void`
    Void,
    /// A builtin arithmetic type, by canonical C++ spelling.
    Scalar(String),
    /// A C++ enumeration, passed as `int`.
    Enum(String),
    /// `char*` / `const char*`.
    CStr {
        /// Not `const`.
        mutable: bool,
    },
    /// `void*` / `const void*`.
    Opaque {
        /// Not `const`.
        mutable: bool,
    },
    /// Pointer to a scalar. `by_ref` marks a C++ reference the wrapper
    /// dereferences.
    ScalarPtr {
        /// Canonical spelling of the pointee.
        target: String,
        /// Not `const`.
        mutable: bool,
        /// Declared as a reference.
        by_ref: bool,
    },
    /// A plain struct, by value.
    Struct(String),
    /// Pointer to a plain struct.
    StructPtr {
        /// The struct name.
        name: String,
        /// Not `const`.
        mutable: bool,
        /// Declared as a reference.
        by_ref: bool,
    },
    /// An opaque handle to a C++ class object.
    Handle {
        /// The class behind the handle.
        class: String,
        /// Not `const`.
        mutable: bool,
        /// How the callee receives the object.
        passing: Passing,
    },
}

impl FfiType {
    /// Spelling in the C header.
    pub fn c_type(&self) -> String {
        match self {
            FfiType::Void => "void".to_string(),
            FfiType::Scalar(name) => c_token(name).to_string(),
            FfiType::Enum(_) => "int".to_string(),
            FfiType::CStr { mutable } => format!("{}char*", konst(*mutable)),
            FfiType::Opaque { mutable } => format!("{}void*", konst(*mutable)),
            FfiType::ScalarPtr {
                target, mutable, ..
            } => format!("{}{}*", konst(*mutable), c_token(target)),
            FfiType::Struct(name) => name.clone(),
            FfiType::StructPtr { name, mutable, .. } => format!("{}{name}*", konst(*mutable)),
            FfiType::Handle {
                mutable, passing, ..
            } => {
                let mutable = *mutable || *passing == Passing::Value;
                format!("{}void*", konst(mutable))
            }
        }
    }

    /// Spelling in a Rust `extern "C"` block.
    pub fn rust_raw(&self) -> String {
        match self {
            FfiType::Void => "()".to_string(),
            FfiType::Scalar(name) => rust_token(name).to_string(),
            FfiType::Enum(_) => "i32".to_string(),
            FfiType::CStr { mutable } => format!("{} c_char", raw_ptr(*mutable)),
            FfiType::Opaque { mutable } => format!("{} c_void", raw_ptr(*mutable)),
            FfiType::ScalarPtr {
                target, mutable, ..
            } => format!("{} {}", raw_ptr(*mutable), rust_token(target)),
            FfiType::Struct(name) => name.clone(),
            FfiType::StructPtr { name, mutable, .. } => format!("{} {name}", raw_ptr(*mutable)),
            FfiType::Handle {
                mutable, passing, ..
            } => {
                let mutable = *mutable || *passing == Passing::Value;
                format!("{} c_void", raw_ptr(mutable))
            }
        }
    }

    /// Spelling cgo gives the C type.
    pub fn cgo_type(&self) -> String {
        match self {
            FfiType::Void => String::new(),
            FfiType::Scalar(name) => format!("C.{}", cgo_scalar(name)),
            FfiType::Enum(_) => "C.int".to_string(),
            FfiType::CStr { .. } => "*C.char".to_string(),
            FfiType::Opaque { .. } | FfiType::Handle { .. } => "unsafe.Pointer".to_string(),
            FfiType::ScalarPtr { target, .. } => format!("*C.{}", cgo_scalar(target)),
            FfiType::Struct(name) => format!("C.{name}"),
            FfiType::StructPtr { name, .. } => format!("*C.{name}"),
        }
    }

    /// Spelling in the Go wrapper's signature.
    pub fn go_type(&self) -> String {
        match self {
            FfiType::Void => String::new(),
            FfiType::Scalar(name) => go_token(name).to_string(),
            FfiType::Enum(_) => "int32".to_string(),
            FfiType::CStr { .. } => "string".to_string(),
            FfiType::Opaque { .. } => "unsafe.Pointer".to_string(),
            FfiType::ScalarPtr { target, .. } => format!("*{}", go_token(target)),
            FfiType::Struct(name) => name.clone(),
            FfiType::StructPtr { name, .. } => format!("*{name}"),
            FfiType::Handle { class, .. } => format!("*{class}"),
        }
    }

    /// True for `void`.
    pub fn is_void(&self) -> bool {
        matches!(self, FfiType::Void)
    }

    /// True if a safe wrapper cannot check the value and must be `unsafe`.
    pub fn is_unchecked(&self) -> bool {
        matches!(
            self,
            FfiType::Opaque { .. }
                | FfiType::CStr { mutable: true }
                | FfiType::ScalarPtr { by_ref: false, .. }
        )
    }
}

fn konst(mutable: bool) -> &'static str {
    if mutable {
        ""
    } else {
        "const "
    }
}

fn raw_ptr(mutable: bool) -> &'static str {
    if mutable {
        "*mut"
    } else {
        "*const"
    }
}

/// cgo's name for a C scalar: `unsigned int` is `C.uint`.
pub fn cgo_scalar(name: &str) -> String {
    match c_token(name) {
        "unsigned char" => "uchar".to_string(),
        "signed char" => "schar".to_string(),
        "unsigned short" => "ushort".to_string(),
        "unsigned int" => "uint".to_string(),
        "unsigned long" => "ulong".to_string(),
        "long long" => "longlong".to_string(),
        "unsigned long long" => "ulonglong".to_string(),
        other => other.replace(' ', ""),
    }
}

/// A named, typed slot: a parameter or a struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiParam {
    /// Name as written in C++, or `argN` for unnamed parameters.
    pub name: String,
    /// Boundary type.
    pub ty: FfiType,
}

/// What a wrapper function forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiFunctionKind {
    /// A namespace-scope function.
    Free,
    /// An instance method; the C wrapper takes the handle first.
    Method,
    /// A static member function.
    Static,
    /// `new T(...)`
    Constructor,
    /// `delete`
    Destructor,
}

/// One `extern "C"` entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiFunction {
    /// C++ name (the class name for constructors).
    pub name: String,
    /// Exported C symbol.
    pub c_name: String,
    /// What the wrapper forwards to.
    pub kind: FfiFunctionKind,
    /// Parameters, without the handle.
    pub params: Vec<FfiParam>,
    /// Return type.
    pub ret: FfiType,
    /// `const` method: the handle is read-only.
    pub is_const: bool,
    /// Where the declaration came from.
    pub span: Span,
}

impl FfiFunction {
    /// True if the C signature starts with the object handle.
    pub fn takes_handle(&self) -> bool {
        matches!(self.kind, FfiFunctionKind::Method | FfiFunctionKind::Destructor)
    }
}

/// A plain struct mirrored field for field on every side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiStruct {
    /// C++ name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FfiParam>,
}

/// A class reached through an opaque handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfiClass {
    /// C++ name.
    pub name: String,
    /// `new` entry points; empty for abstract classes.
    pub constructors: Vec<FfiFunction>,
    /// The `delete` entry point.
    pub destructor: FfiFunction,
    /// Bound instance and static methods.
    pub methods: Vec<FfiFunction>,
    /// Declares a pure virtual method.
    pub is_abstract: bool,
}

/// Why a declaration stays on the C++ side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    /// May let an exception escape.
    Throws,
    /// A template; C has no generics to instantiate it with.
    Template,
    /// The signature mentions a standard-library type.
    StdType(String),
    /// A type with no C representation.
    Unmappable(String),
    /// An operator overload.
    Operator,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incompatibility::Throws => f.write_str("it may throw, and exceptions cannot unwind through C"),
            Incompatibility::Template => f.write_str("templates need instantiation before they have a C symbol"),
            Incompatibility::StdType(ty) => {
                write!(f, "`{ty}` is a standard-library type with no C layout")
            }
            Incompatibility::Unmappable(ty) => write!(f, "`{ty}` has no C representation"),
            Incompatibility::Operator => f.write_str("operator overloads have no C name"),
        }
    }
}

/// A declaration left out of the bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Qualified C++ name (`Class::method`).
    pub name: String,
    /// The first reason found.
    pub reason: Incompatibility,
    /// Where the declaration came from.
    pub span: Span,
}

/// Everything one source file exposes through C.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FfiModule {
    /// Library name as given.
    pub library: String,
    /// Prefix of every exported symbol.
    pub prefix: String,
    /// Plain structs, in dependency order.
    pub structs: Vec<FfiStruct>,
    /// Handle classes.
    pub classes: Vec<FfiClass>,
    /// Free functions.
    pub functions: Vec<FfiFunction>,
    /// Declarations left out, in source order.
    pub skipped: Vec<Skipped>,
}

impl FfiModule {
    /// True if nothing at all is exposed.
    pub fn is_empty(&self) -> bool {
        self.structs.is_empty() && self.classes.is_empty() && self.functions.is_empty()
    }

    /// Every entry point in declaration order.
    pub fn entry_points(&self) -> impl Iterator<Item = &FfiFunction> {
        self.functions.iter().chain(self.classes.iter().flat_map(|c| {
            c.constructors
                .iter()
                .chain(std::iter::once(&c.destructor))
                .chain(c.methods.iter())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_spellings() {
        let ty = FfiType::Scalar("int32_t".to_string());
        assert_eq!(ty.c_type(), "int32_t");
        assert_eq!(ty.rust_raw(), "i32");
        assert_eq!(ty.cgo_type(), "C.int32_t");
        assert_eq!(ty.go_type(), "int32");
        let uint = FfiType::Scalar("unsigned int".to_string());
        assert_eq!(uint.cgo_type(), "C.uint");
        assert_eq!(uint.rust_raw(), "u32");
    }

    #[test]
    fn pointer_spellings() {
        let cstr = FfiType::CStr { mutable: false };
        assert_eq!(cstr.c_type(), "const char*");
        assert_eq!(cstr.rust_raw(), "*const c_char");
        assert_eq!(cstr.go_type(), "string");

        let slot = FfiType::ScalarPtr {
            target: "double".to_string(),
            mutable: true,
            by_ref: true,
        };
        assert_eq!(slot.c_type(), "double*");
        assert_eq!(slot.rust_raw(), "*mut f64");
        assert_eq!(slot.cgo_type(), "*C.double");
        assert!(!slot.is_unchecked());

        let point = FfiType::StructPtr {
            name: "Point".to_string(),
            mutable: false,
            by_ref: false,
        };
        assert_eq!(point.c_type(), "const Point*");
        assert_eq!(point.rust_raw(), "*const Point");
        assert_eq!(point.cgo_type(), "*C.Point");
    }

    #[test]
    fn handles_are_void_pointers() {
        let by_value = FfiType::Handle {
            class: "Calculator".to_string(),
            mutable: false,
            passing: Passing::Value,
        };
        assert_eq!(by_value.c_type(), "void*");
        let read_only = FfiType::Handle {
            class: "Calculator".to_string(),
            mutable: false,
            passing: Passing::Reference,
        };
        assert_eq!(read_only.c_type(), "const void*");
        assert_eq!(read_only.rust_raw(), "*const c_void");
        assert_eq!(read_only.go_type(), "*Calculator");
    }

    #[test]
    fn reasons_read_as_sentences() {
        assert_eq!(
            Incompatibility::StdType("std::vector<int>".to_string()).to_string(),
            "`std::vector<int>` is a standard-library type with no C layout"
        );
        assert!(Incompatibility::Throws.to_string().contains("throw"));
    }
}
