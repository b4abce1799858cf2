//! C, Rust and Go spellings for IR types.
//!
//! Builtin names are looked up in an immutable table. Composite types are
//! rendered recursively: the element or argument types are mapped first, then
//! wrapped according to the outer kind. Names missing from the table map to
//! an opaque pointer token instead of failing, because the parser can hand
//! over spellings nobody anticipated.

use crate::types::{AsyncKind, ContainerKind, Ownership, ThreadingKind, Type, TypeKind};
use hybrid_common::split_top_level;
use std::collections::BTreeSet;

/// Opaque C token used for unmapped names.
pub const OPAQUE_C: &str = "void*";
/// Opaque Rust token used for unmapped names.
pub const OPAQUE_RUST: &str = "*mut std::ffi::c_void";
/// Opaque Go token used for unmapped names.
pub const OPAQUE_GO: &str = "unsafe.Pointer";

/// Target spellings of one builtin C++ type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    /// Canonical C++ spelling.
    pub cpp: &'static str,
    /// C spelling.
    pub c: &'static str,
    /// Rust spelling.
    pub rust: &'static str,
    /// Go spelling.
    pub go: &'static str,
}

const fn m(cpp: &'static str, c: &'static str, rust: &'static str, go: &'static str) -> TypeMapping {
    TypeMapping { cpp, c, rust, go }
}

static BUILTINS: &[TypeMapping] = &[
    m("void", "void", "()", ""),
    m("bool", "bool", "bool", "bool"),
    m("char", "char", "i8", "int8"),
    m("signed char", "signed char", "i8", "int8"),
    m("unsigned char", "unsigned char", "u8", "uint8"),
    m("wchar_t", "wchar_t", "u32", "rune"),
    m("char8_t", "unsigned char", "u8", "uint8"),
    m("char16_t", "uint16_t", "u16", "uint16"),
    m("char32_t", "uint32_t", "char", "rune"),
    m("short", "short", "i16", "int16"),
    m("unsigned short", "unsigned short", "u16", "uint16"),
    m("int", "int", "i32", "int32"),
    m("unsigned int", "unsigned int", "u32", "uint32"),
    m("long", "long", "i64", "int64"),
    m("unsigned long", "unsigned long", "u64", "uint64"),
    m("long long", "long long", "i64", "int64"),
    m("unsigned long long", "unsigned long long", "u64", "uint64"),
    m("float", "float", "f32", "float32"),
    m("double", "double", "f64", "float64"),
    m("long double", "long double", "f64", "float64"),
    m("size_t", "size_t", "usize", "uint"),
    m("ssize_t", "ssize_t", "isize", "int"),
    m("ptrdiff_t", "ptrdiff_t", "isize", "int"),
    m("intptr_t", "intptr_t", "isize", "int"),
    m("uintptr_t", "uintptr_t", "usize", "uintptr"),
    m("int8_t", "int8_t", "i8", "int8"),
    m("int16_t", "int16_t", "i16", "int16"),
    m("int32_t", "int32_t", "i32", "int32"),
    m("int64_t", "int64_t", "i64", "int64"),
    m("uint8_t", "uint8_t", "u8", "uint8"),
    m("uint16_t", "uint16_t", "u16", "uint16"),
    m("uint32_t", "uint32_t", "u32", "uint32"),
    m("uint64_t", "uint64_t", "u64", "uint64"),
    m("std::string", "const char*", "String", "string"),
    m("std::string_view", "const char*", "&str", "string"),
];

/// Alternative spellings folded into the canonical table keys.
static ALIASES: &[(&str, &str)] = &[
    ("unsigned", "unsigned int"),
    ("signed", "int"),
    ("signed int", "int"),
    ("short int", "short"),
    ("signed short", "short"),
    ("signed short int", "short"),
    ("unsigned short int", "unsigned short"),
    ("long int", "long"),
    ("signed long", "long"),
    ("signed long int", "long"),
    ("unsigned long int", "unsigned long"),
    ("long unsigned int", "unsigned long"),
    ("long long int", "long long"),
    ("signed long long", "long long"),
    ("unsigned long long int", "unsigned long long"),
    ("std::size_t", "size_t"),
    ("std::ptrdiff_t", "ptrdiff_t"),
    ("std::intptr_t", "intptr_t"),
    ("std::uintptr_t", "uintptr_t"),
    ("std::int8_t", "int8_t"),
    ("std::int16_t", "int16_t"),
    ("std::int32_t", "int32_t"),
    ("std::int64_t", "int64_t"),
    ("std::uint8_t", "uint8_t"),
    ("std::uint16_t", "uint16_t"),
    ("std::uint32_t", "uint32_t"),
    ("std::uint64_t", "uint64_t"),
    ("string", "std::string"),
    ("std::__cxx11::string", "std::string"),
    ("std::basic_string<char>", "std::string"),
    ("string_view", "std::string_view"),
];

/// Collapses whitespace in a type spelling and folds aliases.
///
/// Spaces are kept only between two words, after commas, and after a `*` or
/// `&` that precedes a word (`int* const`).
///
/// ```
/// use hybrid_ir::type_map::normalize;
/// assert_eq!(normalize("std :: map < int , std::vector<int> >"), "std::map<int, std::vector<int>>");
/// assert_eq!(normalize("unsigned"), "unsigned int");
/// assert_eq!(normalize("const  int  &"), "const int&");
/// ```
pub fn normalize(spelling: &str) -> String {
    let mut out = String::with_capacity(spelling.len());
    let mut pending_space = false;
    let mut prev_word = false;
    for ch in spelling.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        let is_word = ch.is_alphanumeric() || ch == '_';
        if is_word {
            let after_sigil = out.ends_with('*') || out.ends_with('&');
            if (pending_space && (prev_word || after_sigil)) || out.ends_with(',') {
                out.push(' ');
            }
        } else if ch != ',' && out.ends_with(',') {
            out.push(' ');
        }
        out.push(ch);
        prev_word = is_word;
        pending_space = false;
    }
    match ALIASES.iter().find(|(alias, _)| *alias == out) {
        Some((_, canonical)) => canonical.to_string(),
        None => out,
    }
}

/// Looks up a builtin by spelling (normalized first).
pub fn lookup(name: &str) -> Option<&'static TypeMapping> {
    let key = normalize(name);
    BUILTINS.iter().find(|entry| entry.cpp == key)
}

/// C token for a builtin name, or [`OPAQUE_C`].
pub fn c_token(name: &str) -> &'static str {
    lookup(name).map_or(OPAQUE_C, |t| t.c)
}

/// Rust token for a builtin name, or [`OPAQUE_RUST`].
pub fn rust_token(name: &str) -> &'static str {
    lookup(name).map_or(OPAQUE_RUST, |t| t.rust)
}

/// Go token for a builtin name, or [`OPAQUE_GO`].
pub fn go_token(name: &str) -> &'static str {
    lookup(name).map_or(OPAQUE_GO, |t| t.go)
}

/// Classifies a builtin spelling.
pub fn builtin_kind(name: &str) -> Option<TypeKind> {
    let entry = lookup(name)?;
    Some(match entry.cpp {
        "void" => TypeKind::Void,
        "bool" => TypeKind::Bool,
        "float" | "double" | "long double" => TypeKind::Float,
        "std::string" => TypeKind::Container {
            kind: ContainerKind::String,
            args: Vec::new(),
        },
        "std::string_view" => TypeKind::Container {
            kind: ContainerKind::StringView,
            args: Vec::new(),
        },
        _ => TypeKind::Integer,
    })
}

/// Removes a leading `std::`.
pub fn strip_std(name: &str) -> &str {
    name.strip_prefix("std::").unwrap_or(name)
}

fn is_c_string(ty: &Type) -> bool {
    matches!(&ty.kind, TypeKind::Pointer { pointee, ownership: Ownership::Raw }
        if pointee.is_const && normalize(&pointee.name) == "char")
}

/// Renders the unqualified name of a user type, mapping its template
/// arguments with `map_arg` and joining them with `open`/`close`.
fn user_type(ty: &Type, open: &str, close: &str, map_arg: fn(&str) -> String) -> String {
    let base = ty.base_name();
    match (ty.name.find('<'), ty.name.rfind('>')) {
        (Some(start), Some(end)) if end > start => {
            let args: Vec<String> = split_top_level(&ty.name[start + 1..end], ',')
                .into_iter()
                .map(map_arg)
                .collect();
            format!("{base}{open}{}{close}", args.join(", "))
        }
        _ => base.to_string(),
    }
}

fn unqualified(name: &str) -> String {
    name.rsplit("::").next().unwrap_or(name).to_string()
}

fn rust_arg_text(arg: &str) -> String {
    match lookup(arg) {
        Some(t) => t.rust.to_string(),
        None => unqualified(&normalize(arg)),
    }
}

fn go_arg_text(arg: &str) -> String {
    match lookup(arg) {
        Some(t) => t.go.to_string(),
        None => unqualified(&normalize(arg)),
    }
}

/// Rust atomic type for `std::atomic<value_type>`.
pub fn rust_atomic(value_type: &Type) -> String {
    if matches!(value_type.kind, TypeKind::Pointer { .. }) {
        return match value_type.element() {
            Some(p) => format!("AtomicPtr<{}>", to_rust(p)),
            None => "AtomicPtr<std::ffi::c_void>".to_string(),
        };
    }
    let token = if value_type.is_primitive() {
        rust_token(&value_type.name)
    } else {
        ""
    };
    let atomic = match token {
        "bool" => "AtomicBool",
        "i8" => "AtomicI8",
        "i16" => "AtomicI16",
        "i32" => "AtomicI32",
        "i64" => "AtomicI64",
        "isize" => "AtomicIsize",
        "u8" => "AtomicU8",
        "u16" => "AtomicU16",
        "u32" => "AtomicU32",
        "u64" => "AtomicU64",
        "usize" => "AtomicUsize",
        _ => return format!("Mutex<{}>", to_rust(value_type)),
    };
    atomic.to_string()
}

/// Go `sync/atomic` type for `std::atomic<value_type>`.
pub fn go_atomic(value_type: &Type) -> String {
    if let TypeKind::Pointer { pointee, .. } = &value_type.kind {
        return format!("atomic.Pointer[{}]", to_go(pointee));
    }
    let token = if value_type.is_primitive() {
        go_token(&value_type.name)
    } else {
        ""
    };
    match token {
        "bool" => "atomic.Bool".to_string(),
        "int8" | "int16" | "int32" => "atomic.Int32".to_string(),
        "int64" | "int" => "atomic.Int64".to_string(),
        "uint8" | "uint16" | "uint32" => "atomic.Uint32".to_string(),
        "uint64" | "uint" => "atomic.Uint64".to_string(),
        "uintptr" => "atomic.Uintptr".to_string(),
        _ => "atomic.Value".to_string(),
    }
}

fn arg_or<'a>(args: &'a [Type], index: usize) -> Option<&'a Type> {
    args.get(index)
}

/// Renders a type in C, as used by `extern "C"` wrappers.
pub fn to_c(ty: &Type) -> String {
    let konst = if ty.is_const { "const " } else { "" };
    match &ty.kind {
        TypeKind::Void => "void".to_string(),
        TypeKind::Bool | TypeKind::Integer | TypeKind::Float => {
            format!("{konst}{}", c_token(&ty.name))
        }
        TypeKind::Pointer {
            pointee,
            ownership: Ownership::Raw,
        } => {
            if pointee.is_user_defined() && !matches!(pointee.kind, TypeKind::Struct) {
                OPAQUE_C.to_string()
            } else {
                format!("{}*", to_c(pointee))
            }
        }
        TypeKind::Reference { referent, .. } => match &referent.kind {
            TypeKind::Container {
                kind: ContainerKind::String | ContainerKind::StringView,
                ..
            } => "const char*".to_string(),
            TypeKind::Class => OPAQUE_C.to_string(),
            _ => format!("{}*", to_c(referent)),
        },
        TypeKind::Array { element, .. } => format!("{}*", to_c(element)),
        TypeKind::Struct => format!("{konst}{}", ty.base_name()),
        TypeKind::Enum => "int".to_string(),
        TypeKind::Container {
            kind: ContainerKind::String | ContainerKind::StringView,
            ..
        } => "const char*".to_string(),
        _ => OPAQUE_C.to_string(),
    }
}

/// Renders a type in Rust.
///
/// ```
/// use hybrid_ir::type_map::to_rust;
/// use hybrid_ir::{Ownership, Type};
/// let boxed = Type::pointer(Type::class("Node"), Ownership::Unique);
/// assert_eq!(to_rust(&boxed), "Box<Node>");
/// ```
pub fn to_rust(ty: &Type) -> String {
    match &ty.kind {
        TypeKind::Void => "()".to_string(),
        TypeKind::Bool | TypeKind::Integer | TypeKind::Float => rust_token(&ty.name).to_string(),
        TypeKind::Pointer { pointee, ownership } => rust_pointer(ty, pointee, *ownership),
        TypeKind::Reference { referent, rvalue } => {
            if *rvalue {
                return to_rust(referent);
            }
            let shared = referent.is_const;
            match &referent.kind {
                TypeKind::Container {
                    kind: ContainerKind::String | ContainerKind::StringView,
                    ..
                } if shared => "&str".to_string(),
                TypeKind::Container {
                    kind: ContainerKind::Vector,
                    args,
                } if shared => {
                    format!("&[{}]", arg_or(args, 0).map_or("()".to_string(), to_rust))
                }
                _ if shared => format!("&{}", to_rust(referent)),
                _ => format!("&mut {}", to_rust(referent)),
            }
        }
        TypeKind::Array { element, len } => match len {
            Some(n) => format!("[{}; {}]", to_rust(element), n),
            None => format!("Vec<{}>", to_rust(element)),
        },
        TypeKind::Struct | TypeKind::Class | TypeKind::Enum => user_type(ty, "<", ">", rust_arg_text),
        TypeKind::TemplateParam => ty.name.clone(),
        TypeKind::Function { ret, params, erased } => {
            let params: Vec<String> = params.iter().map(to_rust).collect();
            let ret = if ret.is_void() {
                String::new()
            } else {
                format!(" -> {}", to_rust(ret))
            };
            if *erased {
                format!("Box<dyn Fn({}){}>", params.join(", "), ret)
            } else {
                format!("fn({}){}", params.join(", "), ret)
            }
        }
        TypeKind::Container { kind, args } => rust_container(*kind, args),
        TypeKind::Threading { kind, args } => rust_threading(*kind, args),
        TypeKind::Async { kind, args } => {
            let inner = arg_or(args, 0).map_or("()".to_string(), to_rust);
            match kind {
                AsyncKind::Future => format!("tokio::task::JoinHandle<{inner}>"),
                AsyncKind::SharedFuture => {
                    format!("futures::future::Shared<tokio::task::JoinHandle<{inner}>>")
                }
                AsyncKind::Promise => format!("tokio::sync::oneshot::Sender<{inner}>"),
                AsyncKind::CoroutineHandle => {
                    "std::pin::Pin<Box<dyn std::future::Future<Output = ()>>>".to_string()
                }
            }
        }
    }
}

fn rust_pointer(ty: &Type, pointee: &Type, ownership: Ownership) -> String {
    let inner = match &pointee.kind {
        TypeKind::Array { element, len: None } if ownership != Ownership::Raw => {
            format!("[{}]", to_rust(element))
        }
        TypeKind::Void => "std::ffi::c_void".to_string(),
        _ => to_rust(pointee),
    };
    match ownership {
        Ownership::Raw if is_c_string(ty) => "&str".to_string(),
        Ownership::Raw if pointee.is_const => format!("*const {inner}"),
        Ownership::Raw => format!("*mut {inner}"),
        Ownership::Unique => format!("Box<{inner}>"),
        Ownership::Shared => format!("Rc<{inner}>"),
        Ownership::Weak => format!("Weak<{inner}>"),
    }
}

fn rust_container(kind: ContainerKind, args: &[Type]) -> String {
    let arg = |i: usize| arg_or(args, i).map_or("()".to_string(), to_rust);
    match kind {
        ContainerKind::Vector => format!("Vec<{}>", arg(0)),
        ContainerKind::List => format!("LinkedList<{}>", arg(0)),
        ContainerKind::Deque => format!("VecDeque<{}>", arg(0)),
        ContainerKind::Map => format!("BTreeMap<{}, {}>", arg(0), arg(1)),
        ContainerKind::UnorderedMap => format!("HashMap<{}, {}>", arg(0), arg(1)),
        ContainerKind::Set => format!("BTreeSet<{}>", arg(0)),
        ContainerKind::UnorderedSet => format!("HashSet<{}>", arg(0)),
        ContainerKind::String => "String".to_string(),
        ContainerKind::StringView => "&str".to_string(),
        ContainerKind::Pair => format!("({}, {})", arg(0), arg(1)),
        ContainerKind::Tuple => {
            let items: Vec<String> = args.iter().map(to_rust).collect();
            if items.len() == 1 {
                format!("({},)", items[0])
            } else {
                format!("({})", items.join(", "))
            }
        }
        ContainerKind::Optional => format!("Option<{}>", arg(0)),
    }
}

fn rust_threading(kind: ThreadingKind, args: &[Type]) -> String {
    match kind {
        ThreadingKind::Thread | ThreadingKind::JThread => {
            "Option<std::thread::JoinHandle<()>>".to_string()
        }
        ThreadingKind::Mutex | ThreadingKind::RecursiveMutex | ThreadingKind::TimedMutex => {
            "Mutex<()>".to_string()
        }
        ThreadingKind::SharedMutex => "RwLock<()>".to_string(),
        ThreadingKind::LockGuard | ThreadingKind::UniqueLock | ThreadingKind::ScopedLock => {
            "MutexGuard<'_, ()>".to_string()
        }
        ThreadingKind::SharedLock => "RwLockReadGuard<'_, ()>".to_string(),
        ThreadingKind::Atomic => match args.first() {
            Some(value) => rust_atomic(value),
            None => "AtomicI32".to_string(),
        },
        ThreadingKind::ConditionVariable => "Condvar".to_string(),
    }
}

/// Renders a type in Go.
///
/// ```
/// use hybrid_ir::type_map::to_go;
/// use hybrid_ir::{Ownership, Type};
/// let shared = Type::pointer(Type::class("Node"), Ownership::Shared);
/// assert_eq!(to_go(&shared), "*Node");
/// ```
pub fn to_go(ty: &Type) -> String {
    match &ty.kind {
        TypeKind::Void => String::new(),
        TypeKind::Bool | TypeKind::Integer | TypeKind::Float => go_token(&ty.name).to_string(),
        TypeKind::Pointer { pointee, ownership } => {
            if *ownership == Ownership::Raw && is_c_string(ty) {
                return "string".to_string();
            }
            match &pointee.kind {
                TypeKind::Void => OPAQUE_GO.to_string(),
                TypeKind::Array { element, len: None } => format!("[]{}", to_go(element)),
                _ => format!("*{}", to_go(pointee)),
            }
        }
        TypeKind::Reference { referent, rvalue } => {
            if *rvalue || referent.is_const {
                to_go(referent)
            } else {
                format!("*{}", to_go(referent))
            }
        }
        TypeKind::Array { element, len } => match len {
            Some(n) => format!("[{}]{}", n, to_go(element)),
            None => format!("[]{}", to_go(element)),
        },
        TypeKind::Struct | TypeKind::Class | TypeKind::Enum => user_type(ty, "[", "]", go_arg_text),
        TypeKind::TemplateParam => ty.name.clone(),
        TypeKind::Function { ret, params, .. } => {
            let params: Vec<String> = params.iter().map(to_go).collect();
            let ret = to_go(ret);
            if ret.is_empty() {
                format!("func({})", params.join(", "))
            } else {
                format!("func({}) {}", params.join(", "), ret)
            }
        }
        TypeKind::Container { kind, args } => go_container(*kind, args),
        TypeKind::Threading { kind, args } => match kind {
            ThreadingKind::Thread | ThreadingKind::JThread => "sync.WaitGroup".to_string(),
            ThreadingKind::Mutex | ThreadingKind::RecursiveMutex | ThreadingKind::TimedMutex => {
                "sync.Mutex".to_string()
            }
            ThreadingKind::SharedMutex => "sync.RWMutex".to_string(),
            ThreadingKind::LockGuard
            | ThreadingKind::UniqueLock
            | ThreadingKind::SharedLock
            | ThreadingKind::ScopedLock => "sync.Locker".to_string(),
            ThreadingKind::Atomic => match args.first() {
                Some(value) => go_atomic(value),
                None => "atomic.Int32".to_string(),
            },
            ThreadingKind::ConditionVariable => "*sync.Cond".to_string(),
        },
        TypeKind::Async { kind, args } => {
            let inner = arg_or(args, 0).map_or("struct{}".to_string(), |t| {
                let s = to_go(t);
                if s.is_empty() {
                    "struct{}".to_string()
                } else {
                    s
                }
            });
            match kind {
                AsyncKind::Future | AsyncKind::SharedFuture => format!("<-chan {inner}"),
                AsyncKind::Promise => format!("chan<- {inner}"),
                AsyncKind::CoroutineHandle => "chan struct{}".to_string(),
            }
        }
    }
}

fn go_container(kind: ContainerKind, args: &[Type]) -> String {
    let arg = |i: usize| arg_or(args, i).map_or("any".to_string(), to_go);
    match kind {
        ContainerKind::Vector | ContainerKind::List | ContainerKind::Deque => format!("[]{}", arg(0)),
        ContainerKind::Map | ContainerKind::UnorderedMap => format!("map[{}]{}", arg(0), arg(1)),
        ContainerKind::Set | ContainerKind::UnorderedSet => format!("map[{}]struct{{}}", arg(0)),
        ContainerKind::String | ContainerKind::StringView => "string".to_string(),
        ContainerKind::Pair => format!("struct {{ First {}; Second {} }}", arg(0), arg(1)),
        ContainerKind::Tuple => {
            let fields: Vec<String> = args
                .iter()
                .enumerate()
                .map(|(i, t)| format!("F{i} {}", to_go(t)))
                .collect();
            format!("struct {{ {} }}", fields.join("; "))
        }
        ContainerKind::Optional => format!("*{}", arg(0)),
    }
}

/// Adds the `use` paths a Rust rendering of `ty` needs.
pub fn rust_imports(ty: &Type, imports: &mut BTreeSet<&'static str>) {
    match &ty.kind {
        TypeKind::Pointer { ownership, .. } => match ownership {
            Ownership::Shared => {
                imports.insert("std::rc::Rc");
            }
            Ownership::Weak => {
                imports.insert("std::rc::Weak");
            }
            _ => {}
        },
        TypeKind::Container { kind, .. } => {
            let path = match kind {
                ContainerKind::List => Some("std::collections::LinkedList"),
                ContainerKind::Deque => Some("std::collections::VecDeque"),
                ContainerKind::Map => Some("std::collections::BTreeMap"),
                ContainerKind::UnorderedMap => Some("std::collections::HashMap"),
                ContainerKind::Set => Some("std::collections::BTreeSet"),
                ContainerKind::UnorderedSet => Some("std::collections::HashSet"),
                _ => None,
            };
            if let Some(path) = path {
                imports.insert(path);
            }
        }
        TypeKind::Threading { kind, args } => match kind {
            ThreadingKind::Mutex | ThreadingKind::RecursiveMutex | ThreadingKind::TimedMutex => {
                imports.insert("std::sync::Mutex");
            }
            ThreadingKind::SharedMutex => {
                imports.insert("std::sync::RwLock");
            }
            ThreadingKind::LockGuard | ThreadingKind::UniqueLock | ThreadingKind::ScopedLock => {
                imports.insert("std::sync::MutexGuard");
            }
            ThreadingKind::SharedLock => {
                imports.insert("std::sync::RwLockReadGuard");
            }
            ThreadingKind::ConditionVariable => {
                imports.insert("std::sync::Condvar");
            }
            ThreadingKind::Atomic => {
                let value = args.first().map(rust_atomic).unwrap_or_default();
                if value.starts_with("Mutex<") {
                    imports.insert("std::sync::Mutex");
                } else if let Some(path) = atomic_import(&value) {
                    imports.insert(path);
                }
            }
            ThreadingKind::Thread | ThreadingKind::JThread => {}
        },
        _ => {}
    }
    if let Some(element) = ty.element() {
        rust_imports(element, imports);
    }
    for arg in ty.args() {
        rust_imports(arg, imports);
    }
    if let TypeKind::Function { ret, params, .. } = &ty.kind {
        rust_imports(ret, imports);
        for p in params {
            rust_imports(p, imports);
        }
    }
}

/// Maps a Rust atomic type name to its import path.
pub fn atomic_import(rust_atomic: &str) -> Option<&'static str> {
    let base = rust_atomic.split('<').next().unwrap_or(rust_atomic);
    Some(match base {
        "AtomicBool" => "std::sync::atomic::AtomicBool",
        "AtomicI8" => "std::sync::atomic::AtomicI8",
        "AtomicI16" => "std::sync::atomic::AtomicI16",
        "AtomicI32" => "std::sync::atomic::AtomicI32",
        "AtomicI64" => "std::sync::atomic::AtomicI64",
        "AtomicIsize" => "std::sync::atomic::AtomicIsize",
        "AtomicU8" => "std::sync::atomic::AtomicU8",
        "AtomicU16" => "std::sync::atomic::AtomicU16",
        "AtomicU32" => "std::sync::atomic::AtomicU32",
        "AtomicU64" => "std::sync::atomic::AtomicU64",
        "AtomicUsize" => "std::sync::atomic::AtomicUsize",
        "AtomicPtr" => "std::sync::atomic::AtomicPtr",
        _ => return None,
    })
}

/// Adds the Go import paths a Go rendering of `ty` needs.
pub fn go_imports(ty: &Type, imports: &mut BTreeSet<&'static str>) {
    let rendered = to_go(ty);
    if rendered.contains("atomic.") {
        imports.insert("sync/atomic");
    }
    if rendered.contains("sync.") {
        imports.insert("sync");
    }
    if rendered.contains("unsafe.") {
        imports.insert("unsafe");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerKind, TypeKind};

    fn int() -> Type {
        Type::integer("int")
    }

    fn container(kind: ContainerKind, name: &str, args: Vec<Type>) -> Type {
        Type::new(name, TypeKind::Container { kind, args })
    }

    #[test]
    fn builtin_table() {
        assert_eq!(rust_token("int"), "i32");
        assert_eq!(go_token("int"), "int32");
        assert_eq!(c_token("unsigned   long"), "unsigned long");
        assert_eq!(rust_token("size_t"), "usize");
        assert_eq!(go_token("double"), "float64");
        assert_eq!(rust_token("std::uint8_t"), "u8");
    }

    #[test]
    fn unmapped_falls_back_to_opaque() {
        assert_eq!(c_token("Widget"), OPAQUE_C);
        assert_eq!(rust_token("Widget"), OPAQUE_RUST);
        assert_eq!(go_token("Widget"), OPAQUE_GO);
    }

    #[test]
    fn lookup_is_idempotent() {
        let once = normalize("unsigned");
        assert_eq!(normalize(&once), once);
        assert_eq!(lookup("long int"), lookup("long"));
    }

    #[test]
    fn normalize_spacing() {
        assert_eq!(normalize("int * const"), "int* const");
        assert_eq!(normalize("std::pair<int,double>"), "std::pair<int, double>");
        assert_eq!(normalize("  long   long  "), "long long");
    }

    #[test]
    fn builtin_kinds() {
        assert_eq!(builtin_kind("double"), Some(TypeKind::Float));
        assert_eq!(builtin_kind("uint32_t"), Some(TypeKind::Integer));
        assert_eq!(builtin_kind("void"), Some(TypeKind::Void));
        assert!(matches!(
            builtin_kind("string"),
            Some(TypeKind::Container { kind: ContainerKind::String, .. })
        ));
        assert_eq!(builtin_kind("Point"), None);
    }

    #[test]
    fn pointers_in_rust() {
        assert_eq!(to_rust(&Type::pointer(int(), Ownership::Raw)), "*mut i32");
        assert_eq!(
            to_rust(&Type::pointer(int().with_const(true), Ownership::Raw)),
            "*const i32"
        );
        assert_eq!(to_rust(&Type::pointer(Type::void(), Ownership::Raw)), "*mut std::ffi::c_void");
        assert_eq!(
            to_rust(&Type::pointer(Type::integer("char").with_const(true), Ownership::Raw)),
            "&str"
        );
        assert_eq!(to_rust(&Type::pointer(Type::class("Node"), Ownership::Shared)), "Rc<Node>");
        assert_eq!(to_rust(&Type::pointer(Type::class("Node"), Ownership::Weak)), "Weak<Node>");
    }

    #[test]
    fn smart_pointer_of_array_maps_elementwise() {
        let arr = Type::array(int(), None);
        let boxed = Type::pointer(arr.clone(), Ownership::Unique);
        assert_eq!(to_rust(&boxed), "Box<[i32]>");
        assert_eq!(to_go(&boxed), "[]int32");
        let fixed = Type::array(Type::float("double"), Some("3".into()));
        assert_eq!(to_rust(&fixed), "[f64; 3]");
        assert_eq!(to_go(&fixed), "[3]float64");
    }

    #[test]
    fn references() {
        let s = Type::reference(Type::string().with_const(true), false);
        assert_eq!(to_rust(&s), "&str");
        assert_eq!(to_go(&s), "string");
        let m = Type::reference(Type::class("Point"), false);
        assert_eq!(to_rust(&m), "&mut Point");
        assert_eq!(to_go(&m), "*Point");
        let v = container(ContainerKind::Vector, "std::vector<int>", vec![int()]).with_const(true);
        assert_eq!(to_rust(&Type::reference(v, false)), "&[i32]");
    }

    #[test]
    fn nested_containers() {
        let inner = container(ContainerKind::Vector, "std::vector<int>", vec![int()]);
        let map = container(
            ContainerKind::Map,
            "std::map<int, std::vector<int>>",
            vec![int(), inner],
        );
        assert_eq!(to_rust(&map), "BTreeMap<i32, Vec<i32>>");
        assert_eq!(to_go(&map), "map[int32][]int32");
        let set = container(ContainerKind::UnorderedSet, "std::unordered_set<int>", vec![int()]);
        assert_eq!(to_rust(&set), "HashSet<i32>");
        assert_eq!(to_go(&set), "map[int32]struct{}");
        let opt = container(ContainerKind::Optional, "std::optional<int>", vec![int()]);
        assert_eq!(to_rust(&opt), "Option<i32>");
        assert_eq!(to_go(&opt), "*int32");
    }

    #[test]
    fn threading_types() {
        let atomic = Type::new(
            "std::atomic<int>",
            TypeKind::Threading {
                kind: ThreadingKind::Atomic,
                args: vec![int()],
            },
        );
        assert_eq!(to_rust(&atomic), "AtomicI32");
        assert_eq!(to_go(&atomic), "atomic.Int32");
        let flag = Type::new(
            "std::atomic<bool>",
            TypeKind::Threading {
                kind: ThreadingKind::Atomic,
                args: vec![Type::bool()],
            },
        );
        assert_eq!(to_rust(&flag), "AtomicBool");
        assert_eq!(to_go(&flag), "atomic.Bool");
        let rw = Type::new(
            "std::shared_mutex",
            TypeKind::Threading {
                kind: ThreadingKind::SharedMutex,
                args: vec![],
            },
        );
        assert_eq!(to_rust(&rw), "RwLock<()>");
        assert_eq!(to_go(&rw), "sync.RWMutex");
    }

    #[test]
    fn async_types() {
        let fut = Type::new(
            "std::future<int>",
            TypeKind::Async {
                kind: AsyncKind::Future,
                args: vec![int()],
            },
        );
        assert_eq!(to_rust(&fut), "tokio::task::JoinHandle<i32>");
        assert_eq!(to_go(&fut), "<-chan int32");
    }

    #[test]
    fn user_templates_map_args() {
        let b = Type::class("Box<int>");
        assert_eq!(to_rust(&b), "Box<i32>");
        assert_eq!(to_go(&b), "Box[int32]");
        assert_eq!(to_rust(&Type::class("geo::Point")), "Point");
    }

    #[test]
    fn function_pointers() {
        let f = Type::new(
            "int(*)(int, int)",
            TypeKind::Function {
                ret: Box::new(int()),
                params: vec![int(), int()],
                erased: false,
            },
        );
        assert_eq!(to_rust(&f), "fn(i32, i32) -> i32");
        assert_eq!(to_go(&f), "func(int32, int32) int32");
        let cb = Type::new(
            "std::function<void(int)>",
            TypeKind::Function {
                ret: Box::new(Type::void()),
                params: vec![int()],
                erased: true,
            },
        );
        assert_eq!(to_rust(&cb), "Box<dyn Fn(i32)>");
        assert_eq!(to_go(&cb), "func(int32)");
    }

    #[test]
    fn c_rendering() {
        assert_eq!(to_c(&int()), "int");
        assert_eq!(to_c(&Type::pointer(Type::class("Calc"), Ownership::Raw)), "void*");
        assert_eq!(to_c(&Type::reference(Type::string().with_const(true), false)), "const char*");
        assert_eq!(to_c(&Type::pointer(Type::float("double"), Ownership::Raw)), "double*");
        assert_eq!(to_c(&Type::new("Vec2", TypeKind::Struct)), "Vec2");
    }

    #[test]
    fn imports_are_collected() {
        let mut rust = BTreeSet::new();
        let map = container(
            ContainerKind::UnorderedMap,
            "std::unordered_map<int, std::shared_ptr<Node>>",
            vec![int(), Type::pointer(Type::class("Node"), Ownership::Shared)],
        );
        rust_imports(&map, &mut rust);
        assert!(rust.contains("std::collections::HashMap"));
        assert!(rust.contains("std::rc::Rc"));

        let mut go = BTreeSet::new();
        go_imports(&Type::pointer(Type::void(), Ownership::Raw), &mut go);
        assert!(go.contains("unsafe"));
    }
}
