//! The IR type model.
//!
//! A [`Type`] carries its canonical C++ spelling in `name` and a structural
//! [`TypeKind`]. Indirections (pointers, references, arrays) own exactly one
//! child inside the variant, so "element present iff indirection" holds by
//! construction. Container, threading and async kinds own their template
//! arguments in order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ownership semantics of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// `T*`
    Raw,
    /// `std::unique_ptr<T>`
    Unique,
    /// `std::shared_ptr<T>`
    Shared,
    /// `std::weak_ptr<T>`
    Weak,
}

/// Standard library containers and vocabulary types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    /// `std::vector`
    Vector,
    /// `std::list`
    List,
    /// `std::deque`
    Deque,
    /// `std::map`
    Map,
    /// `std::unordered_map`
    UnorderedMap,
    /// `std::set`
    Set,
    /// `std::unordered_set`
    UnorderedSet,
    /// `std::string`
    String,
    /// `std::string_view`
    StringView,
    /// `std::pair`
    Pair,
    /// `std::tuple`
    Tuple,
    /// `std::optional`
    Optional,
}

impl ContainerKind {
    /// Maps an unqualified template name (`vector`) to its kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "vector" => ContainerKind::Vector,
            "list" => ContainerKind::List,
            "deque" => ContainerKind::Deque,
            "map" => ContainerKind::Map,
            "unordered_map" => ContainerKind::UnorderedMap,
            "set" => ContainerKind::Set,
            "unordered_set" => ContainerKind::UnorderedSet,
            "string" => ContainerKind::String,
            "string_view" => ContainerKind::StringView,
            "pair" => ContainerKind::Pair,
            "tuple" => ContainerKind::Tuple,
            "optional" => ContainerKind::Optional,
            _ => return None,
        })
    }
}

/// Threading primitives from `<thread>`, `<mutex>`, `<shared_mutex>`,
/// `<atomic>` and `<condition_variable>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadingKind {
    /// `std::thread`
    Thread,
    /// `std::jthread`
    JThread,
    /// `std::mutex`
    Mutex,
    /// `std::recursive_mutex`
    RecursiveMutex,
    /// `std::shared_mutex`
    SharedMutex,
    /// `std::timed_mutex`
    TimedMutex,
    /// `std::lock_guard`
    LockGuard,
    /// `std::unique_lock`
    UniqueLock,
    /// `std::shared_lock`
    SharedLock,
    /// `std::scoped_lock`
    ScopedLock,
    /// `std::atomic`
    Atomic,
    /// `std::condition_variable`
    ConditionVariable,
}

impl ThreadingKind {
    /// Maps an unqualified name (`mutex`) to its kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "thread" => ThreadingKind::Thread,
            "jthread" => ThreadingKind::JThread,
            "mutex" => ThreadingKind::Mutex,
            "recursive_mutex" => ThreadingKind::RecursiveMutex,
            "shared_mutex" => ThreadingKind::SharedMutex,
            "timed_mutex" => ThreadingKind::TimedMutex,
            "lock_guard" => ThreadingKind::LockGuard,
            "unique_lock" => ThreadingKind::UniqueLock,
            "shared_lock" => ThreadingKind::SharedLock,
            "scoped_lock" => ThreadingKind::ScopedLock,
            "atomic" => ThreadingKind::Atomic,
            "condition_variable" | "condition_variable_any" => ThreadingKind::ConditionVariable,
            _ => return None,
        })
    }

    /// True for the mutex family.
    pub fn is_mutex(self) -> bool {
        matches!(
            self,
            ThreadingKind::Mutex
                | ThreadingKind::RecursiveMutex
                | ThreadingKind::SharedMutex
                | ThreadingKind::TimedMutex
        )
    }
}

/// Future-like primitives and coroutine handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsyncKind {
    /// `std::future`
    Future,
    /// `std::shared_future`
    SharedFuture,
    /// `std::promise`
    Promise,
    /// `std::coroutine_handle`
    CoroutineHandle,
}

impl AsyncKind {
    /// Maps an unqualified name (`future`) to its kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "future" => AsyncKind::Future,
            "shared_future" => AsyncKind::SharedFuture,
            "promise" => AsyncKind::Promise,
            "coroutine_handle" => AsyncKind::CoroutineHandle,
            _ => return None,
        })
    }
}

/// Structural classification of a [`Type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// Any builtin or `<cstdint>` integer, including character types.
    Integer,
    /// `float`, `double`, `long double`.
    Float,
    /// A raw or smart pointer.
    Pointer {
        /// The pointed-to type.
        pointee: Box<Type>,
        /// Raw, unique, shared or weak.
        ownership: Ownership,
    },
    /// `T&` or `T&&`.
    Reference {
        /// The referred-to type.
        referent: Box<Type>,
        /// `true` for `T&&`.
        rvalue: bool,
    },
    /// `T[N]`, `T[]` or `std::array<T, N>`.
    Array {
        /// Element type.
        element: Box<Type>,
        /// Length expression when known.
        len: Option<String>,
    },
    /// A user-defined `struct`.
    Struct,
    /// A user-defined `class`, or any unrecognized name.
    Class,
    /// A user-defined `enum`.
    Enum,
    /// A function pointer or `std::function`.
    Function {
        /// Return type.
        ret: Box<Type>,
        /// Parameter types.
        params: Vec<Type>,
        /// `true` for `std::function`, `false` for a plain function pointer.
        erased: bool,
    },
    /// A name bound by an enclosing `template<...>` header.
    TemplateParam,
    /// A standard library container.
    Container {
        /// Which container.
        kind: ContainerKind,
        /// Template arguments in order.
        args: Vec<Type>,
    },
    /// A threading primitive.
    Threading {
        /// Which primitive.
        kind: ThreadingKind,
        /// Template arguments in order.
        args: Vec<Type>,
    },
    /// A future, promise or coroutine handle.
    Async {
        /// Which primitive.
        kind: AsyncKind,
        /// Template arguments in order.
        args: Vec<Type>,
    },
}

/// A resolved C++ type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    /// Canonical spelling, e.g. `std::map<int, std::vector<int>>`.
    pub name: String,
    /// Top-level `const`.
    pub is_const: bool,
    /// Structure.
    pub kind: TypeKind,
}

impl Type {
    /// Creates a type.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            is_const: false,
            kind,
        }
    }

    /// `void`.
    pub fn void() -> Self {
        Self::new("void", TypeKind::Void)
    }

    /// `bool`.
    pub fn bool() -> Self {
        Self::new("bool", TypeKind::Bool)
    }

    /// A builtin integer spelled `name`.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Integer)
    }

    /// A builtin floating type spelled `name`.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Float)
    }

    /// A user-defined class named `name`.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// `std::string`.
    pub fn string() -> Self {
        Self::new(
            "std::string",
            TypeKind::Container {
                kind: ContainerKind::String,
                args: Vec::new(),
            },
        )
    }

    /// A pointer to `pointee` with the given ownership; the name is derived.
    pub fn pointer(pointee: Type, ownership: Ownership) -> Self {
        let name = match ownership {
            Ownership::Raw => format!("{}*", pointee.spelling()),
            Ownership::Unique => format!("std::unique_ptr<{}>", pointee.spelling()),
            Ownership::Shared => format!("std::shared_ptr<{}>", pointee.spelling()),
            Ownership::Weak => format!("std::weak_ptr<{}>", pointee.spelling()),
        };
        Self::new(
            name,
            TypeKind::Pointer {
                pointee: Box::new(pointee),
                ownership,
            },
        )
    }

    /// A reference to `referent`; the name is derived.
    pub fn reference(referent: Type, rvalue: bool) -> Self {
        let name = format!("{}{}", referent.spelling(), if rvalue { "&&" } else { "&" });
        Self::new(
            name,
            TypeKind::Reference {
                referent: Box::new(referent),
                rvalue,
            },
        )
    }

    /// An array of `element`; the name is derived.
    pub fn array(element: Type, len: Option<String>) -> Self {
        let name = format!("{}[{}]", element.spelling(), len.as_deref().unwrap_or(""));
        Self::new(
            name,
            TypeKind::Array {
                element: Box::new(element),
                len,
            },
        )
    }

    /// Marks the type `const`.
    pub fn with_const(mut self, is_const: bool) -> Self {
        self.is_const = is_const;
        self
    }

    /// The spelling including a leading `const` when set.
    pub fn spelling(&self) -> String {
        if self.is_const && !matches!(self.kind, TypeKind::Pointer { ownership: Ownership::Raw, .. }) {
            format!("const {}", self.name)
        } else if self.is_const {
            format!("{} const", self.name)
        } else {
            self.name.clone()
        }
    }

    /// The single child of a pointer, reference or array; `None` otherwise.
    pub fn element(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Pointer { pointee, .. } => Some(pointee),
            TypeKind::Reference { referent, .. } => Some(referent),
            TypeKind::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Template arguments of container, threading and async kinds.
    pub fn args(&self) -> &[Type] {
        match &self.kind {
            TypeKind::Container { args, .. }
            | TypeKind::Threading { args, .. }
            | TypeKind::Async { args, .. } => args,
            _ => &[],
        }
    }

    /// Strips references, returning the referred-to type.
    pub fn without_reference(&self) -> &Type {
        match &self.kind {
            TypeKind::Reference { referent, .. } => referent.without_reference(),
            _ => self,
        }
    }

    /// True for `void`.
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    /// True for bool, integers and floats.
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Bool | TypeKind::Integer | TypeKind::Float)
    }

    /// True for user-defined structs, classes and enums.
    pub fn is_user_defined(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Class | TypeKind::Enum)
    }

    /// True for standard containers (strings included).
    pub fn is_container(&self) -> bool {
        matches!(self.kind, TypeKind::Container { .. })
    }

    /// The threading kind, if this is a threading primitive.
    pub fn threading_kind(&self) -> Option<ThreadingKind> {
        match self.kind {
            TypeKind::Threading { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// The async kind, if this is a future, promise or coroutine handle.
    pub fn async_kind(&self) -> Option<AsyncKind> {
        match self.kind {
            TypeKind::Async { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// True if the type mentions a template parameter anywhere.
    pub fn mentions_template_param(&self) -> bool {
        match &self.kind {
            TypeKind::TemplateParam => true,
            TypeKind::Function { ret, params, .. } => {
                ret.mentions_template_param() || params.iter().any(Type::mentions_template_param)
            }
            _ => {
                self.element().is_some_and(Type::mentions_template_param)
                    || self.args().iter().any(Type::mentions_template_param)
            }
        }
    }

    /// The unqualified name (`ns::Widget` → `Widget`).
    pub fn base_name(&self) -> &str {
        let name = self.name.split('<').next().unwrap_or(&self.name);
        name.rsplit("::").next().unwrap_or(name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling())
    }
}

/// Name → type lookup for one translation unit.
///
/// Keyed by canonical spelling in a `BTreeMap` so iteration is ordered and
/// JSON dumps are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: BTreeMap<String, Type>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ty` under its name. An existing entry wins and is returned.
    pub fn register(&mut self, ty: Type) -> &Type {
        self.types.entry(ty.name.clone()).or_insert(ty)
    }

    /// Looks up a type by canonical name.
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_present_only_for_indirections() {
        let int = Type::integer("int");
        assert!(int.element().is_none());
        let ptr = Type::pointer(int.clone(), Ownership::Raw);
        assert_eq!(ptr.element(), Some(&int));
        let r = Type::reference(int.clone(), false);
        assert_eq!(r.element(), Some(&int));
        let arr = Type::array(int.clone(), Some("4".into()));
        assert_eq!(arr.element(), Some(&int));
        assert!(Type::string().element().is_none());
    }

    #[test]
    fn derived_names() {
        let int = Type::integer("int");
        assert_eq!(Type::pointer(int.clone(), Ownership::Raw).name, "int*");
        assert_eq!(
            Type::pointer(int.clone(), Ownership::Unique).name,
            "std::unique_ptr<int>"
        );
        assert_eq!(
            Type::reference(Type::string().with_const(true), false).name,
            "const std::string&"
        );
        assert_eq!(Type::array(int, Some("8".into())).name, "int[8]");
    }

    #[test]
    fn const_pointer_spelling() {
        let p = Type::pointer(Type::integer("char").with_const(true), Ownership::Raw);
        assert_eq!(p.name, "const char*");
        assert_eq!(p.clone().with_const(true).to_string(), "const char* const");
    }

    #[test]
    fn args_for_containers() {
        let v = Type::new(
            "std::vector<int>",
            TypeKind::Container {
                kind: ContainerKind::Vector,
                args: vec![Type::integer("int")],
            },
        );
        assert_eq!(v.args().len(), 1);
        assert!(v.element().is_none());
        assert!(v.is_container());
    }

    #[test]
    fn template_param_detection() {
        let t = Type::new("T", TypeKind::TemplateParam);
        let v = Type::new(
            "std::vector<T>",
            TypeKind::Container {
                kind: ContainerKind::Vector,
                args: vec![t.clone()],
            },
        );
        assert!(v.mentions_template_param());
        assert!(Type::pointer(t, Ownership::Shared).mentions_template_param());
        assert!(!Type::integer("int").mentions_template_param());
    }

    #[test]
    fn base_name_strips_namespaces() {
        assert_eq!(Type::class("geo::Point").base_name(), "Point");
        assert_eq!(Type::class("Box<T>").base_name(), "Box");
    }

    #[test]
    fn kind_lookups() {
        assert_eq!(ContainerKind::from_name("unordered_map"), Some(ContainerKind::UnorderedMap));
        assert_eq!(ThreadingKind::from_name("shared_mutex"), Some(ThreadingKind::SharedMutex));
        assert!(ThreadingKind::SharedMutex.is_mutex());
        assert!(!ThreadingKind::LockGuard.is_mutex());
        assert_eq!(AsyncKind::from_name("promise"), Some(AsyncKind::Promise));
        assert_eq!(ContainerKind::from_name("widget"), None);
    }

    #[test]
    fn registry_keeps_first() {
        let mut reg = TypeRegistry::new();
        reg.register(Type::class("Point"));
        reg.register(Type::new("Point", TypeKind::Struct));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("Point").map(|t| &t.kind), Some(&TypeKind::Class));
    }

    #[test]
    fn serde_roundtrip() {
        let ty = Type::pointer(Type::class("Node"), Ownership::Shared);
        let json = serde_json::to_string(&ty).unwrap();
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }
}
