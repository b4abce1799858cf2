//! Resolution of type spellings into [`Type`] values.
//!
//! The resolver peels one layer per pass: trailing `const` on a pointer,
//! then `&&`/`&`/`*`, then array extents, then cv qualifiers and elaborated
//! keywords, and finally recognizes builtins, smart pointers, standard
//! containers, threading and async primitives before falling back to a
//! user-defined class or struct.

use crate::lexer::lex;
use crate::token::CppToken;
use hybrid_common::{find_matching, find_top_level, split_top_level};
use hybrid_ir::type_map::{builtin_kind, normalize, strip_std};
use hybrid_ir::{AsyncKind, ContainerKind, Ownership, Parameter, ThreadingKind, Type, TypeKind};
use hybrid_source::FileId;
use std::collections::{BTreeMap, BTreeSet};

/// Names known while resolving: user types, aliases and template parameters
/// in scope.
#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
    structs: BTreeSet<String>,
    classes: BTreeSet<String>,
    enums: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
    template_scopes: Vec<Vec<String>>,
}

impl TypeResolver {
    /// Creates a resolver that knows no user names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a `struct` name.
    pub fn add_struct(&mut self, name: impl Into<String>) {
        self.structs.insert(name.into());
    }

    /// Records a `class` name.
    pub fn add_class(&mut self, name: impl Into<String>) {
        self.classes.insert(name.into());
    }

    /// Records an `enum` name.
    pub fn add_enum(&mut self, name: impl Into<String>) {
        self.enums.insert(name.into());
    }

    /// Records `using name = target;` or `typedef target name;`.
    ///
    /// Self-aliases such as `typedef struct Node Node;` are ignored.
    pub fn add_alias(&mut self, name: impl Into<String>, target: impl Into<String>) {
        let name = name.into();
        let target = normalize(&target.into());
        if strip_elaborated(&target) != name {
            self.aliases.insert(name, target);
        }
    }

    /// Opens a scope binding template parameter names.
    pub fn push_template_scope(&mut self, names: Vec<String>) {
        self.template_scopes.push(names);
    }

    /// Closes the innermost template scope.
    pub fn pop_template_scope(&mut self) {
        self.template_scopes.pop();
    }

    /// True if `name` is bound by an enclosing template header.
    pub fn is_template_param(&self, name: &str) -> bool {
        self.template_scopes
            .iter()
            .any(|scope| scope.iter().any(|p| p == name))
    }

    /// True if `name` is a known class, struct or enum.
    pub fn is_user_type(&self, name: &str) -> bool {
        self.structs.contains(name) || self.classes.contains(name) || self.enums.contains(name)
    }

    /// True if `name` can start a type: a builtin, a known user type, an
    /// alias, a template parameter or a standard library name.
    pub fn is_known_type_name(&self, name: &str) -> bool {
        let base = name.split('<').next().unwrap_or(name).trim();
        builtin_kind(base).is_some()
            || self.is_user_type(base)
            || self.aliases.contains_key(base)
            || self.is_template_param(base)
            || base.starts_with("std::")
    }

    /// Resolves a type spelling.
    ///
    /// ```
    /// use hybrid_cpp_parser::TypeResolver;
    /// use hybrid_ir::{Ownership, TypeKind};
    /// let ty = TypeResolver::new().resolve("std::unique_ptr<const int>");
    /// assert!(matches!(ty.kind, TypeKind::Pointer { ownership: Ownership::Unique, .. }));
    /// ```
    pub fn resolve(&self, spelling: &str) -> Type {
        self.resolve_depth(&normalize(spelling), 0)
    }

    /// Parses a parenthesized parameter list's inner text.
    ///
    /// A lone `void` means no parameters; a C variadic `...` is dropped.
    /// Unnamed parameters are called `arg0`, `arg1`, ... by position.
    pub fn parse_parameters(&self, text: &str) -> Vec<Parameter> {
        let pieces = split_top_level(text, ',');
        if pieces.len() == 1 && pieces[0] == "void" {
            return Vec::new();
        }
        pieces
            .into_iter()
            .filter(|p| *p != "...")
            .enumerate()
            .map(|(index, p)| self.parse_parameter(p, index))
            .collect()
    }

    /// Parses one `type name [= default]` parameter.
    pub fn parse_parameter(&self, text: &str, index: usize) -> Parameter {
        let (decl, default_value) = match find_top_level(text, '=') {
            Some(eq) => (text[..eq].trim(), Some(text[eq + 1..].trim().to_string())),
            None => (text.trim(), None),
        };
        let (name, type_text) = split_declarator(decl);
        Parameter {
            name: name.unwrap_or_else(|| format!("arg{index}")),
            ty: self.resolve(&type_text),
            default_value,
        }
    }

    fn resolve_depth(&self, text: &str, depth: usize) -> Type {
        let text = text.trim();
        if depth > 32 || text.is_empty() {
            return Type::class(text);
        }

        // `T* const`: constness of the pointer itself.
        if let Some(rest) = text.strip_suffix("const") {
            let rest = rest.trim_end();
            if rest.ends_with('*') {
                return self.resolve_depth(rest, depth + 1).with_const(true);
            }
        }
        if let Some(rest) = text.strip_suffix("&&") {
            return Type::reference(self.resolve_depth(rest, depth + 1), true);
        }
        if let Some(rest) = text.strip_suffix('&') {
            return Type::reference(self.resolve_depth(rest, depth + 1), false);
        }
        if let Some(rest) = text.strip_suffix('*') {
            return Type::pointer(self.resolve_depth(rest, depth + 1), Ownership::Raw);
        }
        if text.ends_with(']') {
            if let Some(open) = text.rfind('[') {
                let len = text[open + 1..text.len() - 1].trim();
                let len = (!len.is_empty()).then(|| len.to_string());
                return Type::array(self.resolve_depth(&text[..open], depth + 1), len);
            }
        }
        if let Some(ty) = self.resolve_function_pointer(text, depth) {
            return ty;
        }

        let (core, is_const) = strip_cv(text);
        self.resolve_core(core, depth).with_const(is_const)
    }

    /// `R(*)(A, B)` function pointer spellings.
    fn resolve_function_pointer(&self, text: &str, depth: usize) -> Option<Type> {
        if !text.ends_with(')') {
            return None;
        }
        let star = text.find("(*")?;
        let close = find_matching(text, star)?;
        let params_open = text[close + 1..].find('(')? + close + 1;
        let params_close = find_matching(text, params_open)?;
        let ret = self.resolve_depth(&text[..star], depth + 1);
        let params = self.resolve_param_list(&text[params_open + 1..params_close], depth);
        let name = format!("{}(*)({})", ret.spelling(), spellings(&params));
        Some(Type::new(
            name,
            TypeKind::Function {
                ret: Box::new(ret),
                params,
                erased: false,
            },
        ))
    }

    fn resolve_param_list(&self, list: &str, depth: usize) -> Vec<Type> {
        if list.trim() == "void" {
            return Vec::new();
        }
        split_top_level(list, ',')
            .into_iter()
            .map(|p| self.resolve_depth(p, depth + 1))
            .collect()
    }

    fn resolve_core(&self, core: &str, depth: usize) -> Type {
        let core = strip_elaborated(core);
        if let Some(kind) = builtin_kind(core) {
            return Type::new(normalize(core), kind);
        }
        if core == "auto" || core == "decltype(auto)" {
            return Type::class("auto");
        }
        if core.starts_with("decltype(") {
            return Type::class(core);
        }
        if let Some(open) = core.find('<') {
            if core.ends_with('>') {
                let head = core[..open].trim();
                let inner = &core[open + 1..core.len() - 1];
                return self.resolve_template_id(head, inner, depth);
            }
        }
        self.resolve_name(core, depth)
    }

    fn resolve_template_id(&self, head: &str, inner: &str, depth: usize) -> Type {
        let args_text = split_top_level(inner, ',');
        let resolve_args = |depth: usize| -> Vec<Type> {
            args_text
                .iter()
                .map(|a| self.resolve_depth(a, depth + 1))
                .collect()
        };
        let std_name = self.std_name(head);

        if let Some(name) = std_name {
            let ownership = match name {
                "unique_ptr" | "auto_ptr" => Some(Ownership::Unique),
                "shared_ptr" => Some(Ownership::Shared),
                "weak_ptr" => Some(Ownership::Weak),
                _ => None,
            };
            if let Some(ownership) = ownership {
                let pointee = args_text
                    .first()
                    .map_or_else(Type::void, |a| self.resolve_depth(a, depth + 1));
                return Type::pointer(pointee, ownership);
            }
            if name == "array" && args_text.len() == 2 {
                let element = self.resolve_depth(args_text[0], depth + 1);
                return Type::array(element, Some(args_text[1].to_string()));
            }
            if name == "function" {
                return self.resolve_std_function(inner, depth);
            }
            if name == "basic_string" {
                return Type::string();
            }
            let canonical = format!("std::{name}<{}>", inner_spelling(&args_text));
            if let Some(kind) = ContainerKind::from_name(name) {
                let args = resolve_args(depth);
                let canonical = format!("std::{name}<{}>", spellings(&args));
                return Type::new(canonical, TypeKind::Container { kind, args });
            }
            if let Some(kind) = ThreadingKind::from_name(name) {
                let args = resolve_args(depth);
                return Type::new(canonical, TypeKind::Threading { kind, args });
            }
            if let Some(kind) = AsyncKind::from_name(name) {
                let args = resolve_args(depth);
                return Type::new(canonical, TypeKind::Async { kind, args });
            }
        }

        let args = resolve_args(depth);
        let name = format!("{head}<{}>", spellings(&args));
        let kind = self.user_kind(head);
        Type::new(name, kind)
    }

    /// `std::function<R(A, B)>`.
    fn resolve_std_function(&self, inner: &str, depth: usize) -> Type {
        let signature = inner.trim();
        let (ret, params) = match signature.find('(') {
            Some(open) => {
                let close = find_matching(signature, open).unwrap_or(signature.len());
                let end = close.min(signature.len());
                (
                    self.resolve_depth(&signature[..open], depth + 1),
                    self.resolve_param_list(&signature[open + 1..end], depth),
                )
            }
            None => (self.resolve_depth(signature, depth + 1), Vec::new()),
        };
        let name = format!("std::function<{}({})>", ret.spelling(), spellings(&params));
        Type::new(
            name,
            TypeKind::Function {
                ret: Box::new(ret),
                params,
                erased: true,
            },
        )
    }

    fn resolve_name(&self, name: &str, depth: usize) -> Type {
        if self.is_template_param(name) {
            return Type::new(name, TypeKind::TemplateParam);
        }
        if let Some(target) = self.aliases.get(name) {
            if target != name {
                return self.resolve_depth(&normalize(target), depth + 1);
            }
        }
        if let Some(std) = self.std_name(name) {
            if let Some(kind) = ThreadingKind::from_name(std) {
                return Type::new(
                    format!("std::{std}"),
                    TypeKind::Threading {
                        kind,
                        args: Vec::new(),
                    },
                );
            }
            if let Some(kind) = ContainerKind::from_name(std) {
                return Type::new(
                    format!("std::{std}"),
                    TypeKind::Container {
                        kind,
                        args: Vec::new(),
                    },
                );
            }
        }
        Type::new(name, self.user_kind(name))
    }

    /// The unqualified standard name for `std::x`, or for a bare `x` that is
    /// not shadowed by a user type.
    fn std_name<'a>(&self, head: &'a str) -> Option<&'a str> {
        let stripped = strip_std(head);
        if stripped.contains("::") {
            return None;
        }
        if stripped.len() != head.len() || !self.is_user_type(head) {
            Some(stripped)
        } else {
            None
        }
    }

    fn user_kind(&self, name: &str) -> TypeKind {
        let base = name.rsplit("::").next().unwrap_or(name);
        if self.structs.contains(name) || self.structs.contains(base) {
            TypeKind::Struct
        } else if self.enums.contains(name) || self.enums.contains(base) {
            TypeKind::Enum
        } else {
            TypeKind::Class
        }
    }
}

/// Resolves a spelling with no user names known.
pub fn resolve_type(spelling: &str) -> Type {
    TypeResolver::new().resolve(spelling)
}

/// Splits a declaration such as `const T& value` into its declared name and
/// the remaining type text. Returns `None` for the name when the declaration
/// is a bare type (`const std::string&`, `unsigned long`).
///
/// ```
/// use hybrid_cpp_parser::types::split_declarator;
/// assert_eq!(split_declarator("int (*cb)(int)"), (Some("cb".to_string()), "int (*)(int)".to_string()));
/// assert_eq!(split_declarator("double values[4]"), (Some("values".to_string()), "double[4]".to_string()));
/// ```
pub fn split_declarator(decl: &str) -> (Option<String>, String) {
    let decl = decl.trim();
    if let Some(star) = decl.find("(*") {
        if let Some(close) = decl[star..].find(')').map(|c| c + star) {
            let name = decl[star + 2..close].trim();
            if !name.is_empty() && name.chars().all(is_ident_char) {
                let ty = format!("{}(*{}", &decl[..star], &decl[close..]);
                return (Some(name.to_string()), ty);
            }
        }
    }
    let (head, dims) = match decl.find('[') {
        Some(i) if decl.ends_with(']') => (decl[..i].trim_end(), &decl[i..]),
        _ => (decl, ""),
    };
    let tokens: Vec<_> = lex(head, FileId::DUMMY)
        .into_iter()
        .filter(|t| t.kind != CppToken::Eof)
        .collect();
    let named = match tokens.as_slice() {
        [prefix @ .., last] if last.kind == CppToken::Identifier && !prefix.is_empty() => {
            let prev = prefix[prefix.len() - 1].kind;
            prev != CppToken::ColonColon
                && prev != CppToken::Template
                && prefix.iter().any(|t| {
                    matches!(t.kind, CppToken::Identifier | CppToken::Greater)
                        || t.kind.is_builtin_type()
                })
        }
        _ => false,
    };
    match tokens.last() {
        Some(last) if named => {
            let at = last.span.start as usize;
            let ty = head[..at].trim_end().trim_end_matches("...").trim_end();
            (Some(head[at..].to_string()), format!("{ty}{dims}"))
        }
        _ => (None, format!("{head}{dims}")),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn spellings(types: &[Type]) -> String {
    types
        .iter()
        .map(Type::spelling)
        .collect::<Vec<_>>()
        .join(", ")
}

fn inner_spelling(args: &[&str]) -> String {
    args.iter()
        .map(|a| normalize(a))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strips leading and trailing `const`/`volatile`.
fn strip_cv(text: &str) -> (&str, bool) {
    let mut core = text.trim();
    let mut is_const = false;
    loop {
        if let Some(rest) = core.strip_prefix("const ") {
            is_const = true;
            core = rest.trim_start();
        } else if let Some(rest) = core.strip_prefix("volatile ") {
            core = rest.trim_start();
        } else if let Some(rest) = core.strip_suffix(" const") {
            is_const = true;
            core = rest.trim_end();
        } else if let Some(rest) = core.strip_suffix(" volatile") {
            core = rest.trim_end();
        } else {
            return (core, is_const);
        }
    }
}

fn strip_elaborated(text: &str) -> &str {
    let mut core = text.trim();
    for prefix in ["typename ", "struct ", "class ", "enum ", "union "] {
        if let Some(rest) = core.strip_prefix(prefix) {
            core = rest.trim_start();
        }
    }
    core.strip_prefix("::").unwrap_or(core)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins() {
        let ty = resolve_type("unsigned");
        assert_eq!(ty.name, "unsigned int");
        assert_eq!(ty.kind, TypeKind::Integer);
        assert_eq!(resolve_type("double").kind, TypeKind::Float);
        assert!(resolve_type("void").is_void());
        assert_eq!(resolve_type("std::string"), Type::string());
    }

    #[test]
    fn const_placement() {
        let ty = resolve_type("const int");
        assert!(ty.is_const);
        assert_eq!(ty.name, "int");

        let east = resolve_type("int const");
        assert!(east.is_const);

        let ptr = resolve_type("const char*");
        assert!(!ptr.is_const);
        assert!(ptr.element().is_some_and(|e| e.is_const));

        let const_ptr = resolve_type("int* const");
        assert!(const_ptr.is_const);
        assert!(matches!(const_ptr.kind, TypeKind::Pointer { .. }));
    }

    #[test]
    fn references_peel_one_layer() {
        let ty = resolve_type("const std::string&");
        match &ty.kind {
            TypeKind::Reference { referent, rvalue } => {
                assert!(!rvalue);
                assert!(referent.is_const);
                assert!(matches!(
                    referent.kind,
                    TypeKind::Container {
                        kind: ContainerKind::String,
                        ..
                    }
                ));
            }
            other => panic!("expected reference, got {other:?}"),
        }
        assert!(matches!(
            resolve_type("T&&").kind,
            TypeKind::Reference { rvalue: true, .. }
        ));
    }

    #[test]
    fn nested_pointers() {
        let ty = resolve_type("int**");
        let inner = ty.element().unwrap();
        assert!(matches!(inner.kind, TypeKind::Pointer { .. }));
        assert_eq!(inner.element().unwrap().kind, TypeKind::Integer);
    }

    #[test]
    fn smart_pointers() {
        let ty = resolve_type("std::shared_ptr<Node>");
        match &ty.kind {
            TypeKind::Pointer { pointee, ownership } => {
                assert_eq!(*ownership, Ownership::Shared);
                assert_eq!(pointee.name, "Node");
                assert_eq!(pointee.kind, TypeKind::Class);
            }
            other => panic!("expected pointer, got {other:?}"),
        }
        assert!(matches!(
            resolve_type("std::weak_ptr<Node>").kind,
            TypeKind::Pointer {
                ownership: Ownership::Weak,
                ..
            }
        ));
    }

    #[test]
    fn arrays() {
        let c_array = resolve_type("int[10]");
        assert!(matches!(&c_array.kind, TypeKind::Array { len: Some(n), .. } if n == "10"));
        let std_array = resolve_type("std::array<double, 3>");
        assert!(matches!(&std_array.kind, TypeKind::Array { len: Some(n), .. } if n == "3"));
    }

    #[test]
    fn containers_resolve_arguments() {
        let ty = resolve_type("std::map<int, std::vector<std::string>>");
        assert_eq!(ty.name, "std::map<int, std::vector<std::string>>");
        match &ty.kind {
            TypeKind::Container { kind, args } => {
                assert_eq!(*kind, ContainerKind::Map);
                assert_eq!(args.len(), 2);
                assert!(matches!(
                    args[1].kind,
                    TypeKind::Container {
                        kind: ContainerKind::Vector,
                        ..
                    }
                ));
            }
            other => panic!("expected container, got {other:?}"),
        }
    }

    #[test]
    fn threading_and_async() {
        assert_eq!(
            resolve_type("std::mutex").threading_kind(),
            Some(ThreadingKind::Mutex)
        );
        assert_eq!(
            resolve_type("std::atomic<int>").threading_kind(),
            Some(ThreadingKind::Atomic)
        );
        assert_eq!(
            resolve_type("std::lock_guard<std::mutex>").threading_kind(),
            Some(ThreadingKind::LockGuard)
        );
        assert_eq!(
            resolve_type("std::future<int>").async_kind(),
            Some(AsyncKind::Future)
        );
    }

    #[test]
    fn function_types() {
        let erased = resolve_type("std::function<void(int, double)>");
        match &erased.kind {
            TypeKind::Function { ret, params, erased } => {
                assert!(*erased);
                assert!(ret.is_void());
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected function, got {other:?}"),
        }
        let raw = resolve_type("int(*)(int, int)");
        assert!(matches!(
            raw.kind,
            TypeKind::Function { erased: false, .. }
        ));
    }

    #[test]
    fn user_types_and_scopes() {
        let mut resolver = TypeResolver::new();
        resolver.add_struct("Point");
        resolver.add_enum("Color");
        resolver.add_alias("Id", "unsigned long");
        assert_eq!(resolver.resolve("Point").kind, TypeKind::Struct);
        assert_eq!(resolver.resolve("Color").kind, TypeKind::Enum);
        assert_eq!(resolver.resolve("Widget").kind, TypeKind::Class);
        assert_eq!(resolver.resolve("Id").name, "unsigned long");

        resolver.push_template_scope(vec!["T".into()]);
        assert_eq!(resolver.resolve("T").kind, TypeKind::TemplateParam);
        assert!(resolver.resolve("std::vector<T>").mentions_template_param());
        resolver.pop_template_scope();
        assert_eq!(resolver.resolve("T").kind, TypeKind::Class);
    }

    #[test]
    fn user_templates_keep_arguments() {
        let ty = resolve_type("Box<int>");
        assert_eq!(ty.name, "Box<int>");
        assert_eq!(ty.kind, TypeKind::Class);
        assert_eq!(ty.base_name(), "Box");
    }

    #[test]
    fn parameters_split_at_depth_zero() {
        let params = TypeResolver::new()
            .parse_parameters("std::map<int, std::vector<int>> m, int x");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "m");
        assert_eq!(params[0].ty.name, "std::map<int, std::vector<int>>");
        assert_eq!(params[1].name, "x");
        assert_eq!(params[1].ty.kind, TypeKind::Integer);
    }

    #[test]
    fn parameter_defaults_and_unnamed() {
        let resolver = TypeResolver::new();
        let params = resolver.parse_parameters("const std::string&, int retries = 3, double scale = f(1, 2)");
        assert_eq!(params[0].name, "arg0");
        assert!(matches!(params[0].ty.kind, TypeKind::Reference { .. }));
        assert_eq!(params[1].default_value.as_deref(), Some("3"));
        assert_eq!(params[2].default_value.as_deref(), Some("f(1, 2)"));
        assert!(resolver.parse_parameters("void").is_empty());
        assert!(resolver.parse_parameters("").is_empty());
        assert_eq!(resolver.parse_parameters("const char* fmt, ...").len(), 1);
    }

    #[test]
    fn declarator_splitting() {
        assert_eq!(split_declarator("unsigned long"), (None, "unsigned long".to_string()));
        assert_eq!(split_declarator("const Point"), (None, "const Point".to_string()));
        assert_eq!(split_declarator("std::string"), (None, "std::string".to_string()));
        assert_eq!(
            split_declarator("const Point& p"),
            (Some("p".to_string()), "const Point&".to_string())
        );
        assert_eq!(
            split_declarator("Args&&... args"),
            (Some("args".to_string()), "Args&&".to_string())
        );
    }

    #[test]
    fn self_alias_ignored() {
        let mut resolver = TypeResolver::new();
        resolver.add_struct("Node");
        resolver.add_alias("Node", "struct Node");
        assert_eq!(resolver.resolve("Node").kind, TypeKind::Struct);
    }

    #[test]
    fn known_type_names() {
        let mut resolver = TypeResolver::new();
        resolver.add_class("Widget");
        assert!(resolver.is_known_type_name("Widget"));
        assert!(resolver.is_known_type_name("size_t"));
        assert!(resolver.is_known_type_name("std::vector<int>"));
        assert!(!resolver.is_known_type_name("frobnicate"));
    }
}
