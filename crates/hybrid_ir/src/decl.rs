//! Declarations: variables, parameters, functions, classes and enums.

use crate::features::{AsyncInfo, ClassThreading, ExceptionInfo, TemplateInfo, ThreadingInfo};
use crate::types::Type;
use hybrid_source::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// C++ member access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// `public`
    #[default]
    Public,
    /// `protected`
    Protected,
    /// `private`
    Private,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessLevel::Public => "public",
            AccessLevel::Protected => "protected",
            AccessLevel::Private => "private",
        })
    }
}

/// A field, global or local variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Name.
    pub name: String,
    /// Declared type.
    pub ty: Type,
    /// `mutable` member.
    pub is_mutable: bool,
    /// `static` storage.
    pub is_static: bool,
    /// `const` or `constexpr`.
    pub is_const: bool,
    /// Initializer text after `=`, or the bracketed `{...}` / `(...)` of a
    /// direct initialization.
    pub initializer: Option<String>,
    /// Member access; `Public` for globals.
    pub access: AccessLevel,
    /// Source location of the declarator.
    pub span: Span,
}

impl Variable {
    /// A plain non-static variable.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        let is_const = ty.is_const;
        Self {
            name: name.into(),
            ty,
            is_mutable: false,
            is_static: false,
            is_const,
            initializer: None,
            access: AccessLevel::Public,
            span: Span::DUMMY,
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name; synthesized as `argN` when the declaration omits it.
    pub name: String,
    /// Declared type.
    pub ty: Type,
    /// Default argument text.
    pub default_value: Option<String>,
}

impl Parameter {
    /// A parameter without default.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
        }
    }
}

/// One entry of a constructor's member initializer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInit {
    /// Initialized member (or base class) name.
    pub member: String,
    /// Argument text inside the parentheses or braces.
    pub value: String,
}

/// A free function, method, constructor or destructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Unqualified name. Destructors are spelled `~Name`, operators `operator+`.
    pub name: String,
    /// Return type; `None` for constructors and destructors.
    pub return_type: Option<Type>,
    /// Parameters in order.
    pub params: Vec<Parameter>,
    /// Body text without the outer braces; `None` for declarations.
    pub body: Option<String>,
    /// Constructor member initializers.
    pub initializers: Vec<MemberInit>,
    /// `const` member function.
    pub is_const: bool,
    /// `static` member or internal-linkage free function.
    pub is_static: bool,
    /// `virtual` (also set for `override` and `= 0`).
    pub is_virtual: bool,
    /// `= 0`.
    pub is_pure_virtual: bool,
    /// Declared with `override`.
    pub is_override: bool,
    /// Constructor.
    pub is_constructor: bool,
    /// Destructor.
    pub is_destructor: bool,
    /// Member access; `Public` for free functions.
    pub access: AccessLevel,
    /// The raw `template<...>` header preceding the declaration.
    pub template_header: Option<String>,
    /// Explicit `<...>` after the name (specializations).
    pub template_args: Option<String>,
    /// Location of the whole declaration.
    pub span: Span,
    /// Location of the body including braces.
    pub body_span: Span,
    /// Exception analysis.
    pub exceptions: ExceptionInfo,
    /// Template analysis.
    pub template: TemplateInfo,
    /// Threading analysis.
    pub threading: ThreadingInfo,
    /// Coroutine and future analysis.
    pub async_info: AsyncInfo,
}

impl Function {
    /// A free function or method returning `return_type`.
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self::blank(name.into(), Some(return_type))
    }

    /// A constructor for class `class_name`.
    pub fn constructor(class_name: impl Into<String>) -> Self {
        let mut f = Self::blank(class_name.into(), None);
        f.is_constructor = true;
        f
    }

    /// A destructor for class `class_name`.
    pub fn destructor(class_name: &str) -> Self {
        let mut f = Self::blank(format!("~{class_name}"), None);
        f.is_destructor = true;
        f
    }

    fn blank(name: String, return_type: Option<Type>) -> Self {
        Self {
            name,
            return_type,
            params: Vec::new(),
            body: None,
            initializers: Vec::new(),
            is_const: false,
            is_static: false,
            is_virtual: false,
            is_pure_virtual: false,
            is_override: false,
            is_constructor: false,
            is_destructor: false,
            access: AccessLevel::Public,
            template_header: None,
            template_args: None,
            span: Span::DUMMY,
            body_span: Span::DUMMY,
            exceptions: ExceptionInfo::default(),
            template: TemplateInfo::default(),
            threading: ThreadingInfo::default(),
            async_info: AsyncInfo::default(),
        }
    }

    /// Marks the function `= 0`, which implies `virtual`.
    pub fn mark_pure_virtual(&mut self) {
        self.is_pure_virtual = true;
        self.is_virtual = true;
    }

    /// Checks the structural invariants: pure virtual implies virtual, and
    /// constructors and destructors have no return type.
    pub fn is_well_formed(&self) -> bool {
        (!self.is_pure_virtual || self.is_virtual)
            && (!(self.is_constructor || self.is_destructor) || self.return_type.is_none())
    }

    /// True for a declaration without a body.
    pub fn is_declaration_only(&self) -> bool {
        self.body.is_none()
    }

    /// True if the async analyzer marked the function.
    pub fn is_async(&self) -> bool {
        self.async_info.is_async
    }

    /// True if the exception analyzer found a `throw`.
    pub fn may_throw(&self) -> bool {
        self.exceptions.may_throw
    }

    /// True if the return type is absent or `void`.
    pub fn returns_void(&self) -> bool {
        self.return_type.as_ref().is_none_or(Type::is_void)
    }
}

/// A base class reference, recorded by name only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseClass {
    /// Base name as written (qualifiers and template arguments kept).
    pub name: String,
    /// Inheritance access.
    pub access: AccessLevel,
    /// `virtual` inheritance.
    pub is_virtual: bool,
}

/// Member names grouped under one access label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessSection {
    /// Access level of the section.
    pub access: AccessLevel,
    /// Fields and methods declared in the section, in order.
    pub members: Vec<String>,
}

/// A class or struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Name without template arguments.
    pub name: String,
    /// Declared with `struct`.
    pub is_struct: bool,
    /// Data members in order (static members included).
    pub fields: Vec<Variable>,
    /// Member functions in order, constructors and destructor included.
    pub methods: Vec<Function>,
    /// Direct bases in declaration order.
    pub bases: Vec<BaseClass>,
    /// The raw `template<...>` header.
    pub template_header: Option<String>,
    /// Explicit `<...>` after the class name (specializations).
    pub template_args: Option<String>,
    /// Template analysis.
    pub template: TemplateInfo,
    /// Member names by access section, in source order.
    pub access_sections: Vec<AccessSection>,
    /// Threading facts across fields and methods.
    pub threading: ClassThreading,
    /// Location of the class head through the closing brace.
    pub span: Span,
}

impl ClassDecl {
    /// An empty class or struct.
    pub fn new(name: impl Into<String>, is_struct: bool) -> Self {
        Self {
            name: name.into(),
            is_struct,
            fields: Vec::new(),
            methods: Vec::new(),
            bases: Vec::new(),
            template_header: None,
            template_args: None,
            template: TemplateInfo::default(),
            access_sections: Vec::new(),
            threading: ClassThreading::default(),
            span: Span::DUMMY,
        }
    }

    /// Default member access: public for `struct`, private for `class`.
    pub fn default_access(&self) -> AccessLevel {
        if self.is_struct {
            AccessLevel::Public
        } else {
            AccessLevel::Private
        }
    }

    /// Records `member` under `access`, extending the last section when the
    /// access level is unchanged.
    pub fn record_member(&mut self, access: AccessLevel, member: impl Into<String>) {
        match self.access_sections.last_mut() {
            Some(section) if section.access == access => section.members.push(member.into()),
            _ => self.access_sections.push(AccessSection {
                access,
                members: vec![member.into()],
            }),
        }
    }

    /// Looks up a field.
    pub fn field(&self, name: &str) -> Option<&Variable> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a method by name (first overload).
    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Constructors in declaration order.
    pub fn constructors(&self) -> impl Iterator<Item = &Function> {
        self.methods.iter().filter(|m| m.is_constructor)
    }

    /// Virtual methods, excluding the destructor.
    pub fn virtual_methods(&self) -> impl Iterator<Item = &Function> {
        self.methods
            .iter()
            .filter(|m| m.is_virtual && !m.is_destructor)
    }

    /// Non-static fields.
    pub fn instance_fields(&self) -> impl Iterator<Item = &Variable> {
        self.fields.iter().filter(|f| !f.is_static)
    }

    /// True if every method is pure virtual and there is no data: the class
    /// describes an interface only.
    pub fn is_interface(&self) -> bool {
        self.instance_fields().next().is_none()
            && self
                .methods
                .iter()
                .filter(|m| !m.is_constructor && !m.is_destructor)
                .all(|m| m.is_pure_virtual)
            && self.methods.iter().any(|m| m.is_pure_virtual)
    }

    /// True if the class declares or overrides any virtual method.
    pub fn is_polymorphic(&self) -> bool {
        self.methods.iter().any(|m| m.is_virtual)
    }
}

/// An enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Name.
    pub name: String,
    /// `enum class`.
    pub is_scoped: bool,
    /// Underlying type text after `:`.
    pub underlying: Option<String>,
    /// Enumerators with their optional value text.
    pub variants: Vec<(String, Option<String>)>,
    /// Location.
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn pure_virtual_implies_virtual() {
        let mut f = Function::new("area", Type::float("double"));
        f.mark_pure_virtual();
        assert!(f.is_virtual);
        assert!(f.is_well_formed());
        f.is_virtual = false;
        assert!(!f.is_well_formed());
    }

    #[test]
    fn constructors_have_no_return_type() {
        let ctor = Function::constructor("Point");
        assert!(ctor.return_type.is_none());
        assert!(ctor.is_well_formed());
        assert!(ctor.returns_void());
        let dtor = Function::destructor("Point");
        assert_eq!(dtor.name, "~Point");
        assert!(dtor.is_destructor);
    }

    #[test]
    fn access_sections_group_runs() {
        let mut c = ClassDecl::new("Point", false);
        assert_eq!(c.default_access(), AccessLevel::Private);
        c.record_member(AccessLevel::Private, "x");
        c.record_member(AccessLevel::Private, "y");
        c.record_member(AccessLevel::Public, "Point");
        c.record_member(AccessLevel::Public, "distance");
        assert_eq!(c.access_sections.len(), 2);
        assert_eq!(c.access_sections[0].members, vec!["x", "y"]);
        assert_eq!(c.access_sections[1].access, AccessLevel::Public);
    }

    #[test]
    fn interface_detection() {
        let mut shape = ClassDecl::new("Shape", false);
        let mut area = Function::new("area", Type::float("double"));
        area.mark_pure_virtual();
        shape.methods.push(area);
        shape.methods.push(Function::destructor("Shape"));
        assert!(shape.is_interface());
        assert!(shape.is_polymorphic());

        shape
            .fields
            .push(Variable::new("name", Type::string()));
        assert!(!shape.is_interface());
    }

    #[test]
    fn lookups() {
        let mut c = ClassDecl::new("Counter", true);
        c.fields.push(Variable::new("count", Type::integer("int")));
        c.methods.push(Function::constructor("Counter"));
        c.methods.push(Function::new("get", Type::integer("int")));
        assert!(c.field("count").is_some());
        assert!(c.method("get").is_some());
        assert_eq!(c.constructors().count(), 1);
        assert_eq!(c.default_access(), AccessLevel::Public);
    }
}
