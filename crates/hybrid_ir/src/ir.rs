//! The top-level container for one translation unit.

use crate::decl::{ClassDecl, EnumDecl, Function, Variable};
use crate::types::{Type, TypeKind, TypeRegistry};
use serde::{Deserialize, Serialize};

/// Everything recovered from one translation unit.
///
/// Built by the parser, annotated by the analyzers, then read by a single
/// generator. Declarations keep source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ir {
    /// Classes and structs.
    pub classes: Vec<ClassDecl>,
    /// Free functions.
    pub functions: Vec<Function>,
    /// Namespace-scope variables.
    pub globals: Vec<Variable>,
    /// Enumerations.
    pub enums: Vec<EnumDecl>,
    /// Named types seen in the unit.
    pub types: TypeRegistry,
}

impl Ir {
    /// Creates an empty IR.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a class and registers its name as a type.
    pub fn add_class(&mut self, class: ClassDecl) {
        let kind = if class.is_struct {
            TypeKind::Struct
        } else {
            TypeKind::Class
        };
        self.types.register(Type::new(class.name.clone(), kind));
        self.classes.push(class);
    }

    /// Appends a free function.
    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Appends a global variable.
    pub fn add_global(&mut self, var: Variable) {
        self.globals.push(var);
    }

    /// Appends an enum and registers its name as a type.
    pub fn add_enum(&mut self, decl: EnumDecl) {
        self.types.register(Type::new(decl.name.clone(), TypeKind::Enum));
        self.enums.push(decl);
    }

    /// Registers a named type.
    pub fn register_type(&mut self, ty: Type) {
        self.types.register(ty);
    }

    /// Looks up a type by canonical name.
    pub fn find_type(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// Looks up a class by name.
    pub fn find_class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Mutable class lookup.
    pub fn find_class_mut(&mut self, name: &str) -> Option<&mut ClassDecl> {
        self.classes.iter_mut().find(|c| c.name == name)
    }

    /// Looks up a free function by name (first overload).
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Every function in the unit: free functions, then methods class by class.
    pub fn all_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions
            .iter()
            .chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    /// Number of declarations a generator must emit a unit for.
    pub fn unit_count(&self) -> usize {
        self.classes.len() + self.functions.len()
    }

    /// True if nothing was recovered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.functions.is_empty()
            && self.globals.is_empty()
            && self.enums.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Ir {
        let mut ir = Ir::new();
        let mut point = ClassDecl::new("Point", false);
        point.fields.push(Variable::new("x", Type::integer("int")));
        point.methods.push(Function::constructor("Point"));
        point.methods.push(Function::new("distance", Type::integer("int")));
        ir.add_class(point);
        ir.add_function(Function::new("main", Type::integer("int")));
        ir
    }

    #[test]
    fn classes_register_types() {
        let ir = sample();
        assert_eq!(ir.find_type("Point").map(|t| &t.kind), Some(&TypeKind::Class));
        assert!(ir.find_class("Point").is_some());
        assert!(ir.find_class("Missing").is_none());
    }

    #[test]
    fn all_functions_covers_methods() {
        let ir = sample();
        let names: Vec<_> = ir.all_functions().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main", "Point", "distance"]);
        assert_eq!(ir.unit_count(), 2);
    }

    #[test]
    fn enums_register_types() {
        let mut ir = Ir::new();
        ir.add_enum(EnumDecl {
            name: "Color".into(),
            is_scoped: true,
            underlying: None,
            variants: vec![("Red".into(), None)],
            span: hybrid_source::Span::DUMMY,
        });
        assert_eq!(ir.find_type("Color").map(|t| &t.kind), Some(&TypeKind::Enum));
        assert!(!ir.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let ir = sample();
        let json = serde_json::to_string_pretty(&ir).unwrap();
        let back: Ir = serde_json::from_str(&json).unwrap();
        assert_eq!(ir, back);
    }
}
