//! The base-class graph shared by both generators.
//!
//! Every name that appears in a base list becomes a trait (Rust) or an
//! interface (Go). A parsed base contributes its virtual methods; a base
//! that was never parsed is inferred from the union of the methods its
//! derived classes override. Classes are emitted bases-first.
//!
//! Two direct bases that declare the same method collide. The first base
//! in declaration order owns the implementation and later bases delegate to
//! it; each collision is reported once as W302. A cycle in the graph (W303)
//! drops the base links of every class on it. A class whose name repeats
//! an earlier class, such as two nested `Node` types in different outer
//! classes, is left out of the order and reported as W301.

use std::collections::{BTreeMap, BTreeSet};

use hybrid_diagnostics::{Diagnostic, DiagnosticSink, Label};
use hybrid_ir::{ClassDecl, Function, Ir};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use crate::errors::{W301, W302, W303};

/// How a base name is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseKind {
    /// Behavior only: the trait or interface takes the class's own name.
    Interface,
    /// A class with data: emitted as a struct, with a separate trait
    /// (`NameTrait` / `NameInterface`) when it has virtual methods.
    Data,
}

/// A trait or interface derived from one base name.
#[derive(Debug, Clone)]
pub(crate) struct BaseInfo {
    pub name: String,
    pub kind: BaseKind,
    /// Methods in declaration order. Bodies are defaults.
    pub methods: Vec<Function>,
    /// True if the base class itself was parsed.
    pub parsed: bool,
}

impl BaseInfo {
    pub fn method(&self, name: &str) -> Option<&Function> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn has_trait(&self) -> bool {
        !self.methods.is_empty()
    }
}

/// A method name two direct bases of one class both declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Collision {
    pub method: String,
    /// The base whose trait carries the implementation.
    pub owner: String,
}

pub(crate) struct Hierarchy {
    /// Class indices, bases before derived, otherwise in source order.
    pub order: Vec<usize>,
    bases: BTreeMap<String, BaseInfo>,
    links: BTreeMap<String, Vec<String>>,
    collisions: BTreeMap<String, Vec<Collision>>,
}

impl Hierarchy {
    pub fn build(ir: &Ir, sink: &DiagnosticSink) -> Self {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: BTreeMap<String, NodeIndex> = BTreeMap::new();
        let mut node = |graph: &mut DiGraph<String, ()>, name: &str| {
            *nodes
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };
        for class in &ir.classes {
            let derived = node(&mut graph, &class.name);
            for base in &class.bases {
                let base = node(&mut graph, base_name(&base.name));
                graph.add_edge(base, derived, ());
            }
        }

        let mut cyclic = BTreeSet::new();
        for component in tarjan_scc(&graph) {
            let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
            if component.len() < 2 && !self_loop {
                continue;
            }
            let mut names: Vec<String> = component.iter().map(|&n| graph[n].clone()).collect();
            names.sort();
            let span = ir
                .find_class(&names[0])
                .map(|c| c.span)
                .unwrap_or(hybrid_source::Span::DUMMY);
            sink.emit(
                Diagnostic::warning(
                    W303,
                    format!("inheritance cycle through {}", names.join(", ")),
                    span,
                )
                .with_label(Label::primary(span, "part of the cycle"))
                .with_help("base links of these classes are ignored"),
            );
            cyclic.extend(names);
        }

        let mut links: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for class in ir.classes.iter().filter(|c| !cyclic.contains(&c.name)) {
            let names: Vec<String> = class
                .bases
                .iter()
                .map(|b| base_name(&b.name).to_string())
                .filter(|b| !cyclic.contains(b))
                .collect();
            links.insert(class.name.clone(), names);
        }

        let mut bases = BTreeMap::new();
        for name in links.values().flatten() {
            if bases.contains_key(name) {
                continue;
            }
            let info = match ir.find_class(name) {
                Some(class) => parsed_base(class),
                None => inferred_base(name, ir, &links),
            };
            bases.insert(name.clone(), info);
        }
        for class in &ir.classes {
            if !bases.contains_key(&class.name) && is_trait_only(class) {
                bases.insert(class.name.clone(), parsed_base(class));
            }
        }

        let mut names: BTreeSet<&str> = BTreeSet::new();
        let mut repeated = BTreeSet::new();
        for (i, class) in ir.classes.iter().enumerate() {
            if names.insert(&class.name) {
                continue;
            }
            repeated.insert(i);
            sink.emit(
                Diagnostic::warning(
                    W301,
                    format!("a second class named `{}` is not translated", class.name),
                    class.span,
                )
                .with_label(Label::primary(class.span, "repeats an earlier class name"))
                .with_help("nested classes are emitted at top level under their own name"),
            );
        }

        let order = emission_order(ir, &graph, &nodes, &cyclic, &repeated);
        let mut hierarchy = Self {
            order,
            bases,
            links,
            collisions: BTreeMap::new(),
        };
        hierarchy.find_collisions(ir, sink);
        debug!(
            bases = hierarchy.bases.len(),
            collisions = hierarchy.collisions.values().map(Vec::len).sum::<usize>(),
            "class hierarchy"
        );
        hierarchy
    }

    fn find_collisions(&mut self, ir: &Ir, sink: &DiagnosticSink) {
        for class in &ir.classes {
            let direct = self.direct_bases(&class.name);
            let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
            let mut found = Vec::new();
            for base in &direct {
                for m in &base.methods {
                    match owners.get(m.name.as_str()) {
                        Some(owner) if *owner != base.name => {
                            found.push((m.name.clone(), owner.to_string(), base.name.clone()));
                        }
                        Some(_) => {}
                        None => {
                            owners.insert(&m.name, &base.name);
                        }
                    }
                }
            }
            if found.is_empty() {
                continue;
            }
            for (method, owner, other) in &found {
                sink.emit(
                    Diagnostic::warning(
                        W302,
                        format!(
                            "`{}` inherits `{method}` from both `{owner}` and `{other}`",
                            class.name
                        ),
                        class.span,
                    )
                    .with_label(Label::primary(class.span, "declared here"))
                    .with_note(format!("the implementation for `{owner}` is used for both")),
                );
            }
            let collisions = found
                .into_iter()
                .map(|(method, owner, _)| Collision { method, owner })
                .collect();
            self.collisions.insert(class.name.clone(), collisions);
        }
    }

    /// Trait or interface facts for a base name.
    pub fn base(&self, name: &str) -> Option<&BaseInfo> {
        self.bases.get(name)
    }

    /// Every base, by name.
    pub fn bases(&self) -> impl Iterator<Item = &BaseInfo> {
        self.bases.values()
    }

    /// Direct bases of `class` in declaration order, cycles removed.
    pub fn direct_bases(&self, class: &str) -> Vec<&BaseInfo> {
        self.links
            .get(class)
            .map(|names| names.iter().filter_map(|n| self.bases.get(n)).collect())
            .unwrap_or_default()
    }

    /// The first direct base that carries data; derived structs hold it in
    /// a `base` field (Rust) or embed it (Go).
    pub fn data_base(&self, class: &str) -> Option<&BaseInfo> {
        self.direct_bases(class)
            .into_iter()
            .find(|b| b.kind == BaseKind::Data)
    }

    /// True if the class is emitted as a trait or interface only.
    pub fn is_interface(&self, class: &str) -> bool {
        self.bases
            .get(class)
            .is_some_and(|b| b.kind == BaseKind::Interface && b.parsed)
    }

    /// The base owning `method` when it collides across bases of `class`.
    pub fn collision_owner(&self, class: &str, method: &str) -> Option<&str> {
        self.collisions
            .get(class)?
            .iter()
            .find(|c| c.method == method)
            .map(|c| c.owner.as_str())
    }

    /// True if `method` of `class` implements a method of one of its bases.
    pub fn is_trait_method(&self, class: &str, method: &str) -> bool {
        self.direct_bases(class)
            .iter()
            .any(|b| b.method(method).is_some())
    }

    /// The class that declares the field `field`, walking data bases up
    /// from `class`. Returns the chain of data bases crossed.
    pub fn field_path<'a>(&'a self, ir: &Ir, class: &str, field: &str) -> Option<Vec<&'a str>> {
        let mut path = Vec::new();
        let mut current = class.to_string();
        for _ in 0..32 {
            let base = self.data_base(&current)?;
            path.push(base.name.as_str());
            let decl = ir.find_class(&base.name)?;
            if decl.field(field).is_some() {
                return Some(path);
            }
            current = base.name.clone();
        }
        None
    }
}

fn base_name(name: &str) -> &str {
    let name = name.split('<').next().unwrap_or(name).trim();
    name.rsplit("::").next().unwrap_or(name)
}

/// No data, only virtual methods, and at least one of them pure: the class
/// is pure behavior. A concrete class is never trait-only, so every class
/// that can be instantiated keeps its struct and constructor.
pub(crate) fn is_trait_only(class: &ClassDecl) -> bool {
    let methods: Vec<&Function> = class
        .methods
        .iter()
        .filter(|m| !m.is_constructor && !m.is_destructor)
        .collect();
    class.instance_fields().next().is_none()
        && methods.iter().all(|m| m.is_virtual)
        && methods.iter().any(|m| m.is_pure_virtual)
}

fn parsed_base(class: &ClassDecl) -> BaseInfo {
    let interface = is_trait_only(class);
    let methods = class
        .methods
        .iter()
        .filter(|m| !m.is_constructor && !m.is_destructor)
        .filter(|m| interface || m.is_virtual || m.is_override)
        .cloned()
        .collect();
    BaseInfo {
        name: class.name.clone(),
        kind: if interface {
            BaseKind::Interface
        } else {
            BaseKind::Data
        },
        methods,
        parsed: true,
    }
}

/// The union of the virtual methods overridden by classes deriving from an
/// unparsed base, first declaration winning, as bodiless signatures.
fn inferred_base(name: &str, ir: &Ir, links: &BTreeMap<String, Vec<String>>) -> BaseInfo {
    let mut methods: Vec<Function> = Vec::new();
    for class in &ir.classes {
        if !links.get(&class.name).is_some_and(|b| b.iter().any(|b| b == name)) {
            continue;
        }
        for m in class.methods.iter().filter(|m| {
            (m.is_override || m.is_virtual) && !m.is_constructor && !m.is_destructor
        }) {
            if methods.iter().any(|existing| existing.name == m.name) {
                continue;
            }
            let mut signature = m.clone();
            signature.body = None;
            signature.mark_pure_virtual();
            methods.push(signature);
        }
    }
    BaseInfo {
        name: name.to_string(),
        kind: BaseKind::Interface,
        methods,
        parsed: false,
    }
}

/// Kahn's algorithm preferring source order among ready classes.
fn emission_order(
    ir: &Ir,
    graph: &DiGraph<String, ()>,
    nodes: &BTreeMap<String, NodeIndex>,
    cyclic: &BTreeSet<String>,
    repeated: &BTreeSet<usize>,
) -> Vec<usize> {
    let mut done: BTreeSet<&str> = BTreeSet::new();
    let total = ir.classes.len() - repeated.len();
    let mut order = Vec::with_capacity(total);
    while order.len() < total {
        let ready = ir.classes.iter().enumerate().find(|(i, c)| {
            !order.contains(i)
                && !repeated.contains(i)
                && (cyclic.contains(&c.name)
                    || nodes.get(&c.name).is_none_or(|&n| {
                        graph.neighbors_directed(n, Direction::Incoming).all(|b| {
                            let base = graph[b].as_str();
                            done.contains(base) || ir.find_class(base).is_none()
                        })
                    }))
        });
        let Some((i, class)) = ready else {
            // Unreachable once repeated names are dropped; keep source order.
            let rest: Vec<usize> = (0..ir.classes.len())
                .filter(|i| !order.contains(i) && !repeated.contains(i))
                .collect();
            order.extend(rest);
            break;
        };
        done.insert(&class.name);
        order.push(i);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::{BaseClass, AccessLevel, Type, Variable};

    fn virtual_method(name: &str, pure: bool) -> Function {
        let mut f = Function::new(name, Type::integer("int"));
        f.is_virtual = true;
        if pure {
            f.mark_pure_virtual();
        } else {
            f.body = Some("return 0;".into());
        }
        f
    }

    fn derived(name: &str, bases: &[&str], overrides: &[&str]) -> ClassDecl {
        let mut c = ClassDecl::new(name, false);
        for b in bases {
            c.bases.push(BaseClass {
                name: b.to_string(),
                access: AccessLevel::Public,
                is_virtual: false,
            });
        }
        for m in overrides {
            let mut f = Function::new(*m, Type::integer("int"));
            f.is_override = true;
            f.body = Some("return 1;".into());
            c.methods.push(f);
        }
        c
    }

    #[test]
    fn interface_base_comes_first() {
        let mut ir = Ir::new();
        ir.add_class(derived("Circle", &["Shape"], &["area"]));
        let mut shape = ClassDecl::new("Shape", false);
        shape.methods.push(virtual_method("area", true));
        shape.methods.push(virtual_method("name", false));
        ir.add_class(shape);
        let sink = DiagnosticSink::new();
        let h = Hierarchy::build(&ir, &sink);
        assert_eq!(h.order, vec![1, 0]);
        let base = h.base("Shape").unwrap();
        assert_eq!(base.kind, BaseKind::Interface);
        assert_eq!(base.methods.len(), 2);
        assert!(h.is_interface("Shape"));
        assert!(h.is_trait_method("Circle", "area"));
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn repeated_class_names_are_left_out() {
        let mut ir = Ir::new();
        ir.add_class(ClassDecl::new("Inner", true));
        ir.add_class(ClassDecl::new("A", false));
        ir.add_class(ClassDecl::new("Inner", true));
        ir.add_class(ClassDecl::new("B", false));
        let sink = DiagnosticSink::new();
        let h = Hierarchy::build(&ir, &sink);
        assert_eq!(h.order, vec![0, 1, 3]);
        assert!(sink.has_code(W301));
    }

    #[test]
    fn unparsed_base_is_inferred_from_overrides() {
        let mut ir = Ir::new();
        ir.add_class(derived("A", &["Widget"], &["draw", "size"]));
        ir.add_class(derived("B", &["Widget"], &["draw", "click"]));
        let h = Hierarchy::build(&ir, &DiagnosticSink::new());
        let widget = h.base("Widget").unwrap();
        assert!(!widget.parsed);
        let names: Vec<&str> = widget.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["draw", "size", "click"]);
        assert!(widget.methods.iter().all(|m| m.is_pure_virtual && m.body.is_none()));
    }

    #[test]
    fn data_base_and_field_path() {
        let mut ir = Ir::new();
        let mut animal = ClassDecl::new("Animal", false);
        animal.fields.push(Variable::new("age", Type::integer("int")));
        animal.methods.push(virtual_method("speak", false));
        ir.add_class(animal);
        ir.add_class(derived("Dog", &["Animal"], &["speak"]));
        let h = Hierarchy::build(&ir, &DiagnosticSink::new());
        assert_eq!(h.data_base("Dog").map(|b| b.name.as_str()), Some("Animal"));
        assert_eq!(h.field_path(&ir, "Dog", "age"), Some(vec!["Animal"]));
        assert_eq!(h.field_path(&ir, "Dog", "missing"), None);
        assert!(!h.is_interface("Animal"));
    }

    #[test]
    fn colliding_bases_warn_and_first_wins() {
        let mut ir = Ir::new();
        ir.add_class(derived("Duck", &["Flyer", "Swimmer"], &["move"]));
        let mut flyer = ClassDecl::new("Flyer", false);
        flyer.methods.push(virtual_method("move", true));
        let mut swimmer = ClassDecl::new("Swimmer", false);
        swimmer.methods.push(virtual_method("move", true));
        ir.add_class(flyer);
        ir.add_class(swimmer);
        let sink = DiagnosticSink::new();
        let h = Hierarchy::build(&ir, &sink);
        assert_eq!(h.collision_owner("Duck", "move"), Some("Flyer"));
        assert_eq!(sink.count_code(W302), 1);
    }

    #[test]
    fn fieldless_concrete_subclass_is_not_an_interface() {
        let mut ir = Ir::new();
        let mut animal = ClassDecl::new("Animal", false);
        animal.methods.push(virtual_method("speak", true));
        animal.methods.push(virtual_method("legs", true));
        ir.add_class(animal);
        let mut dog = derived("Dog", &["Animal"], &["speak", "legs"]);
        for m in &mut dog.methods {
            m.is_virtual = true;
        }
        ir.add_class(dog);
        let h = Hierarchy::build(&ir, &DiagnosticSink::new());
        assert!(h.is_interface("Animal"));
        assert!(!h.is_interface("Dog"));
        assert!(h.base("Dog").is_none());
        assert!(h.is_trait_method("Dog", "speak"));
    }

    #[test]
    fn virtual_class_without_pure_methods_keeps_its_struct() {
        let mut ir = Ir::new();
        let mut base = ClassDecl::new("Logger", false);
        base.methods.push(virtual_method("log", false));
        ir.add_class(base);
        let h = Hierarchy::build(&ir, &DiagnosticSink::new());
        assert!(!h.is_interface("Logger"));
    }

    #[test]
    fn cycles_are_reported_and_cut() {
        let mut ir = Ir::new();
        ir.add_class(derived("A", &["B"], &[]));
        ir.add_class(derived("B", &["A"], &[]));
        ir.add_class(derived("C", &["C"], &[]));
        let sink = DiagnosticSink::new();
        let h = Hierarchy::build(&ir, &sink);
        assert_eq!(sink.count_code(W303), 2);
        assert!(h.direct_bases("A").is_empty());
        assert!(h.direct_bases("C").is_empty());
        assert_eq!(h.order.len(), 3);
    }
}
