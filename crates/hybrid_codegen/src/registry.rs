//! Generators by target name.

use std::collections::BTreeMap;

use hybrid_diagnostics::{Diagnostic, DiagnosticSink};
use hybrid_source::Span;

use crate::errors::E002;
use crate::{CodeGenerator, GoGenerator, RustGenerator};

/// Maps target names to generators.
///
/// Names are matched case-insensitively. Lookups that fail report `E002`
/// listing the registered targets, so a misconfigured target is caught
/// before any input is parsed.
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Box<dyn CodeGenerator>>,
}

impl GeneratorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            generators: BTreeMap::new(),
        }
    }

    /// The Rust and Go generators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RustGenerator));
        registry.register(Box::new(GoGenerator));
        registry
    }

    /// Adds `generator` under its own name, replacing any earlier one.
    pub fn register(&mut self, generator: Box<dyn CodeGenerator>) {
        self.generators
            .insert(generator.name().to_ascii_lowercase(), generator);
    }

    /// Registered target names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.generators.keys().map(String::as_str).collect()
    }

    /// The generator for `target`, if any.
    pub fn get(&self, target: &str) -> Option<&dyn CodeGenerator> {
        self.generators
            .get(&target.to_ascii_lowercase())
            .map(|g| g.as_ref())
    }

    /// Like [`get`](Self::get), reporting `E002` when nothing matches.
    pub fn resolve(&self, target: &str, sink: &DiagnosticSink) -> Option<&dyn CodeGenerator> {
        let found = self.get(target);
        if found.is_none() {
            sink.emit(
                Diagnostic::error(
                    E002,
                    format!("no code generator registered for target `{target}`"),
                    Span::DUMMY,
                )
                .with_help(format!("available targets: {}", self.names().join(", "))),
            );
        }
        found
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = GeneratorRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["go", "rust"]);
        assert_eq!(registry.get("Rust").map(|g| g.file_extension()), Some("rs"));
        assert_eq!(registry.get("go").map(|g| g.file_extension()), Some("go"));
    }

    #[test]
    fn unknown_target_reports_e002() {
        let registry = GeneratorRegistry::with_builtins();
        let sink = DiagnosticSink::new();
        assert!(registry.resolve("python", &sink).is_none());
        assert!(sink.has_code(E002));
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn known_target_reports_nothing() {
        let registry = GeneratorRegistry::with_builtins();
        let sink = DiagnosticSink::new();
        assert!(registry.resolve("go", &sink).is_some());
        assert!(sink.diagnostics().is_empty());
    }
}
