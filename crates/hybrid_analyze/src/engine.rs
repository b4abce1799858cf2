//! Analyzer registration and execution.

use hybrid_diagnostics::DiagnosticSink;
use hybrid_ir::Ir;
use tracing::debug;

use crate::{AsyncAnalyzer, ExceptionAnalyzer, FeatureAnalyzer, TemplateAnalyzer, ThreadingAnalyzer};

/// Runs a set of [`FeatureAnalyzer`]s over an [`Ir`].
pub struct AnalysisEngine {
    analyzers: Vec<Box<dyn FeatureAnalyzer>>,
}

impl AnalysisEngine {
    /// Creates an engine with no analyzers.
    pub fn new() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    /// Creates an engine with the template, exception, threading and async
    /// analyzers registered.
    pub fn with_builtins() -> Self {
        let mut engine = Self::new();
        engine.register(Box::new(TemplateAnalyzer));
        engine.register(Box::new(ExceptionAnalyzer));
        engine.register(Box::new(ThreadingAnalyzer));
        engine.register(Box::new(AsyncAnalyzer));
        engine
    }

    /// Registers an analyzer.
    pub fn register(&mut self, analyzer: Box<dyn FeatureAnalyzer>) {
        self.analyzers.push(analyzer);
    }

    /// Names of the registered analyzers in run order.
    pub fn analyzer_names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Runs every analyzer over every free function and class.
    pub fn run(&self, ir: &mut Ir, sink: &DiagnosticSink) {
        for analyzer in &self.analyzers {
            debug!(analyzer = analyzer.name(), "running analyzer");
            for function in &mut ir.functions {
                analyzer.analyze_function(function, sink);
            }
            for class in &mut ir.classes {
                analyzer.analyze_class(class, sink);
            }
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::{ClassDecl, Function, Type};
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingAnalyzer(Rc<Cell<usize>>);

    impl FeatureAnalyzer for CountingAnalyzer {
        fn name(&self) -> &str {
            "counting"
        }
        fn analyze_function(&self, _function: &mut Function, _sink: &DiagnosticSink) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn builtins_registered_in_order() {
        let engine = AnalysisEngine::with_builtins();
        assert_eq!(
            engine.analyzer_names(),
            vec!["templates", "exceptions", "threading", "async"]
        );
        assert!(AnalysisEngine::new().analyzer_names().is_empty());
    }

    #[test]
    fn visits_free_functions_and_methods() {
        let count = Rc::new(Cell::new(0));
        let mut engine = AnalysisEngine::new();
        engine.register(Box::new(CountingAnalyzer(count.clone())));

        let mut ir = Ir::new();
        ir.add_function(Function::new("main", Type::integer("int")));
        let mut class = ClassDecl::new("Point", false);
        class.methods.push(Function::constructor("Point"));
        class.methods.push(Function::new("norm", Type::float("double")));
        ir.add_class(class);

        engine.run(&mut ir, &DiagnosticSink::new());
        assert_eq!(count.get(), 3);
    }
}
