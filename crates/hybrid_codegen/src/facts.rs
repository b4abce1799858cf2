//! Whole-unit facts consulted while lowering bodies.
//!
//! A call site needs to know things about its callee that no single
//! function carries: whether the callee can fail (so the caller propagates
//! with `?` or an error check), which overload an arity selects, and what a
//! free function returns. These are computed once per generation.

use std::collections::{BTreeMap, BTreeSet};

use hybrid_cpp_parser::lexer::lex;
use hybrid_cpp_parser::resolve_type;
use hybrid_cpp_parser::CppToken;
use hybrid_ir::{ClassDecl, Function, Ir, Type};
use hybrid_source::FileId;
use tracing::debug;

/// Owner key for free functions.
const FREE: &str = "";

pub(crate) struct UnitFacts<'ir> {
    pub ir: &'ir Ir,
    fallible: BTreeSet<(String, String)>,
    arities: BTreeMap<(String, String), Vec<usize>>,
}

impl<'ir> UnitFacts<'ir> {
    pub fn new(ir: &'ir Ir) -> Self {
        let mut arities: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
        for f in &ir.functions {
            arities
                .entry((FREE.to_string(), f.name.clone()))
                .or_default()
                .push(f.params.len());
        }
        for class in &ir.classes {
            for m in class.methods.iter().filter(|m| !m.is_constructor) {
                arities
                    .entry((class.name.clone(), m.name.clone()))
                    .or_default()
                    .push(m.params.len());
            }
        }
        let fallible = fallible_functions(ir);
        debug!(fallible = fallible.len(), "unit facts");
        Self {
            ir,
            fallible,
            arities,
        }
    }

    pub fn class(&self, name: &str) -> Option<&'ir ClassDecl> {
        let name = name.rsplit("::").next().unwrap_or(name);
        let name = name.split('<').next().unwrap_or(name);
        self.ir.find_class(name)
    }

    /// True if `function` (owned by `owner`, if a method) reports failure
    /// to its caller.
    pub fn is_fallible(&self, owner: Option<&str>, function: &Function) -> bool {
        self.fallible
            .contains(&(owner.unwrap_or(FREE).to_string(), function.name.clone()))
    }

    /// True if `owner::name` may fail.
    pub fn method_is_fallible(&self, owner: &str, name: &str) -> bool {
        self.fallible.contains(&(owner.to_string(), name.to_string()))
    }

    /// The overload ordinal a call with `arity` arguments selects: the first
    /// overload accepting that many arguments, else the first.
    pub fn select_overload(&self, owner: Option<&str>, name: &str, arity: usize) -> usize {
        let key = (owner.unwrap_or(FREE).to_string(), name.to_string());
        self.arities
            .get(&key)
            .and_then(|list| list.iter().position(|&a| a == arity))
            .map_or(1, |i| i + 1)
    }

    /// Return type of the first free function named `name`.
    pub fn free_return_type(&self, name: &str) -> Option<&'ir Type> {
        self.ir
            .find_function(name)
            .and_then(|f| f.return_type.as_ref())
    }

    /// Return type of `class::method`.
    pub fn method_return_type(&self, class: &str, method: &str) -> Option<&'ir Type> {
        self.class(class)
            .and_then(|c| c.method(method))
            .and_then(|m| m.return_type.as_ref())
    }
}

/// 1-based position of the overload at `index` among the same-named
/// functions in `functions`.
pub(crate) fn overload_ordinal(functions: &[Function], index: usize) -> usize {
    let name = &functions[index].name;
    functions[..index]
        .iter()
        .filter(|f| &f.name == name && !f.is_constructor)
        .count()
        + 1
}

/// Functions that can fail: a `throw` outside any `try`, or a call outside
/// any `try` to a function that can fail, iterated to a fixed point.
/// Functions declared non-throwing never fail; a throw there terminates.
fn fallible_functions(ir: &Ir) -> BTreeSet<(String, String)> {
    struct Entry {
        key: (String, String),
        callable_name: String,
        calls: Vec<String>,
        throws: bool,
        nothrow: bool,
    }
    let entry = |owner: &str, f: &Function| Entry {
        key: (owner.to_string(), f.name.clone()),
        callable_name: f.name.clone(),
        calls: unguarded_calls(f.body.as_deref().unwrap_or("")),
        throws: f.exceptions.throw_sites.iter().any(|t| !t.inside_try),
        nothrow: f.exceptions.spec.is_nothrow() || f.is_destructor,
    };
    let mut entries: Vec<Entry> = ir.functions.iter().map(|f| entry(FREE, f)).collect();
    for class in &ir.classes {
        entries.extend(class.methods.iter().map(|m| entry(&class.name, m)));
    }

    let mut fallible = BTreeSet::new();
    let mut names = BTreeSet::new();
    loop {
        let mut changed = false;
        for e in &entries {
            if e.nothrow || fallible.contains(&e.key) {
                continue;
            }
            if e.throws || e.calls.iter().any(|c| names.contains(c)) {
                fallible.insert(e.key.clone());
                names.insert(e.callable_name.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    fallible
}

/// Names called outside every `try` block of `body`.
fn unguarded_calls(body: &str) -> Vec<String> {
    let tokens = lex(body, FileId::DUMMY);
    let text = |i: usize| {
        let span = tokens[i].span;
        &body[span.start as usize..span.end as usize]
    };
    let mut guarded_until = 0usize;
    let mut calls = Vec::new();
    for i in 0..tokens.len() {
        if i < guarded_until {
            continue;
        }
        match tokens[i].kind {
            CppToken::Try if tokens.get(i + 1).map(|t| t.kind) == Some(CppToken::LeftBrace) => {
                let mut depth = 0usize;
                for (j, t) in tokens.iter().enumerate().skip(i + 1) {
                    match t.kind {
                        CppToken::LeftBrace => depth += 1,
                        CppToken::RightBrace => {
                            depth -= 1;
                            if depth == 0 {
                                guarded_until = j + 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            CppToken::Identifier
                if tokens.get(i + 1).map(|t| t.kind) == Some(CppToken::LeftParen) =>
            {
                calls.push(text(i).to_string());
            }
            _ => {}
        }
    }
    calls
}

/// The value a function hands back: `void` is none, and a coroutine's
/// task type is unwrapped to its result.
pub(crate) fn effective_return(f: &Function) -> Option<Type> {
    let ret = f.return_type.as_ref()?;
    if ret.is_void() {
        return None;
    }
    if f.async_info.coroutine.is_coroutine() && ret.is_user_defined() {
        let inner = ret
            .name
            .find('<')
            .and_then(|open| ret.name.rfind('>').map(|close| &ret.name[open + 1..close]))?;
        let inner = resolve_type(inner);
        return (!inner.is_void()).then_some(inner);
    }
    Some(ret.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_ir::{ExceptionSpec, ThrowSite};

    fn function(name: &str, body: &str, throws: bool) -> Function {
        let mut f = Function::new(name, Type::integer("int"));
        f.body = Some(body.to_string());
        if throws {
            f.exceptions.throw_sites.push(ThrowSite {
                expression: None,
                exception_type: None,
                inside_try: false,
            });
            f.exceptions.may_throw = true;
        }
        f
    }

    #[test]
    fn failure_propagates_through_calls() {
        let mut ir = Ir::new();
        ir.add_function(function("parse", "throw 1;", true));
        ir.add_function(function("load", "return parse(s) + 1;", false));
        ir.add_function(function("safe", "try { return load(); } catch (...) { return 0; }", false));
        ir.add_function(function("pure", "return 2;", false));
        let facts = UnitFacts::new(&ir);
        let f = |name: &str| ir.find_function(name).unwrap();
        assert!(facts.is_fallible(None, f("parse")));
        assert!(facts.is_fallible(None, f("load")));
        assert!(!facts.is_fallible(None, f("safe")));
        assert!(!facts.is_fallible(None, f("pure")));
    }

    #[test]
    fn nothrow_functions_never_fail() {
        let mut ir = Ir::new();
        let mut f = function("fatal", "throw 1;", true);
        f.exceptions.spec = ExceptionSpec::Noexcept;
        ir.add_function(f);
        let facts = UnitFacts::new(&ir);
        assert!(!facts.is_fallible(None, &ir.functions[0]));
    }

    #[test]
    fn overloads_by_arity() {
        let mut ir = Ir::new();
        let mut one = function("area", "return 1;", false);
        one.params.push(hybrid_ir::Parameter::new("r", Type::integer("int")));
        let mut two = function("area", "return 2;", false);
        two.params.push(hybrid_ir::Parameter::new("w", Type::integer("int")));
        two.params.push(hybrid_ir::Parameter::new("h", Type::integer("int")));
        ir.add_function(one);
        ir.add_function(two);
        let facts = UnitFacts::new(&ir);
        assert_eq!(overload_ordinal(&ir.functions, 0), 1);
        assert_eq!(overload_ordinal(&ir.functions, 1), 2);
        assert_eq!(facts.select_overload(None, "area", 2), 2);
        assert_eq!(facts.select_overload(None, "area", 5), 1);
    }
}
