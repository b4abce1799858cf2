//! Malformed and unsupported input: the pipeline reports what it skipped and
//! still produces output for everything it recovered.

use hybrid_analyze::errors::{W201, W202};
use hybrid_codegen::errors::{W301, W302, W303};
use hybrid_config::Target;
use hybrid_conformance::transpile;
use hybrid_cpp_parser::errors::{W101, W102, W103};

#[test]
fn unbalanced_braces_still_generate() {
    let src = "class Open { public: void f() { if (x) { }\n";
    for target in [Target::Rust, Target::Go] {
        let result = transpile(src, target);
        assert!(result.has_code(W102));
        assert!(!result.has_errors);
        assert!(result.source().contains("Open"), "{}", result.source());
    }
}

#[test]
fn skipped_declaration_then_good_function() {
    let src = "struct { int x; } anon;\nint answer() { return 42; }\n";
    let result = transpile(src, Target::Rust);
    assert!(result.has_code(W101));
    assert!(result.source().contains("pub fn answer() -> i32 {"), "{}", result.source());
}

#[test]
fn unmatched_out_of_line_definition_is_kept() {
    let src = "class Foo { public: void a(); };\nvoid Foo::b() {}\n";
    let result = transpile(src, Target::Go);
    assert!(result.has_code(W103));
    assert!(result.source().contains("B()"), "{}", result.source());
}

#[test]
fn throw_in_noexcept_warns() {
    let result = transpile("void stop() noexcept { throw 42; }", Target::Rust);
    assert!(result.has_code(W201));
}

#[test]
fn malformed_template_header_is_reported() {
    let result = transpile("template<typename T\nT id(T v) { return v; }\n", Target::Rust);
    assert!(result.has_code(W202) || result.has_code(W101), "{:?}", result.diagnostics);
}

#[test]
fn generators_never_fail() {
    let src = r#"
struct Empty {};
class Weird {
public:
    void odd() { goto done; done: return; }
};
Generator<int> counter() { co_yield 1; }
template<template<typename> class C>
class Holder {
public:
    int size() const { return 0; }
};
int answer() { return 42; }
"#;
    for target in [Target::Rust, Target::Go] {
        let result = transpile(src, target);
        assert_eq!(result.error_count, 0);
        assert!(result.has_code(W301));
        assert!(!result.source().is_empty());
    }
}

#[test]
fn colliding_interface_methods_warn() {
    let src = r#"
class Flyer { public: virtual void move() = 0; };
class Swimmer { public: virtual void move() = 0; };
class Duck : public Flyer, public Swimmer {
public:
    void move() override {}
};
"#;
    let result = transpile(src, Target::Rust);
    assert!(result.has_code(W302), "{:?}", result.diagnostics);
}

#[test]
fn inheritance_cycles_are_cut() {
    let src = "class A : public B {};\nclass B : public A {};\n";
    for target in [Target::Rust, Target::Go] {
        let result = transpile(src, target);
        assert!(result.has_code(W303), "{:?}", result.diagnostics);
        assert_eq!(result.error_count, 0);
    }
}
