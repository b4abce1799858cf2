use hybrid_diagnostics::DiagnosticSink;

use super::RustGenerator;
use crate::errors::W301;
use crate::{CodeGenerator, GenOptions};

fn translate_with(source: &str, opts: &GenOptions) -> (String, DiagnosticSink) {
    let sink = DiagnosticSink::new();
    let mut ir = hybrid_cpp_parser::parse_str(source, &sink);
    hybrid_analyze::analyze(&mut ir, &sink);
    let code = RustGenerator.generate(&ir, opts, &sink);
    (code.source, sink)
}

fn translate(source: &str) -> String {
    translate_with(source, &GenOptions::default()).0
}

const POINT: &str = r#"
class Point {
public:
    Point(int x, int y) : x(x), y(y) {}
    double distance() const { return std::sqrt(x * x + y * y); }
private:
    int x;
    int y;
};
"#;

#[test]
fn point_struct_constructor_and_method() {
    let out = translate(POINT);
    assert!(out.contains("pub struct Point {"), "{out}");
    assert!(out.contains("x: i32,"), "{out}");
    assert!(out.contains("y: i32,"), "{out}");
    assert!(out.contains("pub fn new(x: i32, y: i32) -> Self {"), "{out}");
    assert!(out.contains("pub fn distance(&self) -> f64 {"), "{out}");
    assert!(out.contains(".sqrt()"), "{out}");
}

#[test]
fn output_is_deterministic() {
    let source = format!("{POINT}\nint twice(int v) {{ return v * 2; }}\n");
    assert_eq!(translate(&source), translate(&source));
}

#[test]
fn every_class_and_function_is_emitted() {
    let out = translate(
        r#"
struct Empty {};
class Weird {
public:
    void odd() { goto done; done: return; }
};
int answer() { return 42; }
void nothing() {}
"#,
    );
    assert!(out.contains("pub struct Empty {}"), "{out}");
    assert!(out.contains("pub struct Weird {}"), "{out}");
    assert!(out.contains("fn odd(&mut self)"), "{out}");
    assert!(out.contains("pub fn answer() -> i32 {"), "{out}");
    assert!(out.contains("pub fn nothing() {}"), "{out}");
}

#[test]
fn throwing_functions_return_result() {
    let out = translate(
        r#"
int divide(int a, int b) {
    if (b == 0) {
        throw std::runtime_error("division by zero");
    }
    return a / b;
}
"#,
    );
    assert!(
        out.contains("pub fn divide(a: i32, b: i32) -> Result<i32, Box<dyn std::error::Error>> {"),
        "{out}"
    );
    assert!(out.contains("return Err(\"division by zero\".into());"), "{out}");
    assert!(out.contains("Ok(a / b)"), "{out}");
}

#[test]
fn try_blocks_become_result_closures() {
    let out = translate(
        r#"
int divide(int a, int b) {
    if (b == 0) { throw std::runtime_error("division by zero"); }
    return a / b;
}
void report(int a, int b) {
    try {
        int q = divide(a, b);
        std::cout << q << std::endl;
    } catch (const std::exception& e) {
        std::cerr << e.what() << std::endl;
    }
}
"#,
    );
    assert!(
        out.contains("let result = (|| -> Result<(), Box<dyn std::error::Error>> {"),
        "{out}"
    );
    assert!(out.contains("divide(a, b)?"), "{out}");
    assert!(out.contains("if let Err(e) = result {"), "{out}");
}

#[test]
fn value_returning_try_ends_in_unreachable() {
    let out = translate(
        r#"
int d(int a, int b) {
    if (b == 0) { throw std::runtime_error("division by zero"); }
    return a / b;
}
int safe(int a) {
    try {
        return d(a, 0);
    } catch (const std::exception& e) {
        return -1;
    }
}
"#,
    );
    assert!(out.contains("Ok(None) => {}"), "{out}");
    assert!(out.contains("unreachable!(\"missing return\")"), "{out}");
    assert_eq!(out.matches("unreachable!").count(), 1, "{out}");
}

const CLASSIFY: &str = r#"
int parse(int v) {
    if (v < 0) { throw std::invalid_argument("negative"); }
    if (v == 0) { throw std::runtime_error("zero"); }
    return v;
}
int classify(int v) {
    try {
        return parse(v);
    } catch (const std::invalid_argument& e) {
        return 2;
    } catch (const std::runtime_error& e) {
        return 3;
    }
}
"#;

#[test]
fn handlers_are_chosen_by_exception_kind() {
    let out = translate(CLASSIFY);
    assert!(out.contains("pub struct Exception {"), "{out}");
    assert!(
        out.contains("return Err(Exception::new(\"invalid_argument\", \"negative\").into());"),
        "{out}"
    );
    assert!(out.contains("return Err(\"zero\".into());"), "{out}");
    assert!(
        out.contains("let kind = error.downcast_ref::<Exception>().map_or(\"runtime_error\", |e| e.kind);"),
        "{out}"
    );
    assert!(out.contains("\"invalid_argument\" => {"), "{out}");
    assert!(
        out.contains("\"runtime_error\" | \"range_error\" | \"overflow_error\" | \"underflow_error\" | \"system_error\" => {"),
        "{out}"
    );
    assert!(!out.contains("UNTRANSLATED"), "{out}");
}

#[test]
fn catch_all_handler_is_the_fallback_arm() {
    let out = translate(
        r#"
int parse(int v) {
    if (v < 0) { throw std::out_of_range("negative"); }
    return v;
}
int classify(int v) {
    try {
        return parse(v);
    } catch (const std::logic_error& e) {
        return 2;
    } catch (...) {
        return 9;
    }
}
"#,
    );
    assert!(out.contains("\"out_of_range\""), "{out}");
    assert!(out.contains("_ => {"), "{out}");
    assert!(!out.contains("_ => panic!"), "{out}");
    assert!(!out.contains("_ => return Err(error)"), "{out}");
}

#[test]
fn single_catch_all_handler_needs_no_exception_type() {
    let (out, sink) = translate_with(
        r#"
void run() {
    try {
        throw std::runtime_error("boom");
    } catch (const std::exception& e) {
        std::cerr << e.what() << std::endl;
    }
}
"#,
        &GenOptions::default(),
    );
    assert!(!out.contains("Exception"), "{out}");
    assert!(out.contains("if let Err(e) = result {"), "{out}");
    assert!(!sink.has_code(W301), "{out}");
}

#[test]
fn templates_become_generics() {
    let out = translate(
        r#"
template<typename T>
T maxOf(T a, T b) { return a > b ? a : b; }
"#,
    );
    assert!(
        out.contains("pub fn max_of<T: Copy + PartialOrd>(a: T, b: T) -> T {"),
        "{out}"
    );
}

#[test]
fn non_type_template_parameters_become_const_generics() {
    let out = translate(
        r#"
template<typename T, int N>
class Buffer {
public:
    int capacity() const { return N; }
};
"#,
    );
    assert!(out.contains("const N: i32"), "{out}");
    assert!(out.contains("pub struct Buffer<"), "{out}");
}

#[test]
fn guarded_fields_are_wrapped_in_their_mutex() {
    let out = translate(
        r#"
class Counter {
public:
    void increment() {
        std::lock_guard<std::mutex> lock(mtx);
        count++;
    }
private:
    std::mutex mtx;
    int count = 0;
};
"#,
    );
    assert!(out.contains("count: Mutex<i32>,"), "{out}");
    assert!(out.contains("use std::sync::Mutex;"), "{out}");
    assert!(out.contains(".lock().unwrap()"), "{out}");
}

#[test]
fn threads_spawn_and_join() {
    let out = translate(
        r#"
void work(int n) {}
void run() {
    std::thread t(work, 5);
    t.join();
}
"#,
    );
    assert!(out.contains("std::thread::spawn(move || work(5))"), "{out}");
    assert!(out.contains(".join().unwrap()"), "{out}");
}

#[test]
fn atomics_use_std_sync_atomic() {
    let out = translate(
        r#"
class Hits {
public:
    void record() { hits.fetch_add(1); }
private:
    std::atomic<int> hits{0};
};
"#,
    );
    assert!(out.contains("AtomicI32"), "{out}");
    assert!(out.contains("fetch_add(1, Ordering::SeqCst)"), "{out}");
}

#[test]
fn coroutines_become_async_functions() {
    let out = translate(
        r#"
Task<int> compute() {
    int result = 1;
    co_await foo();
    co_return result;
}
"#,
    );
    assert!(out.contains("pub async fn compute() -> i32 {"), "{out}");
    assert!(out.contains(".await"), "{out}");
}

#[test]
fn co_yield_is_marked_and_reported() {
    let (out, sink) = translate_with(
        r#"
Generator<int> counter() {
    co_yield 1;
}
"#,
        &GenOptions::default(),
    );
    assert!(out.contains("// UNTRANSLATED: co_yield"), "{out}");
    assert!(sink.has_code(W301));
}

#[test]
fn abstract_bases_become_traits() {
    let out = translate(
        r#"
class Shape {
public:
    virtual double area() const = 0;
    virtual ~Shape() {}
};
class Circle : public Shape {
public:
    Circle(double r) : r(r) {}
    double area() const override { return 3.14 * r * r; }
private:
    double r;
};
"#,
    );
    assert!(out.contains("pub trait Shape {"), "{out}");
    assert!(out.contains("fn area(&self) -> f64;"), "{out}");
    assert!(out.contains("impl Shape for Circle {"), "{out}");
    assert!(!out.contains("pub struct Shape"), "{out}");
}

#[test]
fn level_zero_writes_banner_and_origins() {
    let opts = GenOptions {
        opt_level: 0,
        ..GenOptions::default()
    };
    let (out, _) = translate_with(POINT, &opts);
    assert!(out.starts_with("// Generated by hybrid"), "{out}");
    assert!(out.contains("// origin: C++ class `Point`"), "{out}");
    assert!(out.contains("/// Translated from the C++ class `Point`."), "{out}");
}

#[test]
fn level_one_writes_doc_comments_only() {
    let out = translate(POINT);
    assert!(!out.contains("// Generated by hybrid"), "{out}");
    assert!(!out.contains("// origin:"), "{out}");
    assert!(out.contains("/// Translated from the C++ class `Point`."), "{out}");
}

#[test]
fn higher_levels_drop_commentary() {
    for level in [2, 3] {
        let opts = GenOptions {
            opt_level: level,
            ..GenOptions::default()
        };
        let (out, _) = translate_with(POINT, &opts);
        assert!(!out.contains("///"), "{out}");
        assert!(!out.contains("// origin"), "{out}");
    }
}

#[test]
fn level_three_inlines_one_statement_methods() {
    let opts = GenOptions {
        opt_level: 3,
        ..GenOptions::default()
    };
    let (out, _) = translate_with(POINT, &opts);
    assert!(out.contains("#[inline]\n    pub fn distance(&self) -> f64 {"), "{out}");
}

#[test]
fn test_scaffold_constructs_each_class() {
    let opts = GenOptions {
        generate_tests: true,
        ..GenOptions::default()
    };
    let (out, _) = translate_with(POINT, &opts);
    assert!(out.contains("#[cfg(test)]"), "{out}");
    assert!(out.contains("fn point_constructs() {"), "{out}");
    assert!(out.contains("let _value = Point::new(0, 0);"), "{out}");
}

#[test]
fn enums_keep_their_values() {
    let out = translate("enum class Color { Red = 1, Green = 2 };");
    assert!(out.contains("#[repr(i32)]"), "{out}");
    assert!(out.contains("pub enum Color {"), "{out}");
    assert!(out.contains("Red = 1,"), "{out}");
}

const DOG: &str = r#"
class Animal {
public:
    virtual void speak() = 0;
    virtual int legs() const = 0;
};
class Dog : public Animal {
public:
    void speak() override {}
    int legs() const override { return 4; }
};
"#;

#[test]
fn fieldless_concrete_subclass_keeps_struct_and_impl() {
    let out = translate(DOG);
    assert!(out.contains("pub trait Animal {"), "{out}");
    assert!(!out.contains("pub trait Dog"), "{out}");
    assert!(out.contains("pub struct Dog {}"), "{out}");
    assert!(out.contains("pub fn new() -> Self {"), "{out}");
    assert!(out.contains("impl Animal for Dog {"), "{out}");
    assert!(out.contains("fn legs(&self) -> i32 {"), "{out}");
}

#[test]
fn colliding_base_methods_delegate_to_the_first_base() {
    let out = translate(
        r#"
class Flyer { public: virtual void advance() = 0; };
class Swimmer { public: virtual void advance() = 0; };
class Duck : public Flyer, public Swimmer {
public:
    void advance() override {}
};
"#,
    );
    assert!(out.contains("pub struct Duck {}"), "{out}");
    assert!(out.contains("impl Flyer for Duck {"), "{out}");
    assert!(out.contains("impl Swimmer for Duck {"), "{out}");
    assert!(out.contains("<Self as Flyer>::advance(self)"), "{out}");
}

#[test]
fn repeated_nested_class_names_emit_one_struct() {
    let (out, sink) = translate_with(
        r#"
class A {
    struct Inner { int v; };
    Inner first;
};
class B {
    struct Inner { double w; };
    Inner second;
};
"#,
        &GenOptions::default(),
    );
    assert_eq!(out.matches("pub struct Inner {").count(), 1, "{out}");
    assert!(out.contains("pub struct A {"), "{out}");
    assert!(out.contains("pub struct B {"), "{out}");
    assert!(sink.has_code(W301));
}

#[test]
fn empty_braces_build_the_return_type() {
    let out = translate(
        r#"
class Marker {
public:
    int id;
};
class Factory {
public:
    Marker make() { return {}; }
    int zero() { return {}; }
};
"#,
    );
    assert!(out.contains("Marker::new()"), "{out}");
    assert!(!out.contains("vec![]"), "{out}");
}

#[test]
fn threads_capturing_this_are_marked() {
    let (out, sink) = translate_with(
        r#"
class Counter {
public:
    void inc() { n++; }
    void run() {
        std::thread t([this] { inc(); });
        t.join();
    }
private:
    int n;
};
"#,
        &GenOptions::default(),
    );
    assert!(out.contains("unimplemented!(\"thread capturing `this`\")"), "{out}");
    assert!(!out.contains("(*self)"), "{out}");
    assert!(!out.contains("SAFETY"), "{out}");
    assert!(sink.has_code(W301));
}
