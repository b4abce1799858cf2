//! Exceptions, templates, threading, async and inheritance translated end to
//! end for both targets.

use hybrid_analyze::parse_template_header;
use hybrid_codegen::errors::W301;
use hybrid_config::Target;
use hybrid_conformance::{analyze, transpile};
use hybrid_ir::{AsyncOpKind, TemplateParamKind};

const DIVIDE: &str = r#"
int divide(int a, int b) {
    if (b == 0) {
        throw std::runtime_error("division by zero");
    }
    return a / b;
}
"#;

const SHAPES: &str = r#"
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
"#;

#[test]
fn coroutine_operations_are_recorded_in_order() {
    let (ir, _) = analyze("Task<int> compute() { int result = 2; co_await foo(); co_return result; }");
    let compute = ir.find_function("compute").unwrap();
    assert!(compute.is_async());
    let ops = &compute.async_info.coroutine.operations;
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].kind, AsyncOpKind::Await);
    assert_eq!(ops[1].kind, AsyncOpKind::Return);
}

#[test]
fn discarded_std_async_is_detached() {
    let (ir, _) = analyze("void fire(int a) { std::async(std::launch::async, lambda, a); }");
    let fire = ir.find_function("fire").unwrap();
    assert_eq!(fire.async_info.tasks.len(), 1);
    assert!(fire.async_info.tasks[0].detached);
}

#[test]
fn nested_template_arguments_split_at_depth_zero() {
    let (params, _) =
        parse_template_header("template<typename K, typename V = std::map<int, std::vector<K>>>")
            .unwrap();
    assert_eq!(params.len(), 2);
    assert_eq!(params[1].default.as_deref(), Some("std::map<int, std::vector<K>>"));
    assert!(params.iter().all(|p| p.kind == TemplateParamKind::Type));
}

#[test]
fn exceptions_become_result_and_error_returns() {
    let (ir, _) = analyze(DIVIDE);
    assert!(ir.find_function("divide").unwrap().exceptions.can_throw);

    let rust = transpile(DIVIDE, Target::Rust);
    assert!(
        rust.source()
            .contains("pub fn divide(a: i32, b: i32) -> Result<i32, Box<dyn std::error::Error>> {"),
        "{}",
        rust.source()
    );
    let go = transpile(DIVIDE, Target::Go);
    assert!(
        go.source().contains("func Divide(a int32, b int32) (int32, error) {"),
        "{}",
        go.source()
    );
}

#[test]
fn templates_become_generics() {
    let source = "template<typename T>\nT maxOf(T a, T b) { return a > b ? a : b; }\n";
    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("pub fn max_of<T: Copy + PartialOrd>(a: T, b: T) -> T {"));
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("func MaxOf[T cmp.Ordered](a T, b T) T {"));
}

#[test]
fn non_type_parameters_are_lowered_or_marked() {
    let source = "template<typename T, int N>\nclass Buffer {\npublic:\n    int capacity() const { return N; }\n};\n";
    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("const N: i32"), "{}", rust.source());
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("// UNTRANSLATABLE: non-type template parameter `int N`"));
    assert!(go.has_code(W301));
}

#[test]
fn threads_spawn_or_start_goroutines() {
    let source = "void work(int n) {}\nvoid run() {\n    std::thread t(work, 5);\n    t.join();\n}\n";
    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("std::thread::spawn(move || work(5))"));
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("go func() {"));
    assert!(go.source().contains("t.Wait()"));
}

#[test]
fn coroutines_become_async_functions() {
    let source = "Task<int> compute() {\n    int result = 1;\n    co_await foo();\n    co_return result;\n}\n";
    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("pub async fn compute() -> i32 {"), "{}", rust.source());
}

#[test]
fn futures_become_receive_channels_in_go() {
    let source = "int compute() { return 42; }\nint run() {\n    auto f = std::async(std::launch::async, compute);\n    return f.get();\n}\n";
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("func Run() <-chan int32 {"), "{}", go.source());
    assert!(go.source().contains("func Compute() int32 {"), "{}", go.source());
}

#[test]
fn both_targets_agree_on_which_functions_are_async() {
    let source = "int compute(int a) { return a; }\nint run(int a) {\n    std::future<int> fut = std::async(std::launch::async, compute, a);\n    return fut.get();\n}\n";
    let (ir, _) = analyze(source);
    assert!(ir.find_function("run").unwrap().is_async());
    assert!(!ir.find_function("run").unwrap().async_info.coroutine.is_coroutine());

    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("pub async fn run(a: i32) -> i32 {"), "{}", rust.source());
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("func Run(a int32) <-chan int32 {"), "{}", go.source());
}

#[test]
fn abstract_bases_become_traits_and_interfaces() {
    let rust = transpile(SHAPES, Target::Rust);
    assert!(rust.source().contains("pub trait Shape {"));
    assert!(rust.source().contains("impl Shape for Circle {"));
    let go = transpile(SHAPES, Target::Go);
    assert!(go.source().contains("type Shape interface {"));
    assert!(go.source().contains("var _ Shape = (*Circle)(nil)"));
}

#[test]
fn every_concrete_class_gets_a_struct_and_constructor() {
    let source = "class Animal { public: virtual void speak() = 0; };\nclass Dog : public Animal { public: void speak() override {} };\n";
    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("pub struct Dog {}"), "{}", rust.source());
    assert!(rust.source().contains("impl Animal for Dog {"), "{}", rust.source());
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("type Dog struct{}"), "{}", go.source());
    assert!(go.source().contains("func NewDog() *Dog {"), "{}", go.source());
}

#[test]
fn each_catch_clause_handles_its_own_exception_kind() {
    let source = r#"
int parse(int v) {
    if (v < 0) { throw std::invalid_argument("negative"); }
    if (v == 0) { throw std::runtime_error("zero"); }
    return v;
}
int classify(int v) {
    try { return parse(v); }
    catch (const std::invalid_argument& e) { return 2; }
    catch (const std::runtime_error& e) { return 3; }
}
"#;
    let rust = transpile(source, Target::Rust);
    assert!(rust.source().contains("\"invalid_argument\" => {"), "{}", rust.source());
    assert!(rust.source().contains("\"runtime_error\" | \"range_error\""), "{}", rust.source());
    assert!(rust.source().contains("unreachable!(\"missing return\")"), "{}", rust.source());
    assert!(!rust.has_code(W301), "{}", rust.source());
    let go = transpile(source, Target::Go);
    assert!(go.source().contains("case \"invalid_argument\":"), "{}", go.source());
    assert!(go.source().contains("case \"runtime_error\", \"range_error\""), "{}", go.source());
}
