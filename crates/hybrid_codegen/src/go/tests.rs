use hybrid_diagnostics::DiagnosticSink;

use super::GoGenerator;
use crate::errors::W301;
use crate::{CodeGenerator, GenOptions, GeneratedCode};

fn generate_with(source: &str, opts: &GenOptions) -> (GeneratedCode, DiagnosticSink) {
    let sink = DiagnosticSink::new();
    let mut ir = hybrid_cpp_parser::parse_str(source, &sink);
    hybrid_analyze::analyze(&mut ir, &sink);
    let code = GoGenerator.generate(&ir, opts, &sink);
    (code, sink)
}

fn translate_with(source: &str, opts: &GenOptions) -> (String, DiagnosticSink) {
    let (code, sink) = generate_with(source, opts);
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
    assert!(out.starts_with("package main"), "{out}");
    assert!(out.contains("type Point struct {"), "{out}");
    assert!(out.contains("func NewPoint(x int32, y int32) *Point {"), "{out}");
    assert!(out.contains("func (p *Point) Distance() float64 {"), "{out}");
    assert!(out.contains("math.Sqrt"), "{out}");
    assert!(out.contains("\"math\""), "{out}");
}

#[test]
fn output_is_deterministic() {
    let source = format!("{POINT}\nint twice(int v) {{ return v * 2; }}\n");
    assert_eq!(translate(&source), translate(&source));
}

#[test]
fn throwing_functions_return_an_error() {
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
    assert!(out.contains("func Divide(a int32, b int32) (int32, error) {"), "{out}");
    assert!(out.contains("errors.New(\"division by zero\")"), "{out}");
    assert!(out.contains("\"errors\""), "{out}");
}

#[test]
fn try_blocks_recover() {
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
    assert!(out.contains("func Report(a int32, b int32) {"), "{out}");
    assert!(out.contains("recover()"), "{out}");
    assert!(out.contains("Divide(a, b)"), "{out}");
}

#[test]
fn handlers_are_chosen_by_exception_kind() {
    let out = translate(
        r#"
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
"#,
    );
    assert!(out.contains("type Exception struct {"), "{out}");
    assert!(
        out.contains("&Exception{Kind: \"invalid_argument\", Message: \"negative\"}"),
        "{out}"
    );
    assert!(out.contains("errors.New(\"zero\")"), "{out}");
    assert!(out.contains("if errors.As(err, &exception) {"), "{out}");
    assert!(out.contains("switch kind {"), "{out}");
    assert!(out.contains("case \"invalid_argument\":"), "{out}");
    assert!(
        out.contains("case \"runtime_error\", \"range_error\", \"overflow_error\", \"underflow_error\", \"system_error\":"),
        "{out}"
    );
    assert!(out.contains("\tdefault:\n"), "{out}");
}

#[test]
fn catch_all_after_specific_handler_is_the_default_case() {
    let out = translate(
        r#"
void run(int v) {
    try {
        if (v < 0) { throw std::out_of_range("negative"); }
    } catch (const std::out_of_range& e) {
        std::cerr << e.what() << std::endl;
    } catch (...) {
        std::cerr << "other" << std::endl;
    }
}
"#,
    );
    assert!(out.contains("case \"out_of_range\":"), "{out}");
    assert!(out.contains("e := err"), "{out}");
    assert!(out.contains("e.Error()"), "{out}");
    assert_eq!(out.matches("default:").count(), 1, "{out}");
}

#[test]
fn templates_become_type_parameters() {
    let out = translate(
        r#"
template<typename T>
T maxOf(T a, T b) { return a > b ? a : b; }
"#,
    );
    assert!(out.contains("func MaxOf[T cmp.Ordered](a T, b T) T {"), "{out}");
    assert!(out.contains("\"cmp\""), "{out}");
}

#[test]
fn non_type_template_parameters_are_marked() {
    let (out, sink) = translate_with(
        r#"
template<typename T, int N>
class Buffer {
public:
    int capacity() const { return 0; }
};
"#,
        &GenOptions::default(),
    );
    assert!(
        out.contains("// UNTRANSLATABLE: non-type template parameter `int N`"),
        "{out}"
    );
    assert!(sink.has_code(W301));
}

#[test]
fn lock_guards_lock_and_defer_unlock() {
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
    assert!(out.contains("sync.Mutex"), "{out}");
    assert!(out.contains(".mtx.Lock()"), "{out}");
    assert!(out.contains("defer c.mtx.Unlock()"), "{out}");
}

#[test]
fn threads_become_goroutines_in_a_wait_group() {
    let out = translate(
        r#"
void work(int n) {}
void run() {
    std::thread t(work, 5);
    t.join();
}
"#,
    );
    assert!(out.contains("var t sync.WaitGroup"), "{out}");
    assert!(out.contains("t.Add(1)"), "{out}");
    assert!(out.contains("go func() {"), "{out}");
    assert!(out.contains("defer t.Done()"), "{out}");
    assert!(out.contains("Work(5)"), "{out}");
    assert!(out.contains("t.Wait()"), "{out}");
}

#[test]
fn atomics_use_sync_atomic() {
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
    assert!(out.contains("atomic.Int32"), "{out}");
    assert!(out.contains("\"sync/atomic\""), "{out}");
    assert!(out.contains(".hits.Add(1)"), "{out}");
    assert!(!out.contains("(h.hits.Add(1) - 1)"), "{out}");
}

#[test]
fn futures_become_receive_channels() {
    let out = translate(
        r#"
int compute() { return 42; }
int run() {
    auto f = std::async(std::launch::async, compute);
    return f.get();
}
"#,
    );
    assert!(out.contains("func Run() <-chan int32 {"), "{out}");
    assert!(out.contains("<-f"), "{out}");
}

#[test]
fn values_are_received_from_async_callees() {
    let out = translate(
        r#"
int compute() { return 42; }
int run() {
    auto f = std::async(std::launch::async, compute);
    return f.get();
}
int total() {
    int v = run();
    return v + 1;
}
"#,
    );
    assert!(out.contains("func Total() int32 {"), "{out}");
    assert!(out.contains("<-Run()"), "{out}");
}

#[test]
fn multi_statement_lambdas_indent_their_body() {
    let out = translate(
        r#"
int apply(int a) {
    auto twice = [](int v) -> int {
        int w = v * 2;
        return w;
    };
    return twice(a);
}
"#,
    );
    assert!(out.contains("func(v int32) int32 {\n"), "{out}");
    assert!(out.contains("\treturn w\n"), "{out}");
}

#[test]
fn abstract_bases_become_interfaces() {
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
    assert!(out.contains("type Shape interface {"), "{out}");
    assert!(out.contains("Area() float64"), "{out}");
    assert!(out.contains("var _ Shape = (*Circle)(nil)"), "{out}");
    assert!(out.contains("func (c *Circle) Area() float64 {"), "{out}");
    assert!(!out.contains("type Shape struct"), "{out}");
}

#[test]
fn level_zero_writes_banner_and_origins() {
    let opts = GenOptions {
        opt_level: 0,
        ..GenOptions::default()
    };
    let (out, _) = translate_with(POINT, &opts);
    assert!(
        out.starts_with("// Code generated by hybrid from C++ source. DO NOT EDIT."),
        "{out}"
    );
    assert!(out.contains("// origin: C++ class `Point`"), "{out}");
    assert!(out.contains("// Point is translated from the C++ class `Point`."), "{out}");
}

#[test]
fn higher_levels_drop_commentary() {
    for level in [2, 3] {
        let opts = GenOptions {
            opt_level: level,
            ..GenOptions::default()
        };
        let (out, _) = translate_with(POINT, &opts);
        assert!(!out.contains("is translated from"), "{out}");
        assert!(!out.contains("// origin"), "{out}");
    }
}

#[test]
fn test_file_constructs_each_class() {
    let opts = GenOptions {
        generate_tests: true,
        ..GenOptions::default()
    };
    let (code, _) = generate_with(POINT, &opts);
    let tests = code.test_source.unwrap_or_default();
    assert!(tests.starts_with("package main"), "{tests}");
    assert!(tests.contains("\"testing\""), "{tests}");
    assert!(tests.contains("func TestNewPoint(t *testing.T) {"), "{tests}");
    assert!(tests.contains("if NewPoint(0, 0) == nil {"), "{tests}");
    assert!(!code.source.contains("testing"), "{}", code.source);
}

#[test]
fn no_test_file_unless_requested() {
    let (code, _) = generate_with(POINT, &GenOptions::default());
    assert!(code.test_source.is_none());
}

#[test]
fn enums_become_typed_constants() {
    let out = translate("enum class Color { Red = 1, Green = 2 };");
    assert!(out.contains("type Color int32"), "{out}");
    assert!(out.contains("const ("), "{out}");
    assert!(out.contains("ColorRed"), "{out}");
    assert!(out.contains("Color = 1"), "{out}");
}

#[test]
fn main_becomes_func_main() {
    let out = translate(
        r#"
int main() {
    std::cout << "hi" << std::endl;
    return 0;
}
"#,
    );
    assert!(out.contains("func main() {"), "{out}");
    assert!(out.contains("fmt."), "{out}");
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
fn fieldless_concrete_subclass_keeps_struct_and_assertion() {
    let out = translate(DOG);
    assert!(out.contains("type Animal interface {"), "{out}");
    assert!(!out.contains("type Dog interface"), "{out}");
    assert!(out.contains("type Dog struct{}"), "{out}");
    assert!(out.contains("var _ Animal = (*Dog)(nil)"), "{out}");
    assert!(out.contains("func NewDog() *Dog {"), "{out}");
    assert!(out.contains("func (d *Dog) Legs() int32 {"), "{out}");
}
