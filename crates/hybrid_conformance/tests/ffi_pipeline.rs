//! A small C++ library bound through every FFI target.

use hybrid_config::FfiTarget;
use hybrid_conformance::ffi;
use hybrid_ffi::errors::W401;

const CALC: &str = r#"
struct Point {
    float x;
    float y;
};
int32_t add(int32_t a, int32_t b) { return a + b; }
Point origin() { Point p; p.x = 0; p.y = 0; return p; }
std::string greet(const std::string& name) { return "hi " + name; }
template<typename T> T twice(T v) { return v * 2; }
class Calculator {
public:
    explicit Calculator(int32_t initial) : value_(initial) {}
    int32_t getValue() const { return value_; }
    void setValue(int32_t v) { value_ = v; }
private:
    int32_t value_;
};
"#;

#[test]
fn c_wrapper_declares_and_defines_every_entry_point() {
    let result = ffi(CALC, "calc", FfiTarget::CWrapper);
    let header = result.file("calc.h").unwrap();
    assert!(header.contains("#ifndef CALC_H"), "{header}");
    assert!(header.contains("int32_t calc_add(int32_t a, int32_t b);"), "{header}");
    assert!(header.contains("Point calc_origin(void);"), "{header}");
    assert!(header.contains("void* calc_calculator_new(int32_t initial);"), "{header}");
    assert!(header.contains("void calc_calculator_delete(void* handle);"), "{header}");

    let cpp = result.file("calc_wrapper.cpp").unwrap();
    assert!(cpp.contains("#include \"calc.hpp\""), "{cpp}");
    assert!(cpp.contains("return new Calculator(initial);"), "{cpp}");
    assert!(cpp.contains("static_cast<Calculator*>(handle)->setValue(v);"), "{cpp}");
}

#[test]
fn rust_bindings_wrap_handles_with_drop() {
    let result = ffi(CALC, "calc", FfiTarget::Rust);
    let rs = result.file("calc_ffi.rs").unwrap();
    assert!(rs.contains("#[repr(C)]"), "{rs}");
    assert!(rs.contains("pub struct Point {"), "{rs}");
    assert!(rs.contains("#[link(name = \"calc\")]"), "{rs}");
    assert!(rs.contains("fn calc_add(a: i32, b: i32) -> i32;"), "{rs}");
    assert!(rs.contains("impl Drop for Calculator {"), "{rs}");
}

#[test]
fn go_bindings_link_through_cgo() {
    let result = ffi(CALC, "calc", FfiTarget::Go);
    let go = result.file("calc_ffi.go").unwrap();
    assert!(go.contains("package calc"), "{go}");
    assert!(go.contains("import \"C\""), "{go}");
    assert!(go.contains("func Add(a int32, b int32) int32 {"), "{go}");
    assert!(go.contains("func NewCalculator(initial int32) *Calculator {"), "{go}");
    assert!(go.contains("func (c *Calculator) Delete() {"), "{go}");
}

#[test]
fn incompatible_declarations_are_skipped_with_w401() {
    for target in [FfiTarget::CWrapper, FfiTarget::Rust, FfiTarget::Go] {
        let result = ffi(CALC, "calc", target);
        assert_eq!(result.count_code(W401), 2, "{:?}", result.diagnostics);
        assert!(result.files.iter().all(|f| !f.contents.contains("greet")));
        assert!(result.files.iter().all(|f| !f.contents.contains("twice")));
    }
}
