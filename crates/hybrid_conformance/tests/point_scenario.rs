//! The `Point` class through the whole pipeline: IR shape, Rust output and
//! Go output.

use hybrid_config::Target;
use hybrid_conformance::{analyze, transpile};
use hybrid_ir::TypeKind;

const POINT: &str = "class Point { private: int x; int y; public: Point(int x,int y):x(x),y(y){} int distance() const { return x*x+y*y; } };";

#[test]
fn ir_has_one_class_two_fields_two_methods() {
    let (ir, diagnostics) = analyze(POINT);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(ir.classes.len(), 1);
    let point = &ir.classes[0];
    assert_eq!(point.name, "Point");

    let fields: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, ["x", "y"]);
    assert!(point.fields.iter().all(|f| f.ty.kind == TypeKind::Integer));

    assert_eq!(point.methods.len(), 2);
    assert!(point.methods[0].is_constructor);
    assert_eq!(point.methods[0].initializers.len(), 2);
    let distance = point.method("distance").unwrap();
    assert!(distance.is_const);
}

#[test]
fn rust_output_has_struct_and_impl() {
    let result = transpile(POINT, Target::Rust);
    assert!(!result.has_errors);
    let out = result.source();
    assert!(out.contains("pub struct Point {"), "{out}");
    assert!(out.contains("x: i32,"), "{out}");
    assert!(out.contains("y: i32,"), "{out}");
    assert!(out.contains("impl Point {"), "{out}");
    assert!(out.contains("pub fn new(x: i32, y: i32) -> Self {"), "{out}");
    assert!(out.contains("pub fn distance(&self) -> i32 {"), "{out}");
}

#[test]
fn go_output_has_struct_constructor_and_method() {
    let result = transpile(POINT, Target::Go);
    assert!(!result.has_errors);
    let out = result.source();
    assert!(out.contains("type Point struct {\n\tx int32\n\ty int32\n}"), "{out}");
    assert!(out.contains("func NewPoint(x int32, y int32) *Point {"), "{out}");
    assert!(out.contains("func (p *Point) Distance() int32 {"), "{out}");
}

#[test]
fn generation_is_deterministic_for_both_targets() {
    for target in [Target::Rust, Target::Go] {
        let first = transpile(POINT, target);
        let second = transpile(POINT, target);
        assert_eq!(first.source(), second.source());
        assert_eq!(first.diagnostics.len(), second.diagnostics.len());
    }
}

#[test]
fn ir_survives_json() {
    let (ir, _) = analyze(POINT);
    let json = serde_json::to_string(&ir).unwrap();
    let back: hybrid_ir::Ir = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ir);
}
