//! C emission helper tests.

use test_case::test_case;
use tinykern_dtype::ScalarDType;

use crate::c::types::{c_dtype_enum, c_float};
use crate::c::{CodeBuffer, LaneIsa, scalar_activation};
use crate::context::Activation;
use crate::winograd::rational::Rational;

fn r(num: i64, den: i64) -> Rational {
    Rational::new(num, den)
}

#[test_case(r(1, 2), "0.5f"; "half")]
#[test_case(r(-2, 1), "-2.0f"; "negative_integer")]
#[test_case(r(1, 4), "0.25f"; "quarter")]
#[test_case(r(1, 3), "(1.0f / 3.0f)"; "third")]
#[test_case(r(-2, 9), "(-2.0f / 9.0f)"; "negative_ninth")]
fn test_c_float(value: Rational, expected: &str) {
    assert_eq!(c_float(value), expected);
}

#[test]
fn test_c_dtype_enum() {
    assert_eq!(c_dtype_enum(ScalarDType::Float32), "TinyNN_FLOAT");
    assert_eq!(c_dtype_enum(ScalarDType::Int8), "TinyNN_INT8");
}

#[test]
fn test_portable_linear_combination() {
    let isa = LaneIsa::Portable;
    assert_eq!(isa.linear_combination(&[(r(1, 1), "a"), (r(-1, 1), "b"), (r(0, 1), "c")]), "a - b");
    assert_eq!(isa.linear_combination(&[(r(1, 2), "a")]), "a * 0.5f");
    assert_eq!(isa.linear_combination(&[(r(-1, 1), "a"), (r(-1, 2), "b")]), "-a - b * 0.5f");
    assert_eq!(isa.linear_combination(&[(r(0, 1), "a")]), "0.f");
}

#[test]
fn test_neon_linear_combination() {
    let isa = LaneIsa::Neon;
    assert_eq!(isa.linear_combination(&[(r(1, 1), "a"), (r(1, 1), "b")]), "vaddq_f32(a, b)");
    assert_eq!(isa.linear_combination(&[(r(-1, 1), "a"), (r(1, 2), "b")]), "vmlaq_n_f32(vnegq_f32(a), b, 0.5f)");
    assert_eq!(isa.linear_combination(&[(r(1, 1), "a"), (r(-1, 2), "b")]), "vmlsq_n_f32(a, b, 0.5f)");
    assert_eq!(isa.linear_combination(&[(r(2, 1), "a"), (r(-1, 1), "b")]), "vsubq_f32(vmulq_n_f32(a, 2.0f), b)");
    assert_eq!(isa.linear_combination(&[]), "vdupq_n_f32(0.f)");
}

#[test]
fn test_activation_statements() {
    assert_eq!(LaneIsa::Neon.activation("x", Activation::Identity), None);
    assert_eq!(LaneIsa::Neon.activation("x", Activation::Relu).as_deref(), Some("x = vmaxq_f32(x, vdupq_n_f32(0.f));"));
    assert_eq!(LaneIsa::Portable.activation("x", Activation::Relu), scalar_activation("x", Activation::Relu));
    assert!(scalar_activation("v", Activation::HSwish).is_some_and(|s| s.ends_with("/ 6.f;")));
}

#[test]
fn test_code_buffer_indentation() {
    let mut code = CodeBuffer::new();
    code.line("");
    code.open("void f(void) {");
    code.open("for (;;) {");
    code.splice("a;\n  b;");
    code.close("}");
    code.close("}");

    assert_eq!(code.finish(), "\nvoid f(void) {\n    for (;;) {\n        a;\n          b;\n    }\n}\n");
}
