//! Literal rendering for generated C.

use tinykern_dtype::ScalarDType;

use crate::winograd::rational::Rational;

/// Render a coefficient as a C `float` literal.
///
/// Dyadic fractions are exact in binary and print as decimals; other
/// fractions stay a constant division so the C compiler rounds them once.
pub fn c_float(value: Rational) -> String {
    let den = value.denom();
    if den & (den - 1) == 0 {
        format!("{:?}f", value.to_f32())
    } else {
        format!("({:?}f / {:?}f)", value.numer() as f32, den as f32)
    }
}

/// Runtime dtype enumerator of a scalar type.
pub fn c_dtype_enum(dtype: ScalarDType) -> &'static str {
    match dtype {
        ScalarDType::Int8 => "TinyNN_INT8",
        ScalarDType::Int16 => "TinyNN_INT16",
        ScalarDType::Int32 => "TinyNN_INT",
        ScalarDType::Float16 => "TinyNN_FLOAT16",
        ScalarDType::Float32 => "TinyNN_FLOAT",
    }
}
