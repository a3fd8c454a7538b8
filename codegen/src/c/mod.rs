//! C source emission helpers shared by the kernel generators.
//!
//! Kernels operate on MK4 packs: the innermost block of 4 channels is the
//! vector lane. [`LaneIsa::Neon`] renders one `float32x4_t` per value,
//! [`LaneIsa::Portable`] renders scalar code inside a 4-iteration lane loop.

pub mod types;

use enumset::EnumSet;

use crate::InstructionSet;
use crate::context::Activation;
use crate::winograd::rational::Rational;

use self::types::c_float;

/// Line-oriented C source buffer with indentation tracking.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    lines: Vec<String>,
    depth: usize,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a given indentation depth (snippets spliced into loops).
    pub fn with_depth(depth: usize) -> Self {
        Self { lines: Vec::new(), depth }
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", "    ".repeat(self.depth), text));
        }
        self
    }

    /// Emit `text` and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(text);
        self.depth += 1;
        self
    }

    /// Dedent and emit `text`.
    pub fn close(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line(text)
    }

    /// Splice pre-rendered lines, re-indented to the current depth.
    pub fn splice(&mut self, snippet: &str) -> &mut Self {
        for line in snippet.lines() {
            self.line(line);
        }
        self
    }

    /// Joined source, newline-terminated.
    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// How one MK4 lane group is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneIsa {
    Neon,
    Portable,
}

impl LaneIsa {
    pub const fn value_type(&self) -> &'static str {
        match self {
            Self::Neon => "float32x4_t",
            Self::Portable => "float",
        }
    }

    pub fn instructions(&self) -> EnumSet<InstructionSet> {
        match self {
            Self::Neon => EnumSet::only(InstructionSet::Neon),
            Self::Portable => EnumSet::empty(),
        }
    }

    /// Headers the emitted code needs beyond the runtime header.
    pub const fn include(&self) -> Option<&'static str> {
        match self {
            Self::Neon => Some("#include <arm_neon.h>"),
            Self::Portable => None,
        }
    }

    /// Open the per-lane scope. Neon needs none.
    pub fn open_lanes(&self, code: &mut CodeBuffer) {
        if let Self::Portable = self {
            code.open("for (int lane = 0; lane < 4; ++lane) {");
        }
    }

    pub fn close_lanes(&self, code: &mut CodeBuffer) {
        if let Self::Portable = self {
            code.close("}");
        }
    }

    /// Load the 4-channel group starting at `ptr`.
    pub fn load(&self, ptr: &str) -> String {
        match self {
            Self::Neon => format!("vld1q_f32({ptr})"),
            Self::Portable => format!("({ptr})[lane]"),
        }
    }

    pub fn store(&self, ptr: &str, value: &str) -> String {
        match self {
            Self::Neon => format!("vst1q_f32({ptr}, {value});"),
            Self::Portable => format!("({ptr})[lane] = {value};"),
        }
    }

    pub fn add(&self, lhs: &str, rhs: &str) -> String {
        match self {
            Self::Neon => format!("vaddq_f32({lhs}, {rhs})"),
            Self::Portable => format!("{lhs} + {rhs}"),
        }
    }

    /// `Σ coef_i * value_i` with zero terms dropped and unit terms unscaled.
    pub fn linear_combination(&self, terms: &[(Rational, &str)]) -> String {
        let terms: Vec<_> = terms.iter().filter(|(c, _)| !c.is_zero()).collect();
        match self {
            Self::Neon => {
                let Some(((first_coef, first), rest)) = terms.split_first().map(|(f, r)| (**f, r)) else {
                    return "vdupq_n_f32(0.f)".to_string();
                };
                let mut expr = if first_coef == Rational::ONE {
                    first.to_string()
                } else if first_coef == -Rational::ONE {
                    format!("vnegq_f32({first})")
                } else {
                    format!("vmulq_n_f32({first}, {})", c_float(first_coef))
                };
                for (coef, value) in rest.iter().map(|t| **t) {
                    expr = if coef == Rational::ONE {
                        format!("vaddq_f32({expr}, {value})")
                    } else if coef == -Rational::ONE {
                        format!("vsubq_f32({expr}, {value})")
                    } else if coef.is_negative() {
                        format!("vmlsq_n_f32({expr}, {value}, {})", c_float(coef.abs()))
                    } else {
                        format!("vmlaq_n_f32({expr}, {value}, {})", c_float(coef))
                    };
                }
                expr
            }
            Self::Portable => {
                let mut expr = String::new();
                for (i, (coef, value)) in terms.iter().map(|t| **t).enumerate() {
                    let magnitude = coef.abs();
                    let term =
                        if magnitude == Rational::ONE { value.to_string() } else { format!("{value} * {}", c_float(magnitude)) };
                    match (i, coef.is_negative()) {
                        (0, false) => expr.push_str(&term),
                        (0, true) => expr.push_str(&format!("-{term}")),
                        (_, false) => expr.push_str(&format!(" + {term}")),
                        (_, true) => expr.push_str(&format!(" - {term}")),
                    }
                }
                if expr.is_empty() { "0.f".to_string() } else { expr }
            }
        }
    }

    /// Assign `activation(var)` back into `var`.
    pub fn activation(&self, var: &str, activation: Activation) -> Option<String> {
        let expr = match (self, activation) {
            (_, Activation::Identity) => return None,
            (Self::Neon, Activation::Relu) => format!("vmaxq_f32({var}, vdupq_n_f32(0.f))"),
            (Self::Neon, Activation::HSwish) => format!(
                "vmulq_f32({var}, vmulq_n_f32(vminq_f32(vmaxq_f32(vaddq_f32({var}, vdupq_n_f32(3.f)), \
                 vdupq_n_f32(0.f)), vdupq_n_f32(6.f)), 1.f / 6.f))"
            ),
            (Self::Portable, act) => return scalar_activation(var, act),
        };
        Some(format!("{var} = {expr};"))
    }
}

/// Scalar `var = activation(var);` statement, `None` for identity.
pub fn scalar_activation(var: &str, activation: Activation) -> Option<String> {
    match activation {
        Activation::Identity => None,
        Activation::Relu => Some(format!("{var} = {var} > 0.f ? {var} : 0.f;")),
        Activation::HSwish => Some(format!(
            "{var} = {var} * ({var} + 3.f < 0.f ? 0.f : ({var} + 3.f > 6.f ? 6.f : {var} + 3.f)) / 6.f;"
        )),
    }
}
