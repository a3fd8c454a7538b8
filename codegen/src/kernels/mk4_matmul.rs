//! MK4 packed matmul.
//!
//! The micro-kernel computes `C[ocb][n][o] = Σ_icb Σ_i A[ocb][icb][i][o] · B[icb][n][i]`
//! over packs of 4 channels. It is a standalone helper: Winograd kernels call
//! it once per transformed position and the runtime matmul kernel wraps it.

use enumset::EnumSet;
use snafu::OptionExt;
use tinykern_dtype::ScalarDType;

use crate::c::{CodeBuffer, LaneIsa, scalar_activation};
use crate::context::TensorFormat;
use crate::error::{MissingAttrsSnafu, Result};
use crate::runtime_abi::kernel_signature;
use crate::{
    FuncCategory, FuncUnit, GeneratedKernel, GenerationContext, Guard, InstructionSet, KernelGenerator,
};

use super::{emit_layout, passthrough_init, workspace_unit};

/// Columns processed per iteration of the NEON micro-kernel.
const NEON_COLS: usize = 4;

pub const HELPER_PARAMS: &str =
    "const float* pack_a, const float* pack_b, float* pack_c, int oc_blocks, int n, int ic_blocks";

/// Micro-kernel symbol for a lane ISA.
pub fn symbol(isa: LaneIsa) -> String {
    match isa {
        LaneIsa::Neon => format!("ArmCommon_fp32_mk4_matmul_n{NEON_COLS}"),
        LaneIsa::Portable => "GI_fp32_mk4_matmul".to_string(),
    }
}

/// `void sym(...);` line for callers that link against the helper.
pub fn declaration(isa: LaneIsa) -> String {
    format!("void {}({HELPER_PARAMS});", symbol(isa))
}

/// The micro-kernel as a standalone internal unit.
pub fn helper_unit(isa: LaneIsa) -> FuncUnit {
    let symbol = symbol(isa);
    let signature = format!("{symbol}({HELPER_PARAMS})");
    let mut code = CodeBuffer::new();
    code.line("");
    if let Some(include) = isa.include() {
        code.line(include);
    }
    code.open(format!("void {signature} {{"));
    match isa {
        LaneIsa::Neon => neon_body(&mut code),
        LaneIsa::Portable => portable_body(&mut code),
    }
    code.close("}");

    let unit = FuncUnit::new(FuncCategory::Internal, symbol, signature, code.finish()).with_instructions(isa.instructions());
    match isa {
        LaneIsa::Neon => unit.with_guard(Guard::defined("__ARM_NEON")),
        LaneIsa::Portable => unit,
    }
}

fn neon_body(code: &mut CodeBuffer) {
    code.open("for (int ocb = 0; ocb < oc_blocks; ++ocb) {");
    code.line("const float* a_row = pack_a + ocb * ic_blocks * 16;");
    code.line("float* c_row = pack_c + ocb * n * 4;");
    code.line("int col = 0;");
    code.open(format!("for (; col + {NEON_COLS} <= n; col += {NEON_COLS}) {{"));
    for c in 0..NEON_COLS {
        code.line(format!("float32x4_t acc{c} = vdupq_n_f32(0.f);"));
    }
    code.open("for (int icb = 0; icb < ic_blocks; ++icb) {");
    code.line("const float* a = a_row + icb * 16;");
    for i in 0..4 {
        code.line(format!("const float32x4_t a{i} = vld1q_f32(a + {});", i * 4));
    }
    for c in 0..NEON_COLS {
        code.line(format!("const float32x4_t b{c} = vld1q_f32(pack_b + (icb * n + col + {c}) * 4);"));
        for i in 0..4 {
            code.line(format!("acc{c} = vmlaq_n_f32(acc{c}, a{i}, vgetq_lane_f32(b{c}, {i}));"));
        }
    }
    code.close("}");
    for c in 0..NEON_COLS {
        code.line(format!("vst1q_f32(c_row + (col + {c}) * 4, acc{c});"));
    }
    code.close("}");
    code.open("for (; col < n; ++col) {");
    code.line("float32x4_t acc = vdupq_n_f32(0.f);");
    code.open("for (int icb = 0; icb < ic_blocks; ++icb) {");
    code.line("const float* a = a_row + icb * 16;");
    code.line("const float32x4_t b = vld1q_f32(pack_b + (icb * n + col) * 4);");
    for i in 0..4 {
        code.line(format!("acc = vmlaq_n_f32(acc, vld1q_f32(a + {}), vgetq_lane_f32(b, {i}));", i * 4));
    }
    code.close("}");
    code.line("vst1q_f32(c_row + col * 4, acc);");
    code.close("}");
    code.close("}");
}

fn portable_body(code: &mut CodeBuffer) {
    code.open("for (int ocb = 0; ocb < oc_blocks; ++ocb) {");
    code.open("for (int col = 0; col < n; ++col) {");
    code.line("float acc[4] = {0.f, 0.f, 0.f, 0.f};");
    code.open("for (int icb = 0; icb < ic_blocks; ++icb) {");
    code.line("const float* a = pack_a + (ocb * ic_blocks + icb) * 16;");
    code.line("const float* b = pack_b + (icb * n + col) * 4;");
    code.open("for (int i = 0; i < 4; ++i) {");
    code.open("for (int o = 0; o < 4; ++o) {");
    code.line("acc[o] += a[i * 4 + o] * b[i];");
    code.close("}");
    code.close("}");
    code.close("}");
    code.open("for (int o = 0; o < 4; ++o) {");
    code.line("pack_c[(ocb * n + col) * 4 + o] = acc[o];");
    code.close("}");
    code.close("}");
    code.close("}");
}

/// Runtime matmul over MK4-packed operands.
///
/// `A` is the constant `[M/4][K/4][4][4]` weight, `B` is `[K/4][N][4]`, the
/// output is `[M/4][N][4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mk4MatMulKernel {
    prefix: &'static str,
    isa: LaneIsa,
}

impl Mk4MatMulKernel {
    pub const ARM64_NEON: Self = Self { prefix: "Arm64", isa: LaneIsa::Neon };
    pub const PORTABLE: Self = Self { prefix: "GI", isa: LaneIsa::Portable };

    pub const fn isa(&self) -> LaneIsa {
        self.isa
    }

    fn deduce_unit(&self, ctx: &GenerationContext) -> FuncUnit {
        let symbol = format!("GI_deduce_matmul_mk4_{}", ctx.format);
        let signature = crate::runtime_abi::deduce_signature(&symbol);
        let mut code = CodeBuffer::new();
        code.line("");
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("const Layout a = inputs[0]->layout;");
        code.line("const Layout b = inputs[1]->layout;");
        code.line("Layout* dst = &outputs[0]->layout;");
        emit_layout(&mut code, "dst", &["a.dims[0]".into(), "b.dims[1]".into(), "4".into()]);
        code.line("return TinyNNSuccess;");
        code.close("}");
        FuncUnit::new(FuncCategory::DeduceShape, symbol, signature, code.finish())
    }
}

impl KernelGenerator for Mk4MatMulKernel {
    fn name(&self) -> String {
        format!("{}_fp32_mk4_matmul", self.prefix)
    }

    fn is_available(&self, ctx: &GenerationContext) -> bool {
        ctx.matmul().is_some_and(|mm| !mm.transpose_a && !mm.transpose_b)
            && ctx.dtype == ScalarDType::Float32
            && ctx.format == TensorFormat::Nchw44
    }

    fn kernel_symbol(&self, ctx: &GenerationContext) -> String {
        format!("{}_kernel_mk4_matmul_{}", self.prefix, ctx.symbol_suffix())
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<GeneratedKernel> {
        ctx.matmul().context(MissingAttrsSnafu { what: "matmul attributes" })?;
        let kernel_symbol = self.kernel_symbol(ctx);
        let signature = kernel_signature(&kernel_symbol);

        let mut code = CodeBuffer::new();
        code.line("");
        code.line(declaration(self.isa));
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("KERNEL_MARK_USED_VAR(workspace);");
        code.line("KERNEL_MARK_USED_VAR(opt);");
        code.line("const Tensor* a = inputs[0];");
        code.line("const Tensor* b = inputs[1];");
        code.line("Tensor* c = outputs[0];");
        code.line("const int oc_blocks = a->layout.dims[0];");
        code.line("const int ic_blocks = a->layout.dims[1];");
        code.line("const int n = b->layout.dims[1];");
        code.line("float* dst = (float*)c->ptr;");
        code.line(format!(
            "{}((const float*)a->ptr, (const float*)b->ptr, dst, oc_blocks, n, ic_blocks);",
            symbol(self.isa)
        ));
        let act = scalar_activation("v", ctx.activation);
        if ctx.has_bias || act.is_some() {
            if ctx.has_bias {
                code.line("const float* bias = (const float*)inputs[2]->ptr;");
            }
            code.open("for (int i = 0; i < oc_blocks * n * 4; ++i) {");
            code.line("float v = dst[i];");
            if ctx.has_bias {
                code.line("v += bias[i / (n * 4) * 4 + i % 4];");
            }
            if let Some(stmt) = act {
                code.line(stmt);
            }
            code.line("dst[i] = v;");
            code.close("}");
        }
        code.line("return TinyNNSuccess;");
        code.close("}");

        let mut kernel = FuncUnit::new(FuncCategory::Kernel, kernel_symbol.clone(), signature, code.finish())
            .with_instructions(self.isa.instructions());
        if self.isa == LaneIsa::Neon {
            kernel = kernel.with_guard(Guard::defined("__ARM_NEON"));
        }
        Ok(GeneratedKernel {
            generator: self.name(),
            init: passthrough_init(&kernel_symbol, ctx, 0),
            workspace: workspace_unit(&kernel_symbol, &[], "0"),
            deduce_shape: Some(self.deduce_unit(ctx)),
            dependencies: vec![helper_unit(self.isa)],
            kernel,
        })
    }

    fn instructions(&self) -> EnumSet<InstructionSet> {
        self.isa.instructions()
    }
}
