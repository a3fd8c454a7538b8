//! Row-major reference matmul, any transpose combination.

use enumset::EnumSet;
use snafu::OptionExt;
use tinykern_dtype::ScalarDType;

use crate::c::{CodeBuffer, scalar_activation};
use crate::context::{MatMulAttrs, TensorFormat};
use crate::error::{MissingAttrsSnafu, Result};
use crate::runtime_abi::{deduce_signature, kernel_signature};
use crate::{FuncCategory, FuncUnit, GeneratedKernel, GenerationContext, InstructionSet, KernelGenerator};

use super::{emit_layout, passthrough_init, workspace_unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NaiveMatMulKernel;

fn transpose_tag(mm: &MatMulAttrs) -> &'static str {
    match (mm.transpose_a, mm.transpose_b) {
        (false, false) => "nn",
        (false, true) => "nt",
        (true, false) => "tn",
        (true, true) => "tt",
    }
}

impl NaiveMatMulKernel {
    fn deduce_unit(&self, mm: &MatMulAttrs) -> FuncUnit {
        let symbol = format!("GI_deduce_matmul_{}", transpose_tag(mm));
        let signature = deduce_signature(&symbol);
        let rows = if mm.transpose_a { "a.dims[1]" } else { "a.dims[0]" };
        let cols = if mm.transpose_b { "b.dims[0]" } else { "b.dims[1]" };

        let mut code = CodeBuffer::new();
        code.line("");
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("const Layout a = inputs[0]->layout;");
        code.line("const Layout b = inputs[1]->layout;");
        code.line("Layout* dst = &outputs[0]->layout;");
        emit_layout(&mut code, "dst", &[rows.to_string(), cols.to_string()]);
        code.line("return TinyNNSuccess;");
        code.close("}");
        FuncUnit::new(FuncCategory::DeduceShape, symbol, signature, code.finish())
    }
}

impl KernelGenerator for NaiveMatMulKernel {
    fn name(&self) -> String {
        "GI_naive_matmul".to_string()
    }

    fn is_available(&self, ctx: &GenerationContext) -> bool {
        ctx.matmul().is_some() && ctx.dtype == ScalarDType::Float32 && ctx.format == TensorFormat::Nchw
    }

    fn kernel_symbol(&self, ctx: &GenerationContext) -> String {
        let tag = ctx.matmul().map_or("nn", transpose_tag);
        format!("GI_kernel_naive_matmul_{tag}_{}", ctx.symbol_suffix())
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<GeneratedKernel> {
        let mm = ctx.matmul().context(MissingAttrsSnafu { what: "matmul attributes" })?;
        let kernel_symbol = self.kernel_symbol(ctx);
        let signature = kernel_signature(&kernel_symbol);
        let a_index = if mm.transpose_a { "k * M + m" } else { "m * K + k" };
        let b_index = if mm.transpose_b { "n * K + k" } else { "k * N + n" };

        let mut code = CodeBuffer::new();
        code.line("");
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("KERNEL_MARK_USED_VAR(workspace);");
        code.line("KERNEL_MARK_USED_VAR(opt);");
        code.line("const float* a = (const float*)inputs[0]->ptr;");
        code.line("const float* b = (const float*)inputs[1]->ptr;");
        code.line("float* c = (float*)outputs[0]->ptr;");
        code.line(format!("const int M = inputs[0]->layout.dims[{}];", u8::from(mm.transpose_a)));
        code.line(format!("const int K = inputs[0]->layout.dims[{}];", u8::from(!mm.transpose_a)));
        code.line(format!("const int N = inputs[1]->layout.dims[{}];", u8::from(!mm.transpose_b)));
        if ctx.has_bias {
            code.line("const float* bias = (const float*)inputs[2]->ptr;");
        }
        code.open("for (int m = 0; m < M; ++m) {");
        code.open("for (int n = 0; n < N; ++n) {");
        code.line(if ctx.has_bias { "float v = bias[n];" } else { "float v = 0.f;" });
        code.open("for (int k = 0; k < K; ++k) {");
        code.line(format!("v += a[{a_index}] * b[{b_index}];"));
        code.close("}");
        if let Some(stmt) = scalar_activation("v", ctx.activation) {
            code.line(stmt);
        }
        code.line("c[m * N + n] = v;");
        code.close("}");
        code.close("}");
        code.line("return TinyNNSuccess;");
        code.close("}");

        Ok(GeneratedKernel {
            generator: self.name(),
            kernel: FuncUnit::new(FuncCategory::Kernel, kernel_symbol.clone(), signature, code.finish()),
            init: passthrough_init(&kernel_symbol, ctx, 1),
            workspace: workspace_unit(&kernel_symbol, &[], "0"),
            deduce_shape: Some(self.deduce_unit(mm)),
            dependencies: Vec::new(),
        })
    }

    fn instructions(&self) -> EnumSet<InstructionSet> {
        EnumSet::empty()
    }
}
