//! Direct convolution in portable C.
//!
//! One loop nest serves both layouts: NCHW is NCHW44 with a channel block of 1.

use enumset::EnumSet;
use tinykern_dtype::ScalarDType;

use crate::c::{CodeBuffer, scalar_activation};
use crate::context::TensorFormat;
use crate::error::Result;
use crate::runtime_abi::kernel_signature;
use crate::{FuncCategory, FuncUnit, GeneratedKernel, GenerationContext, InstructionSet, KernelGenerator};

use super::{conv_attrs, conv_deduce_unit, passthrough_init, workspace_unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectConvKernel;

impl KernelGenerator for DirectConvKernel {
    fn name(&self) -> String {
        "GI_direct_conv2d".to_string()
    }

    fn is_available(&self, ctx: &GenerationContext) -> bool {
        ctx.conv().is_some_and(|conv| conv.group == 1 && conv.is_well_formed())
            && ctx.dtype == ScalarDType::Float32
            && matches!(ctx.format, TensorFormat::Nchw | TensorFormat::Nchw44)
    }

    fn kernel_symbol(&self, ctx: &GenerationContext) -> String {
        let tag = ctx.conv().map(|conv| conv.param_tag()).unwrap_or_default();
        format!("GI_kernel_direct_conv2d_{tag}_{}", ctx.symbol_suffix())
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<GeneratedKernel> {
        let conv = conv_attrs(ctx)?;
        let kernel_symbol = self.kernel_symbol(ctx);
        let signature = kernel_signature(&kernel_symbol);
        let pack = ctx.format.pack_size();

        let mut code = CodeBuffer::new();
        code.line("");
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("KERNEL_MARK_USED_VAR(workspace);");
        code.line("KERNEL_MARK_USED_VAR(opt);");
        code.line("const Tensor* src_t = inputs[0];");
        code.line("const Tensor* dst_t = outputs[0];");
        code.line("const float* src = (const float*)src_t->ptr;");
        code.line("const float* filter = (const float*)inputs[1]->ptr;");
        code.line("float* dst = (float*)dst_t->ptr;");
        if ctx.has_bias {
            code.line("const float* bias = (const float*)inputs[2]->ptr;");
        }
        code.line(format!("const int P = {pack};"));
        for (var, i) in [("N", 0), ("ICB", 1), ("IH", 2), ("IW", 3)] {
            code.line(format!("const int {var} = src_t->layout.dims[{i}];"));
        }
        for (var, i) in [("OCB", 1), ("OH", 2), ("OW", 3)] {
            code.line(format!("const int {var} = dst_t->layout.dims[{i}];"));
        }
        code.open("for (int n = 0; n < N; ++n) {");
        code.open("for (int ocb = 0; ocb < OCB; ++ocb) {");
        code.open("for (int oh = 0; oh < OH; ++oh) {");
        code.open("for (int ow = 0; ow < OW; ++ow) {");
        code.open("for (int o = 0; o < P; ++o) {");
        code.line(if ctx.has_bias { "float v = bias[ocb * P + o];" } else { "float v = 0.f;" });
        code.open("for (int icb = 0; icb < ICB; ++icb) {");
        code.open(format!("for (int fh = 0; fh < {}; ++fh) {{", conv.kernel_h));
        code.line(format!("const int ih = oh * {} - {} + fh * {};", conv.stride_h, conv.pad_h, conv.dilation_h));
        code.line("if (ih < 0 || ih >= IH) continue;");
        code.open(format!("for (int fw = 0; fw < {}; ++fw) {{", conv.kernel_w));
        code.line(format!("const int iw = ow * {} - {} + fw * {};", conv.stride_w, conv.pad_w, conv.dilation_w));
        code.line("if (iw < 0 || iw >= IW) continue;");
        code.open("for (int i = 0; i < P; ++i) {");
        code.line(format!(
            "v += src[(((n * ICB + icb) * IH + ih) * IW + iw) * P + i] * \
             filter[((((ocb * ICB + icb) * {} + fh) * {} + fw) * P + i) * P + o];",
            conv.kernel_h, conv.kernel_w
        ));
        code.close("}");
        code.close("}");
        code.close("}");
        code.close("}");
        if let Some(stmt) = scalar_activation("v", ctx.activation) {
            code.line(stmt);
        }
        code.line("dst[(((n * OCB + ocb) * OH + oh) * OW + ow) * P + o] = v;");
        for _ in 0..5 {
            code.close("}");
        }
        code.line("return TinyNNSuccess;");
        code.close("}");

        Ok(GeneratedKernel {
            generator: self.name(),
            kernel: FuncUnit::new(FuncCategory::Kernel, kernel_symbol.clone(), signature, code.finish()),
            init: passthrough_init(&kernel_symbol, ctx, 1),
            workspace: workspace_unit(&kernel_symbol, &[], "0"),
            deduce_shape: Some(conv_deduce_unit(ctx, conv)),
            dependencies: Vec::new(),
        })
    }

    fn instructions(&self) -> EnumSet<InstructionSet> {
        EnumSet::empty()
    }
}
