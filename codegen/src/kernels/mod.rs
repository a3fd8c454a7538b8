//! Kernel generators registered in the catalog.
//!
//! The candidate set is closed: [`KernelImpl`] tags every implementation and
//! dispatches [`KernelGenerator`] calls with a `match`.

pub mod direct_conv;
pub mod mk4_matmul;
pub mod naive_matmul;
pub mod winograd_conv;

use enumset::EnumSet;
use snafu::{OptionExt, ensure};

use crate::c::CodeBuffer;
use crate::c::types::c_dtype_enum;
use crate::context::{ConvAttrs, TensorFormat};
use crate::error::{MalformedConvSnafu, MissingAttrsSnafu, Result};
use crate::runtime_abi::{deduce_signature, init_signature, workspace_signature};
use crate::{FuncCategory, FuncUnit, GenerationContext, GeneratedKernel, InstructionSet, KernelGenerator};

pub use direct_conv::DirectConvKernel;
pub use mk4_matmul::Mk4MatMulKernel;
pub use naive_matmul::NaiveMatMulKernel;
pub use winograd_conv::WinogradConvKernel;

/// Every registered implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelImpl {
    WinogradConv(WinogradConvKernel),
    DirectConv(DirectConvKernel),
    Mk4MatMul(Mk4MatMulKernel),
    NaiveMatMul(NaiveMatMulKernel),
}

macro_rules! delegate {
    ($self:ident, $k:ident => $call:expr) => {
        match $self {
            KernelImpl::WinogradConv($k) => $call,
            KernelImpl::DirectConv($k) => $call,
            KernelImpl::Mk4MatMul($k) => $call,
            KernelImpl::NaiveMatMul($k) => $call,
        }
    };
}

impl KernelImpl {
    pub const fn is_winograd(&self) -> bool {
        matches!(self, Self::WinogradConv(_))
    }
}

impl KernelGenerator for KernelImpl {
    fn name(&self) -> String {
        delegate!(self, k => k.name())
    }

    fn is_available(&self, ctx: &GenerationContext) -> bool {
        delegate!(self, k => k.is_available(ctx))
    }

    fn kernel_symbol(&self, ctx: &GenerationContext) -> String {
        delegate!(self, k => k.kernel_symbol(ctx))
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<GeneratedKernel> {
        delegate!(self, k => k.generate(ctx))
    }

    fn instructions(&self) -> EnumSet<InstructionSet> {
        delegate!(self, k => k.instructions())
    }
}

pub(crate) fn conv_attrs(ctx: &GenerationContext) -> Result<&ConvAttrs> {
    let conv = ctx.conv().context(MissingAttrsSnafu { what: "convolution attributes" })?;
    ensure!(conv.is_well_formed(), MalformedConvSnafu { tag: conv.param_tag() });
    Ok(conv)
}

/// Fill `layout` (a `Layout*` expression) with contiguous strides.
pub(crate) fn emit_layout(code: &mut CodeBuffer, layout: &str, dims: &[String]) {
    code.line(format!("{layout}->nr_dim = {};", dims.len()));
    for (i, dim) in dims.iter().enumerate() {
        code.line(format!("{layout}->dims[{i}] = {dim};"));
    }
    code.line(format!("{layout}->stride[{}] = 1;", dims.len() - 1));
    for i in (0..dims.len() - 1).rev() {
        code.line(format!("{layout}->stride[{i}] = {layout}->stride[{}] * {layout}->dims[{}];", i + 1, i + 1));
    }
}

/// Output-shape deduction for a convolution with fixed attributes.
///
/// Independent of the algorithm, so every conv generator emits the same unit
/// for the same attributes.
pub(crate) fn conv_deduce_unit(ctx: &GenerationContext, conv: &ConvAttrs) -> FuncUnit {
    let symbol = format!("GI_deduce_conv2d_{}_{}", ctx.format, conv.param_tag());
    let signature = deduce_signature(&symbol);
    let out_extent = |axis: usize, k: u32, s: u32, p: u32, d: u32| {
        format!("(src.dims[{axis}] + {} - {}) / {s} + 1", 2 * p, (k - 1) * d + 1)
    };
    // NCHW44 weights arrive raw `[OCB][ICB][K][K][4][4]` or transformed `[α²][OCB][ICB][4][4]`
    let out_channels = match ctx.format {
        TensorFormat::Nchw44 => "filter.nr_dim == 5 ? filter.dims[1] : filter.dims[0]",
        _ => "filter.dims[0]",
    };
    let mut dims = vec!["src.dims[0]".to_string(), out_channels.to_string()];
    dims.push(out_extent(2, conv.kernel_h, conv.stride_h, conv.pad_h, conv.dilation_h));
    dims.push(out_extent(3, conv.kernel_w, conv.stride_w, conv.pad_w, conv.dilation_w));
    if ctx.format == TensorFormat::Nchw44 {
        dims.push("4".to_string());
    }

    let mut code = CodeBuffer::new();
    code.line("");
    code.open(format!("TinyNNStatus {signature} {{"));
    code.line("const Layout src = inputs[0]->layout;");
    code.line("const Layout filter = inputs[1]->layout;");
    code.line("Layout* dst = &outputs[0]->layout;");
    emit_layout(&mut code, "dst", &dims);
    code.line("return TinyNNSuccess;");
    code.close("}");
    FuncUnit::new(FuncCategory::DeduceShape, symbol, signature, code.finish())
}

/// Init that hands the constant operand `inputs[weight]` to the kernel unchanged.
pub(crate) fn passthrough_init(kernel_symbol: &str, ctx: &GenerationContext, weight: usize) -> FuncUnit {
    let symbol = crate::runtime_abi::init_symbol(kernel_symbol);
    let signature = init_signature(&symbol);
    let mut code = CodeBuffer::new();
    code.line("");
    code.open(format!("TinyNNStatus {signature} {{"));
    code.open("if (out_weights == NULL && nr_out_weight != NULL) {");
    code.line("*nr_out_weight = 1;");
    code.line("return TinyNNSuccess;");
    code.close("}");
    code.line(format!("const Tensor* filter = &inputs[{weight}];"));
    code.open("if (out_weights != NULL && out_weights->ptr == NULL) {");
    code.line("out_weights->layout = filter->layout;");
    code.line(format!("out_weights->dtype.type_enum = {};", c_dtype_enum(ctx.dtype)));
    code.line("out_weights->name = filter->name;");
    code.line("return TinyNNSuccess;");
    code.close("}");
    code.line("size_t nr_elem = 1;");
    code.open("for (int i = 0; i < filter->layout.nr_dim; ++i) {");
    code.line("nr_elem *= filter->layout.dims[i];");
    code.close("}");
    code.line(format!("memcpy(out_weights->ptr, filter->ptr, nr_elem * sizeof({}));", ctx.dtype.c_style()));
    code.line("return TinyNNSuccess;");
    code.close("}");
    FuncUnit::new(FuncCategory::Init, symbol, signature, code.finish())
}

/// Workspace function returning a fixed expression of the inputs.
pub(crate) fn workspace_unit(kernel_symbol: &str, prelude: &[String], size_expr: &str) -> FuncUnit {
    let symbol = crate::runtime_abi::workspace_symbol(kernel_symbol);
    let signature = workspace_signature(&symbol);
    let mut code = CodeBuffer::new();
    code.line("");
    code.open(format!("TinyNNStatus {signature} {{"));
    for line in prelude {
        code.line(line);
    }
    code.line(format!("*workspace = {size_expr};"));
    code.line("return TinyNNSuccess;");
    code.close("}");
    FuncUnit::new(FuncCategory::Workspace, symbol, signature, code.finish())
}
