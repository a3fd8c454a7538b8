//! Winograd MK4 convolution kernel.
//!
//! Composes the four [`WinogradStrategy`] stages into the runtime units: the
//! init transforms the filter once, the kernel transforms input tiles in
//! batches of [`TILE_PER_LOOP`], runs the batched matmul and writes the output
//! tiles back.

use enumset::EnumSet;
use tinykern_dtype::ScalarDType;

use crate::c::types::c_dtype_enum;
use crate::c::{CodeBuffer, LaneIsa};
use crate::context::TensorFormat;
use crate::error::Result;
use crate::runtime_abi::{init_signature, init_symbol, kernel_signature};
use crate::winograd::{StageContext, WinogradStrategy};
use crate::{FuncCategory, FuncUnit, GeneratedKernel, GenerationContext, Guard, InstructionSet, KernelGenerator};

use super::{conv_attrs, conv_deduce_unit, emit_layout, mk4_matmul, workspace_unit};

/// Tiles transformed per matmul batch.
pub const TILE_PER_LOOP: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WinogradConvKernel {
    prefix: &'static str,
    strategy: WinogradStrategy,
}

impl WinogradConvKernel {
    pub const ARM64_F23: Self = Self::new("Arm64", WinogradStrategy::F23_NEON);
    pub const ARM64_F43: Self = Self::new("Arm64", WinogradStrategy::F43_NEON);
    pub const ARM64_F63: Self = Self::new("Arm64", WinogradStrategy::F63_NEON);
    pub const ARM_COMMON_F23: Self = Self::new("ArmCommon", WinogradStrategy::F23_NEON);
    pub const GI_F23: Self = Self::new("GI", WinogradStrategy::F23_PORTABLE);

    pub const fn new(prefix: &'static str, strategy: WinogradStrategy) -> Self {
        Self { prefix, strategy }
    }

    pub const fn strategy(&self) -> &WinogradStrategy {
        &self.strategy
    }

    fn isa(&self) -> LaneIsa {
        self.strategy.isa()
    }

    /// Wrap an ISA-specific unit in its include and guard.
    fn finish_unit(&self, code: CodeBuffer, unit: impl FnOnce(String) -> FuncUnit) -> FuncUnit {
        let unit = unit(code.finish()).with_instructions(self.isa().instructions());
        match self.isa() {
            LaneIsa::Neon => unit.with_guard(Guard::defined("__ARM_NEON")),
            LaneIsa::Portable => unit,
        }
    }

    fn begin(&self) -> CodeBuffer {
        let mut code = CodeBuffer::new();
        code.line("");
        if let Some(include) = self.isa().include() {
            code.line(include);
        }
        code
    }

    fn kernel_unit(&self, ctx: &GenerationContext, kernel_symbol: &str, pad_h: u32, pad_w: u32) -> FuncUnit {
        let s = &self.strategy;
        let (m, alpha) = (s.output_block(), s.input_block());
        let area = alpha * alpha;
        let signature = kernel_signature(kernel_symbol);

        let mut code = self.begin();
        code.line(mk4_matmul::declaration(self.isa()));
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("KERNEL_MARK_USED_VAR(opt);");
        code.line(format!("const int TILE_PER_LOOP = {TILE_PER_LOOP};"));
        code.line("const Tensor* src_t = inputs[0];");
        code.line("const Tensor* weight_t = inputs[1];");
        code.line("Tensor* dst_t = outputs[0];");
        if ctx.has_bias {
            code.line("const float* bias = (const float*)inputs[2]->ptr;");
        }
        for (var, i) in [("N", 0), ("ICB", 1), ("IH", 2), ("IW", 3)] {
            code.line(format!("const int {var} = src_t->layout.dims[{i}];"));
        }
        for (var, i) in [("OCB", 1), ("OH", 2), ("OW", 3)] {
            code.line(format!("const int {var} = dst_t->layout.dims[{i}];"));
        }
        code.line(format!("const int tiles_h = (OH + {}) / {m};", m - 1));
        code.line(format!("const int tiles_w = (OW + {}) / {m};", m - 1));
        code.line("const int total_tiles = tiles_h * tiles_w;");
        code.line("const float* weight = (const float*)weight_t->ptr;");
        code.line("float* trans_input = (float*)workspace->ptr;");
        code.line(format!("float* trans_output = trans_input + {area} * ICB * TILE_PER_LOOP * 4;"));

        code.open("for (int n = 0; n < N; ++n) {");
        code.line("const float* src = (const float*)src_t->ptr + n * ICB * IH * IW * 4;");
        code.line("float* dst = (float*)dst_t->ptr + n * OCB * OH * OW * 4;");
        code.open("for (int tile_start = 0; tile_start < total_tiles; tile_start += TILE_PER_LOOP) {");
        code.line(
            "const int nr_tiles = total_tiles - tile_start < TILE_PER_LOOP ? total_tiles - tile_start : TILE_PER_LOOP;",
        );

        code.open("for (int icb = 0; icb < ICB; ++icb) {");
        code.open("for (int tile = 0; tile < nr_tiles; ++tile) {");
        code.line("const int tile_id = tile_start + tile;");
        code.line(format!("const int ih_start = tile_id / tiles_w * {m} - {pad_h};"));
        code.line(format!("const int iw_start = tile_id % tiles_w * {m} - {pad_w};"));
        code.splice(&s.input_feature_trans(&[
            "src",
            "trans_input",
            "icb",
            "ICB",
            "IH",
            "IW",
            "ih_start",
            "iw_start",
            "tile",
            "nr_tiles",
        ]));
        code.close("}");
        code.close("}");

        code.splice(&s.batched_matmul(&["weight", "trans_input", "trans_output", "OCB", "ICB", "nr_tiles"]));

        code.open("for (int ocb = 0; ocb < OCB; ++ocb) {");
        code.open("for (int tile = 0; tile < nr_tiles; ++tile) {");
        code.line("const int tile_id = tile_start + tile;");
        code.line(format!("const int oh_start = tile_id / tiles_w * {m};"));
        code.line(format!("const int ow_start = tile_id % tiles_w * {m};"));
        let stage = StageContext { activation: ctx.activation, has_bias: ctx.has_bias };
        code.splice(&s.output_feature_trans(
            &["trans_output", "dst", "bias", "ocb", "OCB", "OH", "OW", "oh_start", "ow_start", "tile", "nr_tiles"],
            &stage,
        ));
        code.close("}");
        code.close("}");

        code.close("}");
        code.close("}");
        code.line("return TinyNNSuccess;");
        code.close("}");

        self.finish_unit(code, |body| FuncUnit::new(FuncCategory::Kernel, kernel_symbol, signature, body))
    }

    /// Three phases keyed on the arguments: weight count, output layout,
    /// then the transform itself.
    fn init_unit(&self, ctx: &GenerationContext, kernel_symbol: &str) -> FuncUnit {
        let alpha = self.strategy.input_block();
        let symbol = init_symbol(kernel_symbol);
        let signature = init_signature(&symbol);

        let mut code = self.begin();
        code.open(format!("TinyNNStatus {signature} {{"));
        code.line("KERNEL_MARK_USED_VAR(opt);");
        code.open("if (out_weights == NULL && nr_out_weight != NULL) {");
        code.line("*nr_out_weight = 1;");
        code.line("return TinyNNSuccess;");
        code.close("}");
        code.line("const Tensor* filter_t = &inputs[1];");
        code.line("const int OCB = filter_t->layout.dims[0];");
        code.line("const int ICB = filter_t->layout.dims[1];");
        code.open("if (out_weights != NULL && out_weights->ptr == NULL) {");
        code.line("Layout* layout = &out_weights->layout;");
        let dims = [format!("{}", alpha * alpha), "OCB".into(), "ICB".into(), "4".into(), "4".into()];
        emit_layout(&mut code, "layout", &dims);
        code.line(format!("out_weights->dtype.type_enum = {};", c_dtype_enum(ctx.dtype)));
        code.line("out_weights->name = filter_t->name;");
        code.line("return TinyNNSuccess;");
        code.close("}");
        code.line("const float* src = (const float*)filter_t->ptr;");
        code.line("float* dst = (float*)out_weights->ptr;");
        code.splice(&self.strategy.weight_trans(&["src", "dst", "OCB", "ICB"]));
        code.line("return TinyNNSuccess;");
        code.close("}");

        self.finish_unit(code, |body| FuncUnit::new(FuncCategory::Init, symbol, signature, body))
    }

    fn workspace(&self, kernel_symbol: &str) -> FuncUnit {
        let area = self.strategy.input_block().pow(2);
        let prelude = [
            "const int ICB = inputs[0].layout.dims[1];".to_string(),
            // the weight is either the raw filter or its transformed layout
            "const Layout w = inputs[1].layout;".to_string(),
            "const int OCB = w.nr_dim == 6 ? w.dims[0] : w.dims[1];".to_string(),
        ];
        let size = format!("(size_t)({area} * (ICB + OCB) * {TILE_PER_LOOP} * 4) * sizeof(float)");
        workspace_unit(kernel_symbol, &prelude, &size)
    }
}

impl KernelGenerator for WinogradConvKernel {
    fn name(&self) -> String {
        format!("{}_{}", self.prefix, self.strategy.name())
    }

    fn is_available(&self, ctx: &GenerationContext) -> bool {
        let k = self.strategy.kernel_size();
        ctx.conv().is_some_and(|conv| {
            conv.group == 1
                && conv.kernel_h == k
                && conv.kernel_w == k
                && conv.is_unit_stride()
                && conv.is_unit_dilation()
        }) && ctx.dtype == ScalarDType::Float32
            && ctx.format == TensorFormat::Nchw44
    }

    fn kernel_symbol(&self, ctx: &GenerationContext) -> String {
        let tag = ctx.conv().map(|conv| conv.param_tag()).unwrap_or_default();
        format!("{}_kernel_{}_{tag}_{}", self.prefix, self.strategy.name(), ctx.symbol_suffix())
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<GeneratedKernel> {
        let conv = conv_attrs(ctx)?;
        let kernel_symbol = self.kernel_symbol(ctx);
        tracing::debug!(
            generator = %self.name(),
            symbol = %kernel_symbol,
            tile = self.strategy.input_block(),
            "emitting winograd units"
        );
        Ok(GeneratedKernel {
            generator: self.name(),
            kernel: self.kernel_unit(ctx, &kernel_symbol, conv.pad_h, conv.pad_w),
            init: self.init_unit(ctx, &kernel_symbol),
            workspace: self.workspace(&kernel_symbol),
            deduce_shape: Some(conv_deduce_unit(ctx, conv)),
            dependencies: vec![mk4_matmul::helper_unit(self.isa())],
        })
    }

    fn instructions(&self) -> EnumSet<InstructionSet> {
        self.strategy.instructions()
    }
}
