//! Per-request generation metadata supplied by the graph front-end.
//!
//! A [`GenerationContext`] describes one operator instance: element type,
//! memory layout, fused activation and the operator's own attributes. It is
//! read-only to every generator.

use bon::Builder;
use tinykern_dtype::ScalarDType;

/// Memory layout of activations and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::AsRefStr)]
pub enum TensorFormat {
    #[default]
    #[strum(serialize = "nchw")]
    Nchw,
    /// Channels blocked by 4: activations `[N, C/4, H, W, 4]`,
    /// filters `[OC/4, IC/4, FH, FW, 4(ic), 4(oc)]`.
    #[strum(serialize = "nchw44")]
    Nchw44,
}

impl TensorFormat {
    /// Channel block size of the layout.
    pub const fn pack_size(&self) -> usize {
        match self {
            Self::Nchw => 1,
            Self::Nchw44 => 4,
        }
    }
}

/// Activation fused into the kernel epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::AsRefStr, strum::EnumIter)]
pub enum Activation {
    #[default]
    #[strum(serialize = "identity")]
    Identity,
    #[strum(serialize = "relu")]
    Relu,
    #[strum(serialize = "hswish")]
    HSwish,
}

/// Convolution attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Builder)]
pub struct ConvAttrs {
    pub kernel_h: u32,
    pub kernel_w: u32,
    #[builder(default = 1)]
    pub stride_h: u32,
    #[builder(default = 1)]
    pub stride_w: u32,
    #[builder(default = 0)]
    pub pad_h: u32,
    #[builder(default = 0)]
    pub pad_w: u32,
    #[builder(default = 1)]
    pub dilation_h: u32,
    #[builder(default = 1)]
    pub dilation_w: u32,
    #[builder(default = 1)]
    pub group: u32,
}

impl ConvAttrs {
    /// Square kernel, unit stride and dilation, symmetric padding.
    pub const fn square(kernel: u32, pad: u32) -> Self {
        Self {
            kernel_h: kernel,
            kernel_w: kernel,
            stride_h: 1,
            stride_w: 1,
            pad_h: pad,
            pad_w: pad,
            dilation_h: 1,
            dilation_w: 1,
            group: 1,
        }
    }

    pub const fn is_unit_stride(&self) -> bool {
        self.stride_h == 1 && self.stride_w == 1
    }

    pub const fn is_unit_dilation(&self) -> bool {
        self.dilation_h == 1 && self.dilation_w == 1
    }

    /// Non-zero kernel extent, stride, dilation and group.
    pub const fn is_well_formed(&self) -> bool {
        self.kernel_h >= 1
            && self.kernel_w >= 1
            && self.stride_h >= 1
            && self.stride_w >= 1
            && self.dilation_h >= 1
            && self.dilation_w >= 1
            && self.group >= 1
    }

    /// Compact parameter tag embedded in symbol names, e.g. `k3x3_s1x1_p1x1_d1x1`.
    pub fn param_tag(&self) -> String {
        format!(
            "k{}x{}_s{}x{}_p{}x{}_d{}x{}",
            self.kernel_h,
            self.kernel_w,
            self.stride_h,
            self.stride_w,
            self.pad_h,
            self.pad_w,
            self.dilation_h,
            self.dilation_w
        )
    }
}

/// Matrix multiplication attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Builder)]
pub struct MatMulAttrs {
    #[builder(default)]
    pub transpose_a: bool,
    #[builder(default)]
    pub transpose_b: bool,
}

/// Operator-specific attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorAttrs {
    Conv(ConvAttrs),
    MatMul(MatMulAttrs),
}

/// Everything a generator may inspect about one operator instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
pub struct GenerationContext {
    #[builder(default = ScalarDType::Float32)]
    pub dtype: ScalarDType,
    #[builder(default)]
    pub format: TensorFormat,
    #[builder(default)]
    pub activation: Activation,
    #[builder(default)]
    pub has_bias: bool,
    pub attrs: OperatorAttrs,
}

impl GenerationContext {
    pub fn conv(&self) -> Option<&ConvAttrs> {
        match &self.attrs {
            OperatorAttrs::Conv(conv) => Some(conv),
            OperatorAttrs::MatMul(_) => None,
        }
    }

    pub fn matmul(&self) -> Option<&MatMulAttrs> {
        match &self.attrs {
            OperatorAttrs::MatMul(matmul) => Some(matmul),
            OperatorAttrs::Conv(_) => None,
        }
    }

    /// Suffix shared by every symbol generated for this context:
    /// layout, element type, activation and bias flag.
    pub fn symbol_suffix(&self) -> String {
        let bias = if self.has_bias { "_bias" } else { "" };
        format!("{}_{}_{}{}", self.format, self.dtype.short_name(), self.activation, bias)
    }
}
