use enumset::EnumSet;

use super::{conv_ctx, matmul_ctx};
use crate::c::LaneIsa;
use crate::kernels::{DirectConvKernel, Mk4MatMulKernel, NaiveMatMulKernel, WinogradConvKernel, mk4_matmul};
use crate::{
    Activation, ConvAttrs, Error, FuncCategory, GenerationContext, InstructionSet, KernelGenerator, MatMulAttrs,
    OperatorAttrs, TensorFormat,
};

fn wino_ctx() -> GenerationContext {
    conv_ctx(TensorFormat::Nchw44, ConvAttrs::square(3, 1))
}

#[test]
fn test_winograd_units() {
    let kernel = WinogradConvKernel::ARM64_F23;
    let generated = kernel.generate(&wino_ctx()).unwrap();

    assert_eq!(generated.kernel.category, FuncCategory::Kernel);
    assert_eq!(generated.init.category, FuncCategory::Init);
    assert_eq!(generated.workspace.category, FuncCategory::Workspace);
    assert_eq!(generated.deduce_shape.as_ref().map(|u| u.category), Some(FuncCategory::DeduceShape));
    assert_eq!(generated.kernel.symbol, "Arm64_kernel_winograd_f23_mk4_k3x3_s1x1_p1x1_d1x1_nchw44_f32_identity");
    assert_eq!(generated.init.symbol, format!("{}_init", generated.kernel.symbol));
    assert_eq!(generated.workspace.symbol, format!("{}_workspace", generated.kernel.symbol));

    let [helper] = generated.dependencies.as_slice() else { panic!("expected one helper") };
    assert_eq!(helper.category, FuncCategory::Internal);
    assert!(helper.standalone);
    assert_eq!(helper.symbol, kernel.strategy().depend_matmul_symbol());
    assert!(generated.kernel.body.contains(&format!("{}(weight + pos", helper.symbol)));
    assert!(generated.kernel.body.contains(&mk4_matmul::declaration(LaneIsa::Neon)));
}

#[test]
fn test_winograd_neon_guard_and_instructions() {
    let generated = WinogradConvKernel::ARM64_F43.generate(&wino_ctx()).unwrap();

    assert_eq!(generated.kernel.guard_begin(), "#if defined(__ARM_NEON)\n");
    assert_eq!(generated.kernel.guard_end(), "#endif\n");
    assert!(generated.kernel.body.starts_with("\n#include <arm_neon.h>\n"));
    assert!(generated.init.guard.is_some());
    assert!(generated.workspace.guard.is_none());
    assert_eq!(generated.instructions(), EnumSet::only(InstructionSet::Neon));
    assert!(!generated.kernel.standalone);
}

#[test]
fn test_winograd_portable_is_unguarded() {
    let generated = WinogradConvKernel::GI_F23.generate(&wino_ctx()).unwrap();

    assert!(generated.units().all(|unit| unit.guard.is_none()));
    assert!(generated.instructions().is_empty());
    assert!(generated.kernel.body.contains("for (int lane = 0; lane < 4; ++lane)"));
}

#[test]
fn test_winograd_init_phases() {
    let init = WinogradConvKernel::GI_F23.generate(&wino_ctx()).unwrap().init;

    assert!(init.body.contains("*nr_out_weight = 1;"));
    assert!(init.body.contains("layout->nr_dim = 5;"));
    assert!(init.body.contains("layout->dims[0] = 16;"));
    assert!(init.body.contains("out_weights->dtype.type_enum = TinyNN_FLOAT;"));
    assert!(init.body.contains("weight transform, tile 4x4"));
}

#[test]
fn test_winograd_predicate() {
    let kernel = WinogradConvKernel::ARM64_F63;
    let grouped = ConvAttrs::builder().kernel_h(3).kernel_w(3).group(2).build();
    let dilated = ConvAttrs::builder().kernel_h(3).kernel_w(3).dilation_h(2).dilation_w(2).build();

    assert!(kernel.is_available(&wino_ctx()));
    assert!(!kernel.is_available(&conv_ctx(TensorFormat::Nchw, ConvAttrs::square(3, 1))));
    assert!(!kernel.is_available(&conv_ctx(TensorFormat::Nchw44, ConvAttrs::square(5, 2))));
    assert!(!kernel.is_available(&conv_ctx(TensorFormat::Nchw44, grouped)));
    assert!(!kernel.is_available(&conv_ctx(TensorFormat::Nchw44, dilated)));
    assert!(!kernel.is_available(&matmul_ctx(TensorFormat::Nchw44, MatMulAttrs::default())));
}

#[test]
fn test_identical_contexts_identical_units() {
    let a = WinogradConvKernel::ARM64_F23.generate(&wino_ctx()).unwrap();
    let b = WinogradConvKernel::ARM64_F23.generate(&wino_ctx()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_symbol_reflects_epilogue() {
    let kernel = WinogradConvKernel::ARM64_F23;
    let relu = GenerationContext::builder()
        .format(TensorFormat::Nchw44)
        .activation(Activation::Relu)
        .has_bias(true)
        .attrs(OperatorAttrs::Conv(ConvAttrs::square(3, 1)))
        .build();

    assert_ne!(kernel.kernel_symbol(&relu), kernel.kernel_symbol(&wino_ctx()));
    assert!(kernel.kernel_symbol(&relu).ends_with("_nchw44_f32_relu_bias"));
    assert_ne!(
        WinogradConvKernel::ARM64_F23.kernel_symbol(&wino_ctx()),
        WinogradConvKernel::ARM_COMMON_F23.kernel_symbol(&wino_ctx())
    );
}

#[test]
fn test_conv_generators_share_deduce_shape() {
    let ctx = wino_ctx();
    let wino = WinogradConvKernel::ARM64_F23.generate(&ctx).unwrap().deduce_shape.unwrap();
    let direct = DirectConvKernel.generate(&ctx).unwrap().deduce_shape.unwrap();

    assert_eq!(wino, direct);
    assert_eq!(wino.symbol, "GI_deduce_conv2d_nchw44_k3x3_s1x1_p1x1_d1x1");
    assert!(wino.body.contains("dst->dims[4] = 4;"));
    // raw and transformed weights agree on the output channel blocks
    assert!(wino.body.contains("dst->dims[1] = filter.nr_dim == 5 ? filter.dims[1] : filter.dims[0];"));
}

#[test]
fn test_nchw_deduce_reads_raw_filter() {
    let generated = DirectConvKernel.generate(&conv_ctx(TensorFormat::Nchw, ConvAttrs::square(3, 1))).unwrap();
    let deduce = generated.deduce_shape.unwrap();
    assert!(deduce.body.contains("dst->dims[1] = filter.dims[0];"));
    assert!(!deduce.body.contains("nr_dim == 5"));
}

#[test]
fn test_malformed_conv_is_an_error() {
    let attrs = ConvAttrs::builder().kernel_h(0).kernel_w(3).build();
    let err = DirectConvKernel.generate(&conv_ctx(TensorFormat::Nchw, attrs)).unwrap_err();
    assert!(matches!(err, Error::MalformedConv { ref tag } if tag == "k0x3_s1x1_p0x0_d1x1"));
}

#[test]
fn test_direct_conv_nchw() {
    let attrs = ConvAttrs::builder().kernel_h(5).kernel_w(3).stride_h(2).stride_w(1).pad_h(2).pad_w(1).build();
    let generated = DirectConvKernel.generate(&conv_ctx(TensorFormat::Nchw, attrs)).unwrap();

    assert!(generated.kernel.body.contains("const int P = 1;"));
    assert!(generated.kernel.body.contains("const int ih = oh * 2 - 2 + fh * 1;"));
    assert!(generated.dependencies.is_empty());
    assert!(generated.workspace.body.contains("*workspace = 0;"));
    let deduce = generated.deduce_shape.unwrap();
    assert!(deduce.body.contains("dst->nr_dim = 4;"));
    assert!(deduce.body.contains("dst->dims[2] = (src.dims[2] + 4 - 5) / 2 + 1;"));
}

#[test]
fn test_generate_requires_attrs() {
    let ctx = matmul_ctx(TensorFormat::Nchw44, MatMulAttrs::default());
    let err = WinogradConvKernel::GI_F23.generate(&ctx).unwrap_err();
    assert!(matches!(err, Error::MissingAttrs { .. }));

    let err = NaiveMatMulKernel.generate(&wino_ctx()).unwrap_err();
    assert!(matches!(err, Error::MissingAttrs { .. }));
}

#[test]
fn test_mk4_matmul_helper() {
    let neon = mk4_matmul::helper_unit(LaneIsa::Neon);
    assert_eq!(neon.symbol, "ArmCommon_fp32_mk4_matmul_n4");
    assert_eq!(neon.category, FuncCategory::Internal);
    assert!(neon.standalone);
    assert!(neon.body.contains("#include <arm_neon.h>"));
    assert!(neon.body.contains("vmlaq_n_f32(acc0, a0, vgetq_lane_f32(b0, 0))"));
    assert!(neon.body.contains("for (; col < n; ++col) {"));

    let portable = mk4_matmul::helper_unit(LaneIsa::Portable);
    assert_eq!(portable.symbol, "GI_fp32_mk4_matmul");
    assert!(portable.guard.is_none());
    assert!(portable.body.contains("acc[o] += a[i * 4 + o] * b[i];"));
}

#[test]
fn test_mk4_matmul_kernel() {
    let ctx = matmul_ctx(TensorFormat::Nchw44, MatMulAttrs::default());
    let generated = Mk4MatMulKernel::PORTABLE.generate(&ctx).unwrap();

    assert_eq!(generated.kernel.symbol, "GI_kernel_mk4_matmul_nchw44_f32_identity");
    assert!(generated.kernel.body.contains("GI_fp32_mk4_matmul((const float*)a->ptr"));
    assert_eq!(generated.dependencies, vec![mk4_matmul::helper_unit(LaneIsa::Portable)]);
    assert!(!generated.kernel.body.contains("bias"));
}

#[test]
fn test_naive_matmul_transposes() {
    let ctx = matmul_ctx(TensorFormat::Nchw, MatMulAttrs { transpose_a: true, transpose_b: true });
    let generated = NaiveMatMulKernel.generate(&ctx).unwrap();

    assert_eq!(generated.kernel.symbol, "GI_kernel_naive_matmul_tt_nchw_f32_identity");
    assert!(generated.kernel.body.contains("v += a[k * M + m] * b[n * K + k];"));
    assert!(generated.kernel.body.contains("const int M = inputs[0]->layout.dims[1];"));
    let deduce = generated.deduce_shape.unwrap();
    assert_eq!(deduce.symbol, "GI_deduce_matmul_tt");
    assert!(deduce.body.contains("dst->dims[0] = a.dims[1];"));
    assert!(deduce.body.contains("dst->dims[1] = b.dims[0];"));
}
