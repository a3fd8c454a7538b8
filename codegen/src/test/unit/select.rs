use proptest::prelude::*;
use test_case::test_case;
use tinykern_dtype::ScalarDType;
use tinykern_dtype::proptest_gen::scalar_generator;

use super::{conv_ctx, matmul_ctx};
use crate::{
    Architecture, ConvAttrs, Error, GenerationContext, KernelGenerator, KernelType, MatMulAttrs, OperatorAttrs,
    SelectOptions, TensorFormat, select, select_candidate,
};

#[test_case(Architecture::Arm64, "Arm64_winograd_f23_mk4"; "arm64")]
#[test_case(Architecture::Armv7, "ArmCommon_winograd_f23_mk4"; "armv7")]
#[test_case(Architecture::X86, "GI_winograd_f23_mk4"; "x86")]
#[test_case(Architecture::BareMetal, "GI_winograd_f23_mk4"; "baremetal")]
fn test_winograd_wins_3x3(arch: Architecture, expected: &str) {
    let ctx = conv_ctx(TensorFormat::Nchw44, ConvAttrs::square(3, 1));
    let generated = select(KernelType::ConvKernel, arch, &ctx, &SelectOptions::default()).unwrap();
    assert_eq!(generated.generator, expected);
}

#[test]
fn test_falls_back_to_direct_conv() {
    let strided = ConvAttrs::builder().kernel_h(3).kernel_w(3).stride_h(2).stride_w(2).pad_h(1).pad_w(1).build();
    let cases = [
        conv_ctx(TensorFormat::Nchw44, ConvAttrs::square(5, 2)),
        conv_ctx(TensorFormat::Nchw44, strided),
        conv_ctx(TensorFormat::Nchw, ConvAttrs::square(3, 1)),
    ];
    for ctx in cases {
        let candidate = select_candidate(KernelType::ConvKernel, Architecture::Arm64, &ctx, &SelectOptions::default());
        assert_eq!(candidate.unwrap().name(), "GI_direct_conv2d");
    }
}

#[test]
fn test_winograd_can_be_disabled() {
    let ctx = conv_ctx(TensorFormat::Nchw44, ConvAttrs::square(3, 1));
    let options = SelectOptions { allow_winograd: false };
    let candidate = select_candidate(KernelType::ConvKernel, Architecture::Arm64, &ctx, &options).unwrap();
    assert_eq!(candidate.name(), "GI_direct_conv2d");
}

#[test_case(None, true; "unset")]
#[test_case(Some("1"), false; "disabled")]
#[test_case(Some(" 1\n"), false; "trimmed")]
#[test_case(Some("0"), true; "zero")]
#[test_case(Some("yes"), true; "other")]
fn test_options_from_vars(value: Option<&str>, allow_winograd: bool) {
    let options = SelectOptions::from_vars(|key| {
        assert_eq!(key, "TINYKERN_NO_WINOGRAD");
        value.map(str::to_string)
    });
    assert_eq!(options.allow_winograd, allow_winograd);
}

#[test]
fn test_default_allows_winograd() {
    assert!(SelectOptions::default().allow_winograd);
}

#[test_case(ConvAttrs::builder().kernel_h(0).kernel_w(3).build(); "zero_kernel_h")]
#[test_case(ConvAttrs::builder().kernel_h(3).kernel_w(0).build(); "zero_kernel_w")]
#[test_case(ConvAttrs::builder().kernel_h(3).kernel_w(3).dilation_h(0).build(); "zero_dilation_h")]
#[test_case(ConvAttrs::builder().kernel_h(3).kernel_w(3).dilation_w(0).build(); "zero_dilation_w")]
#[test_case(ConvAttrs::builder().kernel_h(3).kernel_w(3).stride_h(0).build(); "zero_stride")]
fn test_malformed_conv_is_unsupported(attrs: ConvAttrs) {
    for format in [TensorFormat::Nchw, TensorFormat::Nchw44] {
        let ctx = conv_ctx(format, attrs);
        let err = select(KernelType::ConvKernel, Architecture::BareMetal, &ctx, &SelectOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKernel { kernel_type: KernelType::ConvKernel, .. }));
    }
}

#[test]
fn test_pooling_is_unsupported() {
    let ctx = conv_ctx(TensorFormat::Nchw, ConvAttrs::square(2, 0));
    let err = select(KernelType::PoolingKernel, Architecture::Arm64, &ctx, &SelectOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedKernel { kernel_type: KernelType::PoolingKernel, arch: Architecture::Arm64 }));
}

#[test]
fn test_no_candidate_accepts_int8() {
    let ctx = GenerationContext::builder()
        .dtype(ScalarDType::Int8)
        .attrs(OperatorAttrs::Conv(ConvAttrs::square(3, 1)))
        .build();
    let err = select(KernelType::ConvKernel, Architecture::X86, &ctx, &SelectOptions::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedKernel { .. }));
    assert!(err.to_string().contains("x86"));
}

#[test_case(TensorFormat::Nchw44, "Arm64_fp32_mk4_matmul"; "mk4_neon")]
#[test_case(TensorFormat::Nchw, "GI_naive_matmul"; "row_major")]
fn test_matmul_selection(format: TensorFormat, expected: &str) {
    let ctx = matmul_ctx(format, MatMulAttrs::default());
    let generated = select(KernelType::MatMulKernel, Architecture::Arm64, &ctx, &SelectOptions::default()).unwrap();
    assert_eq!(generated.generator, expected);
}

#[test]
fn test_transposed_mk4_is_unsupported() {
    let ctx = matmul_ctx(TensorFormat::Nchw44, MatMulAttrs { transpose_a: true, transpose_b: false });
    let generated = select(KernelType::MatMulKernel, Architecture::Arm64, &ctx, &SelectOptions::default());
    assert!(matches!(generated, Err(Error::UnsupportedKernel { .. })));
}

proptest! {
    #[test]
    fn only_float32_is_generated(dtype in scalar_generator(), arch in prop_oneof![
        Just(Architecture::Armv7),
        Just(Architecture::Arm64),
        Just(Architecture::X86),
        Just(Architecture::BareMetal),
    ]) {
        let ctx = GenerationContext::builder()
            .dtype(dtype)
            .format(TensorFormat::Nchw44)
            .attrs(OperatorAttrs::Conv(ConvAttrs::square(3, 1)))
            .build();
        let result = select(KernelType::ConvKernel, arch, &ctx, &SelectOptions::default());
        prop_assert_eq!(result.is_ok(), dtype == ScalarDType::Float32);
    }
}
