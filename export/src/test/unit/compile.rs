//! Compiles an exported package with the host C compiler.
//!
//! Skipped when no compiler is found; set `CC` to pick one.

use std::fs;
use std::path::Path;
use std::process::Command;

use tinykern_codegen::{
    Activation, Architecture, ConvAttrs, GenerationContext, KernelType, MatMulAttrs, OperatorAttrs, SelectOptions,
    TensorFormat,
};

use crate::{Config, ExportOptions, KernelExporter};

const DATA_STRUCT_H: &str = r#"#ifndef DATA_STRUCT_H
#define DATA_STRUCT_H
#include <stddef.h>
#include <stdint.h>

#define MAX_DIM 7

typedef enum { TinyNNSuccess = 0, TinyNNError = 1 } TinyNNStatus;
typedef enum { TinyNN_FLOAT = 0, TinyNN_FLOAT16, TinyNN_INT, TinyNN_INT8, TinyNN_INT16 } TinyNNDType;

typedef struct {
    TinyNNDType type_enum;
} DType;

typedef struct {
    int nr_dim;
    int dims[MAX_DIM];
    int stride[MAX_DIM];
} Layout;

typedef struct {
    char* name;
    DType dtype;
    Layout layout;
    void* ptr;
} Tensor;

typedef struct {
    void* ptr;
    size_t size;
} Workspace;

typedef struct {
    int nr_thread;
} RuntimeOpt;

typedef TinyNNStatus (*KernelFunc)(Tensor** inputs, int nr_input, Tensor** outputs, int nr_output,
                                   const Workspace* workspace, const RuntimeOpt* opt);
typedef TinyNNStatus (*InitFunc)(Tensor* inputs, int nr_input, Tensor* out_weights, int* nr_out_weight,
                                 const RuntimeOpt* opt);
typedef TinyNNStatus (*WorkspaceFunc)(Tensor* inputs, int nr_input, size_t* workspace);
typedef TinyNNStatus (*DeduceFunc)(Tensor** inputs, int nr_input, Tensor** outputs, int nr_output);

#endif
"#;

fn compiler() -> Option<String> {
    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let found = Command::new(&cc).arg("--version").output().is_ok_and(|out| out.status.success());
    found.then_some(cc)
}

fn conv(format: TensorFormat, attrs: ConvAttrs) -> GenerationContext {
    GenerationContext::builder().format(format).attrs(OperatorAttrs::Conv(attrs)).build()
}

/// Portable units only, so the package compiles the same on every host.
fn portable_config() -> Config {
    let strided = ConvAttrs::builder().kernel_h(3).kernel_w(3).stride_h(2).stride_w(2).pad_h(1).pad_w(1).build();
    let fused = GenerationContext::builder()
        .format(TensorFormat::Nchw44)
        .activation(Activation::Relu)
        .has_bias(true)
        .attrs(OperatorAttrs::Conv(ConvAttrs::square(3, 1)))
        .build();
    let requests = [
        (KernelType::ConvKernel, conv(TensorFormat::Nchw44, ConvAttrs::square(3, 1)), true),
        (KernelType::ConvKernel, fused, true),
        (KernelType::ConvKernel, conv(TensorFormat::Nchw44, ConvAttrs::square(3, 1)), false),
        (KernelType::ConvKernel, conv(TensorFormat::Nchw44, strided), true),
        (KernelType::ConvKernel, conv(TensorFormat::Nchw, ConvAttrs::square(3, 1)), true),
        (
            KernelType::MatMulKernel,
            GenerationContext::builder()
                .format(TensorFormat::Nchw44)
                .attrs(OperatorAttrs::MatMul(MatMulAttrs::default()))
                .build(),
            true,
        ),
        (
            KernelType::MatMulKernel,
            GenerationContext::builder()
                .attrs(OperatorAttrs::MatMul(MatMulAttrs { transpose_a: true, transpose_b: false }))
                .build(),
            true,
        ),
    ];

    let mut config = Config::new();
    for (kernel_type, ctx, allow_winograd) in requests {
        config.request(kernel_type, Architecture::BareMetal, &ctx, &SelectOptions { allow_winograd }).unwrap();
    }
    config
}

fn syntax_check(cc: &str, dir: &Path, file: &Path) {
    let output = Command::new(cc)
        .args(["-std=gnu99", "-fsyntax-only", "-I"])
        .arg(dir)
        .arg(file)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{} failed to compile:\n{}\n{}",
        file.display(),
        String::from_utf8_lossy(&output.stderr),
        fs::read_to_string(file).unwrap_or_default()
    );
}

#[test]
fn test_exported_package_compiles() {
    let Some(cc) = compiler() else {
        eprintln!("no C compiler found, skipping");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let config = portable_config();
    assert!(config.kernels().len() >= 6);

    let summary = KernelExporter::new(ExportOptions::default())
        .export(&config, config.used_instructions(), dir.path())
        .unwrap();
    fs::write(dir.path().join("data_struct.h"), DATA_STRUCT_H).unwrap();

    let sources: Vec<_> = summary.files.iter().filter(|path| path.extension().is_some_and(|ext| ext == "c")).collect();
    assert_eq!(sources.len(), config.len() + 1);
    for source in sources {
        syntax_check(&cc, dir.path(), source);
    }
}
