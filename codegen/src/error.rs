//! Error types for kernel generation.

use snafu::Snafu;

use crate::{Architecture, KernelType};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while selecting or generating a kernel.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No registered candidate accepts the requested context.
    #[snafu(display("unsupported kernel: no {kernel_type} candidate accepts the context on {arch}"))]
    UnsupportedKernel { kernel_type: KernelType, arch: Architecture },

    /// Kernel size / output block pairing the Winograd construction cannot realise.
    #[snafu(display("invalid Winograd parameters: F({output_block}, {kernel_size})"))]
    InvalidWinograd { kernel_size: u32, output_block: u32 },

    /// Context lacks attributes the generator needs.
    #[snafu(display("missing {what} in generation context"))]
    MissingAttrs { what: String },

    /// Convolution attributes with a zero kernel extent, stride, dilation or group.
    #[snafu(display("malformed convolution attributes: {tag}"))]
    MalformedConv { tag: String },
}
