//! Calling convention between generated units and the tiny runtime.
//!
//! Every table entry returns [`COMMON_RET`]. Signatures are rendered without
//! the return type; the exporter prepends it when declaring them.

/// Return type shared by kernel, init, workspace and shape-deduction units.
pub const COMMON_RET: &str = "TinyNNStatus";

pub fn kernel_signature(symbol: &str) -> String {
    format!(
        "{symbol}(Tensor** inputs, int nr_input, Tensor** outputs, int nr_output, \
         const Workspace* workspace, const RuntimeOpt* opt)"
    )
}

pub fn init_signature(symbol: &str) -> String {
    format!(
        "{symbol}(Tensor* inputs, int nr_input, Tensor* out_weights, int* nr_out_weight, \
         const RuntimeOpt* opt)"
    )
}

pub fn workspace_signature(symbol: &str) -> String {
    format!("{symbol}(Tensor* inputs, int nr_input, size_t* workspace)")
}

pub fn deduce_signature(symbol: &str) -> String {
    format!("{symbol}(Tensor** inputs, int nr_input, Tensor** outputs, int nr_output)")
}

/// Symbols of the companion units derived from a kernel symbol.
pub fn init_symbol(kernel_symbol: &str) -> String {
    format!("{kernel_symbol}_init")
}

pub fn workspace_symbol(kernel_symbol: &str) -> String {
    format!("{kernel_symbol}_workspace")
}
