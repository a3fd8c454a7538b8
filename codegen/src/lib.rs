//! Ahead-of-time kernel generation.
//!
//! For a requested operator on a target architecture this crate picks an
//! implementation from a fixed catalog and specialises it into C source units.
//!
//! # Architecture
//!
//! - **Catalog**: `(KernelType, Architecture)` to ordered [`KernelImpl`] candidates
//! - **Winograd**: four-stage fast convolution strategies over MK4 packs
//! - **Kernels**: generators composing strategies into runtime units
//!
//! # Usage
//!
//! ```ignore
//! use tinykern_codegen::{select, Architecture, GenerationContext, KernelType, SelectOptions};
//!
//! let generated = select(KernelType::ConvKernel, Architecture::Arm64, &ctx, &SelectOptions::default())?;
//! ```

pub mod arch;
pub mod c;
pub mod catalog;
pub mod context;
pub mod error;
pub mod kernels;
pub mod runtime_abi;
pub mod select;
pub mod traits;
pub mod types;
pub mod winograd;


pub use arch::{ArchFamily, Architecture, InstructionSet};
pub use catalog::{KernelCatalog, catalog, lookup};
pub use context::{Activation, ConvAttrs, GenerationContext, MatMulAttrs, OperatorAttrs, TensorFormat};
pub use error::*;
pub use kernels::KernelImpl;
pub use select::{SelectOptions, select, select_candidate};
pub use traits::*;
pub use types::*;
pub use winograd::{StageContext, WinogradStrategy};
