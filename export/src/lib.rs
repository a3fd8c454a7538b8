//! Packaging of generated kernels for the tiny runtime.
//!
//! A [`Config`] accumulates the units of every requested operator; the
//! [`KernelExporter`] writes them out as a self-contained artifact directory.
//!
//! # Usage
//!
//! ```ignore
//! use tinykern_export::{Config, ExportOptions, KernelExporter};
//!
//! let mut config = Config::new();
//! config.request(KernelType::ConvKernel, Architecture::Arm64, &ctx, &SelectOptions::from_env())?;
//! KernelExporter::new(ExportOptions::from_env()).export(&config, config.used_instructions(), out_dir)?;
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod loader;
pub mod options;


pub use config::Config;
pub use error::*;
pub use exporter::{ExportSummary, KernelExporter, LOADER_SYMBOL, TABLES, TableSpec, guard_line};
pub use loader::{KernelLoader, KernelTables, TableEntry};
pub use options::{DEFAULT_VERSION, ExportOptions};
