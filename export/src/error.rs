//! Error types for exporting kernel packages.

use std::path::PathBuf;

use snafu::Snafu;
use tinykern_codegen::FuncCategory;

/// Result type for export operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while accumulating or exporting a [`Config`](crate::Config).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Output directory could not be created.
    #[snafu(display("Failed to create export directory '{}': {source}", path.display()))]
    CreateDir { path: PathBuf, source: std::io::Error },

    /// Artifact could not be written. The directory is unusable afterwards.
    #[snafu(display("Failed to write '{}': {source}", path.display()))]
    WriteArtifact { path: PathBuf, source: std::io::Error },

    /// Two different units claim the same symbol.
    #[snafu(display("Duplicate symbol '{symbol}' ({category} unit differs from the registered one)"))]
    DuplicateSymbol { symbol: String, category: FuncCategory },

    /// Kernel generation failed for a requested operator.
    #[snafu(display("Codegen error: {source}"))]
    Codegen { source: tinykern_codegen::Error },
}
