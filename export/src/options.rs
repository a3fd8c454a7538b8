//! Export configuration.

use bon::Builder;

/// Version stamped into exported packages unless overridden.
pub const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Artifact names and the version stamp of an export.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ExportOptions {
    #[builder(into, default = "kernels.h".to_string())]
    pub header_name: String,
    #[builder(into, default = "kernels.c".to_string())]
    pub registration_name: String,
    #[builder(into, default = "runtime_inst_switch.h".to_string())]
    pub inst_switch_name: String,
    #[builder(into, default = "tinykern_version.txt".to_string())]
    pub version_name: String,
    /// Extension of per-unit source files.
    #[builder(into, default = "c".to_string())]
    pub source_extension: String,
    #[builder(into, default = DEFAULT_VERSION.to_string())]
    pub version: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExportOptions {
    /// Defaults with environment overrides.
    ///
    /// # Environment Variables
    ///
    /// * `TINYKERN_VERSION` - version string written to the stamp file
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(version) = var("TINYKERN_VERSION")
            && !version.trim().is_empty()
        {
            options.version = version.trim().to_string();
        }
        options
    }

    /// File name of a unit's source file.
    pub fn unit_file_name(&self, symbol: &str) -> String {
        format!("{symbol}.{}", self.source_extension)
    }
}
