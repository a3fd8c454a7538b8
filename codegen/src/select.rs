//! Caller-side selection over catalog candidates.

use snafu::OptionExt;
use tracing::debug;

use crate::arch::Architecture;
use crate::catalog::catalog;
use crate::error::{Result, UnsupportedKernelSnafu};
use crate::kernels::KernelImpl;
use crate::traits::KernelGenerator;
use crate::types::{GeneratedKernel, KernelType};
use crate::GenerationContext;

/// Policy knobs applied while walking the candidate list.
///
/// The catalog itself is never altered; filtered candidates are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    pub allow_winograd: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self { allow_winograd: true }
    }
}

impl SelectOptions {
    /// Read options from the environment.
    ///
    /// * `TINYKERN_NO_WINOGRAD=1` - skip Winograd candidates
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let no_winograd = var("TINYKERN_NO_WINOGRAD").is_some_and(|v| v.trim() == "1");
        Self { allow_winograd: !no_winograd }
    }

    fn admits(&self, candidate: &KernelImpl) -> bool {
        self.allow_winograd || !candidate.is_winograd()
    }
}

/// First candidate whose predicate accepts `ctx`.
pub fn select_candidate(
    kernel_type: KernelType,
    arch: Architecture,
    ctx: &GenerationContext,
    options: &SelectOptions,
) -> Result<KernelImpl> {
    catalog()
        .lookup(kernel_type, arch)
        .into_iter()
        .find(|candidate| {
            if !options.admits(candidate) {
                debug!(candidate = %candidate.name(), "filtered by select options");
                return false;
            }
            let accepted = candidate.is_available(ctx);
            debug!(candidate = %candidate.name(), accepted, "capability check");
            accepted
        })
        .context(UnsupportedKernelSnafu { kernel_type, arch })
}

/// Select a candidate and generate its units for `ctx`.
pub fn select(
    kernel_type: KernelType,
    arch: Architecture,
    ctx: &GenerationContext,
    options: &SelectOptions,
) -> Result<GeneratedKernel> {
    let candidate = select_candidate(kernel_type, arch, ctx, options)?;
    debug!(%kernel_type, %arch, generator = %candidate.name(), "selected kernel");
    candidate.generate(ctx)
}
