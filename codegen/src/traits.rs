//! Core traits for kernel generation.

use enumset::EnumSet;

use crate::{GenerationContext, GeneratedKernel, InstructionSet, Result};

/// Generator of one kernel implementation.
///
/// Implementers specialise a fixed algorithm for a concrete
/// [`GenerationContext`] and emit C source units for the runtime.
pub trait KernelGenerator {
    /// Stable candidate name, e.g. `Arm64_winograd_f23_mk4`.
    fn name(&self) -> String;

    /// Capability predicate: whether this implementation can serve `ctx`.
    fn is_available(&self, ctx: &GenerationContext) -> bool;

    /// Symbol of the kernel unit generated for `ctx`.
    ///
    /// Identical contexts map to identical symbols.
    fn kernel_symbol(&self, ctx: &GenerationContext) -> String;

    /// Emit every unit for `ctx`.
    ///
    /// Only meaningful when [`is_available`](Self::is_available) accepted `ctx`.
    fn generate(&self, ctx: &GenerationContext) -> Result<GeneratedKernel>;

    /// Instruction-set features the generated units rely on.
    fn instructions(&self) -> EnumSet<InstructionSet>;
}
