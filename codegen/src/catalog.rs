//! Strategy catalog: `(KernelType, Architecture)` to ordered candidates.
//!
//! Three registry layers are consulted in order: the exact architecture, the
//! architecture family, then the generic layer that applies everywhere.
//! Within a layer, registration order is preference order. The catalog is
//! built once and never mutated afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::arch::{ArchFamily, Architecture};
use crate::kernels::{DirectConvKernel, KernelImpl, Mk4MatMulKernel, NaiveMatMulKernel, WinogradConvKernel};
use crate::types::KernelType;

#[derive(Debug, Default)]
pub struct KernelCatalog {
    exact: HashMap<(KernelType, Architecture), Vec<KernelImpl>>,
    family: HashMap<(KernelType, ArchFamily), Vec<KernelImpl>>,
    generic: HashMap<KernelType, Vec<KernelImpl>>,
}

impl KernelCatalog {
    fn new() -> Self {
        let mut catalog = Self::default();

        catalog.register_exact(KernelType::ConvKernel, Architecture::Arm64, [
            KernelImpl::WinogradConv(WinogradConvKernel::ARM64_F23),
            KernelImpl::WinogradConv(WinogradConvKernel::ARM64_F43),
            KernelImpl::WinogradConv(WinogradConvKernel::ARM64_F63),
        ]);
        catalog.register_exact(KernelType::MatMulKernel, Architecture::Arm64, [KernelImpl::Mk4MatMul(
            Mk4MatMulKernel::ARM64_NEON,
        )]);

        catalog.register_family(KernelType::ConvKernel, ArchFamily::Arm, [KernelImpl::WinogradConv(
            WinogradConvKernel::ARM_COMMON_F23,
        )]);

        catalog.register_generic(KernelType::ConvKernel, [
            KernelImpl::WinogradConv(WinogradConvKernel::GI_F23),
            KernelImpl::DirectConv(DirectConvKernel),
        ]);
        catalog.register_generic(KernelType::MatMulKernel, [
            KernelImpl::Mk4MatMul(Mk4MatMulKernel::PORTABLE),
            KernelImpl::NaiveMatMul(NaiveMatMulKernel),
        ]);

        catalog
    }

    fn register_exact(
        &mut self,
        kernel_type: KernelType,
        arch: Architecture,
        candidates: impl IntoIterator<Item = KernelImpl>,
    ) {
        self.exact.entry((kernel_type, arch)).or_default().extend(candidates);
    }

    fn register_family(
        &mut self,
        kernel_type: KernelType,
        family: ArchFamily,
        candidates: impl IntoIterator<Item = KernelImpl>,
    ) {
        self.family.entry((kernel_type, family)).or_default().extend(candidates);
    }

    fn register_generic(&mut self, kernel_type: KernelType, candidates: impl IntoIterator<Item = KernelImpl>) {
        self.generic.entry(kernel_type).or_default().extend(candidates);
    }

    /// Ordered candidates for `kernel_type` on `arch`.
    ///
    /// An empty result means the pair is unsupported; it is not an error.
    pub fn lookup(&self, kernel_type: KernelType, arch: Architecture) -> Vec<KernelImpl> {
        let exact = self.exact.get(&(kernel_type, arch));
        let family = self.family.get(&(kernel_type, arch.family()));
        let generic = self.generic.get(&kernel_type);
        [exact, family, generic].into_iter().flatten().flatten().copied().collect()
    }
}

static CATALOG: Lazy<KernelCatalog> = Lazy::new(KernelCatalog::new);

/// Get the process-wide catalog.
pub fn catalog() -> &'static KernelCatalog {
    &CATALOG
}

/// Convenience wrapper over [`KernelCatalog::lookup`] on the global catalog.
pub fn lookup(kernel_type: KernelType, arch: Architecture) -> Vec<KernelImpl> {
    catalog().lookup(kernel_type, arch)
}
