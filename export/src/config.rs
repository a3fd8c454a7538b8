//! Accumulated function units of one export run.

use std::collections::HashMap;

use enumset::EnumSet;
use snafu::{ResultExt, ensure};
use tinykern_codegen::{
    Architecture, FuncCategory, FuncUnit, GeneratedKernel, GenerationContext, InstructionSet, KernelType,
    SelectOptions, select,
};
use tracing::warn;

use crate::error::{CodegenSnafu, DuplicateSymbolSnafu, Result};

/// Units per category, in insertion order.
///
/// Position in a table category is the runtime table index, so lists are
/// never reordered. Symbols are unique across all categories.
#[derive(Debug, Clone, Default)]
pub struct Config {
    kernels: Vec<FuncUnit>,
    inits: Vec<FuncUnit>,
    workspaces: Vec<FuncUnit>,
    deduce_shapes: Vec<FuncUnit>,
    internals: Vec<FuncUnit>,
    no_runtime_deps: Vec<FuncUnit>,
    index: HashMap<String, (FuncCategory, usize)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self, category: FuncCategory) -> &[FuncUnit] {
        match category {
            FuncCategory::Kernel => &self.kernels,
            FuncCategory::Init => &self.inits,
            FuncCategory::Workspace => &self.workspaces,
            FuncCategory::DeduceShape => &self.deduce_shapes,
            FuncCategory::Internal => &self.internals,
            FuncCategory::NoRuntimeDep => &self.no_runtime_deps,
        }
    }

    fn units_mut(&mut self, category: FuncCategory) -> &mut Vec<FuncUnit> {
        match category {
            FuncCategory::Kernel => &mut self.kernels,
            FuncCategory::Init => &mut self.inits,
            FuncCategory::Workspace => &mut self.workspaces,
            FuncCategory::DeduceShape => &mut self.deduce_shapes,
            FuncCategory::Internal => &mut self.internals,
            FuncCategory::NoRuntimeDep => &mut self.no_runtime_deps,
        }
    }

    pub fn kernels(&self) -> &[FuncUnit] {
        &self.kernels
    }

    pub fn inits(&self) -> &[FuncUnit] {
        &self.inits
    }

    pub fn workspaces(&self) -> &[FuncUnit] {
        &self.workspaces
    }

    pub fn deduce_shapes(&self) -> &[FuncUnit] {
        &self.deduce_shapes
    }

    /// Every unit, category by category.
    pub fn iter(&self) -> impl Iterator<Item = &FuncUnit> {
        self.kernels
            .iter()
            .chain(&self.inits)
            .chain(&self.workspaces)
            .chain(&self.deduce_shapes)
            .chain(&self.internals)
            .chain(&self.no_runtime_deps)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    /// `Ok(true)` when `unit` is new, `Ok(false)` when an identical unit is
    /// already registered under its symbol.
    fn check(&self, unit: &FuncUnit) -> Result<bool> {
        let Some(&(category, slot)) = self.index.get(&unit.symbol) else {
            return Ok(true);
        };
        ensure!(
            self.units(category)[slot] == *unit,
            DuplicateSymbolSnafu { symbol: unit.symbol.clone(), category: unit.category }
        );
        Ok(false)
    }

    /// Append one unit to its category list.
    ///
    /// Returns whether the unit was added; an identical unit under an existing
    /// symbol is folded into the existing entry.
    pub fn push(&mut self, unit: FuncUnit) -> Result<bool> {
        if !self.check(&unit)? {
            warn!(symbol = %unit.symbol, category = %unit.category, "identical unit already registered");
            return Ok(false);
        }
        let slot = self.units(unit.category).len();
        self.index.insert(unit.symbol.clone(), (unit.category, slot));
        self.units_mut(unit.category).push(unit);
        Ok(true)
    }

    /// Append every unit of a generated kernel.
    ///
    /// All units are checked before any is added, so a conflict leaves the
    /// config unchanged.
    pub fn add(&mut self, generated: GeneratedKernel) -> Result<()> {
        let mut batch: HashMap<&str, &FuncUnit> = HashMap::new();
        for unit in generated.units() {
            self.check(unit)?;
            if let Some(&seen) = batch.get(unit.symbol.as_str()) {
                ensure!(
                    seen == unit,
                    DuplicateSymbolSnafu { symbol: unit.symbol.clone(), category: unit.category }
                );
            }
            batch.insert(&unit.symbol, unit);
        }
        let GeneratedKernel { kernel, init, workspace, deduce_shape, dependencies, .. } = generated;
        for unit in [kernel, init, workspace].into_iter().chain(deduce_shape).chain(dependencies) {
            self.push(unit)?;
        }
        Ok(())
    }

    /// Select, generate and add the units for one operator request.
    pub fn request(
        &mut self,
        kernel_type: KernelType,
        arch: Architecture,
        ctx: &GenerationContext,
        options: &SelectOptions,
    ) -> Result<()> {
        let generated = select(kernel_type, arch, ctx, options).context(CodegenSnafu)?;
        self.add(generated)
    }

    /// Union of the instruction tags of every unit.
    pub fn used_instructions(&self) -> EnumSet<InstructionSet> {
        self.iter().fold(EnumSet::empty(), |acc, unit| acc | unit.instructions)
    }
}
