//! Generated function units and their metadata.

use enumset::EnumSet;

use crate::InstructionSet;

/// Operator kinds the front-end can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumIter)]
pub enum KernelType {
    ConvKernel,
    MatMulKernel,
    PoolingKernel,
}

/// Role of a generated unit in the exported package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumIter)]
pub enum FuncCategory {
    Kernel,
    Init,
    Workspace,
    DeduceShape,
    /// Helper called by other units, never placed in a table.
    Internal,
    /// Kernel usable without the runtime header, never placed in a table.
    NoRuntimeDep,
}

impl FuncCategory {
    /// Whether units of this category are emitted without the runtime header
    /// unless told otherwise.
    pub const fn standalone_by_default(&self) -> bool {
        matches!(self, Self::Internal | Self::NoRuntimeDep)
    }
}

/// Conditional-compilation bracket around a unit.
///
/// Begin and end always travel together; a unit either has both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Guard {
    pub begin: String,
    pub end: String,
}

impl Guard {
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self { begin: begin.into(), end: end.into() }
    }

    /// `#if defined(MACRO)` ... `#endif` bracket.
    pub fn defined(macro_name: &str) -> Self {
        Self::new(format!("#if defined({macro_name})\n"), "#endif\n")
    }
}

/// One generated function: symbol, C signature (without return type) and body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncUnit {
    pub symbol: String,
    pub signature: String,
    pub body: String,
    pub guard: Option<Guard>,
    pub category: FuncCategory,
    /// Emit without including the runtime header.
    pub standalone: bool,
    pub instructions: EnumSet<InstructionSet>,
}

impl FuncUnit {
    pub fn new(
        category: FuncCategory,
        symbol: impl Into<String>,
        signature: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            signature: signature.into(),
            body: body.into(),
            guard: None,
            category,
            standalone: category.standalone_by_default(),
            instructions: EnumSet::empty(),
        }
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_instructions(mut self, instructions: EnumSet<InstructionSet>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn guard_begin(&self) -> &str {
        self.guard.as_ref().map_or("", |g| g.begin.as_str())
    }

    pub fn guard_end(&self) -> &str {
        self.guard.as_ref().map_or("", |g| g.end.as_str())
    }

    /// `guard_begin + body + guard_end`, byte for byte.
    pub fn guarded_body(&self) -> String {
        format!("{}{}{}", self.guard_begin(), self.body, self.guard_end())
    }
}

/// Every unit one generator emits for one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKernel {
    /// Name of the candidate that produced the units.
    pub generator: String,
    pub kernel: FuncUnit,
    pub init: FuncUnit,
    pub workspace: FuncUnit,
    pub deduce_shape: Option<FuncUnit>,
    /// Helpers the kernel calls, e.g. a batched matmul micro-kernel.
    pub dependencies: Vec<FuncUnit>,
}

impl GeneratedKernel {
    /// All units in emission order.
    pub fn units(&self) -> impl Iterator<Item = &FuncUnit> {
        [&self.kernel, &self.init, &self.workspace]
            .into_iter()
            .chain(self.deduce_shape.iter())
            .chain(self.dependencies.iter())
    }

    pub fn instructions(&self) -> EnumSet<InstructionSet> {
        self.units().fold(EnumSet::empty(), |acc, unit| acc | unit.instructions)
    }
}
