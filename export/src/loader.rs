//! Owned model of the run-once registration routine.
//!
//! Mirrors what the generated loader does at runtime: the first `load`
//! fills the tables from the config in order, later calls return the same
//! tables untouched.

use once_cell::sync::OnceCell;
use tinykern_codegen::{FuncCategory, Guard};

use crate::config::Config;

/// One table slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub symbol: String,
    pub guard: Option<Guard>,
}

/// The four runtime tables, indexed like the generated arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelTables {
    pub kernels: Vec<TableEntry>,
    pub init_kernels: Vec<TableEntry>,
    pub workspace_func: Vec<TableEntry>,
    pub deduce_func: Vec<TableEntry>,
}

impl KernelTables {
    pub fn from_config(config: &Config) -> Self {
        let entries = |category: FuncCategory| -> Vec<TableEntry> {
            config
                .units(category)
                .iter()
                .map(|unit| TableEntry { symbol: unit.symbol.clone(), guard: unit.guard.clone() })
                .collect()
        };
        Self {
            kernels: entries(FuncCategory::Kernel),
            init_kernels: entries(FuncCategory::Init),
            workspace_func: entries(FuncCategory::Workspace),
            deduce_func: entries(FuncCategory::DeduceShape),
        }
    }

    /// Table for a category; helpers have no table.
    pub fn table(&self, category: FuncCategory) -> Option<&[TableEntry]> {
        match category {
            FuncCategory::Kernel => Some(&self.kernels),
            FuncCategory::Init => Some(&self.init_kernels),
            FuncCategory::Workspace => Some(&self.workspace_func),
            FuncCategory::DeduceShape => Some(&self.deduce_func),
            FuncCategory::Internal | FuncCategory::NoRuntimeDep => None,
        }
    }
}

/// Initialise-once loader over a finished config.
///
/// A concurrent first call is serialised by the cell; the generated C loader
/// offers no such guarantee.
#[derive(Debug)]
pub struct KernelLoader<'a> {
    config: &'a Config,
    tables: OnceCell<KernelTables>,
}

impl<'a> KernelLoader<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, tables: OnceCell::new() }
    }

    pub fn is_loaded(&self) -> bool {
        self.tables.get().is_some()
    }

    pub fn load(&self) -> &KernelTables {
        self.tables.get_or_init(|| {
            tracing::debug!(nr_kernels = self.config.kernels().len(), "populating kernel tables");
            KernelTables::from_config(self.config)
        })
    }

    /// Consume the loader, yielding the owned tables.
    pub fn into_tables(self) -> KernelTables {
        let config = self.config;
        self.tables.into_inner().unwrap_or_else(|| KernelTables::from_config(config))
    }
}
