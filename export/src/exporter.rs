//! Kernel package exporter.
//!
//! Turns a [`Config`] and the instruction tags it uses into an artifact
//! directory: the table header, the registration source, one source file per
//! unit, the instruction switch header and the version stamp. Table order is
//! copied verbatim from the config into both the header and the registration.

use std::fs;
use std::path::{Path, PathBuf};

use enumset::EnumSet;
use snafu::ResultExt;
use tinykern_codegen::runtime_abi::COMMON_RET;
use tinykern_codegen::{FuncCategory, FuncUnit, InstructionSet};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CreateDirSnafu, Result, WriteArtifactSnafu};
use crate::options::ExportOptions;

/// One runtime function table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub category: FuncCategory,
    pub array: &'static str,
    pub func_type: &'static str,
    pub size_macro: &'static str,
}

/// The four runtime tables, in registration order.
pub const TABLES: [TableSpec; 4] = [
    TableSpec { category: FuncCategory::Kernel, array: "kernels", func_type: "KernelFunc", size_macro: "NR_KERNELS" },
    TableSpec { category: FuncCategory::Init, array: "init_kernels", func_type: "InitFunc", size_macro: "NR_INIT" },
    TableSpec {
        category: FuncCategory::Workspace,
        array: "workspace_func",
        func_type: "WorkspaceFunc",
        size_macro: "NR_WORKSPACE",
    },
    TableSpec {
        category: FuncCategory::DeduceShape,
        array: "deduce_func",
        func_type: "DeduceFunc",
        size_macro: "NR_DEDUCE_SHAPE",
    },
];

pub const LOADER_SYMBOL: &str = "load_kernel_init_function";

/// Guard text on its own line: a trailing newline is appended when missing.
pub fn guard_line(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') { text.to_string() } else { format!("{text}\n") }
}

/// Paths written by one export, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct KernelExporter {
    options: ExportOptions,
}

impl KernelExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn banner(&self) -> String {
        format!("// Generated by tinykern {}. Do not edit.\n", self.options.version)
    }

    /// Table sizes, forward declarations and the loader prototype.
    pub fn render_header(&self, config: &Config) -> String {
        let mut out = self.banner();
        out.push_str("#ifndef TINYKERN_KERNELS_H\n#define TINYKERN_KERNELS_H\n\n");
        out.push_str("#include \"data_struct.h\"\n#include \"stdint.h\"\n#include \"string.h\"\n\n");
        for table in &TABLES {
            out.push_str(&format!("#define {} ({})\n", table.size_macro, config.units(table.category).len()));
        }
        out.push_str("\n#define KERNEL_MARK_USED_VAR(x) ((void)(x))\n\n");
        for table in &TABLES {
            out.push_str(&format!("extern {} {}[{}];\n", table.func_type, table.array, table.size_macro));
        }
        out.push('\n');
        for table in &TABLES {
            for unit in config.units(table.category) {
                out.push_str(&guard_line(unit.guard_begin()));
                out.push_str(&format!("{COMMON_RET} {};\n", unit.signature));
                out.push_str(&guard_line(unit.guard_end()));
            }
        }
        out.push_str(&format!("\nvoid {LOADER_SYMBOL}(void);\n\n#endif\n"));
        out
    }

    /// Table definitions and the run-once loader.
    ///
    /// The loader is not safe for a concurrent first call.
    pub fn render_registration(&self, config: &Config) -> String {
        let mut out = self.banner();
        out.push_str(&format!("\n#include \"{}\"\n\n", self.options.header_name));
        for table in &TABLES {
            out.push_str(&format!("{} {}[{}];\n", table.func_type, table.array, table.size_macro));
        }
        out.push_str(&format!("\nvoid {LOADER_SYMBOL}(void) {{\n"));
        out.push_str("    static int done = 0;\n    if (done) {\n        return;\n    }\n");
        for table in &TABLES {
            for (slot, unit) in config.units(table.category).iter().enumerate() {
                out.push_str(&registration_line(table, slot, unit));
            }
        }
        out.push_str("    done = 1;\n}\n");
        out
    }

    /// Source file of one unit: banner, the runtime include unless the unit
    /// is standalone, then `guard_begin + body + guard_end` verbatim.
    pub fn render_unit(&self, unit: &FuncUnit) -> String {
        let mut out = self.banner();
        if !unit.standalone {
            out.push_str(&format!("#include \"{}\"\n", self.options.header_name));
        }
        out.push_str(&unit.guarded_body());
        out
    }

    /// One `ENABLE_INST_*` macro per tag.
    pub fn render_inst_switch(&self, instructions: EnumSet<InstructionSet>) -> String {
        let mut out = self.banner();
        for inst in instructions {
            out.push_str(&format!("#define ENABLE_INST_{inst} 1\n"));
        }
        out
    }

    /// Write every artifact into `dir`, creating it when missing.
    ///
    /// Stops at the first failed write; the directory must then be discarded.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn export(
        &self,
        config: &Config,
        instructions: EnumSet<InstructionSet>,
        dir: &Path,
    ) -> Result<ExportSummary> {
        fs::create_dir_all(dir).context(CreateDirSnafu { path: dir })?;
        let mut summary = ExportSummary::default();

        write_artifact(&mut summary, dir.join(&self.options.header_name), &self.render_header(config))?;
        write_artifact(&mut summary, dir.join(&self.options.inst_switch_name), &self.render_inst_switch(instructions))?;
        write_artifact(&mut summary, dir.join(&self.options.registration_name), &self.render_registration(config))?;
        for unit in config.iter() {
            let path = dir.join(self.options.unit_file_name(&unit.symbol));
            write_artifact(&mut summary, path, &self.render_unit(unit))?;
        }
        write_artifact(&mut summary, dir.join(&self.options.version_name), &self.options.version)?;

        info!(
            nr_kernels = config.kernels().len(),
            nr_init = config.inits().len(),
            nr_workspace = config.workspaces().len(),
            nr_deduce_shape = config.deduce_shapes().len(),
            files = summary.files.len(),
            "kernel package exported"
        );
        Ok(summary)
    }
}

fn registration_line(table: &TableSpec, slot: usize, unit: &FuncUnit) -> String {
    format!(
        "{}{}[{slot}] = {};\n{}",
        guard_line(unit.guard_begin()),
        table.array,
        unit.symbol,
        guard_line(unit.guard_end())
    )
}

fn write_artifact(summary: &mut ExportSummary, path: PathBuf, contents: &str) -> Result<()> {
    fs::write(&path, contents).context(WriteArtifactSnafu { path: &path })?;
    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
    summary.files.push(path);
    Ok(())
}
