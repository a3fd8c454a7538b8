//! Target architectures and instruction-set feature tags.

use enumset::EnumSetType;

/// Target ISA family a kernel package is generated for.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(EnumSetType)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Architecture {
    #[strum(serialize = "armv7")]
    Armv7,
    #[strum(serialize = "arm64")]
    Arm64,
    #[strum(serialize = "x86")]
    X86,
    /// Portable C with no ISA assumptions.
    #[strum(serialize = "baremetal")]
    BareMetal,
}

/// Architecture families sharing one registry layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchFamily {
    Arm,
    X86,
    Generic,
}

impl Architecture {
    pub const fn family(&self) -> ArchFamily {
        match self {
            Self::Armv7 | Self::Arm64 => ArchFamily::Arm,
            Self::X86 => ArchFamily::X86,
            Self::BareMetal => ArchFamily::Generic,
        }
    }

    /// Prefix used in generated symbol names.
    pub const fn symbol_prefix(&self) -> &'static str {
        match self {
            Self::Armv7 => "Armv7",
            Self::Arm64 => "Arm64",
            Self::X86 => "X86",
            Self::BareMetal => "GI",
        }
    }
}

/// Instruction-set features a generated unit may require.
///
/// Rendered as `ENABLE_INST_<NAME>` in the feature-switch header.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(EnumSetType)]
#[derive(strum::Display, strum::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionSet {
    Neon,
    Dot,
    Mmla,
    Sse,
    Avx2,
}
