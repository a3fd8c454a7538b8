//! Element types of generated kernels.
//!
//! Only the types the kernel generators can specialise for are listed here.
//! Each type knows its byte width, its C spelling in generated sources and the
//! short tag embedded in generated symbol names.

#[cfg(feature = "proptest")]
pub mod proptest_gen;


/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::Display)]
pub enum ScalarDType {
    Int8,
    Int16,
    Int32,
    Float16,
    Float32,
}

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Float16 => 2,
            Self::Float32 => 4,
        }
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32)
    }

    /// Spelling of the type in generated C sources.
    pub const fn c_style(&self) -> &'static str {
        match self {
            Self::Int8 => "int8_t",
            Self::Int16 => "int16_t",
            Self::Int32 => "int32_t",
            Self::Float16 => "__fp16",
            Self::Float32 => "float",
        }
    }

    /// Tag used inside generated symbol names (`f32`, `i8`, ...).
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Float16 => "f16",
            Self::Float32 => "f32",
        }
    }
}
