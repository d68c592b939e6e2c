//! Per-operand element description of a decoded instruction

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Element type of an instruction operand, as reported by the decoder
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    #[default]
    Invalid,
    Uint,
    Int,
    Single,
    Double,
    LongDouble,
    LongBcd,
    Struct,
    Variable,
    Float16,
    BFloat16,
}

impl ElementType {
    /// Returns true for the IEEE and x87 floating-point element types (half precision included)
    pub const fn is_floating_point(&self) -> bool {
        matches!(
            self,
            Self::Single | Self::Double | Self::LongDouble | Self::Float16 | Self::BFloat16
        )
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Uint => "UINT",
            Self::Int => "INT",
            Self::Single => "SINGLE",
            Self::Double => "DOUBLE",
            Self::LongDouble => "LONGDOUBLE",
            Self::LongBcd => "LONGBCD",
            Self::Struct => "STRUCT",
            Self::Variable => "VARIABLE",
            Self::Float16 => "FLOAT16",
            Self::BFloat16 => "BFLOAT16",
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Shape of one operand: element width, element type and number of elements (SIMD lanes)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OperandInfo {
    /// Width of one element in bits
    pub bits: u32,
    /// Element type
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Number of elements addressed by the operand
    pub elements: u32,
}

impl OperandInfo {
    pub const fn new(bits: u32, element_type: ElementType, elements: u32) -> Self {
        Self { bits, element_type, elements }
    }
}

/// Formats the operand as `bits/type/elements`
impl Display for OperandInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.bits, self.element_type, self.elements)
    }
}
