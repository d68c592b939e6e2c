//! Contract between the analysis and the instruction decoder
//!
//! The analysis never decodes machine code itself. Whatever decoder the host runtime embeds is
//! wrapped behind [`InstDescriptor`], which exposes only the static properties the FLOP model
//! needs.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{ElementType, InstCategory, OperandInfo};

/// Instruction form: the most specific static identity of an instruction (mnemonic plus operand
/// shape). It is the key used both for classification and for counting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IForm(pub u32);

impl Display for IForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Boolean attributes the decoder can report for an instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstAttribute {
    /// The instruction operates on the lowest lane only
    #[serde(rename = "SIMD_SCALAR")]
    SimdScalar,
    /// The instruction is predicated by a mask register
    #[serde(rename = "MASKOP")]
    MaskOp,
}

/// Decoded instruction, as seen by the analysis
pub trait InstDescriptor {
    /// Instruction form identity
    fn iform(&self) -> IForm;

    /// Instruction form name, e.g. `VFMADD231PS_YMMqq_YMMqq_YMMqq`
    fn iform_name(&self) -> &str;

    /// Instruction class (mnemonic), e.g. `VFMADD231PS`
    fn iclass(&self) -> &str;

    fn category(&self) -> InstCategory;

    /// ISA extension name, e.g. `FMA` or `AVX512EVEX`
    fn extension(&self) -> &str;

    /// Number of decoded operands
    fn noperands(&self) -> usize;

    fn operand_element_size_bits(&self, index: usize) -> u32;

    fn operand_element_type(&self, index: usize) -> ElementType;

    fn operand_elements(&self, index: usize) -> u32;

    fn attribute(&self, attribute: InstAttribute) -> bool;

    /// Returns the shape of operand `index`
    fn operand(&self, index: usize) -> OperandInfo {
        OperandInfo::new(
            self.operand_element_size_bits(index),
            self.operand_element_type(index),
            self.operand_elements(index),
        )
    }
}
