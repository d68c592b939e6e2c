//! Owned, serializable instruction descriptor
//!
//! [`DecodedInst`] is a plain snapshot of everything [`InstDescriptor`] exposes. Hosts that
//! record a session (or tests) use it instead of a live decoder handle.

use serde::{Deserialize, Serialize};

use crate::{ElementType, IForm, InstAttribute, InstCategory, InstDescriptor, OperandInfo};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInst {
    /// Instruction address inside its image
    #[serde(default)]
    pub address: u64,
    pub iform: IForm,
    pub iform_name: String,
    pub iclass: String,
    pub category: InstCategory,
    pub extension: String,
    #[serde(default)]
    pub operands: Vec<OperandInfo>,
    #[serde(default)]
    pub attributes: Vec<InstAttribute>,
}

impl DecodedInst {
    pub fn new(
        iform: IForm,
        iform_name: &str,
        iclass: &str,
        category: InstCategory,
        extension: &str,
    ) -> Self {
        Self {
            address: 0,
            iform,
            iform_name: iform_name.to_string(),
            iclass: iclass.to_string(),
            category,
            extension: extension.to_string(),
            operands: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }

    pub fn with_operand(mut self, operand: OperandInfo) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn with_attribute(mut self, attribute: InstAttribute) -> Self {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }
}

impl InstDescriptor for DecodedInst {
    fn iform(&self) -> IForm {
        self.iform
    }

    fn iform_name(&self) -> &str {
        &self.iform_name
    }

    fn iclass(&self) -> &str {
        &self.iclass
    }

    fn category(&self) -> InstCategory {
        self.category
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn noperands(&self) -> usize {
        self.operands.len()
    }

    fn operand_element_size_bits(&self, index: usize) -> u32 {
        self.operands.get(index).map_or(0, |op| op.bits)
    }

    fn operand_element_type(&self, index: usize) -> ElementType {
        self.operands.get(index).map_or(ElementType::Invalid, |op| op.element_type)
    }

    fn operand_elements(&self, index: usize) -> u32 {
        self.operands.get(index).map_or(0, |op| op.elements)
    }

    fn attribute(&self, attribute: InstAttribute) -> bool {
        self.attributes.contains(&attribute)
    }
}
