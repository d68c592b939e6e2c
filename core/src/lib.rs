//! Static description of decoded x86 instructions: categories, operand shapes, attribute bits
//! and the [`InstDescriptor`] trait every decoder front-end implements for the analysis.
mod decoded_inst;
mod inst_category;
mod inst_descriptor;
mod operand;

pub use decoded_inst::*;
pub use inst_category::*;
pub use inst_descriptor::*;
pub use operand::*;
