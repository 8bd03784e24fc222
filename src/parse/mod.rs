pub mod bin;
pub mod instr;

pub use bin::{Generator, SpirvBinary, SpirvHeader};
pub use instr::{Instr, InstructionBuilder, Instrs, Operands};
