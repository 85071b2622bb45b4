//! Bytecode models consumed by the abstract domains

pub mod instruction;
pub mod location;
pub mod register;

pub use instruction::{BinOp, CondOp, Instruction, LocatedInstruction, Operand};
pub use location::{BlockId, InstLocation};
pub use register::Reg;
