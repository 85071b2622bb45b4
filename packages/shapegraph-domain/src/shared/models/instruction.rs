//! Bytecode instructions
//!
//! The abstract domains only need a small, already-disassembled instruction set:
//! register arithmetic, memory accesses, the memory intrinsics
//! (memcpy/memmove/memset), conditional moves and allocation events.
//! Control flow lives in the CFG, so `Jump` carries no target.

use super::location::InstLocation;
use super::register::Reg;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Right-hand operand: register or immediate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
}

impl Operand {
    #[inline]
    pub fn as_reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(r) => Some(*r),
            Operand::Imm(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Imm(v) => write!(f, "{}", v),
        }
    }
}

impl From<Reg> for Operand {
    fn from(r: Reg) -> Self {
        Operand::Reg(r)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Imm(v)
    }
}

/// Binary ALU operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Lsh,
    Rsh,
    Arsh,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Mov => "mov",
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Lsh => "lsh",
            BinOp::Rsh => "rsh",
            BinOp::Arsh => "arsh",
        };
        f.write_str(s)
    }
}

/// Comparison used by `Assume` and `Select`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CondOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CondOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CondOp::Eq => "==",
            CondOp::Ne => "!=",
            CondOp::Lt => "<",
            CondOp::Le => "<=",
            CondOp::Gt => ">",
            CondOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Instruction as seen by the memory domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// `dst = dst <op> src` (`dst = src` for `Mov`)
    Bin { op: BinOp, dst: Reg, src: Operand },
    /// `dst = *(base + offset)` reading `width` bytes
    Load { dst: Reg, base: Reg, offset: i64, width: u32 },
    /// `*(base + offset) = value` writing `width` bytes
    Store { base: Reg, offset: i64, width: u32, value: Operand },
    /// `memcpy(dst, src, len)`
    Memcpy { dst: Reg, src: Reg, len: Operand },
    /// `memmove(dst, src, len)`; same shape semantics as memcpy
    Memmove { dst: Reg, src: Reg, len: Operand },
    /// `memset(dst, value, len)`
    Memset { dst: Reg, value: Operand, len: Operand },
    /// `dst = (lhs <cond> rhs) ? on_true : on_false` without branching
    Select { dst: Reg, cond: (Reg, CondOp, Operand), on_true: Operand, on_false: Operand },
    /// Heap allocation site: `dst = alloc(size)`
    Alloc { dst: Reg, size: Operand },
    /// `dst = &global[address]`
    GlobalAddr { dst: Reg, address: u64 },
    /// `dst = *` (unknown value)
    Havoc { dst: Reg },
    /// Filter states where `lhs <cond> rhs` holds
    Assume { lhs: Reg, cond: CondOp, rhs: Operand },
    /// External call; clobbers the caller-saved registers
    Call { name: String },
    Jump,
    Exit,
}

impl Instruction {
    /// Registers read by the instruction
    pub fn read_registers(&self) -> Vec<Reg> {
        let mut regs = Vec::new();
        match self {
            Instruction::Bin { op, dst, src } => {
                push_operand(&mut regs, src);
                if *op != BinOp::Mov {
                    regs.push(*dst);
                }
            }
            Instruction::Load { base, .. } => regs.push(*base),
            Instruction::Store { base, value, .. } => {
                regs.push(*base);
                push_operand(&mut regs, value);
            }
            Instruction::Memcpy { dst, src, len } | Instruction::Memmove { dst, src, len } => {
                regs.push(*dst);
                regs.push(*src);
                push_operand(&mut regs, len);
            }
            Instruction::Memset { dst, value, len } => {
                regs.push(*dst);
                push_operand(&mut regs, value);
                push_operand(&mut regs, len);
            }
            Instruction::Select { cond, on_true, on_false, .. } => {
                regs.push(cond.0);
                push_operand(&mut regs, &cond.2);
                push_operand(&mut regs, on_true);
                push_operand(&mut regs, on_false);
            }
            Instruction::Alloc { size, .. } => push_operand(&mut regs, size),
            Instruction::Assume { lhs, rhs, .. } => {
                regs.push(*lhs);
                push_operand(&mut regs, rhs);
            }
            Instruction::GlobalAddr { .. }
            | Instruction::Havoc { .. }
            | Instruction::Call { .. }
            | Instruction::Jump
            | Instruction::Exit => {}
        }
        regs
    }

    /// Register written by the instruction, if any
    pub fn written_register(&self) -> Option<Reg> {
        match self {
            Instruction::Bin { dst, .. }
            | Instruction::Load { dst, .. }
            | Instruction::Select { dst, .. }
            | Instruction::Alloc { dst, .. }
            | Instruction::GlobalAddr { dst, .. }
            | Instruction::Havoc { dst } => Some(*dst),
            _ => None,
        }
    }

    /// True for instructions with no effect on the points-to graph
    pub fn is_graph_noop(&self) -> bool {
        matches!(self, Instruction::Assume { .. } | Instruction::Jump | Instruction::Exit)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Bin { op: BinOp::Mov, dst, src } => write!(f, "{} = {}", dst, src),
            Instruction::Bin { op, dst, src } => write!(f, "{} = {} {} {}", dst, dst, op, src),
            Instruction::Load { dst, base, offset, width } => {
                write!(f, "{} = *(u{} *)({} + {})", dst, width * 8, base, offset)
            }
            Instruction::Store { base, offset, width, value } => {
                write!(f, "*(u{} *)({} + {}) = {}", width * 8, base, offset, value)
            }
            Instruction::Memcpy { dst, src, len } => write!(f, "memcpy({}, {}, {})", dst, src, len),
            Instruction::Memmove { dst, src, len } => write!(f, "memmove({}, {}, {})", dst, src, len),
            Instruction::Memset { dst, value, len } => write!(f, "memset({}, {}, {})", dst, value, len),
            Instruction::Select { dst, cond, on_true, on_false } => write!(
                f,
                "{} = select({} {} {}, {}, {})",
                dst, cond.0, cond.1, cond.2, on_true, on_false
            ),
            Instruction::Alloc { dst, size } => write!(f, "{} = alloc({})", dst, size),
            Instruction::GlobalAddr { dst, address } => write!(f, "{} = &global[{:#x}]", dst, address),
            Instruction::Havoc { dst } => write!(f, "{} = havoc()", dst),
            Instruction::Assume { lhs, cond, rhs } => write!(f, "assume({} {} {})", lhs, cond, rhs),
            Instruction::Call { name } => write!(f, "call {}", name),
            Instruction::Jump => f.write_str("goto"),
            Instruction::Exit => f.write_str("exit"),
        }
    }
}

fn push_operand(regs: &mut Vec<Reg>, op: &Operand) {
    if let Operand::Reg(r) = op {
        regs.push(*r);
    }
}

/// Instruction paired with its program location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedInstruction {
    pub location: InstLocation,
    pub inst: Instruction,
}

impl LocatedInstruction {
    pub fn new(location: InstLocation, inst: Instruction) -> Self {
        Self { location, inst }
    }

    /// Instruction without a CFG location
    pub fn detached(inst: Instruction) -> Self {
        Self::new(InstLocation::detached(), inst)
    }
}

impl fmt::Display for LocatedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_registers_of_memcpy() {
        let inst = Instruction::Memcpy { dst: Reg::R1, src: Reg::R2, len: Operand::Reg(Reg::R3) };
        assert_eq!(inst.read_registers(), vec![Reg::R1, Reg::R2, Reg::R3]);
        assert_eq!(inst.written_register(), None);
    }

    #[test]
    fn test_display() {
        let inst = Instruction::Load { dst: Reg::R1, base: Reg::R10, offset: -8, width: 8 };
        assert_eq!(inst.to_string(), "r1 = *(u64 *)(r10 + -8)");
        let inst = Instruction::Bin { op: BinOp::Add, dst: Reg::R2, src: Operand::Imm(4) };
        assert_eq!(inst.to_string(), "r2 = r2 add 4");
    }
}
