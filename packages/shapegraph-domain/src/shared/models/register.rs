//! Machine registers
//!
//! The register machine has eleven 64-bit registers `r0..=r10`:
//! - `r0`: return value
//! - `r1..=r5`: arguments (caller-saved)
//! - `r6..=r9`: callee-saved
//! - `r10`: read-mostly frame pointer into the stack region

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reg(u8);

impl Reg {
    pub const R0: Reg = Reg(0);
    pub const R1: Reg = Reg(1);
    pub const R2: Reg = Reg(2);
    pub const R3: Reg = Reg(3);
    pub const R4: Reg = Reg(4);
    pub const R5: Reg = Reg(5);
    pub const R6: Reg = Reg(6);
    pub const R7: Reg = Reg(7);
    pub const R8: Reg = Reg(8);
    pub const R9: Reg = Reg(9);
    pub const R10: Reg = Reg(10);

    /// Dedicated stack-pointer register
    pub const STACK_POINTER: Reg = Reg::R10;

    /// Number of architectural registers
    pub const COUNT: usize = 11;

    /// Create a register from its index, `None` if out of range
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < Self::COUNT {
            Some(Reg(index))
        } else {
            None
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_stack_pointer(self) -> bool {
        self == Self::STACK_POINTER
    }

    /// Registers clobbered by a call (`r0` plus the argument registers)
    pub fn caller_saved() -> impl Iterator<Item = Reg> {
        (0..=5).map(Reg)
    }

    /// All registers in index order
    pub fn all() -> impl Iterator<Item = Reg> {
        (0..Self::COUNT as u8).map(Reg)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_range() {
        assert_eq!(Reg::new(10), Some(Reg::R10));
        assert_eq!(Reg::new(11), None);
        assert!(Reg::R10.is_stack_pointer());
        assert_eq!(Reg::all().count(), Reg::COUNT);
    }

    #[test]
    fn test_caller_saved() {
        let regs: Vec<_> = Reg::caller_saved().collect();
        assert_eq!(regs.first(), Some(&Reg::R0));
        assert_eq!(regs.last(), Some(&Reg::R5));
        assert_eq!(Reg::R7.to_string(), "r7");
    }
}
