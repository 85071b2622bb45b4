//! Ports (Interfaces) for the numeric companion
//!
//! - `NumValue`: a non-relational abstraction of one 64-bit integer, stored in
//!   integer nodes of the shape graph and in scalar registers
//! - `ScalarDomain`: the narrow interface the memory domain consumes for
//!   register and stack values

use crate::shared::models::{CondOp, Instruction, Operand, Reg};
use std::fmt;

/// Abstract value of a single machine integer
///
/// # Example (Generic - Zero-cost)
/// ```ignore
/// fn is_small<N: NumValue>(v: &N) -> bool {
///     matches!(v.bounds(), (Some(lo), Some(hi)) if lo >= 0 && hi < 64)
/// }
/// ```
pub trait NumValue: Clone + fmt::Debug + fmt::Display + PartialEq + Send + Sync + 'static {
    /// Strategy name, used in logs
    fn name() -> &'static str;

    fn top() -> Self;
    fn bottom() -> Self;
    fn constant(v: i64) -> Self;

    /// Smallest value of this strategy containing `[lo, hi]` (`None` = unbounded)
    fn from_bounds(lo: Option<i64>, hi: Option<i64>) -> Self;

    fn is_top(&self) -> bool;
    fn is_bottom(&self) -> bool;

    /// Single concrete value, if known
    fn as_constant(&self) -> Option<i64>;

    /// Every concrete value, if there are few enough to enumerate
    fn as_constants(&self) -> Option<Vec<i64>>;

    /// Lower and upper bound (`None` = unbounded); `(Some(1), Some(0))` for bottom
    fn bounds(&self) -> (Option<i64>, Option<i64>);

    fn contains(&self, v: i64) -> bool;

    fn join(&self, other: &Self) -> Self;
    fn widen(&self, other: &Self) -> Self;
    fn meet(&self, other: &Self) -> Self;
    fn leq(&self, other: &Self) -> bool;

    fn add(&self, other: &Self) -> Self;
    fn sub(&self, other: &Self) -> Self;
}

/// Scalar companion state consumed by the memory domain
///
/// Tracks numeric values of registers and of stack slots keyed by
/// `(offset, width)`. Memory instructions are resolved by the caller, which
/// owns the points-to graph and pushes the results back through
/// `set_reg_value` / `set_stack_content` / `forget_stack`.
pub trait ScalarDomain: Clone + fmt::Debug + Send + Sync + 'static {
    type Value: NumValue;

    /// Unconstrained state
    fn top() -> Self;
    fn bottom() -> Self;
    fn is_bottom(&self) -> bool;

    fn reg_value(&self, reg: Reg) -> Self::Value;
    fn set_reg_value(&mut self, reg: Reg, value: Self::Value);
    fn forget(&mut self, reg: Reg);

    /// Value of an operand (immediates are constants)
    fn operand_value(&self, op: &Operand) -> Self::Value {
        match op {
            Operand::Reg(r) => self.reg_value(*r),
            Operand::Imm(v) => Self::Value::constant(*v),
        }
    }

    /// Value stored at exactly `(offset, width)` in the stack, top otherwise
    fn stack_content(&self, offset: i64, width: u32) -> Self::Value;
    fn set_stack_content(&mut self, offset: i64, width: u32, value: Self::Value);

    /// Forget stack contents overlapping `[offset, offset + len)`; `None` = unbounded
    fn forget_stack(&mut self, offset: i64, len: Option<u64>);

    /// Outcome of `lhs <cond> rhs` (unsigned) if the state decides it
    fn decide(&self, lhs: Reg, cond: CondOp, rhs: &Operand) -> Option<bool>;

    /// Register-level transfer function
    ///
    /// Handles arithmetic, `Assume`, `Select`, `Havoc`, `Call` and allocation
    /// events; for memory instructions it only forgets the written register.
    fn analyze(&mut self, inst: &Instruction);

    fn join(&self, other: &Self) -> Self;
    fn widen(&self, other: &Self) -> Self;
    fn less_or_equal(&self, other: &Self) -> bool;
}
