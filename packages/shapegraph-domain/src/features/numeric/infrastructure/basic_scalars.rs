//! Non-relational scalar companion
//!
//! One `NumValue` per register plus a map of stack slots keyed by offset.
//! Absent stack slots are top. Comparisons in `Assume` are unsigned, so bounds
//! are only refined when both sides are known to be non-negative.

use crate::features::numeric::ports::{NumValue, ScalarDomain};
use crate::shared::models::{BinOp, CondOp, Instruction, Operand, Reg};
use std::collections::BTreeMap;
use tracing::trace;

/// Upper bound on pairwise evaluation of enumerable operands
const MAX_PAIRWISE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct BasicScalars<N: NumValue> {
    regs: [N; Reg::COUNT],
    /// offset -> (width, value); entries never overlap
    stack: BTreeMap<i64, (u32, N)>,
    bottom: bool,
}

impl<N: NumValue> BasicScalars<N> {
    fn eval_bin(op: BinOp, lhs: &N, rhs: &N) -> N {
        match op {
            BinOp::Mov => rhs.clone(),
            BinOp::Add => lhs.add(rhs),
            BinOp::Sub => lhs.sub(rhs),
            _ => match (lhs.as_constants(), rhs.as_constants()) {
                (Some(xs), Some(ys)) if xs.len() * ys.len() <= MAX_PAIRWISE => {
                    let mut acc = N::bottom();
                    for x in &xs {
                        for y in &ys {
                            match eval_const(op, *x, *y) {
                                Some(v) => acc = acc.join(&N::constant(v)),
                                None => return N::top(),
                            }
                        }
                    }
                    acc
                }
                _ => N::top(),
            },
        }
    }

    /// Refine `lhs` assuming `lhs <cond> rhs`
    fn refine(&mut self, lhs: Reg, cond: CondOp, rhs: &N) {
        let current = self.reg_value(lhs);
        let (lhs_lo, _) = current.bounds();
        let (rhs_lo, rhs_hi) = rhs.bounds();
        let non_negative = lhs_lo.map_or(false, |l| l >= 0) && rhs_lo.map_or(false, |l| l >= 0);

        let refined = match cond {
            CondOp::Eq => current.meet(rhs),
            CondOp::Ne => match (current.as_constant(), rhs.as_constant()) {
                (Some(a), Some(b)) if a == b => N::bottom(),
                _ => current.clone(),
            },
            CondOp::Lt if non_negative => match rhs_hi {
                Some(h) => current.meet(&N::from_bounds(None, h.checked_sub(1))),
                None => current.clone(),
            },
            CondOp::Le if non_negative => current.meet(&N::from_bounds(None, rhs_hi)),
            CondOp::Gt if non_negative => match rhs_lo {
                Some(l) => current.meet(&N::from_bounds(l.checked_add(1), None)),
                None => current.clone(),
            },
            CondOp::Ge if non_negative => current.meet(&N::from_bounds(rhs_lo, None)),
            _ => current.clone(),
        };

        if refined.is_bottom() {
            trace!(reg = %lhs, "assume is infeasible");
            *self = Self::bottom();
        } else {
            self.regs[lhs.index() as usize] = refined;
        }
    }

    fn merge_with(&self, other: &Self, op: impl Fn(&N, &N) -> N) -> Self {
        if self.bottom {
            return other.clone();
        }
        if other.bottom {
            return self.clone();
        }
        let regs = std::array::from_fn(|i| op(&self.regs[i], &other.regs[i]));
        let mut stack = BTreeMap::new();
        for (off, (w, v)) in &self.stack {
            if let Some((w2, v2)) = other.stack.get(off) {
                if w == w2 {
                    let merged = op(v, v2);
                    if !merged.is_top() {
                        stack.insert(*off, (*w, merged));
                    }
                }
            }
        }
        Self { regs, stack, bottom: false }
    }
}

fn eval_const(op: BinOp, a: i64, b: i64) -> Option<i64> {
    let shift = (b & 63) as u32;
    Some(match op {
        BinOp::Mov => b,
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => (a as u64).checked_div(b as u64)? as i64,
        BinOp::Mod => (a as u64).checked_rem(b as u64)? as i64,
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Lsh => a.wrapping_shl(shift),
        BinOp::Rsh => ((a as u64) >> shift) as i64,
        BinOp::Arsh => a >> shift,
    })
}

impl<N: NumValue> ScalarDomain for BasicScalars<N> {
    type Value = N;

    fn top() -> Self {
        Self {
            regs: std::array::from_fn(|_| N::top()),
            stack: BTreeMap::new(),
            bottom: false,
        }
    }

    fn bottom() -> Self {
        Self {
            regs: std::array::from_fn(|_| N::bottom()),
            stack: BTreeMap::new(),
            bottom: true,
        }
    }

    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn reg_value(&self, reg: Reg) -> N {
        self.regs[reg.index() as usize].clone()
    }

    fn set_reg_value(&mut self, reg: Reg, value: N) {
        if !self.bottom {
            self.regs[reg.index() as usize] = value;
        }
    }

    fn forget(&mut self, reg: Reg) {
        self.set_reg_value(reg, N::top());
    }

    fn stack_content(&self, offset: i64, width: u32) -> N {
        match self.stack.get(&offset) {
            Some((w, v)) if *w == width => v.clone(),
            _ => N::top(),
        }
    }

    fn set_stack_content(&mut self, offset: i64, width: u32, value: N) {
        if self.bottom {
            return;
        }
        self.forget_stack(offset, Some(width as u64));
        if !value.is_top() {
            self.stack.insert(offset, (width, value));
        }
    }

    fn forget_stack(&mut self, offset: i64, len: Option<u64>) {
        let end = len.map(|l| offset.saturating_add(l as i64));
        let doomed: Vec<i64> = self
            .stack
            .iter()
            .filter(|(o, (w, _))| {
                let o_end = o.saturating_add(*w as i64);
                o_end > offset && end.map_or(true, |e| **o < e)
            })
            .map(|(o, _)| *o)
            .collect();
        for o in doomed {
            self.stack.remove(&o);
        }
    }

    fn decide(&self, lhs: Reg, cond: CondOp, rhs: &Operand) -> Option<bool> {
        let a = self.reg_value(lhs).as_constant()? as u64;
        let b = self.operand_value(rhs).as_constant()? as u64;
        Some(match cond {
            CondOp::Eq => a == b,
            CondOp::Ne => a != b,
            CondOp::Lt => a < b,
            CondOp::Le => a <= b,
            CondOp::Gt => a > b,
            CondOp::Ge => a >= b,
        })
    }

    fn analyze(&mut self, inst: &Instruction) {
        if self.bottom {
            return;
        }
        match inst {
            Instruction::Bin { op, dst, src } => {
                let value = Self::eval_bin(*op, &self.reg_value(*dst), &self.operand_value(src));
                self.set_reg_value(*dst, value);
            }
            Instruction::Select { dst, cond, on_true, on_false } => {
                let value = match self.decide(cond.0, cond.1, &cond.2) {
                    Some(true) => self.operand_value(on_true),
                    Some(false) => self.operand_value(on_false),
                    None => self.operand_value(on_true).join(&self.operand_value(on_false)),
                };
                self.set_reg_value(*dst, value);
            }
            Instruction::Assume { lhs, cond, rhs } => {
                let rhs = self.operand_value(rhs);
                self.refine(*lhs, *cond, &rhs);
            }
            Instruction::GlobalAddr { dst, address } => {
                self.set_reg_value(*dst, N::constant(*address as i64));
            }
            Instruction::Call { .. } => {
                for r in Reg::caller_saved() {
                    self.forget(r);
                }
            }
            Instruction::Load { dst, .. } | Instruction::Alloc { dst, .. } | Instruction::Havoc { dst } => {
                self.forget(*dst);
            }
            Instruction::Store { .. }
            | Instruction::Memcpy { .. }
            | Instruction::Memmove { .. }
            | Instruction::Memset { .. }
            | Instruction::Jump
            | Instruction::Exit => {}
        }
    }

    fn join(&self, other: &Self) -> Self {
        self.merge_with(other, |a, b| a.join(b))
    }

    fn widen(&self, other: &Self) -> Self {
        self.merge_with(other, |a, b| a.widen(b))
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        if self.bottom {
            return true;
        }
        if other.bottom {
            return false;
        }
        if !self.regs.iter().zip(other.regs.iter()).all(|(a, b)| a.leq(b)) {
            return false;
        }
        other
            .stack
            .iter()
            .all(|(off, (w, v))| self.stack_content(*off, *w).leq(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::numeric::{ConstantSetValue, ConstantValue, IntervalValue};

    type Scalars = BasicScalars<ConstantValue>;

    #[test]
    fn test_register_arithmetic() {
        let mut s = Scalars::top();
        s.analyze(&Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Imm(6) });
        s.analyze(&Instruction::Bin { op: BinOp::Mul, dst: Reg::R1, src: Operand::Imm(7) });
        assert_eq!(s.reg_value(Reg::R1).as_constant(), Some(42));
        s.analyze(&Instruction::Bin { op: BinOp::Div, dst: Reg::R1, src: Operand::Imm(0) });
        assert!(s.reg_value(Reg::R1).is_top());
    }

    #[test]
    fn test_assume_infeasible() {
        let mut s = Scalars::top();
        s.set_reg_value(Reg::R2, ConstantValue::constant(3));
        s.analyze(&Instruction::Assume { lhs: Reg::R2, cond: CondOp::Eq, rhs: Operand::Imm(4) });
        assert!(s.is_bottom());
        assert!(s.less_or_equal(&Scalars::top()));
    }

    #[test]
    fn test_assume_refines_interval() {
        let mut s = BasicScalars::<IntervalValue>::top();
        s.set_reg_value(Reg::R3, IntervalValue::range(0, 100));
        s.analyze(&Instruction::Assume { lhs: Reg::R3, cond: CondOp::Lt, rhs: Operand::Imm(10) });
        assert_eq!(s.reg_value(Reg::R3), IntervalValue::range(0, 9));
    }

    #[test]
    fn test_stack_slots() {
        let mut s = Scalars::top();
        s.set_stack_content(4088, 8, ConstantValue::constant(1));
        s.set_stack_content(4080, 8, ConstantValue::constant(2));
        s.set_stack_content(4084, 4, ConstantValue::constant(3));
        assert_eq!(s.stack_content(4088, 8).as_constant(), Some(1));
        assert!(s.stack_content(4080, 8).is_top());
        assert_eq!(s.stack_content(4084, 4).as_constant(), Some(3));
        s.forget_stack(4000, None);
        assert!(s.stack_content(4084, 4).is_top());
        assert!(s.stack_content(4088, 8).is_top());
    }

    #[test]
    fn test_join_and_order() {
        let mut a = BasicScalars::<ConstantSetValue>::top();
        let mut b = a.clone();
        a.set_reg_value(Reg::R1, ConstantSetValue::constant(1));
        b.set_reg_value(Reg::R1, ConstantSetValue::constant(2));
        a.set_stack_content(8, 8, ConstantSetValue::constant(5));
        let j = a.join(&b);
        assert_eq!(j.reg_value(Reg::R1).as_constants(), Some(vec![1, 2]));
        assert!(j.stack_content(8, 8).is_top());
        assert!(a.less_or_equal(&j));
        assert!(b.less_or_equal(&j));
        assert!(!j.less_or_equal(&a));
    }

    #[test]
    fn test_call_clobbers_caller_saved() {
        let mut s = Scalars::top();
        s.set_reg_value(Reg::R5, ConstantValue::constant(1));
        s.set_reg_value(Reg::R6, ConstantValue::constant(1));
        s.analyze(&Instruction::Call { name: "sol_log".to_string() });
        assert!(s.reg_value(Reg::R5).is_top());
        assert_eq!(s.reg_value(Reg::R6).as_constant(), Some(1));
    }
}
