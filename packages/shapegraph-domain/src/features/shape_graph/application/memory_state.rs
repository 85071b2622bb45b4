//! Memory state: points-to graph + register bindings + scalar companion
//!
//! The state interprets one instruction at a time. Pointer-typed effects go
//! to the shape graph, numeric effects to the scalar domain, and the two are
//! kept in sync for stack slots:
//! - a register bound to a non-integer node holds a pointer
//! - a register bound to an integer node, or unbound, holds a number whose
//!   value lives in the scalar domain
//!
//! # Usage
//! ```rust,ignore
//! let mut state: MemoryState<BasicScalars<ConstantValue>> = MemoryState::new(NodeAllocator::default());
//! state.execute(Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(16) })?;
//! state.execute(Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R1) })?;
//! ```

use crate::config::JoinPolicy;
use crate::features::numeric::{NumValue, ScalarDomain};
use crate::features::shape_graph::application::register_map::RegisterMap;
use crate::features::shape_graph::domain::{
    Cell, DomainError, DomainResult, NodeId, NodeKind, Region, SymCell,
};
use crate::features::shape_graph::infrastructure::{MergeMode, NodeAllocator, ShapeGraph, StoreValue};
use crate::features::shape_graph::ports::{AbstractDomain, NodePolicy};
use crate::shared::models::{BinOp, Instruction, LocatedInstruction, Operand, Reg};
use std::fmt;
use tracing::{debug, trace};

/// What a register (or operand) holds, as seen by the memory domain
#[derive(Debug, Clone)]
enum Binding<N> {
    Pointer(SymCell),
    /// Bound to an integer leaf; the value is the scalar one
    Integer(SymCell, N),
    Unbound(N),
}

impl<N: NumValue> Binding<N> {
    fn number(&self) -> Option<&N> {
        match self {
            Binding::Pointer(_) => None,
            Binding::Integer(_, v) | Binding::Unbound(v) => Some(v),
        }
    }

    fn cell(&self) -> Option<&SymCell> {
        match self {
            Binding::Pointer(c) | Binding::Integer(c, _) => Some(c),
            Binding::Unbound(_) => None,
        }
    }
}

/// Whether a pointer merged with `number` survives, only ever under the
/// optimistic join policy: always next to an integer node, otherwise only
/// if the value looks like a null/dangling pointer
fn keeps_pointer<N: NumValue>(policy: &dyn NodePolicy, number: &Binding<N>) -> bool {
    if policy.join_policy() != JoinPolicy::Optimistic {
        return false;
    }
    match number {
        Binding::Integer(..) => true,
        Binding::Unbound(v) => v.as_constant().map_or(false, |v| policy.is_plausible_dangling(v)),
        Binding::Pointer(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct MemoryState<S: ScalarDomain> {
    graph: ShapeGraph<S::Value>,
    regs: RegisterMap,
    scalars: S,
    bottom: bool,
}

impl<S: ScalarDomain> MemoryState<S> {
    /// Function-entry state: empty stack, `r10` at the top of the frame
    pub fn new(alloc: NodeAllocator) -> Self {
        let graph = ShapeGraph::new(alloc);
        let mut regs = RegisterMap::new();
        regs.set(Reg::STACK_POINTER, SymCell::exact(graph.stack_cell()));
        Self {
            graph,
            regs,
            scalars: S::top(),
            bottom: false,
        }
    }

    /// Unreachable state
    pub fn bottom(alloc: NodeAllocator) -> Self {
        let mut state = Self::new(alloc);
        state.bottom = true;
        state.scalars = S::bottom();
        state
    }

    pub fn graph(&self) -> &ShapeGraph<S::Value> {
        &self.graph
    }

    pub fn registers(&self) -> &RegisterMap {
        &self.regs
    }

    pub fn scalars(&self) -> &S {
        &self.scalars
    }

    pub fn is_bottom(&self) -> bool {
        self.bottom
    }

    /// Concrete cell `reg` points to, if its offset is exact
    pub fn points_to(&self, reg: Reg) -> Option<Cell> {
        let cell = self.regs.get(reg)?.as_cell()?;
        Some(self.graph.find(cell))
    }

    /// Representative node `reg` points into
    pub fn node_of(&self, reg: Reg) -> Option<NodeId> {
        self.regs.get(reg).map(|c| self.graph.find_node(c.node))
    }

    /// True if both registers point into the same node
    pub fn may_alias(&self, a: Reg, b: Reg) -> bool {
        matches!((self.node_of(a), self.node_of(b)), (Some(x), Some(y)) if x == y)
    }

    pub fn reg_value(&self, reg: Reg) -> S::Value {
        self.scalars.reg_value(reg)
    }

    /// Step an instruction that has no CFG location
    pub fn execute(&mut self, inst: Instruction) -> DomainResult<()> {
        self.apply(&LocatedInstruction::detached(inst))
    }

    fn binding(&self, reg: Reg) -> Binding<S::Value> {
        match self.regs.get(reg) {
            Some(sym) => match self.graph.integer_at(Cell::new(sym.node, 0)) {
                Some(_) => Binding::Integer(sym.clone(), self.scalars.reg_value(reg)),
                None => Binding::Pointer(sym.clone()),
            },
            None => Binding::Unbound(self.scalars.reg_value(reg)),
        }
    }

    fn operand_binding(&self, op: &Operand) -> Binding<S::Value> {
        match op {
            Operand::Reg(r) => self.binding(*r),
            Operand::Imm(v) => Binding::Unbound(S::Value::constant(*v)),
        }
    }

    /// Cell a base register points to; unknown memory is materialized
    fn base_cell(&mut self, reg: Reg) -> SymCell {
        if let Some(sym) = self.regs.get(reg) {
            return sym.clone();
        }
        let fresh = self.graph.mk_node(NodeKind::Structured, Region::External);
        let sym = SymCell::exact(Cell::new(fresh, 0));
        trace!(%reg, node = %fresh, "materialized base");
        self.regs.set(reg, sym.clone());
        sym
    }

    fn bind(&mut self, reg: Reg, binding: &Binding<S::Value>) {
        match binding.cell() {
            Some(cell) => self.regs.set(reg, cell.clone()),
            None => self.regs.clear(reg),
        }
    }

    /// Non-negative constant length, `None` if unknown
    fn length(&self, len: &Operand) -> Option<u64> {
        self.scalars
            .operand_value(len)
            .as_constant()
            .filter(|l| *l >= 0)
            .map(|l| l as u64)
    }

    fn apply(&mut self, located: &LocatedInstruction) -> DomainResult<()> {
        if self.bottom {
            return Ok(());
        }
        let inst = &located.inst;
        trace!(at = %located.location, %inst, "step");
        match inst {
            Instruction::Bin { op, dst, src } => self.exec_bin(*op, *dst, src)?,
            Instruction::Load { dst, base, offset, width } => {
                self.exec_load(*dst, *base, *offset, *width)?;
                return Ok(());
            }
            Instruction::Store { base, offset, width, value } => self.exec_store(*base, *offset, *width, value)?,
            Instruction::Memcpy { dst, src, len } | Instruction::Memmove { dst, src, len } => {
                let len = self.length(len);
                let d = self.base_cell(*dst);
                let s = self.base_cell(*src);
                let (dc, _) = self.graph.memcpy(&d, &s, len)?;
                if dc.node == self.graph.stack() {
                    self.scalars.forget_stack(dc.offset, len);
                }
            }
            Instruction::Memset { dst, len, .. } => {
                let len = self.length(len);
                let d = self.base_cell(*dst);
                let dc = self.graph.memset(&d, len)?;
                if dc.node == self.graph.stack() {
                    self.scalars.forget_stack(dc.offset, len);
                }
            }
            Instruction::Select { dst, cond, on_true, on_false } => {
                let a = self.operand_binding(on_true);
                let b = self.operand_binding(on_false);
                match self.scalars.decide(cond.0, cond.1, &cond.2) {
                    Some(true) => self.bind(*dst, &a),
                    Some(false) => self.bind(*dst, &b),
                    None => {
                        let merged = self.merge_bindings(&a, &b, MergeMode::Join)?;
                        match merged {
                            Some(cell) => self.regs.set(*dst, cell),
                            None => self.regs.clear(*dst),
                        }
                    }
                }
            }
            Instruction::Alloc { dst, .. } => {
                let id = self.graph.mk_node(NodeKind::Structured, Region::Heap);
                self.regs.set(*dst, SymCell::exact(Cell::new(id, 0)));
            }
            Instruction::GlobalAddr { dst, address } => {
                let id = self.graph.global_node(*address);
                self.regs.set(*dst, SymCell::exact(Cell::new(id, 0)));
            }
            Instruction::Havoc { dst } => self.regs.clear(*dst),
            Instruction::Call { name } => {
                trace!(callee = %name, "call clobbers r0-r5");
                for r in Reg::caller_saved() {
                    self.regs.clear(r);
                }
            }
            Instruction::Assume { .. } | Instruction::Jump | Instruction::Exit => {}
        }

        self.scalars.analyze(inst);
        if self.scalars.is_bottom() {
            debug!(at = %located.location, "state became unreachable");
            self.bottom = true;
        }
        Ok(())
    }

    fn exec_bin(&mut self, op: BinOp, dst: Reg, src: &Operand) -> DomainResult<()> {
        let lhs = self.binding(dst);
        let rhs = self.operand_binding(src);
        let result = match (op, &lhs, &rhs) {
            (BinOp::Mov, _, _) => rhs.cell().cloned(),
            (BinOp::Add | BinOp::Sub, Binding::Pointer(p), _) => match rhs.number() {
                Some(n) => Some(self.offset_pointer(p, n, op == BinOp::Sub)?),
                None => None,
            },
            (BinOp::Add, _, Binding::Pointer(p)) => match lhs.number() {
                Some(n) => Some(self.offset_pointer(p, n, false)?),
                None => None,
            },
            _ => None,
        };
        match result {
            Some(cell) => self.regs.set(dst, cell),
            None => self.regs.clear(dst),
        }
        Ok(())
    }

    /// `p ± n`; a non-enumerable stride on a stack pointer is an error
    fn offset_pointer(&self, p: &SymCell, n: &S::Value, negate: bool) -> DomainResult<SymCell> {
        let strides = n.as_constants().map(|vs| {
            vs.into_iter()
                .map(|v| if negate { v.wrapping_neg() } else { v })
                .collect::<Vec<_>>()
        });
        if strides.is_none() && self.graph.is_stack(p.node) {
            return Err(DomainError::unrepresentable(format!(
                "stride {} added to a stack pointer",
                n
            )));
        }
        let max = self.graph.policy().max_offset_set();
        let offset = p.offset.add_strides(strides.as_deref(), max);
        if offset.is_top() && self.graph.is_stack(p.node) {
            return Err(DomainError::unrepresentable(format!(
                "too many stack offsets after adding {}",
                n
            )));
        }
        Ok(SymCell::new(p.node, offset))
    }

    fn exec_load(&mut self, dst: Reg, base: Reg, offset: i64, width: u32) -> DomainResult<()> {
        let sym = self.base_cell(base);
        let at = self.graph.concretize(&sym)?;
        let cell = self.graph.load(&SymCell::exact(at), offset, width)?;

        let from_int = self.graph.integer_at(cell);
        let from_stack = (at.node == self.graph.stack())
            .then(|| self.scalars.stack_content(at.offset.wrapping_add(offset), width));
        let value = match (from_int, from_stack) {
            (Some(i), Some(s)) => Some(i.meet(&s)),
            (i, s) => i.or(s),
        };

        self.scalars.forget(dst);
        if let Some(v) = value {
            self.scalars.set_reg_value(dst, v);
        }
        self.regs.set(dst, SymCell::exact(cell));
        Ok(())
    }

    fn exec_store(&mut self, base: Reg, offset: i64, width: u32, value: &Operand) -> DomainResult<()> {
        let sym = self.base_cell(base);
        let stored = match self.operand_binding(value) {
            Binding::Pointer(p) => StoreValue::Pointer(self.graph.concretize(&p)?),
            Binding::Integer(_, v) | Binding::Unbound(v) => StoreValue::Number(v),
        };
        let number = match &stored {
            StoreValue::Number(v) => Some(v.clone()),
            StoreValue::Pointer(_) => None,
        };
        let written = self.graph.store(&sym, offset, width, stored)?;
        if written.node == self.graph.stack() {
            match number {
                Some(v) => self.scalars.set_stack_content(written.offset, width, v),
                None => self.scalars.forget_stack(written.offset, Some(width as u64)),
            }
        }
        Ok(())
    }

    /// Value of a register merging two bindings (join of states, or select)
    fn merge_bindings(
        &mut self,
        a: &Binding<S::Value>,
        b: &Binding<S::Value>,
        mode: MergeMode,
    ) -> DomainResult<Option<SymCell>> {
        Ok(match (a, b) {
            (Binding::Pointer(pa), Binding::Pointer(pb)) => self.graph.merge_pointers(pa, pb, mode)?,
            (Binding::Integer(ca, _), Binding::Integer(cb, _)) => {
                (self.graph.find_node(ca.node) == self.graph.find_node(cb.node)).then(|| ca.clone())
            }
            (Binding::Pointer(p), other) | (other, Binding::Pointer(p)) => {
                keeps_pointer(self.graph.policy(), other).then(|| p.clone())
            }
            _ => None,
        })
    }

    fn merge_states(&self, other: &Self, mode: MergeMode) -> DomainResult<Self> {
        if self.bottom {
            return Ok(other.clone());
        }
        if other.bottom {
            return Ok(self.clone());
        }
        let (graph, imported) = self.graph.merge_graph(&other.graph, mode)?;
        let scalars = match mode {
            MergeMode::Join => self.scalars.join(&other.scalars),
            MergeMode::Widen => self.scalars.widen(&other.scalars),
        };
        let mut merged = Self {
            graph,
            regs: RegisterMap::new(),
            scalars,
            bottom: false,
        };
        for reg in Reg::all() {
            let a = self.binding(reg);
            let b = other.binding(reg);
            if let Some(cell) = merged.merge_bindings(&a, &b, mode)? {
                merged.regs.set(reg, cell);
            }
        }
        trace!(?mode, imported = imported.len(), regs = %merged.regs, "merged states");
        Ok(merged)
    }
}

impl<S: ScalarDomain> AbstractDomain for MemoryState<S> {
    fn step(&mut self, inst: &LocatedInstruction) -> DomainResult<()> {
        self.apply(inst)
    }

    fn join(&self, other: &Self) -> DomainResult<Self> {
        self.merge_states(other, MergeMode::Join)
    }

    fn widen(&self, other: &Self) -> DomainResult<Self> {
        self.merge_states(other, MergeMode::Widen)
    }

    fn less_or_equal(&self, other: &Self) -> bool {
        if self.bottom {
            return true;
        }
        if other.bottom || !self.scalars.less_or_equal(&other.scalars) {
            return false;
        }
        let mut pairs = Vec::new();
        for reg in Reg::all() {
            match (self.regs.get(reg), other.regs.get(reg)) {
                (Some(a), Some(b)) => pairs.push((a.clone(), b.clone())),
                (None, Some(_)) => return false,
                _ => {}
            }
        }
        self.graph.less_or_equal(&other.graph, &pairs)
    }

    fn is_bottom(&self) -> bool {
        self.bottom
    }

    fn deep_copy(&self) -> Self {
        let roots: Vec<NodeId> = self.regs.iter().map(|(_, c)| c.node).collect();
        Self {
            graph: self.graph.reachable_copy(roots),
            regs: self.regs.clone(),
            scalars: self.scalars.clone(),
            bottom: self.bottom,
        }
    }

    fn pseudo_canonicalize(&mut self, other: &Self) -> DomainResult<()> {
        if self.bottom || other.bottom {
            return Ok(());
        }
        self.graph.pseudo_canonicalize(&other.graph)
    }
}

impl<S: ScalarDomain> fmt::Display for MemoryState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bottom {
            return f.write_str("_|_");
        }
        writeln!(f, "registers: {}", self.regs)?;
        write!(f, "{}", self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JoinPolicy, ShapeConfig};
    use crate::features::numeric::{BasicScalars, ConstantValue};
    use crate::shared::models::CondOp;

    type State = MemoryState<BasicScalars<ConstantValue>>;

    fn state() -> State {
        State::new(NodeAllocator::default())
    }

    #[test]
    fn test_entry_state() {
        let s = state();
        assert_eq!(s.points_to(Reg::R10), Some(Cell::new(s.graph().stack(), 4096)));
        assert!(s.points_to(Reg::R1).is_none());
        assert!(!s.is_bottom());
    }

    #[test]
    fn test_pointer_arithmetic_on_stack() {
        let mut s = state();
        s.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Reg(Reg::R10) }).unwrap();
        s.execute(Instruction::Bin { op: BinOp::Sub, dst: Reg::R1, src: Operand::Imm(16) }).unwrap();
        assert_eq!(s.points_to(Reg::R1), Some(Cell::new(s.graph().stack(), 4080)));
    }

    #[test]
    fn test_unknown_stride_on_stack_fails() {
        let mut s = state();
        s.execute(Instruction::Havoc { dst: Reg::R2 }).unwrap();
        s.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Reg(Reg::R10) }).unwrap();
        let err = s
            .execute(Instruction::Bin { op: BinOp::Add, dst: Reg::R1, src: Operand::Reg(Reg::R2) })
            .unwrap_err();
        assert!(matches!(err, DomainError::UnrepresentableStackAddress { .. }));
    }

    #[test]
    fn test_store_then_load_pointer() {
        let mut s = state();
        s.execute(Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(16) }).unwrap();
        s.execute(Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R1) })
            .unwrap();
        s.execute(Instruction::Load { dst: Reg::R2, base: Reg::R10, offset: -8, width: 8 }).unwrap();
        assert!(s.may_alias(Reg::R1, Reg::R2));
    }

    #[test]
    fn test_store_then_load_number() {
        let mut s = state();
        s.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Imm(7) }).unwrap();
        s.execute(Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R1) })
            .unwrap();
        s.execute(Instruction::Load { dst: Reg::R2, base: Reg::R10, offset: -8, width: 8 }).unwrap();
        assert_eq!(s.reg_value(Reg::R2), ConstantValue::constant(7));
    }

    #[test]
    fn test_select_pointer_or_null() {
        let config = ShapeConfig::default().join_policy(JoinPolicy::Optimistic);
        let mut s = State::new(NodeAllocator::from_config(&config));
        s.execute(Instruction::Havoc { dst: Reg::R3 }).unwrap();
        s.execute(Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) }).unwrap();
        s.execute(Instruction::Select {
            dst: Reg::R2,
            cond: (Reg::R3, CondOp::Eq, Operand::Imm(0)),
            on_true: Operand::Reg(Reg::R1),
            on_false: Operand::Imm(0),
        })
        .unwrap();
        assert!(s.may_alias(Reg::R1, Reg::R2));

        let mut p = state();
        p.execute(Instruction::Havoc { dst: Reg::R3 }).unwrap();
        p.execute(Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) }).unwrap();
        p.execute(Instruction::Select {
            dst: Reg::R2,
            cond: (Reg::R3, CondOp::Eq, Operand::Imm(0)),
            on_true: Operand::Reg(Reg::R1),
            on_false: Operand::Imm(0),
        })
        .unwrap();
        assert!(p.registers().get(Reg::R2).is_none());
    }

    fn optimistic_base() -> (State, State) {
        let config = ShapeConfig::default().join_policy(JoinPolicy::Optimistic);
        let base = State::new(NodeAllocator::from_config(&config));
        (base.clone(), base)
    }

    /// `r1 = r10 - 56`
    fn point_into_frame(s: &mut State) {
        s.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Reg(Reg::R10) }).unwrap();
        s.execute(Instruction::Bin { op: BinOp::Sub, dst: Reg::R1, src: Operand::Imm(56) }).unwrap();
    }

    fn assert_equivalent(a: &State, b: &State) {
        assert!(a.less_or_equal(b), "{a}\nnot below\n{b}");
        assert!(b.less_or_equal(a), "{b}\nnot below\n{a}");
    }

    #[test]
    fn test_optimistic_join_keeps_pointer_over_small_constant() {
        let (mut x, mut y) = optimistic_base();
        x.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Imm(4) }).unwrap();
        point_into_frame(&mut y);

        let xy = x.join(&y).unwrap();
        let yx = y.join(&x).unwrap();
        assert_equivalent(&xy, &yx);
        assert_eq!(xy.points_to(Reg::R1), Some(Cell::new(xy.graph().stack(), 4040)));

        // not a plausible dangling value
        let (mut z, mut w) = optimistic_base();
        z.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Imm(5) }).unwrap();
        point_into_frame(&mut w);
        assert!(z.join(&w).unwrap().points_to(Reg::R1).is_none());
    }

    #[test]
    fn test_optimistic_join_keeps_pointer_over_integer_node() {
        let (mut x, mut y) = optimistic_base();
        // r1 bound to an integer node whose value the scalars do not know
        x.execute(Instruction::Havoc { dst: Reg::R2 }).unwrap();
        x.execute(Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R2) })
            .unwrap();
        x.execute(Instruction::Load { dst: Reg::R1, base: Reg::R10, offset: -8, width: 8 }).unwrap();
        assert!(x.graph().integer_at(x.points_to(Reg::R1).unwrap()).is_some());
        assert!(x.reg_value(Reg::R1).is_top());
        point_into_frame(&mut y);

        let xy = x.join(&y).unwrap();
        let yx = y.join(&x).unwrap();
        assert_equivalent(&xy, &yx);
        assert_eq!(xy.points_to(Reg::R1), Some(Cell::new(xy.graph().stack(), 4040)));
        assert_eq!(yx.points_to(Reg::R1), Some(Cell::new(yx.graph().stack(), 4040)));
    }

    #[test]
    fn test_pessimistic_join_drops_pointer_over_integer_node() {
        let base = state();
        let (mut x, mut y) = (base.clone(), base);
        x.execute(Instruction::Havoc { dst: Reg::R2 }).unwrap();
        x.execute(Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R2) })
            .unwrap();
        x.execute(Instruction::Load { dst: Reg::R1, base: Reg::R10, offset: -8, width: 8 }).unwrap();
        point_into_frame(&mut y);
        assert!(x.join(&y).unwrap().registers().get(Reg::R1).is_none());
    }

    #[test]
    fn test_lengths_past_offset_range() {
        let mut s = state();
        s.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R3, src: Operand::Imm(i64::MAX) }).unwrap();
        s.execute(Instruction::Memset { dst: Reg::R10, value: Operand::Imm(0), len: Operand::Reg(Reg::R3) })
            .unwrap();
        let err = s
            .execute(Instruction::Store { base: Reg::R10, offset: 0, width: 8, value: Operand::Imm(1) })
            .unwrap_err();
        assert!(matches!(err, DomainError::UnknownRegion { .. }));

        s.execute(Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) }).unwrap();
        s.execute(Instruction::Alloc { dst: Reg::R2, size: Operand::Imm(8) }).unwrap();
        s.execute(Instruction::Bin { op: BinOp::Add, dst: Reg::R1, src: Operand::Imm(16) }).unwrap();
        s.execute(Instruction::Memcpy { dst: Reg::R1, src: Reg::R2, len: Operand::Reg(Reg::R3) }).unwrap();
        assert!(s.may_alias(Reg::R1, Reg::R2));

        s.execute(Instruction::Alloc { dst: Reg::R4, size: Operand::Imm(8) }).unwrap();
        s.execute(Instruction::Bin { op: BinOp::Add, dst: Reg::R4, src: Operand::Imm(i64::MAX - 3) }).unwrap();
        let err = s
            .execute(Instruction::Load { dst: Reg::R5, base: Reg::R4, offset: 0, width: 8 })
            .unwrap_err();
        assert!(matches!(err, DomainError::AddressOverflow { .. }));
    }

    #[test]
    fn test_assume_to_bottom() {
        let mut s = state();
        s.execute(Instruction::Bin { op: BinOp::Mov, dst: Reg::R1, src: Operand::Imm(1) }).unwrap();
        s.execute(Instruction::Assume { lhs: Reg::R1, cond: CondOp::Eq, rhs: Operand::Imm(2) }).unwrap();
        assert!(s.is_bottom());
        let other = state();
        assert!(s.less_or_equal(&other));
        assert!(!other.less_or_equal(&s));
    }

    #[test]
    fn test_call_clobbers_bindings() {
        let mut s = state();
        s.execute(Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) }).unwrap();
        s.execute(Instruction::Alloc { dst: Reg::R6, size: Operand::Imm(8) }).unwrap();
        s.execute(Instruction::Call { name: "free".to_string() }).unwrap();
        assert!(s.points_to(Reg::R1).is_none());
        assert!(s.points_to(Reg::R6).is_some());
    }
}
