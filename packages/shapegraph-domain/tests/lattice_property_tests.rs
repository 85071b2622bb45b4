//! Property-based tests for the memory state lattice
//!
//! Invariants checked over random straight-line programs:
//! - Reflexivity: x ⊑ x
//! - Idempotence: join(x, x) ≅ x
//! - Upper bound: x ⊑ join(x, y) and y ⊑ join(x, y), same for widen
//! - Garbage: dropping unreachable nodes preserves the order both ways
//!
//! Programs mix 4- and 8-byte accesses at straddling offsets with memcpy,
//! memset and select, so field coalescing and partial kills are exercised.

use pretty_assertions::assert_eq;
use proptest::collection::vec;
use proptest::prelude::*;
use shapegraph_domain::features::shape_graph::{AbstractDomain, MemoryState, NodeAllocator};
use shapegraph_domain::{BasicScalars, BinOp, CondOp, ConstantSetValue, DomainResult, Instruction, Operand, Reg};

type State = MemoryState<BasicScalars<ConstantSetValue>>;

fn run(state: &mut State, program: &[Instruction]) -> DomainResult<()> {
    for inst in program {
        state.execute(inst.clone())?;
    }
    Ok(())
}

fn entry() -> State {
    State::new(NodeAllocator::default())
}

// ============================================================================
// Strategies
// ============================================================================

fn arb_reg() -> impl Strategy<Value = Reg> {
    prop_oneof![Just(Reg::R1), Just(Reg::R2), Just(Reg::R3), Just(Reg::R4)]
}

fn arb_base() -> impl Strategy<Value = (Reg, i64)> {
    prop_oneof![
        (arb_reg(), prop_oneof![Just(0i64), Just(4), Just(8)]),
        prop_oneof![Just(-4i64), Just(-8), Just(-12), Just(-16), Just(-24)].prop_map(|o| (Reg::R10, o)),
    ]
}

fn arb_width() -> impl Strategy<Value = u32> {
    prop_oneof![Just(4u32), Just(8)]
}

fn arb_value() -> impl Strategy<Value = Operand> {
    prop_oneof![arb_reg().prop_map(Operand::Reg), (0i64..4).prop_map(Operand::Imm)]
}

/// 4- and 8-byte accesses that may straddle each other; `r10` never escapes
fn arb_inst() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        arb_reg().prop_map(|dst| Instruction::Alloc { dst, size: Operand::Imm(16) }),
        (arb_reg(), arb_reg()).prop_map(|(dst, src)| Instruction::Bin {
            op: BinOp::Mov,
            dst,
            src: Operand::Reg(src)
        }),
        (arb_reg(), 0i64..4).prop_map(|(dst, v)| Instruction::Bin {
            op: BinOp::Mov,
            dst,
            src: Operand::Imm(v)
        }),
        arb_reg().prop_map(|dst| Instruction::Bin { op: BinOp::Add, dst, src: Operand::Imm(8) }),
        (arb_reg(), arb_base(), arb_width()).prop_map(|(dst, (base, offset), width)| Instruction::Load {
            dst,
            base,
            offset,
            width
        }),
        (arb_base(), arb_width(), arb_value()).prop_map(|((base, offset), width, value)| Instruction::Store {
            base,
            offset,
            width,
            value
        }),
        (arb_reg(), arb_reg(), prop_oneof![Just(8i64), Just(16)]).prop_map(|(dst, src, len)| {
            Instruction::Memcpy { dst, src, len: Operand::Imm(len) }
        }),
        (arb_reg(), prop_oneof![Just(4i64), Just(8), Just(16)]).prop_map(|(dst, len)| Instruction::Memset {
            dst,
            value: Operand::Imm(0),
            len: Operand::Imm(len)
        }),
        (arb_reg(), arb_reg(), arb_reg(), arb_value()).prop_map(|(dst, cond, on_true, on_false)| {
            Instruction::Select {
                dst,
                cond: (cond, CondOp::Eq, Operand::Imm(0)),
                on_true: Operand::Reg(on_true),
                on_false,
            }
        }),
        arb_reg().prop_map(|dst| Instruction::Havoc { dst }),
    ]
}

/// Common prefix, then two diverging suffixes
fn arb_branches() -> impl Strategy<Value = (Vec<Instruction>, Vec<Instruction>, Vec<Instruction>)> {
    (vec(arb_inst(), 0..6), vec(arb_inst(), 0..8), vec(arb_inst(), 0..8))
}

fn branches(prefix: &[Instruction], left: &[Instruction], right: &[Instruction]) -> Option<(State, State)> {
    let mut base = entry();
    run(&mut base, prefix).ok()?;
    let (mut x, mut y) = (base.clone(), base);
    run(&mut x, left).ok()?;
    run(&mut y, right).ok()?;
    Some((x, y))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_order_is_reflexive(program in vec(arb_inst(), 0..12)) {
        let mut x = entry();
        prop_assume!(run(&mut x, &program).is_ok());
        prop_assert!(x.less_or_equal(&x));
    }

    #[test]
    fn prop_join_is_idempotent(program in vec(arb_inst(), 0..12)) {
        let mut x = entry();
        prop_assume!(run(&mut x, &program).is_ok());
        let j = x.join(&x).unwrap();
        prop_assert!(x.less_or_equal(&j));
        prop_assert!(j.less_or_equal(&x));
    }

    #[test]
    fn prop_join_is_upper_bound((prefix, left, right) in arb_branches()) {
        let branches = branches(&prefix, &left, &right);
        prop_assume!(branches.is_some());
        let (x, y) = branches.unwrap();
        let joined = x.join(&y);
        prop_assume!(joined.is_ok());
        let j = joined.unwrap();
        prop_assert!(x.less_or_equal(&j), "left not below join:\n{}\njoin:\n{}", x, j);
        prop_assert!(y.less_or_equal(&j), "right not below join:\n{}\njoin:\n{}", y, j);
    }

    #[test]
    fn prop_widen_is_upper_bound((prefix, left, right) in arb_branches()) {
        let branches = branches(&prefix, &left, &right);
        prop_assume!(branches.is_some());
        let (x, y) = branches.unwrap();
        let widened = x.widen(&y);
        prop_assume!(widened.is_ok());
        let w = widened.unwrap();
        prop_assert!(x.less_or_equal(&w));
        prop_assert!(y.less_or_equal(&w));
    }

    #[test]
    fn prop_deep_copy_is_equivalent(program in vec(arb_inst(), 0..12)) {
        let mut x = entry();
        prop_assume!(run(&mut x, &program).is_ok());
        let copy = x.deep_copy();
        prop_assert!(copy.less_or_equal(&x));
        prop_assert!(x.less_or_equal(&copy));
        prop_assert!(copy.graph().live_count() <= x.graph().live_count());
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_join_merges_alias_classes() {
    let base = entry();

    // A: r2 and r3 alias one object
    let mut a = base.clone();
    run(
        &mut a,
        &[
            Instruction::Alloc { dst: Reg::R2, size: Operand::Imm(16) },
            Instruction::Bin { op: BinOp::Mov, dst: Reg::R3, src: Operand::Reg(Reg::R2) },
        ],
    )
    .unwrap();
    assert!(a.may_alias(Reg::R2, Reg::R3));

    // B: two distinct objects
    let mut b = base;
    run(
        &mut b,
        &[
            Instruction::Alloc { dst: Reg::R2, size: Operand::Imm(16) },
            Instruction::Alloc { dst: Reg::R3, size: Operand::Imm(16) },
        ],
    )
    .unwrap();
    assert!(!b.may_alias(Reg::R2, Reg::R3));

    let j = a.join(&b).unwrap();
    assert!(a.less_or_equal(&j));
    assert!(b.less_or_equal(&j));
    assert!(j.may_alias(Reg::R2, Reg::R3));
    assert_eq!(j.points_to(Reg::R2), j.points_to(Reg::R3));
    // B is not above the join: it separates what A aliases
    assert!(!j.less_or_equal(&b));
}

#[test]
fn test_join_keeps_stack_contents_of_both_sides() {
    let base = entry();
    let mut a = base.clone();
    run(
        &mut a,
        &[
            Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) },
            Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R1) },
        ],
    )
    .unwrap();
    let mut b = base;
    run(
        &mut b,
        &[
            Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) },
            Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R1) },
        ],
    )
    .unwrap();

    let mut j = a.join(&b).unwrap();
    j.execute(Instruction::Load { dst: Reg::R2, base: Reg::R10, offset: -8, width: 8 }).unwrap();
    assert!(j.may_alias(Reg::R1, Reg::R2));
}

#[test]
fn test_join_with_bottom_is_identity() {
    let mut x = entry();
    run(&mut x, &[Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) }]).unwrap();
    let bottom = State::bottom(NodeAllocator::default());

    let j = x.join(&bottom).unwrap();
    assert!(j.less_or_equal(&x));
    assert!(x.less_or_equal(&j));
    let j = bottom.join(&x).unwrap();
    assert!(x.less_or_equal(&j));
}

#[test]
fn test_widen_summarizes_new_objects() {
    let base = entry();
    let mut grown = base.clone();
    run(
        &mut grown,
        &[
            Instruction::Alloc { dst: Reg::R1, size: Operand::Imm(8) },
            Instruction::Store { base: Reg::R10, offset: -8, width: 8, value: Operand::Reg(Reg::R1) },
        ],
    )
    .unwrap();
    let w = base.widen(&grown).unwrap();
    let node = w.graph().find_node(grown.node_of(Reg::R1).unwrap());
    assert!(w.graph().node(node).unwrap().kind.is_summarized());
    assert!(grown.less_or_equal(&w));
}
