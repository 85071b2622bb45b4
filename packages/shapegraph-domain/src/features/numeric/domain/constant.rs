//! Flat constant lattice: ⊥ < k < ⊤

use crate::features::numeric::ports::NumValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Bottom,
    Const(i64),
    Top,
}

impl NumValue for ConstantValue {
    fn name() -> &'static str {
        "constant"
    }

    fn top() -> Self {
        ConstantValue::Top
    }

    fn bottom() -> Self {
        ConstantValue::Bottom
    }

    fn constant(v: i64) -> Self {
        ConstantValue::Const(v)
    }

    fn from_bounds(lo: Option<i64>, hi: Option<i64>) -> Self {
        match (lo, hi) {
            (Some(l), Some(h)) if l > h => ConstantValue::Bottom,
            (Some(l), Some(h)) if l == h => ConstantValue::Const(l),
            _ => ConstantValue::Top,
        }
    }

    fn is_top(&self) -> bool {
        matches!(self, ConstantValue::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, ConstantValue::Bottom)
    }

    fn as_constant(&self) -> Option<i64> {
        match self {
            ConstantValue::Const(v) => Some(*v),
            _ => None,
        }
    }

    fn as_constants(&self) -> Option<Vec<i64>> {
        match self {
            ConstantValue::Bottom => Some(Vec::new()),
            ConstantValue::Const(v) => Some(vec![*v]),
            ConstantValue::Top => None,
        }
    }

    fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self {
            ConstantValue::Bottom => (Some(1), Some(0)),
            ConstantValue::Const(v) => (Some(*v), Some(*v)),
            ConstantValue::Top => (None, None),
        }
    }

    fn contains(&self, v: i64) -> bool {
        match self {
            ConstantValue::Bottom => false,
            ConstantValue::Const(k) => *k == v,
            ConstantValue::Top => true,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstantValue::Bottom, x) | (x, ConstantValue::Bottom) => *x,
            (ConstantValue::Const(a), ConstantValue::Const(b)) if a == b => *self,
            _ => ConstantValue::Top,
        }
    }

    fn widen(&self, other: &Self) -> Self {
        // finite height
        self.join(other)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstantValue::Top, x) | (x, ConstantValue::Top) => *x,
            (ConstantValue::Const(a), ConstantValue::Const(b)) if a == b => *self,
            _ => ConstantValue::Bottom,
        }
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstantValue::Bottom, _) | (_, ConstantValue::Top) => true,
            (ConstantValue::Const(a), ConstantValue::Const(b)) => a == b,
            _ => false,
        }
    }

    fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstantValue::Bottom, _) | (_, ConstantValue::Bottom) => ConstantValue::Bottom,
            (ConstantValue::Const(a), ConstantValue::Const(b)) => ConstantValue::Const(a.wrapping_add(*b)),
            _ => ConstantValue::Top,
        }
    }

    fn sub(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstantValue::Bottom, _) | (_, ConstantValue::Bottom) => ConstantValue::Bottom,
            (ConstantValue::Const(a), ConstantValue::Const(b)) => ConstantValue::Const(a.wrapping_sub(*b)),
            _ => ConstantValue::Top,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Bottom => f.write_str("⊥"),
            ConstantValue::Const(v) => write!(f, "{}", v),
            ConstantValue::Top => f.write_str("⊤"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_join() {
        let a = ConstantValue::constant(4);
        assert_eq!(a.join(&ConstantValue::constant(4)), a);
        assert!(a.join(&ConstantValue::constant(5)).is_top());
        assert_eq!(a.join(&ConstantValue::bottom()), a);
    }

    #[test]
    fn test_order_and_meet() {
        let a = ConstantValue::constant(1);
        assert!(ConstantValue::bottom().leq(&a));
        assert!(a.leq(&ConstantValue::top()));
        assert!(!a.leq(&ConstantValue::constant(2)));
        assert!(a.meet(&ConstantValue::constant(2)).is_bottom());
        assert_eq!(ConstantValue::top().meet(&a), a);
    }

    #[test]
    fn test_arith() {
        let a = ConstantValue::constant(4040);
        assert_eq!(a.sub(&ConstantValue::constant(1000)).as_constant(), Some(3040));
        assert!(a.add(&ConstantValue::top()).is_top());
        assert_eq!(ConstantValue::from_bounds(Some(3), Some(3)), ConstantValue::constant(3));
    }
}
