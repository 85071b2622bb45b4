//! Small sets of constants
//!
//! A set grows up to `MAX_SIZE` elements and then goes to top.

use crate::features::numeric::ports::NumValue;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantSetValue {
    /// Empty set is bottom
    Set(BTreeSet<i64>),
    Top,
}

impl ConstantSetValue {
    pub const MAX_SIZE: usize = 8;

    fn from_set(set: BTreeSet<i64>) -> Self {
        if set.len() > Self::MAX_SIZE {
            ConstantSetValue::Top
        } else {
            ConstantSetValue::Set(set)
        }
    }

    fn lift(&self, other: &Self, f: impl Fn(i64, i64) -> i64) -> Self {
        match (self, other) {
            (ConstantSetValue::Set(a), ConstantSetValue::Set(b)) => {
                if a.is_empty() || b.is_empty() {
                    return Self::bottom();
                }
                if a.len() * b.len() > Self::MAX_SIZE * Self::MAX_SIZE {
                    return ConstantSetValue::Top;
                }
                Self::from_set(a.iter().flat_map(|x| b.iter().map(|y| f(*x, *y)).collect::<Vec<_>>()).collect())
            }
            (ConstantSetValue::Set(s), _) | (_, ConstantSetValue::Set(s)) if s.is_empty() => Self::bottom(),
            _ => ConstantSetValue::Top,
        }
    }
}

impl NumValue for ConstantSetValue {
    fn name() -> &'static str {
        "constant_set"
    }

    fn top() -> Self {
        ConstantSetValue::Top
    }

    fn bottom() -> Self {
        ConstantSetValue::Set(BTreeSet::new())
    }

    fn constant(v: i64) -> Self {
        ConstantSetValue::Set(BTreeSet::from([v]))
    }

    fn from_bounds(lo: Option<i64>, hi: Option<i64>) -> Self {
        match (lo, hi) {
            (Some(l), Some(h)) if l > h => Self::bottom(),
            (Some(l), Some(h)) if (h as i128 - l as i128) < Self::MAX_SIZE as i128 => {
                ConstantSetValue::Set((l..=h).collect())
            }
            _ => ConstantSetValue::Top,
        }
    }

    fn is_top(&self) -> bool {
        matches!(self, ConstantSetValue::Top)
    }

    fn is_bottom(&self) -> bool {
        matches!(self, ConstantSetValue::Set(s) if s.is_empty())
    }

    fn as_constant(&self) -> Option<i64> {
        match self {
            ConstantSetValue::Set(s) if s.len() == 1 => s.iter().next().copied(),
            _ => None,
        }
    }

    fn as_constants(&self) -> Option<Vec<i64>> {
        match self {
            ConstantSetValue::Set(s) => Some(s.iter().copied().collect()),
            ConstantSetValue::Top => None,
        }
    }

    fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self {
            ConstantSetValue::Set(s) => match (s.first(), s.last()) {
                (Some(lo), Some(hi)) => (Some(*lo), Some(*hi)),
                _ => (Some(1), Some(0)),
            },
            ConstantSetValue::Top => (None, None),
        }
    }

    fn contains(&self, v: i64) -> bool {
        match self {
            ConstantSetValue::Set(s) => s.contains(&v),
            ConstantSetValue::Top => true,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstantSetValue::Set(a), ConstantSetValue::Set(b)) => Self::from_set(a.union(b).copied().collect()),
            _ => ConstantSetValue::Top,
        }
    }

    fn widen(&self, other: &Self) -> Self {
        // a growing set is sent to top right away
        if other.leq(self) {
            self.clone()
        } else if self.is_bottom() {
            other.clone()
        } else {
            ConstantSetValue::Top
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (ConstantSetValue::Set(a), ConstantSetValue::Set(b)) => {
                ConstantSetValue::Set(a.intersection(b).copied().collect())
            }
            (ConstantSetValue::Top, x) | (x, ConstantSetValue::Top) => x.clone(),
        }
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (_, ConstantSetValue::Top) => true,
            (ConstantSetValue::Top, ConstantSetValue::Set(_)) => false,
            (ConstantSetValue::Set(a), ConstantSetValue::Set(b)) => a.is_subset(b),
        }
    }

    fn add(&self, other: &Self) -> Self {
        self.lift(other, i64::wrapping_add)
    }

    fn sub(&self, other: &Self) -> Self {
        self.lift(other, i64::wrapping_sub)
    }
}

impl fmt::Display for ConstantSetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantSetValue::Top => f.write_str("⊤"),
            ConstantSetValue::Set(s) if s.is_empty() => f.write_str("⊥"),
            ConstantSetValue::Set(s) => {
                let items: Vec<String> = s.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", items.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_join_caps() {
        let mut v = ConstantSetValue::constant(0);
        for k in 1..ConstantSetValue::MAX_SIZE as i64 {
            v = v.join(&ConstantSetValue::constant(k));
        }
        assert_eq!(v.as_constants().map(|c| c.len()), Some(ConstantSetValue::MAX_SIZE));
        assert!(v.join(&ConstantSetValue::constant(100)).is_top());
    }

    #[test]
    fn test_pairwise_add() {
        let a = ConstantSetValue::constant(8).join(&ConstantSetValue::constant(16));
        let b = ConstantSetValue::constant(1);
        assert_eq!(a.add(&b).as_constants(), Some(vec![9, 17]));
        assert!(a.add(&ConstantSetValue::bottom()).is_bottom());
    }

    #[test]
    fn test_widen_and_order() {
        let a = ConstantSetValue::constant(1);
        let b = a.join(&ConstantSetValue::constant(2));
        assert!(a.leq(&b));
        assert!(!b.leq(&a));
        assert!(a.widen(&b).is_top());
        assert_eq!(b.widen(&a), b);
        assert_eq!(b.bounds(), (Some(1), Some(2)));
    }
}
