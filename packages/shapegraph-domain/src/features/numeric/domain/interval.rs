//! Signed intervals with standard widening
//!
//! Infinite ends are represented by `i64::MIN` / `i64::MAX`; arithmetic that
//! overflows saturates to the corresponding infinity.

use crate::features::numeric::ports::NumValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalValue {
    Bottom,
    Range { lo: i64, hi: i64 },
}

const NEG_INF: i64 = i64::MIN;
const POS_INF: i64 = i64::MAX;

impl IntervalValue {
    pub fn range(lo: i64, hi: i64) -> Self {
        if lo > hi {
            IntervalValue::Bottom
        } else {
            IntervalValue::Range { lo, hi }
        }
    }

    /// Number of concrete values, saturating
    fn width(lo: i64, hi: i64) -> u128 {
        (hi as i128 - lo as i128) as u128 + 1
    }
}

fn add_bound(a: i64, b: i64, inf: i64) -> i64 {
    if a == inf || b == inf {
        return inf;
    }
    a.checked_add(b).unwrap_or(inf)
}

impl NumValue for IntervalValue {
    fn name() -> &'static str {
        "interval"
    }

    fn top() -> Self {
        IntervalValue::Range { lo: NEG_INF, hi: POS_INF }
    }

    fn bottom() -> Self {
        IntervalValue::Bottom
    }

    fn constant(v: i64) -> Self {
        IntervalValue::Range { lo: v, hi: v }
    }

    fn from_bounds(lo: Option<i64>, hi: Option<i64>) -> Self {
        Self::range(lo.unwrap_or(NEG_INF), hi.unwrap_or(POS_INF))
    }

    fn is_top(&self) -> bool {
        matches!(self, IntervalValue::Range { lo: NEG_INF, hi: POS_INF })
    }

    fn is_bottom(&self) -> bool {
        matches!(self, IntervalValue::Bottom)
    }

    fn as_constant(&self) -> Option<i64> {
        match self {
            IntervalValue::Range { lo, hi } if lo == hi && *lo != NEG_INF && *hi != POS_INF => Some(*lo),
            _ => None,
        }
    }

    fn as_constants(&self) -> Option<Vec<i64>> {
        match self {
            IntervalValue::Bottom => Some(Vec::new()),
            IntervalValue::Range { lo, hi } if *lo != NEG_INF && *hi != POS_INF && Self::width(*lo, *hi) <= 8 => {
                Some((*lo..=*hi).collect())
            }
            _ => None,
        }
    }

    fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self {
            IntervalValue::Bottom => (Some(1), Some(0)),
            IntervalValue::Range { lo, hi } => (
                (*lo != NEG_INF).then_some(*lo),
                (*hi != POS_INF).then_some(*hi),
            ),
        }
    }

    fn contains(&self, v: i64) -> bool {
        match self {
            IntervalValue::Bottom => false,
            IntervalValue::Range { lo, hi } => *lo <= v && v <= *hi,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (IntervalValue::Bottom, x) | (x, IntervalValue::Bottom) => *x,
            (IntervalValue::Range { lo: a, hi: b }, IntervalValue::Range { lo: c, hi: d }) => {
                IntervalValue::Range { lo: (*a).min(*c), hi: (*b).max(*d) }
            }
        }
    }

    fn widen(&self, other: &Self) -> Self {
        match (self, other) {
            (IntervalValue::Bottom, x) | (x, IntervalValue::Bottom) => *x,
            (IntervalValue::Range { lo: a, hi: b }, IntervalValue::Range { lo: c, hi: d }) => IntervalValue::Range {
                lo: if c < a { NEG_INF } else { *a },
                hi: if d > b { POS_INF } else { *b },
            },
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (IntervalValue::Bottom, _) | (_, IntervalValue::Bottom) => IntervalValue::Bottom,
            (IntervalValue::Range { lo: a, hi: b }, IntervalValue::Range { lo: c, hi: d }) => {
                Self::range((*a).max(*c), (*b).min(*d))
            }
        }
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (IntervalValue::Bottom, _) => true,
            (_, IntervalValue::Bottom) => false,
            (IntervalValue::Range { lo: a, hi: b }, IntervalValue::Range { lo: c, hi: d }) => c <= a && b <= d,
        }
    }

    fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (IntervalValue::Bottom, _) | (_, IntervalValue::Bottom) => IntervalValue::Bottom,
            (IntervalValue::Range { lo: a, hi: b }, IntervalValue::Range { lo: c, hi: d }) => {
                if *a == NEG_INF && *d == POS_INF || *b == POS_INF && *c == NEG_INF {
                    return Self::top();
                }
                IntervalValue::Range {
                    lo: add_bound(*a, *c, NEG_INF),
                    hi: add_bound(*b, *d, POS_INF),
                }
            }
        }
    }

    fn sub(&self, other: &Self) -> Self {
        match other {
            IntervalValue::Bottom => IntervalValue::Bottom,
            IntervalValue::Range { lo, hi } => {
                let neg = |v: i64| match v {
                    NEG_INF => POS_INF,
                    POS_INF => NEG_INF,
                    v => -v,
                };
                self.add(&IntervalValue::Range { lo: neg(*hi), hi: neg(*lo) })
            }
        }
    }
}

impl fmt::Display for IntervalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalValue::Bottom => f.write_str("⊥"),
            IntervalValue::Range { lo, hi } if lo == hi => write!(f, "{}", lo),
            IntervalValue::Range { lo, hi } => {
                let lo = if *lo == NEG_INF { "-oo".to_string() } else { lo.to_string() };
                let hi = if *hi == POS_INF { "+oo".to_string() } else { hi.to_string() };
                write!(f, "[{}, {}]", lo, hi)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_widen() {
        let a = IntervalValue::range(0, 4);
        let b = IntervalValue::range(0, 8);
        assert_eq!(a.join(&b), b);
        assert_eq!(a.widen(&b), IntervalValue::from_bounds(Some(0), None));
        assert_eq!(b.widen(&a), b);
    }

    #[test]
    fn test_saturating_add() {
        let a = IntervalValue::from_bounds(Some(1), None);
        let b = IntervalValue::constant(i64::MAX - 1);
        assert_eq!(a.add(&b).bounds(), (Some(i64::MAX), None));
        assert_eq!(IntervalValue::range(1, 2).sub(&IntervalValue::constant(1)), IntervalValue::range(0, 1));
    }

    #[test]
    fn test_enumeration() {
        assert_eq!(IntervalValue::range(3, 5).as_constants(), Some(vec![3, 4, 5]));
        assert_eq!(IntervalValue::range(0, 100).as_constants(), None);
        assert!(IntervalValue::top().is_top());
        assert_eq!(IntervalValue::top().as_constant(), None);
    }

    #[test]
    fn test_meet() {
        let a = IntervalValue::range(0, 10);
        assert_eq!(a.meet(&IntervalValue::range(5, 20)), IntervalValue::range(5, 10));
        assert!(a.meet(&IntervalValue::range(11, 20)).is_bottom());
    }
}
