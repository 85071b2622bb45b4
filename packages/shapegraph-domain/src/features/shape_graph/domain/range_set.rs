//! Sets of half-open byte ranges
//!
//! Used for the unknown regions of the stack node. `i64::MAX` as upper end
//! means "up to the end of the region".

use std::fmt;

pub const UNBOUNDED: i64 = i64::MAX;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RangeSet {
    /// Sorted, disjoint, non-adjacent `[lo, hi)` ranges
    ranges: Vec<(i64, i64)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.ranges.iter().copied()
    }

    pub fn insert(&mut self, lo: i64, hi: i64) {
        if lo >= hi {
            return;
        }
        let (mut lo, mut hi) = (lo, hi);
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for &(a, b) in &self.ranges {
            if b < lo || a > hi {
                kept.push((a, b));
            } else {
                lo = lo.min(a);
                hi = hi.max(b);
            }
        }
        kept.push((lo, hi));
        kept.sort_unstable();
        self.ranges = kept;
    }

    /// Remove `[lo, hi)` from the set
    pub fn remove(&mut self, lo: i64, hi: i64) {
        if lo >= hi {
            return;
        }
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for &(a, b) in &self.ranges {
            if b <= lo || a >= hi {
                kept.push((a, b));
                continue;
            }
            if a < lo {
                kept.push((a, lo));
            }
            if b > hi {
                kept.push((hi, b));
            }
        }
        self.ranges = kept;
    }

    pub fn overlaps(&self, lo: i64, hi: i64) -> bool {
        self.ranges.iter().any(|&(a, b)| a < hi && lo < b)
    }

    pub fn covers(&self, lo: i64, hi: i64) -> bool {
        lo >= hi || self.ranges.iter().any(|&(a, b)| a <= lo && hi <= b)
    }

    /// Intersection with `[lo, hi)`
    pub fn clipped(&self, lo: i64, hi: i64) -> RangeSet {
        let ranges = self
            .ranges
            .iter()
            .filter_map(|&(a, b)| {
                let (a, b) = (a.max(lo), b.min(hi));
                (a < b).then_some((a, b))
            })
            .collect();
        RangeSet { ranges }
    }

    /// Every range moved by `delta`; unbounded ends stay unbounded
    pub fn shifted(&self, delta: i64) -> RangeSet {
        let mut out = RangeSet::new();
        for &(a, b) in &self.ranges {
            let hi = if b == UNBOUNDED { UNBOUNDED } else { b.saturating_add(delta) };
            out.insert(a.saturating_add(delta), hi);
        }
        out
    }

    pub fn union_with(&mut self, other: &RangeSet) {
        for (a, b) in other.iter() {
            self.insert(a, b);
        }
    }

    pub fn is_subset(&self, other: &RangeSet) -> bool {
        self.ranges.iter().all(|&(a, b)| other.covers(a, b))
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .ranges
            .iter()
            .map(|&(a, b)| {
                if b == UNBOUNDED {
                    format!("[{}, oo)", a)
                } else {
                    format!("[{}, {})", a, b)
                }
            })
            .collect();
        write!(f, "{{{}}}", items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_merges_adjacent() {
        let mut s = RangeSet::new();
        s.insert(0, 4);
        s.insert(8, 12);
        s.insert(4, 8);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![(0, 12)]);
        assert!(s.covers(2, 10));
        assert!(!s.covers(10, 14));
    }

    #[test]
    fn test_remove_splits() {
        let mut s = RangeSet::new();
        s.insert(0, UNBOUNDED);
        s.remove(8, 16);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![(0, 8), (16, UNBOUNDED)]);
        assert!(!s.overlaps(8, 16));
        assert!(s.overlaps(15, 17));
    }

    #[test]
    fn test_shift_and_subset() {
        let mut s = RangeSet::new();
        s.insert(10, 20);
        let t = s.shifted(-10);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![(0, 10)]);
        let mut big = RangeSet::new();
        big.insert(0, 100);
        assert!(t.is_subset(&big));
        assert!(!big.is_subset(&t));
        assert_eq!(big.clipped(50, 200).iter().collect::<Vec<_>>(), vec![(50, 100)]);
    }
}
