//! Cells and symbolic cells
//!
//! A `Cell` is a concrete address inside a node. Registers hold `SymCell`s,
//! whose offset may be a finite set or unknown after joins and pointer
//! arithmetic; they must be concretized before any structural mutation.

use super::node::NodeId;
use std::collections::BTreeSet;
use std::fmt;

/// (node, absolute offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub node: NodeId,
    pub offset: i64,
}

impl Cell {
    pub fn new(node: NodeId, offset: i64) -> Self {
        Self { node, offset }
    }

    pub fn shifted(self, delta: i64) -> Self {
        Self::new(self.node, self.offset.wrapping_add(delta))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node, self.offset)
    }
}

/// Register-relative offset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymOffset {
    Exact(i64),
    /// At least two offsets, at most `max_offset_set`
    Set(BTreeSet<i64>),
    Top,
}

impl SymOffset {
    /// Normalize a set: singletons become `Exact`, oversized sets `Top`
    pub fn from_set(set: BTreeSet<i64>, max: usize) -> Self {
        match set.len() {
            0 => SymOffset::Top,
            1 => set.into_iter().next().map_or(SymOffset::Top, SymOffset::Exact),
            n if n > max => SymOffset::Top,
            _ => SymOffset::Set(set),
        }
    }

    pub fn as_exact(&self) -> Option<i64> {
        match self {
            SymOffset::Exact(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, SymOffset::Top)
    }

    fn values(&self) -> Option<BTreeSet<i64>> {
        match self {
            SymOffset::Exact(k) => Some(BTreeSet::from([*k])),
            SymOffset::Set(s) => Some(s.clone()),
            SymOffset::Top => None,
        }
    }

    pub fn shift(&self, delta: i64) -> Self {
        match self {
            SymOffset::Exact(k) => SymOffset::Exact(k.wrapping_add(delta)),
            SymOffset::Set(s) => SymOffset::Set(s.iter().map(|k| k.wrapping_add(delta)).collect()),
            SymOffset::Top => SymOffset::Top,
        }
    }

    /// Add every stride in `strides` (`None` = unknown stride)
    pub fn add_strides(&self, strides: Option<&[i64]>, max: usize) -> Self {
        match (self.values(), strides) {
            (Some(base), Some(strides)) if !strides.is_empty() => {
                let sums = base
                    .iter()
                    .flat_map(|b| strides.iter().map(move |s| b.wrapping_add(*s)))
                    .collect();
                Self::from_set(sums, max)
            }
            _ => SymOffset::Top,
        }
    }

    pub fn join(&self, other: &Self, max: usize) -> Self {
        match (self.values(), other.values()) {
            (Some(a), Some(b)) => Self::from_set(a.union(&b).copied().collect(), max),
            _ => SymOffset::Top,
        }
    }

    /// Any growth goes straight to top
    pub fn widen(&self, other: &Self) -> Self {
        if other.leq(self) {
            self.clone()
        } else {
            SymOffset::Top
        }
    }

    pub fn leq(&self, other: &Self) -> bool {
        match (self.values(), other.values()) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a.is_subset(&b),
        }
    }

    pub fn contains(&self, k: i64) -> bool {
        match self {
            SymOffset::Exact(e) => *e == k,
            SymOffset::Set(s) => s.contains(&k),
            SymOffset::Top => true,
        }
    }
}

impl fmt::Display for SymOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymOffset::Exact(k) => write!(f, "{}", k),
            SymOffset::Set(s) => {
                let items: Vec<String> = s.iter().map(|k| k.to_string()).collect();
                write!(f, "{{{}}}", items.join(","))
            }
            SymOffset::Top => f.write_str("⊤"),
        }
    }
}

/// (node, symbolic offset)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymCell {
    pub node: NodeId,
    pub offset: SymOffset,
}

impl SymCell {
    pub fn new(node: NodeId, offset: SymOffset) -> Self {
        Self { node, offset }
    }

    pub fn exact(cell: Cell) -> Self {
        Self::new(cell.node, SymOffset::Exact(cell.offset))
    }

    pub fn as_cell(&self) -> Option<Cell> {
        self.offset.as_exact().map(|k| Cell::new(self.node, k))
    }
}

impl From<Cell> for SymCell {
    fn from(cell: Cell) -> Self {
        SymCell::exact(cell)
    }
}

impl fmt::Display for SymCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.node, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_join_and_cap() {
        let a = SymOffset::Exact(8);
        let b = SymOffset::Exact(16);
        let j = a.join(&b, 4);
        assert_eq!(j, SymOffset::Set(BTreeSet::from([8, 16])));
        assert!(a.leq(&j));
        assert!(!j.leq(&a));
        assert_eq!(j.join(&SymOffset::Exact(24), 2), SymOffset::Top);
        assert_eq!(a.join(&a, 4), a);
    }

    #[test]
    fn test_strides() {
        let base = SymOffset::Exact(4096);
        assert_eq!(base.add_strides(Some(&[-8]), 4), SymOffset::Exact(4088));
        assert_eq!(
            base.add_strides(Some(&[-8, -16]), 4),
            SymOffset::Set(BTreeSet::from([4080, 4088]))
        );
        assert_eq!(base.add_strides(None, 4), SymOffset::Top);
    }

    #[test]
    fn test_widen() {
        let a = SymOffset::Exact(0);
        assert_eq!(a.widen(&SymOffset::Exact(0)), a);
        assert_eq!(a.widen(&SymOffset::Exact(8)), SymOffset::Top);
        assert!(SymOffset::Top.contains(123));
    }
}
