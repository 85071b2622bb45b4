//! Abstract memory nodes
//!
//! A node stands for one or more concrete memory objects. Its kind decides how
//! stores are applied:
//! - `Structured`: exactly one object, strong updates
//! - `Summarized`: possibly many objects, weak updates; `collapsed` nodes are
//!   offset-insensitive and point to themselves
//! - `Integer`: leaf holding a numeric value, no fields
//!
//! Kinds only move down that list (structured/integer → summarized →
//! collapsed), never back.

use super::cell::Cell;
use super::range_set::RangeSet;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

/// Node identity, unique within one function analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Access history of a node (monotone)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeAccess {
    #[default]
    None,
    Read,
    Write,
    Any,
}

impl NodeAccess {
    fn bits(self) -> u8 {
        match self {
            NodeAccess::None => 0,
            NodeAccess::Read => 1,
            NodeAccess::Write => 2,
            NodeAccess::Any => 3,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => NodeAccess::None,
            1 => NodeAccess::Read,
            2 => NodeAccess::Write,
            _ => NodeAccess::Any,
        }
    }

    pub fn is_read(self) -> bool {
        self.bits() & 1 != 0
    }

    pub fn is_written(self) -> bool {
        self.bits() & 2 != 0
    }

    pub fn leq(self, other: Self) -> bool {
        self.bits() & !other.bits() == 0
    }
}

impl BitOr for NodeAccess {
    type Output = NodeAccess;

    fn bitor(self, rhs: Self) -> Self {
        NodeAccess::from_bits(self.bits() | rhs.bits())
    }
}

/// Memory region a node may belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Stack,
    Heap,
    Global,
    External,
}

/// Set of regions (may-information)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegionSet(u8);

impl RegionSet {
    pub const EMPTY: RegionSet = RegionSet(0);

    fn bit(region: Region) -> u8 {
        match region {
            Region::Stack => 1,
            Region::Heap => 2,
            Region::Global => 4,
            Region::External => 8,
        }
    }

    pub fn single(region: Region) -> Self {
        RegionSet(Self::bit(region))
    }

    pub fn contains(self, region: Region) -> bool {
        self.0 & Self::bit(region) != 0
    }

    pub fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Region> {
        [Region::Stack, Region::Heap, Region::Global, Region::External]
            .into_iter()
            .filter(move |r| self.contains(*r))
    }
}

impl BitOr for RegionSet {
    type Output = RegionSet;

    fn bitor(self, rhs: Self) -> Self {
        RegionSet(self.0 | rhs.0)
    }
}

/// Classification flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags {
    pub access: NodeAccess,
    pub regions: RegionSet,
}

impl NodeFlags {
    pub fn new(region: Region) -> Self {
        Self {
            access: NodeAccess::None,
            regions: RegionSet::single(region),
        }
    }

    pub fn join(&self, other: &Self) -> Self {
        Self {
            access: self.access | other.access,
            regions: self.regions | other.regions,
        }
    }

    pub fn leq(&self, other: &Self) -> bool {
        self.access.leq(other.access) && self.regions.is_subset(other.regions)
    }
}

impl fmt::Display for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            NodeAccess::None => "-",
            NodeAccess::Read => "R",
            NodeAccess::Write => "W",
            NodeAccess::Any => "RW",
        };
        let regions: Vec<&str> = self
            .regions
            .iter()
            .map(|r| match r {
                Region::Stack => "stack",
                Region::Heap => "heap",
                Region::Global => "global",
                Region::External => "ext",
            })
            .collect();
        write!(f, "{}|{}", access, regions.join("+"))
    }
}

/// Node kind
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<N> {
    Structured,
    Summarized { collapsed: bool },
    Integer(N),
}

impl<N> NodeKind<N> {
    #[inline]
    pub fn is_exact(&self) -> bool {
        matches!(self, NodeKind::Structured)
    }

    #[inline]
    pub fn is_summarized(&self) -> bool {
        matches!(self, NodeKind::Summarized { .. })
    }

    #[inline]
    pub fn is_collapsed(&self) -> bool {
        matches!(self, NodeKind::Summarized { collapsed: true })
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, NodeKind::Integer(_))
    }

    pub fn integer_value(&self) -> Option<&N> {
        match self {
            NodeKind::Integer(v) => Some(v),
            _ => None,
        }
    }
}

/// Field key: (offset, width)
pub type FieldKey = (i64, u32);

/// One past the last byte of a field, saturated at `i64::MAX`
pub fn field_end((offset, width): FieldKey) -> i64 {
    offset.saturating_add(width as i64)
}

/// Live node contents
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData<N> {
    pub kind: NodeKind<N>,
    pub flags: NodeFlags,
    /// Outgoing fields keyed by (offset, width)
    pub fields: BTreeMap<FieldKey, Cell>,
    /// Byte ranges whose contents are unknown (stack only)
    pub unknown: RangeSet,
}

impl<N> NodeData<N> {
    pub fn new(kind: NodeKind<N>, flags: NodeFlags) -> Self {
        Self {
            kind,
            flags,
            fields: BTreeMap::new(),
            unknown: RangeSet::new(),
        }
    }

    pub fn mark_read(&mut self) {
        self.flags.access = self.flags.access | NodeAccess::Read;
    }

    pub fn mark_written(&mut self) {
        self.flags.access = self.flags.access | NodeAccess::Write;
    }

    /// Field at exactly (offset, width)
    pub fn field(&self, offset: i64, width: u32) -> Option<Cell> {
        self.fields.get(&(offset, width)).copied()
    }

    /// Fields overlapping `[lo, hi)`, in offset order
    pub fn overlapping(&self, lo: i64, hi: i64) -> Vec<(FieldKey, Cell)> {
        self.fields
            .range(..(hi, 0))
            .filter(|(k, _)| field_end(**k) > lo)
            .map(|(k, c)| (*k, *c))
            .collect()
    }

    /// True if some field ends above `offset`
    pub fn has_structure_from(&self, offset: i64) -> bool {
        self.fields.keys().any(|k| field_end(*k) > offset)
    }
}

/// Arena slot: either a live node or a union-find forwarding edge
///
/// `Forward { rep, shift }` means cell `(self, o)` is cell `(rep, o + shift)`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSlot<N> {
    Live(NodeData<N>),
    Forward { rep: NodeId, shift: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_is_monotone() {
        let a = NodeAccess::Read | NodeAccess::Write;
        assert_eq!(a, NodeAccess::Any);
        assert!(NodeAccess::Read.leq(NodeAccess::Any));
        assert!(!NodeAccess::Write.leq(NodeAccess::Read));
        assert!(NodeAccess::None.leq(NodeAccess::None));
    }

    #[test]
    fn test_region_set() {
        let s = RegionSet::single(Region::Heap) | RegionSet::single(Region::External);
        assert!(s.contains(Region::Heap));
        assert!(!s.contains(Region::Stack));
        assert!(RegionSet::single(Region::Heap).is_subset(s));
        assert_eq!(s.iter().count(), 2);
    }

    #[test]
    fn test_overlapping_fields() {
        let mut data: NodeData<()> = NodeData::new(NodeKind::Structured, NodeFlags::new(Region::Stack));
        data.fields.insert((0, 8), Cell::new(NodeId(1), 0));
        data.fields.insert((8, 4), Cell::new(NodeId(2), 0));
        data.fields.insert((16, 8), Cell::new(NodeId(3), 0));
        let ov: Vec<_> = data.overlapping(4, 12).into_iter().map(|(k, _)| k).collect();
        assert_eq!(ov, vec![(0, 8), (8, 4)]);
        assert!(data.overlapping(12, 16).is_empty());
        assert!(data.has_structure_from(20));
        assert!(!data.has_structure_from(24));
    }

    #[test]
    fn test_field_end_saturates() {
        assert_eq!(field_end((8, 4)), 12);
        assert_eq!(field_end((i64::MAX - 2, 8)), i64::MAX);
        let mut data: NodeData<()> = NodeData::new(NodeKind::Structured, NodeFlags::new(Region::Heap));
        data.fields.insert((i64::MAX - 2, 8), Cell::new(NodeId(1), 0));
        assert!(data.has_structure_from(i64::MAX - 1));
        assert_eq!(data.overlapping(i64::MAX - 1, i64::MAX).len(), 1);
    }
}
