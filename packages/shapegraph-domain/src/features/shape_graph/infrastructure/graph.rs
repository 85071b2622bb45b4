//! Points-to graph arena
//!
//! Nodes live in an `Arc`'d table of `Arc<NodeSlot>`; states share both levels
//! copy-on-write and `Arc::make_mut` clones only what a state touches.
//! Union-find lives in the slots themselves (`NodeSlot::Forward`), chased
//! iteratively. Path compression only rewrites slots this graph uniquely
//! owns, so a lookup never clones a shared slot.
//!
//! # References
//! - Steensgaard, B. "Points-to Analysis in Almost Linear Time" (POPL 1996)
//! - Lattner et al. "Making Context-Sensitive Points-to Analysis with Heap
//!   Cloning Practical For The Real World" (PLDI 2007)

use crate::features::numeric::NumValue;
use crate::features::shape_graph::domain::{
    Cell, DomainError, DomainResult, NodeData, NodeFlags, NodeId, NodeKind, NodeSlot, Region,
};
use crate::features::shape_graph::infrastructure::allocator::NodeAllocator;
use crate::features::shape_graph::ports::NodePolicy;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

pub(crate) type NodeTable<N> = FxHashMap<NodeId, Arc<NodeSlot<N>>>;

/// Union-find graph of abstract memory nodes
#[derive(Debug, Clone)]
pub struct ShapeGraph<N> {
    pub(crate) nodes: Arc<NodeTable<N>>,
    /// Global address -> node (possibly forwarded)
    pub(crate) globals: Arc<BTreeMap<u64, NodeId>>,
    pub(crate) stack: NodeId,
    pub(crate) alloc: NodeAllocator,
}

impl<N: NumValue> ShapeGraph<N> {
    /// Graph holding only the (empty) stack node
    pub fn new(alloc: NodeAllocator) -> Self {
        let stack = alloc.next_id();
        let flags = alloc.policy().initial_flags(Region::Stack);
        let mut table = NodeTable::default();
        table.insert(stack, Arc::new(NodeSlot::Live(NodeData::new(NodeKind::Structured, flags))));
        Self {
            nodes: Arc::new(table),
            globals: Arc::new(BTreeMap::new()),
            stack,
            alloc,
        }
    }

    #[inline]
    pub fn stack(&self) -> NodeId {
        self.stack
    }

    /// Cell `r10` points to at function entry
    pub fn stack_cell(&self) -> Cell {
        Cell::new(self.stack, self.policy().stack_frame_size())
    }

    #[inline]
    pub fn allocator(&self) -> &NodeAllocator {
        &self.alloc
    }

    #[inline]
    pub fn policy(&self) -> &dyn NodePolicy {
        self.alloc.policy()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of slots, forwarding slots included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.nodes.values().filter(|s| matches!(s.as_ref(), NodeSlot::Live(_))).count()
    }

    /// Live nodes in id order
    pub fn live_nodes(&self) -> Vec<(NodeId, &NodeData<N>)> {
        let mut out: Vec<_> = self
            .nodes
            .iter()
            .filter_map(|(id, slot)| match slot.as_ref() {
                NodeSlot::Live(d) => Some((*id, d)),
                NodeSlot::Forward { .. } => None,
            })
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    pub fn slot(&self, id: NodeId) -> Option<&NodeSlot<N>> {
        self.nodes.get(&id).map(|s| s.as_ref())
    }

    /// Contents of a representative node
    pub fn node(&self, id: NodeId) -> DomainResult<&NodeData<N>> {
        match self.slot(id) {
            Some(NodeSlot::Live(d)) => Ok(d),
            _ => Err(DomainError::DanglingNode(id)),
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> DomainResult<&mut NodeData<N>> {
        let table = Arc::make_mut(&mut self.nodes);
        match table.get_mut(&id).map(Arc::make_mut) {
            Some(NodeSlot::Live(d)) => Ok(d),
            _ => Err(DomainError::DanglingNode(id)),
        }
    }

    /// Replace a live slot by `replacement`, returning the old contents
    pub(crate) fn take_node(&mut self, id: NodeId, replacement: NodeSlot<N>) -> DomainResult<NodeData<N>> {
        let table = Arc::make_mut(&mut self.nodes);
        let slot = table.get_mut(&id).ok_or(DomainError::DanglingNode(id))?;
        let old = std::mem::replace(slot, Arc::new(replacement));
        match Arc::try_unwrap(old).unwrap_or_else(|shared| (*shared).clone()) {
            NodeSlot::Live(d) => Ok(d),
            NodeSlot::Forward { .. } => Err(DomainError::DanglingNode(id)),
        }
    }

    /// Chase forwarding edges; cells of collapsed nodes are normalized to offset 0
    pub fn find(&self, cell: Cell) -> Cell {
        let mut cur = cell;
        loop {
            match self.slot(cur.node) {
                Some(NodeSlot::Forward { rep, shift }) => cur = Cell::new(*rep, cur.offset.wrapping_add(*shift)),
                Some(NodeSlot::Live(d)) if d.kind.is_collapsed() => return Cell::new(cur.node, 0),
                _ => return cur,
            }
        }
    }

    #[inline]
    pub fn find_node(&self, id: NodeId) -> NodeId {
        self.find(Cell::new(id, 0)).node
    }

    /// `find` plus path compression on uniquely owned slots
    pub fn resolve(&mut self, cell: Cell) -> Cell {
        let root = self.find(cell);
        let table = match Arc::get_mut(&mut self.nodes) {
            Some(t) => t,
            None => return root,
        };

        // (id, shift from id's frame to the root frame)
        let mut path = Vec::new();
        let mut cur = cell.node;
        let mut acc = 0i64;
        while let Some(NodeSlot::Forward { rep, shift }) = table.get(&cur).map(|s| s.as_ref()) {
            path.push((cur, acc));
            acc = acc.wrapping_add(*shift);
            cur = *rep;
        }
        if path.len() < 2 {
            return root;
        }
        for (id, prefix) in path {
            if let Some(slot) = table.get_mut(&id).and_then(Arc::get_mut) {
                *slot = NodeSlot::Forward {
                    rep: cur,
                    shift: acc.wrapping_sub(prefix),
                };
            }
        }
        root
    }

    /// Create a node with the policy's initial flags
    pub fn mk_node(&mut self, kind: NodeKind<N>, region: Region) -> NodeId {
        let id = self.alloc.next_id();
        let flags = self.alloc.policy().initial_flags(region);
        Arc::make_mut(&mut self.nodes).insert(id, Arc::new(NodeSlot::Live(NodeData::new(kind, flags))));
        trace!(node = %id, ?region, "new node");
        id
    }

    /// Fresh integer leaf holding `value`
    pub fn mk_integer(&mut self, value: N) -> Cell {
        let id = self.alloc.next_id();
        let data = NodeData::new(NodeKind::Integer(value), NodeFlags::default());
        Arc::make_mut(&mut self.nodes).insert(id, Arc::new(NodeSlot::Live(data)));
        Cell::new(id, 0)
    }

    /// Install field `(src.offset, width) -> target` without touching other fields
    pub fn mk_link(&mut self, src: Cell, width: u32, target: Cell) -> DomainResult<()> {
        let src = self.resolve(src);
        self.node_mut(src.node)?.fields.insert((src.offset, width), target);
        Ok(())
    }

    /// Target of the field at exactly `(cell, width)`, resolved
    pub fn get_succ(&self, cell: Cell, width: u32) -> Option<Cell> {
        let cell = self.find(cell);
        let data = self.node(cell.node).ok()?;
        data.field(cell.offset, width).map(|t| self.find(t))
    }

    /// Numeric value of the node `cell` points into, if it is an integer leaf
    pub fn integer_at(&self, cell: Cell) -> Option<N> {
        let data = self.node(self.find_node(cell.node)).ok()?;
        data.kind.integer_value().cloned()
    }

    pub fn is_stack(&self, id: NodeId) -> bool {
        self.find_node(id) == self.stack
    }

    /// Node of a global address, materialized on first use
    pub fn global_node(&mut self, address: u64) -> NodeId {
        if let Some(id) = self.globals.get(&address) {
            return self.find_node(*id);
        }
        let id = self.mk_node(NodeKind::Structured, Region::Global);
        Arc::make_mut(&mut self.globals).insert(address, id);
        id
    }

    pub fn globals(&self) -> impl Iterator<Item = (u64, NodeId)> + '_ {
        self.globals.iter().map(|(a, id)| (*a, *id))
    }

    /// Demote an exact node to a summary (weak updates from now on)
    pub fn summarize(&mut self, id: NodeId) -> DomainResult<()> {
        let id = self.find_node(id);
        if id == self.stack {
            return Err(DomainError::stack_collapse("summarizing the stack node"));
        }
        let data = self.node_mut(id)?;
        if !data.kind.is_summarized() {
            trace!(node = %id, "summarized");
            data.kind = NodeKind::Summarized { collapsed: false };
        }
        Ok(())
    }

    /// Structural identity: same table, or slot-for-slot the same `Arc`s
    pub fn same_structure(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.nodes, &other.nodes) {
            return Arc::ptr_eq(&self.globals, &other.globals) || self.globals == other.globals;
        }
        self.nodes.len() == other.nodes.len()
            && self.globals == other.globals
            && self
                .nodes
                .iter()
                .all(|(id, slot)| other.nodes.get(id).map_or(false, |o| Arc::ptr_eq(slot, o)))
    }

    /// Copy keeping only slots reachable from the stack, globals and `roots`
    pub fn reachable_copy(&self, roots: impl IntoIterator<Item = NodeId>) -> Self {
        let mut seen = FxHashSet::default();
        let mut work: Vec<NodeId> = roots.into_iter().collect();
        work.push(self.stack);
        work.extend(self.globals.values().copied());

        while let Some(id) = work.pop() {
            if !seen.insert(id) {
                continue;
            }
            match self.slot(id) {
                Some(NodeSlot::Forward { rep, .. }) => work.push(*rep),
                Some(NodeSlot::Live(d)) => work.extend(d.fields.values().map(|c| c.node)),
                None => {}
            }
        }

        let table: NodeTable<N> = seen
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|s| (*id, Arc::clone(s))))
            .collect();
        trace!(kept = table.len(), dropped = self.nodes.len() - table.len(), "reachable copy");
        Self {
            nodes: Arc::new(table),
            globals: Arc::clone(&self.globals),
            stack: self.stack,
            alloc: self.alloc.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::numeric::ConstantValue;

    type Graph = ShapeGraph<ConstantValue>;

    #[test]
    fn test_new_graph_has_stack() {
        let g = Graph::new(NodeAllocator::default());
        assert_eq!(g.live_count(), 1);
        assert_eq!(g.stack_cell(), Cell::new(g.stack(), 4096));
        assert!(g.node(g.stack()).unwrap().kind.is_exact());
    }

    #[test]
    fn test_find_follows_shifts() {
        let mut g = Graph::new(NodeAllocator::default());
        let a = g.mk_node(NodeKind::Structured, Region::Heap);
        let b = g.mk_node(NodeKind::Structured, Region::Heap);
        let c = g.mk_node(NodeKind::Structured, Region::Heap);
        g.take_node(a, NodeSlot::Forward { rep: b, shift: 8 }).unwrap();
        g.take_node(b, NodeSlot::Forward { rep: c, shift: 16 }).unwrap();
        assert_eq!(g.find(Cell::new(a, 4)), Cell::new(c, 28));
        assert_eq!(g.resolve(Cell::new(a, 4)), Cell::new(c, 28));
        // compressed: a now forwards straight to c
        assert_eq!(g.slot(a), Some(&NodeSlot::Forward { rep: c, shift: 24 }));
    }

    #[test]
    fn test_resolve_does_not_touch_shared_slots() {
        let mut g = Graph::new(NodeAllocator::default());
        let a = g.mk_node(NodeKind::Structured, Region::Heap);
        let b = g.mk_node(NodeKind::Structured, Region::Heap);
        let c = g.mk_node(NodeKind::Structured, Region::Heap);
        g.take_node(a, NodeSlot::Forward { rep: b, shift: 0 }).unwrap();
        g.take_node(b, NodeSlot::Forward { rep: c, shift: 0 }).unwrap();
        let snapshot = g.clone();
        assert_eq!(g.resolve(Cell::new(a, 0)), Cell::new(c, 0));
        assert!(g.same_structure(&snapshot));
    }

    #[test]
    fn test_globals_and_links() {
        let mut g = Graph::new(NodeAllocator::default());
        let glob = g.global_node(0x1000);
        assert_eq!(g.global_node(0x1000), glob);
        let heap = g.mk_node(NodeKind::Structured, Region::Heap);
        g.mk_link(Cell::new(glob, 8), 8, Cell::new(heap, 0)).unwrap();
        assert_eq!(g.get_succ(Cell::new(glob, 8), 8), Some(Cell::new(heap, 0)));
        assert_eq!(g.get_succ(Cell::new(glob, 8), 4), None);
    }

    #[test]
    fn test_reachable_copy_drops_garbage() {
        let mut g = Graph::new(NodeAllocator::default());
        let live = g.mk_node(NodeKind::Structured, Region::Heap);
        let _garbage = g.mk_node(NodeKind::Structured, Region::Heap);
        let stack_cell = Cell::new(g.stack(), 4088);
        g.mk_link(stack_cell, 8, Cell::new(live, 0)).unwrap();
        let copy = g.reachable_copy(std::iter::empty());
        assert_eq!(copy.live_count(), 2);
        assert!(copy.contains(live));
        assert_eq!(copy.get_succ(stack_cell, 8), Some(Cell::new(live, 0)));
    }
}
