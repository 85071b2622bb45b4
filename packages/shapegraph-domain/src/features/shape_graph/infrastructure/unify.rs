//! Unification (weighted union-find over cells)
//!
//! `unify(a, b)` makes cell `a` and cell `b` the same address. The class
//! representative is the stack if involved, otherwise the node with more
//! fields (ties: smaller id); the other node forwards to it with the offset
//! shift between the two frames. Field maps are unioned, equal fields unify
//! their targets and overlapping fields are coalesced, all through one
//! explicit worklist.

use crate::features::numeric::NumValue;
use crate::features::shape_graph::domain::{
    field_end, Cell, DomainError, DomainResult, FieldKey, NodeData, NodeId, NodeKind, NodeSlot, RangeSet,
};
use crate::features::shape_graph::infrastructure::graph::ShapeGraph;
use tracing::{debug, trace};

/// How numeric values of merged integer nodes are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Join,
    Widen,
}

pub(crate) fn join_kinds<N: NumValue>(a: &NodeKind<N>, b: &NodeKind<N>, mode: MergeMode) -> NodeKind<N> {
    match (a, b) {
        (NodeKind::Summarized { collapsed: c1 }, NodeKind::Summarized { collapsed: c2 }) => {
            NodeKind::Summarized { collapsed: *c1 || *c2 }
        }
        (NodeKind::Summarized { collapsed }, _) | (_, NodeKind::Summarized { collapsed }) => {
            NodeKind::Summarized { collapsed: *collapsed }
        }
        (NodeKind::Integer(x), NodeKind::Integer(y)) => NodeKind::Integer(match mode {
            MergeMode::Join => x.join(y),
            MergeMode::Widen => x.widen(y),
        }),
        _ => NodeKind::Structured,
    }
}

/// True if the sorted fields are one wide field plus a partition of it
/// Width of `[lo, hi)` if it fits a field
fn span_width(lo: i64, hi: i64) -> Option<u32> {
    hi.checked_sub(lo).and_then(|w| u32::try_from(w).ok())
}

pub(crate) fn is_exact_tiling(cluster: &[(FieldKey, Cell)]) -> bool {
    let lo = cluster.iter().map(|((o, _), _)| *o).min().unwrap_or(0);
    let hi = cluster.iter().map(|(k, _)| field_end(*k)).max().unwrap_or(0);
    let Some(width) = span_width(lo, hi) else { return false };
    let wide = (lo, width);
    if !cluster.iter().any(|(k, _)| *k == wide) {
        return false;
    }
    let tiles: Vec<FieldKey> = cluster.iter().map(|(k, _)| *k).filter(|k| *k != wide).collect();
    !tiles.is_empty() && partitions(&tiles, lo, hi)
}

/// True if the sorted keys cover `[lo, hi)` back to back with no overlap
pub(crate) fn partitions(keys: &[FieldKey], lo: i64, hi: i64) -> bool {
    let mut reach = lo;
    for (o, w) in keys {
        if *o != reach {
            return false;
        }
        reach = field_end((*o, *w));
    }
    reach == hi
}

impl<N: NumValue> ShapeGraph<N> {
    pub fn unify(&mut self, a: Cell, b: Cell) -> DomainResult<()> {
        self.unify_all(vec![(a, b)])
    }

    /// Drain a worklist of cell pairs to unify
    pub(crate) fn unify_all(&mut self, mut pending: Vec<(Cell, Cell)>) -> DomainResult<()> {
        let mut steps = 0usize;
        while let Some((x, y)) = pending.pop() {
            steps += 1;
            let rx = self.resolve(x);
            let ry = self.resolve(y);

            if rx.node == ry.node {
                if rx.offset != ry.offset {
                    if rx.node == self.stack {
                        return Err(DomainError::stack_collapse(format!(
                            "unifying stack offsets {} and {}",
                            rx.offset, ry.offset
                        )));
                    }
                    self.collapse_into(rx.node, &mut pending)?;
                }
                continue;
            }

            let (rep, other, shift) = self.pick_representative(rx, ry)?;
            trace!(rep = %rep, absorbed = %other, shift, "unify");
            let data = self.take_node(other, NodeSlot::Forward { rep, shift })?;
            self.merge_data(rep, data, shift, MergeMode::Join, &mut pending)?;
        }
        if steps > 1 {
            trace!(steps, "unification cascade");
        }
        Ok(())
    }

    /// Returns (representative, absorbed, shift from absorbed frame to representative frame)
    fn pick_representative(&self, x: Cell, y: Cell) -> DomainResult<(NodeId, NodeId, i64)> {
        let x_wins = if x.node == self.stack {
            true
        } else if y.node == self.stack {
            false
        } else {
            let fx = self.node(x.node)?.fields.len();
            let fy = self.node(y.node)?.fields.len();
            if fx != fy {
                fx > fy
            } else {
                x.node < y.node
            }
        };
        Ok(if x_wins {
            (x.node, y.node, x.offset.wrapping_sub(y.offset))
        } else {
            (y.node, x.node, y.offset.wrapping_sub(x.offset))
        })
    }

    /// Fold `data` (in a frame shifted by `shift`) into the live node `rep`
    pub(crate) fn merge_data(
        &mut self,
        rep: NodeId,
        data: NodeData<N>,
        shift: i64,
        mode: MergeMode,
        pending: &mut Vec<(Cell, Cell)>,
    ) -> DomainResult<()> {
        let (rep_collapsed, kind) = {
            let current = self.node(rep)?;
            (current.kind.is_collapsed(), join_kinds(&current.kind, &data.kind, mode))
        };
        if rep == self.stack && kind.is_summarized() {
            return Err(DomainError::stack_collapse("merging a summarized node into the stack"));
        }

        {
            let node = self.node_mut(rep)?;
            node.flags = node.flags.join(&data.flags);
        }

        if kind.is_collapsed() {
            if !rep_collapsed {
                self.collapse_into(rep, pending)?;
            }
            pending.extend(data.fields.into_values().map(|t| (t, Cell::new(rep, 0))));
            return Ok(());
        }

        let node = self.node_mut(rep)?;
        node.kind = kind;
        if !data.unknown.is_empty() {
            node.unknown.union_with(&data.unknown.shifted(shift));
        }
        let mut added = false;
        for ((o, w), target) in data.fields {
            let key = (o.wrapping_add(shift), w);
            match node.fields.get(&key) {
                Some(existing) => pending.push((*existing, target)),
                None => {
                    node.fields.insert(key, target);
                    added = true;
                }
            }
        }
        if added {
            self.reconcile_overlaps(rep, pending)?;
        }
        Ok(())
    }

    /// Weak field update: unify with an equal field or add and reconcile
    pub(crate) fn add_field_weak(
        &mut self,
        id: NodeId,
        key: FieldKey,
        target: Cell,
        pending: &mut Vec<(Cell, Cell)>,
    ) -> DomainResult<()> {
        let node = self.node_mut(id)?;
        if node.kind.is_collapsed() {
            pending.push((target, Cell::new(id, 0)));
            return Ok(());
        }
        if let Some(existing) = node.fields.get(&key) {
            pending.push((*existing, target));
            return Ok(());
        }
        node.fields.insert(key, target);
        self.reconcile_overlaps(id, pending)
    }

    /// Coalesce clusters of overlapping fields into one field spanning the
    /// cluster, unifying their targets. Exact tilings survive under the
    /// optimistic overlap policy; a cluster too wide for one field collapses
    /// the node.
    pub(crate) fn reconcile_overlaps(&mut self, id: NodeId, pending: &mut Vec<(Cell, Cell)>) -> DomainResult<()> {
        let accepts_tilings = self.policy().accepts_tilings();
        let node = self.node(id)?;

        let mut clusters: Vec<Vec<(FieldKey, Cell)>> = Vec::new();
        let mut current: Vec<(FieldKey, Cell)> = Vec::new();
        let mut current_end = i64::MIN;
        for (key, target) in node.fields.iter() {
            let end = field_end(*key);
            if !current.is_empty() && key.0 < current_end {
                current.push((*key, *target));
                current_end = current_end.max(end);
            } else {
                if current.len() > 1 {
                    clusters.push(std::mem::take(&mut current));
                }
                current = vec![(*key, *target)];
                current_end = end;
            }
        }
        if current.len() > 1 {
            clusters.push(current);
        }

        let mut spans = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            if accepts_tilings && is_exact_tiling(&cluster) {
                continue;
            }
            let lo = cluster[0].0 .0;
            let hi = cluster.iter().map(|(k, _)| field_end(*k)).max().unwrap_or(lo);
            match span_width(lo, hi) {
                Some(width) => spans.push((lo, width, cluster)),
                None => {
                    debug!(node = %id, lo, hi, "overlapping fields span more than one field can hold");
                    return self.collapse_into(id, pending);
                }
            }
        }

        let node = self.node_mut(id)?;
        for (lo, width, cluster) in spans {
            let hi = field_end((lo, width));
            let keep = cluster[0].1;
            for (key, _) in &cluster {
                node.fields.remove(key);
            }
            node.fields.insert((lo, width), keep);
            pending.extend(cluster[1..].iter().map(|(_, t)| (keep, *t)));
            debug!(node = %id, lo, hi, fields = cluster.len(), "coalesced overlapping fields");
        }
        Ok(())
    }

    /// Smash a node into a collapsed self-referential summary
    pub fn collapse(&mut self, id: NodeId) -> DomainResult<()> {
        let id = self.find_node(id);
        let mut pending = Vec::new();
        self.collapse_into(id, &mut pending)?;
        self.unify_all(pending)
    }

    pub(crate) fn collapse_into(&mut self, id: NodeId, pending: &mut Vec<(Cell, Cell)>) -> DomainResult<()> {
        if id == self.stack {
            return Err(DomainError::stack_collapse("smashing the stack node"));
        }
        let node = self.node_mut(id)?;
        if node.kind.is_collapsed() {
            return Ok(());
        }
        node.kind = NodeKind::Summarized { collapsed: true };
        node.unknown = RangeSet::new();
        let fields = std::mem::take(&mut node.fields);
        debug!(node = %id, fields = fields.len(), "collapsing node");
        pending.extend(fields.into_values().map(|t| (t, Cell::new(id, 0))));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OverlapPolicy, ShapeConfig};
    use crate::features::numeric::{ConstantValue, NumValue};
    use crate::features::shape_graph::domain::Region;
    use crate::features::shape_graph::infrastructure::allocator::NodeAllocator;

    type Graph = ShapeGraph<ConstantValue>;

    fn heap(g: &mut Graph) -> NodeId {
        g.mk_node(NodeKind::Structured, Region::Heap)
    }

    #[test]
    fn test_unify_chain_has_single_representative() {
        let mut g = Graph::new(NodeAllocator::default());
        let (a, b, c) = (heap(&mut g), heap(&mut g), heap(&mut g));
        g.unify(Cell::new(a, 0), Cell::new(b, 8)).unwrap();
        g.unify(Cell::new(b, 0), Cell::new(c, 0)).unwrap();
        let ra = g.find_node(a);
        assert_eq!(ra, g.find_node(b));
        assert_eq!(ra, g.find_node(c));
        // (a, 0) ~ (b, 8), and (b, 0) ~ (c, 0)
        assert_eq!(g.find(Cell::new(a, 0)), g.find(Cell::new(c, 8)));
    }

    #[test]
    fn test_representative_prefers_stack_then_fields() {
        let mut g = Graph::new(NodeAllocator::default());
        let small = heap(&mut g);
        let big = heap(&mut g);
        let t = heap(&mut g);
        g.mk_link(Cell::new(big, 0), 8, Cell::new(t, 0)).unwrap();
        g.unify(Cell::new(small, 0), Cell::new(big, 0)).unwrap();
        assert_eq!(g.find_node(small), big);

        let stack = g.stack();
        g.unify(Cell::new(big, 0), Cell::new(stack, 4000)).unwrap();
        assert_eq!(g.find_node(big), stack);
        assert_eq!(g.get_succ(Cell::new(stack, 4000), 8), Some(Cell::new(t, 0)));
    }

    #[test]
    fn test_equal_fields_unify_targets() {
        let mut g = Graph::new(NodeAllocator::default());
        let (a, b, ta, tb) = (heap(&mut g), heap(&mut g), heap(&mut g), heap(&mut g));
        g.mk_link(Cell::new(a, 8), 8, Cell::new(ta, 0)).unwrap();
        g.mk_link(Cell::new(b, 8), 8, Cell::new(tb, 0)).unwrap();
        g.unify(Cell::new(a, 0), Cell::new(b, 0)).unwrap();
        assert_eq!(g.find_node(ta), g.find_node(tb));
    }

    #[test]
    fn test_overlapping_fields_are_coalesced() {
        let mut g = Graph::new(NodeAllocator::default());
        let (a, b, ta, tb) = (heap(&mut g), heap(&mut g), heap(&mut g), heap(&mut g));
        g.mk_link(Cell::new(a, 0), 8, Cell::new(ta, 0)).unwrap();
        g.mk_link(Cell::new(b, 4), 8, Cell::new(tb, 0)).unwrap();
        g.unify(Cell::new(a, 0), Cell::new(b, 0)).unwrap();
        let rep = g.find_node(a);
        let keys: Vec<_> = g.node(rep).unwrap().fields.keys().copied().collect();
        assert_eq!(keys, vec![(0, 12)]);
        assert_eq!(g.find_node(ta), g.find_node(tb));
    }

    #[test]
    fn test_coalescing_past_field_width_collapses() {
        let mut g = Graph::new(NodeAllocator::default());
        let (a, b, ta, tb) = (heap(&mut g), heap(&mut g), heap(&mut g), heap(&mut g));
        g.mk_link(Cell::new(a, 0), u32::MAX, Cell::new(ta, 0)).unwrap();
        g.mk_link(Cell::new(b, 16), u32::MAX, Cell::new(tb, 0)).unwrap();
        g.unify(Cell::new(a, 0), Cell::new(b, 0)).unwrap();
        let rep = g.find_node(a);
        let node = g.node(rep).unwrap();
        assert!(node.kind.is_collapsed());
        assert!(node.fields.is_empty());
        assert_eq!(g.find_node(ta), rep);
        assert_eq!(g.find_node(tb), rep);
    }

    #[test]
    fn test_optimistic_policy_keeps_tilings() {
        let config = ShapeConfig::default().overlap_policy(OverlapPolicy::Optimistic);
        let mut g = Graph::new(NodeAllocator::from_config(&config));
        let (a, b) = (heap(&mut g), heap(&mut g));
        let wide = g.mk_integer(ConstantValue::top());
        let lo = g.mk_integer(ConstantValue::constant(1));
        let hi = g.mk_integer(ConstantValue::constant(2));
        g.mk_link(Cell::new(a, 0), 8, wide).unwrap();
        g.mk_link(Cell::new(b, 0), 4, lo).unwrap();
        g.mk_link(Cell::new(b, 4), 4, hi).unwrap();
        g.unify(Cell::new(a, 0), Cell::new(b, 0)).unwrap();
        let rep = g.find_node(a);
        assert_eq!(g.node(rep).unwrap().fields.len(), 3);
    }

    #[test]
    fn test_same_node_different_offsets_collapses() {
        let mut g = Graph::new(NodeAllocator::default());
        let (a, t) = (heap(&mut g), heap(&mut g));
        g.mk_link(Cell::new(a, 16), 8, Cell::new(t, 0)).unwrap();
        g.unify(Cell::new(a, 0), Cell::new(a, 8)).unwrap();
        let rep = g.find_node(a);
        assert!(g.node(rep).unwrap().kind.is_collapsed());
        // the old field target folded into the summary
        assert_eq!(g.find_node(t), rep);
    }

    #[test]
    fn test_stack_never_collapses() {
        let mut g = Graph::new(NodeAllocator::default());
        let stack = g.stack();
        let err = g.unify(Cell::new(stack, 0), Cell::new(stack, 8)).unwrap_err();
        assert!(matches!(err, DomainError::StackCollapse { .. }));
        assert!(matches!(g.collapse(stack), Err(DomainError::StackCollapse { .. })));
    }

    #[test]
    fn test_integer_nodes_join_values() {
        let mut g = Graph::new(NodeAllocator::default());
        let x = g.mk_integer(ConstantValue::constant(1));
        let y = g.mk_integer(ConstantValue::constant(1));
        g.unify(x, y).unwrap();
        assert_eq!(g.integer_at(x), Some(ConstantValue::constant(1)));
        let z = g.mk_integer(ConstantValue::constant(2));
        g.unify(x, z).unwrap();
        assert_eq!(g.integer_at(y), Some(ConstantValue::top()));
    }
}
