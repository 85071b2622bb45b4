//! Lattice operations on shape graphs
//!
//! States of one function share node ids through the common allocator, so a
//! join is a replay: slots the other state changed (or added) are unified
//! into a copy of this one. Slots both states still share by `Arc` identity
//! are skipped, which keeps joins proportional to what diverged.
//!
//! The ordering is a simulation: `x ⊑ y` if every node of `x` maps to a node
//! of `y` (with a fixed offset delta) such that kinds, flags and fields are
//! preserved.

use crate::features::numeric::NumValue;
use crate::features::shape_graph::domain::{
    field_end, Cell, DomainResult, FieldKey, NodeData, NodeId, NodeKind, NodeSlot, SymCell,
};
use crate::features::shape_graph::infrastructure::graph::ShapeGraph;
use crate::features::shape_graph::infrastructure::transfer::extract_bytes;
use crate::features::shape_graph::infrastructure::unify::{partitions, MergeMode};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, trace};

impl<N: NumValue> ShapeGraph<N> {
    /// Least upper bound (or widening) of two graphs of the same function
    ///
    /// Returns the merged graph and the ids only `other` knew about.
    pub fn merge_graph(&self, other: &Self, mode: MergeMode) -> DomainResult<(Self, Vec<NodeId>)> {
        let mut out = self.clone();
        if Arc::ptr_eq(&self.nodes, &other.nodes) && Arc::ptr_eq(&self.globals, &other.globals) {
            return Ok((out, Vec::new()));
        }

        let mut imported = Vec::new();
        let mut replay = Vec::new();
        for (id, slot) in other.nodes.iter() {
            match self.nodes.get(id) {
                None => imported.push(*id),
                Some(mine) if Arc::ptr_eq(mine, slot) => {}
                Some(_) => replay.push(*id),
            }
        }
        imported.sort_unstable();
        replay.sort_unstable();

        if !imported.is_empty() {
            let table = Arc::make_mut(&mut out.nodes);
            for id in &imported {
                if let Some(slot) = other.nodes.get(id) {
                    table.insert(*id, Arc::clone(slot));
                }
            }
        }

        let mut pending = Vec::new();
        if !Arc::ptr_eq(&self.globals, &other.globals) {
            for (address, theirs) in other.globals.iter() {
                match self.globals.get(address) {
                    Some(mine) if mine != theirs => pending.push((Cell::new(*mine, 0), Cell::new(*theirs, 0))),
                    Some(_) => {}
                    None => {
                        Arc::make_mut(&mut out.globals).insert(*address, *theirs);
                    }
                }
            }
        }
        out.unify_all(pending)?;

        for id in &replay {
            let Some(slot) = other.nodes.get(id) else { continue };
            match slot.as_ref() {
                NodeSlot::Forward { rep, shift } => {
                    out.unify(Cell::new(*id, 0), Cell::new(*rep, *shift))?;
                }
                NodeSlot::Live(data) => {
                    let root = out.resolve(Cell::new(*id, 0));
                    let mut pending = Vec::new();
                    out.merge_data(root.node, data.clone(), root.offset, mode, &mut pending)?;
                    out.unify_all(pending)?;
                }
            }
        }

        if mode == MergeMode::Widen {
            for id in &imported {
                let rep = out.find_node(*id);
                let summarize = rep != out.stack
                    && out.node(rep).map_or(false, |d| d.kind.is_exact());
                if summarize {
                    out.summarize(rep)?;
                }
            }
        }
        debug!(
            imported = imported.len(),
            replayed = replay.len(),
            live = out.live_count(),
            ?mode,
            "merged graphs"
        );
        Ok((out, imported))
    }

    pub fn join(&self, other: &Self) -> DomainResult<Self> {
        self.merge_graph(other, MergeMode::Join).map(|(g, _)| g)
    }

    /// Join that also summarizes nodes created since `self`
    pub fn widen(&self, other: &Self) -> DomainResult<Self> {
        self.merge_graph(other, MergeMode::Widen).map(|(g, _)| g)
    }

    /// `self ⊑ other` given pairs of cells the registers point to
    pub fn less_or_equal(&self, other: &Self, registers: &[(SymCell, SymCell)]) -> bool {
        if self.same_structure(other) && registers.iter().all(|(a, b)| a.offset.leq(&b.offset) && a.node == b.node) {
            return true;
        }
        let mut sim = Simulation::new(self, other);
        if !sim.seed(registers) {
            trace!("simulation failed on roots");
            return false;
        }
        sim.run()
    }

    /// Split wide integer fields where `other` holds an exact partition of
    /// integer fields at the same place, so equal states compare equal
    pub fn pseudo_canonicalize(&mut self, other: &Self) -> DomainResult<()> {
        let mut splits: Vec<(NodeId, FieldKey, Vec<FieldKey>)> = Vec::new();
        for (id, data) in self.live_nodes() {
            if !data.kind.is_exact() {
                continue;
            }
            let Ok(theirs) = other.node(id) else { continue };
            for ((o, w), target) in &data.fields {
                if theirs.fields.contains_key(&(*o, *w)) || self.integer_at(*target).is_none() {
                    continue;
                }
                let hi = field_end((*o, *w));
                let tiles = theirs.overlapping(*o, hi);
                let keys: Vec<FieldKey> = tiles.iter().map(|(k, _)| *k).collect();
                if keys.len() < 2
                    || !partitions(&keys, *o, hi)
                    || !tiles.iter().all(|(_, t)| other.integer_at(*t).is_some())
                    || data.overlapping(*o, hi).len() != 1
                {
                    continue;
                }
                splits.push((id, (*o, *w), keys));
            }
        }

        for (id, (o, w), tiles) in splits {
            let Some(target) = self.node(id)?.field(o, w) else { continue };
            let value = self.integer_at(target).and_then(|v| v.as_constant());
            self.node_mut(id)?.fields.remove(&(o, w));
            for (to, tw) in tiles {
                let part = value
                    .and_then(|c| extract_bytes(c, to - o, tw))
                    .map_or_else(N::top, N::constant);
                let cell = self.mk_integer(part);
                self.node_mut(id)?.fields.insert((to, tw), cell);
            }
            trace!(node = %id, offset = o, width = w, "split integer field");
        }
        Ok(())
    }
}

fn kind_leq<N: NumValue>(x: &NodeKind<N>, y: &NodeKind<N>) -> bool {
    match (x, y) {
        (NodeKind::Summarized { collapsed: true }, _) => y.is_collapsed(),
        (NodeKind::Summarized { .. }, _) => y.is_summarized(),
        (NodeKind::Integer(a), NodeKind::Integer(b)) => a.leq(b),
        (NodeKind::Integer(_), _) => true,
        (NodeKind::Structured, NodeKind::Integer(_)) => false,
        (NodeKind::Structured, _) => true,
    }
}

/// Node mapping from the smaller graph into the larger one
struct Simulation<'a, N> {
    x: &'a ShapeGraph<N>,
    y: &'a ShapeGraph<N>,
    /// x node -> (y node, offset delta)
    map: FxHashMap<NodeId, (NodeId, i64)>,
    work: Vec<NodeId>,
}

impl<'a, N: NumValue> Simulation<'a, N> {
    fn new(x: &'a ShapeGraph<N>, y: &'a ShapeGraph<N>) -> Self {
        Self {
            x,
            y,
            map: FxHashMap::default(),
            work: Vec::new(),
        }
    }

    fn y_collapsed(&self, id: NodeId) -> bool {
        self.y.node(id).map_or(false, |d| d.kind.is_collapsed())
    }

    fn bind(&mut self, cx: Cell, cy: Cell) -> bool {
        let cx = self.x.find(cx);
        let cy = self.y.find(cy);
        let delta = cy.offset.wrapping_sub(cx.offset);
        match self.map.get(&cx.node) {
            Some((ny, d)) => *ny == cy.node && (*d == delta || self.y_collapsed(*ny)),
            None => {
                self.map.insert(cx.node, (cy.node, delta));
                self.work.push(cx.node);
                true
            }
        }
    }

    fn seed(&mut self, registers: &[(SymCell, SymCell)]) -> bool {
        if !self.bind(Cell::new(self.x.stack, 0), Cell::new(self.y.stack, 0)) {
            return false;
        }
        for (address, idx) in self.x.globals.iter() {
            match self.y.globals.get(address) {
                Some(idy) => {
                    if !self.bind(Cell::new(*idx, 0), Cell::new(*idy, 0)) {
                        return false;
                    }
                }
                None => {
                    let root = self.x.find_node(*idx);
                    if self.x.node(root).map_or(true, |d| !d.fields.is_empty()) {
                        return false;
                    }
                }
            }
        }

        let (exact, symbolic): (Vec<_>, Vec<_>) = registers
            .iter()
            .partition(|(a, b)| a.as_cell().is_some() && b.as_cell().is_some());
        for (a, b) in exact {
            if let (Some(ca), Some(cb)) = (a.as_cell(), b.as_cell()) {
                if !self.bind(ca, cb) {
                    return false;
                }
            }
        }
        for (a, b) in symbolic {
            let rx = self.x.find(Cell::new(a.node, 0));
            let ry = self.y.find(Cell::new(b.node, 0));
            if self.y_collapsed(ry.node) {
                if !self.bind(rx, ry) {
                    return false;
                }
                continue;
            }
            let delta = match self.map.get(&rx.node) {
                Some((ny, d)) if *ny == ry.node => *d,
                Some(_) => return false,
                None => {
                    // states of one function share ids, so x's own frame in y is the natural delta
                    let natural = self.y.find(Cell::new(rx.node, 0));
                    let d = if natural.node == ry.node {
                        natural.offset.wrapping_sub(rx.offset)
                    } else {
                        ry.offset.wrapping_sub(rx.offset)
                    };
                    self.map.insert(rx.node, (ry.node, d));
                    self.work.push(rx.node);
                    d
                }
            };
            let mapped = a.offset.shift(rx.offset.wrapping_add(delta));
            if !mapped.leq(&b.offset.shift(ry.offset)) {
                return false;
            }
        }
        true
    }

    fn run(&mut self) -> bool {
        while let Some(nx) = self.work.pop() {
            let Some((ny, delta)) = self.map.get(&nx).copied() else { return false };
            let (Ok(dx), Ok(dy)) = (self.x.node(nx), self.y.node(ny)) else { return false };
            if !self.node_leq(nx, dx, ny, dy, delta) {
                trace!(x = %nx, y = %ny, delta, "simulation mismatch");
                return false;
            }
        }
        true
    }

    fn node_leq(&mut self, nx: NodeId, dx: &NodeData<N>, ny: NodeId, dy: &NodeData<N>, delta: i64) -> bool {
        if !kind_leq(&dx.kind, &dy.kind) || !dx.flags.leq(&dy.flags) {
            return false;
        }
        if dy.kind.is_collapsed() {
            return dx.fields.values().all(|t| self.bind(*t, Cell::new(ny, 0)));
        }
        if !dx.unknown.shifted(delta).is_subset(&dy.unknown) {
            trace!(x = %nx, "unknown ranges not covered");
            return false;
        }
        for ((o, w), target) in &dx.fields {
            let lo = o.wrapping_add(delta);
            let hi = field_end((lo, *w));
            // exact match, or a coalesced field spanning this one
            let matched = dy.field(lo, *w).or_else(|| {
                dy.overlapping(lo, hi)
                    .into_iter()
                    .find(|(k, _)| k.0 <= lo && hi <= field_end(*k))
                    .map(|(_, t)| t)
            });
            match matched {
                Some(ty) => {
                    if !self.bind(*target, ty) {
                        return false;
                    }
                }
                None if dy.unknown.covers(lo, hi) => {}
                None => return false,
            }
        }
        true
    }
}
