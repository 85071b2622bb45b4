//! Graph transfer functions: load, store, memcpy, memset, select
//!
//! Every function concretizes its symbolic operands first. Exact (structured)
//! nodes get strong updates, summarized nodes weak updates; collapsed nodes
//! absorb everything into their single self-referential cell.

use crate::features::numeric::NumValue;
use crate::features::shape_graph::domain::{
    field_end, Cell, DomainError, DomainResult, FieldKey, NodeId, NodeKind, Region, SymCell, SymOffset, UNBOUNDED,
};
use crate::features::shape_graph::infrastructure::graph::ShapeGraph;
use crate::features::shape_graph::infrastructure::unify::{partitions, MergeMode};
use tracing::{debug, trace};

/// How an access range lines up with the fields of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// No field overlaps the range
    Empty,
    /// A field has exactly this (offset, width)
    Exact,
    /// Fields inside the range cover it exactly (optimistic policy only)
    Tiled,
    Incompatible,
}

/// Value written by a store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue<N> {
    Pointer(Cell),
    Number(N),
}

/// Bytes `[shift, shift + width)` of a little-endian constant
pub(crate) fn extract_bytes(value: i64, shift: i64, width: u32) -> Option<i64> {
    if !(0..8).contains(&shift) || width == 0 || shift + width as i64 > 8 {
        return None;
    }
    let v = (value as u64) >> (8 * shift as u32);
    Some(if width >= 8 { v as i64 } else { (v & ((1u64 << (8 * width)) - 1)) as i64 })
}

/// End of `[lo, lo + len)`, `None` when it does not fit in an offset
fn range_end(lo: i64, len: u64) -> Option<i64> {
    i64::try_from(len).ok().and_then(|l| lo.checked_add(l))
}

/// `[base + offset, base + offset + width)` of a load or store
fn access_range(base: i64, offset: i64, width: u32) -> DomainResult<(i64, i64)> {
    base.checked_add(offset)
        .and_then(|lo| Some((lo, range_end(lo, width as u64)?)))
        .ok_or(DomainError::AddressOverflow { base, offset, len: width as u64 })
}

/// Little-endian composition of constant tiles covering `[lo, lo + 8)` at most
fn compose_bytes(tiles: &[(FieldKey, i64)], lo: i64) -> Option<i64> {
    let mut acc: u64 = 0;
    for ((o, w), v) in tiles {
        let part = extract_bytes(*v, 0, *w)? as u64;
        let shift = o - lo;
        if shift + *w as i64 > 8 {
            return None;
        }
        acc |= part << (8 * shift as u32);
    }
    Some(acc as i64)
}

impl<N: NumValue> ShapeGraph<N> {
    /// Resolve a symbolic cell to a concrete one
    ///
    /// A non-exact offset collapses a non-stack node (the result is its only
    /// cell) and is an error on the stack.
    pub fn concretize(&mut self, sym: &SymCell) -> DomainResult<Cell> {
        let root = self.resolve(Cell::new(sym.node, 0));
        match &sym.offset {
            SymOffset::Exact(k) => Ok(self.find(root.shifted(*k))),
            offset => {
                if root.node == self.stack {
                    return Err(DomainError::unrepresentable(format!(
                        "stack offset {} is not a single constant",
                        offset.shift(root.offset)
                    )));
                }
                if !self.node(root.node)?.kind.is_collapsed() {
                    debug!(node = %root.node, %offset, "collapsing on non-exact offset");
                    self.collapse(root.node)?;
                }
                Ok(self.find(Cell::new(root.node, 0)))
            }
        }
    }

    /// Concretize a dereferenced pointer; integer leaves are demoted first
    fn deref(&mut self, sym: &SymCell) -> DomainResult<Cell> {
        let cell = self.concretize(sym)?;
        if self.node(cell.node)?.kind.is_integer() {
            debug!(node = %cell.node, "dereferencing an integer node");
            self.collapse(cell.node)?;
            return Ok(self.find(cell));
        }
        Ok(cell)
    }

    pub fn region_compatibility(&self, id: NodeId, offset: i64, width: u32) -> DomainResult<Compatibility> {
        let node = self.node(self.find_node(id))?;
        if node.field(offset, width).is_some() {
            return Ok(Compatibility::Exact);
        }
        let hi = offset.saturating_add(width as i64);
        let overlapping = node.overlapping(offset, hi);
        if overlapping.is_empty() {
            return Ok(Compatibility::Empty);
        }
        if !self.policy().accepts_tilings() {
            return Ok(Compatibility::Incompatible);
        }
        if overlapping.iter().any(|(k, _)| k.0 < offset || field_end(*k) > hi) {
            return Ok(Compatibility::Incompatible);
        }
        // nested tilings are fine as long as there is no gap
        let mut reach = offset;
        for (k, _) in &overlapping {
            if k.0 > reach {
                return Ok(Compatibility::Incompatible);
            }
            reach = reach.max(field_end(*k));
        }
        Ok(if reach == hi { Compatibility::Tiled } else { Compatibility::Incompatible })
    }

    /// Strong invalidation of `[lo, hi)` in an exact node
    ///
    /// Residues of partially overlapping fields become fresh integer fields
    /// under the optimistic policy when the old target was an integer;
    /// otherwise they are dropped, or marked unknown on the stack.
    pub fn kill_range(&mut self, id: NodeId, lo: i64, hi: i64) -> DomainResult<()> {
        let accepts_tilings = self.policy().accepts_tilings();
        let is_stack = id == self.stack;
        let overlapping = self.node(id)?.overlapping(lo, hi);
        if overlapping.is_empty() {
            return Ok(());
        }

        let mut residues = Vec::new();
        for (key, target) in &overlapping {
            let (o, end) = (key.0, field_end(*key));
            let is_int = self.integer_at(*target).is_some();
            if o < lo {
                residues.push((o, lo, is_int));
            }
            if end > hi {
                residues.push((hi, end, is_int));
            }
        }

        let node = self.node_mut(id)?;
        for (key, _) in &overlapping {
            node.fields.remove(key);
        }
        for (a, b, is_int) in residues {
            let key = (a, (b - a) as u32);
            if accepts_tilings && is_int {
                if !self.node(id)?.fields.contains_key(&key) {
                    let cell = self.mk_integer(N::top());
                    self.node_mut(id)?.fields.insert(key, cell);
                }
            } else if is_stack {
                self.node_mut(id)?.unknown.insert(a, b);
            }
        }
        trace!(node = %id, lo, hi, killed = overlapping.len(), "kill range");
        Ok(())
    }

    /// `*(base + offset)` reading `width` bytes; returns the cell loaded
    pub fn load(&mut self, base: &SymCell, offset: i64, width: u32) -> DomainResult<Cell> {
        let at = self.deref(base)?;
        let id = at.node;
        let is_stack = id == self.stack;
        let (collapsed, summarized) = {
            let node = self.node_mut(id)?;
            node.mark_read();
            (node.kind.is_collapsed(), node.kind.is_summarized())
        };
        if collapsed {
            return Ok(Cell::new(id, 0));
        }

        let (lo, hi) = access_range(at.offset, offset, width)?;
        let node = self.node(id)?;
        if is_stack && node.unknown.overlaps(lo, hi) {
            return Err(DomainError::UnknownRegion { offset: lo, end: hi });
        }
        if let Some(target) = node.field(lo, width) {
            return Ok(self.find(target));
        }

        let overlapping = node.overlapping(lo, hi);
        if overlapping.is_empty() {
            let kind = if summarized {
                NodeKind::Summarized { collapsed: false }
            } else {
                NodeKind::Structured
            };
            let fresh = self.mk_node(kind, Region::External);
            self.node_mut(id)?.fields.insert((lo, width), Cell::new(fresh, 0));
            trace!(node = %id, offset = lo, width, fresh = %fresh, "materialized field");
            return Ok(Cell::new(fresh, 0));
        }

        let integers: Option<Vec<(FieldKey, N)>> = overlapping
            .iter()
            .map(|(k, t)| self.integer_at(*t).map(|v| (*k, v)))
            .collect();

        if is_stack {
            let accepts_tilings = self.policy().accepts_tilings();
            if let Some(value) = integers.as_deref().and_then(|ints| reconstruct(ints, lo, width)) {
                let cell = self.mk_integer(value);
                if accepts_tilings {
                    self.node_mut(id)?.fields.insert((lo, width), cell);
                }
                trace!(offset = lo, width, "reconstructed integer from stack fields");
                return Ok(cell);
            }
            if accepts_tilings && self.region_compatibility(id, lo, width)? == Compatibility::Tiled {
                let cell = self.mk_integer(N::top());
                self.node_mut(id)?.fields.insert((lo, width), cell);
                return Ok(cell);
            }
            return Err(DomainError::IncompatibleStackAccess { offset: lo, end: hi });
        }

        if integers.is_some() {
            return Ok(self.mk_integer(N::top()));
        }
        debug!(node = %id, offset = lo, width, "overlapping read of pointer fields");
        self.collapse(id)?;
        Ok(self.find(Cell::new(id, 0)))
    }

    /// `*(base + offset) = value` writing `width` bytes; returns the cell written
    pub fn store(&mut self, base: &SymCell, offset: i64, width: u32, value: StoreValue<N>) -> DomainResult<Cell> {
        let at = self.deref(base)?;
        let id = at.node;
        let (collapsed, exact) = {
            let node = self.node_mut(id)?;
            node.mark_written();
            (node.kind.is_collapsed(), node.kind.is_exact())
        };
        if collapsed {
            if let StoreValue::Pointer(cell) = value {
                self.unify(cell, Cell::new(id, 0))?;
            }
            return Ok(self.find(Cell::new(id, 0)));
        }

        let (lo, hi) = access_range(at.offset, offset, width)?;
        if id == self.stack && self.node(id)?.unknown.overlaps(lo, hi) {
            return Err(DomainError::UnknownRegion { offset: lo, end: hi });
        }

        let target = match value {
            StoreValue::Pointer(cell) => cell,
            StoreValue::Number(v) => self.mk_integer(v),
        };
        if exact {
            self.kill_range(id, lo, hi)?;
            self.node_mut(id)?.fields.insert((lo, width), target);
            trace!(node = %id, offset = lo, width, target = %target, "strong update");
        } else {
            let mut pending = Vec::new();
            self.add_field_weak(id, (lo, width), target, &mut pending)?;
            self.unify_all(pending)?;
            trace!(node = %id, offset = lo, width, target = %target, "weak update");
        }
        Ok(Cell::new(id, lo))
    }

    /// `memcpy(dst, src, len)`; `None` length means unknown. Returns the
    /// concretized (dst, src).
    pub fn memcpy(&mut self, dst: &SymCell, src: &SymCell, len: Option<u64>) -> DomainResult<(Cell, Cell)> {
        let d = self.deref(dst)?;
        let s = self.deref(src)?;
        self.node_mut(s.node)?.mark_read();
        self.node_mut(d.node)?.mark_written();
        let stack = self.stack;

        // a range that does not fit in an offset is as good as unbounded
        let len = len.and_then(|l| {
            let fits = range_end(d.offset, l).is_some()
                && range_end(s.offset, l).is_some()
                && d.offset.checked_sub(s.offset).is_some();
            if !fits {
                debug!(dst = %d, src = %s, len = l, "memcpy range overflows, length unknown");
            }
            fits.then_some(l as i64)
        });
        let len = match len {
            Some(l) => l,
            None => {
                if d.node != stack && s.node != stack {
                    self.unify(d, s)?;
                    return Ok((self.find(d), self.find(s)));
                }
                for cell in [d, s] {
                    if cell.node == stack && self.node(stack)?.has_structure_from(cell.offset) {
                        return Err(DomainError::UnboundedStackOperation { operation: "memcpy", offset: cell.offset });
                    }
                }
                if d.node == stack {
                    self.node_mut(stack)?.unknown.insert(d.offset, UNBOUNDED);
                } else {
                    self.collapse(d.node)?;
                }
                return Ok((self.find(d), self.find(s)));
            }
        };

        let d_kind = self.node(d.node)?.kind.clone();
        let s_kind = self.node(s.node)?.kind.clone();
        if d_kind.is_exact() {
            if s_kind.is_collapsed() {
                if d.node == stack {
                    self.kill_range(stack, d.offset, d.offset + len)?;
                    self.node_mut(stack)?.unknown.insert(d.offset, d.offset + len);
                } else {
                    self.unify(d, s)?;
                }
            } else if s_kind.is_exact() || d.node == stack {
                self.copy_fields(d, s, len)?;
            } else {
                self.unify(d, s)?;
            }
        } else if s.node == stack {
            self.copy_fields_weak(d, s, len)?;
        } else {
            self.unify(d, s)?;
        }
        Ok((self.find(d), self.find(s)))
    }

    /// Strong field-wise copy of `[s, s + len)` to `[d, d + len)`
    fn copy_fields(&mut self, d: Cell, s: Cell, len: i64) -> DomainResult<()> {
        let (slo, shi) = (s.offset, s.offset + len);
        let delta = d.offset - s.offset;
        let src = self.node(s.node)?;
        let overlapping = src.overlapping(slo, shi);
        let src_unknown = src.unknown.clipped(slo, shi).shifted(delta);

        let mut copies = Vec::new();
        let mut partial_ints = Vec::new();
        let mut partial_ptrs = Vec::new();
        for ((o, w), target) in overlapping {
            let end = field_end((o, w));
            if o >= slo && end <= shi {
                copies.push(((o + delta, w), target));
                continue;
            }
            let (a, b) = (o.max(slo) + delta, end.min(shi) + delta);
            if self.integer_at(target).is_some() {
                partial_ints.push((a, (b - a) as u32));
            } else {
                partial_ptrs.push((a, b));
            }
        }

        let (dlo, dhi) = (d.offset, d.offset + len);
        self.kill_range(d.node, dlo, dhi)?;
        let to_stack = d.node == self.stack;
        if to_stack {
            self.node_mut(d.node)?.unknown.remove(dlo, dhi);
        }
        let copied = copies.len();
        for (key, target) in copies {
            self.node_mut(d.node)?.fields.insert(key, target);
        }
        for key in partial_ints {
            let cell = self.mk_integer(N::top());
            self.node_mut(d.node)?.fields.insert(key, cell);
        }
        if to_stack {
            let node = self.node_mut(d.node)?;
            for (a, b) in partial_ptrs {
                node.unknown.insert(a, b);
            }
            node.unknown.union_with(&src_unknown);
        }
        trace!(dst = %d, src = %s, len, copied, "memcpy fields");
        Ok(())
    }

    /// Weak copy of stack fields into a summarized destination
    fn copy_fields_weak(&mut self, d: Cell, s: Cell, len: i64) -> DomainResult<()> {
        let (slo, shi) = (s.offset, s.offset + len);
        let delta = d.offset - s.offset;
        let inside: Vec<_> = self
            .node(s.node)?
            .overlapping(slo, shi)
            .into_iter()
            .filter(|(k, _)| k.0 >= slo && field_end(*k) <= shi)
            .collect();
        let mut pending = Vec::new();
        for ((o, w), target) in inside {
            self.add_field_weak(d.node, (o + delta, w), target, &mut pending)?;
        }
        self.unify_all(pending)
    }

    /// `memset(dst, _, len)`; `None` length, or one running past the end of
    /// the offset range, means unknown. Returns the concretized dst.
    pub fn memset(&mut self, dst: &SymCell, len: Option<u64>) -> DomainResult<Cell> {
        let d = self.deref(dst)?;
        let (exact, collapsed) = {
            let node = self.node_mut(d.node)?;
            node.mark_written();
            (node.kind.is_exact(), node.kind.is_collapsed())
        };
        let is_stack = d.node == self.stack;
        match len.and_then(|l| range_end(d.offset, l)) {
            Some(hi) => {
                if exact {
                    self.kill_range(d.node, d.offset, hi)?;
                    if is_stack {
                        self.node_mut(d.node)?.unknown.remove(d.offset, hi);
                    }
                }
            }
            None if is_stack => {
                if self.node(d.node)?.has_structure_from(d.offset) {
                    return Err(DomainError::UnboundedStackOperation { operation: "memset", offset: d.offset });
                }
                self.node_mut(d.node)?.unknown.insert(d.offset, UNBOUNDED);
            }
            None => {
                if !collapsed {
                    debug!(node = %d.node, "unbounded memset smashes node");
                    self.collapse(d.node)?;
                }
            }
        }
        Ok(self.find(d))
    }

    /// Merge two pointer values flowing into one register (select, join)
    ///
    /// Same node: offsets joined. Different non-stack nodes: unified.
    /// Stack vs anything else: `None` (the register is dropped).
    pub fn merge_pointers(&mut self, a: &SymCell, b: &SymCell, mode: MergeMode) -> DomainResult<Option<SymCell>> {
        let ra = self.resolve(Cell::new(a.node, 0));
        let rb = self.resolve(Cell::new(b.node, 0));
        let oa = a.offset.shift(ra.offset);
        let ob = b.offset.shift(rb.offset);

        if ra.node == rb.node {
            if self.node(ra.node)?.kind.is_collapsed() {
                return Ok(Some(SymCell::new(ra.node, SymOffset::Exact(0))));
            }
            let offset = match mode {
                MergeMode::Join => oa.join(&ob, self.policy().max_offset_set()),
                MergeMode::Widen => oa.widen(&ob),
            };
            return Ok(Some(SymCell::new(ra.node, offset)));
        }
        if ra.node == self.stack || rb.node == self.stack {
            return Ok(None);
        }
        let ca = self.concretize(&SymCell::new(ra.node, oa))?;
        let cb = self.concretize(&SymCell::new(rb.node, ob))?;
        self.unify(ca, cb)?;
        Ok(Some(SymCell::exact(self.find(ca))))
    }
}

/// Integer value read over integer fields that do not match the access exactly
fn reconstruct<N: NumValue>(ints: &[(FieldKey, N)], lo: i64, width: u32) -> Option<N> {
    let hi = lo + width as i64;
    if let [((o, w), v)] = ints {
        if *o <= lo && hi <= field_end((*o, *w)) {
            let value = v
                .as_constant()
                .and_then(|c| extract_bytes(c, lo - o, width))
                .map_or_else(N::top, N::constant);
            return Some(value);
        }
    }
    let keys: Vec<FieldKey> = ints.iter().map(|(k, _)| *k).collect();
    if ints.len() > 1 && partitions(&keys, lo, hi) {
        let constants: Option<Vec<(FieldKey, i64)>> =
            ints.iter().map(|(k, v)| v.as_constant().map(|c| (*k, c))).collect();
        let value = constants
            .and_then(|tiles| compose_bytes(&tiles, lo))
            .map_or_else(N::top, N::constant);
        return Some(value);
    }
    None
}
