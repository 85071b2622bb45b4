//! Textual and Graphviz dumps of a shape graph
//!
//! `Display` prints one line per live node followed by its fields:
//!
//! ```text
//! n0 structured RW|stack unknown={[0, 8)}
//!   [4088, 8] -> (n3, 0)
//! ```
//!
//! `to_dot` renders records (one port per field) with solid field edges and
//! dashed forwarding edges, for rendering with `dot -Tsvg`.

use crate::features::numeric::NumValue;
use crate::features::shape_graph::domain::{NodeData, NodeKind, NodeSlot};
use crate::features::shape_graph::infrastructure::graph::ShapeGraph;
use std::fmt::{self, Write};

fn kind_label<N: NumValue>(kind: &NodeKind<N>) -> String {
    match kind {
        NodeKind::Structured => "structured".to_string(),
        NodeKind::Summarized { collapsed: false } => "summarized".to_string(),
        NodeKind::Summarized { collapsed: true } => "collapsed".to_string(),
        NodeKind::Integer(v) => format!("int {}", v),
    }
}

fn write_node<N: NumValue>(out: &mut impl Write, data: &NodeData<N>) -> fmt::Result {
    write!(out, "{} {}", kind_label(&data.kind), data.flags)?;
    if !data.unknown.is_empty() {
        write!(out, " unknown={}", data.unknown)?;
    }
    Ok(())
}

impl<N: NumValue> fmt::Display for ShapeGraph<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, data) in self.live_nodes() {
            write!(f, "{} ", id)?;
            write_node(f, data)?;
            if id == self.stack {
                f.write_str(" (stack)")?;
            }
            writeln!(f)?;
            for ((o, w), target) in &data.fields {
                writeln!(f, "  [{}, {}] -> {}", o, w, self.find(*target))?;
            }
        }
        for (address, id) in self.globals() {
            writeln!(f, "global {:#x} = {}", address, self.find_node(id))?;
        }
        Ok(())
    }
}

impl<N: NumValue> ShapeGraph<N> {
    /// Graphviz rendering of every slot, forwarding edges included
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_dot(&mut out);
        out
    }

    fn write_dot(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "digraph shape {{")?;
        writeln!(out, "  rankdir=LR;")?;
        writeln!(out, "  node [shape=record, fontname=monospace];")?;

        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            match self.slot(id) {
                Some(NodeSlot::Live(data)) => {
                    let mut header = String::new();
                    write_node(&mut header, data)?;
                    let ports: Vec<String> = data
                        .fields
                        .keys()
                        .map(|(o, w)| format!("<f{}_{}> {}:{}", o, w, o, w))
                        .collect();
                    let mut label = format!("{} {}", id, escape(&header));
                    if !ports.is_empty() {
                        label = format!("{{{}|{}}}", label, ports.join("|"));
                    }
                    let style = if id == self.stack { ", style=bold" } else { "" };
                    writeln!(out, "  {} [label=\"{}\"{}];", id, label, style)?;
                    for ((o, w), target) in &data.fields {
                        writeln!(
                            out,
                            "  {}:f{}_{} -> {} [label=\"{}\"];",
                            id, o, w, target.node, target.offset
                        )?;
                    }
                }
                Some(NodeSlot::Forward { rep, shift }) => {
                    writeln!(out, "  {} [label=\"{}\", shape=point];", id, id)?;
                    writeln!(out, "  {} -> {} [style=dashed, label=\"+{}\"];", id, rep, shift)?;
                }
                None => {}
            }
        }
        writeln!(out, "}}")
    }
}

fn escape(s: &str) -> String {
    s.replace('|', "\\|")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::numeric::ConstantValue;
    use crate::features::shape_graph::domain::{Cell, Region};
    use crate::features::shape_graph::infrastructure::allocator::NodeAllocator;

    #[test]
    fn test_display_lists_fields() {
        let mut g: ShapeGraph<ConstantValue> = ShapeGraph::new(NodeAllocator::default());
        let h = g.mk_node(NodeKind::Structured, Region::Heap);
        let stack = g.stack();
        g.mk_link(Cell::new(stack, 4088), 8, Cell::new(h, 0)).unwrap();
        let text = g.to_string();
        assert!(text.contains("(stack)"));
        assert!(text.contains("[4088, 8] -> (n1, 0)"));
    }

    #[test]
    fn test_dot_has_forward_edges() {
        let mut g: ShapeGraph<ConstantValue> = ShapeGraph::new(NodeAllocator::default());
        let a = g.mk_node(NodeKind::Structured, Region::Heap);
        let b = g.mk_node(NodeKind::Structured, Region::Heap);
        g.unify(Cell::new(a, 0), Cell::new(b, 4)).unwrap();
        let dot = g.to_dot();
        assert!(dot.starts_with("digraph shape {"));
        assert!(dot.contains("style=dashed"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
