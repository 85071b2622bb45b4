//! Register file of a memory state

use crate::features::shape_graph::domain::SymCell;
use crate::shared::models::Reg;
use std::fmt;

/// Register -> symbolic cell; unbound registers hold plain numbers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterMap {
    regs: [Option<SymCell>; Reg::COUNT],
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, reg: Reg) -> Option<&SymCell> {
        self.regs[reg.index() as usize].as_ref()
    }

    pub fn set(&mut self, reg: Reg, cell: SymCell) {
        self.regs[reg.index() as usize] = Some(cell);
    }

    pub fn clear(&mut self, reg: Reg) {
        self.regs[reg.index() as usize] = None;
    }

    /// Bound registers in index order
    pub fn iter(&self) -> impl Iterator<Item = (Reg, &SymCell)> + '_ {
        Reg::all().filter_map(move |r| self.get(r).map(|c| (r, c)))
    }
}

impl fmt::Display for RegisterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.iter().map(|(r, c)| format!("{} -> {}", r, c)).collect();
        write!(f, "[{}]", items.join(", "))
    }
}
