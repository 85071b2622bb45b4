//! Application layer: the memory state driven by the fixpoint solver

pub mod memory_state;
pub mod register_map;

pub use memory_state::MemoryState;
pub use register_map::RegisterMap;
