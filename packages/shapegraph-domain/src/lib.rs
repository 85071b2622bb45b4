/*
 * Shapegraph Domain - shape/points-to abstract interpretation for register-machine bytecode
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (Reg, Instruction, InstLocation)
 * - features/    : Vertical slices (numeric → shape_graph → fixpoint)
 * - config/      : Presets + ShapeConfig (YAML)
 *
 * Performance:
 * - Copy-on-write node slots (join of identical graphs is free)
 * - Rayon work-stealing across functions
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Transfer functions need many params
#![allow(clippy::type_complexity)] // Arc'd node tables
#![allow(clippy::should_implement_trait)] // from_str naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::collapsible_else_if)] // else if clarity
#![allow(clippy::module_inception)] // Module naming intentional

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration (presets, policies, numeric strategy)
pub mod config;

/// Crate-wide error types
pub mod errors;

/// Feature slices
pub mod features;

/// Shared models (registers, instructions, locations)
pub mod shared;

pub use config::{JoinPolicy, NumericStrategy, OverlapPolicy, Preset, ShapeConfig};
pub use errors::{Result, ShapeError};
pub use features::fixpoint::{
    Cfg, CfgBuilder, FunctionOutcome, FunctionReport, ProgramAnalyzer, ProgramReport, WorklistSolver,
};
pub use features::numeric::{
    BasicScalars, ConstantSetValue, ConstantValue, IntervalValue, NumValue, ScalarDomain,
};
pub use features::shape_graph::{
    AbstractDomain, Cell, DomainError, DomainResult, MemoryState, NodeAllocator, NodeId, NodeKind,
    NodePolicy, ShapeGraph, SymCell, SymOffset,
};
pub use shared::models::{BinOp, BlockId, CondOp, InstLocation, Instruction, LocatedInstruction, Operand, Reg};
