//! # Lattica Core
//!
//! Deterministic computation engine for the Lattica self-optimizing
//! cellular automaton.
//!
//! This crate contains the pure, side-effect-free pieces of the loop:
//! - 3D lattice storage and the tick function (rayon-parallel per cell)
//! - Soft-logic rule networks parameterized by continuous gate weights
//! - Fixed-width binary fingerprint encoding for seeding and hashing
//! - Cycle detection over state sequences (indexed, Brent, Floyd)
//! - Value functions reducing weight sequences to a single scalar
//! - The trace analysis engine (closed-form cycle values, inclusion,
//!   safety/liveness decomposition, Pareto frontiers)
//!
//! Stepping is deterministic given `(grid, ruleset)`; any stochastic
//! effect must be an explicit ruleset parameter, never hidden state.

/// Cycle detection over materialized sequences and generators
pub mod cycles;
/// Fixed-width binary fingerprint encoding
pub mod encoder;
/// Lattice storage, neighborhoods, boundaries and the tick function
pub mod grid;
/// Soft-logic rule networks and ruleset construction
pub mod ruleset;
/// Trace analysis engine built on cycles + value functions
pub mod tae;
/// Value functions over weight sequences
pub mod value;

pub use cycles::{cycle_stats, find_cycles, find_cycles_brent, find_cycles_floyd, Cycle};
pub use encoder::{decode, encode, encoding_stats, Binary, EncodeInput, EncodingStats};
pub use grid::{BoundaryCondition, Grid, GridBounds, NeighborhoodKind};
pub use ruleset::{build_difflogic_ruleset, DiffLogicParams, Ruleset};
pub use tae::{
    liveness_decomposition, pareto_frontier, safety_prefix, top_value, top_value_with_cycles,
    trace_included, LivenessDecomposition,
};
pub use value::{evaluate, Accumulator, ValueKind};
