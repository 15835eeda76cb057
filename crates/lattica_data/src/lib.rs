//! Shared data types for the Lattica self-optimizing cellular automaton.
//!
//! Plain serializable values exchanged between the lattice core, the
//! criticality monitor, the optimizer bridge and external collaborators.

pub mod cell;
pub mod events;
pub mod metrics;
pub mod params;

pub use cell::{label_for, Cell, CellDelta, CellState, Coord, TWO_PI};
pub use events::{
    BudgetPayload, ComputeRequest, ComputeResponse, ComputeStatus, GridConfigPayload,
    MetricsPayload, MetricsSnapshot, VoxelBatch, VoxelUpdate,
};
pub use metrics::{compute_edge_score, CriticalityMetrics, LAMBDA_CRITICAL};
pub use params::{OptimizationState, ParamSpec, ParamValue, Params, SearchSpace, Trial};
