//! Cross-boundary event payloads.
//!
//! These shapes are the contract with external collaborators (presentation
//! layer, persistence, event bus); field names are part of the wire format.

use crate::cell::{CellState, Coord};
use crate::params::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfigPayload {
    pub bounds: (i32, i32, i32),
    pub neighborhood_type: String,
    pub boundary_condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPayload {
    pub max_ticks: u64,
    pub timeout_ms: u64,
}

/// Request to evaluate one ruleset on a fresh lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub run_id: Uuid,
    pub trial_id: u64,
    pub rule_params: Params,
    pub grid_config: GridConfigPayload,
    pub budget: BudgetPayload,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeStatus {
    Ok,
    Timeout,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub plv: f64,
    pub entropy: f64,
    pub lambda_hat: f64,
    pub lyapunov: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub run_id: Uuid,
    pub trial_id: u64,
    pub status: ComputeStatus,
    pub fitness: f64,
    pub metrics: MetricsPayload,
    pub suggested_params: Option<Params>,
    pub elapsed_ms: u64,
}

/// Single-voxel change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelUpdate {
    pub run_id: Uuid,
    pub tick: u64,
    pub coord: Coord,
    pub state: CellState,
    pub sigma_flow: f64,
    pub phi_phase: f64,
    pub lambda_sensitivity: f64,
}

/// Batched voxel changes for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelBatch {
    pub run_id: Uuid,
    pub tick: u64,
    pub updates: Vec<VoxelUpdate>,
}

/// Periodic criticality snapshot published by the loop monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub run_id: Uuid,
    pub tick: u64,
    pub plv: f64,
    pub entropy: f64,
    pub lambda_hat: f64,
    pub lyapunov: f64,
    pub edge_of_chaos_score: f64,
    pub sampled_at: DateTime<Utc>,
}
