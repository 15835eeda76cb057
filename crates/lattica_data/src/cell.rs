use serde::{Deserialize, Serialize};

pub const TWO_PI: f64 = std::f64::consts::TAU;

/// Integer lattice coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Discrete activity label derived from continuous cell dynamics.
///
/// `Inactive` is the quiescent state for Langton-lambda purposes; every
/// other label counts as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    Inactive,
    Dormant,
    Stable,
    Active,
    Chaotic,
}

impl CellState {
    pub fn is_quiescent(&self) -> bool {
        matches!(self, CellState::Inactive)
    }
}

/// One voxel of the lattice.
///
/// Cells are value types: a tick produces a fresh `Cell` from the previous
/// tick's neighbor values, never mutating in place across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub coord: Coord,
    pub state: CellState,
    /// Continuous activity level in [0, 1].
    pub sigma_flow: f64,
    /// Oscillator phase in [0, 2π).
    pub phi_phase: f64,
    /// EMA of local flow variance in [0, 1].
    pub lambda_sensitivity: f64,
}

impl Cell {
    pub fn new(coord: Coord, sigma_flow: f64, phi_phase: f64) -> Self {
        let sigma_flow = sigma_flow.clamp(0.0, 1.0);
        Self {
            coord,
            state: label_for(sigma_flow, 0.0),
            sigma_flow,
            phi_phase: phi_phase.rem_euclid(TWO_PI),
            lambda_sensitivity: 0.0,
        }
    }
}

/// Maps continuous dynamics onto the discrete state label.
pub fn label_for(flow: f64, lambda_sensitivity: f64) -> CellState {
    if lambda_sensitivity > 0.8 {
        CellState::Chaotic
    } else if flow > 0.8 {
        CellState::Active
    } else if flow > 0.5 {
        CellState::Stable
    } else if flow > 0.2 {
        CellState::Dormant
    } else {
        CellState::Inactive
    }
}

/// Per-cell change produced by one tick, for downstream event emission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellDelta {
    pub coord: Coord,
    pub state: CellState,
    pub sigma_flow: f64,
    pub phi_phase: f64,
    pub lambda_sensitivity: f64,
}

impl From<&Cell> for CellDelta {
    fn from(cell: &Cell) -> Self {
        Self {
            coord: cell.coord,
            state: cell.state,
            sigma_flow: cell.sigma_flow,
            phi_phase: cell.phi_phase,
            lambda_sensitivity: cell.lambda_sensitivity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_thresholds() {
        assert_eq!(label_for(0.1, 0.0), CellState::Inactive);
        assert_eq!(label_for(0.3, 0.0), CellState::Dormant);
        assert_eq!(label_for(0.6, 0.0), CellState::Stable);
        assert_eq!(label_for(0.9, 0.0), CellState::Active);
        assert_eq!(label_for(0.1, 0.9), CellState::Chaotic);
    }

    #[test]
    fn test_cell_new_clamps_and_wraps() {
        let cell = Cell::new(Coord::new(0, 0, 0), 1.5, -1.0);
        assert_eq!(cell.sigma_flow, 1.0);
        assert!(cell.phi_phase >= 0.0 && cell.phi_phase < TWO_PI);
    }
}
