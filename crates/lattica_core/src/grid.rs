//! Lattice storage and the pure tick function.
//!
//! A `Grid` owns one `Cell` per coordinate plus a strictly increasing tick
//! counter. Stepping never mutates the old grid: every cell of the next
//! tick is produced from the previous tick's neighbor values, which is what
//! makes per-cell rule application safe to run in parallel.

use crate::ruleset::Ruleset;
use lattica_data::{Cell, CellDelta, Coord};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NeighborhoodKind {
    /// Six face-adjacent neighbors.
    #[default]
    VonNeumann,
    /// Full 26-cell cube shell.
    Moore,
    /// Von Neumann neighborhood extended to Manhattan radius `r`.
    Extended(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// Edge cells simply have fewer neighbors.
    #[default]
    Clip,
    /// Toroidal wrap-around.
    Wrap,
    /// Mirror at the boundary.
    Reflect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridBounds {
    pub fn volume(&self) -> usize {
        (self.x as usize) * (self.y as usize) * (self.z as usize)
    }

    fn index_of(&self, coord: Coord) -> usize {
        ((coord.z * self.y + coord.y) * self.x + coord.x) as usize
    }

    fn in_range(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0 && x < self.x && y >= 0 && y < self.y && z >= 0 && z < self.z
    }
}

/// Coordinate-indexed lattice of cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub bounds: GridBounds,
    pub neighborhood: NeighborhoodKind,
    pub boundary: BoundaryCondition,
    pub rule_id: String,
    pub tick: u64,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates an `x * y * z` lattice with every cell at mid flow and
    /// phase zero.
    pub fn create(x: i32, y: i32, z: i32, rule_id: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(
            x > 0 && y > 0 && z > 0,
            "grid bounds must be positive, got ({x}, {y}, {z})"
        );
        let bounds = GridBounds { x, y, z };
        let mut cells = Vec::with_capacity(bounds.volume());
        for cz in 0..z {
            for cy in 0..y {
                for cx in 0..x {
                    cells.push(Cell::new(Coord::new(cx, cy, cz), 0.5, 0.0));
                }
            }
        }
        Ok(Self {
            bounds,
            neighborhood: NeighborhoodKind::default(),
            boundary: BoundaryCondition::default(),
            rule_id: rule_id.to_string(),
            tick: 0,
            cells,
        })
    }

    pub fn with_neighborhood(mut self, kind: NeighborhoodKind) -> Self {
        self.neighborhood = kind;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryCondition) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        if self.bounds.in_range(coord.x, coord.y, coord.z) {
            self.cells.get(self.bounds.index_of(coord))
        } else {
            None
        }
    }

    /// Overwrites a single cell, e.g. when seeding from an encoder
    /// fingerprint. Panics only on out-of-bounds coordinates in tests;
    /// out-of-range writes are ignored here.
    pub fn set_cell(&mut self, cell: Cell) {
        if self.bounds.in_range(cell.coord.x, cell.coord.y, cell.coord.z) {
            let idx = self.bounds.index_of(cell.coord);
            self.cells[idx] = cell;
        }
    }

    /// Neighbor cells of `coord` under the grid's neighborhood and
    /// boundary condition. Under `Clip` the result may be shorter than the
    /// nominal neighborhood size.
    pub fn neighbors(&self, coord: Coord) -> Vec<&Cell> {
        let offsets = neighbor_offsets(self.neighborhood);
        let mut out = Vec::with_capacity(offsets.len());
        for (dx, dy, dz) in offsets {
            let (nx, ny, nz) = (coord.x + dx, coord.y + dy, coord.z + dz);
            let resolved = match self.boundary {
                BoundaryCondition::Clip => {
                    if self.bounds.in_range(nx, ny, nz) {
                        Some((nx, ny, nz))
                    } else {
                        None
                    }
                }
                BoundaryCondition::Wrap => Some((
                    nx.rem_euclid(self.bounds.x),
                    ny.rem_euclid(self.bounds.y),
                    nz.rem_euclid(self.bounds.z),
                )),
                BoundaryCondition::Reflect => Some((
                    reflect(nx, self.bounds.x),
                    reflect(ny, self.bounds.y),
                    reflect(nz, self.bounds.z),
                )),
            };
            if let Some((nx, ny, nz)) = resolved {
                // Wrap/reflect on a degenerate axis can resolve back to the
                // cell itself; a cell is never its own neighbor.
                if (nx, ny, nz) == (coord.x, coord.y, coord.z) {
                    continue;
                }
                out.push(&self.cells[self.bounds.index_of(Coord::new(nx, ny, nz))]);
            }
        }
        out
    }

    /// Advances one tick under `ruleset`, returning the per-cell deltas and
    /// the successor grid. Deterministic given `(self, ruleset)`.
    pub fn step(&self, ruleset: &Ruleset) -> (Vec<CellDelta>, Grid) {
        let next_cells: Vec<Cell> = self
            .cells
            .par_iter()
            .map(|cell| {
                let neighbors = self.neighbors(cell.coord);
                ruleset.apply(cell, &neighbors)
            })
            .collect();

        let deltas: Vec<CellDelta> = next_cells
            .iter()
            .zip(&self.cells)
            .filter(|(next, prev)| next != prev)
            .map(|(next, _)| CellDelta::from(next))
            .collect();

        let next = Grid {
            bounds: self.bounds,
            neighborhood: self.neighborhood,
            boundary: self.boundary,
            rule_id: self.rule_id.clone(),
            tick: self.tick + 1,
            cells: next_cells,
        };
        (deltas, next)
    }

    /// Compact fingerprint of the lattice state, used for cycle detection
    /// without materializing full grids.
    pub fn state_digest(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for cell in &self.cells {
            cell.state.hash(&mut hasher);
            cell.sigma_flow.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn reflect(v: i32, extent: i32) -> i32 {
    if extent == 1 {
        return 0;
    }
    let period = 2 * (extent - 1);
    let m = v.rem_euclid(period);
    if m < extent {
        m
    } else {
        period - m
    }
}

fn neighbor_offsets(kind: NeighborhoodKind) -> Vec<(i32, i32, i32)> {
    match kind {
        NeighborhoodKind::VonNeumann => vec![
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ],
        NeighborhoodKind::Moore => {
            let mut out = Vec::with_capacity(26);
            for dz in -1..=1 {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if (dx, dy, dz) != (0, 0, 0) {
                            out.push((dx, dy, dz));
                        }
                    }
                }
            }
            out
        }
        NeighborhoodKind::Extended(r) => {
            let r = r.max(1) as i32;
            let mut out = Vec::new();
            for dz in -r..=r {
                for dy in -r..=r {
                    for dx in -r..=r {
                        let manhattan = dx.abs() + dy.abs() + dz.abs();
                        if manhattan > 0 && manhattan <= r {
                            out.push((dx, dy, dz));
                        }
                    }
                }
            }
            out
        }
    }
}
