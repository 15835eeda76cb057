//! Soft-logic rule network.
//!
//! The local update rule is parameterized by four continuous weights
//! (`lambda`, `bias`, `gate_temp`, `diffusion_rate`). The pair
//! (self flow, mean neighbor flow) is pushed through a continuous
//! relaxation of the sixteen two-input logic gates: each gate's
//! probabilistic output is blended by a softmax over the outputs
//! themselves at temperature `gate_temp`, so low temperatures select the
//! strongest gate and high temperatures average the whole gate table.

use lattica_data::{label_for, Cell, TWO_PI};
use serde::{Deserialize, Serialize};

/// Phase advance per unit of flow, radians per tick.
const PHASE_RATE: f64 = 0.1;
/// Flow decay applied to cells with no neighbors.
const ISOLATED_DECAY: f64 = 0.99;
/// EMA smoothing for lambda-sensitivity updates.
const SENSITIVITY_EMA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffLogicParams {
    /// Coupling strength: 1.0 pure gate output, 0.0 pure bias.
    pub lambda: f64,
    /// Resting flow level blended in with weight (1 - lambda).
    pub bias: f64,
    /// Softmax temperature over the gate table.
    pub gate_temp: f64,
    /// Fraction of the mean neighbor flow mixed into the gate output.
    pub diffusion_rate: f64,
}

impl Default for DiffLogicParams {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            bias: 0.5,
            gate_temp: 1.0,
            diffusion_rate: 0.1,
        }
    }
}

impl DiffLogicParams {
    pub fn clamped(self) -> Self {
        Self {
            lambda: self.lambda.clamp(0.0, 1.0),
            bias: self.bias.clamp(0.0, 1.0),
            gate_temp: self.gate_temp.max(1e-3),
            diffusion_rate: self.diffusion_rate.clamp(0.0, 1.0),
        }
    }
}

/// Executable local update rule. Exhaustive enum so new rule families are
/// added as variants, not trait objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ruleset {
    DiffLogic(DiffLogicParams),
}

impl Ruleset {
    pub fn id(&self) -> &'static str {
        match self {
            Ruleset::DiffLogic(_) => "difflogic",
        }
    }

    /// Produces the successor cell from the previous tick's values. Pure:
    /// identical inputs always give identical outputs.
    pub fn apply(&self, cell: &Cell, neighbors: &[&Cell]) -> Cell {
        match self {
            Ruleset::DiffLogic(params) => apply_difflogic(params, cell, neighbors),
        }
    }
}

/// Builds the executable ruleset from optimizer-suggested parameters.
pub fn build_difflogic_ruleset(params: DiffLogicParams) -> Ruleset {
    Ruleset::DiffLogic(params.clamped())
}

fn apply_difflogic(params: &DiffLogicParams, cell: &Cell, neighbors: &[&Cell]) -> Cell {
    if neighbors.is_empty() {
        // Isolated cells decay instead of running the gate network, so
        // boundary artifacts cannot dominate the parameter search.
        let flow = cell.sigma_flow * ISOLATED_DECAY;
        return Cell {
            coord: cell.coord,
            state: label_for(flow, cell.lambda_sensitivity),
            sigma_flow: flow,
            phi_phase: (cell.phi_phase + flow * PHASE_RATE).rem_euclid(TWO_PI),
            lambda_sensitivity: cell.lambda_sensitivity,
        };
    }

    let n = neighbors.len() as f64;
    let avg_flow = neighbors.iter().map(|c| c.sigma_flow).sum::<f64>() / n;
    let variance = neighbors
        .iter()
        .map(|c| {
            let d = c.sigma_flow - avg_flow;
            d * d
        })
        .sum::<f64>()
        / n;

    let gated = soft_gate_network(cell.sigma_flow, avg_flow, params.gate_temp);
    let diffused = (1.0 - params.diffusion_rate) * gated + params.diffusion_rate * avg_flow;
    let flow = (params.lambda * diffused + (1.0 - params.lambda) * params.bias).clamp(0.0, 1.0);

    let sensitivity = ((1.0 - SENSITIVITY_EMA) * cell.lambda_sensitivity
        + SENSITIVITY_EMA * (variance * 4.0).min(1.0))
    .clamp(0.0, 1.0);

    Cell {
        coord: cell.coord,
        state: label_for(flow, sensitivity),
        sigma_flow: flow,
        phi_phase: (cell.phi_phase + flow * PHASE_RATE).rem_euclid(TWO_PI),
        lambda_sensitivity: sensitivity,
    }
}

/// Probabilistic relaxations of the sixteen two-input boolean gates.
///
/// Inputs in [0, 1] are treated as independent truth probabilities; each
/// entry is the probability the gate outputs true.
fn gate_table(a: f64, b: f64) -> [f64; 16] {
    let ab = a * b;
    [
        0.0,               // FALSE
        ab,                // AND
        a - ab,            // A AND NOT B
        a,                 // A
        b - ab,            // NOT A AND B
        b,                 // B
        a + b - 2.0 * ab,  // XOR
        a + b - ab,        // OR
        1.0 - (a + b - ab),       // NOR
        1.0 - (a + b - 2.0 * ab), // XNOR
        1.0 - b,           // NOT B
        1.0 - b + ab,      // B IMPLIES A
        1.0 - a,           // NOT A
        1.0 - a + ab,      // A IMPLIES B
        1.0 - ab,          // NAND
        1.0,               // TRUE
    ]
}

/// Temperature-weighted soft selection over the gate table.
///
/// At low temperature this approaches the strongest gate's output; at
/// high temperature it approaches the table mean.
fn soft_gate_network(self_flow: f64, neighbor_flow: f64, temp: f64) -> f64 {
    let outputs = gate_table(self_flow, neighbor_flow);
    let temp = temp.max(1e-3);
    let max = outputs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    for &g in &outputs {
        let w = ((g - max) / temp).exp();
        weight_sum += w;
        value_sum += w * g;
    }
    (value_sum / weight_sum).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_data::{Cell, CellState, Coord};

    fn cell_with_flow(flow: f64) -> Cell {
        Cell::new(Coord::new(0, 0, 0), flow, 0.0)
    }

    #[test]
    fn test_gate_table_boolean_corners() {
        let t = gate_table(1.0, 0.0);
        assert_eq!(t[0], 0.0); // FALSE
        assert_eq!(t[1], 0.0); // AND
        assert_eq!(t[3], 1.0); // A
        assert_eq!(t[6], 1.0); // XOR
        assert_eq!(t[7], 1.0); // OR
        assert_eq!(t[15], 1.0); // TRUE
    }

    #[test]
    fn test_soft_gate_output_in_unit_interval() {
        for &a in &[0.0, 0.25, 0.5, 0.75, 1.0] {
            for &b in &[0.0, 0.3, 0.9] {
                for &t in &[0.01, 0.5, 1.0, 2.0] {
                    let out = soft_gate_network(a, b, t);
                    assert!((0.0..=1.0).contains(&out), "out={out} a={a} b={b} t={t}");
                }
            }
        }
    }

    #[test]
    fn test_low_temperature_approaches_max_gate() {
        // The TRUE gate always outputs 1.0, so the cold limit is ~1.0.
        let out = soft_gate_network(0.3, 0.4, 1e-3);
        assert!(out > 0.95, "cold softmax should select TRUE gate, got {out}");
    }

    #[test]
    fn test_isolated_cell_decays() {
        let params = DiffLogicParams {
            lambda: 1.0,
            bias: 0.0,
            gate_temp: 1.0,
            diffusion_rate: 0.0,
        };
        let ruleset = build_difflogic_ruleset(params);
        let mut cell = cell_with_flow(0.8);
        for tick in 1..=5 {
            cell = ruleset.apply(&cell, &[]);
            let expected = 0.8 * 0.99f64.powi(tick);
            assert!((cell.sigma_flow - expected).abs() < 1e-12, "tick {tick}");
        }
    }

    #[test]
    fn test_zero_lambda_pins_flow_to_bias() {
        let params = DiffLogicParams {
            lambda: 0.0,
            bias: 0.7,
            gate_temp: 1.0,
            diffusion_rate: 0.2,
        };
        let ruleset = build_difflogic_ruleset(params);
        let neighbor = cell_with_flow(0.3);
        let next = ruleset.apply(&cell_with_flow(0.9), &[&neighbor]);
        assert!((next.sigma_flow - 0.7).abs() < 1e-12);
        assert_eq!(next.state, CellState::Stable);
    }

    #[test]
    fn test_apply_is_pure() {
        let ruleset = build_difflogic_ruleset(DiffLogicParams::default());
        let cell = cell_with_flow(0.4);
        let neighbor = cell_with_flow(0.6);
        let a = ruleset.apply(&cell, &[&neighbor]);
        let b = ruleset.apply(&cell, &[&neighbor]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_phase_advances_by_flow_fraction() {
        let params = DiffLogicParams {
            lambda: 0.0,
            bias: 0.5,
            gate_temp: 1.0,
            diffusion_rate: 0.0,
        };
        let ruleset = build_difflogic_ruleset(params);
        let neighbor = cell_with_flow(0.5);
        let next = ruleset.apply(&cell_with_flow(0.5), &[&neighbor]);
        assert!((next.phi_phase - 0.05).abs() < 1e-12);
    }
}
