//! Criticality metrics over a rolling observation window.
//!
//! The engine is pure state-in, metrics-out; the actor in `lib.rs` wraps
//! it with message passing and periodic emission. Under-filled windows
//! never fail: each metric falls back to its previous value (neutral
//! defaults before the first full computation).

use lattica_data::{Cell, CriticalityMetrics};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Tuning constants for the metrics window.
///
/// The permutation-entropy embedding dimension, the Lyapunov distance
/// threshold and the divergence horizon are empirical values carried from
/// the reference dynamics; they are configuration, not derived optima.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Rolling window length in ticks.
    pub window: usize,
    /// Publish a metrics snapshot every this many observed ticks.
    pub emit_interval: u64,
    /// Upper bound on voxel pairs sampled for PLV.
    pub pair_cap: usize,
    /// Ordinal pattern length for permutation entropy.
    pub embedding_dim: usize,
    /// Close-pair threshold as a fraction of the series std-dev.
    pub lyapunov_distance_frac: f64,
    /// Maximum steps a pair is followed for divergence estimation.
    pub lyapunov_horizon: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window: 50,
            emit_interval: 10,
            pair_cap: 1000,
            embedding_dim: 3,
            lyapunov_distance_frac: 0.1,
            lyapunov_horizon: 10,
        }
    }
}

/// Rolling-window metrics computation.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    config: MonitorConfig,
    mean_flows: VecDeque<f64>,
    last_phases: Vec<f64>,
    last_active_fraction: f64,
    last: CriticalityMetrics,
    observed_ticks: u64,
}

impl MetricsEngine {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            mean_flows: VecDeque::with_capacity(config.window),
            last_phases: Vec::new(),
            last_active_fraction: 0.0,
            last: CriticalityMetrics::default(),
            observed_ticks: 0,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn observed_ticks(&self) -> u64 {
        self.observed_ticks
    }

    /// Ingests one tick snapshot and recomputes all four metrics.
    pub fn observe(&mut self, tick: u64, voxels: &[Cell]) -> CriticalityMetrics {
        self.observed_ticks += 1;
        if !voxels.is_empty() {
            let mean_flow =
                voxels.iter().map(|c| c.sigma_flow).sum::<f64>() / voxels.len() as f64;
            if self.mean_flows.len() == self.config.window {
                self.mean_flows.pop_front();
            }
            self.mean_flows.push_back(mean_flow);

            self.last_phases = voxels.iter().map(|c| c.phi_phase).collect();
            self.last_active_fraction = voxels
                .iter()
                .filter(|c| !c.state.is_quiescent())
                .count() as f64
                / voxels.len() as f64;
        }

        let flows: Vec<f64> = self.mean_flows.iter().copied().collect();
        let metrics = CriticalityMetrics {
            plv: phase_locking_value(&self.last_phases, self.config.pair_cap)
                .unwrap_or(self.last.plv),
            entropy: permutation_entropy(&flows, self.config.embedding_dim)
                .unwrap_or(self.last.entropy),
            lambda_hat: self.last_active_fraction,
            lyapunov: lyapunov_estimate(
                &flows,
                self.config.lyapunov_distance_frac,
                self.config.lyapunov_horizon,
            )
            .unwrap_or(self.last.lyapunov),
            tick,
        };
        self.last = metrics;
        metrics
    }

    /// Latest computed snapshot (neutral defaults before any observation).
    pub fn current(&self) -> CriticalityMetrics {
        self.last
    }
}

/// Mean resultant length of pairwise phase differences.
///
/// 1.0 means fully synchronized, 0.0 fully desynchronized. Pairs are
/// walked gap-by-gap (all adjacent pairs, then gap two, ...) so the
/// sample stays deterministic and bounded by `pair_cap` on large grids.
pub fn phase_locking_value(phases: &[f64], pair_cap: usize) -> Option<f64> {
    let n = phases.len();
    if n < 2 {
        return None;
    }
    let mut cos_sum = 0.0;
    let mut sin_sum = 0.0;
    let mut count = 0usize;
    'outer: for gap in 1..n {
        for i in 0..n - gap {
            let diff = phases[i] - phases[i + gap];
            cos_sum += diff.cos();
            sin_sum += diff.sin();
            count += 1;
            if count >= pair_cap {
                break 'outer;
            }
        }
    }
    Some((cos_sum * cos_sum + sin_sum * sin_sum).sqrt() / count as f64)
}

/// Shannon entropy of ordinal patterns in `series`, normalized by
/// `log2(dim!)` so the result lands in [0, 1]. `None` when the series is
/// too short to fill at least two patterns (fewer than four samples at
/// the default dimension of three).
pub fn permutation_entropy(series: &[f64], dim: usize) -> Option<f64> {
    if dim < 2 || series.len() < dim + 1 {
        return None;
    }
    let mut counts: std::collections::HashMap<Vec<usize>, usize> = std::collections::HashMap::new();
    let total = series.len() - dim + 1;
    for window in series.windows(dim) {
        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&a, &b| {
            window[a]
                .partial_cmp(&window[b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        *counts.entry(order).or_insert(0) += 1;
    }
    let mut entropy = 0.0;
    for &count in counts.values() {
        let p = count as f64 / total as f64;
        entropy -= p * p.log2();
    }
    let max_entropy = (factorial(dim) as f64).log2();
    Some((entropy / max_entropy).clamp(0.0, 1.0))
}

/// Average log divergence rate over close point pairs of the flow series,
/// clamped to [-2, 2]. `None` when no valid close pair exists.
pub fn lyapunov_estimate(series: &[f64], distance_frac: f64, horizon: usize) -> Option<f64> {
    let n = series.len();
    if n < 4 {
        return None;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let std_dev =
        (series.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64).sqrt();
    if std_dev <= f64::EPSILON {
        // A flat series has no divergence to measure.
        return Some(0.0);
    }
    let threshold = distance_frac * std_dev;

    let mut rate_sum = 0.0;
    let mut pair_count = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let d0 = (series[i] - series[j]).abs();
            if d0 <= f64::EPSILON || d0 >= threshold {
                continue;
            }
            let steps = horizon.min(n - 1 - j);
            if steps == 0 {
                continue;
            }
            let mut pair_rate = 0.0;
            let mut samples = 0usize;
            for k in 1..=steps {
                let dk = (series[i + k] - series[j + k]).abs();
                if dk > f64::EPSILON {
                    pair_rate += (dk / d0).ln() / k as f64;
                    samples += 1;
                }
            }
            if samples > 0 {
                rate_sum += pair_rate / samples as f64;
                pair_count += 1;
            }
        }
    }
    if pair_count == 0 {
        return None;
    }
    Some((rate_sum / pair_count as f64).clamp(-2.0, 2.0))
}

fn factorial(n: usize) -> u64 {
    (1..=n as u64).product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_data::{Cell, Coord};

    fn voxels(specs: &[(f64, f64)]) -> Vec<Cell> {
        specs
            .iter()
            .enumerate()
            .map(|(i, &(flow, phase))| Cell::new(Coord::new(i as i32, 0, 0), flow, phase))
            .collect()
    }

    #[test]
    fn test_plv_synchronized_is_one() {
        let phases = [1.2, 1.2, 1.2, 1.2];
        let plv = phase_locking_value(&phases, 1000).unwrap();
        assert!((plv - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_plv_antiphase_pairs_cancel() {
        // Half the lattice at phase 0, half at pi: pairwise differences
        // split between 0 and pi, so the resultant shrinks.
        let phases = [0.0, std::f64::consts::PI, 0.0, std::f64::consts::PI];
        let plv = phase_locking_value(&phases, 1000).unwrap();
        assert!(plv < 0.5, "got {plv}");
    }

    #[test]
    fn test_plv_respects_pair_cap() {
        let phases: Vec<f64> = (0..100).map(|i| i as f64 * 0.01).collect();
        assert!(phase_locking_value(&phases, 10).is_some());
    }

    #[test]
    fn test_plv_needs_two_voxels() {
        assert_eq!(phase_locking_value(&[0.4], 1000), None);
    }

    #[test]
    fn test_permutation_entropy_monotone_series_is_zero() {
        let series: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let e = permutation_entropy(&series, 3).unwrap();
        assert!(e < 1e-12, "single ordinal pattern, got {e}");
    }

    #[test]
    fn test_permutation_entropy_varied_series_is_positive() {
        let series: Vec<f64> = (0..40).map(|i| ((i * 17) % 13) as f64).collect();
        let e = permutation_entropy(&series, 3).unwrap();
        assert!(e > 0.5 && e <= 1.0, "got {e}");
    }

    #[test]
    fn test_permutation_entropy_short_series_is_none() {
        assert_eq!(permutation_entropy(&[0.1, 0.2, 0.3], 3), None);
    }

    #[test]
    fn test_lyapunov_flat_series_is_zero() {
        let series = vec![0.5; 20];
        assert_eq!(lyapunov_estimate(&series, 0.1, 10), Some(0.0));
    }

    #[test]
    fn test_lyapunov_clamped() {
        let series: Vec<f64> = (0..30).map(|i| (i as f64 * 0.9).sin() * 2f64.powi(i)).collect();
        if let Some(l) = lyapunov_estimate(&series, 0.5, 10) {
            assert!((-2.0..=2.0).contains(&l));
        }
    }

    #[test]
    fn test_engine_underfilled_window_uses_priors() {
        let mut engine = MetricsEngine::new(MonitorConfig::default());
        let m = engine.observe(1, &voxels(&[(0.6, 0.0), (0.6, 0.0)]));
        // One sample cannot fill the entropy embedding: neutral prior holds.
        assert_eq!(m.entropy, 0.5);
        assert_eq!(m.lyapunov, 0.0);
        assert!((m.plv - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_engine_lambda_hat_counts_non_quiescent() {
        let mut engine = MetricsEngine::new(MonitorConfig::default());
        // Flows 0.1 and 0.9: one inactive, one active.
        let m = engine.observe(1, &voxels(&[(0.1, 0.0), (0.9, 1.0)]));
        assert_eq!(m.lambda_hat, 0.5);
    }

    #[test]
    fn test_engine_window_is_bounded() {
        let config = MonitorConfig {
            window: 5,
            ..Default::default()
        };
        let mut engine = MetricsEngine::new(config);
        for tick in 0..20 {
            engine.observe(tick, &voxels(&[(0.5, 0.0), (0.7, 1.0)]));
        }
        assert_eq!(engine.mean_flows.len(), 5);
    }

    #[test]
    fn test_engine_empty_snapshot_is_tolerated() {
        let mut engine = MetricsEngine::new(MonitorConfig::default());
        let m = engine.observe(1, &[]);
        assert_eq!(m.plv, 0.5);
        assert_eq!(m.lambda_hat, 0.0);
    }
}
