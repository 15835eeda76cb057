use serde::{Deserialize, Serialize};

/// Langton-lambda critical value targeted by the edge-of-chaos score.
pub const LAMBDA_CRITICAL: f64 = 0.273;
/// Permutation-entropy target at criticality.
pub const ENTROPY_TARGET: f64 = 0.5;
/// Phase-locking target at criticality.
pub const PLV_TARGET: f64 = 0.4;
/// Lyapunov estimates are clamped to this magnitude.
pub const LYAPUNOV_CLAMP: f64 = 2.0;

/// Immutable criticality snapshot produced once per observation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalityMetrics {
    /// Phase-locking value: 1.0 synchronized, 0.0 desynchronized.
    pub plv: f64,
    /// Normalized permutation entropy of the mean-flow series.
    pub entropy: f64,
    /// Fraction of non-quiescent voxels in the latest snapshot.
    pub lambda_hat: f64,
    /// Largest-Lyapunov estimate, clamped to [-2, 2].
    pub lyapunov: f64,
    pub tick: u64,
}

impl Default for CriticalityMetrics {
    /// Neutral priors used while the observation window is under-filled.
    fn default() -> Self {
        Self {
            plv: 0.5,
            entropy: 0.5,
            lambda_hat: 0.0,
            lyapunov: 0.0,
            tick: 0,
        }
    }
}

/// Scores how close a metrics snapshot sits to the critical regime.
///
/// Weighted blend of normalized distances from the critical targets:
/// lambda-hat from 0.273 (0.35), entropy from 0.5 (0.25), PLV from 0.4
/// (0.25) and |Lyapunov| (0.15). Each sub-score is 1.0 at the target and
/// 0.0 at the farthest admissible point, so the blend lands in [0, 1]
/// with 1.0 exactly at criticality.
pub fn compute_edge_score(metrics: &CriticalityMetrics) -> f64 {
    let lambda_score = 1.0 - ((metrics.lambda_hat - LAMBDA_CRITICAL).abs() / (1.0 - LAMBDA_CRITICAL)).min(1.0);
    let entropy_score = 1.0 - ((metrics.entropy - ENTROPY_TARGET).abs() / ENTROPY_TARGET).min(1.0);
    let plv_score = 1.0 - ((metrics.plv - PLV_TARGET).abs() / (1.0 - PLV_TARGET)).min(1.0);
    let lyapunov_score = 1.0 - (metrics.lyapunov.abs() / LYAPUNOV_CLAMP).min(1.0);

    0.35 * lambda_score + 0.25 * entropy_score + 0.25 * plv_score + 0.15 * lyapunov_score
}
