//! Trace analysis engine.
//!
//! Layers quantitative evaluation on top of cycle detection and value
//! functions: exact closed forms when a trace is ultimately periodic,
//! quantitative inclusion between traces, and the safety/liveness
//! decomposition that justifies the fitness design (never collapse to
//! zero activity; reward structured bursts above the floor).

use crate::cycles::{find_cycles, Cycle};
use crate::value::{evaluate, ValueKind};
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Map-then-reduce: weigh every trace state, evaluate the value function
/// over the finite window. `None` on an empty trace.
pub fn top_value<T, W>(trace: &[T], mut weight_fn: W, kind: ValueKind) -> Option<f64>
where
    W: FnMut(&T) -> f64,
{
    if trace.is_empty() {
        return None;
    }
    let weights: Vec<f64> = trace.iter().map(|s| weight_fn(s)).collect();
    evaluate(kind, &weights)
}

/// Like [`top_value`], but exact when the trace is ultimately periodic.
///
/// A detected cycle gives the value function's closed form over the
/// infinite unrolling (the cycle mean *is* the limit average, not an
/// approximation). Without a cycle, or for kinds with no infinite closed
/// form, this falls back to the finite-window computation; it never
/// errors.
pub fn top_value_with_cycles<T, W>(trace: &[T], mut weight_fn: W, kind: ValueKind) -> Option<f64>
where
    T: Clone + Eq + Hash,
    W: FnMut(&T) -> f64,
{
    if trace.is_empty() {
        return None;
    }
    let weights: Vec<f64> = trace.iter().map(|s| weight_fn(s)).collect();
    match find_cycles(trace) {
        Some(cycle) => closed_form(&cycle, &weights, kind).or_else(|| evaluate(kind, &weights)),
        None => evaluate(kind, &weights),
    }
}

fn closed_form<T>(cycle: &Cycle<T>, weights: &[f64], kind: ValueKind) -> Option<f64> {
    let prefix = &weights[..cycle.cycle_start];
    let body = &weights[cycle.cycle_start..cycle.cycle_start + cycle.cycle_length];
    let body_min = body.iter().cloned().fold(f64::INFINITY, f64::min);
    let body_max = body.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    match kind {
        ValueKind::Inf => Some(prefix.iter().cloned().fold(body_min, f64::min)),
        ValueKind::Sup => Some(prefix.iter().cloned().fold(body_max, f64::max)),
        ValueKind::LimInf => Some(body_min),
        ValueKind::LimSup => Some(body_max),
        ValueKind::LimInfAvg | ValueKind::LimSupAvg => {
            Some(body.iter().sum::<f64>() / body.len() as f64)
        }
        // An infinite unrolling has no finite sum; use the window.
        ValueKind::Sum => None,
        ValueKind::Discount(gamma) => {
            if !(0.0..1.0).contains(&gamma) {
                return None;
            }
            let mut acc = 0.0;
            let mut pow = 1.0;
            for &w in prefix {
                acc += w * pow;
                pow *= gamma;
            }
            let mut body_acc = 0.0;
            let mut body_pow = 1.0;
            for &w in body {
                body_acc += w * body_pow;
                body_pow *= gamma;
            }
            // pow is gamma^mu here; the cycle repeats with ratio gamma^lambda.
            Some(acc + pow * body_acc / (1.0 - gamma.powi(body.len() as i32)))
        }
    }
}

/// Quantitative inclusion: is the behavior of `a` bounded by the envelope
/// of `b` under `kind`? `None` when either trace is empty.
pub fn trace_included<T, W>(a: &[T], b: &[T], mut weight_fn: W, kind: ValueKind) -> Option<bool>
where
    T: Clone + Eq + Hash,
    W: FnMut(&T) -> f64,
{
    let va = top_value_with_cycles(a, &mut weight_fn, kind)?;
    let vb = top_value_with_cycles(b, &mut weight_fn, kind)?;
    Some(va <= vb)
}

/// Longest prefix whose running-minimum weight stays at or above
/// `threshold`: the provable, finite part of a safety property.
pub fn safety_prefix<T, W>(trace: &[T], mut weight_fn: W, threshold: f64) -> usize
where
    W: FnMut(&T) -> f64,
{
    trace
        .iter()
        .take_while(|s| weight_fn(s) >= threshold)
        .count()
}

/// Result of splitting a trace's value into a guaranteed floor and the
/// liveness improvement above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessDecomposition {
    /// Minimum sustained weight over the trace.
    pub safety_floor: f64,
    /// The trace's limit-average value.
    pub value: f64,
    /// Improvement of the value above the floor.
    pub liveness_delta: f64,
    /// Indices where the running maximum strictly improved.
    pub witnesses: Vec<usize>,
}

/// Splits a trace's value into safety floor plus liveness delta, with the
/// states where improvement occurred as witnesses.
pub fn liveness_decomposition<T, W>(trace: &[T], mut weight_fn: W) -> Option<LivenessDecomposition>
where
    T: Clone + Eq + Hash,
    W: FnMut(&T) -> f64,
{
    if trace.is_empty() {
        return None;
    }
    let weights: Vec<f64> = trace.iter().map(|s| weight_fn(s)).collect();
    let floor = weights.iter().cloned().fold(f64::INFINITY, f64::min);
    let value = top_value_with_cycles(trace, |s| weight_fn(s), ValueKind::LimSupAvg)?;

    let mut witnesses = Vec::new();
    let mut running_max = f64::NEG_INFINITY;
    for (idx, &w) in weights.iter().enumerate() {
        if w > running_max {
            running_max = w;
            if idx > 0 {
                witnesses.push(idx);
            }
        }
    }

    Some(LivenessDecomposition {
        safety_floor: floor,
        value,
        liveness_delta: value - floor,
        witnesses,
    })
}

/// Indices of traces not dominated across `kinds`.
///
/// Trace `a` is dominated by `b` when `value(a) <= value(b)` for every
/// kind with at least one strict inequality.
pub fn pareto_frontier<T, W>(traces: &[Vec<T>], mut weight_fn: W, kinds: &[ValueKind]) -> Vec<usize>
where
    T: Clone + Eq + Hash,
    W: FnMut(&T) -> f64,
{
    let scores: Vec<Vec<f64>> = traces
        .iter()
        .map(|trace| {
            kinds
                .iter()
                .map(|&kind| {
                    top_value_with_cycles(trace, |s| weight_fn(s), kind).unwrap_or(f64::NEG_INFINITY)
                })
                .collect()
        })
        .collect();

    (0..traces.len())
        .filter(|&i| {
            !scores.iter().enumerate().any(|(j, other)| {
                j != i
                    && scores[i].iter().zip(other).all(|(a, b)| a <= b)
                    && scores[i].iter().zip(other).any(|(a, b)| a < b)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(trace: &[i64]) -> Vec<i64> {
        trace.to_vec()
    }

    #[test]
    fn test_top_value_maps_then_reduces() {
        let trace = identity(&[1, 2, 3]);
        let v = top_value(&trace, |&s| s as f64 * 2.0, ValueKind::Sup);
        assert_eq!(v, Some(6.0));
    }

    #[test]
    fn test_cycle_average_is_exact() {
        // prefix [0], then cycle [2, 4] forever: limit average is 3.
        let trace = vec![0i64, 2, 4, 2, 4, 2, 4];
        let v = top_value_with_cycles(&trace, |&s| s as f64, ValueKind::LimSupAvg).unwrap();
        assert_eq!(v, 3.0);
    }

    #[test]
    fn test_cycle_and_window_agree_over_two_periods() {
        let mut trace = vec![9i64];
        for _ in 0..100 {
            trace.extend_from_slice(&[4, 6]);
        }
        let exact = top_value_with_cycles(&trace, |&s| s as f64, ValueKind::LimSupAvg).unwrap();
        let windowed = top_value(&trace, |&s| s as f64, ValueKind::LimSupAvg).unwrap();
        assert!((exact - windowed).abs() < 0.05, "{exact} vs {windowed}");
    }

    #[test]
    fn test_acyclic_trace_falls_back() {
        let trace = identity(&[5, 4, 3, 2, 1]);
        let with_cycles = top_value_with_cycles(&trace, |&s| s as f64, ValueKind::Inf);
        let plain = top_value(&trace, |&s| s as f64, ValueKind::Inf);
        assert_eq!(with_cycles, plain);
    }

    #[test]
    fn test_discount_closed_form_geometric() {
        // Constant 1.0 cycle from the start: sum gamma^i = 1 / (1 - gamma).
        // A constant sequence cycles with length 1 and no prefix.
        let trace = vec![1i64, 1, 1, 1];
        let gamma = 0.5;
        let v = top_value_with_cycles(&trace, |&s| s as f64, ValueKind::Discount(gamma)).unwrap();
        assert!((v - 2.0).abs() < 1e-12, "got {v}");
    }

    #[test]
    fn test_trace_included_reflexive_and_ordered() {
        let low = identity(&[1, 1, 1, 1]);
        let high = identity(&[3, 3, 3, 3]);
        let w = |s: &i64| *s as f64;
        assert_eq!(trace_included(&low, &low, w, ValueKind::LimSupAvg), Some(true));
        assert_eq!(trace_included(&low, &high, w, ValueKind::LimSupAvg), Some(true));
        assert_eq!(trace_included(&high, &low, w, ValueKind::LimSupAvg), Some(false));
    }

    #[test]
    fn test_safety_prefix_stops_at_violation() {
        let trace = identity(&[5, 4, 3, 1, 5, 5]);
        assert_eq!(safety_prefix(&trace, |&s| s as f64, 3.0), 3);
        assert_eq!(safety_prefix(&trace, |&s| s as f64, 10.0), 0);
        assert_eq!(safety_prefix(&trace, |&s| s as f64, 0.0), 6);
    }

    #[test]
    fn test_liveness_decomposition_floor_plus_delta() {
        let trace = identity(&[1, 3, 2, 3, 2, 3]);
        let d = liveness_decomposition(&trace, |&s| s as f64).unwrap();
        assert_eq!(d.safety_floor, 1.0);
        assert!((d.safety_floor + d.liveness_delta - d.value).abs() < 1e-12);
        // Running max improves at index 1 (3 > 1).
        assert_eq!(d.witnesses, vec![1]);
    }

    #[test]
    fn test_pareto_frontier_drops_dominated() {
        let traces = vec![
            identity(&[1, 1, 1, 1]), // dominated by the next trace
            identity(&[2, 2, 2, 2]),
            identity(&[0, 4, 0, 4]), // higher sup, lower inf: incomparable
        ];
        let frontier = pareto_frontier(
            &traces,
            |&s| s as f64,
            &[ValueKind::Inf, ValueKind::Sup],
        );
        assert_eq!(frontier, vec![1, 2]);
    }
}
