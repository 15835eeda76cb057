//! Value functions over weight sequences.
//!
//! A value function collapses a long (conceptually infinite) weight
//! sequence to one real number. Finite windows stand in for infinite
//! words: the limit variants ignore a transient prefix (the first half of
//! the window) and the averaged variants additionally read the running
//! average only in its stabilized region, so the ordering law
//! `lim_inf <= lim_inf_avg <= lim_sup_avg <= lim_sup` holds on every
//! finite window, exactly as it does for infinite words.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default discount factor, encoding mild time-preference.
pub const DEFAULT_DISCOUNT: f64 = 0.99;

/// Default accumulator window length.
pub const DEFAULT_WINDOW: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Whole-sequence minimum.
    Inf,
    /// Whole-sequence maximum.
    Sup,
    /// Eventual minimum: sup of suffix infima.
    LimInf,
    /// Eventual maximum: inf of suffix suprema.
    LimSup,
    /// Eventual minimum of the running-average sequence.
    LimInfAvg,
    /// Eventual maximum of the running-average sequence. Primary fitness
    /// shape: rewards sustained performance over transient spikes.
    LimSupAvg,
    /// Plain sum; meaningful for finite sequences only.
    Sum,
    /// Discounted sum `sum(w_i * gamma^i)`.
    Discount(f64),
}

/// Evaluates `kind` over a finite window. `None` on an empty window.
pub fn evaluate(kind: ValueKind, weights: &[f64]) -> Option<f64> {
    if weights.is_empty() {
        return None;
    }
    let value = match kind {
        ValueKind::Inf => min_of(weights),
        ValueKind::Sup => max_of(weights),
        ValueKind::LimInf => min_of(tail(weights)),
        ValueKind::LimSup => max_of(tail(weights)),
        ValueKind::LimInfAvg => min_of(stabilized(&running_averages(tail(weights)))),
        ValueKind::LimSupAvg => max_of(stabilized(&running_averages(tail(weights)))),
        ValueKind::Sum => weights.iter().sum(),
        ValueKind::Discount(gamma) => {
            let mut acc = 0.0;
            let mut pow = 1.0;
            for &w in weights {
                acc += w * pow;
                pow *= gamma;
            }
            acc
        }
    };
    Some(value)
}

/// The post-transient suffix of a window.
fn tail(weights: &[f64]) -> &[f64] {
    &weights[weights.len() / 2..]
}

/// Running averages restarted at the suffix start.
fn running_averages(weights: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(weights.len());
    let mut sum = 0.0;
    for (idx, &w) in weights.iter().enumerate() {
        sum += w;
        out.push(sum / (idx + 1) as f64);
    }
    out
}

/// The last quarter of an average sequence, where early-sample noise has
/// decayed.
fn stabilized(averages: &[f64]) -> &[f64] {
    &averages[averages.len() * 3 / 4..]
}

fn min_of(weights: &[f64]) -> f64 {
    weights.iter().cloned().fold(f64::INFINITY, f64::min)
}

fn max_of(weights: &[f64]) -> f64 {
    weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

/// Incremental evaluation without retaining the whole history.
///
/// `Inf`, `Sup`, `Sum` and `Discount` are exact online; the limit
/// variants estimate over a bounded ring of the most recent weights,
/// converging as the transient falls out of the ring.
#[derive(Debug, Clone)]
pub struct Accumulator {
    kind: ValueKind,
    window: VecDeque<f64>,
    capacity: usize,
    count: u64,
    running_min: f64,
    running_max: f64,
    running_sum: f64,
    discount_pow: f64,
}

impl Accumulator {
    pub fn new(kind: ValueKind) -> Self {
        Self::with_window(kind, DEFAULT_WINDOW)
    }

    pub fn with_window(kind: ValueKind, capacity: usize) -> Self {
        Self {
            kind,
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            count: 0,
            running_min: f64::INFINITY,
            running_max: f64::NEG_INFINITY,
            running_sum: 0.0,
            discount_pow: 1.0,
        }
    }

    pub fn accumulate(&mut self, weight: f64) {
        self.count += 1;
        self.running_min = self.running_min.min(weight);
        self.running_max = self.running_max.max(weight);
        match self.kind {
            ValueKind::Sum => self.running_sum += weight,
            ValueKind::Discount(gamma) => {
                self.running_sum += weight * self.discount_pow;
                self.discount_pow *= gamma;
            }
            _ => {}
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(weight);
    }

    /// The running estimate; `None` until at least one weight arrived.
    pub fn current_value(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match self.kind {
            ValueKind::Inf => Some(self.running_min),
            ValueKind::Sup => Some(self.running_max),
            ValueKind::Sum | ValueKind::Discount(_) => Some(self.running_sum),
            _ => {
                let window: Vec<f64> = self.window.iter().copied().collect();
                evaluate(self.kind, &window)
            }
        }
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
