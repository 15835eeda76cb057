//! Ultimate-periodicity detection over state sequences.
//!
//! `find_cycles` works on a materialized sequence in O(n); the Brent and
//! Floyd variants walk a generator in O(mu + lambda) time with O(1) extra
//! state, for trajectories (like full lattices) too expensive to store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// A detected cycle: the sequence repeats `cycle_states` forever starting
/// at `cycle_start`, after a transient prefix of `prefix_length` states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle<T> {
    pub prefix_length: usize,
    pub cycle_start: usize,
    pub cycle_length: usize,
    pub cycle_states: Vec<T>,
}

/// Aggregate weights over one period of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Scans a materialized sequence for a repeat.
///
/// One pass builds a value-to-first-index map and reports the gap between
/// the first two occurrences of the first value that repeats. For
/// sequences whose recurrence gap is not constant this is a heuristic, not
/// a proof of periodicity; callers needing certainty must verify with the
/// generator-based detectors. Sequences of length <= 1 never cycle.
pub fn find_cycles<T: Clone + Eq + Hash>(sequence: &[T]) -> Option<Cycle<T>> {
    if sequence.len() <= 1 {
        return None;
    }
    let mut first_seen: HashMap<&T, usize> = HashMap::with_capacity(sequence.len());
    for (idx, value) in sequence.iter().enumerate() {
        if let Some(&start) = first_seen.get(value) {
            let cycle_length = idx - start;
            return Some(Cycle {
                prefix_length: start,
                cycle_start: start,
                cycle_length,
                cycle_states: sequence[start..idx].to_vec(),
            });
        }
        first_seen.insert(value, idx);
    }
    None
}

/// Brent's algorithm over a generator.
///
/// Doubles a power-of-two search window until the cycle length `lambda` is
/// pinned, then locates the cycle start `mu` with a second aligned pass.
/// `None` after `max_iter` steps means "unknown within budget", never
/// "provably aperiodic".
pub fn find_cycles_brent<T, F>(initial: T, mut next_fn: F, max_iter: usize) -> Option<Cycle<T>>
where
    T: Clone + PartialEq,
    F: FnMut(&T) -> T,
{
    let mut power: usize = 1;
    let mut lambda: usize = 1;
    let mut tortoise = initial.clone();
    let mut hare = next_fn(&initial);
    let mut steps: usize = 1;

    while tortoise != hare {
        if steps >= max_iter {
            return None;
        }
        if power == lambda {
            tortoise = hare.clone();
            power *= 2;
            lambda = 0;
        }
        hare = next_fn(&hare);
        lambda += 1;
        steps += 1;
    }

    // Advance one pointer lambda steps from the start, then walk both in
    // lock step; they meet at the cycle start.
    let mut tortoise = initial.clone();
    let mut hare = initial.clone();
    for _ in 0..lambda {
        hare = next_fn(&hare);
    }
    let mut mu: usize = 0;
    while tortoise != hare {
        tortoise = next_fn(&tortoise);
        hare = next_fn(&hare);
        mu += 1;
        if mu > max_iter {
            return None;
        }
    }

    Some(collect_cycle(tortoise, next_fn, mu, lambda))
}

/// Floyd's tortoise-and-hare over a generator. Same contract as
/// [`find_cycles_brent`].
pub fn find_cycles_floyd<T, F>(initial: T, mut next_fn: F, max_iter: usize) -> Option<Cycle<T>>
where
    T: Clone + PartialEq,
    F: FnMut(&T) -> T,
{
    let mut tortoise = next_fn(&initial);
    let mut hare = next_fn(&tortoise);
    let mut steps: usize = 1;
    while tortoise != hare {
        if steps >= max_iter {
            return None;
        }
        tortoise = next_fn(&tortoise);
        let half = next_fn(&hare);
        hare = next_fn(&half);
        steps += 1;
    }

    let mut tortoise = initial;
    let mut mu: usize = 0;
    while tortoise != hare {
        tortoise = next_fn(&tortoise);
        hare = next_fn(&hare);
        mu += 1;
        if mu > max_iter {
            return None;
        }
    }

    let mut lambda: usize = 1;
    let mut probe = next_fn(&tortoise);
    while probe != tortoise {
        probe = next_fn(&probe);
        lambda += 1;
        if lambda > max_iter {
            return None;
        }
    }

    Some(collect_cycle(tortoise, next_fn, mu, lambda))
}

fn collect_cycle<T, F>(start_state: T, mut next_fn: F, mu: usize, lambda: usize) -> Cycle<T>
where
    T: Clone + PartialEq,
    F: FnMut(&T) -> T,
{
    let mut cycle_states = Vec::with_capacity(lambda);
    let mut state = start_state;
    for _ in 0..lambda {
        cycle_states.push(state.clone());
        state = next_fn(&state);
    }
    Cycle {
        prefix_length: mu,
        cycle_start: mu,
        cycle_length: lambda,
        cycle_states,
    }
}

/// Weight aggregates over one period.
pub fn cycle_stats<T, W>(cycle: &Cycle<T>, mut weight_fn: W) -> Option<CycleStats>
where
    W: FnMut(&T) -> f64,
{
    if cycle.cycle_states.is_empty() {
        return None;
    }
    let weights: Vec<f64> = cycle.cycle_states.iter().map(|s| weight_fn(s)).collect();
    let sum: f64 = weights.iter().sum();
    let min = weights.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(CycleStats {
        sum,
        avg: sum / weights.len() as f64,
        min,
        max,
    })
}
