use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dimension of the optimizer search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamSpec {
    Float { name: String, low: f64, high: f64 },
    Int { name: String, low: i64, high: i64 },
    Categorical { name: String, choices: Vec<String> },
}

impl ParamSpec {
    pub fn name(&self) -> &str {
        match self {
            ParamSpec::Float { name, .. } => name,
            ParamSpec::Int { name, .. } => name,
            ParamSpec::Categorical { name, .. } => name,
        }
    }
}

/// A sampled parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Choice(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Choice(_) => None,
        }
    }
}

/// A full parameter assignment, keyed by parameter name.
///
/// BTreeMap keeps serialization order deterministic across runs.
pub type Params = BTreeMap<String, ParamValue>;

/// Declared search space for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub params: Vec<ParamSpec>,
}

impl SearchSpace {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Default space for DiffLogic rule optimization.
    pub fn difflogic_defaults() -> Self {
        Self::new(vec![
            ParamSpec::Float {
                name: "lambda".into(),
                low: 0.0,
                high: 1.0,
            },
            ParamSpec::Float {
                name: "bias".into(),
                low: 0.0,
                high: 1.0,
            },
            ParamSpec::Float {
                name: "gate_temp".into(),
                low: 0.1,
                high: 2.0,
            },
            ParamSpec::Float {
                name: "diffusion_rate".into(),
                low: 0.0,
                high: 0.5,
            },
        ])
    }

    /// True when `params` assigns every declared dimension a value inside
    /// its bounds.
    pub fn contains(&self, params: &Params) -> bool {
        self.params.iter().all(|spec| match spec {
            ParamSpec::Float { name, low, high } => params
                .get(name)
                .and_then(ParamValue::as_f64)
                .is_some_and(|v| v >= *low && v <= *high),
            ParamSpec::Int { name, low, high } => matches!(
                params.get(name),
                Some(ParamValue::Int(v)) if v >= low && v <= high
            ),
            ParamSpec::Categorical { name, choices } => matches!(
                params.get(name),
                Some(ParamValue::Choice(c)) if choices.contains(c)
            ),
        })
    }
}

/// One completed optimization trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub trial_id: u64,
    pub params: Params,
    pub fitness: f64,
    pub elapsed_ms: u64,
}

/// Read-only view of an optimization run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationState {
    pub best_params: Option<Params>,
    pub best_fitness: Option<f64>,
    pub completed_trials: usize,
    pub n_trials: usize,
    pub search_space: SearchSpace,
}

impl OptimizationState {
    pub fn progress(&self) -> f64 {
        if self.n_trials == 0 {
            0.0
        } else {
            self.completed_trials as f64 / self.n_trials as f64
        }
    }
}
