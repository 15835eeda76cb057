//! Optimization loop state and control.
//!
//! The bridge owns one study: its search space, its append-only trial
//! history and the best-known parameter pair. The external sampler is
//! consulted best-effort; every failure path ends in the in-process
//! random fallback so the loop itself never stalls on the subprocess.

use crate::error::{BridgeError, Result};
use crate::sampler::{RandomSampler, Sampler};
use lattica_data::{OptimizationState, ParamSpec, Params, SearchSpace, Trial};
use std::future::Future;
use std::time::Instant;

pub struct TpeBridge {
    study_name: String,
    search_space: SearchSpace,
    n_trials: usize,
    sampler: Box<dyn Sampler>,
    fallback: RandomSampler,
    seed: Option<u64>,
    history: Vec<Trial>,
    best: Option<(Params, f64)>,
    next_trial_id: u64,
}

impl TpeBridge {
    /// Validates the configuration and builds the bridge.
    ///
    /// Search-space or budget errors are fatal here, never deferred into
    /// the loop.
    pub fn new(
        study_name: impl Into<String>,
        search_space: SearchSpace,
        n_trials: usize,
        sampler: Box<dyn Sampler>,
        seed: Option<u64>,
    ) -> Result<Self> {
        if n_trials == 0 {
            return Err(BridgeError::config("trial budget must be positive"));
        }
        if search_space.params.is_empty() {
            return Err(BridgeError::config("search space must not be empty"));
        }
        for spec in &search_space.params {
            match spec {
                ParamSpec::Float { name, low, high } => {
                    if !(low < high) || !low.is_finite() || !high.is_finite() {
                        return Err(BridgeError::config(format!(
                            "invalid bounds for '{name}': [{low}, {high}]"
                        )));
                    }
                }
                ParamSpec::Int { name, low, high } => {
                    if low >= high {
                        return Err(BridgeError::config(format!(
                            "invalid bounds for '{name}': [{low}, {high}]"
                        )));
                    }
                }
                ParamSpec::Categorical { name, choices } => {
                    if choices.is_empty() {
                        return Err(BridgeError::config(format!(
                            "categorical '{name}' has no choices"
                        )));
                    }
                }
            }
        }

        let fallback = RandomSampler::new(search_space.clone(), seed.unwrap_or(0));
        Ok(Self {
            study_name: study_name.into(),
            search_space,
            n_trials,
            sampler,
            fallback,
            seed,
            history: Vec::new(),
            best: None,
            next_trial_id: 0,
        })
    }

    pub fn study_name(&self) -> &str {
        &self.study_name
    }

    pub fn history(&self) -> &[Trial] {
        &self.history
    }

    /// Probes and initializes the external study. Failures are logged and
    /// swallowed: the bridge stays usable on the random fallback.
    pub async fn start(&self) {
        match self.sampler.ping().await {
            Ok(()) => tracing::info!(study = %self.study_name, "external sampler available"),
            Err(e) => {
                tracing::warn!(study = %self.study_name, error = %e, "external sampler unavailable, random fallback active");
                return;
            }
        }
        if let Err(e) = self
            .sampler
            .init_study(&self.study_name, &self.search_space, self.seed)
            .await
        {
            tracing::warn!(study = %self.study_name, error = %e, "init_study failed, random fallback active");
        }
    }

    /// Next parameters to evaluate. Sampler trouble of any kind degrades
    /// to uniform random sampling; the caller sees only valid parameters.
    pub async fn suggest(&mut self) -> Params {
        match self.sampler.suggest(&self.study_name).await {
            Ok(params) if self.search_space.contains(&params) => params,
            Ok(params) => {
                tracing::warn!(study = %self.study_name, ?params, "sampler suggested out-of-space params, falling back");
                self.fallback.sample()
            }
            Err(e) => {
                tracing::warn!(study = %self.study_name, error = %e, "suggest failed, falling back to random sampling");
                self.fallback.sample()
            }
        }
    }

    /// Appends a trial and updates the running best on strictly greater
    /// fitness (ties never replace). The external sampler is informed
    /// best-effort; forwarding failure cannot fail the call.
    pub async fn record(&mut self, params: Params, fitness: f64, elapsed_ms: u64) -> Trial {
        let trial = Trial {
            trial_id: self.next_trial_id,
            params: params.clone(),
            fitness,
            elapsed_ms,
        };
        self.next_trial_id += 1;
        self.history.push(trial.clone());

        let improved = match &self.best {
            Some((_, best_fitness)) => fitness > *best_fitness,
            None => true,
        };
        if improved {
            tracing::info!(study = %self.study_name, trial = trial.trial_id, fitness, "new best trial");
            self.best = Some((params.clone(), fitness));
        }

        if let Err(e) = self.sampler.record(&self.study_name, &params, fitness).await {
            tracing::warn!(study = %self.study_name, error = %e, "record forwarding failed (continuing)");
        }
        trial
    }

    /// Runs suggest -> evaluate -> record until the budget is exhausted.
    ///
    /// A failed evaluation is logged and skipped; it consumes a loop slot
    /// but never stops the loop or counts toward the best. The loop is
    /// deliberately unbounded in wall time.
    pub async fn optimize<F, Fut>(&mut self, mut eval_fn: F, max_trials: usize) -> OptimizationState
    where
        F: FnMut(Params) -> Fut,
        Fut: Future<Output = anyhow::Result<f64>>,
    {
        let budget = max_trials.min(self.n_trials);
        for trial_idx in 0..budget {
            let params = self.suggest().await;
            let started = Instant::now();
            match eval_fn(params.clone()).await {
                Ok(fitness) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    self.record(params, fitness, elapsed_ms).await;
                }
                Err(e) => {
                    tracing::warn!(study = %self.study_name, trial_idx, error = %e, "evaluation failed, skipping trial");
                }
            }
        }

        // Cross-check against the external sampler's view of the study; a
        // better external best means a recorded result was lost in flight.
        if let Ok(Some((_, external))) = self.sampler.best_params(&self.study_name).await {
            let local = self.best.as_ref().map(|(_, f)| *f);
            if local.map_or(true, |l| external > l) {
                tracing::warn!(study = %self.study_name, external, ?local, "external best exceeds local history");
            }
        }
        self.status()
    }

    /// Read-only progress view.
    pub fn status(&self) -> OptimizationState {
        OptimizationState {
            best_params: self.best.as_ref().map(|(p, _)| p.clone()),
            best_fitness: self.best.as_ref().map(|(_, f)| *f),
            completed_trials: self.history.len(),
            n_trials: self.n_trials,
            search_space: self.search_space.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Sampler;
    use async_trait::async_trait;

    /// Sampler that always fails, forcing the fallback path.
    struct DeadSampler;

    #[async_trait]
    impl Sampler for DeadSampler {
        async fn init_study(
            &self,
            _name: &str,
            _space: &SearchSpace,
            _seed: Option<u64>,
        ) -> Result<()> {
            Err(BridgeError::unavailable("dead"))
        }
        async fn suggest(&self, _name: &str) -> Result<Params> {
            Err(BridgeError::unavailable("dead"))
        }
        async fn record(&self, _name: &str, _params: &Params, _value: f64) -> Result<()> {
            Err(BridgeError::unavailable("dead"))
        }
        async fn best_params(&self, _name: &str) -> Result<Option<(Params, f64)>> {
            Err(BridgeError::unavailable("dead"))
        }
        async fn ping(&self) -> Result<()> {
            Err(BridgeError::unavailable("dead"))
        }
    }

    fn bridge(n_trials: usize) -> TpeBridge {
        TpeBridge::new(
            "test-study",
            SearchSpace::difflogic_defaults(),
            n_trials,
            Box::new(DeadSampler),
            Some(11),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_zero_trials() {
        let err = TpeBridge::new(
            "s",
            SearchSpace::difflogic_defaults(),
            0,
            Box::new(DeadSampler),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        let space = SearchSpace::new(vec![ParamSpec::Float {
            name: "x".into(),
            low: 1.0,
            high: 0.0,
        }]);
        let err = TpeBridge::new("s", space, 10, Box::new(DeadSampler), None).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_new_rejects_empty_categorical() {
        let space = SearchSpace::new(vec![ParamSpec::Categorical {
            name: "mode".into(),
            choices: vec![],
        }]);
        assert!(TpeBridge::new("s", space, 10, Box::new(DeadSampler), None).is_err());
    }

    #[tokio::test]
    async fn test_suggest_falls_back_within_bounds() {
        let mut bridge = bridge(1000);
        let space = SearchSpace::difflogic_defaults();
        for _ in 0..1000 {
            let params = bridge.suggest().await;
            assert!(space.contains(&params));
        }
    }

    #[tokio::test]
    async fn test_record_updates_best_on_strict_improvement() {
        let mut bridge = bridge(10);
        let p1 = bridge.suggest().await;
        bridge.record(p1.clone(), 0.7, 5).await;
        assert_eq!(bridge.status().best_fitness, Some(0.7));
        assert_eq!(bridge.status().best_params, Some(p1.clone()));

        // Lower fitness leaves best untouched.
        let p2 = bridge.suggest().await;
        bridge.record(p2.clone(), 0.4, 5).await;
        assert_eq!(bridge.status().best_fitness, Some(0.7));
        assert_eq!(bridge.status().best_params, Some(p1.clone()));

        // A tie never replaces either.
        bridge.record(p2, 0.7, 5).await;
        assert_eq!(bridge.status().best_params, Some(p1));

        // Strictly greater does.
        let p3 = bridge.suggest().await;
        bridge.record(p3.clone(), 0.9, 5).await;
        assert_eq!(bridge.status().best_fitness, Some(0.9));
        assert_eq!(bridge.status().best_params, Some(p3));
    }

    #[tokio::test]
    async fn test_optimize_skips_failed_evaluations() {
        let mut bridge = bridge(10);
        let mut calls = 0u32;
        let state = bridge
            .optimize(
                |params| {
                    calls += 1;
                    let fail = calls % 2 == 0;
                    async move {
                        if fail {
                            anyhow::bail!("boom");
                        }
                        Ok(params["lambda"].as_f64().unwrap_or(0.0))
                    }
                },
                6,
            )
            .await;
        assert_eq!(calls, 6);
        // Only the odd-numbered evaluations were recorded.
        assert_eq!(state.completed_trials, 3);
        assert!(state.best_fitness.is_some());
    }

    #[tokio::test]
    async fn test_optimize_respects_trial_budget() {
        let mut bridge = bridge(3);
        let state = bridge.optimize(|_| async { Ok(0.5) }, 100).await;
        assert_eq!(state.completed_trials, 3);
        assert!((state.progress() - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_history_is_append_only_in_call_order() {
        let mut bridge = bridge(10);
        for fitness in [0.1, 0.5, 0.3] {
            let params = bridge.suggest().await;
            bridge.record(params, fitness, 1).await;
        }
        let ids: Vec<u64> = bridge.history().iter().map(|t| t.trial_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(bridge.history()[1].fitness, 0.5);
    }
}
