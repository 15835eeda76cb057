//! The optimization orchestrator.
//!
//! `DiffLogicCa` owns one run: a lattice, a loop monitor and an optimizer
//! bridge. `optimize` drives the outer suggest -> evaluate -> record loop
//! with a fresh lattice and monitor per trial; `run` steps a persistent
//! lattice under a fixed ruleset, emitting voxel deltas for observers.

use crate::config::AppConfig;
use chrono::Utc;
use lattica_core::{
    build_difflogic_ruleset, decode, encode, DiffLogicParams, EncodeInput, Grid, Ruleset,
};
use lattica_data::{
    compute_edge_score, BudgetPayload, ComputeRequest, ComputeResponse, ComputeStatus,
    CriticalityMetrics, GridConfigPayload, MetricsPayload, OptimizationState, ParamValue, Params,
    SearchSpace, VoxelBatch, VoxelUpdate,
};
use lattica_io::{Sampler, TpeBridge};
use lattica_observer::LoopMonitor;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct DiffLogicCa {
    config: AppConfig,
    run_id: Uuid,
    grid: Option<Grid>,
    monitor: Option<LoopMonitor>,
    voxel_events: broadcast::Sender<VoxelBatch>,
    compute_events: broadcast::Sender<ComputeResponse>,
}

impl DiffLogicCa {
    /// Validates configuration up front; invalid trial/tick counts or
    /// grid bounds never reach the loop.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let (voxel_events, _) = broadcast::channel(256);
        let (compute_events, _) = broadcast::channel(64);
        Ok(Self {
            config,
            run_id: Uuid::new_v4(),
            grid: None,
            monitor: None,
            voxel_events,
            compute_events,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Subscribes to per-tick voxel delta batches emitted by `run`.
    pub fn subscribe_voxel_events(&self) -> broadcast::Receiver<VoxelBatch> {
        self.voxel_events.subscribe()
    }

    /// Subscribes to the per-trial evaluation results emitted by
    /// `optimize`.
    pub fn subscribe_compute_events(&self) -> broadcast::Receiver<ComputeResponse> {
        self.compute_events.subscribe()
    }

    /// Runs the full optimization loop against `sampler`.
    ///
    /// Each trial evaluates one suggested parameter set on a fresh
    /// lattice and a fresh monitor; the monitor is torn down before the
    /// trial result is recorded. The study name embeds the run id so
    /// concurrent runs can never share external sampler state.
    pub async fn optimize(&self, sampler: Box<dyn Sampler>) -> anyhow::Result<OptimizationState> {
        let study_name = format!("{}-{}", self.config.optimize.study_prefix, self.run_id);
        let mut bridge = TpeBridge::new(
            study_name.clone(),
            SearchSpace::difflogic_defaults(),
            self.config.optimize.n_trials,
            sampler,
            self.config.optimize.seed,
        )?;
        bridge.start().await;

        let config = self.config.clone();
        let run_id = self.run_id;
        let results = self.compute_events.clone();
        let started = Utc::now();
        tracing::info!(%run_id, study = %study_name, trials = config.optimize.n_trials, "optimization started");

        let n_trials = config.optimize.n_trials;
        let mut trial_id: u64 = 0;
        let state = bridge
            .optimize(
                move |params| {
                    let config = config.clone();
                    let results = results.clone();
                    let id = trial_id;
                    trial_id += 1;
                    async move {
                        let deadline = Duration::from_millis(config.optimize.trial_timeout_ms);
                        let started = std::time::Instant::now();
                        let outcome = tokio::time::timeout(
                            deadline,
                            evaluate_trial(&config, run_id, id, &params, &results),
                        )
                        .await;
                        match outcome {
                            Ok(Ok(fitness)) => Ok(fitness),
                            Ok(Err(err)) => {
                                let _ = results.send(failure_response(
                                    run_id,
                                    id,
                                    &params,
                                    ComputeStatus::Error,
                                    started.elapsed().as_millis() as u64,
                                ));
                                Err(err)
                            }
                            Err(_) => {
                                let _ = results.send(failure_response(
                                    run_id,
                                    id,
                                    &params,
                                    ComputeStatus::Timeout,
                                    started.elapsed().as_millis() as u64,
                                ));
                                anyhow::bail!(
                                    "trial {id} exceeded its {}ms budget",
                                    config.optimize.trial_timeout_ms
                                )
                            }
                        }
                    }
                },
                n_trials,
            )
            .await;

        tracing::info!(
            %run_id,
            completed = state.completed_trials,
            best = ?state.best_fitness,
            elapsed_s = (Utc::now() - started).num_seconds(),
            "optimization finished"
        );
        Ok(state)
    }

    /// Steps a persistent lattice under a fixed parameter set.
    ///
    /// The lattice and monitor survive across calls, so a long run can be
    /// driven in slices. When `emit` is set, every tick's deltas are
    /// published as a `VoxelBatch`.
    pub async fn run(
        &mut self,
        params: DiffLogicParams,
        ticks: u64,
        emit: bool,
    ) -> anyhow::Result<CriticalityMetrics> {
        let ruleset = build_difflogic_ruleset(params);
        if self.grid.is_none() {
            let grid = build_seeded_grid(&self.config, &ruleset, &self.run_id.to_string())?;
            self.grid = Some(grid);
        }
        if self.monitor.is_none() {
            self.monitor = Some(LoopMonitor::spawn(self.config.monitor, self.run_id));
        }
        let monitor = self
            .monitor
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("monitor unavailable"))?;

        let mut grid = self
            .grid
            .take()
            .ok_or_else(|| anyhow::anyhow!("grid unavailable"))?;
        for _ in 0..ticks {
            let (deltas, next) = grid.step(&ruleset);
            grid = next;
            monitor.observe(grid.tick, grid.cells().to_vec());
            if emit && !deltas.is_empty() {
                let batch = VoxelBatch {
                    run_id: self.run_id,
                    tick: grid.tick,
                    updates: deltas
                        .iter()
                        .map(|d| VoxelUpdate {
                            run_id: self.run_id,
                            tick: grid.tick,
                            coord: d.coord,
                            state: d.state,
                            sigma_flow: d.sigma_flow,
                            phi_phase: d.phi_phase,
                            lambda_sensitivity: d.lambda_sensitivity,
                        })
                        .collect(),
                };
                let _ = self.voxel_events.send(batch);
            }
        }
        let metrics = monitor.metrics().await?;
        self.grid = Some(grid);
        Ok(metrics)
    }

    /// Tears down owned components. Never blocks on in-flight external
    /// calls; the monitor drains its queue and exits.
    pub fn shutdown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown();
        }
        self.grid = None;
        tracing::info!(run_id = %self.run_id, "orchestrator shut down");
    }
}

impl Drop for DiffLogicCa {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One trial: fresh lattice, fresh monitor, `ticks_per_eval` steps, final
/// metrics scored for edge-of-chaos fitness. The full evaluation is
/// published as a `ComputeResponse` for downstream observers.
async fn evaluate_trial(
    config: &AppConfig,
    run_id: Uuid,
    trial_id: u64,
    params: &Params,
    results: &broadcast::Sender<ComputeResponse>,
) -> anyhow::Result<f64> {
    let request = ComputeRequest {
        run_id,
        trial_id,
        rule_params: params.clone(),
        grid_config: GridConfigPayload {
            bounds: (config.grid.x, config.grid.y, config.grid.z),
            neighborhood_type: format!("{:?}", config.grid.neighborhood),
            boundary_condition: format!("{:?}", config.grid.boundary),
        },
        budget: BudgetPayload {
            max_ticks: config.optimize.ticks_per_eval,
            timeout_ms: config.optimize.trial_timeout_ms,
        },
        requested_at: Utc::now(),
    };
    tracing::debug!(%run_id, trial_id, ?request.rule_params, "trial started");

    let rule_params = difflogic_params_from(params);
    let ruleset = build_difflogic_ruleset(rule_params);
    let seed_text = format!("{run_id}-{trial_id}");
    let mut grid = build_seeded_grid(config, &ruleset, &seed_text)?;
    let monitor = LoopMonitor::spawn(config.monitor, run_id);
    let started = std::time::Instant::now();

    for _ in 0..request.budget.max_ticks {
        let (_, next) = grid.step(&ruleset);
        grid = next;
        monitor.observe(grid.tick, grid.cells().to_vec());
    }

    let metrics = monitor.metrics().await?;
    monitor.shutdown();
    let fitness = compute_edge_score(&metrics);
    let _ = results.send(ComputeResponse {
        run_id,
        trial_id,
        status: ComputeStatus::Ok,
        fitness,
        metrics: MetricsPayload {
            plv: metrics.plv,
            entropy: metrics.entropy,
            lambda_hat: metrics.lambda_hat,
            lyapunov: metrics.lyapunov,
        },
        suggested_params: Some(params.clone()),
        elapsed_ms: started.elapsed().as_millis() as u64,
    });
    tracing::debug!(%run_id, trial_id, fitness, lambda_hat = metrics.lambda_hat, "trial evaluated");
    Ok(fitness)
}

/// The response published when a trial never produced metrics: zeroed
/// measurements, zero fitness, the offending parameters attached.
fn failure_response(
    run_id: Uuid,
    trial_id: u64,
    params: &Params,
    status: ComputeStatus,
    elapsed_ms: u64,
) -> ComputeResponse {
    tracing::warn!(%run_id, trial_id, ?status, "trial failed");
    ComputeResponse {
        run_id,
        trial_id,
        status,
        fitness: 0.0,
        metrics: MetricsPayload {
            plv: 0.0,
            entropy: 0.0,
            lambda_hat: 0.0,
            lyapunov: 0.0,
        },
        suggested_params: Some(params.clone()),
        elapsed_ms,
    }
}

/// Extracts the DiffLogic rule parameters from a sampled assignment,
/// falling back to neutral defaults for missing dimensions.
pub fn difflogic_params_from(params: &Params) -> DiffLogicParams {
    let get = |name: &str, default: f64| {
        params
            .get(name)
            .and_then(ParamValue::as_f64)
            .unwrap_or(default)
    };
    DiffLogicParams {
        lambda: get("lambda", 0.5),
        bias: get("bias", 0.5),
        gate_temp: get("gate_temp", 1.0),
        diffusion_rate: get("diffusion_rate", 0.1),
    }
    .clamped()
}

/// Builds a lattice whose initial flows and phases come from a hashed
/// fingerprint of `seed_text`: deterministic per seed, varied per cell.
fn build_seeded_grid(config: &AppConfig, ruleset: &Ruleset, seed_text: &str) -> anyhow::Result<Grid> {
    let mut grid = Grid::create(config.grid.x, config.grid.y, config.grid.z, ruleset.id())?
        .with_neighborhood(config.grid.neighborhood)
        .with_boundary(config.grid.boundary);

    let cell_count = grid.len();
    let fingerprint = encode(EncodeInput::Text(seed_text), cell_count * 16)?;
    let values = decode(&fingerprint, 8)?;

    let coords: Vec<_> = grid.cells().iter().map(|c| c.coord).collect();
    for (idx, coord) in coords.into_iter().enumerate() {
        let flow = values.get(idx * 2).copied().unwrap_or(0.5);
        let phase = values.get(idx * 2 + 1).copied().unwrap_or(0.0) * lattica_data::TWO_PI;
        grid.set_cell(lattica_data::Cell::new(coord, flow, phase));
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_data::ParamValue;

    fn small_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.grid.x = 4;
        config.grid.y = 4;
        config.grid.z = 1;
        config.optimize.n_trials = 2;
        config.optimize.ticks_per_eval = 10;
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = small_config();
        config.optimize.n_trials = 0;
        assert!(DiffLogicCa::new(config).is_err());
    }

    #[test]
    fn test_difflogic_params_extraction() {
        let mut params = Params::new();
        params.insert("lambda".into(), ParamValue::Float(0.9));
        params.insert("gate_temp".into(), ParamValue::Float(0.3));
        let rule = difflogic_params_from(&params);
        assert_eq!(rule.lambda, 0.9);
        assert_eq!(rule.gate_temp, 0.3);
        // Missing dimensions fall back to defaults.
        assert_eq!(rule.bias, 0.5);
    }

    #[test]
    fn test_seeded_grid_is_deterministic_and_varied() {
        let config = small_config();
        let ruleset = build_difflogic_ruleset(DiffLogicParams::default());
        let a = build_seeded_grid(&config, &ruleset, "seed-a").unwrap();
        let b = build_seeded_grid(&config, &ruleset, "seed-a").unwrap();
        let c = build_seeded_grid(&config, &ruleset, "seed-b").unwrap();
        assert_eq!(a.cells(), b.cells());
        assert_ne!(a.cells(), c.cells());
        // Hashed seeding should not produce a uniform lattice.
        let first = a.cells()[0].sigma_flow;
        assert!(a.cells().iter().any(|cell| cell.sigma_flow != first));
    }

    #[test]
    fn test_failure_response_carries_status_and_params() {
        let mut params = Params::new();
        params.insert("lambda".into(), ParamValue::Float(0.7));
        let run_id = Uuid::new_v4();
        let response = failure_response(run_id, 7, &params, ComputeStatus::Error, 12);
        assert_eq!(response.run_id, run_id);
        assert_eq!(response.trial_id, 7);
        assert_eq!(response.status, ComputeStatus::Error);
        assert_eq!(response.fitness, 0.0);
        assert_eq!(response.suggested_params, Some(params));
        assert_eq!(response.elapsed_ms, 12);
    }

    #[tokio::test]
    async fn test_run_steps_persistent_grid() {
        let mut ca = DiffLogicCa::new(small_config()).unwrap();
        let params = DiffLogicParams::default();
        let first = ca.run(params, 5, false).await.unwrap();
        assert_eq!(first.tick, 5);
        let second = ca.run(params, 5, false).await.unwrap();
        assert_eq!(second.tick, 10);
        ca.shutdown();
    }

    #[tokio::test]
    async fn test_run_emits_voxel_batches() {
        let mut ca = DiffLogicCa::new(small_config()).unwrap();
        let mut rx = ca.subscribe_voxel_events();
        ca.run(DiffLogicParams::default(), 3, true).await.unwrap();
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.run_id, ca.run_id());
        assert!(!batch.updates.is_empty());
        ca.shutdown();
    }
}
