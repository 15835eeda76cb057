//! # Lattica Observer
//!
//! The loop monitor: a supervised task that ingests per-tick lattice
//! snapshots, maintains the rolling criticality metrics and periodically
//! publishes snapshots for external consumers. All state lives behind a
//! single writer; reads go through message passing, never shared cells.

pub mod metrics;

pub use metrics::{
    lyapunov_estimate, permutation_entropy, phase_locking_value, MetricsEngine, MonitorConfig,
};

use chrono::Utc;
use lattica_data::{compute_edge_score, Cell, CriticalityMetrics, MetricsSnapshot};
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

enum MonitorMsg {
    Observe { tick: u64, voxels: Vec<Cell> },
    Metrics { reply: oneshot::Sender<CriticalityMetrics> },
    Fitness { reply: oneshot::Sender<f64> },
    Shutdown,
}

/// Handle to a running loop monitor task.
///
/// Dropping the handle closes the channel and the task drains and exits;
/// `shutdown` is the explicit variant for deterministic teardown.
pub struct LoopMonitor {
    tx: mpsc::UnboundedSender<MonitorMsg>,
    snapshots: broadcast::Sender<MetricsSnapshot>,
}

impl LoopMonitor {
    /// Spawns the monitor task for one run.
    pub fn spawn(config: MonitorConfig, run_id: Uuid) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MonitorMsg>();
        let (snapshots, _) = broadcast::channel(64);
        let emitter = snapshots.clone();

        tokio::spawn(async move {
            let mut engine = MetricsEngine::new(config);
            while let Some(msg) = rx.recv().await {
                match msg {
                    MonitorMsg::Observe { tick, voxels } => {
                        let metrics = engine.observe(tick, &voxels);
                        let interval = config.emit_interval.max(1);
                        if engine.observed_ticks() % interval == 0 {
                            let snapshot = MetricsSnapshot {
                                run_id,
                                tick,
                                plv: metrics.plv,
                                entropy: metrics.entropy,
                                lambda_hat: metrics.lambda_hat,
                                lyapunov: metrics.lyapunov,
                                edge_of_chaos_score: compute_edge_score(&metrics),
                                sampled_at: Utc::now(),
                            };
                            // No subscribers is fine; emission is best effort.
                            let _ = emitter.send(snapshot);
                        }
                    }
                    MonitorMsg::Metrics { reply } => {
                        let _ = reply.send(engine.current());
                    }
                    MonitorMsg::Fitness { reply } => {
                        let _ = reply.send(compute_edge_score(&engine.current()));
                    }
                    MonitorMsg::Shutdown => break,
                }
            }
            tracing::debug!(%run_id, "loop monitor stopped");
        });

        Self { tx, snapshots }
    }

    /// Feeds one tick snapshot into the rolling window. Non-blocking.
    pub fn observe(&self, tick: u64, voxels: Vec<Cell>) {
        let _ = self.tx.send(MonitorMsg::Observe { tick, voxels });
    }

    /// Latest criticality metrics.
    pub async fn metrics(&self) -> anyhow::Result<CriticalityMetrics> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MonitorMsg::Metrics { reply })
            .map_err(|_| anyhow::anyhow!("loop monitor is not running"))?;
        Ok(rx.await?)
    }

    /// Edge-of-chaos fitness of the latest metrics.
    pub async fn fitness(&self) -> anyhow::Result<f64> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MonitorMsg::Fitness { reply })
            .map_err(|_| anyhow::anyhow!("loop monitor is not running"))?;
        Ok(rx.await?)
    }

    /// Subscribes to periodic metrics snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<MetricsSnapshot> {
        self.snapshots.subscribe()
    }

    /// Stops the task after in-flight messages drain.
    pub fn shutdown(&self) {
        let _ = self.tx.send(MonitorMsg::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_data::Coord;

    fn snapshot(flows: &[f64]) -> Vec<Cell> {
        flows
            .iter()
            .enumerate()
            .map(|(i, &f)| Cell::new(Coord::new(i as i32, 0, 0), f, f))
            .collect()
    }

    #[tokio::test]
    async fn test_monitor_observes_and_reports() {
        let monitor = LoopMonitor::spawn(MonitorConfig::default(), Uuid::new_v4());
        for tick in 1..=5 {
            monitor.observe(tick, snapshot(&[0.1, 0.9, 0.4]));
        }
        let metrics = monitor.metrics().await.unwrap();
        assert_eq!(metrics.tick, 5);
        assert!((metrics.lambda_hat - 2.0 / 3.0).abs() < 1e-12);
        monitor.shutdown();
    }

    #[tokio::test]
    async fn test_monitor_emits_on_interval() {
        let config = MonitorConfig {
            emit_interval: 2,
            ..Default::default()
        };
        let monitor = LoopMonitor::spawn(config, Uuid::new_v4());
        let mut rx = monitor.subscribe();
        for tick in 1..=4 {
            monitor.observe(tick, snapshot(&[0.5, 0.6]));
        }
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.tick, 2);
        assert_eq!(second.tick, 4);
        monitor.shutdown();
    }

    #[tokio::test]
    async fn test_monitor_fitness_matches_edge_score() {
        let monitor = LoopMonitor::spawn(MonitorConfig::default(), Uuid::new_v4());
        for tick in 1..=10 {
            monitor.observe(tick, snapshot(&[0.3, 0.7, 0.2, 0.8]));
        }
        let metrics = monitor.metrics().await.unwrap();
        let fitness = monitor.fitness().await.unwrap();
        assert!((fitness - compute_edge_score(&metrics)).abs() < 1e-12);
        monitor.shutdown();
    }

    #[tokio::test]
    async fn test_metrics_after_shutdown_is_error() {
        let monitor = LoopMonitor::spawn(MonitorConfig::default(), Uuid::new_v4());
        monitor.shutdown();
        // Give the task a moment to drain the shutdown message.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(monitor.metrics().await.is_err());
    }
}
