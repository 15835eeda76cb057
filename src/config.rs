use lattica_core::{BoundaryCondition, NeighborhoodKind};
use lattica_observer::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GridSettings {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub neighborhood: NeighborhoodKind,
    pub boundary: BoundaryCondition,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OptimizeSettings {
    pub n_trials: usize,
    pub ticks_per_eval: u64,
    /// Wall-clock budget per trial evaluation.
    pub trial_timeout_ms: u64,
    /// Study names are `<prefix>-<run uuid>`; concurrent runs must never
    /// share a study or their trial histories corrupt each other.
    pub study_prefix: String,
    pub seed: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SamplerSettings {
    pub command: String,
    pub script: String,
    pub timeout_secs: u64,
}

impl SamplerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub grid: GridSettings,
    pub monitor: MonitorConfig,
    pub optimize: OptimizeSettings,
    pub sampler: SamplerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid: GridSettings {
                x: 16,
                y: 16,
                z: 16,
                neighborhood: NeighborhoodKind::VonNeumann,
                boundary: BoundaryCondition::Clip,
            },
            monitor: MonitorConfig::default(),
            optimize: OptimizeSettings {
                n_trials: 50,
                ticks_per_eval: 100,
                trial_timeout_ms: 60_000,
                study_prefix: "lattica".into(),
                seed: None,
            },
            sampler: SamplerSettings {
                command: "python3".into(),
                script: "priv/tpe_cli.py".into(),
                timeout_secs: 15,
            },
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
            tracing::warn!(path, "unparseable config, using defaults");
        }
        let default = Self::default();
        if let Ok(serialized) = toml::to_string(&default) {
            let _ = fs::write(path, serialized);
        }
        default
    }

    /// Fatal configuration checks, applied before any loop starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.grid.x > 0 && self.grid.y > 0 && self.grid.z > 0,
            "grid bounds must be positive"
        );
        anyhow::ensure!(self.optimize.n_trials > 0, "n_trials must be positive");
        anyhow::ensure!(
            self.optimize.ticks_per_eval > 0,
            "ticks_per_eval must be positive"
        );
        anyhow::ensure!(self.monitor.window > 0, "monitor window must be positive");
        Ok(())
    }
}
