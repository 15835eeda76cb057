//! The external sampler boundary.
//!
//! The Bayesian optimizer lives in another process; this module defines
//! the protocol seam as a trait with two implementations: the real
//! subprocess transport (one JSON request line on stdin, one JSON
//! response line on stdout, per call) and the in-process uniform-random
//! fallback the bridge degrades to when the subprocess misbehaves.

use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use lattica_data::{ParamSpec, ParamValue, Params, SearchSpace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Protocol verbs understood by the external TPE process.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn init_study(&self, name: &str, space: &SearchSpace, seed: Option<u64>) -> Result<()>;
    async fn suggest(&self, name: &str) -> Result<Params>;
    async fn record(&self, name: &str, params: &Params, value: f64) -> Result<()>;
    /// Best trial the external process has seen, if any.
    async fn best_params(&self, name: &str) -> Result<Option<(Params, f64)>>;
    /// Cheap availability probe.
    async fn ping(&self) -> Result<()>;
}

/// Configuration for the subprocess transport.
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Interpreter, e.g. `python3`.
    pub command: String,
    /// Path to the TPE CLI script.
    pub script: String,
    /// Deadline per external call.
    pub timeout: Duration,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            command: "python3".into(),
            script: "priv/tpe_cli.py".into(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Spawns the external TPE CLI once per call and exchanges a single JSON
/// line over stdin/stdout. Stderr is inherited so the subprocess logs
/// surface in ours.
pub struct SubprocessSampler {
    config: SubprocessConfig,
    space: Mutex<Option<SearchSpace>>,
}

impl SubprocessSampler {
    pub fn new(config: SubprocessConfig) -> Self {
        Self {
            config,
            space: Mutex::new(None),
        }
    }

    async fn call(&self, function: &str, args: Value) -> Result<Value> {
        let request = serde_json::to_string(&json!({ "function": function, "args": args }))?;
        let fut = async {
            let mut child = Command::new(&self.config.command)
                .arg(&self.config.script)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| BridgeError::unavailable(format!("spawn failed: {e}")))?;

            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| BridgeError::unavailable("child stdin unavailable"))?;
            stdin.write_all(request.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            drop(stdin);

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| BridgeError::unavailable(format!("wait failed: {e}")))?;
            let body = String::from_utf8_lossy(&output.stdout);
            let line = body
                .lines()
                .last()
                .ok_or_else(|| BridgeError::malformed("empty response"))?;
            let value: Value = serde_json::from_str(line)
                .map_err(|e| BridgeError::malformed(format!("invalid JSON: {e}")))?;
            match value.get("status").and_then(Value::as_str) {
                Some("ok") => Ok(value),
                Some(other) => Err(BridgeError::unavailable(format!(
                    "sampler returned status '{other}': {}",
                    value.get("reason").and_then(Value::as_str).unwrap_or("?")
                ))),
                None => Err(BridgeError::malformed("response missing status field")),
            }
        };

        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| BridgeError::Timeout(self.config.timeout))?
    }

    fn coerce_params(&self, raw: &Value) -> Result<Params> {
        let space = self
            .space
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| BridgeError::malformed("suggest before init_study"))?;
        let map = raw
            .as_object()
            .ok_or_else(|| BridgeError::malformed("params is not an object"))?;
        let mut params = Params::new();
        for spec in &space.params {
            let value = map
                .get(spec.name())
                .ok_or_else(|| BridgeError::malformed(format!("missing param '{}'", spec.name())))?;
            let coerced = match spec {
                ParamSpec::Float { .. } => value
                    .as_f64()
                    .map(ParamValue::Float)
                    .ok_or_else(|| BridgeError::malformed(format!("'{}' not a float", spec.name()))),
                ParamSpec::Int { .. } => value
                    .as_i64()
                    .map(ParamValue::Int)
                    .ok_or_else(|| BridgeError::malformed(format!("'{}' not an int", spec.name()))),
                ParamSpec::Categorical { .. } => value
                    .as_str()
                    .map(|s| ParamValue::Choice(s.to_string()))
                    .ok_or_else(|| BridgeError::malformed(format!("'{}' not a choice", spec.name()))),
            }?;
            params.insert(spec.name().to_string(), coerced);
        }
        Ok(params)
    }
}

#[async_trait]
impl Sampler for SubprocessSampler {
    async fn init_study(&self, name: &str, space: &SearchSpace, seed: Option<u64>) -> Result<()> {
        *self
            .space
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(space.clone());
        // Joint (multivariate) modeling of correlated rule parameters is
        // required for convergence; do not drop this kwarg.
        let args = json!({
            "study_name": name,
            "search_space": space.params,
            "seed": seed,
            "sampler": "TPESampler",
            "sampler_kwargs": { "multivariate": true },
            "direction": "maximize",
        });
        self.call("init_study", args).await.map(|_| ())
    }

    async fn suggest(&self, name: &str) -> Result<Params> {
        let response = self.call("suggest", json!({ "study_name": name })).await?;
        let raw = response
            .get("params")
            .ok_or_else(|| BridgeError::malformed("response missing params"))?;
        self.coerce_params(raw)
    }

    async fn record(&self, name: &str, params: &Params, value: f64) -> Result<()> {
        let args = json!({
            "study_name": name,
            "params": params,
            "value": value,
        });
        self.call("record", args).await.map(|_| ())
    }

    async fn best_params(&self, name: &str) -> Result<Option<(Params, f64)>> {
        let response = self.call("best_params", json!({ "study_name": name })).await?;
        let Some(raw) = response.get("params") else {
            return Ok(None);
        };
        let value = response
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| BridgeError::malformed("best_params missing value"))?;
        Ok(Some((self.coerce_params(raw)?, value)))
    }

    async fn ping(&self) -> Result<()> {
        self.call("ping", json!({})).await.map(|_| ())
    }
}

/// In-process fallback: independent uniform sampling over the declared
/// space. Infallible by construction.
pub struct RandomSampler {
    space: SearchSpace,
    rng: Mutex<ChaCha8Rng>,
}

impl RandomSampler {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Draws one parameter set, every dimension inside its bounds.
    pub fn sample(&self) -> Params {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut params = Params::new();
        for spec in &self.space.params {
            let value = match spec {
                ParamSpec::Float { low, high, .. } => ParamValue::Float(rng.gen_range(*low..=*high)),
                ParamSpec::Int { low, high, .. } => ParamValue::Int(rng.gen_range(*low..=*high)),
                ParamSpec::Categorical { choices, .. } => {
                    ParamValue::Choice(choices[rng.gen_range(0..choices.len())].clone())
                }
            };
            params.insert(spec.name().to_string(), value);
        }
        params
    }
}

#[async_trait]
impl Sampler for RandomSampler {
    async fn init_study(&self, _name: &str, _space: &SearchSpace, _seed: Option<u64>) -> Result<()> {
        Ok(())
    }

    async fn suggest(&self, _name: &str) -> Result<Params> {
        Ok(self.sample())
    }

    async fn record(&self, _name: &str, _params: &Params, _value: f64) -> Result<()> {
        Ok(())
    }

    // Random search keeps no history; the bridge tracks its own best.
    async fn best_params(&self, _name: &str) -> Result<Option<(Params, f64)>> {
        Ok(None)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sampler_stays_in_bounds() {
        let space = SearchSpace::difflogic_defaults();
        let sampler = RandomSampler::new(space.clone(), 7);
        for _ in 0..1000 {
            assert!(space.contains(&sampler.sample()));
        }
    }

    #[test]
    fn test_random_sampler_is_seed_deterministic() {
        let space = SearchSpace::difflogic_defaults();
        let a = RandomSampler::new(space.clone(), 42);
        let b = RandomSampler::new(space, 42);
        for _ in 0..10 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_random_sampler_covers_categoricals() {
        let space = SearchSpace::new(vec![ParamSpec::Categorical {
            name: "mode".into(),
            choices: vec!["a".into(), "b".into()],
        }]);
        let sampler = RandomSampler::new(space, 1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            if let Some(ParamValue::Choice(c)) = sampler.sample().get("mode") {
                seen.insert(c.clone());
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_subprocess_spawn_failure_is_unavailable() {
        let sampler = SubprocessSampler::new(SubprocessConfig {
            command: "definitely-not-a-real-binary".into(),
            script: "nowhere.py".into(),
            timeout: Duration::from_secs(1),
        });
        let err = sampler.ping().await.unwrap_err();
        assert!(matches!(err, BridgeError::SamplerUnavailable(_)));
    }

    #[test]
    fn test_search_space_wire_shape() {
        let space = SearchSpace::difflogic_defaults();
        let json = serde_json::to_value(&space.params).unwrap();
        assert_eq!(json[0]["type"], "float");
        assert_eq!(json[0]["name"], "lambda");
        assert_eq!(json[0]["low"], 0.0);
    }
}
