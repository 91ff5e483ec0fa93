use std::path::Path;

use refactory_eval::ExecutionBudget;
use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};

/// Engine settings. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Limits applied to every sandboxed run.
    pub budget: ExecutionBudget,
    /// Timing repetitions when a perf case does not name its own.
    pub perf_repeats: usize,
    /// Weight of `speedup - 1` in the heuristic score.
    pub speed_weight: f64,
    /// Whether sessions time accepted rewrites.
    pub profile: bool,
    /// Step limit of the greedy optimizer.
    pub max_optimize_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget: ExecutionBudget::default(),
            perf_repeats: 5,
            speed_weight: 20.0,
            profile: false,
            max_optimize_steps: 10,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"speed_weight": 5.0, "budget": {"timeout_ms": 50}}"#).unwrap();
        assert_eq!(config.speed_weight, 5.0);
        assert_eq!(config.perf_repeats, 5);
        assert_eq!(config.budget.timeout_ms, 50);
        assert_eq!(
            config.budget.max_steps,
            ExecutionBudget::default().max_steps
        );
    }
}
