//! Engine configuration.

use serde::{Deserialize, Serialize};
use verity_path::{MissingKeyPolicy, PathSyntax};

use crate::error::EngineError;
use crate::result::{ResultCode, RuleResult};

/// Where rule computations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// On the caller's thread, one after another.
    #[default]
    Sequential,
    /// On a worker pool, with per-location memoization when caching is on.
    Concurrent,
}

/// Post-processing applied to `SKIPPED` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkippedPolicy {
    /// Leave them alone.
    #[default]
    Keep,
    /// Report them as `OK`.
    AsOk,
    /// Report them as `FAILED`.
    AsFailed,
}

impl SkippedPolicy {
    /// Remap `result` if it is `SKIPPED`. The reason is kept.
    #[must_use]
    pub fn apply(self, result: RuleResult) -> RuleResult {
        if result.code != ResultCode::Skipped {
            return result;
        }
        let code = match self {
            Self::Keep => ResultCode::Skipped,
            Self::AsOk => ResultCode::Ok,
            Self::AsFailed => ResultCode::Failed,
        };
        RuleResult { code, ..result }
    }
}

/// Settings for a [`Validator`](crate::Validator).
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use verity_rules::{EngineConfig, ExecutionMode};
///
/// let config: EngineConfig =
///     serde_json::from_str(r#"{"mode": "concurrent", "worker_threads": 2}"#).unwrap();
/// assert_eq!(config.mode, ExecutionMode::Concurrent);
/// assert!(config.caching);
/// assert_eq!(config.path.separator, "/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path separator and wildcard tokens.
    pub path: PathSyntax,
    /// What map lookups report for missing keys.
    pub missing_key: MissingKeyPolicy,
    /// Sequential or concurrent execution.
    pub mode: ExecutionMode,
    /// Memoize `(facts, path, rule)` within a run. Concurrent mode only.
    pub caching: bool,
    /// Worker threads for an engine-owned runtime; `None` uses tokio's default.
    pub worker_threads: Option<usize>,
    /// Cap on the blocking pool that rule bodies run on.
    pub max_blocking_threads: usize,
    /// Remapping of `SKIPPED` results.
    pub skipped: SkippedPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathSyntax::default(),
            missing_key: MissingKeyPolicy::default(),
            mode: ExecutionMode::default(),
            caching: true,
            worker_threads: None,
            max_blocking_threads: 512,
            skipped: SkippedPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Check the settings for consistency.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.path
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        if self.worker_threads == Some(0) {
            return Err(EngineError::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.max_blocking_threads == 0 {
            return Err(EngineError::InvalidConfig(
                "max_blocking_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
