use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Scheduler configuration, typically parsed from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Merge identical sub-invocations of kernels that allow it.
    pub enable_unified_dispatch: bool,
    /// GPU-stat scope wrapping every submission.
    pub profile_scope: String,
    /// Name of the deferred pass releasing queued executions.
    pub cleanup_pass_name: String,
    /// Log skipped executions at `warn` instead of `debug`.
    pub warn_on_fallback: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_unified_dispatch: true,
            profile_scope: "ComputeFramework::ExecuteBatches".to_string(),
            cleanup_pass_name: "ComputeFramework::Cleanup".to_string(),
            warn_on_fallback: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid scheduler config json")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scheduler config {}", path.display()))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = SchedulerConfig::from_json_str(r#"{ "enableUnifiedDispatch": false }"#)
            .expect("parse");
        assert!(!config.enable_unified_dispatch);
        assert_eq!(config.profile_scope, "ComputeFramework::ExecuteBatches");
        assert_eq!(config.cleanup_pass_name, "ComputeFramework::Cleanup");
        assert!(config.warn_on_fallback);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = SchedulerConfig::from_json_str("{ nope").unwrap_err();
        assert!(format!("{err:#}").contains("invalid scheduler config json"));
    }
}
