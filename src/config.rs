//! Engine configuration loading and persistence.

use crate::parallel::ParallelConfig;
use crate::scheduler::SchedulerConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Top-level configuration for the execution engine.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl EngineConfig {
    /// Parse a configuration from TOML text. Missing sections fall back to
    /// their defaults.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("invalid engine configuration")
    }

    /// Load from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("serializing engine configuration")?;
        fs::write(path, content)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PriorityStrategy;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let loaded = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(
            loaded.scheduler.max_concurrent_tasks,
            config.scheduler.max_concurrent_tasks
        );
        assert_eq!(loaded.parallel.call_timeout_ms, config.parallel.call_timeout_ms);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [scheduler]
            max_concurrent_tasks = 8
            history_limit = 32
            strategy = "deadline"
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_concurrent_tasks, 8);
        assert_eq!(config.scheduler.strategy, PriorityStrategy::Deadline);
        assert_eq!(config.parallel.call_timeout_ms, 30_000);
    }

    #[test]
    fn mistyped_fields_are_rejected() {
        let input = r#"
            [scheduler]
            max_concurrent_tasks = "many"
            history_limit = 32
        "#;
        assert!(EngineConfig::from_toml_str(input).is_err());
    }
}
