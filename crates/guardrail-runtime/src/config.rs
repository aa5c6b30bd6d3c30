//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use guardrail_core::config::humantime_duration;
use guardrail_core::{ConfigError, EngineConfig};

/// Configuration for a `CheckpointService`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Evaluate the rules of one call concurrently
    pub parallel_rules: bool,

    pub cache: CacheConfig,

    /// Settings for the underlying validator
    pub engine: EngineConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallel_rules: true,
            cache: CacheConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

/// Verdict cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub max_entries: u64,

    /// Entry lifetime (e.g. "1h")
    #[serde(with = "humantime_duration")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert!(config.parallel_rules);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.engine.retry_budget, 2);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
parallel_rules: false
cache:
  ttl: 5m
engine:
  retry_budget: 4
  predicate_timeout: 500ms
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert!(!config.parallel_rules);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.engine.retry_budget, 4);
        assert_eq!(config.engine.predicate_timeout, Duration::from_millis(500));
    }
}
