//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::resolver::RemedyPrecedence;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings for a `Validator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default time budget for an external predicate (e.g. "2s", "250ms")
    #[serde(with = "humantime_duration")]
    pub predicate_timeout: Duration,

    /// Regeneration attempts allowed before RETRY degrades to REJECT
    pub retry_budget: u32,

    /// Remedy order, strictest first
    pub precedence: RemedyPrecedence,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            predicate_timeout: Duration::from_secs(2),
            retry_budget: 2,
            precedence: RemedyPrecedence::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

/// Serde adapter for durations written in humantime form ("30s", "5m").
pub mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Remedy;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.predicate_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_budget, 2);
        assert_eq!(config.precedence.strictest([Remedy::Log, Remedy::Reject]), Some(Remedy::Reject));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml("predicate_timeout: 250ms\n").unwrap();
        assert_eq!(config.predicate_timeout, Duration::from_millis(250));
        assert_eq!(config.retry_budget, 2);
    }

    #[test]
    fn test_custom_precedence() {
        let yaml = r#"
retry_budget: 5
precedence: [ESCALATE, REJECT, RETRY, FIX, LOG]
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.retry_budget, 5);
        assert_eq!(
            config.precedence.strictest([Remedy::Reject, Remedy::Escalate]),
            Some(Remedy::Escalate)
        );
    }

    #[test]
    fn test_rejects_incomplete_precedence() {
        assert!(EngineConfig::from_yaml("precedence: [REJECT, LOG]\n").is_err());
        assert!(EngineConfig::from_yaml("predicate_timeout: soon\n").is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("predicate_timeout: 2s"));
        assert_eq!(EngineConfig::from_yaml(&yaml).unwrap(), config);
    }
}
