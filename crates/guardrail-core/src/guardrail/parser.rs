//! Guardrail parsing from YAML/JSON.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_definition_schema;
use crate::types::{Mode, Params, Remedy, RuleKind, Severity};

lazy_static! {
    static ref VERSION_PATTERN: Regex =
        Regex::new(r"^\d+\.\d+(\.\d+)?(-[0-9A-Za-z.-]+)?$").unwrap();
}

/// Errors that can occur when loading guardrail definitions.
#[derive(Error, Debug)]
pub enum GuardRailError {
    #[error("Failed to read definition file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Definition does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Definition validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// A single check applied to content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    /// Unique identifier within the guardrail
    pub id: String,

    /// What kind of check this is
    pub kind: RuleKind,

    /// Kind-specific parameters
    #[serde(default)]
    pub params: Params,

    pub severity: Severity,

    pub remedy: Remedy,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Constraint {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<RuleKind>,
        severity: Severity,
        remedy: Remedy,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: Params::new(),
            severity,
            remedy,
            enabled: true,
        }
    }

    /// Set a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// An ordered, versioned collection of constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardRail {
    pub checkpoint_id: String,

    /// Semantic version of this definition
    pub version: String,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Constraints in evaluation order
    #[serde(default)]
    pub rules: Vec<Constraint>,
}

impl GuardRail {
    /// Start building a guardrail in code.
    pub fn builder(checkpoint_id: impl Into<String>, version: impl Into<String>) -> GuardRailBuilder {
        GuardRailBuilder {
            guardrail: GuardRail {
                checkpoint_id: checkpoint_id.into(),
                version: version.into(),
                mode: Mode::Enforce,
                created_at: Utc::now(),
                description: None,
                rules: Vec::new(),
            },
        }
    }

    /// Parse a guardrail from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, GuardRailError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a guardrail from JSON string.
    pub fn from_json(json: &str) -> Result<Self, GuardRailError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a guardrail from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, GuardRailError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a guardrail from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GuardRailError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load a definition file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GuardRailError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, GuardRailError> {
        validate_definition_schema(&value).map_err(GuardRailError::SchemaError)?;
        let guardrail: GuardRail = serde_json::from_value(value)?;
        guardrail.validate()?;
        Ok(guardrail)
    }

    /// Validate the definition structure.
    pub fn validate(&self) -> Result<(), GuardRailError> {
        if self.checkpoint_id.trim().is_empty() {
            return Err(GuardRailError::MissingField("checkpoint_id".to_string()));
        }

        if !VERSION_PATTERN.is_match(&self.version) {
            return Err(GuardRailError::ValidationError(format!(
                "Version '{}' is not a semantic version",
                self.version
            )));
        }

        self.validate_unique_rule_ids()
    }

    /// Ensure rule IDs are present and unique.
    fn validate_unique_rule_ids(&self) -> Result<(), GuardRailError> {
        let mut seen = HashSet::new();

        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(GuardRailError::MissingField("rules[].id".to_string()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(GuardRailError::ValidationError(format!(
                    "Duplicate rule ID: {}",
                    rule.id
                )));
            }
        }

        Ok(())
    }

    /// Find a rule by ID.
    pub fn rule(&self, id: &str) -> Option<&Constraint> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Enabled rules in declared order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Constraint> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Number of rules that are skipped because they are disabled.
    pub fn disabled_count(&self) -> usize {
        self.rules.iter().filter(|r| !r.enabled).count()
    }

    /// A copy with rules reordered cheapest-first.
    ///
    /// The sort is stable, so rules of equal cost keep their declared
    /// order. The verdict is unchanged; only latency and the order of
    /// reported results differ.
    pub fn cheapest_first(&self) -> GuardRail {
        let mut reordered = self.clone();
        reordered.rules.sort_by_key(|r| r.kind.relative_cost());
        reordered
    }
}

/// Builder for guardrails constructed in code.
pub struct GuardRailBuilder {
    guardrail: GuardRail,
}

impl GuardRailBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.guardrail.mode = mode;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.guardrail.description = Some(description.into());
        self
    }

    pub fn rule(mut self, rule: Constraint) -> Self {
        self.guardrail.rules.push(rule);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<GuardRail, GuardRailError> {
        self.guardrail.validate()?;
        Ok(self.guardrail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_GUARDRAIL: &str = r#"
checkpoint_id: "loan-decision"
version: "1.2.0"
mode: ENFORCE
rules:
  - id: "no-ssn"
    kind: pattern_match
    params:
      patterns: ["ssn"]
    severity: ERROR
    remedy: FIX
  - id: "length"
    kind: length_bound
    params:
      max_length: 500
    severity: WARNING
    remedy: LOG
    enabled: false
"#;

    #[test]
    fn test_parse_valid_guardrail() {
        let guardrail = GuardRail::from_yaml(VALID_GUARDRAIL).unwrap();
        assert_eq!(guardrail.checkpoint_id, "loan-decision");
        assert_eq!(guardrail.version, "1.2.0");
        assert_eq!(guardrail.rules.len(), 2);
        assert_eq!(guardrail.rules[0].kind, RuleKind::PatternMatch);
        assert_eq!(guardrail.rules[0].remedy, Remedy::Fix);
        assert!(guardrail.rules[0].enabled);
        assert!(!guardrail.rules[1].enabled);
        assert_eq!(guardrail.enabled_rules().count(), 1);
        assert_eq!(guardrail.disabled_count(), 1);
    }

    #[test]
    fn test_parse_json_guardrail() {
        let json = r#"{
            "checkpoint_id": "cp",
            "version": "1.0",
            "mode": "AUDIT",
            "rules": [
                {"id": "r1", "kind": "required_fields", "params": {"fields": ["a"]},
                 "severity": "ERROR", "remedy": "REJECT"}
            ]
        }"#;
        let guardrail = GuardRail::from_json(json).unwrap();
        assert_eq!(guardrail.mode, Mode::Audit);
        assert_eq!(guardrail.rule("r1").unwrap().kind, RuleKind::RequiredFields);
    }

    #[test]
    fn test_duplicate_rule_ids() {
        let yaml = r#"
checkpoint_id: "cp"
version: "1.0"
rules:
  - id: "r1"
    kind: length_bound
    severity: ERROR
    remedy: LOG
  - id: "r1"
    kind: pattern_match
    severity: ERROR
    remedy: LOG
"#;
        let result = GuardRail::from_yaml(yaml);
        assert!(matches!(result, Err(GuardRailError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_remedy_is_schema_error() {
        let yaml = r#"
checkpoint_id: "cp"
version: "1.0"
rules:
  - id: "r1"
    kind: length_bound
    severity: ERROR
    remedy: DELETE
"#;
        let result = GuardRail::from_yaml(yaml);
        assert!(matches!(result, Err(GuardRailError::SchemaError(_))));
    }

    #[test]
    fn test_unknown_kind_loads() {
        let yaml = r#"
checkpoint_id: "cp"
version: "1.0"
rules:
  - id: "r1"
    kind: sentiment
    severity: ERROR
    remedy: REJECT
"#;
        let guardrail = GuardRail::from_yaml(yaml).unwrap();
        assert_eq!(
            guardrail.rules[0].kind,
            RuleKind::Unrecognized("sentiment".to_string())
        );
    }

    #[test]
    fn test_builder_validates() {
        let result = GuardRail::builder("cp", "not-a-version").build();
        assert!(matches!(result, Err(GuardRailError::ValidationError(_))));

        let result = GuardRail::builder("", "1.0").build();
        assert!(matches!(result, Err(GuardRailError::MissingField(_))));

        let result = GuardRail::builder("cp", "1.0")
            .rule(Constraint::new("a", RuleKind::LengthBound, Severity::Info, Remedy::Log))
            .rule(Constraint::new("a", RuleKind::LengthBound, Severity::Info, Remedy::Log))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_cheapest_first_is_stable() {
        let guardrail = GuardRail::builder("cp", "1.0")
            .rule(Constraint::new("pred", RuleKind::ExternalPredicate, Severity::Error, Remedy::Log))
            .rule(Constraint::new("pii", RuleKind::PatternMatch, Severity::Error, Remedy::Fix))
            .rule(Constraint::new("len-a", RuleKind::LengthBound, Severity::Info, Remedy::Log))
            .rule(Constraint::new("len-b", RuleKind::LengthBound, Severity::Info, Remedy::Log))
            .build()
            .unwrap();

        let reordered = guardrail.cheapest_first();
        let ids: Vec<&str> = reordered.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["len-a", "len-b", "pii", "pred"]);
    }
}
