//! Policy adapter.
//!
//! Externally authored policies describe intent ("forbid these patterns",
//! "keep replies short") rather than rules. `Policy::to_guardrail` maps a
//! policy onto native constraints with stable rule ids:
//!
//! | policy section | rule id                  |
//! |----------------|--------------------------|
//! | `forbid`       | `<policy>.pii`           |
//! | `length`       | `<policy>.length`        |
//! | `require_fields` | `<policy>.fields`      |
//! | `predicates[n]`| `<policy>.pred.<name>`   |

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::guardrail::{Constraint, GuardRail, GuardRailError};
use crate::types::{Mode, Params, Remedy, RuleKind, Severity};

/// How strictly a policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    #[default]
    Enforce,
    Audit,
}

impl From<Enforcement> for Mode {
    fn from(enforcement: Enforcement) -> Self {
        match enforcement {
            Enforcement::Enforce => Mode::Enforce,
            Enforcement::Audit => Mode::Audit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForbidPolicy {
    pub patterns: Vec<String>,

    #[serde(default = "default_error")]
    pub severity: Severity,

    #[serde(default = "default_fix")]
    pub on_match: Remedy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthPolicy {
    #[serde(default)]
    pub min: Option<u64>,

    #[serde(default)]
    pub max: Option<u64>,

    #[serde(default = "default_warning")]
    pub severity: Severity,

    #[serde(default = "default_log")]
    pub remedy: Remedy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicatePolicy {
    pub name: String,

    #[serde(default)]
    pub params: Params,

    #[serde(default = "default_error")]
    pub severity: Severity,

    #[serde(default = "default_escalate")]
    pub remedy: Remedy,
}

/// An externally declared output policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub enforcement: Enforcement,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forbid: Option<ForbidPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<LengthPolicy>,

    /// Missing fields always block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_fields: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<PredicatePolicy>,
}

fn default_error() -> Severity {
    Severity::Error
}

fn default_warning() -> Severity {
    Severity::Warning
}

fn default_fix() -> Remedy {
    Remedy::Fix
}

fn default_log() -> Remedy {
    Remedy::Log
}

fn default_escalate() -> Remedy {
    Remedy::Escalate
}

impl Policy {
    pub fn from_yaml(yaml: &str) -> Result<Self, GuardRailError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Translate into a guardrail. Pure: the same policy always yields the
    /// same rules in the same order.
    pub fn to_guardrail(&self) -> Result<GuardRail, GuardRailError> {
        let mut builder = GuardRail::builder(self.name.clone(), self.version.clone())
            .mode(self.enforcement.into())
            .description(format!("Generated from policy '{}'", self.name));

        for rule in self.constraints() {
            builder = builder.rule(rule);
        }

        builder.build()
    }

    fn constraints(&self) -> Vec<Constraint> {
        let mut rules = Vec::new();

        if let Some(forbid) = &self.forbid {
            rules.push(
                Constraint::new(
                    format!("{}.pii", self.name),
                    RuleKind::PatternMatch,
                    forbid.severity,
                    forbid.on_match,
                )
                .param("patterns", json!(forbid.patterns)),
            );
        }

        if let Some(length) = &self.length {
            let mut rule = Constraint::new(
                format!("{}.length", self.name),
                RuleKind::LengthBound,
                length.severity,
                length.remedy,
            );
            if let Some(min) = length.min {
                rule = rule.param("min_length", min);
            }
            if let Some(max) = length.max {
                rule = rule.param("max_length", max);
            }
            rules.push(rule);
        }

        if !self.require_fields.is_empty() {
            rules.push(
                Constraint::new(
                    format!("{}.fields", self.name),
                    RuleKind::RequiredFields,
                    Severity::Error,
                    Remedy::Reject,
                )
                .param("fields", json!(self.require_fields)),
            );
        }

        for predicate in &self.predicates {
            let mut rule = Constraint::new(
                format!("{}.pred.{}", self.name, predicate.name),
                RuleKind::ExternalPredicate,
                predicate.severity,
                predicate.remedy,
            );
            rule.params = predicate.params.clone();
            rules.push(rule.param("predicate", predicate.name.clone()));
        }

        rules
    }
}

impl TryFrom<&Policy> for GuardRail {
    type Error = GuardRailError;

    fn try_from(policy: &Policy) -> Result<Self, Self::Error> {
        policy.to_guardrail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
name: support-replies
version: "2.1"
enforcement: audit
forbid:
  patterns: [ssn, credit_card, email]
length:
  max: 500
  remedy: RETRY
require_fields: [answer]
predicates:
  - name: polite
    params:
      threshold: 0.8
"#;

    #[test]
    fn test_policy_to_guardrail() {
        let policy = Policy::from_yaml(POLICY).unwrap();
        let guardrail = policy.to_guardrail().unwrap();

        assert_eq!(guardrail.checkpoint_id, "support-replies");
        assert_eq!(guardrail.version, "2.1");
        assert_eq!(guardrail.mode, Mode::Audit);

        let ids: Vec<&str> = guardrail.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "support-replies.pii",
                "support-replies.length",
                "support-replies.fields",
                "support-replies.pred.polite",
            ]
        );

        let pii = guardrail.rule("support-replies.pii").unwrap();
        assert_eq!(pii.remedy, Remedy::Fix);
        assert_eq!(pii.params["patterns"], json!(["ssn", "credit_card", "email"]));

        let length = guardrail.rule("support-replies.length").unwrap();
        assert_eq!(length.severity, Severity::Warning);
        assert_eq!(length.remedy, Remedy::Retry);
        assert_eq!(length.params["max_length"], json!(500));
        assert!(!length.params.contains_key("min_length"));

        let pred = guardrail.rule("support-replies.pred.polite").unwrap();
        assert_eq!(pred.params["predicate"], json!("polite"));
        assert_eq!(pred.params["threshold"], json!(0.8));
        assert_eq!(pred.remedy, Remedy::Escalate);
    }

    #[test]
    fn test_translation_is_deterministic() {
        let policy = Policy::from_yaml(POLICY).unwrap();
        let a = policy.to_guardrail().unwrap();
        let b = GuardRail::try_from(&policy).unwrap();
        assert_eq!(a.rules, b.rules);
    }

    #[test]
    fn test_empty_policy_has_no_rules() {
        let policy = Policy::from_yaml("name: empty\nversion: \"1.0\"\n").unwrap();
        let guardrail = policy.to_guardrail().unwrap();
        assert!(guardrail.rules.is_empty());
        assert_eq!(guardrail.mode, Mode::Enforce);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let policy = Policy::from_yaml("name: p\nversion: latest\n").unwrap();
        assert!(policy.to_guardrail().is_err());
    }
}
