//! Core types for guardrail evaluation.
//!
//! Severity, remedy, mode and rule kind are closed enumerations with a
//! lossless mapping to their canonical string form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::guardrail::Constraint;

/// Kind-specific rule parameters.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Error returned when a string is not a canonical enum value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// How much a failed rule counts against overall validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// A failure flips `is_valid` to false
    Error,
    /// Recorded, never flips validity
    Warning,
    /// Recorded, never flips validity
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(Severity::Error),
            "WARNING" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            other => Err(ParseEnumError {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// Action taken when a rule fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Remedy {
    /// Suppress the content and signal a blocking failure
    Reject,
    /// Deterministically repair the content
    Fix,
    /// Ask the generator to regenerate
    Retry,
    /// Queue for human review
    Escalate,
    /// Record only
    Log,
}

impl Remedy {
    pub const ALL: [Remedy; 5] = [
        Remedy::Reject,
        Remedy::Fix,
        Remedy::Retry,
        Remedy::Escalate,
        Remedy::Log,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Remedy::Reject => "REJECT",
            Remedy::Fix => "FIX",
            Remedy::Retry => "RETRY",
            Remedy::Escalate => "ESCALATE",
            Remedy::Log => "LOG",
        }
    }
}

impl fmt::Display for Remedy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Remedy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Remedy::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "remedy",
                value: s.to_string(),
            })
    }
}

/// Whether a guardrail applies its remedies or only reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Remedies are applied
    #[default]
    Enforce,
    /// Remedies are computed and logged, never applied
    Audit,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Enforce => "ENFORCE",
            Mode::Audit => "AUDIT",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENFORCE" => Ok(Mode::Enforce),
            "AUDIT" => Ok(Mode::Audit),
            other => Err(ParseEnumError {
                kind: "mode",
                value: other.to_string(),
            }),
        }
    }
}

/// The kind of check a constraint performs.
///
/// Unknown kind strings are kept as `Unrecognized` so a single bad rule
/// fails closed at evaluation time instead of rejecting the whole definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleKind {
    PatternMatch,
    LengthBound,
    RequiredFields,
    ExternalPredicate,
    Unrecognized(String),
}

impl RuleKind {
    pub fn as_str(&self) -> &str {
        match self {
            RuleKind::PatternMatch => "pattern_match",
            RuleKind::LengthBound => "length_bound",
            RuleKind::RequiredFields => "required_fields",
            RuleKind::ExternalPredicate => "external_predicate",
            RuleKind::Unrecognized(kind) => kind,
        }
    }

    /// Relative evaluation cost, used to order rules cheapest-first.
    pub fn relative_cost(&self) -> u32 {
        match self {
            RuleKind::Unrecognized(_) => 0,
            RuleKind::LengthBound => 1,
            RuleKind::RequiredFields => 2,
            RuleKind::PatternMatch => 4,
            RuleKind::ExternalPredicate => 16,
        }
    }
}

impl From<String> for RuleKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pattern_match" => RuleKind::PatternMatch,
            "length_bound" => RuleKind::LengthBound,
            "required_fields" => RuleKind::RequiredFields,
            "external_predicate" => RuleKind::ExternalPredicate,
            _ => RuleKind::Unrecognized(value),
        }
    }
}

impl From<&str> for RuleKind {
    fn from(value: &str) -> Self {
        RuleKind::from(value.to_string())
    }
}

impl From<RuleKind> for String {
    fn from(kind: RuleKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A matched span of sensitive content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Name of the pattern that matched
    pub pattern: String,

    /// The matched substring
    pub matched: String,

    /// Start offset in characters
    pub start: usize,

    /// End offset in characters (exclusive)
    pub end: usize,

    /// Dotted field path when the match is inside structured content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Evidence {
    /// Pointer to the matched location (e.g., "content[4:15]").
    pub fn pointer(&self) -> String {
        match &self.path {
            Some(path) => format!("content.{}[{}:{}]", path, self.start, self.end),
            None => format!("content[{}:{}]", self.start, self.end),
        }
    }
}

/// Why a rule failed without reaching a genuine verdict on the content.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleError {
    #[error("configuration error: {detail}")]
    Configuration { detail: String },

    #[error("predicate '{predicate}' timed out after {timeout_ms}ms")]
    PredicateTimeout { predicate: String, timeout_ms: u64 },

    #[error("predicate '{predicate}' crashed")]
    PredicateCrashed { predicate: String },

    #[error("predicate '{predicate}' not run: {limit} workers already busy")]
    PredicateOverloaded { predicate: String, limit: usize },

    #[error("handler for '{kind}' crashed")]
    HandlerCrashed { kind: String },
}

impl RuleError {
    pub fn configuration(detail: impl Into<String>) -> Self {
        RuleError::Configuration {
            detail: detail.into(),
        }
    }

    /// Whether a retry of the same call could produce a different outcome.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RuleError::PredicateTimeout { .. }
                | RuleError::PredicateCrashed { .. }
                | RuleError::PredicateOverloaded { .. }
        )
    }
}

/// Outcome of one constraint against one content value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub passed: bool,
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,

    pub severity: Severity,
    pub remedy: Remedy,

    /// Set when the failure is an error rather than a content violation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleError>,
}

impl RuleResult {
    pub fn pass(rule: &Constraint, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            passed: true,
            message: message.into(),
            evidence: Vec::new(),
            severity: rule.severity,
            remedy: rule.remedy,
            error: None,
        }
    }

    pub fn fail(rule: &Constraint, message: impl Into<String>, evidence: Vec<Evidence>) -> Self {
        Self {
            rule_id: rule.id.clone(),
            passed: false,
            message: message.into(),
            evidence,
            severity: rule.severity,
            remedy: rule.remedy,
            error: None,
        }
    }

    /// A failed result caused by an error; the message is the error text.
    pub fn errored(rule: &Constraint, error: RuleError) -> Self {
        Self {
            rule_id: rule.id.clone(),
            passed: false,
            message: error.to_string(),
            evidence: Vec::new(),
            severity: rule.severity,
            remedy: rule.remedy,
            error: Some(error),
        }
    }

    pub fn misconfigured(rule: &Constraint, detail: impl Into<String>) -> Self {
        Self::errored(rule, RuleError::configuration(detail))
    }

    /// True when this result makes the overall verdict invalid.
    pub fn blocks_validity(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}
