//! # guardrail-core
//!
//! Deterministic output-validation engine.
//!
//! This crate sits at the boundary between an untrusted generator (an LLM or
//! autonomous agent) and whatever consumes its output, answering:
//! - Does this content satisfy the checkpoint's rules?
//! - If not, can it be repaired, or must it be stopped?
//! - What exactly happened, for the audit record?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same checkpoint and content always produce the same verdict
//! 2. **Fail closed**: Unknown rule kinds, unknown patterns and crashing
//!    predicates fail their rule; they never pass silently
//! 3. **Traceable**: Every call produces an `AuditTrace` hashed over the original content
//! 4. **Non-blocking escalation**: ESCALATE queues for review and returns immediately
//!
//! ## Example
//!
//! ```rust,ignore
//! use guardrail_core::{Content, GuardRail, Validator};
//!
//! let guardrail = GuardRail::from_yaml_file("checkpoint.yaml")?;
//! let validator = Validator::new();
//! let result = validator.validate(&guardrail, &Content::text("SSN 529-81-3945 approved"));
//!
//! match result.into_content() {
//!     Ok(content) => forward(content),
//!     Err(err) => eprintln!("not forwarded: {}", err),
//! }
//! ```

pub mod config;
pub mod content;
pub mod executor;
pub mod guardrail;
pub mod orchestrator;
pub mod patterns;
pub mod policy;
pub mod repair;
pub mod resolver;
pub mod review;
pub mod trace;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use config::{ConfigError, EngineConfig};
pub use content::Content;
pub use executor::{ConstraintExecutor, ConstraintHandler, ExternalPredicate, PredicateRegistry};
pub use guardrail::{Constraint, GuardRail, GuardRailBuilder, GuardRailError};
pub use orchestrator::{Evaluation, Validator, ValidatorBuilder};
pub use patterns::{PatternCatalog, PatternError, SensitivePattern};
pub use policy::Policy;
pub use resolver::{ActionResolver, PrecedenceError, RemedyPrecedence, Resolution, RetryContext};
pub use review::{InMemoryReviewQueue, ReviewItem, ReviewQueue};
pub use trace::{content_hash, AuditTrace, AuditTraceBuilder, MemorySink, TraceSink, TracingSink};
pub use types::{Evidence, Mode, Params, Remedy, RuleError, RuleKind, RuleResult, Severity};
pub use verdict::{BlockReason, Disposition, ValidationError, ValidationResult};

/// Validate content with a default `Validator`.
///
/// Builds a fresh validator per call; long-lived callers should build one
/// `Validator` and share it.
pub fn validate(guardrail: &GuardRail, content: &Content) -> ValidationResult {
    Validator::new().validate(guardrail, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_validation() {
        let yaml = r#"
checkpoint_id: "loan-decision"
version: "1.0.0"
rules:
  - id: "no-ssn"
    kind: pattern_match
    params:
      patterns: ["ssn"]
    severity: ERROR
    remedy: FIX
"#;
        let guardrail = GuardRail::from_yaml(yaml).unwrap();
        let result = validate(&guardrail, &Content::text("SSN 529-81-3945 approved"));

        assert!(!result.is_valid);
        assert_eq!(
            result.into_content().unwrap(),
            Content::text("SSN [REDACTED-SSN] approved")
        );
    }

    #[test]
    fn test_result_serializes_expected_shape() {
        let guardrail = GuardRail::builder("cp", "1.0").build().unwrap();
        let result = validate(&guardrail, &Content::text("hello"));
        let json = serde_json::to_value(&result).unwrap();

        for field in [
            "is_valid",
            "rule_results",
            "repaired_content",
            "disposition",
            "trace",
            "elapsed_ms",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["disposition"]["action"], "forward");
        assert!(json["repaired_content"].is_null());
    }
}
