//! Required-fields handler.

use super::{param_string_list, ConstraintHandler};
use crate::content::{lookup, Content};
use crate::guardrail::Constraint;
use crate::types::{RuleKind, RuleResult};

/// Fails when any listed field is absent or null. All missing fields are
/// reported in one failure. Dotted paths reach into nested objects.
pub struct RequiredFieldsHandler;

impl ConstraintHandler for RequiredFieldsHandler {
    fn kind(&self) -> RuleKind {
        RuleKind::RequiredFields
    }

    fn check(&self, rule: &Constraint, content: &Content) -> RuleResult {
        let fields = match param_string_list(rule, "fields") {
            Ok(fields) => fields,
            Err(error) => return RuleResult::errored(rule, error),
        };

        let Some(object) = content.as_object() else {
            return RuleResult::fail(
                rule,
                format!(
                    "Content is not a structured object; required fields: {}",
                    fields.join(", ")
                ),
                vec![],
            );
        };

        let missing: Vec<&str> = fields
            .iter()
            .filter(|field| lookup(&object, field).map_or(true, |v| v.is_null()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            RuleResult::pass(rule, format!("All {} required fields present", fields.len()))
        } else {
            RuleResult::fail(
                rule,
                format!("Missing required fields: {}", missing.join(", ")),
                vec![],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Remedy, Severity};
    use serde_json::json;

    fn rule(fields: serde_json::Value) -> Constraint {
        Constraint::new("fields", RuleKind::RequiredFields, Severity::Error, Remedy::Reject)
            .param("fields", fields)
    }

    #[test]
    fn test_all_present() {
        let content = Content::from_value(json!({"decision": "APPROVED", "confidence": 0.9}));
        let result = RequiredFieldsHandler.check(&rule(json!(["decision", "confidence"])), &content);
        assert!(result.passed);
    }

    #[test]
    fn test_enumerates_every_missing_field() {
        let content = Content::from_value(json!({"decision": "APPROVED", "reason": null}));
        let result = RequiredFieldsHandler.check(
            &rule(json!(["decision", "confidence", "reason", "reviewer"])),
            &content,
        );
        assert!(!result.passed);
        assert_eq!(result.message, "Missing required fields: confidence, reason, reviewer");
    }

    #[test]
    fn test_json_text_is_parsed() {
        let content = Content::text(r#"{"decision":"APPROVED"}"#);
        let result = RequiredFieldsHandler.check(&rule(json!(["decision", "confidence"])), &content);
        assert!(!result.passed);
        assert!(result.message.contains("confidence"));
    }

    #[test]
    fn test_nested_paths() {
        let content = Content::from_value(json!({"applicant": {"name": "A", "id": null}}));
        let result =
            RequiredFieldsHandler.check(&rule(json!(["applicant.name", "applicant.id"])), &content);
        assert_eq!(result.message, "Missing required fields: applicant.id");
    }

    #[test]
    fn test_plain_text_fails() {
        let result = RequiredFieldsHandler.check(&rule(json!(["decision"])), &Content::text("yes"));
        assert!(!result.passed);
        assert!(result.message.contains("not a structured object"));
        assert!(result.error.is_none());
    }
}
