//! Pattern-match handler.
//!
//! Scans content for every configured sensitive-data pattern. Text content
//! is scanned directly; structured content is scanned string leaf by string
//! leaf, and each piece of evidence records the leaf's dotted path.

use std::sync::Arc;

use super::{param_string_list, ConstraintHandler};
use crate::content::Content;
use crate::guardrail::Constraint;
use crate::patterns::{PatternCatalog, SensitivePattern};
use crate::types::{Evidence, RuleKind, RuleResult};

pub struct PatternMatchHandler {
    catalog: Arc<PatternCatalog>,
}

impl PatternMatchHandler {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }
}

/// Every match of every pattern, pattern by pattern, leaf by leaf.
pub(crate) fn scan(patterns: &[&SensitivePattern], content: &Content) -> Vec<Evidence> {
    let leaves = content.string_leaves();
    let mut evidence = Vec::new();

    for pattern in patterns {
        for (path, text) in &leaves {
            evidence.extend(pattern.find_all(text).into_iter().map(|mut e| {
                e.path = path.clone();
                e
            }));
        }
    }

    evidence
}

impl ConstraintHandler for PatternMatchHandler {
    fn kind(&self) -> RuleKind {
        RuleKind::PatternMatch
    }

    fn check(&self, rule: &Constraint, content: &Content) -> RuleResult {
        let names = match param_string_list(rule, "patterns") {
            Ok(names) => names,
            Err(error) => return RuleResult::errored(rule, error),
        };

        // Resolve every name first: one unknown pattern fails the whole rule.
        let mut patterns = Vec::with_capacity(names.len());
        for name in &names {
            match self.catalog.get(name) {
                Ok(pattern) => patterns.push(pattern),
                Err(error) => return RuleResult::misconfigured(rule, error.to_string()),
            }
        }

        let evidence = scan(&patterns, content);
        if evidence.is_empty() {
            return RuleResult::pass(
                rule,
                format!("No matches for patterns: {}", names.join(", ")),
            );
        }

        let mut matched: Vec<&str> = evidence.iter().map(|e| e.pattern.as_str()).collect();
        matched.dedup();
        let message = format!(
            "Detected {} sensitive match(es) for patterns: {}",
            evidence.len(),
            matched.join(", ")
        );
        RuleResult::fail(rule, message, evidence)
    }
}
