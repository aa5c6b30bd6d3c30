//! Constraint execution.
//!
//! The `ConstraintExecutor` dispatches each constraint to the handler
//! registered for its kind. Handlers never return errors: configuration
//! problems, timeouts and panics all become failed `RuleResult`s, so a
//! single bad rule cannot abort a checkpoint.

mod fields;
mod length;
mod pattern;
mod predicate;

pub use fields::RequiredFieldsHandler;
pub use length::LengthBoundHandler;
pub(crate) use length::LengthBounds;
pub(crate) use pattern::scan as scan_patterns;
pub use pattern::PatternMatchHandler;
pub use predicate::{
    ExternalPredicate, ExternalPredicateHandler, PredicateRegistry, DEFAULT_MAX_PREDICATE_WORKERS,
};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::content::Content;
use crate::guardrail::Constraint;
use crate::patterns::PatternCatalog;
use crate::types::{RuleError, RuleKind, RuleResult};

/// A check for one rule kind.
///
/// Implementations must be side-effect free with respect to the content and
/// must not share mutable state across calls.
pub trait ConstraintHandler: Send + Sync {
    /// The rule kind this handler evaluates.
    fn kind(&self) -> RuleKind;

    /// Evaluate one constraint against one content value.
    fn check(&self, rule: &Constraint, content: &Content) -> RuleResult;
}

/// Table of rule kind to handler.
#[derive(Default)]
pub struct ConstraintExecutor {
    handlers: HashMap<RuleKind, Arc<dyn ConstraintHandler>>,
}

impl ConstraintExecutor {
    /// An executor with no handlers; every rule fails as unrecognized.
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor with the four builtin handlers installed.
    pub fn with_defaults(
        catalog: Arc<PatternCatalog>,
        predicates: Arc<PredicateRegistry>,
        predicate_timeout: Duration,
    ) -> Self {
        let mut executor = Self::new();
        executor.register(Arc::new(PatternMatchHandler::new(catalog)));
        executor.register(Arc::new(LengthBoundHandler));
        executor.register(Arc::new(RequiredFieldsHandler));
        executor.register(Arc::new(ExternalPredicateHandler::new(
            predicates,
            predicate_timeout,
        )));
        executor
    }

    /// Install a handler, replacing any existing handler for its kind.
    pub fn register(&mut self, handler: Arc<dyn ConstraintHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn handles(&self, kind: &RuleKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Execute one constraint. Never panics and never returns an error.
    pub fn execute(&self, rule: &Constraint, content: &Content) -> RuleResult {
        let Some(handler) = self.handlers.get(&rule.kind) else {
            tracing::warn!(rule_id = %rule.id, kind = %rule.kind, "No handler for rule kind");
            return RuleResult::misconfigured(
                rule,
                format!("unrecognized rule kind '{}'", rule.kind),
            );
        };

        match catch_unwind(AssertUnwindSafe(|| handler.check(rule, content))) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(rule_id = %rule.id, kind = %rule.kind, "Rule handler panicked");
                RuleResult::errored(
                    rule,
                    RuleError::HandlerCrashed {
                        kind: rule.kind.to_string(),
                    },
                )
            }
        }
    }
}

// Parameter helpers shared by the handlers.

/// A required list of strings.
pub(crate) fn param_string_list(rule: &Constraint, key: &str) -> Result<Vec<String>, RuleError> {
    let value = rule
        .params
        .get(key)
        .ok_or_else(|| RuleError::configuration(format!("missing parameter '{}'", key)))?;

    let items = value.as_array().ok_or_else(|| {
        RuleError::configuration(format!("parameter '{}' must be a list of strings", key))
    })?;

    let list = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                RuleError::configuration(format!("parameter '{}' must be a list of strings", key))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if list.is_empty() {
        return Err(RuleError::configuration(format!(
            "parameter '{}' must not be empty",
            key
        )));
    }

    Ok(list)
}

/// A required string.
pub(crate) fn param_string(rule: &Constraint, key: &str) -> Result<String, RuleError> {
    rule.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| RuleError::configuration(format!("missing string parameter '{}'", key)))
}

/// An optional non-negative integer.
pub(crate) fn param_u64(rule: &Constraint, key: &str) -> Result<Option<u64>, RuleError> {
    match rule.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            RuleError::configuration(format!(
                "parameter '{}' must be a non-negative integer",
                key
            ))
        }),
    }
}
