//! Length-bound handler.
//!
//! Counts characters (not bytes) of the canonical content text.

use super::{param_u64, ConstraintHandler};
use crate::content::Content;
use crate::guardrail::Constraint;
use crate::types::{RuleError, RuleKind, RuleResult};

pub struct LengthBoundHandler;

/// Parsed `min_length` / `max_length` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LengthBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl LengthBounds {
    pub(crate) fn from_rule(rule: &Constraint) -> Result<Self, RuleError> {
        let min = param_u64(rule, "min_length")?.map(|v| v as usize);
        let max = param_u64(rule, "max_length")?.map(|v| v as usize);

        match (min, max) {
            (None, None) => Err(RuleError::configuration(
                "length_bound requires 'min_length' or 'max_length'",
            )),
            (Some(min), Some(max)) if min > max => Err(RuleError::configuration(format!(
                "min_length {} exceeds max_length {}",
                min, max
            ))),
            _ => Ok(Self { min, max }),
        }
    }

    fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("[{}, {}]", min, max),
            (Some(min), None) => format!("[{}, ∞)", min),
            (None, Some(max)) => format!("[0, {}]", max),
            (None, None) => "[0, ∞)".to_string(),
        }
    }
}

impl ConstraintHandler for LengthBoundHandler {
    fn kind(&self) -> RuleKind {
        RuleKind::LengthBound
    }

    fn check(&self, rule: &Constraint, content: &Content) -> RuleResult {
        let bounds = match LengthBounds::from_rule(rule) {
            Ok(bounds) => bounds,
            Err(error) => return RuleResult::errored(rule, error),
        };

        let length = content.char_len();

        if let Some(max) = bounds.max.filter(|max| length > *max) {
            return RuleResult::fail(
                rule,
                format!("Content length {} exceeds max_length {}", length, max),
                vec![],
            );
        }

        if let Some(min) = bounds.min.filter(|min| length < *min) {
            return RuleResult::fail(
                rule,
                format!("Content length {} is below min_length {}", length, min),
                vec![],
            );
        }

        RuleResult::pass(
            rule,
            format!("Content length {} within {}", length, bounds.describe()),
        )
    }
}
