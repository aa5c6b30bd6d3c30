//! Validation verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::content::Content;
use crate::trace::AuditTrace;
use crate::types::RuleResult;

/// What the caller should do with the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Disposition {
    /// Safe to forward (possibly repaired)
    Forward { content: Content },

    /// Suppressed; nothing may be forwarded
    Blocked { reason: BlockReason },

    /// Ask the generator for a new attempt
    RetryRequested {
        guidance: String,
        attempt: u32,
        budget: u32,
    },

    /// Held for human review
    PendingReview { review_id: Uuid, content: Content },
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Forward { .. } => "forward",
            Disposition::Blocked { .. } => "blocked",
            Disposition::RetryRequested { .. } => "retry_requested",
            Disposition::PendingReview { .. } => "pending_review",
        }
    }

    pub fn review_id(&self) -> Option<Uuid> {
        match self {
            Disposition::PendingReview { review_id, .. } => Some(*review_id),
            _ => None,
        }
    }
}

/// Why content was blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum BlockReason {
    /// A rule routed to REJECT failed
    Rejected { rule_ids: Vec<String> },

    /// RETRY was requested after the regeneration budget was spent
    RetryBudgetExhausted { attempts: u32, rule_ids: Vec<String> },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Rejected { rule_ids } => {
                write!(f, "rejected by {}", rule_ids.join(", "))
            }
            BlockReason::RetryBudgetExhausted { attempts, rule_ids } => write!(
                f,
                "retry budget exhausted after {} attempt(s); still failing: {}",
                attempts,
                rule_ids.join(", ")
            ),
        }
    }
}

/// Caller-facing failure when content cannot be forwarded as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Content blocked ({trace_id}): {reason}")]
    Blocked { trace_id: Uuid, reason: BlockReason },

    #[error("Content blocked ({trace_id}): retry budget exhausted after {attempts} attempt(s)")]
    RetryBudgetExhausted { trace_id: Uuid, attempts: u32 },

    #[error("Regeneration requested ({trace_id}): {guidance}")]
    RetryRequested { trace_id: Uuid, guidance: String },

    #[error("Content held for human review ({review_id})")]
    PendingReview { review_id: Uuid },
}

/// Result of validating one content value against one guardrail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// No ERROR-severity rule failed
    pub is_valid: bool,

    /// One result per enabled rule, in declared order
    pub rule_results: Vec<RuleResult>,

    /// Present only if FIX changed the content and it was not suppressed
    pub repaired_content: Option<Content>,

    pub disposition: Disposition,

    pub trace: AuditTrace,

    pub elapsed_ms: f64,
}

impl ValidationResult {
    pub fn failed_results(&self) -> impl Iterator<Item = &RuleResult> {
        self.rule_results.iter().filter(|r| !r.passed)
    }

    /// Content that may be forwarded right now, if any.
    pub fn forwardable_content(&self) -> Option<&Content> {
        match &self.disposition {
            Disposition::Forward { content } => Some(content),
            _ => None,
        }
    }

    /// Take the forwardable content, or the reason there is none.
    pub fn into_content(self) -> Result<Content, ValidationError> {
        let trace_id = self.trace.trace_id;
        match self.disposition {
            Disposition::Forward { content } => Ok(content),
            Disposition::Blocked {
                reason: BlockReason::RetryBudgetExhausted { attempts, .. },
            } => Err(ValidationError::RetryBudgetExhausted { trace_id, attempts }),
            Disposition::Blocked { reason } => Err(ValidationError::Blocked { trace_id, reason }),
            Disposition::RetryRequested { guidance, .. } => {
                Err(ValidationError::RetryRequested { trace_id, guidance })
            }
            Disposition::PendingReview { review_id, .. } => {
                Err(ValidationError::PendingReview { review_id })
            }
        }
    }
}
