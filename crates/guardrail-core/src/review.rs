//! Human review queue for escalated content.
//!
//! ESCALATE is non-blocking: the validator enqueues an item and returns
//! immediately. Draining and deciding items is the consumer's business.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::content::Content;
use crate::types::RuleResult;

/// Content awaiting a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub review_id: Uuid,

    /// Trace of the validation call that escalated
    pub trace_id: Uuid,

    pub checkpoint_id: String,
    pub checkpoint_version: String,

    /// Content as it would be forwarded (after any FIX)
    pub content: Content,

    /// The failed results whose remedy was ESCALATE
    pub results: Vec<RuleResult>,

    pub enqueued_at: DateTime<Utc>,
}

/// Destination for escalated items. Must accept concurrent enqueues.
pub trait ReviewQueue: Send + Sync {
    fn enqueue(&self, item: ReviewItem);
}

/// A process-local review queue.
#[derive(Debug, Default)]
pub struct InMemoryReviewQueue {
    items: Mutex<VecDeque<ReviewItem>>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every queued item, oldest first.
    pub fn drain(&self) -> Vec<ReviewItem> {
        self.items.lock().drain(..).collect()
    }

    /// Remove and return the oldest item.
    pub fn pop(&self) -> Option<ReviewItem> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl ReviewQueue for InMemoryReviewQueue {
    fn enqueue(&self, item: ReviewItem) {
        tracing::info!(
            review_id = %item.review_id,
            trace_id = %item.trace_id,
            checkpoint_id = %item.checkpoint_id,
            "Queued content for human review"
        );
        self.items.lock().push_back(item);
    }
}
