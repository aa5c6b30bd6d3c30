//! Caching layer for guardrail-runtime.
//!
//! Rule results are a pure function of the guardrail definition and the
//! content, so they are cached by (checkpoint id, version, content shape,
//! content hash). The shape is part of the key because a JSON string and the
//! equivalent object hash alike but carry evidence with different paths.
//! Only the evaluation is cached: every call still gets its own resolution,
//! trace and review-queue entry.

use moka::future::Cache;
use std::time::Duration;

use guardrail_core::{content_hash, Content, Evaluation, GuardRail};

/// Cache key for rule evaluations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    checkpoint_id: String,
    version: String,
    structured: bool,
    input_hash: String,
}

impl CacheKey {
    pub fn new(guardrail: &GuardRail, content: &Content) -> Self {
        Self {
            checkpoint_id: guardrail.checkpoint_id.clone(),
            version: guardrail.version.clone(),
            structured: content.is_structured(),
            input_hash: content_hash(content),
        }
    }
}

/// Evaluation cache using moka.
pub struct VerdictCache {
    cache: Cache<CacheKey, Evaluation>,
}

impl VerdictCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Evaluation> {
        self.cache.get(key).await
    }

    /// Store an evaluation unless it contains a transient failure.
    ///
    /// Returns whether the evaluation was stored.
    pub async fn insert(&self, key: CacheKey, evaluation: Evaluation) -> bool {
        if !is_cacheable(&evaluation) {
            tracing::debug!(?key, "Not caching evaluation with transient rule errors");
            return false;
        }
        self.cache.insert(key, evaluation).await;
        true
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}

/// Timeouts and crashed predicates may not recur; never pin them.
fn is_cacheable(evaluation: &Evaluation) -> bool {
    evaluation
        .results
        .iter()
        .filter_map(|r| r.error.as_ref())
        .all(|e| !e.is_transient())
}
