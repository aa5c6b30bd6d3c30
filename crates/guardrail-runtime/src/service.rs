//! Checkpoint service: async validation on top of the core `Validator`.
//!
//! It implements:
//! - Parallel fan-out of a guardrail's rules onto the blocking pool
//! - Deterministic fan-in in declared order, then `Validator::conclude`
//! - Verdict caching keyed by checkpoint version and content hash
//! - A regeneration loop that drives RETRY through a `ContentSource`

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

use guardrail_core::{
    Constraint, Content, Disposition, Evaluation, GuardRail, RetryContext, RuleError, RuleResult,
    ValidationResult, Validator,
};

use crate::cache::{CacheKey, VerdictCache};
use crate::config::RuntimeConfig;
use crate::RuntimeError;

/// Something that can produce a new attempt when RETRY is requested,
/// usually the upstream generator.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Produce attempt number `attempt` (1-based), addressing `guidance`.
    async fn regenerate(&self, guidance: &str, attempt: u32) -> Result<Content, RuntimeError>;
}

/// Async front end for validating content at a checkpoint.
pub struct CheckpointService {
    validator: Arc<Validator>,
    cache: Option<VerdictCache>,
    config: RuntimeConfig,
}

impl CheckpointService {
    /// Wrap a validator. The engine settings in `config` apply only to
    /// validators built with `CheckpointService::from_config`.
    pub fn new(validator: Validator, config: RuntimeConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| VerdictCache::new(config.cache.max_entries, config.cache.ttl));

        Self {
            validator: Arc::new(validator),
            cache,
            config,
        }
    }

    /// Build a default validator from the engine section of `config`.
    pub fn from_config(config: RuntimeConfig) -> Self {
        let validator = Validator::builder().config(config.engine.clone()).build();
        Self::new(validator, config)
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn cache(&self) -> Option<&VerdictCache> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Validate content as a first attempt.
    pub async fn validate(&self, guardrail: &GuardRail, content: Content) -> ValidationResult {
        let retry = RetryContext::first(self.validator.retry_budget());
        self.validate_with(guardrail, content, retry).await
    }

    /// Validate content at a given point in a regeneration loop.
    pub async fn validate_with(
        &self,
        guardrail: &GuardRail,
        content: Content,
        retry: RetryContext,
    ) -> ValidationResult {
        let started = Instant::now();
        let key = CacheKey::new(guardrail, &content);

        let cached = match &self.cache {
            Some(cache) => cache.get(&key).await,
            None => None,
        };

        let evaluation = match cached {
            Some(evaluation) => {
                tracing::debug!(checkpoint_id = %guardrail.checkpoint_id, "Evaluation cache hit");
                evaluation
            }
            None => {
                let evaluation = self.evaluate(guardrail, &content).await;
                if let Some(cache) = &self.cache {
                    cache.insert(key, evaluation.clone()).await;
                }
                evaluation
            }
        };

        self.validator
            .conclude(guardrail, &content, evaluation, retry, started)
    }

    /// Validate, regenerating through `source` while RETRY is requested.
    ///
    /// Stops at the first disposition that is not `RetryRequested`. Once the
    /// budget is spent the validator degrades RETRY to a block, so the loop
    /// always terminates.
    pub async fn validate_with_regeneration(
        &self,
        guardrail: &GuardRail,
        initial: Content,
        source: &dyn ContentSource,
    ) -> Result<ValidationResult, RuntimeError> {
        let mut retry = RetryContext::first(self.validator.retry_budget());
        let mut content = initial;

        loop {
            let result = self.validate_with(guardrail, content, retry).await;

            let guidance = match &result.disposition {
                Disposition::RetryRequested { guidance, .. } => guidance.clone(),
                _ => return Ok(result),
            };

            retry = retry.next();
            tracing::info!(
                checkpoint_id = %guardrail.checkpoint_id,
                attempt = retry.attempt,
                budget = retry.budget,
                "Requesting regeneration"
            );
            content = source.regenerate(&guidance, retry.attempt).await?;
        }
    }

    async fn evaluate(&self, guardrail: &GuardRail, content: &Content) -> Evaluation {
        if self.config.parallel_rules {
            return self.evaluate_parallel(guardrail, content).await;
        }

        let validator = Arc::clone(&self.validator);
        let owned_guardrail = guardrail.clone();
        let owned_content = content.clone();
        let handle = tokio::task::spawn_blocking(move || {
            validator.evaluate(&owned_guardrail, &owned_content)
        });

        match handle.await {
            Ok(evaluation) => evaluation,
            Err(error) => {
                tracing::error!(error = %error, "Sequential evaluation task failed");
                // Fall back to evaluating rule by rule so each failure is
                // attributed to its own rule.
                self.evaluate_parallel(guardrail, content).await
            }
        }
    }

    /// Fan each enabled rule out to the blocking pool; fan in in declared order.
    async fn evaluate_parallel(&self, guardrail: &GuardRail, content: &Content) -> Evaluation {
        let content = Arc::new(content.clone());
        let enabled: Vec<Constraint> = guardrail.enabled_rules().cloned().collect();
        let skipped = guardrail.rules.len() - enabled.len();

        let tasks = enabled.iter().map(|rule| {
            let validator = Arc::clone(&self.validator);
            let content = Arc::clone(&content);
            let rule = rule.clone();
            tokio::task::spawn_blocking(move || validator.execute_rule(&rule, &content))
        });

        let results = join_all(tasks)
            .await
            .into_iter()
            .zip(&enabled)
            .map(|(joined, rule)| {
                joined.unwrap_or_else(|error| {
                    tracing::error!(rule_id = %rule.id, error = %error, "Rule task failed");
                    RuleResult::errored(
                        rule,
                        RuleError::HandlerCrashed {
                            kind: rule.kind.to_string(),
                        },
                    )
                })
            })
            .collect();

        Evaluation { results, skipped }
    }
}
