//! Validation orchestrator.
//!
//! The `Validator` runs every enabled rule of a guardrail against one
//! content value, aggregates a verdict, resolves the effective remedy and
//! records an audit trace. Validation itself never fails: every problem with
//! a rule becomes a failed `RuleResult`.
//!
//! Evaluation and conclusion are exposed separately so callers can evaluate
//! rules elsewhere (in parallel, or from a cache) and still conclude here.

use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::content::Content;
use crate::executor::{ConstraintExecutor, ConstraintHandler, ExternalPredicate, PredicateRegistry};
use crate::guardrail::{Constraint, GuardRail};
use crate::patterns::PatternCatalog;
use crate::resolver::{ActionResolver, RemedyPrecedence, RetryContext};
use crate::review::{InMemoryReviewQueue, ReviewItem, ReviewQueue};
use crate::trace::{AuditTraceBuilder, TraceSink, TracingSink};
use crate::types::RuleResult;
use crate::verdict::{Disposition, ValidationResult};

/// Rule results for one content value, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub results: Vec<RuleResult>,

    /// Disabled rules
    pub skipped: usize,
}

/// Validates content against guardrails.
///
/// A `Validator` is immutable once built and can be shared across threads.
pub struct Validator {
    executor: ConstraintExecutor,
    resolver: ActionResolver,
    catalog: Arc<PatternCatalog>,
    review_queue: Arc<dyn ReviewQueue>,
    sinks: Vec<Arc<dyn TraceSink>>,
    config: EngineConfig,
}

impl Validator {
    /// A validator with the builtin patterns and default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn retry_budget(&self) -> u32 {
        self.config.retry_budget
    }

    /// Validate content, treating this call as the first attempt.
    pub fn validate(&self, guardrail: &GuardRail, content: &Content) -> ValidationResult {
        self.validate_with(guardrail, content, RetryContext::first(self.config.retry_budget))
    }

    /// Validate content at a given point in a regeneration loop.
    pub fn validate_with(
        &self,
        guardrail: &GuardRail,
        content: &Content,
        retry: RetryContext,
    ) -> ValidationResult {
        let started = Instant::now();
        let evaluation = self.evaluate(guardrail, content);
        self.conclude(guardrail, content, evaluation, retry, started)
    }

    /// Run every enabled rule in declared order. No short-circuit.
    pub fn evaluate(&self, guardrail: &GuardRail, content: &Content) -> Evaluation {
        let mut results = Vec::with_capacity(guardrail.rules.len());
        let mut skipped = 0;

        for rule in &guardrail.rules {
            if !rule.enabled {
                tracing::debug!(rule_id = %rule.id, "Skipping disabled rule");
                skipped += 1;
                continue;
            }
            results.push(self.execute_rule(rule, content));
        }

        Evaluation { results, skipped }
    }

    /// Run a single rule.
    pub fn execute_rule(&self, rule: &Constraint, content: &Content) -> RuleResult {
        let result = self.executor.execute(rule, content);
        tracing::debug!(
            rule_id = %rule.id,
            kind = %rule.kind,
            passed = result.passed,
            "Rule evaluated"
        );
        result
    }

    /// Aggregate, resolve, trace, enqueue and notify sinks.
    pub fn conclude(
        &self,
        guardrail: &GuardRail,
        content: &Content,
        evaluation: Evaluation,
        retry: RetryContext,
        started: Instant,
    ) -> ValidationResult {
        let Evaluation { results, skipped } = evaluation;
        let is_valid = !results.iter().any(RuleResult::blocks_validity);

        let resolution = self.resolver.resolve(guardrail, content, &results, retry);
        let elapsed = started.elapsed();

        let trace = AuditTraceBuilder::new(guardrail, content)
            .review_id(resolution.review_id())
            .build(&results, skipped, resolution.effective, elapsed);

        if let Disposition::PendingReview { review_id, content } = &resolution.disposition {
            tracing::warn!(
                checkpoint_id = %guardrail.checkpoint_id,
                trace_id = %trace.trace_id,
                review_id = %review_id,
                "Content escalated for human review"
            );
            self.review_queue.enqueue(ReviewItem {
                review_id: *review_id,
                trace_id: trace.trace_id,
                checkpoint_id: guardrail.checkpoint_id.clone(),
                checkpoint_version: guardrail.version.clone(),
                content: content.clone(),
                results: resolution.escalated.clone(),
                enqueued_at: trace.timestamp,
            });
        }

        if let Disposition::Blocked { reason } = &resolution.disposition {
            tracing::warn!(
                checkpoint_id = %guardrail.checkpoint_id,
                trace_id = %trace.trace_id,
                reason = %reason,
                "Content blocked"
            );
        }

        tracing::info!(
            checkpoint_id = %guardrail.checkpoint_id,
            trace_id = %trace.trace_id,
            is_valid,
            failed = trace.failed,
            disposition = resolution.disposition.label(),
            "Validation complete"
        );

        for sink in &self.sinks {
            sink.record(&trace);
        }

        ValidationResult {
            is_valid,
            rule_results: results,
            repaired_content: resolution.repaired,
            disposition: resolution.disposition,
            elapsed_ms: trace.elapsed_ms,
            trace,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles a `Validator` from its collaborators.
pub struct ValidatorBuilder {
    catalog: PatternCatalog,
    predicates: PredicateRegistry,
    handlers: Vec<Arc<dyn ConstraintHandler>>,
    review_queue: Option<Arc<dyn ReviewQueue>>,
    sinks: Vec<Arc<dyn TraceSink>>,
    config: EngineConfig,
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self {
            catalog: PatternCatalog::builtin(),
            predicates: PredicateRegistry::new(),
            handlers: Vec::new(),
            review_queue: None,
            sinks: Vec::new(),
            config: EngineConfig::default(),
        }
    }
}

impl ValidatorBuilder {
    /// Replace the pattern catalog (builtin by default).
    pub fn catalog(mut self, catalog: PatternCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn predicates(mut self, predicates: PredicateRegistry) -> Self {
        self.predicates = predicates;
        self
    }

    /// Register one external predicate.
    pub fn predicate(
        mut self,
        name: impl Into<String>,
        predicate: impl ExternalPredicate + 'static,
    ) -> Self {
        self.predicates.register(name, predicate);
        self
    }

    /// Install an additional rule-kind handler, replacing a builtin one of
    /// the same kind.
    pub fn handler(mut self, handler: Arc<dyn ConstraintHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Where escalations go (an in-memory queue by default).
    pub fn review_queue(mut self, queue: Arc<dyn ReviewQueue>) -> Self {
        self.review_queue = Some(queue);
        self
    }

    /// Add a trace sink. A `TracingSink` is always installed.
    pub fn sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn precedence(mut self, precedence: RemedyPrecedence) -> Self {
        self.config.precedence = precedence;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Validator {
        let catalog = Arc::new(self.catalog);
        let mut executor = ConstraintExecutor::with_defaults(
            Arc::clone(&catalog),
            Arc::new(self.predicates),
            self.config.predicate_timeout,
        );
        for handler in self.handlers {
            executor.register(handler);
        }

        let mut sinks: Vec<Arc<dyn TraceSink>> = vec![Arc::new(TracingSink)];
        sinks.extend(self.sinks);

        Validator {
            executor,
            resolver: ActionResolver::new(Arc::clone(&catalog), self.config.precedence.clone()),
            catalog,
            review_queue: self
                .review_queue
                .unwrap_or_else(|| Arc::new(InMemoryReviewQueue::new())),
            sinks,
            config: self.config,
        }
    }
}
