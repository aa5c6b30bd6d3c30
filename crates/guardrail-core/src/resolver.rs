//! ActionResolver: turns failed rule results into a disposition.
//!
//! Resolution runs in three steps:
//! 1. Every failed result is routed to a remedy. FIX results that cannot be
//!    applied (required fields, predicates, length below the minimum, rules
//!    that errored) are routed to REJECT instead.
//! 2. All routed FIX results are applied together as one repair pass. The
//!    repaired content is then rescanned with the FIX rules' patterns and
//!    redacted again until nothing matches, since removing one match or
//!    truncating can expose another. If that does not settle, the FIX routes
//!    are rejected instead.
//! 3. The strictest routed remedy decides the disposition.
//!
//! In AUDIT mode steps 1 to 3 still run, so the trace can report the remedy
//! that would have applied, but the original content is always forwarded.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::content::Content;
use crate::executor::{param_string_list, scan_patterns, LengthBounds};
use crate::guardrail::{Constraint, GuardRail};
use crate::patterns::{PatternCatalog, SensitivePattern};
use crate::repair::{RedactionSpan, RepairPlan};
use crate::types::{Evidence, Mode, Remedy, RuleKind, RuleResult};
use crate::verdict::{BlockReason, Disposition};

/// Rescans allowed after the first repair pass before FIX gives up.
const MAX_REPAIR_PASSES: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remedy precedence must list each remedy exactly once, got {0:?}")]
pub struct PrecedenceError(pub Vec<Remedy>);

/// Remedy order, strictest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Remedy>", into = "Vec<Remedy>")]
pub struct RemedyPrecedence(Vec<Remedy>);

impl RemedyPrecedence {
    pub fn new(order: Vec<Remedy>) -> Result<Self, PrecedenceError> {
        let complete = order.len() == Remedy::ALL.len()
            && Remedy::ALL.iter().all(|remedy| order.contains(remedy));
        if !complete {
            return Err(PrecedenceError(order));
        }
        Ok(Self(order))
    }

    pub fn order(&self) -> &[Remedy] {
        &self.0
    }

    /// Position of a remedy; lower is stricter.
    pub fn rank(&self, remedy: Remedy) -> usize {
        self.0
            .iter()
            .position(|r| *r == remedy)
            .unwrap_or(self.0.len())
    }

    pub fn strictest(&self, remedies: impl IntoIterator<Item = Remedy>) -> Option<Remedy> {
        remedies.into_iter().min_by_key(|r| self.rank(*r))
    }
}

impl Default for RemedyPrecedence {
    /// REJECT > ESCALATE > RETRY > FIX > LOG
    fn default() -> Self {
        Self(vec![
            Remedy::Reject,
            Remedy::Escalate,
            Remedy::Retry,
            Remedy::Fix,
            Remedy::Log,
        ])
    }
}

impl TryFrom<Vec<Remedy>> for RemedyPrecedence {
    type Error = PrecedenceError;

    fn try_from(order: Vec<Remedy>) -> Result<Self, Self::Error> {
        Self::new(order)
    }
}

impl From<RemedyPrecedence> for Vec<Remedy> {
    fn from(precedence: RemedyPrecedence) -> Self {
        precedence.0
    }
}

/// Position in a regeneration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
    /// Regenerations already performed
    pub attempt: u32,
    pub budget: u32,
}

impl RetryContext {
    pub fn first(budget: u32) -> Self {
        Self { attempt: 0, budget }
    }

    pub fn next(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.budget
    }
}

/// Where one failed rule ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRoute {
    pub rule_id: String,
    pub configured: Remedy,
    pub routed: Remedy,
}

/// Outcome of resolving one verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Strictest routed remedy; `None` when nothing failed
    pub effective: Option<Remedy>,

    pub disposition: Disposition,

    /// Repaired content, only when FIX changed it and it was not suppressed
    pub repaired: Option<Content>,

    pub routes: Vec<RuleRoute>,

    /// Failed results routed to ESCALATE, for the review queue
    pub escalated: Vec<RuleResult>,
}

impl Resolution {
    pub fn review_id(&self) -> Option<Uuid> {
        self.disposition.review_id()
    }
}

pub struct ActionResolver {
    catalog: Arc<PatternCatalog>,
    precedence: RemedyPrecedence,
}

impl ActionResolver {
    pub fn new(catalog: Arc<PatternCatalog>, precedence: RemedyPrecedence) -> Self {
        Self {
            catalog,
            precedence,
        }
    }

    pub fn precedence(&self) -> &RemedyPrecedence {
        &self.precedence
    }

    /// Decide and apply the effective remedy.
    ///
    /// # Arguments
    ///
    /// * `guardrail` - The guardrail that produced `results`
    /// * `content` - The original content
    /// * `results` - One result per evaluated rule
    /// * `retry` - Position in the caller's regeneration loop
    pub fn resolve(
        &self,
        guardrail: &GuardRail,
        content: &Content,
        results: &[RuleResult],
        retry: RetryContext,
    ) -> Resolution {
        let failed: Vec<&RuleResult> = results.iter().filter(|r| !r.passed).collect();
        if failed.is_empty() {
            return Resolution {
                effective: None,
                disposition: Disposition::Forward {
                    content: content.clone(),
                },
                repaired: None,
                routes: vec![],
                escalated: vec![],
            };
        }

        let mut routes: Vec<RuleRoute> = failed
            .iter()
            .map(|result| self.route(guardrail, content, result))
            .collect();

        let repaired = self.repair(guardrail, content, &failed, &mut routes);

        let strictest = self.precedence.strictest(routes.iter().map(|r| r.routed));
        let mut effective = strictest;
        let routed_to = |remedy: Remedy| -> Vec<String> {
            routes
                .iter()
                .filter(|r| r.routed == remedy)
                .map(|r| r.rule_id.clone())
                .collect()
        };

        let mut escalated = Vec::new();
        let disposition = match strictest {
            Some(Remedy::Reject) => Disposition::Blocked {
                reason: BlockReason::Rejected {
                    rule_ids: routed_to(Remedy::Reject),
                },
            },
            Some(Remedy::Retry) if retry.exhausted() => {
                effective = Some(Remedy::Reject);
                Disposition::Blocked {
                    reason: BlockReason::RetryBudgetExhausted {
                        attempts: retry.attempt,
                        rule_ids: routed_to(Remedy::Retry),
                    },
                }
            }
            Some(Remedy::Retry) => Disposition::RetryRequested {
                guidance: build_guidance(&failed, &routes),
                attempt: retry.attempt,
                budget: retry.budget,
            },
            Some(Remedy::Escalate) => {
                escalated = failed
                    .iter()
                    .zip(&routes)
                    .filter(|(_, route)| route.routed == Remedy::Escalate)
                    .map(|(result, _)| (*result).clone())
                    .collect();
                Disposition::PendingReview {
                    review_id: Uuid::new_v4(),
                    content: repaired.clone().unwrap_or_else(|| content.clone()),
                }
            }
            Some(Remedy::Fix) | Some(Remedy::Log) | None => Disposition::Forward {
                content: repaired.clone().unwrap_or_else(|| content.clone()),
            },
        };

        if guardrail.mode == Mode::Audit {
            tracing::info!(
                checkpoint_id = %guardrail.checkpoint_id,
                remedy = ?effective,
                would_be = disposition.label(),
                "Audit mode: remedy not enforced"
            );
            return Resolution {
                effective,
                disposition: Disposition::Forward {
                    content: content.clone(),
                },
                repaired: None,
                routes,
                escalated: vec![],
            };
        }

        let repaired = match disposition {
            Disposition::Forward { .. } | Disposition::PendingReview { .. } => repaired,
            _ => None,
        };

        Resolution {
            effective,
            disposition,
            repaired,
            routes,
            escalated,
        }
    }

    fn route(&self, guardrail: &GuardRail, content: &Content, result: &RuleResult) -> RuleRoute {
        let routed = match result.remedy {
            Remedy::Fix if !self.fixable(guardrail.rule(&result.rule_id), content, result) => {
                tracing::warn!(
                    rule_id = %result.rule_id,
                    "FIX cannot be applied to this failure, rejecting"
                );
                Remedy::Reject
            }
            remedy => remedy,
        };

        RuleRoute {
            rule_id: result.rule_id.clone(),
            configured: result.remedy,
            routed,
        }
    }

    /// Whether a deterministic repair exists for a failed result.
    fn fixable(&self, rule: Option<&Constraint>, content: &Content, result: &RuleResult) -> bool {
        let Some(rule) = rule else {
            return false;
        };
        if result.error.is_some() {
            return false;
        }

        match rule.kind {
            RuleKind::PatternMatch => {
                !result.evidence.is_empty()
                    && result
                        .evidence
                        .iter()
                        .all(|e| self.catalog.contains(&e.pattern))
            }
            RuleKind::LengthBound => match (LengthBounds::from_rule(rule), content) {
                (Ok(LengthBounds { max: Some(max), .. }), Content::Text(_)) => {
                    content.char_len() > max
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Apply every FIX route, then redact until the FIX patterns find
    /// nothing. Reroutes FIX to REJECT when the content does not settle.
    fn repair(
        &self,
        guardrail: &GuardRail,
        content: &Content,
        failed: &[&RuleResult],
        routes: &mut [RuleRoute],
    ) -> Option<Content> {
        let plan = self.repair_plan(guardrail, failed, routes);
        if plan.is_empty() {
            return None;
        }

        let patterns = self.fix_patterns(guardrail);
        let mut repaired = plan.apply(content);
        let mut passes = 0;

        loop {
            let evidence = scan_patterns(&patterns, &repaired);
            if evidence.is_empty() {
                break;
            }
            if passes == MAX_REPAIR_PASSES {
                tracing::warn!(
                    checkpoint_id = %guardrail.checkpoint_id,
                    passes,
                    "Repair did not settle, rejecting"
                );
                for route in routes.iter_mut().filter(|r| r.routed == Remedy::Fix) {
                    route.routed = Remedy::Reject;
                }
                return None;
            }

            passes += 1;
            tracing::debug!(
                checkpoint_id = %guardrail.checkpoint_id,
                pass = passes,
                matches = evidence.len(),
                "Redacting matches exposed by repair"
            );
            let next = RepairPlan {
                redactions: evidence.iter().filter_map(|e| self.span(e)).collect(),
                truncate_to: plan.truncate_to,
            };
            repaired = next.apply(&repaired);
        }

        Some(repaired).filter(|r| r != content)
    }

    /// Patterns of every enabled FIX pattern rule, without duplicates.
    ///
    /// Rules that passed on the original content are included: the repair
    /// itself can create a match for them.
    fn fix_patterns(&self, guardrail: &GuardRail) -> Vec<&SensitivePattern> {
        let mut patterns: Vec<&SensitivePattern> = Vec::new();

        let rules = guardrail
            .enabled_rules()
            .filter(|rule| rule.kind == RuleKind::PatternMatch && rule.remedy == Remedy::Fix);

        for rule in rules {
            for name in param_string_list(rule, "patterns").unwrap_or_default() {
                if let Ok(pattern) = self.catalog.get(&name) {
                    if !patterns.iter().any(|p| p.name() == pattern.name()) {
                        patterns.push(pattern);
                    }
                }
            }
        }

        patterns
    }

    fn span(&self, evidence: &Evidence) -> Option<RedactionSpan> {
        let pattern = self.catalog.get(&evidence.pattern).ok()?;
        Some(RedactionSpan {
            path: evidence.path.clone(),
            start: evidence.start,
            end: evidence.end,
            token: pattern.replacement().to_string(),
        })
    }

    fn repair_plan(
        &self,
        guardrail: &GuardRail,
        failed: &[&RuleResult],
        routes: &[RuleRoute],
    ) -> RepairPlan {
        let mut plan = RepairPlan::default();

        for (result, _) in failed
            .iter()
            .zip(routes)
            .filter(|(_, route)| route.routed == Remedy::Fix)
        {
            let Some(rule) = guardrail.rule(&result.rule_id) else {
                continue;
            };

            match rule.kind {
                RuleKind::PatternMatch => {
                    plan.redactions
                        .extend(result.evidence.iter().filter_map(|e| self.span(e)));
                }
                RuleKind::LengthBound => {
                    if let Ok(LengthBounds { max: Some(max), .. }) = LengthBounds::from_rule(rule) {
                        plan.truncate_to = Some(plan.truncate_to.map_or(max, |m| m.min(max)));
                    }
                }
                _ => {}
            }
        }

        plan
    }
}

/// Regeneration guidance listing every failure routed to RETRY.
fn build_guidance(failed: &[&RuleResult], routes: &[RuleRoute]) -> String {
    let issues: Vec<String> = failed
        .iter()
        .zip(routes)
        .filter(|(_, route)| route.routed == Remedy::Retry)
        .map(|(result, _)| format!("- [{}] {}", result.rule_id, result.message))
        .collect();

    format!(
        "Regenerate the content, resolving the following issues:\n{}",
        issues.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ConstraintExecutor, PredicateRegistry};
    use crate::types::Severity;
    use serde_json::json;
    use std::time::Duration;

    fn catalog() -> Arc<PatternCatalog> {
        Arc::new(PatternCatalog::builtin())
    }

    fn resolver() -> ActionResolver {
        ActionResolver::new(catalog(), RemedyPrecedence::default())
    }

    fn evaluate(guardrail: &GuardRail, content: &Content) -> Vec<RuleResult> {
        let executor = ConstraintExecutor::with_defaults(
            catalog(),
            Arc::new(PredicateRegistry::new()),
            Duration::from_millis(100),
        );
        guardrail
            .enabled_rules()
            .map(|rule| executor.execute(rule, content))
            .collect()
    }

    fn resolve(guardrail: &GuardRail, content: &Content) -> Resolution {
        let results = evaluate(guardrail, content);
        resolver().resolve(guardrail, content, &results, RetryContext::first(2))
    }

    fn pii(remedy: Remedy) -> Constraint {
        Constraint::new("pii", RuleKind::PatternMatch, Severity::Error, remedy)
            .param("patterns", json!(["ssn", "email"]))
    }

    fn max_len(id: &str, max: u64, severity: Severity, remedy: Remedy) -> Constraint {
        Constraint::new(id, RuleKind::LengthBound, severity, remedy).param("max_length", max)
    }

    fn guardrail(rules: Vec<Constraint>) -> GuardRail {
        rules
            .into_iter()
            .fold(GuardRail::builder("cp", "1.0.0"), |b, r| b.rule(r))
            .build()
            .unwrap()
    }

    #[test]
    fn test_precedence_validation() {
        assert!(RemedyPrecedence::new(vec![Remedy::Reject]).is_err());
        assert!(RemedyPrecedence::new(vec![
            Remedy::Reject,
            Remedy::Reject,
            Remedy::Retry,
            Remedy::Fix,
            Remedy::Log
        ])
        .is_err());

        let custom = RemedyPrecedence::new(vec![
            Remedy::Escalate,
            Remedy::Reject,
            Remedy::Retry,
            Remedy::Fix,
            Remedy::Log,
        ])
        .unwrap();
        assert_eq!(custom.strictest([Remedy::Reject, Remedy::Escalate]), Some(Remedy::Escalate));
        assert_eq!(custom.strictest(Vec::new()), None);
    }

    #[test]
    fn test_retry_context() {
        let ctx = RetryContext::first(2);
        assert!(!ctx.exhausted());
        assert!(!ctx.next().exhausted());
        assert!(ctx.next().next().exhausted());
        assert!(RetryContext::first(0).exhausted());
    }

    #[test]
    fn test_nothing_failed_forwards_original() {
        let g = guardrail(vec![pii(Remedy::Fix)]);
        let content = Content::text("clean");
        let resolution = resolve(&g, &content);

        assert_eq!(resolution.effective, None);
        assert_eq!(resolution.disposition, Disposition::Forward { content });
        assert!(resolution.repaired.is_none());
    }

    #[test]
    fn test_fix_redacts_all_spans() {
        let g = guardrail(vec![pii(Remedy::Fix)]);
        let content = Content::text("SSN 529-81-3945, mail a@b.io or 123-45-6789");
        let resolution = resolve(&g, &content);

        let expected =
            Content::text("SSN [REDACTED-SSN], mail [REDACTED-EMAIL] or [REDACTED-SSN]");
        assert_eq!(resolution.effective, Some(Remedy::Fix));
        assert_eq!(resolution.repaired, Some(expected.clone()));
        assert_eq!(resolution.disposition, Disposition::Forward { content: expected });
    }

    #[test]
    fn test_fix_merges_across_rules() {
        let g = guardrail(vec![
            Constraint::new("email", RuleKind::PatternMatch, Severity::Error, Remedy::Fix)
                .param("patterns", json!(["email"])),
            Constraint::new("ssn", RuleKind::PatternMatch, Severity::Warning, Remedy::Fix)
                .param("patterns", json!(["ssn"])),
        ]);
        let content = Content::text("x@y.com / 529-81-3945");
        let resolution = resolve(&g, &content);
        assert_eq!(
            resolution.repaired,
            Some(Content::text("[REDACTED-EMAIL] / [REDACTED-SSN]"))
        );
    }

    #[test]
    fn test_fix_is_idempotent() {
        let g = guardrail(vec![pii(Remedy::Fix), max_len("len", 30, Severity::Error, Remedy::Fix)]);
        let content = Content::text("SSN 529-81-3945 and a lot of trailing words");
        let first = resolve(&g, &content).repaired.unwrap();
        let second = resolve(&g, &first);

        assert_eq!(second.effective, None);
        assert!(second.repaired.is_none());
        assert_eq!(second.disposition, Disposition::Forward { content: first });
    }

    #[test]
    fn test_redaction_exposing_a_match_is_redacted_again() {
        let g = guardrail(vec![pii(Remedy::Fix)]);
        // The SSN only gains a word boundary once the email becomes a token.
        let first = resolve(&g, &Content::text("a@b.io529-81-3945"));
        let repaired = first.repaired.unwrap();
        assert_eq!(repaired, Content::text("[REDACTED-EMAIL][REDACTED-SSN]"));

        let second = resolve(&g, &repaired);
        assert_eq!(second.effective, None);
        assert!(second.repaired.is_none());
    }

    #[test]
    fn test_truncation_exposing_a_match_is_redacted() {
        let g = guardrail(vec![pii(Remedy::Fix), max_len("len", 14, Severity::Error, Remedy::Fix)]);
        let first = resolve(&g, &Content::text("ID 123-45-67890"));
        let repaired = first.repaired.unwrap();
        assert_eq!(repaired, Content::text("ID [REDACTED-S"));

        let second = resolve(&g, &repaired);
        assert_eq!(second.effective, None);
        assert!(second.repaired.is_none());
    }

    #[test]
    fn test_unsettled_repair_is_rejected() {
        let mut catalog = PatternCatalog::empty();
        catalog.register("a", r"\[B\]", "[A]").unwrap();
        catalog.register("b", r"\[A\]", "[B]").unwrap();
        let catalog = Arc::new(catalog);

        let g = guardrail(vec![Constraint::new(
            "swap",
            RuleKind::PatternMatch,
            Severity::Error,
            Remedy::Fix,
        )
        .param("patterns", json!(["a", "b"]))]);
        let content = Content::text("[A]");
        let executor = ConstraintExecutor::with_defaults(
            Arc::clone(&catalog),
            Arc::new(PredicateRegistry::new()),
            Duration::from_millis(100),
        );
        let results: Vec<RuleResult> = g
            .enabled_rules()
            .map(|rule| executor.execute(rule, &content))
            .collect();

        let resolution = ActionResolver::new(catalog, RemedyPrecedence::default()).resolve(
            &g,
            &content,
            &results,
            RetryContext::first(2),
        );
        assert_eq!(resolution.effective, Some(Remedy::Reject));
        assert_eq!(resolution.routes[0].routed, Remedy::Reject);
        assert!(resolution.repaired.is_none());
        assert!(matches!(resolution.disposition, Disposition::Blocked { .. }));
    }

    #[test]
    fn test_length_fix_truncates_to_smallest_max() {
        let g = guardrail(vec![
            max_len("a", 8, Severity::Error, Remedy::Fix),
            max_len("b", 5, Severity::Warning, Remedy::Fix),
        ]);
        let resolution = resolve(&g, &Content::text("0123456789"));
        assert_eq!(resolution.repaired, Some(Content::text("01234")));
    }

    #[test]
    fn test_unfixable_fix_is_rejected() {
        let g = guardrail(vec![Constraint::new(
            "fields",
            RuleKind::RequiredFields,
            Severity::Error,
            Remedy::Fix,
        )
        .param("fields", json!(["decision"]))]);
        let resolution = resolve(&g, &Content::text("{}"));

        assert_eq!(resolution.effective, Some(Remedy::Reject));
        assert_eq!(resolution.routes[0].configured, Remedy::Fix);
        assert_eq!(resolution.routes[0].routed, Remedy::Reject);
        assert!(matches!(resolution.disposition, Disposition::Blocked { .. }));
        assert!(resolution.repaired.is_none());
    }

    #[test]
    fn test_below_min_length_fix_is_rejected() {
        let g = guardrail(vec![Constraint::new(
            "len",
            RuleKind::LengthBound,
            Severity::Error,
            Remedy::Fix,
        )
        .param("min_length", 10)]);
        let resolution = resolve(&g, &Content::text("short"));
        assert_eq!(resolution.effective, Some(Remedy::Reject));
    }

    #[test]
    fn test_reject_suppresses_repair() {
        let g = guardrail(vec![
            pii(Remedy::Fix),
            max_len("len", 5, Severity::Error, Remedy::Reject),
        ]);
        let resolution = resolve(&g, &Content::text("SSN 529-81-3945"));

        assert_eq!(resolution.effective, Some(Remedy::Reject));
        assert!(resolution.repaired.is_none());
        assert_eq!(
            resolution.disposition,
            Disposition::Blocked {
                reason: BlockReason::Rejected {
                    rule_ids: vec!["len".to_string()]
                }
            }
        );
    }

    #[test]
    fn test_retry_until_budget_exhausted() {
        let g = guardrail(vec![max_len("len", 3, Severity::Warning, Remedy::Retry)]);
        let content = Content::text("too long");
        let results = evaluate(&g, &content);

        let first = resolver().resolve(&g, &content, &results, RetryContext::first(1));
        assert_eq!(first.effective, Some(Remedy::Retry));
        match &first.disposition {
            Disposition::RetryRequested {
                guidance,
                attempt,
                budget,
            } => {
                assert!(guidance.contains("[len] Content length 8 exceeds max_length 3"));
                assert_eq!((*attempt, *budget), (0, 1));
            }
            other => panic!("expected retry, got {:?}", other),
        }

        let last = resolver().resolve(&g, &content, &results, RetryContext::first(1).next());
        assert_eq!(last.effective, Some(Remedy::Reject));
        assert!(matches!(
            last.disposition,
            Disposition::Blocked {
                reason: BlockReason::RetryBudgetExhausted { attempts: 1, .. }
            }
        ));
    }

    #[test]
    fn test_escalate_carries_repaired_content() {
        let g = guardrail(vec![
            pii(Remedy::Fix),
            max_len("len", 5, Severity::Info, Remedy::Escalate),
        ]);
        let resolution = resolve(&g, &Content::text("SSN 529-81-3945"));

        assert_eq!(resolution.effective, Some(Remedy::Escalate));
        assert_eq!(resolution.escalated.len(), 1);
        assert_eq!(resolution.escalated[0].rule_id, "len");
        match &resolution.disposition {
            Disposition::PendingReview { content, .. } => {
                assert_eq!(content, &Content::text("SSN [REDACTED-SSN]"));
            }
            other => panic!("expected review, got {:?}", other),
        }
        assert!(resolution.review_id().is_some());
    }

    #[test]
    fn test_audit_mode_forwards_original() {
        let g = GuardRail::builder("cp", "1.0.0")
            .mode(Mode::Audit)
            .rule(pii(Remedy::Reject))
            .build()
            .unwrap();
        let content = Content::text("SSN 529-81-3945");
        let resolution = resolve(&g, &content);

        assert_eq!(resolution.effective, Some(Remedy::Reject));
        assert_eq!(resolution.disposition, Disposition::Forward { content });
        assert!(resolution.repaired.is_none());
        assert!(resolution.escalated.is_empty());
    }

    #[test]
    fn test_structured_fix_redacts_leaves() {
        let g = guardrail(vec![pii(Remedy::Fix)]);
        let content = Content::from_value(json!({
            "summary": "ok",
            "contact": {"email": "jane@corp.example"}
        }));
        let resolution = resolve(&g, &content);
        assert_eq!(
            resolution.repaired,
            Some(Content::from_value(json!({
                "summary": "ok",
                "contact": {"email": "[REDACTED-EMAIL]"}
            })))
        );
    }
}
