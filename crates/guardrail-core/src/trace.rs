//! Audit traces.
//!
//! Every validation call produces exactly one `AuditTrace`. The trace hashes
//! the original, pre-repair content so it can be verified independently
//! against whatever the upstream generator actually produced. Building a
//! trace cannot fail.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

use crate::content::Content;
use crate::guardrail::GuardRail;
use crate::types::{Mode, Remedy, RuleResult};

/// Immutable record of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrace {
    pub trace_id: Uuid,
    pub checkpoint_id: String,
    pub checkpoint_version: String,
    pub mode: Mode,

    /// SHA-256 hex digest of the original content
    pub input_hash: String,

    pub timestamp: DateTime<Utc>,

    /// Rules evaluated
    pub checked: usize,
    pub passed: usize,
    pub failed: usize,

    /// Disabled rules, not evaluated
    pub skipped: usize,

    pub failed_rule_ids: Vec<String>,

    /// Effective remedy; in AUDIT mode the remedy that would have applied
    pub remedy_applied: Option<Remedy>,

    /// False when the remedy was computed but not applied
    pub enforced: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<Uuid>,

    pub elapsed_ms: f64,
}

impl AuditTrace {
    /// Check the trace against a candidate original content value.
    pub fn verify_input(&self, content: &Content) -> bool {
        content_hash(content) == self.input_hash
    }
}

/// SHA-256 hex digest of a content value's canonical text.
pub fn content_hash(content: &Content) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.canonical_text().as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds the trace for one validation call.
pub struct AuditTraceBuilder<'a> {
    guardrail: &'a GuardRail,
    input_hash: String,
    review_id: Option<Uuid>,
}

impl<'a> AuditTraceBuilder<'a> {
    /// Start a trace. The hash is taken from `original` immediately.
    pub fn new(guardrail: &'a GuardRail, original: &Content) -> Self {
        Self {
            guardrail,
            input_hash: content_hash(original),
            review_id: None,
        }
    }

    /// Reuse a precomputed input hash.
    pub fn with_input_hash(guardrail: &'a GuardRail, input_hash: impl Into<String>) -> Self {
        Self {
            guardrail,
            input_hash: input_hash.into(),
            review_id: None,
        }
    }

    pub fn review_id(mut self, review_id: Option<Uuid>) -> Self {
        self.review_id = review_id;
        self
    }

    pub fn build(
        self,
        results: &[RuleResult],
        skipped: usize,
        remedy_applied: Option<Remedy>,
        elapsed: Duration,
    ) -> AuditTrace {
        let failed_rule_ids: Vec<String> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.rule_id.clone())
            .collect();

        AuditTrace {
            trace_id: Uuid::new_v4(),
            checkpoint_id: self.guardrail.checkpoint_id.clone(),
            checkpoint_version: self.guardrail.version.clone(),
            mode: self.guardrail.mode,
            input_hash: self.input_hash,
            timestamp: Utc::now(),
            checked: results.len(),
            passed: results.len() - failed_rule_ids.len(),
            failed: failed_rule_ids.len(),
            skipped,
            failed_rule_ids,
            remedy_applied,
            enforced: self.guardrail.mode == Mode::Enforce,
            review_id: self.review_id,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Receives every trace, e.g. a telemetry exporter or retention store.
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: &AuditTrace);
}

/// Emits each trace as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, trace: &AuditTrace) {
        tracing::info!(
            target: "guardrail::audit",
            trace_id = %trace.trace_id,
            checkpoint_id = %trace.checkpoint_id,
            checkpoint_version = %trace.checkpoint_version,
            input_hash = %trace.input_hash,
            checked = trace.checked,
            failed = trace.failed,
            remedy = ?trace.remedy_applied,
            enforced = trace.enforced,
            elapsed_ms = trace.elapsed_ms,
            "Validation trace"
        );
    }
}

/// Keeps traces in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    traces: Mutex<Vec<AuditTrace>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<AuditTrace> {
        self.traces.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.traces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.lock().is_empty()
    }
}

impl TraceSink for MemorySink {
    fn record(&self, trace: &AuditTrace) {
        self.traces.lock().push(trace.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::Constraint;
    use crate::types::{RuleKind, Severity};

    fn guardrail() -> GuardRail {
        GuardRail::builder("cp", "1.0.0").build().unwrap()
    }

    fn result(id: &str, passed: bool) -> RuleResult {
        let rule = Constraint::new(id, RuleKind::LengthBound, Severity::Error, Remedy::Log);
        if passed {
            RuleResult::pass(&rule, "ok")
        } else {
            RuleResult::fail(&rule, "bad", vec![])
        }
    }

    #[test]
    fn test_sha256_of_known_input() {
        assert_eq!(
            content_hash(&Content::text("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_counts_and_failed_ids() {
        let results = vec![result("a", true), result("b", false), result("c", false)];
        let trace = AuditTraceBuilder::new(&guardrail(), &Content::text("x")).build(
            &results,
            2,
            Some(Remedy::Log),
            Duration::from_millis(3),
        );

        assert_eq!(trace.checked, 3);
        assert_eq!(trace.passed, 1);
        assert_eq!(trace.failed, 2);
        assert_eq!(trace.skipped, 2);
        assert_eq!(trace.failed_rule_ids, vec!["b", "c"]);
        assert_eq!(trace.checkpoint_version, "1.0.0");
        assert!(trace.enforced);
        assert!((trace.elapsed_ms - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let g = guardrail();
        let a = AuditTraceBuilder::new(&g, &Content::text("x")).build(&[], 0, None, Duration::ZERO);
        let b = AuditTraceBuilder::new(&g, &Content::text("x")).build(&[], 0, None, Duration::ZERO);
        assert_ne!(a.trace_id, b.trace_id);
        assert_eq!(a.input_hash, b.input_hash);
    }

    #[test]
    fn test_verify_input() {
        let original = Content::text("SSN 529-81-3945");
        let trace =
            AuditTraceBuilder::new(&guardrail(), &original).build(&[], 0, None, Duration::ZERO);
        assert!(trace.verify_input(&original));
        assert!(!trace.verify_input(&Content::text("SSN [REDACTED-SSN]")));
    }

    #[test]
    fn test_serialized_field_set() {
        let trace = AuditTraceBuilder::new(&guardrail(), &Content::text("x")).build(
            &[],
            0,
            Some(Remedy::Fix),
            Duration::ZERO,
        );
        let json = serde_json::to_value(&trace).unwrap();
        for field in [
            "trace_id",
            "checkpoint_id",
            "checkpoint_version",
            "input_hash",
            "timestamp",
            "checked",
            "passed",
            "failed",
            "failed_rule_ids",
            "remedy_applied",
            "elapsed_ms",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["remedy_applied"], "FIX");
        assert!(json.get("review_id").is_none());
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        let trace = AuditTraceBuilder::new(&guardrail(), &Content::text("x")).build(
            &[],
            0,
            None,
            Duration::ZERO,
        );
        sink.record(&trace);
        TracingSink.record(&trace);
        assert_eq!(sink.traces(), vec![trace]);
    }
}
