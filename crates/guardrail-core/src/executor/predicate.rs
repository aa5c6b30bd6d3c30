//! External-predicate handler.
//!
//! Predicates are caller-supplied functions looked up by name. They are
//! untrusted: each call runs on its own worker thread and is abandoned once
//! its time budget is spent, so a hung predicate fails its rule instead of
//! hanging the checkpoint.
//!
//! An abandoned worker cannot be killed and keeps its thread until the
//! predicate returns. The handler caps the number of live workers; once the
//! cap is reached further predicate rules fail immediately with
//! `RuleError::PredicateOverloaded` instead of spawning more threads.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{param_string, param_u64, ConstraintHandler};
use crate::content::Content;
use crate::guardrail::Constraint;
use crate::types::{Params, RuleError, RuleKind, RuleResult};

/// A named, side-effect free check supplied by the embedding application.
///
/// Returns `Ok(())` when the content satisfies the predicate and
/// `Err(reason)` when it does not.
///
/// Implementations should return promptly. A call that outlives its rule's
/// timeout is abandoned, not cancelled: its thread stays alive until the call
/// returns and counts against the handler's worker cap meanwhile.
pub trait ExternalPredicate: Send + Sync {
    fn evaluate(&self, params: &Params, content: &Content) -> Result<(), String>;
}

impl<F> ExternalPredicate for F
where
    F: Fn(&Params, &Content) -> Result<(), String> + Send + Sync,
{
    fn evaluate(&self, params: &Params, content: &Content) -> Result<(), String> {
        self(params, content)
    }
}

/// Predicates available to `external_predicate` rules, by name.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: BTreeMap<String, Arc<dyn ExternalPredicate>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, predicate: impl ExternalPredicate + 'static) {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExternalPredicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Default cap on live predicate worker threads.
pub const DEFAULT_MAX_PREDICATE_WORKERS: usize = 64;

pub struct ExternalPredicateHandler {
    registry: Arc<PredicateRegistry>,
    default_timeout: Duration,
    max_workers: usize,
    live_workers: Arc<AtomicUsize>,
}

impl ExternalPredicateHandler {
    pub fn new(registry: Arc<PredicateRegistry>, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
            max_workers: DEFAULT_MAX_PREDICATE_WORKERS,
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cap the number of worker threads alive at once, abandoned ones included.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Worker threads currently running a predicate.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }
}

/// One unit of the live-worker count, released on drop.
struct WorkerSlot(Arc<AtomicUsize>);

impl WorkerSlot {
    fn acquire(counter: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        let previous = counter.fetch_add(1, Ordering::SeqCst);
        let slot = WorkerSlot(Arc::clone(counter));
        (previous < max).then_some(slot)
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConstraintHandler for ExternalPredicateHandler {
    fn kind(&self) -> RuleKind {
        RuleKind::ExternalPredicate
    }

    fn check(&self, rule: &Constraint, content: &Content) -> RuleResult {
        let name = match param_string(rule, "predicate") {
            Ok(name) => name,
            Err(error) => return RuleResult::errored(rule, error),
        };

        let Some(predicate) = self.registry.get(&name) else {
            return RuleResult::misconfigured(rule, format!("unknown predicate '{}'", name));
        };

        let timeout = match param_u64(rule, "timeout_ms") {
            Ok(Some(ms)) => Duration::from_millis(ms),
            Ok(None) => self.default_timeout,
            Err(error) => return RuleResult::errored(rule, error),
        };

        let Some(slot) = WorkerSlot::acquire(&self.live_workers, self.max_workers) else {
            tracing::warn!(
                rule_id = %rule.id,
                predicate = %name,
                limit = self.max_workers,
                "Predicate worker limit reached"
            );
            return RuleResult::errored(
                rule,
                RuleError::PredicateOverloaded {
                    predicate: name,
                    limit: self.max_workers,
                },
            );
        };

        let (tx, rx) = mpsc::channel();
        let params = rule.params.clone();
        let input = content.clone();
        let spawned = thread::Builder::new()
            .name(format!("predicate-{}", name))
            .spawn(move || {
                // Declared after `tx` so a panic releases the slot first.
                let tx = tx;
                let slot = slot;
                let outcome = predicate.evaluate(&params, &input);
                // Release before reporting so the caller sees the slot free.
                drop(slot);
                // The receiver is gone if the call already timed out.
                let _ = tx.send(outcome);
            });

        if let Err(error) = spawned {
            tracing::error!(rule_id = %rule.id, predicate = %name, error = %error, "Failed to start predicate worker");
            return RuleResult::errored(rule, RuleError::PredicateCrashed { predicate: name });
        }

        match rx.recv_timeout(timeout) {
            Ok(Ok(())) => RuleResult::pass(rule, format!("Predicate '{}' satisfied", name)),
            Ok(Err(reason)) => RuleResult::fail(
                rule,
                format!("Predicate '{}' rejected content: {}", name, reason),
                vec![],
            ),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(rule_id = %rule.id, predicate = %name, timeout = ?timeout, "Predicate timed out");
                RuleResult::errored(
                    rule,
                    RuleError::PredicateTimeout {
                        predicate: name,
                        timeout_ms: timeout.as_millis() as u64,
                    },
                )
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!(rule_id = %rule.id, predicate = %name, "Predicate panicked");
                RuleResult::errored(rule, RuleError::PredicateCrashed { predicate: name })
            }
        }
    }
}
