use crate::command::Command;
use crate::envelope::{CallbackEnvelope, DropReason, HandlerResult, Outcome};
use crate::queue::{CallbackProducer, CommandConsumer};
use crate::rate_limiter::{RateDecision, RateLimitSettings, RateLimiter};
use crate::registry::{Handler, HandlerRegistry};
use crate::stats::{AgentCounters, KindCounters, StatsSnapshot, Statistics};
use crate::value::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Audit log lines truncate handler error text to this many bytes.
const AUDIT_ERROR_MAX: usize = 120;

/// Host-side dispatch engine.
///
/// Owns the read half of the command queue and the write half of the
/// callback queue; driven by the host loop calling [`run_once`] each tick.
/// Everything the agent thread needs (registration, tuning, snapshots)
/// lives on the cloneable [`ExecutorHandle`].
///
/// [`run_once`]: Executor::run_once
pub struct Executor {
    commands: CommandConsumer,
    callbacks: CallbackProducer,
    registry: Arc<HandlerRegistry>,
    stats: Arc<Statistics>,
    rate_settings: Arc<RateLimitSettings>,
    limiter: RateLimiter,
    // Host-local counter caches: after an agent or kind has been seen once,
    // dispatch never touches the statistics mutex again.
    agent_cache: HashMap<String, Arc<AgentCounters>>,
    kind_cache: HashMap<String, Arc<KindCounters>>,
}

/// Agent-thread control surface for a running [`Executor`].
#[derive(Clone)]
pub struct ExecutorHandle {
    registry: Arc<HandlerRegistry>,
    stats: Arc<Statistics>,
    rate_settings: Arc<RateLimitSettings>,
}

impl ExecutorHandle {
    /// Registers `handler` for `kind`, atomically replacing any prior one.
    ///
    /// A dispatch pass already in progress keeps using the snapshot it
    /// captured at entry; the replacement applies from the next pass.
    pub fn register(&self, kind: impl Into<String>, handler: Handler) {
        self.registry.register(kind, handler);
    }

    /// Convenience wrapper accepting a plain closure.
    pub fn register_fn<F>(&self, kind: impl Into<String>, f: F)
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_fn(kind, f);
    }

    /// Removes the handler for `kind`; no-op if absent.
    pub fn unregister(&self, kind: &str) -> bool {
        self.registry.unregister(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.registry.contains(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.registry.kinds()
    }

    /// Retunes the per-agent token bucket. Either value 0 disables it.
    pub fn set_rate_limit(&self, capacity: u32, refill_per_sec: u32) {
        self.rate_settings.set(capacity, refill_per_sec);
    }

    /// Toggles per-command audit logging.
    pub fn set_audit(&self, enabled: bool) {
        self.stats.set_audit(enabled);
    }

    /// Deep statistics copy. Cold path.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Executor {
    pub(crate) fn new(
        commands: CommandConsumer,
        callbacks: CallbackProducer,
        registry: Arc<HandlerRegistry>,
        stats: Arc<Statistics>,
        rate_settings: Arc<RateLimitSettings>,
    ) -> Self {
        Self {
            commands,
            callbacks,
            registry,
            stats,
            rate_settings,
            limiter: RateLimiter::new(),
            agent_cache: HashMap::new(),
            kind_cache: HashMap::new(),
        }
    }

    /// A fresh control handle for the agent thread.
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            registry: Arc::clone(&self.registry),
            stats: Arc::clone(&self.stats),
            rate_settings: Arc::clone(&self.rate_settings),
        }
    }

    /// Drains and dispatches up to `budget` commands. Returns the number
    /// drained. Never blocks; an empty queue returns immediately.
    ///
    /// `now` is the host's monotonic clock in nanoseconds and is used for
    /// every rate-limit decision in the pass.
    pub fn run_once(&mut self, now: u64, budget: usize) -> usize {
        // One snapshot for the whole pass: registration changes made while
        // the pass runs become visible on the next call.
        let handlers = self.registry.load();

        let commands = &self.commands;
        let callbacks = &self.callbacks;
        let stats = &*self.stats;
        let rate_settings = &*self.rate_settings;
        let limiter = &mut self.limiter;
        let agent_cache = &mut self.agent_cache;
        let kind_cache = &mut self.kind_cache;
        let audit = stats.audit_enabled();

        commands.drain(budget, |cmd| {
            let agent = cached_agent(agent_cache, stats, &cmd.agent_id);
            agent.submitted.fetch_add(1, Ordering::Relaxed);
            stats.totals().submitted.fetch_add(1, Ordering::Relaxed);

            if audit {
                debug!(
                    target: "cmd_fabric::audit",
                    submitted_at = cmd.submitted_at,
                    agent = %cmd.agent_id,
                    kind = %cmd.kind,
                    callback_id = cmd.callback_id,
                    "received"
                );
            }

            let outcome = match handlers.get(&cmd.kind) {
                None => {
                    agent.unhandled.fetch_add(1, Ordering::Relaxed);
                    stats.totals().unhandled.fetch_add(1, Ordering::Relaxed);
                    debug!(agent = %cmd.agent_id, kind = %cmd.kind, "no handler registered");
                    Outcome::Dropped(DropReason::NoHandler)
                }
                Some(handler) => {
                    match limiter.try_consume(&cmd.agent_id, now, rate_settings) {
                        RateDecision::Denied => {
                            agent.rate_limited.fetch_add(1, Ordering::Relaxed);
                            stats.totals().rate_limited.fetch_add(1, Ordering::Relaxed);
                            Outcome::Dropped(DropReason::RateLimited)
                        }
                        RateDecision::Allowed => {
                            let kind = cached_kind(kind_cache, stats, &cmd.kind);
                            run_handler(handler.as_ref(), &cmd, agent.as_ref(), kind.as_ref(), stats)
                        }
                    }
                }
            };

            if audit {
                info!(
                    target: "cmd_fabric::audit",
                    submitted_at = cmd.submitted_at,
                    agent = %cmd.agent_id,
                    kind = %cmd.kind,
                    callback_id = cmd.callback_id,
                    outcome = outcome.label(),
                    error = outcome.error_text().map(truncated),
                    "dispatched"
                );
            }

            if cmd.wants_callback() {
                let envelope = CallbackEnvelope {
                    callback_id: cmd.callback_id,
                    outcome,
                };
                if callbacks.push(envelope).is_err() {
                    // The agent will never hear about this command; count it
                    // against the agent and move on - the slot is released
                    // either way.
                    warn!(
                        agent = %cmd.agent_id,
                        kind = %cmd.kind,
                        callback_id = cmd.callback_id,
                        "callback queue full, dropping envelope"
                    );
                    agent.failed.fetch_add(1, Ordering::Relaxed);
                    stats.totals().failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        })
    }

    /// Tears down the executor, emitting the summary log.
    pub fn shutdown(self) {
        let totals = self.stats.totals();
        info!(
            submitted = totals.submitted.load(Ordering::Relaxed),
            executed = totals.executed.load(Ordering::Relaxed),
            failed = totals.failed.load(Ordering::Relaxed),
            rate_limited = totals.rate_limited.load(Ordering::Relaxed),
            unhandled = totals.unhandled.load(Ordering::Relaxed),
            "executor shut down"
        );
    }
}

/// Runs one handler inside the fault-isolation boundary and interprets the
/// result. A panic is downgraded to `Dropped(Panic)`; an error result keeps
/// the handler's message. Both count as failures.
fn run_handler(
    handler: &(dyn Fn(&Value) -> HandlerResult + Send + Sync),
    cmd: &Command,
    agent: &AgentCounters,
    kind: &KindCounters,
    stats: &Statistics,
) -> Outcome {
    match catch_unwind(AssertUnwindSafe(|| handler(&cmd.payload))) {
        Ok(HandlerResult::Success { data }) => {
            agent.executed.fetch_add(1, Ordering::Relaxed);
            kind.executed.fetch_add(1, Ordering::Relaxed);
            stats.totals().executed.fetch_add(1, Ordering::Relaxed);
            Outcome::Success(data)
        }
        Ok(HandlerResult::Error { message }) => {
            agent.failed.fetch_add(1, Ordering::Relaxed);
            kind.failed.fetch_add(1, Ordering::Relaxed);
            stats.totals().failed.fetch_add(1, Ordering::Relaxed);
            Outcome::Error(message)
        }
        Err(panic_payload) => {
            let message = panic_message(panic_payload);
            warn!(
                agent = %cmd.agent_id,
                kind = %cmd.kind,
                panic = %message,
                "handler panicked"
            );
            agent.failed.fetch_add(1, Ordering::Relaxed);
            kind.failed.fetch_add(1, Ordering::Relaxed);
            stats.totals().failed.fetch_add(1, Ordering::Relaxed);
            Outcome::Dropped(DropReason::Panic(message))
        }
    }
}

fn cached_agent(
    cache: &mut HashMap<String, Arc<AgentCounters>>,
    stats: &Statistics,
    agent_id: &str,
) -> Arc<AgentCounters> {
    if let Some(counters) = cache.get(agent_id) {
        return Arc::clone(counters);
    }
    let counters = stats.agent(agent_id);
    cache.insert(agent_id.to_string(), Arc::clone(&counters));
    counters
}

fn cached_kind(
    cache: &mut HashMap<String, Arc<KindCounters>>,
    stats: &Statistics,
    kind: &str,
) -> Arc<KindCounters> {
    if let Some(counters) = cache.get(kind) {
        return Arc::clone(counters);
    }
    let counters = stats.kind(kind);
    cache.insert(kind.to_string(), Arc::clone(&counters));
    counters
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Truncates audit error text at a char boundary near [`AUDIT_ERROR_MAX`].
fn truncated(text: &str) -> &str {
    if text.len() <= AUDIT_ERROR_MAX {
        return text;
    }
    let mut end = AUDIT_ERROR_MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_respects_char_boundaries() {
        let short = "fine";
        assert_eq!(truncated(short), "fine");

        let long = "x".repeat(400);
        assert_eq!(truncated(&long).len(), AUDIT_ERROR_MAX);

        // Multi-byte characters straddling the cut are dropped whole.
        let accented = "é".repeat(100); // 2 bytes each
        let cut = truncated(&accented);
        assert!(cut.len() <= AUDIT_ERROR_MAX);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new("owned".to_string());
        assert_eq!(panic_message(boxed), "owned");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(boxed), "handler panicked");
    }
}
