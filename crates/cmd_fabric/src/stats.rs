use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// All counters use `Ordering::Relaxed`: they are purely statistical.
// No control flow depends on them being up to date, slightly stale reads
// are fine for observability, and they guard no other data - unlike the
// ring indices, which carry the happens-before edges. Relaxed keeps the
// dispatch hot path free of memory barriers.

/// Per-agent dispatch counters. Written only by the executor (host thread);
/// readable from the agent thread via [`Statistics::snapshot`].
#[derive(Debug, Default)]
pub struct AgentCounters {
    pub submitted: AtomicU64,
    pub executed: AtomicU64,
    pub failed: AtomicU64,
    pub rate_limited: AtomicU64,
    pub unhandled: AtomicU64,
}

/// Per-command-kind counters.
#[derive(Debug, Default)]
pub struct KindCounters {
    pub executed: AtomicU64,
    pub failed: AtomicU64,
}

/// Fabric-wide totals.
#[derive(Debug, Default)]
pub struct TotalCounters {
    pub submitted: AtomicU64,
    pub executed: AtomicU64,
    pub failed: AtomicU64,
    pub rate_limited: AtomicU64,
    pub unhandled: AtomicU64,
}

/// Shared statistics store for the fabric.
///
/// The maps are locked only when a previously unseen agent or kind shows up
/// (the executor keeps host-local `Arc` caches) and by `snapshot()`, so the
/// steady-state dispatch path touches no mutex here.
pub struct Statistics {
    totals: TotalCounters,
    agents: Mutex<HashMap<String, Arc<AgentCounters>>>,
    kinds: Mutex<HashMap<String, Arc<KindCounters>>>,
    audit_enabled: AtomicBool,
}

impl Statistics {
    pub fn new(audit_enabled: bool) -> Self {
        Self {
            totals: TotalCounters::default(),
            agents: Mutex::new(HashMap::new()),
            kinds: Mutex::new(HashMap::new()),
            audit_enabled: AtomicBool::new(audit_enabled),
        }
    }

    pub fn totals(&self) -> &TotalCounters {
        &self.totals
    }

    /// Get-or-create the counters for an agent.
    pub fn agent(&self, agent_id: &str) -> Arc<AgentCounters> {
        let mut agents = self
            .agents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(counters) = agents.get(agent_id) {
            return Arc::clone(counters);
        }
        let counters = Arc::new(AgentCounters::default());
        agents.insert(agent_id.to_string(), Arc::clone(&counters));
        counters
    }

    /// Get-or-create the counters for a command kind.
    pub fn kind(&self, kind: &str) -> Arc<KindCounters> {
        let mut kinds = self
            .kinds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(counters) = kinds.get(kind) {
            return Arc::clone(counters);
        }
        let counters = Arc::new(KindCounters::default());
        kinds.insert(kind.to_string(), Arc::clone(&counters));
        counters
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled.load(Ordering::Relaxed)
    }

    pub fn set_audit(&self, enabled: bool) {
        self.audit_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Deep copy of every counter for monitoring. Cold path; allocates.
    pub fn snapshot(&self) -> StatsSnapshot {
        let per_agent = {
            let agents = self
                .agents
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            agents
                .iter()
                .map(|(id, c)| {
                    (
                        id.clone(),
                        AgentSnapshot {
                            submitted: c.submitted.load(Ordering::Relaxed),
                            executed: c.executed.load(Ordering::Relaxed),
                            failed: c.failed.load(Ordering::Relaxed),
                            rate_limited: c.rate_limited.load(Ordering::Relaxed),
                            unhandled: c.unhandled.load(Ordering::Relaxed),
                        },
                    )
                })
                .collect()
        };

        let per_kind = {
            let kinds = self
                .kinds
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            kinds
                .iter()
                .map(|(kind, c)| {
                    (
                        kind.clone(),
                        KindSnapshot {
                            executed: c.executed.load(Ordering::Relaxed),
                            failed: c.failed.load(Ordering::Relaxed),
                        },
                    )
                })
                .collect()
        };

        StatsSnapshot {
            submitted: self.totals.submitted.load(Ordering::Relaxed),
            executed: self.totals.executed.load(Ordering::Relaxed),
            failed: self.totals.failed.load(Ordering::Relaxed),
            rate_limited: self.totals.rate_limited.load(Ordering::Relaxed),
            unhandled: self.totals.unhandled.load(Ordering::Relaxed),
            per_agent,
            per_kind,
            audit_enabled: self.audit_enabled(),
        }
    }
}

/// Point-in-time copy of one agent's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentSnapshot {
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub unhandled: u64,
}

/// Point-in-time copy of one command kind's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSnapshot {
    pub executed: u64,
    pub failed: u64,
}

/// Deep statistics copy returned by [`Statistics::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub unhandled: u64,
    pub per_agent: HashMap<String, AgentSnapshot>,
    pub per_kind: HashMap<String, KindSnapshot>,
    pub audit_enabled: bool,
}

impl StatsSnapshot {
    /// Counters for one agent, defaulting to zeros for unseen agents.
    pub fn agent(&self, agent_id: &str) -> AgentSnapshot {
        self.per_agent.get(agent_id).copied().unwrap_or_default()
    }

    /// Counters for one kind, defaulting to zeros for unseen kinds.
    pub fn kind(&self, kind: &str) -> KindSnapshot {
        self.per_kind.get(kind).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_counters_are_shared() {
        let stats = Statistics::new(false);

        let first = stats.agent("a1");
        first.submitted.fetch_add(3, Ordering::Relaxed);

        let second = stats.agent("a1");
        assert_eq!(second.submitted.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let stats = Statistics::new(false);
        stats.agent("a1").executed.fetch_add(2, Ordering::Relaxed);
        stats.kind("echo").executed.fetch_add(2, Ordering::Relaxed);
        stats.totals().executed.fetch_add(2, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.executed, 2);
        assert_eq!(snap.agent("a1").executed, 2);
        assert_eq!(snap.kind("echo").executed, 2);

        // Later mutation is invisible to the copy.
        stats.totals().executed.fetch_add(5, Ordering::Relaxed);
        assert_eq!(snap.executed, 2);
    }

    #[test]
    fn test_unseen_keys_read_as_zero() {
        let stats = Statistics::new(false);
        let snap = stats.snapshot();
        assert_eq!(snap.agent("nobody"), AgentSnapshot::default());
        assert_eq!(snap.kind("nothing"), KindSnapshot::default());
    }

    #[test]
    fn test_audit_flag() {
        let stats = Statistics::new(false);
        assert!(!stats.audit_enabled());
        stats.set_audit(true);
        assert!(stats.audit_enabled());
        assert!(stats.snapshot().audit_enabled);
    }
}
