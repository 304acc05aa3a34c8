use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Shared rate-limit knobs, retunable from the agent thread while the host
/// thread reads them on every dispatch.
///
/// Plain `Relaxed` atomics: these are configuration values, not
/// synchronization points; a dispatch pass seeing a one-command-stale limit
/// is acceptable.
#[derive(Debug)]
pub struct RateLimitSettings {
    /// Bucket capacity (burst size) in tokens.
    capacity: AtomicU32,
    /// Steady-state refill rate, tokens per second.
    refill_per_sec: AtomicU32,
}

impl RateLimitSettings {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: AtomicU32::new(capacity),
            refill_per_sec: AtomicU32::new(refill_per_sec),
        }
    }

    /// Replaces both knobs. Either value being 0 disables the limiter.
    pub fn set(&self, capacity: u32, refill_per_sec: u32) {
        self.capacity.store(capacity, Ordering::Relaxed);
        self.refill_per_sec.store(refill_per_sec, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u32, u32) {
        (
            self.capacity.load(Ordering::Relaxed),
            self.refill_per_sec.load(Ordering::Relaxed),
        )
    }
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied,
}

#[derive(Debug)]
struct Bucket {
    /// Current token count; fractional accumulation is intentional.
    tokens: f64,
    /// Monotonic nanoseconds of the last refill.
    last_refill: u64,
    /// Lifetime denial count, drives the log-spam policy.
    denials: u64,
}

/// Per-agent token bucket, checked on the host side at dispatch time.
///
/// Owned exclusively by the executor; no synchronization. Buckets are
/// created lazily on an agent's first command and start full. When the
/// settings change, existing buckets clamp to the new capacity on their
/// next refill.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: HashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refills the agent's bucket to `now` and tries to consume one token.
    ///
    /// O(1) beyond the first sight of an agent. Denials are logged on the
    /// first occurrence and every 100th thereafter, per agent.
    pub fn try_consume(
        &mut self,
        agent_id: &str,
        now: u64,
        settings: &RateLimitSettings,
    ) -> RateDecision {
        let (capacity, refill_per_sec) = settings.get();
        if capacity == 0 || refill_per_sec == 0 {
            return RateDecision::Allowed;
        }

        if !self.buckets.contains_key(agent_id) {
            // First sight of this agent: the bucket starts full.
            self.buckets.insert(
                agent_id.to_string(),
                Bucket {
                    tokens: f64::from(capacity),
                    last_refill: now,
                    denials: 0,
                },
            );
        }
        let Some(bucket) = self.buckets.get_mut(agent_id) else {
            return RateDecision::Allowed;
        };

        let elapsed_secs = now.saturating_sub(bucket.last_refill) as f64 / 1e9;
        bucket.tokens =
            (bucket.tokens + elapsed_secs * f64::from(refill_per_sec)).min(f64::from(capacity));
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision::Allowed
        } else {
            bucket.denials += 1;
            if bucket.denials % 100 == 1 {
                warn!(
                    agent = agent_id,
                    denials = bucket.denials,
                    "agent exceeded its command rate limit"
                );
            }
            RateDecision::Denied
        }
    }

    /// Number of agents with a live bucket.
    pub fn tracked_agents(&self) -> usize {
        self.buckets.len()
    }
}
