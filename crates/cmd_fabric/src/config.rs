use crate::executor::{Executor, ExecutorHandle};
use crate::queue::{
    callback_queue, command_queue, CallbackConsumer, CommandProducer, DEFAULT_QUEUE_CAPACITY,
};
use crate::rate_limiter::RateLimitSettings;
use crate::registry::HandlerRegistry;
use crate::stats::Statistics;
use std::sync::Arc;

/// Configuration for one dispatch fabric instance.
///
/// How these values are loaded (file, CLI, hardcoded) is the host's
/// business; the fabric consumes plain fields.
#[derive(Debug, Clone)]
pub struct FabricConfig {
    /// Capacity of the agent → host command queue.
    pub command_queue_capacity: usize,
    /// Capacity of the host → agent callback queue.
    pub callback_queue_capacity: usize,
    /// Steady-state commands/second/agent; 0 disables rate limiting.
    pub rate_limit_per_agent: u32,
    /// Token-bucket burst size; defaults to the steady-state rate.
    pub rate_limit_burst: u32,
    /// Emit one structured audit event per dispatched command.
    pub audit_logging_enabled: bool,
    /// Apply registered schemas at the agent facade.
    pub validation_enabled: bool,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            callback_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rate_limit_per_agent: 100,
            rate_limit_burst: 100,
            audit_logging_enabled: false,
            validation_enabled: true,
        }
    }
}

impl FabricConfig {
    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }

    pub fn with_callback_queue_capacity(mut self, capacity: usize) -> Self {
        self.callback_queue_capacity = capacity;
        self
    }

    /// Sets the steady-state rate and matches the burst to it.
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limit_per_agent = per_second;
        self.rate_limit_burst = per_second;
        self
    }

    /// Overrides the burst size independently of the steady-state rate.
    pub fn with_rate_limit_burst(mut self, burst: u32) -> Self {
        self.rate_limit_burst = burst;
        self
    }

    pub fn with_audit_logging(mut self, enabled: bool) -> Self {
        self.audit_logging_enabled = enabled;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }
}

/// Everything the agent thread needs: the command-queue write half, the
/// callback-queue read half, and the executor control surface.
pub struct AgentEndpoint {
    pub commands: CommandProducer,
    pub callbacks: CallbackConsumer,
    pub handle: ExecutorHandle,
    /// Carried through for the facade layer.
    pub validation_enabled: bool,
}

/// Wires up a fabric: both queues plus the shared registry, statistics,
/// and rate-limit settings. The [`Executor`] moves to the host thread, the
/// [`AgentEndpoint`] to the agent thread.
///
/// # Panics
///
/// Panics if either queue capacity is 0 (ring construction requirement).
pub fn fabric(config: &FabricConfig) -> (Executor, AgentEndpoint) {
    let (command_tx, command_rx) = command_queue(config.command_queue_capacity);
    let (callback_tx, callback_rx) = callback_queue(config.callback_queue_capacity);

    let registry = Arc::new(HandlerRegistry::new());
    let stats = Arc::new(Statistics::new(config.audit_logging_enabled));
    let rate_settings = Arc::new(RateLimitSettings::new(
        config.rate_limit_burst,
        config.rate_limit_per_agent,
    ));

    let executor = Executor::new(command_rx, callback_tx, registry, stats, rate_settings);
    let handle = executor.handle();

    (
        executor,
        AgentEndpoint {
            commands: command_tx,
            callbacks: callback_rx,
            handle,
            validation_enabled: config.validation_enabled,
        },
    )
}
