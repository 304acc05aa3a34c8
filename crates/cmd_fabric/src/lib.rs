//! Cross-runtime command dispatch fabric.
//!
//! Lets a scripting runtime (the agent side) submit dynamically-typed
//! commands to a native engine (the host side) and receive asynchronous
//! results, without blocking either side and without letting script-side
//! faults reach the host. The two sides talk through a pair of bounded
//! lock-free SPSC rings: commands flow agent → host, callback envelopes
//! flow host → agent.
//!
//! The core is a set of data structures driven by whoever calls them - it
//! spawns no threads. The host loop calls [`Executor::run_once`] each tick;
//! the agent side pushes commands and drains envelopes on its own schedule.
//!
//! # Example
//!
//! ```
//! use cmd_fabric::{fabric, monotonic_nanos, Command, FabricConfig, HandlerResult, Value};
//!
//! let (mut executor, endpoint) = fabric(&FabricConfig::default());
//!
//! endpoint.handle.register_fn("ping", |_payload| HandlerResult::ok());
//!
//! endpoint
//!     .commands
//!     .push(Command {
//!         kind: "ping".to_string(),
//!         payload: Value::Null,
//!         agent_id: "demo".to_string(),
//!         submitted_at: monotonic_nanos(),
//!         callback_id: 1,
//!     })
//!     .unwrap();
//!
//! assert_eq!(executor.run_once(monotonic_nanos(), 64), 1);
//!
//! let mut delivered = 0;
//! endpoint.callbacks.drain(64, |envelope| {
//!     assert_eq!(envelope.callback_id, 1);
//!     delivered += 1;
//! });
//! assert_eq!(delivered, 1);
//! ```

mod clock;
mod command;
mod config;
mod envelope;
mod executor;
mod queue;
mod rate_limiter;
mod registry;
mod stats;
mod value;

pub use clock::monotonic_nanos;
pub use command::{Command, MAX_KIND_LEN, NO_CALLBACK};
pub use config::{fabric, AgentEndpoint, FabricConfig};
pub use envelope::{CallbackEnvelope, DropReason, HandlerResult, Outcome};
pub use executor::{Executor, ExecutorHandle};
pub use queue::{
    callback_queue, command_queue, CallbackConsumer, CallbackProducer, CommandConsumer,
    CommandProducer, DEFAULT_QUEUE_CAPACITY,
};
pub use rate_limiter::{RateDecision, RateLimitSettings, RateLimiter};
pub use registry::{Handler, HandlerRegistry};
pub use stats::{
    AgentCounters, AgentSnapshot, KindCounters, KindSnapshot, StatsSnapshot, Statistics,
    TotalCounters,
};
pub use value::{Value, ValueMap};
