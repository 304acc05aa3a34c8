//! Typed ring constructors for the fabric's two transports.
//!
//! Both directions use the same SPSC primitive: the command queue flows
//! agent → host, the callback queue host → agent. Capacities are
//! independent; both round up to a power of two.

use crate::command::Command;
use crate::envelope::CallbackEnvelope;

/// Agent-side write half of the command queue.
pub type CommandProducer = spscring::Producer<Command>;
/// Host-side read half of the command queue.
pub type CommandConsumer = spscring::Consumer<Command>;
/// Host-side write half of the callback queue.
pub type CallbackProducer = spscring::Producer<CallbackEnvelope>;
/// Agent-side read half of the callback queue.
pub type CallbackConsumer = spscring::Consumer<CallbackEnvelope>;

/// Default capacity for both queues before power-of-two rounding.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Creates the agent → host command transport.
pub fn command_queue(capacity: usize) -> (CommandProducer, CommandConsumer) {
    spscring::ring(capacity)
}

/// Creates the host → agent callback transport.
pub fn callback_queue(capacity: usize) -> (CallbackProducer, CallbackConsumer) {
    spscring::ring(capacity)
}
