use crate::runtime::DecodeError;
use crate::schema::ValidationError;
use thiserror::Error;

/// Errors returned synchronously from a bridge submit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The command queue is full; the submit left no side effect (any
    /// stored callback was revoked).
    #[error("command queue is full")]
    QueueFull,

    /// The script payload could not be converted.
    #[error("payload conversion failed: {0}")]
    Payload(#[from] DecodeError),
}

impl SubmitError {
    /// Returns `true` if retrying after the host drains may succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueFull)
    }
}

/// Errors returned synchronously from the agent facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    /// A submit argument failed basic validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The payload failed the schema registered for its command kind.
    #[error("schema validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Error resolving a [`CallbackPromise`](crate::CallbackPromise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// The stored callback was dropped before it could resolve.
    #[error("callback dropped before resolution")]
    Dropped,
}
