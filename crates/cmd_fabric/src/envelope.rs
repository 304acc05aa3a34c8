use crate::value::ValueMap;

/// Structured outcome of a command handler.
///
/// The variant is explicit; an empty error message is not a success
/// sentinel anywhere in the fabric.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// The handler completed and produced a result mapping.
    Success { data: ValueMap },
    /// The handler rejected or failed the command with a message.
    Error { message: String },
}

impl HandlerResult {
    /// Success with an empty result mapping.
    pub fn ok() -> Self {
        HandlerResult::Success {
            data: ValueMap::new(),
        }
    }

    pub fn success(data: ValueMap) -> Self {
        HandlerResult::Success { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        HandlerResult::Error {
            message: message.into(),
        }
    }
}

/// Why a command was dropped without its handler's result being observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No handler registered for the command kind.
    NoHandler,
    /// The agent's token bucket was empty at dispatch time.
    RateLimited,
    /// The handler panicked; the captured panic message is preserved.
    Panic(String),
    /// The bridge shut down with the callback still pending.
    Shutdown,
}

impl DropReason {
    /// Agent-visible error string for this drop.
    pub fn as_message(&self) -> &str {
        match self {
            DropReason::NoHandler => "no handler",
            DropReason::RateLimited => "rate limited",
            DropReason::Panic(message) => message,
            DropReason::Shutdown => "shutdown",
        }
    }
}

/// Final outcome routed back to the agent for one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Handler returned [`HandlerResult::Success`].
    Success(ValueMap),
    /// Handler returned [`HandlerResult::Error`].
    Error(String),
    /// The handler's result was never produced or observed.
    Dropped(DropReason),
}

impl Outcome {
    /// Short label for audit log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Error(_) => "error",
            Outcome::Dropped(DropReason::NoHandler) => "dropped:no_handler",
            Outcome::Dropped(DropReason::RateLimited) => "dropped:rate_limited",
            Outcome::Dropped(DropReason::Panic(_)) => "dropped:panic",
            Outcome::Dropped(DropReason::Shutdown) => "dropped:shutdown",
        }
    }

    /// The error text carried by non-success outcomes.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Error(message) => Some(message),
            Outcome::Dropped(reason) => Some(reason.as_message()),
        }
    }
}

/// The record carrying a handler's outcome back across the callback ring.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEnvelope {
    /// Matches the originating command's `callback_id`; never 0.
    pub callback_id: u64,
    pub outcome: Outcome,
}
