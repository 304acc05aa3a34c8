use crate::value::Value;

/// Maximum length of a command kind identifier, in bytes.
pub const MAX_KIND_LEN: usize = 128;

/// The callback-id sentinel meaning "no callback requested".
pub const NO_CALLBACK: u64 = 0;

/// One unit of work submitted by an agent. Immutable once submitted.
///
/// `Command` is created at the script boundary, copied into the command
/// ring, consumed by the executor, and dropped. It carries only plain owned
/// data; in particular the callback is referenced by id, never by handle,
/// so nothing script-runtime-shaped ever crosses the ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command type identifier (UTF-8, non-empty, ≤ [`MAX_KIND_LEN`] bytes).
    pub kind: String,
    /// Type-erased payload; opaque to the executor, interpreted by handlers.
    pub payload: Value,
    /// Submitting agent, the rate-limit and audit key.
    pub agent_id: String,
    /// Monotonic nanoseconds at submit time (process-local epoch).
    pub submitted_at: u64,
    /// Callback id, or [`NO_CALLBACK`] when the agent wants no reply.
    pub callback_id: u64,
}

impl Command {
    /// True when the submitting agent expects a callback envelope.
    #[inline]
    pub fn wants_callback(&self) -> bool {
        self.callback_id != NO_CALLBACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_callback() {
        let mut cmd = Command {
            kind: "echo".to_string(),
            payload: Value::Null,
            agent_id: "a1".to_string(),
            submitted_at: 0,
            callback_id: NO_CALLBACK,
        };
        assert!(!cmd.wants_callback());

        cmd.callback_id = 7;
        assert!(cmd.wants_callback());
    }
}
