use crate::runtime::ScriptClosure;
use std::collections::HashMap;

/// Agent-side table tying callback ids to stored script closures.
///
/// Lives entirely on the agent thread (it is owned by the bridge, which is
/// not shared), so there is no locking here - same reasoning as keeping
/// single-writer counters plain instead of atomic.
///
/// An id is present iff its envelope has not been consumed or its command
/// is still in flight; delivery is one-shot via [`take`].
///
/// [`take`]: PendingCallbacks::take
pub struct PendingCallbacks<V> {
    next_id: u64,
    callbacks: HashMap<u64, ScriptClosure<V>>,
}

impl<V> PendingCallbacks<V> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            callbacks: HashMap::new(),
        }
    }

    /// Returns a fresh non-zero id. Monotonically increasing; the u64 wrap
    /// (which skips the 0 sentinel) is unreachable in any real process
    /// lifetime.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.next_id == 0 {
            self.next_id = 1;
        }
        id
    }

    /// Stores the closure for `id`, replacing any prior entry.
    pub fn store(&mut self, id: u64, closure: ScriptClosure<V>) {
        self.callbacks.insert(id, closure);
    }

    /// Removes and returns the closure for `id`. One-shot.
    pub fn take(&mut self, id: u64) -> Option<ScriptClosure<V>> {
        self.callbacks.remove(&id)
    }

    /// Drops the closure for `id` without invoking it (submit-failure path).
    pub fn revoke(&mut self, id: u64) {
        self.callbacks.remove(&id);
    }

    /// Removes every surviving entry for shutdown notification.
    pub fn drain_all(&mut self) -> Vec<(u64, ScriptClosure<V>)> {
        self.callbacks.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<V> Default for PendingCallbacks<V> {
    fn default() -> Self {
        Self::new()
    }
}
