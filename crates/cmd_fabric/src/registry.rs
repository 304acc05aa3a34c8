use crate::envelope::HandlerResult;
use crate::value::Value;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A command handler. Runs synchronously on the host thread with a view of
/// the command payload; must not block indefinitely.
pub type Handler = Arc<dyn Fn(&Value) -> HandlerResult + Send + Sync>;

type HandlerMap = HashMap<String, Handler>;

/// Handler registry with copy-on-write snapshot publication.
///
/// Writers (the agent thread) serialize on a mutex, build a new map, and
/// publish it atomically. The dispatch loop loads one snapshot pointer at
/// the start of a pass and uses it throughout, so the host thread never
/// touches the mutex: a pass that began before a `register` call completes
/// sees the pre-replace handler for every command in that pass.
pub struct HandlerRegistry {
    snapshot: ArcSwap<HandlerMap>,
    writer: Mutex<()>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HandlerMap::new()),
            writer: Mutex::new(()),
        }
    }

    /// Registers `handler` for `kind`, replacing any prior registration.
    pub fn register(&self, kind: impl Into<String>, handler: Handler) {
        let kind = kind.into();
        let _guard = self.writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next: HandlerMap = (**self.snapshot.load()).clone();
        next.insert(kind, handler);
        self.snapshot.store(Arc::new(next));
    }

    /// Convenience wrapper accepting a plain closure.
    pub fn register_fn<F>(&self, kind: impl Into<String>, f: F)
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(f));
    }

    /// Removes the handler for `kind`. Returns false if none was registered.
    pub fn unregister(&self, kind: &str) -> bool {
        let _guard = self.writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !self.snapshot.load().contains_key(kind) {
            return false;
        }
        let mut next: HandlerMap = (**self.snapshot.load()).clone();
        next.remove(kind);
        self.snapshot.store(Arc::new(next));
        true
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.snapshot.load().contains_key(kind)
    }

    /// Currently registered command kinds, in no particular order.
    pub fn kinds(&self) -> Vec<String> {
        self.snapshot.load().keys().cloned().collect()
    }

    /// Captures the current snapshot for a full dispatch pass.
    pub(crate) fn load(&self) -> Arc<HandlerMap> {
        self.snapshot.load_full()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
