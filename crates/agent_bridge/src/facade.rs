use crate::bridge::ScriptBridge;
use crate::error::{FacadeError, PromiseError};
use crate::runtime::{ScriptClosure, ScriptRuntime};
use crate::schema::Schema;
use cmd_fabric::{Value, MAX_KIND_LEN};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Thin agent-side wrapper over the bridge: argument validation, schema
/// checks with default filling, and a promise adapter for callers that
/// prefer awaiting to passing a closure.
pub struct AgentFacade<R: ScriptRuntime> {
    bridge: ScriptBridge<R>,
    schemas: HashMap<String, Schema>,
    validation_enabled: bool,
}

impl<R: ScriptRuntime> AgentFacade<R> {
    pub fn new(bridge: ScriptBridge<R>, validation_enabled: bool) -> Self {
        Self {
            bridge,
            schemas: HashMap::new(),
            validation_enabled,
        }
    }

    /// Registers a payload schema for a command kind, replacing any prior
    /// one.
    pub fn register_schema(&mut self, kind: impl Into<String>, schema: Schema) {
        self.schemas.insert(kind.into(), schema);
    }

    /// Removes the schema for `kind`; no-op if absent.
    pub fn unregister_schema(&mut self, kind: &str) {
        self.schemas.remove(kind);
    }

    pub fn set_validation_enabled(&mut self, enabled: bool) {
        self.validation_enabled = enabled;
    }

    /// Validates and submits one command.
    ///
    /// Checks arguments (non-empty kind within the length bound, non-empty
    /// agent id, mapping payload), applies any registered schema to a
    /// mutable copy of the payload, then hands off to the bridge. All
    /// failures are synchronous; nothing is enqueued on error.
    pub fn submit(
        &mut self,
        kind: &str,
        payload: &R::Value,
        agent_id: &str,
        callback: Option<ScriptClosure<R::Value>>,
    ) -> Result<u64, FacadeError> {
        if kind.is_empty() {
            return Err(FacadeError::InvalidArgument(
                "command kind must not be empty".to_string(),
            ));
        }
        if kind.len() > MAX_KIND_LEN {
            return Err(FacadeError::InvalidArgument(format!(
                "command kind exceeds {MAX_KIND_LEN} bytes"
            )));
        }
        if agent_id.is_empty() {
            return Err(FacadeError::InvalidArgument(
                "agent id must not be empty".to_string(),
            ));
        }

        let mut payload = self
            .bridge
            .runtime()
            .decode(payload)
            .map_err(crate::error::SubmitError::Payload)?;
        if !matches!(payload, Value::Map(_)) {
            return Err(FacadeError::InvalidArgument(
                "payload must be an object".to_string(),
            ));
        }

        if self.validation_enabled {
            if let Some(schema) = self.schemas.get(kind) {
                schema.validate(&mut payload)?;
            }
        }

        Ok(self.bridge.submit_erased(kind, payload, agent_id, callback)?)
    }

    /// Submits with an internally stored callback and returns a promise
    /// that resolves to the script-native outcome value.
    pub fn submit_with_promise(
        &mut self,
        kind: &str,
        payload: &R::Value,
        agent_id: &str,
    ) -> Result<CallbackPromise<R::Value>, FacadeError>
    where
        R::Value: 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let closure: ScriptClosure<R::Value> = Box::new(move |value| {
            // The receiver may already be gone; resolution is best-effort.
            let _ = sender.send(value);
        });
        self.submit(kind, payload, agent_id, Some(closure))?;
        Ok(CallbackPromise { receiver })
    }

    /// Drains up to `max` callback envelopes. See
    /// [`ScriptBridge::drain`].
    pub fn drain_callbacks(&mut self, max: usize) -> usize {
        self.bridge.drain(max)
    }

    /// Shuts the bridge down, notifying surviving callbacks.
    pub fn shutdown(&mut self) {
        self.bridge.shutdown();
    }

    pub fn bridge(&self) -> &ScriptBridge<R> {
        &self.bridge
    }
}

/// Future resolving to the script-native outcome of a submitted command.
///
/// Resolves when the agent drains the corresponding envelope (or when the
/// bridge shuts down, in which case the value carries the shutdown error).
/// Fails with [`PromiseError::Dropped`] only if the stored callback was
/// discarded without being invoked.
pub struct CallbackPromise<V> {
    receiver: oneshot::Receiver<V>,
}

impl<V> Future for CallbackPromise<V> {
    type Output = Result<V, PromiseError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| PromiseError::Dropped))
    }
}
