use crate::error::SubmitError;
use crate::pending::PendingCallbacks;
use crate::runtime::{ScriptClosure, ScriptRuntime};
use cmd_fabric::{
    monotonic_nanos, CallbackConsumer, Command, CommandProducer, DropReason, Outcome, Value,
    ValueMap, NO_CALLBACK,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Anti-corruption boundary at the script/host seam.
///
/// Everything script-runtime-shaped stops here: payloads are deep-copied
/// into the erased tree on submit, callbacks are stored locally and
/// referenced by id, and outcomes are rendered back to script values on
/// drain. The fabric below never sees a script type.
///
/// The bridge is owned by the agent thread. Its only cross-thread edges are
/// the two ring handles.
pub struct ScriptBridge<R: ScriptRuntime> {
    runtime: R,
    commands: CommandProducer,
    callbacks: CallbackConsumer,
    pending: PendingCallbacks<R::Value>,
}

impl<R: ScriptRuntime> ScriptBridge<R> {
    pub fn new(runtime: R, commands: CommandProducer, callbacks: CallbackConsumer) -> Self {
        Self {
            runtime,
            commands,
            callbacks,
            pending: PendingCallbacks::new(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Number of callbacks awaiting delivery.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Converts a script payload and submits it as a command.
    ///
    /// Returns the allocated callback id ([`NO_CALLBACK`] when no callback
    /// was supplied). On a full queue the stored callback is revoked and
    /// [`SubmitError::QueueFull`] is returned - the submit leaves no side
    /// effect.
    pub fn submit(
        &mut self,
        kind: &str,
        payload: &R::Value,
        agent_id: &str,
        callback: Option<ScriptClosure<R::Value>>,
    ) -> Result<u64, SubmitError> {
        let payload = self.runtime.decode(payload)?;
        self.submit_erased(kind, payload, agent_id, callback)
    }

    /// Submits an already-erased payload (the facade path, after schema
    /// validation).
    pub fn submit_erased(
        &mut self,
        kind: &str,
        payload: Value,
        agent_id: &str,
        callback: Option<ScriptClosure<R::Value>>,
    ) -> Result<u64, SubmitError> {
        let callback_id = match callback {
            Some(closure) => {
                let id = self.pending.allocate_id();
                self.pending.store(id, closure);
                id
            }
            None => NO_CALLBACK,
        };

        let command = Command {
            kind: kind.to_string(),
            payload,
            agent_id: agent_id.to_string(),
            submitted_at: monotonic_nanos(),
            callback_id,
        };

        match self.commands.push(command) {
            Ok(()) => Ok(callback_id),
            Err(_rejected) => {
                if callback_id != NO_CALLBACK {
                    self.pending.revoke(callback_id);
                }
                debug!(kind, agent = agent_id, "command queue full, submit rejected");
                Err(SubmitError::QueueFull)
            }
        }
    }

    /// Drains up to `max` callback envelopes, delivering each to its stored
    /// closure. Returns the number of envelopes drained.
    ///
    /// The caller must already hold whatever locker scope the script
    /// runtime requires; closures run inline here, and a closure fault is
    /// logged and swallowed so one bad callback cannot stall the rest.
    pub fn drain(&mut self, max: usize) -> usize {
        let pending = &mut self.pending;
        let runtime = &self.runtime;

        self.callbacks.drain(max, |envelope| {
            let Some(closure) = pending.take(envelope.callback_id) else {
                // Expected after a hot reload replaced the script side.
                debug!(
                    callback_id = envelope.callback_id,
                    "envelope without a pending callback"
                );
                return;
            };

            let rendered = runtime.encode(&render_outcome(envelope.outcome));
            if catch_unwind(AssertUnwindSafe(move || closure(rendered))).is_err() {
                warn!(
                    callback_id = envelope.callback_id,
                    "callback closure panicked"
                );
            }
        })
    }

    /// Notifies every surviving pending callback that the fabric is going
    /// away, then clears the table.
    pub fn shutdown(&mut self) {
        let survivors = self.pending.drain_all();
        if survivors.is_empty() {
            return;
        }

        info!(
            survivors = survivors.len(),
            "bridge shutting down with callbacks pending"
        );
        let rendered = render_outcome(Outcome::Dropped(DropReason::Shutdown));
        for (callback_id, closure) in survivors {
            let value = self.runtime.encode(&rendered);
            if catch_unwind(AssertUnwindSafe(move || closure(value))).is_err() {
                warn!(callback_id, "callback closure panicked during shutdown");
            }
        }
    }
}

/// Renders a dispatch outcome as the script-facing mapping: success carries
/// the handler's data fields plus a truthy `success`; everything else is
/// `{success: false, error: <string>}`.
fn render_outcome(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Success(data) => {
            let mut map = data;
            map.insert("success".to_string(), Value::Bool(true));
            Value::Map(map)
        }
        Outcome::Error(message) => failure_map(message),
        Outcome::Dropped(reason) => failure_map(reason.as_message().to_string()),
    }
}

fn failure_map(error: String) -> Value {
    let mut map = ValueMap::new();
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("error".to_string(), Value::Str(error));
    Value::Map(map)
}
