//! Script-boundary layer for the command dispatch fabric.
//!
//! Everything that knows about a script runtime lives in this crate: the
//! [`ScriptRuntime`] conversion trait, the [`PendingCallbacks`] table tying
//! callback ids to stored closures, the [`ScriptBridge`] that moves values
//! across the seam, and the [`AgentFacade`] offering validation, schemas,
//! and a promise adapter. The fabric core below never references a script
//! type - commands carry erased payloads and callback ids only.
//!
//! # Example
//!
//! ```
//! use agent_bridge::{AgentFacade, JsonRuntime, ScriptBridge};
//! use cmd_fabric::{fabric, monotonic_nanos, FabricConfig, HandlerResult};
//! use serde_json::json;
//!
//! let (mut executor, endpoint) = fabric(&FabricConfig::default());
//! endpoint.handle.register_fn("ping", |_payload| HandlerResult::ok());
//!
//! let bridge = ScriptBridge::new(JsonRuntime, endpoint.commands, endpoint.callbacks);
//! let mut facade = AgentFacade::new(bridge, endpoint.validation_enabled);
//!
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! // Submissions normally come from script code; the closure stands in
//! // for the script-side callback.
//! let replies = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&replies);
//! facade
//!     .submit("ping", &json!({}), "demo", Some(Box::new(move |reply| {
//!         sink.borrow_mut().push(reply);
//!     })))
//!     .unwrap();
//!
//! executor.run_once(monotonic_nanos(), 64);
//! facade.drain_callbacks(64);
//!
//! assert_eq!(*replies.borrow(), vec![json!({"success": true})]);
//! ```

mod bridge;
mod error;
mod facade;
mod pending;
mod runtime;
mod schema;

pub use bridge::ScriptBridge;
pub use error::{FacadeError, PromiseError, SubmitError};
pub use facade::{AgentFacade, CallbackPromise};
pub use pending::PendingCallbacks;
pub use runtime::{DecodeError, JsonRuntime, ScriptClosure, ScriptRuntime};
pub use schema::{FieldKind, FieldSpec, Schema, ValidationError};
