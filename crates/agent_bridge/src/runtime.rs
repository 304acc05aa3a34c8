use cmd_fabric::{Value, ValueMap};
use thiserror::Error;

/// A stored script-side callback, invoked at most once with the
/// script-native rendering of the command outcome.
///
/// In a real embedding the box captures the runtime handle and a persistent
/// function reference; nothing about it crosses threads.
pub type ScriptClosure<V> = Box<dyn FnOnce(V)>;

/// Error converting a script value into the erased payload tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The script value has a leaf kind the payload tree cannot carry.
    #[error("unsupported script value: {0}")]
    Unsupported(String),
    /// A script number does not fit the payload's integer range.
    #[error("integer out of range: {0}")]
    OutOfRange(String),
}

/// The minimal script-runtime surface the bridge consumes.
///
/// Conversions deep-copy: no script references survive in the erased tree,
/// and nothing below this trait ever names a script-runtime type. Both
/// methods are called on the agent thread only, inside whatever locker
/// scope the runtime requires.
pub trait ScriptRuntime {
    /// The runtime's native value type.
    type Value;

    /// Converts a script value tree into the erased payload. Deep copy.
    fn decode(&self, value: &Self::Value) -> Result<Value, DecodeError>;

    /// Converts an erased value into a script-native value. Deep copy.
    fn encode(&self, value: &Value) -> Self::Value;
}

/// Reference runtime over `serde_json::Value`.
///
/// JSON trees map losslessly onto the payload tree, which makes this the
/// runtime used by the test suite and a template for real embeddings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRuntime;

impl ScriptRuntime for JsonRuntime {
    type Value = serde_json::Value;

    fn decode(&self, value: &serde_json::Value) -> Result<Value, DecodeError> {
        Ok(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    if n.is_u64() {
                        // Large u64s have no i64 home; refuse rather than
                        // silently losing precision.
                        return Err(DecodeError::OutOfRange(n.to_string()));
                    }
                    Value::Float(f)
                } else {
                    return Err(DecodeError::Unsupported(n.to_string()));
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::Seq(
                items
                    .iter()
                    .map(|item| self.decode(item))
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(entries) => {
                let mut map = ValueMap::with_capacity(entries.len());
                for (key, entry) in entries {
                    map.insert(key.clone(), self.decode(entry)?);
                }
                Value::Map(map)
            }
        })
    }

    fn encode(&self, value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => {
                // Non-finite floats have no JSON rendering.
                serde_json::Number::from_f64(*f)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Seq(items) => {
                serde_json::Value::Array(items.iter().map(|item| self.encode(item)).collect())
            }
            Value::Map(map) => {
                let mut entries = serde_json::Map::with_capacity(map.len());
                for (key, entry) in map {
                    entries.insert(key.clone(), self.encode(entry));
                }
                serde_json::Value::Object(entries)
            }
        }
    }
}
