use cmd_fabric::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Leaf or container kind a schema field may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    /// Accepts both floats and ints (ints widen).
    Float,
    Str,
    Seq,
    Map,
    /// Any payload value, including null.
    Any,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::Bool => matches!(value, Value::Bool(_)),
            FieldKind::Int => matches!(value, Value::Int(_)),
            FieldKind::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            FieldKind::Str => matches!(value, Value::Str(_)),
            FieldKind::Seq => matches!(value, Value::Seq(_)),
            FieldKind::Map => matches!(value, Value::Map(_)),
            FieldKind::Any => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Str => "string",
            FieldKind::Seq => "sequence",
            FieldKind::Map => "mapping",
            FieldKind::Any => "any",
        }
    }
}

/// Schema validation failure. Synchronous; nothing is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload must be a mapping")]
    NotAMap,

    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
}

/// Declared shape of one payload field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    nested: Option<Schema>,
}

impl FieldSpec {
    /// A field that must be present (or carry a default).
    pub fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            required: true,
            default: None,
            nested: None,
        }
    }

    /// A field that may be absent.
    pub fn optional(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            nested: None,
        }
    }

    /// Fills this value in when the field is absent.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Validates a mapping field's entries against a nested schema.
    pub fn with_nested(mut self, nested: Schema) -> Self {
        self.nested = Some(nested);
        self
    }
}

/// Structural schema for one command kind's payload.
///
/// Validation checks required fields and leaf kinds, fills defaults into a
/// mutable payload, and recurses into declared nested mappings. Fields not
/// named by the schema pass through untouched.
///
/// # Example
///
/// ```
/// use agent_bridge::{FieldKind, FieldSpec, Schema};
/// use cmd_fabric::{Value, ValueMap};
///
/// let schema = Schema::new()
///     .field("name", FieldSpec::required(FieldKind::Str))
///     .field("count", FieldSpec::optional(FieldKind::Int).with_default(Value::Int(1)));
///
/// let mut payload = Value::Map(ValueMap::from([
///     ("name".to_string(), Value::from("probe")),
/// ]));
/// schema.validate(&mut payload).unwrap();
/// assert_eq!(payload.get("count"), Some(&Value::Int(1)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: HashMap<String, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Validates `payload` in place, filling declared defaults.
    pub fn validate(&self, payload: &mut Value) -> Result<(), ValidationError> {
        self.validate_at(payload, "")
    }

    fn validate_at(&self, payload: &mut Value, path: &str) -> Result<(), ValidationError> {
        let Value::Map(map) = payload else {
            return Err(ValidationError::NotAMap);
        };

        for (name, spec) in &self.fields {
            let field_path = join_path(path, name);

            if !map.contains_key(name) {
                if let Some(default) = &spec.default {
                    map.insert(name.clone(), default.clone());
                } else if spec.required {
                    return Err(ValidationError::MissingField { field: field_path });
                }
                continue;
            }

            if let Some(value) = map.get_mut(name) {
                if !spec.kind.matches(value) {
                    return Err(ValidationError::WrongType {
                        field: field_path,
                        expected: spec.kind.name(),
                    });
                }

                if let Some(nested) = &spec.nested {
                    nested.validate_at(value, &field_path)?;
                }
            }
        }

        Ok(())
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
