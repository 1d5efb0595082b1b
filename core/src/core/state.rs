// statepipe/src/core/state.rs

//! The state record threaded through a pipeline, and the guard that decides
//! whether an arbitrary JSON value is an acceptable state.

use crate::error::ShapeError;
use serde_json::{Map, Value};

/// The plain key/value record every operation receives and produces.
pub type State = Map<String, Value>;

/// Returns `true` iff `value` is a plain record (a JSON object).
///
/// Null, arrays and scalars are rejected. Total: never panics.
pub fn is_state(value: &Value) -> bool {
  matches!(value, Value::Object(_))
}

/// Short, human-readable label for the JSON variant of `value`.
/// Used when reporting shape violations.
pub fn value_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Checked conversion from a pipeline input into a `State`.
pub fn ensure_state(value: Value) -> Result<State, ShapeError> {
  match value {
    Value::Object(map) => Ok(map),
    other => Err(ShapeError::InvalidInput {
      found: value_kind(&other),
    }),
  }
}
