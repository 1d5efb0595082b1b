// statepipe/src/error.rs

//! Error types. `PipelineError` is the single normalized error every failed
//! operation is turned into before it reaches a recovery handler;
//! `ShapeError` covers values that are not valid states (never recoverable);
//! `FlowError` is what `Pipeline::run` returns.

use crate::core::operation::OperationKind;
use crate::core::state::State;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// Value of `PipelineError::op` when no operation tag applies.
pub const UNDEFINED_OP: &str = "UNDEFINED";

/// Separates an error's own line from its cause's trace in `PipelineError::trace`.
pub const CAUSE_MARKER: &str = "--- caused by ---";

struct Cause {
  name: &'static str,
  error: anyhow::Error,
}

/// Normalized failure of a pipeline operation.
///
/// Carries the tag of the operation that failed (`op`), the field it
/// targeted (`id`), the original failure (`cause`) and, for recovery
/// handlers, a snapshot of the state at failure. The snapshot is readable
/// through `state()` but is never part of `Debug`, `to_json()` or the
/// `Serialize` output.
pub struct PipelineError {
  message: String,
  op: String,
  id: Option<String>,
  cause: Option<Cause>,
  state: Option<State>,
}

impl PipelineError {
  pub const NAME: &'static str = "PipelineError";

  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      op: UNDEFINED_OP.to_string(),
      id: None,
      cause: None,
      state: None,
    }
  }

  /// Wraps an arbitrary failure. The message is the failure's display text
  /// and the failure itself becomes the cause.
  pub fn from_error(err: impl Into<anyhow::Error>) -> Self {
    let err = err.into();
    Self::new(err.to_string()).with_cause(err)
  }

  /// Tags the error with an operation. The tag is stringified immediately.
  pub fn with_op(mut self, op: impl fmt::Display) -> Self {
    self.op = op.to_string();
    self
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_state(mut self, state: State) -> Self {
    self.state = Some(state);
    self
  }

  pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
    let error = cause.into();
    self.cause = Some(Cause {
      name: error_name(&error),
      error,
    });
    self
  }

  pub fn name(&self) -> &'static str {
    Self::NAME
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn op(&self) -> &str {
    &self.op
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  pub fn cause(&self) -> Option<&anyhow::Error> {
    self.cause.as_ref().map(|c| &c.error)
  }

  pub fn cause_name(&self) -> Option<&'static str> {
    self.cause.as_ref().map(|c| c.name)
  }

  pub fn state(&self) -> Option<&State> {
    self.state.as_ref()
  }

  pub fn take_state(&mut self) -> Option<State> {
    self.state.take()
  }

  /// Human-readable trace: this error's own line, then (if there is a
  /// cause) `CAUSE_MARKER` followed by the cause's full debug rendering,
  /// including its own chain and any captured backtrace.
  pub fn trace(&self) -> String {
    let mut out = format!("{}: {} [op: {}", Self::NAME, self.message, self.op);
    if let Some(id) = &self.id {
      out.push_str(", id: ");
      out.push_str(id);
    }
    out.push(']');
    if let Some(cause) = &self.cause {
      out.push('\n');
      out.push_str(CAUSE_MARKER);
      out.push('\n');
      out.push_str(&format!("{:?}", cause.error));
    }
    out
  }

  /// Structured view for logging: `{ name, message, op, id?, cause? }`.
  /// `cause` is reduced to `{ name, message }`. The state is never included.
  pub fn to_json(&self) -> Value {
    let mut view = Map::new();
    view.insert("name".into(), Value::from(Self::NAME));
    view.insert("message".into(), Value::from(self.message.as_str()));
    view.insert("op".into(), Value::from(self.op.as_str()));
    if let Some(id) = &self.id {
      view.insert("id".into(), Value::from(id.as_str()));
    }
    if let Some(cause) = &self.cause {
      view.insert(
        "cause".into(),
        json!({ "name": cause.name, "message": cause.error.to_string() }),
      );
    }
    Value::Object(view)
  }

  pub(crate) fn has_state(&self) -> bool {
    self.state.is_some()
  }
}

impl fmt::Display for PipelineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

impl fmt::Debug for PipelineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PipelineError")
      .field("message", &self.message)
      .field("op", &self.op)
      .field("id", &self.id)
      .field("cause", &self.cause.as_ref().map(|c| &c.error))
      .field("has_state", &self.state.is_some())
      .finish()
  }
}

impl std::error::Error for PipelineError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    self
      .cause
      .as_ref()
      .map(|c| &*c.error as &(dyn std::error::Error + 'static))
  }
}

impl Serialize for PipelineError {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_json().serialize(serializer)
  }
}

/// A value that cannot act as a pipeline state where one is required.
/// Always fatal to the current `run`; never passed to a recovery handler.
#[derive(Debug, Error)]
pub enum ShapeError {
  #[error("Pipeline input must be a plain object, got {found}")]
  InvalidInput { found: &'static str },

  #[error("{op} must produce a plain object, got {found}")]
  InvalidOutput {
    op: OperationKind,
    id: Option<String>,
    found: &'static str,
  },

  #[error("onError must return an object or nothing, got {found}")]
  InvalidRecovery { found: &'static str },

  #[error("chain expects an instance of {expected}")]
  NotAPipeline { expected: &'static str },
}

/// Error returned by `Pipeline::run`.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error(transparent)]
  Shape(#[from] ShapeError),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  /// The recovery handler itself failed with something other than one of
  /// this crate's error types.
  #[error(transparent)]
  Recovery(anyhow::Error),
}

impl FlowError {
  /// Recovers our own error types from an `anyhow::Error` raised by user code,
  /// so a handler that rethrows a `PipelineError` reaches the caller of `run`
  /// unchanged. Foreign errors land in `Recovery`.
  pub(crate) fn from_anyhow(err: anyhow::Error) -> Self {
    let err = match err.downcast::<FlowError>() {
      Ok(flow) => return flow,
      Err(err) => err,
    };
    let err = match err.downcast::<PipelineError>() {
      Ok(pipeline) => return FlowError::Pipeline(pipeline),
      Err(err) => err,
    };
    match err.downcast::<ShapeError>() {
      Ok(shape) => FlowError::Shape(shape),
      Err(err) => FlowError::Recovery(err),
    }
  }

  pub fn as_pipeline_error(&self) -> Option<&PipelineError> {
    match self {
      FlowError::Pipeline(err) => Some(err),
      _ => None,
    }
  }

  pub fn is_shape(&self) -> bool {
    matches!(self, FlowError::Shape(_))
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;

fn error_name(err: &anyhow::Error) -> &'static str {
  if err.is::<PipelineError>() {
    PipelineError::NAME
  } else if err.is::<ShapeError>() {
    "ShapeError"
  } else if err.is::<FlowError>() {
    "FlowError"
  } else {
    "Error"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::anyhow;
  use std::error::Error as _;

  #[test]
  fn missing_op_serializes_as_undefined() {
    let err = PipelineError::new("nothing to see");
    assert_eq!(err.op(), UNDEFINED_OP);
    assert_eq!(
      err.to_json(),
      json!({ "name": "PipelineError", "message": "nothing to see", "op": "UNDEFINED" })
    );
  }

  #[test]
  fn op_is_stringified_at_construction() {
    let err = PipelineError::new("bad").with_op(OperationKind::Augment).with_id("total");
    assert_eq!(err.op(), "Augment");
    assert_eq!(err.id(), Some("total"));
  }

  #[test]
  fn serialized_cause_is_reduced_to_name_and_message() {
    let inner = PipelineError::new("inner failure").with_op(OperationKind::Noop);
    let err = PipelineError::new("outer")
      .with_op(OperationKind::Chain)
      .with_cause(inner);

    let view = err.to_json();
    assert_eq!(view["cause"], json!({ "name": "PipelineError", "message": "inner failure" }));
    assert_eq!(view["cause"].as_object().unwrap().len(), 2);

    let plain = PipelineError::from_error(anyhow!("boom"));
    assert_eq!(plain.message(), "boom");
    assert_eq!(plain.to_json()["cause"], json!({ "name": "Error", "message": "boom" }));
  }

  #[test]
  fn state_snapshot_is_never_serialized() {
    let mut state = State::new();
    state.insert("secret".into(), json!("hunter2"));
    let err = PipelineError::new("leaky?").with_state(state);

    assert_eq!(err.state().and_then(|s| s.get("secret")), Some(&json!("hunter2")));
    let text = serde_json::to_string(&err).unwrap();
    assert!(!text.contains("hunter2"));
    assert!(!format!("{:?}", err).contains("hunter2"));
  }

  #[test]
  fn cause_is_chained_and_visible_in_trace() {
    let err = PipelineError::from_error(anyhow!("disk on fire").context("writing report"))
      .with_op(OperationKind::ApplyTo);

    let source = err.source().expect("cause should be the error source");
    assert_eq!(source.to_string(), "writing report");

    let trace = err.trace();
    assert!(trace.starts_with("PipelineError: writing report [op: ApplyTo]"));
    assert!(trace.contains(CAUSE_MARKER));
    assert!(trace.contains("disk on fire"));
  }

  #[test]
  fn recovery_failures_are_unwrapped_back_into_our_variants() {
    let bubbled = anyhow::Error::new(PipelineError::new("bubbled").with_op(OperationKind::Transform));
    match FlowError::from_anyhow(bubbled) {
      FlowError::Pipeline(err) => {
        assert_eq!(err.message(), "bubbled");
        assert_eq!(err.op(), "Transform");
      }
      other => panic!("Expected FlowError::Pipeline, got {:?}", other),
    }

    let shape = anyhow::Error::new(ShapeError::InvalidRecovery { found: "array" });
    assert!(FlowError::from_anyhow(shape).is_shape());

    let other = FlowError::from_anyhow(anyhow!("handler broke"));
    assert!(matches!(other, FlowError::Recovery(_)));
    assert_eq!(other.to_string(), "handler broke");
  }
}
