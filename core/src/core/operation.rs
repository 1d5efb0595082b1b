// statepipe/src/core/operation.rs

//! Defines the operation records a pipeline queues, the closed set of
//! operation kinds, and the boxed async function types behind them.

use crate::core::pipeline_trait::StateRunner;
use crate::core::state::State;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, `Send` future returned by every stored operation function.
pub type OpFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// `(state, env) -> value`. Backs `apply_to` and `augment`.
pub type ProduceFn<Env> = Arc<dyn Fn(State, Arc<Env>) -> OpFuture<Value> + Send + Sync>;

/// `(current field value, state, env) -> new field value`. Backs `transform`.
pub type UpdateFn<Env> = Arc<dyn Fn(Value, State, Arc<Env>) -> OpFuture<Value> + Send + Sync>;

/// `(state, env) -> ()`. Backs `noop` and the `log` helpers.
pub type EffectFn<Env> = Arc<dyn Fn(State, Arc<Env>) -> OpFuture<()> + Send + Sync>;

/// Tag of a queued operation.
///
/// The run loop dispatches exhaustively over these five kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
  /// Replace the whole state with the operation's result.
  ApplyTo,
  /// Rewrite one existing field.
  Transform,
  /// Create one field that must not exist yet.
  Augment,
  /// Delegate to a nested pipeline.
  Chain,
  /// Run a side effect; the result is discarded.
  Noop,
}

impl OperationKind {
  pub const ALL: [OperationKind; 5] = [
    OperationKind::ApplyTo,
    OperationKind::Transform,
    OperationKind::Augment,
    OperationKind::Chain,
    OperationKind::Noop,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      OperationKind::ApplyTo => "ApplyTo",
      OperationKind::Transform => "Transform",
      OperationKind::Augment => "Augment",
      OperationKind::Chain => "Chain",
      OperationKind::Noop => "Noop",
    }
  }
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The behaviour attached to an operation record.
pub enum Action<Env> {
  Produce(ProduceFn<Env>),
  Update(UpdateFn<Env>),
  Effect(EffectFn<Env>),
  Delegate(Arc<dyn StateRunner>),
}

impl<Env> Action<Env> {
  pub fn name(&self) -> &'static str {
    match self {
      Action::Produce(_) => "Produce",
      Action::Update(_) => "Update",
      Action::Effect(_) => "Effect",
      Action::Delegate(_) => "Delegate",
    }
  }
}

impl<Env> Clone for Action<Env> {
  fn clone(&self) -> Self {
    match self {
      Action::Produce(f) => Action::Produce(Arc::clone(f)),
      Action::Update(f) => Action::Update(Arc::clone(f)),
      Action::Effect(f) => Action::Effect(Arc::clone(f)),
      Action::Delegate(r) => Action::Delegate(Arc::clone(r)),
    }
  }
}

/// One queued unit of work. Immutable once appended.
///
/// The builder methods on `Pipeline` only ever produce well-formed records.
/// `Operation::new` allows hand-built records; a kind/action combination the
/// run loop does not understand is reported as an "Unknown Operation".
pub struct Operation<Env> {
  pub(crate) id: Option<String>,
  pub(crate) kind: OperationKind,
  pub(crate) action: Action<Env>,
}

impl<Env> Operation<Env> {
  pub fn new(kind: OperationKind, id: Option<String>, action: Action<Env>) -> Self {
    Self { id, kind, action }
  }

  pub fn kind(&self) -> OperationKind {
    self.kind
  }

  pub fn id(&self) -> Option<&str> {
    self.id.as_deref()
  }

  pub fn action(&self) -> &Action<Env> {
    &self.action
  }
}

impl<Env> Clone for Operation<Env> {
  fn clone(&self) -> Self {
    Self {
      id: self.id.clone(),
      kind: self.kind,
      action: self.action.clone(),
    }
  }
}

// The stored closures don't implement Debug; print the shape of the record instead.
impl<Env> fmt::Debug for Operation<Env> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Operation")
      .field("id", &self.id)
      .field("kind", &self.kind)
      .field("action", &self.action.name())
      .finish()
  }
}
