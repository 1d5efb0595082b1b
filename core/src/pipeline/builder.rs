// statepipe/src/pipeline/builder.rs

//! Fluent builder methods that append operation records to a `Pipeline<Env>`
//! and configure its recovery. Nothing here executes an operation.
//!
//! Every user function is async and returns `Result<_, E>` where `E` is
//! convertible into `anyhow::Error`; an `Err` is treated as the operation
//! failing and is normalized into a `PipelineError` by `run`.

use tracing::{event, Level};

use crate::core::operation::{Action, EffectFn, Operation, OperationKind, ProduceFn, UpdateFn};
use crate::core::pipeline_trait::StateRunner;
use crate::core::recovery::{Recovery, RecoveryFn, RecoveryPolicy};
use crate::core::state::State;
use crate::error::{PipelineError, ShapeError};
use crate::pipeline::definition::Pipeline;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

impl<Env> Pipeline<Env>
where
  Env: 'static + Send + Sync,
{
  /// Queues a full-state replacement: `op_fn(state, env)` must resolve to a
  /// plain object, which becomes the new state.
  #[must_use]
  pub fn apply_to<F, E>(self, op_fn: impl Fn(State, Arc<Env>) -> F + Send + Sync + 'static) -> Self
  where
    F: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let produce: ProduceFn<Env> = Arc::new(move |state, env| {
      let user_fut = op_fn(state, env);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.push(Operation::new(OperationKind::ApplyTo, None, Action::Produce(produce)))
  }

  /// Queues an update of the existing field `id`:
  /// `op_fn(state[id], state, env)` resolves to the field's new value.
  /// Fails at run time if the field is missing; `op_fn` is then never called.
  #[must_use]
  pub fn transform<F, E>(
    self,
    id: impl Into<String>,
    op_fn: impl Fn(Value, State, Arc<Env>) -> F + Send + Sync + 'static,
  ) -> Self
  where
    F: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let update: UpdateFn<Env> = Arc::new(move |current, state, env| {
      let user_fut = op_fn(current, state, env);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.push(Operation::new(
      OperationKind::Transform,
      Some(id.into()),
      Action::Update(update),
    ))
  }

  /// Queues the creation of field `id` with the value `op_fn(state, env)`
  /// resolves to. Fails at run time if the field already exists.
  #[must_use]
  pub fn augment<F, E>(self, id: impl Into<String>, op_fn: impl Fn(State, Arc<Env>) -> F + Send + Sync + 'static) -> Self
  where
    F: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let produce: ProduceFn<Env> = Arc::new(move |state, env| {
      let user_fut = op_fn(state, env);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.push(Operation::new(
      OperationKind::Augment,
      Some(id.into()),
      Action::Produce(produce),
    ))
  }

  /// Queues a side effect. The state is left untouched.
  #[must_use]
  pub fn noop<F, E>(self, op_fn: impl Fn(State, Arc<Env>) -> F + Send + Sync + 'static) -> Self
  where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let effect: EffectFn<Env> = Arc::new(move |state, env| {
      let user_fut = op_fn(state, env);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.push(Operation::new(OperationKind::Noop, None, Action::Effect(effect)))
  }

  /// Queues a log line, emitted as-is at INFO under the `statepipe::log` target.
  #[must_use]
  pub fn log(self, message: impl Into<String>) -> Self {
    let message: Arc<str> = Arc::from(message.into());
    let effect: EffectFn<Env> = Arc::new(move |_state, _env| {
      event!(target: "statepipe::log", Level::INFO, "{}", message);
      Box::pin(async { Ok::<(), anyhow::Error>(()) })
    });
    self.push(Operation::new(OperationKind::Noop, None, Action::Effect(effect)))
  }

  /// Queues a log line computed from the current state and environment.
  #[must_use]
  pub fn log_with(self, message_fn: impl Fn(&State, &Env) -> String + Send + Sync + 'static) -> Self {
    let effect: EffectFn<Env> = Arc::new(move |state, env| {
      let line = message_fn(&state, &env);
      event!(target: "statepipe::log", Level::INFO, "{}", line);
      Box::pin(async { Ok::<(), anyhow::Error>(()) })
    });
    self.push(Operation::new(OperationKind::Noop, None, Action::Effect(effect)))
  }

  /// Replaces the recovery behaviour with a custom handler. Last call wins.
  ///
  /// The handler receives the normalized error, the state at failure and
  /// the environment. `Ok(None)` keeps the state at failure, `Ok(Some(v))`
  /// replaces it (`v` must be a plain object, otherwise `run` fails with
  /// `ShapeError::InvalidRecovery`), and `Err(e)` escapes `run` unchanged.
  #[must_use]
  pub fn on_error<F, E>(mut self, handler_fn: impl Fn(PipelineError, State, Arc<Env>) -> F + Send + Sync + 'static) -> Self
  where
    F: Future<Output = Result<Option<Value>, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
  {
    let handler: RecoveryFn<Env> = Arc::new(move |err, state, env| {
      let user_fut = handler_fn(err, state, env);
      Box::pin(async move { user_fut.await.map_err(Into::into) })
    });
    self.recovery = Recovery::Custom(handler);
    event!(Level::DEBUG, "Custom recovery handler installed.");
    self
  }

  /// Switches back to one of the named recovery policies.
  #[must_use]
  pub fn recover_with(mut self, policy: RecoveryPolicy) -> Self {
    self.recovery = Recovery::Policy(policy);
    self
  }

  /// Queues delegation to a nested pipeline (or any other `StateRunner`).
  /// The nested run receives the current state and its result replaces it.
  #[must_use]
  pub fn chain<R>(self, child: R) -> Self
  where
    R: StateRunner + 'static,
  {
    self.chain_shared(Arc::new(child))
  }

  /// Like `chain`, for a runner shared with other pipelines.
  #[must_use]
  pub fn chain_shared(self, child: Arc<dyn StateRunner>) -> Self {
    self.push(Operation::new(OperationKind::Chain, None, Action::Delegate(child)))
  }

  /// Dynamic form of `chain` for values whose type is only known at run time.
  /// Fails immediately unless `candidate` is a `Pipeline<Env>`.
  pub fn try_chain(self, candidate: Arc<dyn Any + Send + Sync>) -> Result<Self, ShapeError> {
    match candidate.downcast::<Pipeline<Env>>() {
      Ok(child) => Ok(self.chain_shared(child)),
      Err(_) => {
        event!(Level::ERROR, "chain argument is not a pipeline.");
        Err(ShapeError::NotAPipeline {
          expected: std::any::type_name::<Pipeline<Env>>(),
        })
      }
    }
  }

  /// Appends a hand-built record.
  #[must_use]
  pub fn push(mut self, operation: Operation<Env>) -> Self {
    event!(
      Level::TRACE,
      kind = %operation.kind(),
      id = ?operation.id(),
      position = self.operations.len(),
      "Operation queued."
    );
    self.operations.push(operation);
    self
  }
}
