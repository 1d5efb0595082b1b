// statepipe/src/pipeline/execution.rs

//! Contains the `Pipeline::run()` method, which interprets the queued
//! operation records in order, and the recovery protocol applied to the
//! first failure of a run.

use crate::core::operation::{Action, Operation, OperationKind};
use crate::core::pipeline_trait::StateRunner;
use crate::core::recovery::{Recovery, RecoveryPolicy};
use crate::core::state::{ensure_state, value_kind, State};
use crate::error::{FlowError, FlowResult, PipelineError, ShapeError};
use crate::pipeline::definition::Pipeline;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{event, instrument, span, Instrument, Level};

/// Why a single operation did not produce a next state.
enum StepFailure {
  /// Goes through the pipeline's recovery exactly once.
  Recoverable(PipelineError),
  /// Ends the run immediately, recovery is skipped.
  Fatal(FlowError),
}

impl<Env> Pipeline<Env>
where
  Env: 'static + Send + Sync,
{
  /// Executes the queued operations, in insertion order, against `initial`.
  ///
  /// `initial` must be a plain object; anything else fails with
  /// `ShapeError::InvalidInput` before any operation runs. The first failing
  /// operation stops the run: its error is normalized into a
  /// `PipelineError` and handed to the recovery behaviour, whose outcome
  /// decides what `run` returns. Shape violations skip recovery entirely.
  ///
  /// Operations never run concurrently; a chained pipeline finishes before
  /// the next record of this one starts.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      pipeline_env_type = %std::any::type_name::<Env>(),
      num_operations = self.operations.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, initial: Value) -> FlowResult<State> {
    let mut state = ensure_state(initial).map_err(|err| {
      event!(Level::ERROR, error = %err, "Rejected pipeline input.");
      err
    })?;
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (op_idx, operation) in self.operations.iter().enumerate() {
      let op_span = span!(
        Level::INFO,
        "pipeline_operation",
        op_index = op_idx,
        kind = %operation.kind,
        id = ?operation.id
      );

      match self.execute(operation, &state).instrument(op_span).await {
        Ok(next) => state = next,
        Err(StepFailure::Fatal(err)) => {
          event!(Level::ERROR, op_index = op_idx, error = %err, "Operation violated the state shape.");
          return Err(err);
        }
        Err(StepFailure::Recoverable(err)) => {
          event!(
            Level::DEBUG,
            op_index = op_idx,
            op = %err.op(),
            error = %err,
            "Operation failed, skipping the remaining operations."
          );
          return self.recover(err, state).await;
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed successfully.");
    Ok(state)
  }

  /// Runs one record against `state` and returns the next state.
  async fn execute(&self, operation: &Operation<Env>, state: &State) -> Result<State, StepFailure> {
    let env = Arc::clone(&self.env);

    match (operation.kind, operation.id.as_deref(), &operation.action) {
      (OperationKind::ApplyTo, _, Action::Produce(op_fn)) => {
        let produced = op_fn(state.clone(), env)
          .await
          .map_err(|err| self.failure(err, operation, state))?;
        match produced {
          Value::Object(next) => Ok(next),
          other => Err(StepFailure::Fatal(
            ShapeError::InvalidOutput {
              op: OperationKind::ApplyTo,
              id: operation.id.clone(),
              found: value_kind(&other),
            }
            .into(),
          )),
        }
      }

      (OperationKind::Transform, Some(id), Action::Update(op_fn)) => {
        let Some(current) = state.get(id).cloned() else {
          return Err(StepFailure::Recoverable(
            PipelineError::new(format!("Cannot transform missing field '{}'", id))
              .with_op(OperationKind::Transform)
              .with_id(id)
              .with_state(state.clone()),
          ));
        };
        let updated = op_fn(current, state.clone(), env)
          .await
          .map_err(|err| self.failure(err, operation, state))?;
        let mut next = state.clone();
        next.insert(id.to_string(), updated);
        Ok(next)
      }

      (OperationKind::Augment, Some(id), Action::Produce(op_fn)) => {
        if state.contains_key(id) {
          return Err(StepFailure::Recoverable(
            PipelineError::new(format!("Cannot augment existing field '{}'", id))
              .with_op(OperationKind::Augment)
              .with_id(id)
              .with_state(state.clone()),
          ));
        }
        let value = op_fn(state.clone(), env)
          .await
          .map_err(|err| self.failure(err, operation, state))?;
        let mut next = state.clone();
        next.insert(id.to_string(), value);
        Ok(next)
      }

      (OperationKind::Chain, _, Action::Delegate(child)) => {
        event!(Level::TRACE, child_operations = child.operation_count(), "Delegating to chained pipeline.");
        child
          .run_state(state.clone())
          .await
          .map_err(|err| self.classify(err, operation, state))
      }

      (OperationKind::Noop, _, Action::Effect(op_fn)) => {
        op_fn(state.clone(), env)
          .await
          .map_err(|err| self.failure(err, operation, state))?;
        Ok(state.clone())
      }

      // Only reachable through hand-built records.
      (kind, id, action) => {
        event!(Level::ERROR, kind = %kind, action = action.name(), "Unknown operation record.");
        let mut err = PipelineError::new("Unknown Operation")
          .with_op(kind)
          .with_state(state.clone());
        if let Some(id) = id {
          err = err.with_id(id);
        }
        Err(StepFailure::Recoverable(err))
      }
    }
  }

  /// Normalizes a failure raised by a user-supplied operation function.
  /// A `ShapeError` raised from inside user code is an ordinary failure of
  /// that operation; only the checks `run` performs itself are fatal.
  fn failure(&self, err: anyhow::Error, operation: &Operation<Env>, state: &State) -> StepFailure {
    match FlowError::from_anyhow(err) {
      FlowError::Shape(shape) => StepFailure::Recoverable(self.wrap(shape.into(), operation, state)),
      other => self.classify(other, operation, state),
    }
  }

  /// Pipeline errors pass through as they are; shape errors stay fatal;
  /// anything else is wrapped with this operation's tag, id and state.
  fn classify(&self, err: FlowError, operation: &Operation<Env>, state: &State) -> StepFailure {
    match err {
      FlowError::Pipeline(err) if err.has_state() => StepFailure::Recoverable(err),
      FlowError::Pipeline(err) => StepFailure::Recoverable(err.with_state(state.clone())),
      FlowError::Shape(err) => StepFailure::Fatal(FlowError::Shape(err)),
      FlowError::Recovery(source) => StepFailure::Recoverable(self.wrap(source, operation, state)),
    }
  }

  fn wrap(&self, source: anyhow::Error, operation: &Operation<Env>, state: &State) -> PipelineError {
    let err = PipelineError::from_error(source)
      .with_op(operation.kind)
      .with_state(state.clone());
    match &operation.id {
      Some(id) => err.with_id(id.clone()),
      None => err,
    }
  }

  /// Applies the recovery behaviour exactly once. Nothing produced here is
  /// fed back into recovery.
  async fn recover(&self, err: PipelineError, state: State) -> FlowResult<State> {
    match &self.recovery {
      Recovery::Policy(RecoveryPolicy::Swallow) => {
        event!(
          Level::ERROR,
          error = %err.to_json(),
          "Pipeline operation failed, keeping the last good state."
        );
        Ok(state)
      }
      Recovery::Policy(RecoveryPolicy::Bubble) => {
        event!(Level::DEBUG, op = %err.op(), "Bubbling pipeline error to the caller.");
        Err(FlowError::Pipeline(err))
      }
      Recovery::Custom(handler) => {
        let outcome = handler(err, state.clone(), Arc::clone(&self.env))
          .await
          .map_err(|handler_err| {
            event!(Level::WARN, error = %handler_err, "Recovery handler escalated.");
            FlowError::from_anyhow(handler_err)
          })?;
        match outcome {
          None => Ok(state),
          Some(Value::Object(recovered)) => Ok(recovered),
          Some(other) => Err(
            ShapeError::InvalidRecovery {
              found: value_kind(&other),
            }
            .into(),
          ),
        }
      }
    }
  }
}

#[async_trait]
impl<Env> StateRunner for Pipeline<Env>
where
  Env: 'static + Send + Sync,
{
  async fn run_state(&self, state: State) -> FlowResult<State> {
    self.run(Value::Object(state)).await
  }

  fn operation_count(&self) -> usize {
    self.operations.len()
  }
}
