// statepipe/src/core/pipeline_trait.rs

//! Defines the `StateRunner` trait for type-erased execution of nested pipelines.

use crate::core::state::State;
use crate::error::FlowResult;
use async_trait::async_trait;

/// A type-erased trait that lets a pipeline delegate to another pipeline
/// (`chain`) without knowing the nested pipeline's environment type.
///
/// Every `Pipeline<Env>` implements it.
#[async_trait]
pub trait StateRunner: Send + Sync {
  /// Runs the nested pipeline to completion against `state` and returns its
  /// final state, or the error that escaped its recovery handler.
  async fn run_state(&self, state: State) -> FlowResult<State>;

  /// Number of operations queued on the runner, for diagnostics.
  fn operation_count(&self) -> usize;
}
