// statepipe/src/pipeline/definition.rs

//! Contains the `Pipeline<Env>` struct definition, its constructors and the
//! read-only accessors used for introspection.

use crate::core::operation::Operation;
use crate::core::recovery::{Recovery, RecoveryPolicy};
use crate::core::state;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// An ordered queue of operations over a single state record, plus the
/// environment every operation receives and the recovery behaviour applied
/// to the first failure of a run.
///
/// `Env` is caller-supplied context (clients, constants, functions...). It is
/// fixed at construction and handed, unchanged, to every operation and to
/// the recovery handler. It must be `'static + Send + Sync`.
///
/// Building a pipeline never executes anything; see `Pipeline::run`.
pub struct Pipeline<Env = ()>
where
  Env: 'static + Send + Sync,
{
  /// Append-only. Insertion order is execution order.
  pub(crate) operations: Vec<Operation<Env>>,
  pub(crate) env: Arc<Env>,
  pub(crate) recovery: Recovery<Env>,
}

impl<Env> Pipeline<Env>
where
  Env: 'static + Send + Sync,
{
  /// Creates an empty pipeline with the default swallow-and-log recovery.
  pub fn new(env: Env) -> Self {
    Self::with_policy(env, RecoveryPolicy::Swallow)
  }

  /// Creates an empty pipeline whose recovery returns the normalized error
  /// to the caller of `run`. Meant for pipelines nested via `chain`, so their
  /// failures reach the parent's own recovery.
  pub fn bubbling(env: Env) -> Self {
    Self::with_policy(env, RecoveryPolicy::Bubble)
  }

  pub fn with_policy(env: Env, policy: RecoveryPolicy) -> Self {
    Self::with_shared_env(Arc::new(env), policy)
  }

  /// Like `with_policy`, for an environment already shared with other pipelines.
  pub fn with_shared_env(env: Arc<Env>, policy: RecoveryPolicy) -> Self {
    Self {
      operations: Vec::new(),
      env,
      recovery: Recovery::Policy(policy),
    }
  }

  /// Same check `run` applies to its input. See `core::state::is_state`.
  pub fn is_state(value: &Value) -> bool {
    state::is_state(value)
  }

  /// The queued records, in execution order.
  pub fn operations(&self) -> &[Operation<Env>] {
    &self.operations
  }

  pub fn len(&self) -> usize {
    self.operations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }

  pub fn env(&self) -> &Arc<Env> {
    &self.env
  }

  /// The named policy in effect, or `None` once `on_error` installed a custom handler.
  pub fn recovery_policy(&self) -> Option<RecoveryPolicy> {
    self.recovery.policy()
  }
}

impl<Env> Default for Pipeline<Env>
where
  Env: 'static + Send + Sync + Default,
{
  fn default() -> Self {
    Self::new(Env::default())
  }
}

// Records and environment are shared, so a clone can be extended independently
// without re-running any closure construction.
impl<Env> Clone for Pipeline<Env>
where
  Env: 'static + Send + Sync,
{
  fn clone(&self) -> Self {
    Self {
      operations: self.operations.clone(),
      env: Arc::clone(&self.env),
      recovery: self.recovery.clone(),
    }
  }
}

impl<Env> fmt::Debug for Pipeline<Env>
where
  Env: 'static + Send + Sync,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("env_type", &std::any::type_name::<Env>())
      .field("operations", &self.operations)
      .field(
        "recovery",
        &self.recovery_policy().map_or("custom", RecoveryPolicy::as_str),
      )
      .finish()
  }
}
