// src/lib.rs

//! statepipe: a sequential, asynchronous pipeline executor over a single
//! key/value state record.
//!
//! A `Pipeline<Env>` is an append-only queue of operations:
//!  - `apply_to` replaces the whole state.
//!  - `transform` rewrites a field that must already exist.
//!  - `augment` creates a field that must not exist yet.
//!  - `noop` / `log` / `log_with` run side effects.
//!  - `chain` delegates to a nested pipeline.
//!
//! Every operation is async and receives the current state plus the
//! pipeline's environment (`Env`, any caller-supplied context). Nothing runs
//! until `run` is awaited. The first failure stops the run and is handed,
//! normalized into a `PipelineError`, to the pipeline's recovery: swallow
//! and log (the default), bubble to the caller, or a custom `on_error`
//! handler.

pub mod core;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

pub use crate::core::operation::{Action, EffectFn, OpFuture, Operation, OperationKind, ProduceFn, UpdateFn};
pub use crate::core::pipeline_trait::StateRunner;
pub use crate::core::recovery::{ParsePolicyError, RecoveryFn, RecoveryPolicy};
pub use crate::core::state::{ensure_state, is_state, value_kind, State};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{FlowError, FlowResult, PipelineError, ShapeError, CAUSE_MARKER, UNDEFINED_OP};

/// The five operation tags, as named constants.
pub mod ops {
  use crate::core::operation::OperationKind;

  pub const APPLY_TO: OperationKind = OperationKind::ApplyTo;
  pub const TRANSFORM: OperationKind = OperationKind::Transform;
  pub const AUGMENT: OperationKind = OperationKind::Augment;
  pub const CHAIN: OperationKind = OperationKind::Chain;
  pub const NOOP: OperationKind = OperationKind::Noop;
}

/*
    Typical use:
    1. Build the environment your operations need (clients, config, functions).
    2. `Pipeline::new(env)` (or `Pipeline::bubbling(env)` for pipelines you
       intend to `chain` into another one).
    3. Queue operations with the builder methods; optionally `.on_error(...)`.
    4. `pipeline.run(json!({ ... })).await` returns the final state.
*/
