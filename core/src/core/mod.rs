pub mod operation;
pub mod pipeline_trait;
pub mod recovery;
pub mod state;

// Re-export key types for easier access from other modules (and lib.rs)
pub use operation::{Action, EffectFn, OpFuture, Operation, OperationKind, ProduceFn, UpdateFn};
pub use pipeline_trait::StateRunner;
pub use recovery::{ParsePolicyError, RecoveryFn, RecoveryPolicy};
pub use state::{ensure_state, is_state, value_kind, State};
