// statepipe/src/core/recovery.rs

//! Defines how a pipeline reacts to the first failed operation of a run:
//! a named `RecoveryPolicy`, or a custom handler installed with `on_error`.

use crate::core::operation::OpFuture;
use crate::core::state::State;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// `(normalized error, state at failure, env) -> replacement state or nothing`.
///
/// `Ok(None)` keeps the state at failure, `Ok(Some(value))` replaces it
/// (the value must be a plain record), and `Err` escapes `run` unchanged.
pub type RecoveryFn<Env> = Arc<dyn Fn(PipelineError, State, Arc<Env>) -> OpFuture<Option<Value>> + Send + Sync>;

/// Built-in recovery behaviours, selectable at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
  /// Log the error and return the last good state.
  #[default]
  Swallow,
  /// Return the normalized error to whoever called `run`.
  /// Use this for pipelines that are nested into another one via `chain`.
  Bubble,
}

impl RecoveryPolicy {
  pub fn as_str(self) -> &'static str {
    match self {
      RecoveryPolicy::Swallow => "swallow",
      RecoveryPolicy::Bubble => "bubble",
    }
  }
}

impl fmt::Display for RecoveryPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown recovery policy '{0}' (expected 'swallow' or 'bubble')")]
pub struct ParsePolicyError(pub String);

impl FromStr for RecoveryPolicy {
  type Err = ParsePolicyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "swallow" => Ok(RecoveryPolicy::Swallow),
      "bubble" => Ok(RecoveryPolicy::Bubble),
      _ => Err(ParsePolicyError(s.to_string())),
    }
  }
}

/// What a pipeline currently does on failure. Last `on_error` call wins.
pub(crate) enum Recovery<Env> {
  Policy(RecoveryPolicy),
  Custom(RecoveryFn<Env>),
}

impl<Env> Recovery<Env> {
  pub(crate) fn policy(&self) -> Option<RecoveryPolicy> {
    match self {
      Recovery::Policy(policy) => Some(*policy),
      Recovery::Custom(_) => None,
    }
  }
}

impl<Env> Clone for Recovery<Env> {
  fn clone(&self) -> Self {
    match self {
      Recovery::Policy(policy) => Recovery::Policy(*policy),
      Recovery::Custom(f) => Recovery::Custom(Arc::clone(f)),
    }
  }
}
