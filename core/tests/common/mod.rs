// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use parking_lot::Mutex;
use serde_json::Value;
use statepipe::State;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tracing::Level;

// --- Recording environment ---

/// Environment that records which operations touched it, in order.
#[derive(Debug, Default)]
pub struct Journal {
  entries: Mutex<Vec<String>>,
}

impl Journal {
  pub fn record(&self, entry: impl Into<String>) {
    self.entries.lock().push(entry.into());
  }

  pub fn entries(&self) -> Vec<String> {
    self.entries.lock().clone()
  }
}

/// Environment carrying plain constants, like a config record.
#[derive(Debug, Clone)]
pub struct Rates {
  pub vat: f64,
  pub currency: &'static str,
}

impl Default for Rates {
  fn default() -> Self {
    Self {
      vat: 0.25,
      currency: "EUR",
    }
  }
}

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Test operation failed: {0}")]
  Operation(String),

  #[error("Test recovery failed: {0}")]
  Recovery(String),
}

// --- State helpers ---

/// Unwraps a `json!({...})` literal into a `State`.
pub fn state_of(value: Value) -> State {
  match value {
    Value::Object(map) => map,
    other => panic!("state_of expects an object literal, got {}", other),
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Captured log output, scoped to the current thread ---

/// In-memory writer for a thread-local `fmt` subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.buffer.lock()).into_owned()
  }
}

impl std::io::Write for CapturedLogs {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.buffer.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
  type Writer = CapturedLogs;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

/// Routes events on this thread into the returned buffer until the guard drops.
/// Only reliable on the current-thread runtime `#[tokio::test]` uses by default.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
  let logs = CapturedLogs::default();
  let subscriber = tracing_subscriber::fmt()
    .with_max_level(Level::TRACE)
    .with_ansi(false)
    .with_writer(logs.clone())
    .finish();
  let guard = tracing::subscriber::set_default(subscriber);
  (logs, guard)
}

// --- Atomic counters for checking execution counts ---
pub static OPERATION_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));
pub static RECOVERY_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  OPERATION_EXEC_COUNTER.store(0, Ordering::SeqCst);
  RECOVERY_EXEC_COUNTER.store(0, Ordering::SeqCst);
}

pub fn operation_calls() -> usize {
  OPERATION_EXEC_COUNTER.load(Ordering::SeqCst)
}

pub fn recovery_calls() -> usize {
  RECOVERY_EXEC_COUNTER.load(Ordering::SeqCst)
}
