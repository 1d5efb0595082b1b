// statepipe/examples/error_handling.rs

use anyhow::anyhow;
use serde_json::{json, Value};
use statepipe::{FlowError, Pipeline, ShapeError};
use tracing::{error, info};

// 1. Define a custom application error type for operations
#[derive(Debug, thiserror::Error)]
enum ExampleAppError {
  #[error("Inventory service unavailable for sku {0}")]
  InventoryDown(String),
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Error Handling Example ---");

  // Scenario 1: Default policy logs the failure and keeps the last good state
  info!("\nScenario 1: swallow (default)");
  run_with_default_policy().await;

  // Scenario 2: A custom handler patches the state
  info!("\nScenario 2: custom on_error handler");
  run_with_custom_handler().await;

  // Scenario 3: Bubbling pipeline hands the error back to the caller
  info!("\nScenario 3: bubble");
  run_with_bubbling_policy().await;

  // Scenario 4: Shape violations are never recoverable
  info!("\nScenario 4: invalid input");
  run_with_invalid_input().await;
}

fn reserve_stock() -> Pipeline<()> {
  Pipeline::new(())
    .augment("sku", |_s, _e| async { Ok::<_, anyhow::Error>(json!("A-42")) })
    .augment("reserved", |state, _e| async move {
      let sku = state["sku"].as_str().unwrap_or_default().to_string();
      Err::<Value, _>(ExampleAppError::InventoryDown(sku))
    })
    .augment("shipped", |_s, _e| async { Ok::<_, anyhow::Error>(json!(true)) }) // Never runs
}

async fn run_with_default_policy() {
  match reserve_stock().run(json!({})).await {
    Ok(state) => {
      info!("Pipeline swallowed the failure, state: {}", serde_json::Value::Object(state.clone()));
      assert!(state.contains_key("sku"));
      assert!(!state.contains_key("shipped"));
    }
    Err(e) => error!("Unexpected error: {}", e),
  }
}

async fn run_with_custom_handler() {
  let pipeline = reserve_stock().on_error(|err, mut state, _env| async move {
    info!(error = %err.to_json(), "Recovering from failure.");
    state.insert("reserved".into(), json!(false));
    state.insert("retry_later".into(), json!(true));
    Ok::<_, anyhow::Error>(Some(Value::Object(state)))
  });

  let state = pipeline.run(json!({})).await.expect("handler recovers");
  info!("Recovered state: {}", serde_json::Value::Object(state.clone()));
  assert_eq!(state["reserved"], json!(false));
}

async fn run_with_bubbling_policy() {
  let pipeline = Pipeline::bubbling(())
    .noop(|_s, _e| async { Err::<(), _>(anyhow!("payment gateway timeout")) });

  match pipeline.run(json!({ "order": 7 })).await {
    Err(FlowError::Pipeline(err)) => {
      info!("Pipeline failed as expected:\n{}", err.trace());
      assert_eq!(err.op(), "Noop");
      assert_eq!(err.message(), "payment gateway timeout");
    }
    other => error!("Expected a PipelineError, got {:?}", other),
  }
}

async fn run_with_invalid_input() {
  match reserve_stock().run(json!(["not", "a", "record"])).await {
    Err(FlowError::Shape(ShapeError::InvalidInput { found })) => {
      info!("Rejected input of kind '{}'", found);
    }
    other => error!("Expected ShapeError::InvalidInput, got {:?}", other),
  }
}
