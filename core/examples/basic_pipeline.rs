// statepipe/examples/basic_pipeline.rs

use serde_json::{json, Value};
use statepipe::{FlowError, Pipeline};
use std::sync::Arc;
use tracing::info;

// 1. Define the environment every operation receives.
//    Anything 'static + Send + Sync works: constants, clients, closures.
#[derive(Debug)]
struct PricingEnv {
  vat_rate: f64,
  currency: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 2. Queue operations. Nothing runs yet.
  let pipeline = Pipeline::new(PricingEnv {
    vat_rate: 0.25,
    currency: "EUR",
  })
  .log("Pricing order")
  .augment("subtotal", |state, _env| async move {
    let subtotal: f64 = state
      .get("lines")
      .and_then(Value::as_array)
      .map(|lines| {
        lines
          .iter()
          .map(|line| line["qty"].as_f64().unwrap_or_default() * line["unit"].as_f64().unwrap_or_default())
          .sum::<f64>()
      })
      .unwrap_or_default();
    Ok::<_, anyhow::Error>(json!(subtotal))
  })
  .augment("vat", |state, env: Arc<PricingEnv>| async move {
    let subtotal = state["subtotal"].as_f64().unwrap_or_default();
    Ok::<_, anyhow::Error>(json!(subtotal * env.vat_rate))
  })
  .augment("currency", |_state, env: Arc<PricingEnv>| async move {
    Ok::<_, anyhow::Error>(json!(env.currency))
  })
  .transform("lines", |lines, _state, _env| async move {
    // Keep only the line count in the final record.
    Ok::<_, anyhow::Error>(json!(lines.as_array().map_or(0, Vec::len)))
  })
  .log_with(|state, env| format!("Priced order: {} {}", state["subtotal"], env.currency));

  // 3. Run it against an initial record.
  let initial = json!({
    "lines": [
      { "qty": 2, "unit": 10.0 },
      { "qty": 1, "unit": 4.0 }
    ]
  });
  info!("Starting pipeline execution...");
  let result = pipeline.run(initial).await?;

  // 4. Inspect the result
  info!("Final state: {}", serde_json::Value::Object(result.clone()));
  assert_eq!(result["subtotal"], json!(24.0));
  assert_eq!(result["vat"], json!(6.0));
  assert_eq!(result["lines"], json!(2));

  Ok(())
}
