// statepipe/examples/nested_chain.rs

use anyhow::anyhow;
use serde_json::{json, Value};
use statepipe::Pipeline;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
struct AddressBook {
  default_country: &'static str,
}

// A reusable child pipeline. It bubbles so its failures reach the parent's own handler.
fn normalize_address() -> Pipeline<AddressBook> {
  Pipeline::bubbling(AddressBook { default_country: "NL" })
    .augment("country", |_state, env: Arc<AddressBook>| async move {
      Ok::<_, anyhow::Error>(json!(env.default_country))
    })
    .transform("zip", |zip, _state, _env| async move {
      match zip.as_str() {
        Some(zip) if !zip.trim().is_empty() => Ok(json!(zip.replace(' ', "").to_uppercase())),
        _ => Err(anyhow!("zip code is empty")),
      }
    })
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Nested Chain Example ---");

  let signup = Pipeline::new(())
    .augment("user", |_s, _e| async { Ok::<_, anyhow::Error>(json!("ada")) })
    .chain(normalize_address())
    .augment("label", |state, _e| async move {
      Ok::<_, anyhow::Error>(json!(format!("{} / {}", state["zip"], state["country"])))
    })
    .on_error(|err, mut state, _env| async move {
      info!(op = %err.op(), id = ?err.id(), "Signup failed: {}", err);
      state.insert("needs_review".into(), json!(true));
      Ok::<_, anyhow::Error>(Some(Value::Object(state)))
    });

  let good = signup.run(json!({ "zip": "1012 ab" })).await.expect("signup pipeline never escalates");
  info!("Good address: {}", serde_json::Value::Object(good.clone()));
  assert_eq!(good["zip"], json!("1012AB"));
  assert_eq!(good["country"], json!("NL"));

  let bad = signup.run(json!({ "zip": "  " })).await.expect("signup pipeline never escalates");
  info!("Bad address: {}", serde_json::Value::Object(bad.clone()));
  assert_eq!(bad["needs_review"], json!(true));
  assert!(!bad.contains_key("country"));
}
