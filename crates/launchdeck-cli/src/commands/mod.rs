//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and goes through
//! the same JSON-RPC router that backs `/api/rpc`.

pub mod rpc;
pub mod server;
pub mod task;
pub mod workspace;

use launchdeck_core::config::LaunchdeckConfig;
use launchdeck_core::rpc::RpcRouter;
use launchdeck_core::state::{AppState, AppStateInner};
use serde_json::Value;

/// Open the configured backend and wait for both stores to load.
pub async fn init_state(config: &LaunchdeckConfig) -> Result<AppState, String> {
    AppStateInner::open(config)
        .await
        .map_err(|e| format!("Failed to open {} backend: {}", config.backend.as_str(), e))
}

/// Call one RPC method and return its `result`, or the error message.
pub async fn call(state: &AppState, method: &str, params: Value) -> Result<Value, String> {
    let router = RpcRouter::new(state.clone());
    let response = router
        .handle_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        }))
        .await;

    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(message.to_string());
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Ask before a destructive action unless `--yes` was given.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool, String> {
    if yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| format!("Confirmation failed (use --yes in scripts): {}", e))
}
