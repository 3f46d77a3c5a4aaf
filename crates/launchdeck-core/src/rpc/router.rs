//! Transport-agnostic JSON-RPC 2.0 dispatcher.
//!
//! `RpcRouter` takes an `AppState` and dispatches incoming JSON-RPC requests
//! to the appropriate method handler. It has no HTTP dependency, so the same
//! router backs `/api/rpc` and every CLI subcommand.

use serde::Serialize;
use serde_json::Value;

use crate::state::AppState;

use super::error::RpcError;
use super::methods;
use super::types::*;

const SERIALIZE_FAILURE: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Failed to serialize response"},"id":null}"#;

/// Transport-agnostic JSON-RPC router.
///
/// ```ignore
/// let router = RpcRouter::new(app_state);
///
/// // From raw JSON string:
/// let response_json = router.handle_request(raw_json_str).await;
///
/// // From a parsed request:
/// let response = router.dispatch(request).await;
/// ```
#[derive(Clone)]
pub struct RpcRouter {
    state: AppState,
}

impl RpcRouter {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Handle a raw JSON string (single request or batch) and return the
    /// serialized response.
    pub async fn handle_request(&self, raw: &str) -> String {
        if let Ok(batch) = serde_json::from_str::<Vec<JsonRpcRequest>>(raw) {
            let mut responses = Vec::with_capacity(batch.len());
            for req in batch {
                responses.push(self.dispatch(req).await);
            }
            return serde_json::to_string(&responses).unwrap_or_else(|_| SERIALIZE_FAILURE.into());
        }

        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                return serde_json::to_string(&JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
                .unwrap_or_else(|_| SERIALIZE_FAILURE.into());
            }
        };

        let response = self.dispatch(request).await;
        serde_json::to_string(&response).unwrap_or_else(|_| SERIALIZE_FAILURE.into())
    }

    /// Handle a pre-parsed `serde_json::Value`, e.g. from axum's `Json`
    /// extractor or a CLI command.
    pub async fn handle_value(&self, value: Value) -> Value {
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                return serde_json::to_value(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Invalid request: {}", e),
                ))
                .unwrap_or_default();
            }
        };

        let response = self.dispatch(request).await;
        serde_json::to_value(response).unwrap_or_default()
    }

    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        if req.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                req.id,
                INVALID_REQUEST,
                "Invalid JSON-RPC version, expected \"2.0\"",
            );
        }

        let id = req.id.clone();
        let params = req.params.unwrap_or(Value::Object(Default::default()));

        tracing::debug!("rpc {}", req.method);
        match self.route(&req.method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => err.to_response(id),
        }
    }

    async fn route(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let state = &self.state;
        match method {
            // ----- Workspaces -----
            "workspaces.list" => to_json(methods::workspaces::list(state).await?),
            "workspaces.get" => {
                let p = parse_params(params)?;
                to_json(methods::workspaces::get(state, p).await?)
            }
            "workspaces.create" => {
                let p = parse_params(params)?;
                to_json(methods::workspaces::create(state, p).await?)
            }
            "workspaces.update" => {
                let p = parse_params(params)?;
                to_json(methods::workspaces::update(state, p).await?)
            }
            "workspaces.delete" => {
                let p = parse_params(params)?;
                to_json(methods::workspaces::delete(state, p).await?)
            }
            "workspaces.children" => {
                let p = parse_params(params)?;
                to_json(methods::workspaces::children(state, p).await?)
            }
            "workspaces.topLevel" => to_json(methods::workspaces::top_level(state).await?),
            "workspaces.tree" => to_json(methods::workspaces::tree(state).await?),
            "workspaces.launch" => {
                let p = parse_params(params)?;
                to_json(methods::workspaces::launch(state, p).await?)
            }

            // ----- Tasks -----
            "tasks.list" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::list(state, p).await?)
            }
            "tasks.get" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::get(state, p).await?)
            }
            "tasks.create" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::create(state, p).await?)
            }
            "tasks.update" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::update(state, p).await?)
            }
            "tasks.delete" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::delete(state, p).await?)
            }
            "tasks.updateProgress" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::update_progress(state, p).await?)
            }
            "tasks.advanceProgress" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::advance_progress(state, p).await?)
            }
            "tasks.addTime" => {
                let p = parse_params(params)?;
                to_json(methods::tasks::add_time(state, p).await?)
            }
            "tasks.summary" => to_json(methods::tasks::summary(state).await?),

            _ => Err(RpcError::MethodNotFound(format!(
                "Method not found: {}",
                method
            ))),
        }
    }

    /// All supported method names, for `/api/rpc/methods`.
    pub fn method_list(&self) -> Vec<&'static str> {
        vec![
            "workspaces.list",
            "workspaces.get",
            "workspaces.create",
            "workspaces.update",
            "workspaces.delete",
            "workspaces.children",
            "workspaces.topLevel",
            "workspaces.tree",
            "workspaces.launch",
            "tasks.list",
            "tasks.get",
            "tasks.create",
            "tasks.update",
            "tasks.delete",
            "tasks.updateProgress",
            "tasks.advanceProgress",
            "tasks.addTime",
            "tasks.summary",
        ]
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value)
        .map_err(|e| RpcError::InvalidParams(format!("Invalid params: {}", e)))
}

fn to_json<T: Serialize>(result: T) -> Result<Value, RpcError> {
    serde_json::to_value(result).map_err(|e| RpcError::Internal(e.to_string()))
}
