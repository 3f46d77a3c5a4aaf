//! JSON-RPC 2.0 endpoint powered by `launchdeck_core::rpc`.
//!
//! Exposes `POST /api/rpc` for all method calls and `GET /api/rpc/methods`
//! for discovery.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use launchdeck_core::rpc::RpcRouter;
use launchdeck_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(rpc_handler))
        .route("/methods", get(list_methods))
}

/// POST /api/rpc - single request or batch.
async fn rpc_handler(State(state): State<AppState>, body: String) -> axum::response::Response {
    use axum::response::IntoResponse;

    let rpc = RpcRouter::new(state);
    let response = rpc.handle_request(&body).await;
    (
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        response,
    )
        .into_response()
}

async fn list_methods(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rpc = RpcRouter::new(state);
    let methods = rpc.method_list();
    Json(serde_json::json!({ "methods": methods }))
}
