//! HTTP round-trips through the full router over in-memory collections.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use launchdeck_core::state::{AppState, AppStateInner};
use launchdeck_server::build_router;

async fn test_state() -> AppState {
    AppStateInner::in_memory()
        .await
        .expect("Failed to open in-memory state")
}

async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Poll until the replica reflects a write.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("replica never caught up");
}

#[tokio::test]
async fn test_health() {
    let state = test_state().await;
    let (status, body) = send(&state, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["workspaces"], 0);
}

#[tokio::test]
async fn test_workspace_create_get_and_launch() {
    let state = test_state().await;
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/workspaces",
        Some(json!({ "title": "Docs", "type": "embed", "url": "https://docs.rs" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();

    eventually(|| state.workspace_store.get_item(&id).is_some()).await;

    let (status, item) = send(&state, Method::GET, &format!("/api/workspaces/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["title"], "Docs");
    assert_eq!(item["type"], "embed");

    let (_, target) = send(&state, Method::GET, &format!("/api/workspaces/{}/launch", id), None).await;
    assert_eq!(target["kind"], "embed");
    assert_eq!(target["route"], format!("/embed/{}", id));

    let (_, list) = send(&state, Method::GET, "/api/workspaces", None).await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_workspace_errors_map_to_statuses() {
    let state = test_state().await;

    let (status, body) = send(
        &state,
        Method::POST,
        "/api/workspaces",
        Some(json!({ "title": "Docs", "type": "external" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("URL"));

    let (status, _) = send(
        &state,
        Method::PATCH,
        "/api/workspaces/missing",
        Some(json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&state, Method::DELETE, "/api/workspaces/any?policy=purge", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_policies_over_http() {
    let state = test_state().await;
    let (_, folder) = send(
        &state,
        Method::POST,
        "/api/workspaces",
        Some(json!({ "title": "Folder", "type": "nested" })),
    )
    .await;
    let folder = folder["id"].as_str().unwrap().to_string();
    send(
        &state,
        Method::POST,
        "/api/workspaces",
        Some(json!({ "title": "Docs", "type": "external", "url": "https://docs.rs", "parentId": folder })),
    )
    .await;

    let (status, _) = send(
        &state,
        Method::DELETE,
        &format!("/api/workspaces/{}?policy=reject", folder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &state,
        Method::DELETE,
        &format!("/api/workspaces/{}?policy=cascade", folder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"].as_array().unwrap().len(), 2);

    eventually(|| state.workspace_store.items().is_empty()).await;
}

#[tokio::test]
async fn test_task_progress_and_time() {
    let state = test_state().await;
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/tasks",
        Some(json!({ "title": "Write spec", "estimatedCompletionTime": "2025-01-01T10:00", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();

    let (_, task) = send(
        &state,
        Method::POST,
        &format!("/api/tasks/{}/advance", id),
        None,
    )
    .await;
    assert_eq!(task["progress"], 25);
    assert_eq!(task["status"], "in-progress");

    let (_, task) = send(
        &state,
        Method::POST,
        &format!("/api/tasks/{}/progress", id),
        Some(json!({ "progress": 100 })),
    )
    .await;
    assert_eq!(task["status"], "completed");

    let (status, _) = send(
        &state,
        Method::POST,
        &format!("/api/tasks/{}/progress", id),
        Some(json!({ "progress": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, logged) = send(
        &state,
        Method::POST,
        &format!("/api/tasks/{}/time", id),
        Some(json!({ "minutes": 45 })),
    )
    .await;
    assert_eq!(logged["timeSpent"], 45);
    assert_eq!(logged["display"], "45m");

    eventually(|| state.task_store.summary().completed == 1).await;
    let (_, summary) = send(&state, Method::GET, "/api/tasks/summary", None).await;
    assert_eq!(summary["completed"], 1);
    assert_eq!(summary["timeSpent"], 45);

    let (_, filtered) = send(&state, Method::GET, "/api/tasks?status=todo", None).await;
    assert!(filtered["tasks"].as_array().unwrap().is_empty());
    let (status, _) = send(&state, Method::GET, "/api/tasks?status=done", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rpc_endpoint() {
    let state = test_state().await;
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/rpc",
        Some(json!({ "jsonrpc": "2.0", "id": 1, "method": "tasks.summary" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["total"], 0);

    let (_, methods) = send(&state, Method::GET, "/api/rpc/methods", None).await;
    assert!(methods["methods"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m == "workspaces.tree"));
}
