//! Workspace item routes.
//!
//! GET    /api/workspaces             - all items, oldest first
//! POST   /api/workspaces             - create an item
//! GET    /api/workspaces/top-level   - items without a parent
//! GET    /api/workspaces/tree        - folder tree with orphans
//! GET    /api/workspaces/stream      - SSE stream of the replica
//! GET    /api/workspaces/{id}        - one item
//! PATCH  /api/workspaces/{id}        - apply a typed patch
//! DELETE /api/workspaces/{id}        - delete (`?policy=orphan|reject|cascade`)
//! GET    /api/workspaces/{id}/children
//! GET    /api/workspaces/{id}/launch

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt as _};

use launchdeck_core::models::{LaunchTarget, NewWorkspaceItem, WorkspaceItem, WorkspaceItemPatch};
use launchdeck_core::state::AppState;
use launchdeck_core::store::DeletePolicy;
use launchdeck_core::tree::WorkspaceTree;
use launchdeck_core::StoreError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/top-level", get(top_level_items))
        .route("/tree", get(tree))
        .route("/stream", get(stream_items))
        .route("/{id}", get(get_item).patch(update_item).delete(delete_item))
        .route("/{id}/children", get(children))
        .route("/{id}/launch", get(launch))
}

async fn list_items(State(state): State<AppState>) -> Json<serde_json::Value> {
    let items = state.workspace_store.items();
    Json(serde_json::json!({ "items": &*items }))
}

async fn create_item(
    State(state): State<AppState>,
    Json(body): Json<NewWorkspaceItem>,
) -> Result<Json<serde_json::Value>, StoreError> {
    let id = state.workspace_store.add_item(body).await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

async fn top_level_items(State(state): State<AppState>) -> Json<serde_json::Value> {
    let items = state.workspace_store.top_level_items();
    Json(serde_json::json!({ "items": items }))
}

async fn tree(State(state): State<AppState>) -> Json<WorkspaceTree> {
    Json(state.workspace_store.tree())
}

/// Pushes the full item list each time the replica is replaced.
async fn stream_items(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.workspace_store.watch())
        .filter(|replica| !replica.loading)
        .map(|replica| Event::default().event("workspaces").json_data(&*replica.items));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceItem>, StoreError> {
    state
        .workspace_store
        .get_item(&id)
        .map(Json)
        .ok_or_else(|| StoreError::NotFound(format!("Workspace item {} not found", id)))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<WorkspaceItemPatch>,
) -> Result<Json<WorkspaceItem>, StoreError> {
    let item = state.workspace_store.update_item(&id, patch).await?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    policy: Option<String>,
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, StoreError> {
    let policy = match query.policy.as_deref() {
        Some(raw) => DeletePolicy::from_str(raw)
            .ok_or_else(|| StoreError::BadRequest(format!("Invalid delete policy: {}", raw)))?,
        None => DeletePolicy::default(),
    };
    let deleted = state.workspace_store.delete_item_with(&id, policy).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    let items = state.workspace_store.children_of(&id);
    Json(serde_json::json!({ "items": items }))
}

async fn launch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LaunchTarget>, StoreError> {
    state
        .workspace_store
        .get_item(&id)
        .map(|item| Json(item.launch_target()))
        .ok_or_else(|| StoreError::NotFound(format!("Workspace item {} not found", id)))
}
