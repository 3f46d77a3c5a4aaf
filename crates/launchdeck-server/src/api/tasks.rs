use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt as _};

use launchdeck_core::models::{
    format_minutes, NewTask, Task, TaskFilter, TaskPatch, TaskSummary, DEFAULT_PROGRESS_STEP,
};
use launchdeck_core::state::AppState;
use launchdeck_core::StoreError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/summary", get(summary))
        .route("/stream", get(stream_tasks))
        .route("/{id}", get(get_task).patch(update_task).delete(delete_task))
        .route("/{id}/progress", post(update_progress))
        .route("/{id}/advance", post(advance_progress))
        .route("/{id}/time", post(add_time))
}

#[derive(Debug, Deserialize)]
struct ListTasksQuery {
    status: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<serde_json::Value>, StoreError> {
    let filter = match query.status.as_deref() {
        Some(raw) => TaskFilter::from_str(raw)
            .ok_or_else(|| StoreError::BadRequest(format!("Invalid status: {}", raw)))?,
        None => TaskFilter::All,
    };
    let tasks = state.task_store.tasks_with_status(filter);
    Ok(Json(serde_json::json!({ "tasks": tasks })))
}

async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<NewTask>,
) -> Result<Json<serde_json::Value>, StoreError> {
    let id = state.task_store.add_task(body).await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

async fn summary(State(state): State<AppState>) -> Json<TaskSummary> {
    Json(state.task_store.summary())
}

async fn stream_tasks(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.task_store.watch())
        .filter(|replica| !replica.loading)
        .map(|replica| Event::default().event("tasks").json_data(&*replica.items));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, StoreError> {
    state
        .task_store
        .get_task(&id)
        .map(Json)
        .ok_or_else(|| StoreError::NotFound(format!("Task {} not found", id)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, StoreError> {
    Ok(Json(state.task_store.update_task(&id, patch).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StoreError> {
    state.task_store.delete_task(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct ProgressRequest {
    progress: u8,
}

async fn update_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<Task>, StoreError> {
    Ok(Json(state.task_store.update_progress(&id, body.progress).await?))
}

#[derive(Debug, Deserialize)]
struct AdvanceQuery {
    step: Option<u8>,
}

async fn advance_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AdvanceQuery>,
) -> Result<Json<Task>, StoreError> {
    let step = query.step.unwrap_or(DEFAULT_PROGRESS_STEP);
    Ok(Json(state.task_store.advance_progress(&id, step).await?))
}

#[derive(Debug, Deserialize)]
struct AddTimeRequest {
    minutes: u32,
}

async fn add_time(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddTimeRequest>,
) -> Result<Json<serde_json::Value>, StoreError> {
    let total = state.task_store.add_time_spent(&id, body.minutes).await?;
    Ok(Json(serde_json::json!({
        "id": id,
        "timeSpent": total,
        "display": format_minutes(total),
    })))
}
