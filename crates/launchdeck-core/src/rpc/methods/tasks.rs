//! RPC methods for tasks.
//!
//! Methods:
//! - `tasks.list`            - tasks, newest first, optionally by status
//! - `tasks.get`             - one task from the local replica
//! - `tasks.create`          - create a task
//! - `tasks.update`          - apply a typed patch
//! - `tasks.delete`          - delete a task
//! - `tasks.updateProgress`  - set progress (status follows)
//! - `tasks.advanceProgress` - bump progress by a step, capped at 100
//! - `tasks.addTime`         - add minutes to `timeSpent`
//! - `tasks.summary`         - per-status counts

use serde::{Deserialize, Serialize};

use crate::models::{
    format_minutes, NewTask, Task, TaskFilter, TaskPatch, TaskSummary, DEFAULT_PROGRESS_STEP,
};
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// tasks.list
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub tasks: Vec<Task>,
}

pub async fn list(state: &AppState, params: ListParams) -> Result<ListResult, RpcError> {
    let filter = match &params.status {
        Some(status) => TaskFilter::from_str(status)
            .ok_or_else(|| RpcError::BadRequest(format!("Invalid status: {}", status)))?,
        None => TaskFilter::All,
    };
    Ok(ListResult {
        tasks: state.task_store.tasks_with_status(filter),
    })
}

// ---------------------------------------------------------------------------
// tasks.get
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    pub id: String,
}

pub async fn get(state: &AppState, params: IdParams) -> Result<Task, RpcError> {
    state
        .task_store
        .get_task(&params.id)
        .ok_or_else(|| RpcError::NotFound(format!("Task {} not found", params.id)))
}

// ---------------------------------------------------------------------------
// tasks.create
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CreateResult {
    pub id: String,
}

pub async fn create(state: &AppState, params: NewTask) -> Result<CreateResult, RpcError> {
    let id = state.task_store.add_task(params).await?;
    Ok(CreateResult { id })
}

// ---------------------------------------------------------------------------
// tasks.update
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub id: String,
    pub patch: TaskPatch,
}

pub async fn update(state: &AppState, params: UpdateParams) -> Result<Task, RpcError> {
    Ok(state.task_store.update_task(&params.id, params.patch).await?)
}

// ---------------------------------------------------------------------------
// tasks.delete
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: bool,
}

pub async fn delete(state: &AppState, params: IdParams) -> Result<DeleteResult, RpcError> {
    state.task_store.delete_task(&params.id).await?;
    Ok(DeleteResult { deleted: true })
}

// ---------------------------------------------------------------------------
// tasks.updateProgress / tasks.advanceProgress
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressParams {
    pub id: String,
    pub progress: u8,
}

pub async fn update_progress(state: &AppState, params: UpdateProgressParams) -> Result<Task, RpcError> {
    Ok(state
        .task_store
        .update_progress(&params.id, params.progress)
        .await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceProgressParams {
    pub id: String,
    #[serde(default = "default_step")]
    pub step: u8,
}

fn default_step() -> u8 {
    DEFAULT_PROGRESS_STEP
}

pub async fn advance_progress(state: &AppState, params: AdvanceProgressParams) -> Result<Task, RpcError> {
    Ok(state
        .task_store
        .advance_progress(&params.id, params.step)
        .await?)
}

// ---------------------------------------------------------------------------
// tasks.addTime
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTimeParams {
    pub id: String,
    pub minutes: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTimeResult {
    pub id: String,
    pub time_spent: u64,
    pub display: String,
}

pub async fn add_time(state: &AppState, params: AddTimeParams) -> Result<AddTimeResult, RpcError> {
    let time_spent = state
        .task_store
        .add_time_spent(&params.id, params.minutes)
        .await?;
    Ok(AddTimeResult {
        id: params.id,
        time_spent,
        display: format_minutes(time_spent),
    })
}

// ---------------------------------------------------------------------------
// tasks.summary
// ---------------------------------------------------------------------------

pub async fn summary(state: &AppState) -> Result<TaskSummary, RpcError> {
    Ok(state.task_store.summary())
}
