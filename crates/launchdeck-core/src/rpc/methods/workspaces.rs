//! RPC methods for workspace items.
//!
//! Methods:
//! - `workspaces.list`     - all items, oldest first
//! - `workspaces.get`      - one item from the local replica
//! - `workspaces.create`   - create an item
//! - `workspaces.update`   - apply a typed patch
//! - `workspaces.delete`   - delete under a policy (default `orphan`)
//! - `workspaces.children` - items inside a nested item
//! - `workspaces.topLevel` - items without a parent
//! - `workspaces.tree`     - folder tree with orphans
//! - `workspaces.launch`   - where activating an item leads

use serde::{Deserialize, Serialize};

use crate::models::{LaunchTarget, NewWorkspaceItem, WorkspaceItem, WorkspaceItemPatch};
use crate::rpc::error::RpcError;
use crate::state::AppState;
use crate::store::DeletePolicy;
use crate::tree::WorkspaceTree;

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub items: Vec<WorkspaceItem>,
}

pub async fn list(state: &AppState) -> Result<ListResult, RpcError> {
    Ok(ListResult {
        items: state.workspace_store.items().to_vec(),
    })
}

// ---------------------------------------------------------------------------
// workspaces.get / workspaces.launch
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    pub id: String,
}

pub async fn get(state: &AppState, params: IdParams) -> Result<WorkspaceItem, RpcError> {
    state
        .workspace_store
        .get_item(&params.id)
        .ok_or_else(|| RpcError::NotFound(format!("Workspace item {} not found", params.id)))
}

pub async fn launch(state: &AppState, params: IdParams) -> Result<LaunchTarget, RpcError> {
    let item = get(state, params).await?;
    Ok(item.launch_target())
}

// ---------------------------------------------------------------------------
// workspaces.create
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CreateResult {
    pub id: String,
}

pub async fn create(state: &AppState, params: NewWorkspaceItem) -> Result<CreateResult, RpcError> {
    let id = state.workspace_store.add_item(params).await?;
    Ok(CreateResult { id })
}

// ---------------------------------------------------------------------------
// workspaces.update
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub id: String,
    pub patch: WorkspaceItemPatch,
}

pub async fn update(state: &AppState, params: UpdateParams) -> Result<WorkspaceItem, RpcError> {
    Ok(state
        .workspace_store
        .update_item(&params.id, params.patch)
        .await?)
}

// ---------------------------------------------------------------------------
// workspaces.delete
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub id: String,
    #[serde(default)]
    pub policy: DeletePolicy,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: Vec<String>,
}

pub async fn delete(state: &AppState, params: DeleteParams) -> Result<DeleteResult, RpcError> {
    let deleted = state
        .workspace_store
        .delete_item_with(&params.id, params.policy)
        .await?;
    Ok(DeleteResult { deleted })
}

// ---------------------------------------------------------------------------
// workspaces.children / workspaces.topLevel / workspaces.tree
// ---------------------------------------------------------------------------

pub async fn children(state: &AppState, params: IdParams) -> Result<ListResult, RpcError> {
    Ok(ListResult {
        items: state.workspace_store.children_of(&params.id),
    })
}

pub async fn top_level(state: &AppState) -> Result<ListResult, RpcError> {
    Ok(ListResult {
        items: state.workspace_store.top_level_items(),
    })
}

pub async fn tree(state: &AppState) -> Result<WorkspaceTree, RpcError> {
    Ok(state.workspace_store.tree())
}
