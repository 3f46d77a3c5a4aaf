//! `launchdeck workspace` - Dashboard item commands.

use launchdeck_core::state::AppState;
use serde_json::{json, Map, Value};

use super::{call, confirm, print_json};

#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    pub title: String,
    /// `external`, `embed` or `nested`
    pub item_type: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent: Option<String>,
}

/// Fields left as `None` are not touched. `parent: Some("none")` moves the
/// item to the top level.
#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    pub title: Option<String>,
    pub item_type: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent: Option<String>,
}

pub async fn list(state: &AppState, top_level: bool) -> Result<Value, String> {
    let method = if top_level {
        "workspaces.topLevel"
    } else {
        "workspaces.list"
    };
    let result = call(state, method, json!({})).await?;
    print_json(&result);
    Ok(result)
}

pub async fn create(state: &AppState, args: CreateArgs) -> Result<Value, String> {
    let mut params = json!({
        "title": args.title,
        "type": args.item_type,
    });
    let optional = [
        ("url", args.url),
        ("description", args.description),
        ("icon", args.icon),
        ("color", args.color),
        ("parentId", args.parent),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            params[key] = json!(value);
        }
    }

    let result = call(state, "workspaces.create", params).await?;
    print_json(&result);
    Ok(result)
}

pub async fn update(state: &AppState, id: &str, args: UpdateArgs) -> Result<Value, String> {
    let mut patch = Map::new();
    let fields = [
        ("title", args.title),
        ("type", args.item_type),
        ("url", args.url),
        ("description", args.description),
        ("icon", args.icon),
        ("color", args.color),
        ("parentId", args.parent),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            patch.insert(key.to_string(), json!(value));
        }
    }
    if patch.is_empty() {
        return Err("Nothing to update".into());
    }

    let result = call(
        state,
        "workspaces.update",
        json!({ "id": id, "patch": Value::Object(patch) }),
    )
    .await?;
    print_json(&result);
    Ok(result)
}

pub async fn delete(state: &AppState, id: &str, policy: &str, yes: bool) -> Result<Value, String> {
    let title = state
        .workspace_store
        .get_item(id)
        .map(|item| item.title)
        .unwrap_or_else(|| id.to_string());
    if !confirm(&format!("Delete '{}' ({})?", title, policy), yes)? {
        return Ok(Value::Null);
    }

    let result = call(state, "workspaces.delete", json!({ "id": id, "policy": policy })).await?;
    print_json(&result);
    Ok(result)
}

pub async fn children(state: &AppState, id: &str) -> Result<Value, String> {
    let result = call(state, "workspaces.children", json!({ "id": id })).await?;
    print_json(&result);
    Ok(result)
}

pub async fn tree(state: &AppState) -> Result<Value, String> {
    let result = call(state, "workspaces.tree", json!({})).await?;
    print_json(&result);
    Ok(result)
}

/// Print where activating the item leads.
pub async fn open(state: &AppState, id: &str) -> Result<Value, String> {
    let result = call(state, "workspaces.launch", json!({ "id": id })).await?;
    print_json(&result);
    Ok(result)
}
