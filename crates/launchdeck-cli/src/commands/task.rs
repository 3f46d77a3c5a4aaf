//! `launchdeck task` - Task commands.

use launchdeck_core::models::format_minutes;
use launchdeck_core::state::AppState;
use serde_json::{json, Map, Value};

use super::{call, confirm, print_json};

#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<String>,
    pub priority: Option<String>,
}

pub async fn list(state: &AppState, status: Option<&str>) -> Result<Value, String> {
    let params = match status {
        Some(status) => json!({ "status": status }),
        None => json!({}),
    };
    let result = call(state, "tasks.list", params).await?;
    print_json(&result);
    Ok(result)
}

pub async fn create(
    state: &AppState,
    title: &str,
    due: &str,
    priority: &str,
    description: Option<&str>,
) -> Result<Value, String> {
    let mut params = json!({
        "title": title,
        "estimatedCompletionTime": due,
        "priority": priority,
    });
    if let Some(description) = description {
        params["description"] = json!(description);
    }
    let result = call(state, "tasks.create", params).await?;
    print_json(&result);
    Ok(result)
}

pub async fn update(state: &AppState, id: &str, args: UpdateArgs) -> Result<Value, String> {
    let mut patch = Map::new();
    let fields = [
        ("title", args.title),
        ("description", args.description),
        ("estimatedCompletionTime", args.due),
        ("priority", args.priority),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            patch.insert(key.to_string(), json!(value));
        }
    }
    if patch.is_empty() {
        return Err("Nothing to update".into());
    }

    let result = call(state, "tasks.update", json!({ "id": id, "patch": Value::Object(patch) })).await?;
    print_json(&result);
    Ok(result)
}

pub async fn progress(state: &AppState, id: &str, value: u8) -> Result<Value, String> {
    let result = call(
        state,
        "tasks.updateProgress",
        json!({ "id": id, "progress": value }),
    )
    .await?;
    print_json(&result);
    Ok(result)
}

pub async fn advance(state: &AppState, id: &str, step: Option<u8>) -> Result<Value, String> {
    let params = match step {
        Some(step) => json!({ "id": id, "step": step }),
        None => json!({ "id": id }),
    };
    let result = call(state, "tasks.advanceProgress", params).await?;
    print_json(&result);
    Ok(result)
}

pub async fn log_time(state: &AppState, id: &str, minutes: u32) -> Result<Value, String> {
    let result = call(state, "tasks.addTime", json!({ "id": id, "minutes": minutes })).await?;
    println!(
        "Logged {} on {} (total {})",
        format_minutes(u64::from(minutes)),
        id,
        result["display"].as_str().unwrap_or("?")
    );
    Ok(result)
}

pub async fn delete(state: &AppState, id: &str, yes: bool) -> Result<Value, String> {
    let title = state
        .task_store
        .get_task(id)
        .map(|task| task.title)
        .unwrap_or_else(|| id.to_string());
    if !confirm(&format!("Delete task '{}'?", title), yes)? {
        return Ok(Value::Null);
    }

    let result = call(state, "tasks.delete", json!({ "id": id })).await?;
    print_json(&result);
    Ok(result)
}

pub async fn summary(state: &AppState) -> Result<Value, String> {
    let result = call(state, "tasks.summary", json!({})).await?;
    let count = |key: &str| result[key].as_u64().unwrap_or(0);
    println!(
        "{} tasks: {} todo, {} in progress, {} completed ({} logged)",
        count("total"),
        count("todo"),
        count("inProgress"),
        count("completed"),
        format_minutes(count("timeSpent"))
    );
    Ok(result)
}
