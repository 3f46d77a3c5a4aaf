use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Name of the additive minutes counter inside a task record.
pub const TIME_SPENT_FIELD: &str = "timeSpent";

/// Step of the "+25%" quick action.
pub const DEFAULT_PROGRESS_STEP: u8 = 25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// `0 → todo`, `1..=99 → in-progress`, `100 → completed`.
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => Self::Todo,
            100..=u8::MAX => Self::Completed,
            _ => Self::InProgress,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub estimated_completion_time: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub time_spent: u64,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Decode a record read from the `tasks` collection.
    pub fn from_record(id: &str, value: &Value) -> Result<Self, serde_json::Error> {
        let mut task: Task = serde_json::from_value(value.clone())?;
        task.id = id.to_string();
        Ok(task)
    }

    pub fn to_record(&self) -> Result<Map<String, Value>, serde_json::Error> {
        super::to_record(self)
    }

    pub fn due_at(&self) -> Option<NaiveDateTime> {
        parse_due(&self.estimated_completion_time)
    }

    pub fn time_spent_display(&self) -> String {
        format_minutes(self.time_spent)
    }
}

/// A task as submitted for creation.
///
/// The caller supplies the starting `progress`, `timeSpent` and `status`;
/// [`NewTask::new`] fills in the usual `0 / 0 / todo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub estimated_completion_time: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
}

fn default_status() -> TaskStatus {
    TaskStatus::Todo
}

impl NewTask {
    pub fn new(
        title: impl Into<String>,
        estimated_completion_time: impl Into<String>,
        priority: TaskPriority,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            estimated_completion_time: estimated_completion_time.into(),
            priority,
            progress: 0,
            time_spent: 0,
            status: TaskStatus::Todo,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_title(&self.title)?;
        validate_due(&self.estimated_completion_time)?;
        validate_progress(self.progress)?;
        let derived = TaskStatus::from_progress(self.progress);
        if self.status != derived {
            return Err(StoreError::BadRequest(format!(
                "Status '{}' does not match progress {}% (expected '{}')",
                self.status.as_str(),
                self.progress,
                derived.as_str()
            )));
        }
        Ok(())
    }

    pub fn into_task(self, created_at: DateTime<Utc>) -> Task {
        Task {
            id: String::new(),
            title: self.title,
            description: self.description,
            estimated_completion_time: self.estimated_completion_time,
            progress: self.progress,
            time_spent: self.time_spent,
            status: self.status,
            priority: self.priority,
            created_at,
        }
    }
}

/// Typed partial update for a task.
///
/// No `status` or `timeSpent` field: status follows `progress`, and time
/// only grows through `TaskStore::add_time_spent`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_completion_time: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub progress: Option<u8>,
}

impl TaskPatch {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(due) = &self.estimated_completion_time {
            validate_due(due)?;
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }

    pub fn apply(&self, task: &Task) -> Task {
        let mut updated = task.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(due) = &self.estimated_completion_time {
            updated.estimated_completion_time = due.clone();
        }
        if let Some(priority) = self.priority {
            updated.priority = priority;
        }
        if let Some(progress) = self.progress {
            updated.progress = progress;
            updated.status = TaskStatus::from_progress(progress);
        }
        updated
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskFilter {
    #[default]
    All,
    Todo,
    InProgress,
    Completed,
}

impl TaskFilter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            other => TaskStatus::from_str(other).map(Self::from),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Todo => task.status == TaskStatus::Todo,
            Self::InProgress => task.status == TaskStatus::InProgress,
            Self::Completed => task.status == TaskStatus::Completed,
        }
    }
}

impl From<TaskStatus> for TaskFilter {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Todo => Self::Todo,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Completed => Self::Completed,
        }
    }
}

/// Per-status counts shown next to the task filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub time_spent: u64,
}

impl TaskSummary {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut summary = Self::default();
        for task in tasks {
            summary.total += 1;
            summary.time_spent += task.time_spent;
            match task.status {
                TaskStatus::Todo => summary.todo += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Completed => summary.completed += 1,
            }
        }
        summary
    }
}

/// `125 → "2h 5m"`, `45 → "45m"`.
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Accepts the `datetime-local` form (`2025-01-01T10:00`, optionally with
/// seconds) as well as full RFC 3339 timestamps.
pub fn parse_due(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::BadRequest("Title is required".into()));
    }
    Ok(())
}

fn validate_due(raw: &str) -> Result<(), StoreError> {
    if parse_due(raw).is_none() {
        return Err(StoreError::BadRequest(format!(
            "Invalid estimated completion time: '{}'",
            raw
        )));
    }
    Ok(())
}

fn validate_progress(progress: u8) -> Result<(), StoreError> {
    if progress > 100 {
        return Err(StoreError::BadRequest(format!(
            "Progress must be between 0 and 100, got {}",
            progress
        )));
    }
    Ok(())
}
