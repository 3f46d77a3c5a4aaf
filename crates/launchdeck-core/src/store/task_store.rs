use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;

use super::logged;
use super::replica::{Record, Replica, ReplicaState};
use crate::collection::RemoteCollection;
use crate::error::StoreError;
use crate::models::{diff_records, NewTask, Task, TaskFilter, TaskPatch, TaskSummary, TIME_SPENT_FIELD};

impl Record for Task {
    const KIND: &'static str = "task";

    fn decode(id: &str, value: &Value) -> Result<Self, serde_json::Error> {
        Task::from_record(id, value)
    }

    fn id(&self) -> &str {
        &self.id
    }

    /// Newest first, ties broken by key.
    fn order(a: &Self, b: &Self) -> Ordering {
        b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id))
    }
}

/// Tasks backed by the `tasks` collection.
pub struct TaskStore {
    collection: Arc<dyn RemoteCollection>,
    replica: Replica<Task>,
}

impl TaskStore {
    pub fn new(collection: Arc<dyn RemoteCollection>) -> Self {
        Self {
            replica: Replica::new(collection.clone()),
            collection,
        }
    }

    pub fn start(&self) -> Result<(), StoreError> {
        self.replica.start()
    }

    pub fn stop(&self) {
        self.replica.stop()
    }

    pub fn tasks(&self) -> Arc<Vec<Task>> {
        self.replica.items()
    }

    pub fn is_loading(&self) -> bool {
        self.replica.is_loading()
    }

    pub fn watch(&self) -> watch::Receiver<ReplicaState<Task>> {
        self.replica.watch()
    }

    pub async fn wait_until_loaded(&self) -> Result<Arc<Vec<Task>>, StoreError> {
        self.replica.wait_until_loaded().await
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.replica.get(id)
    }

    pub fn tasks_with_status(&self, filter: TaskFilter) -> Vec<Task> {
        self.tasks()
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary::from_tasks(self.tasks().iter())
    }

    pub async fn add_task(&self, new_task: NewTask) -> Result<String, StoreError> {
        new_task.validate()?;
        let task = new_task.into_task(Utc::now());
        let record = task.to_record()?;
        let id = logged("Adding task", self.collection.push(Value::Object(record)).await)?;
        tracing::debug!("Added task '{}' ({})", task.title, id);
        Ok(id)
    }

    /// Apply a validated patch to the canonical record. Writing `progress`
    /// also writes the status derived from it.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        patch.validate()?;
        let current = self.fetch(id).await?;
        let updated = patch.apply(&current);

        let fields = diff_records(&current.to_record()?, &updated.to_record()?);
        if fields.is_empty() {
            return Ok(current);
        }
        let changed: Vec<&String> = fields.keys().collect();
        tracing::debug!("Updating task {} ({:?})", id, changed);

        let merged = logged("Updating task", self.collection.patch(id, fields).await)?;
        Ok(Task::from_record(id, &merged)?)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        logged("Deleting task", self.collection.remove(id).await)?;
        tracing::debug!("Deleted task {}", id);
        Ok(())
    }

    pub async fn update_progress(&self, id: &str, progress: u8) -> Result<Task, StoreError> {
        self.update_task(id, TaskPatch::progress(progress)).await
    }

    /// Bump progress by `step` percent, capped at 100.
    pub async fn advance_progress(&self, id: &str, step: u8) -> Result<Task, StoreError> {
        let current = self.fetch(id).await?;
        let next = current.progress.saturating_add(step).min(100);
        self.update_progress(id, next).await
    }

    /// Add minutes to `timeSpent` with an atomic increment on the collection
    /// and return the new total.
    pub async fn add_time_spent(&self, id: &str, minutes: u32) -> Result<u64, StoreError> {
        let total = logged(
            "Logging time",
            self.collection
                .increment(id, TIME_SPENT_FIELD, i64::from(minutes))
                .await,
        )?;
        tracing::debug!("Logged {}m on task {} (total {}m)", minutes, id, total);
        u64::try_from(total)
            .map_err(|_| StoreError::Remote(format!("Task {} has a negative timeSpent", id)))
    }

    async fn fetch(&self, id: &str) -> Result<Task, StoreError> {
        let raw = logged("Fetching task", self.collection.get(id).await)?
            .ok_or_else(|| StoreError::NotFound(format!("Task {} not found", id)))?;
        Ok(Task::from_record(id, &raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{MemoryCollection, SqliteCollection};
    use crate::db::Database;
    use crate::models::{TaskPriority, TaskStatus};
    use crate::store::testing::{wait_for, FailingCollection};

    async fn started() -> (Arc<MemoryCollection>, TaskStore) {
        let collection = Arc::new(MemoryCollection::new("tasks"));
        let store = TaskStore::new(collection.clone());
        store.start().unwrap();
        store.wait_until_loaded().await.unwrap();
        (collection, store)
    }

    fn write_spec() -> NewTask {
        NewTask::new("Write spec", "2025-01-01T10:00", TaskPriority::High)
    }

    #[tokio::test]
    async fn test_progress_to_100_completes_task() {
        let (_collection, store) = started().await;
        let mut rx = store.watch();
        let id = store.add_task(write_spec()).await.unwrap();

        let state = wait_for(&mut rx, |s| s.items.len() == 1).await;
        assert_eq!(state.items[0].status, TaskStatus::Todo);
        assert_eq!(state.items[0].progress, 0);
        assert_eq!(state.items[0].time_spent, 0);

        let task = store.update_progress(&id, 100).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        let state = wait_for(&mut rx, |s| s.items.first().is_some_and(|t| t.progress == 100)).await;
        assert_eq!(state.items[0].status, TaskStatus::Completed);
        assert_eq!(store.summary().completed, 1);
        assert_eq!(store.tasks_with_status(TaskFilter::Completed).len(), 1);
        assert!(store.tasks_with_status(TaskFilter::Todo).is_empty());
    }

    #[tokio::test]
    async fn test_progress_above_100_is_rejected() {
        let (collection, store) = started().await;
        let id = store.add_task(write_spec()).await.unwrap();
        assert!(matches!(store.update_progress(&id, 101).await, Err(StoreError::BadRequest(_))));
        assert_eq!(collection.get(&id).await.unwrap().unwrap()["progress"], 0);
    }

    #[tokio::test]
    async fn test_add_task_rejects_inconsistent_status() {
        let (collection, store) = started().await;
        let mut task = write_spec();
        task.progress = 30;
        assert!(matches!(store.add_task(task).await, Err(StoreError::BadRequest(_))));
        assert!(collection.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_advance_progress_caps_at_100() {
        let (_collection, store) = started().await;
        let id = store.add_task(write_spec()).await.unwrap();

        let task = store.advance_progress(&id, 25).await.unwrap();
        assert_eq!((task.progress, task.status), (25, TaskStatus::InProgress));
        store.update_progress(&id, 90).await.unwrap();
        let task = store.advance_progress(&id, 25).await.unwrap();
        assert_eq!((task.progress, task.status), (100, TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_found() {
        let (_collection, store) = started().await;
        assert!(matches!(
            store.update_task("missing", TaskPatch::progress(10)).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.add_time_spent("missing", 10).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_task_keeps_other_fields() {
        let (collection, store) = started().await;
        let id = store
            .add_task(write_spec().with_description("first draft"))
            .await
            .unwrap();
        let before = collection.get(&id).await.unwrap().unwrap();

        let patch = TaskPatch {
            priority: Some(TaskPriority::Low),
            ..Default::default()
        };
        let task = store.update_task(&id, patch).await.unwrap();
        assert_eq!(task.priority, TaskPriority::Low);
        assert_eq!(task.description, "first draft");

        let after = collection.get(&id).await.unwrap().unwrap();
        assert_eq!(after["createdAt"], before["createdAt"]);
        assert_eq!(after["status"], "todo");
    }

    #[tokio::test]
    async fn test_sequential_time_is_additive() {
        let (_collection, store) = started().await;
        let id = store.add_task(write_spec()).await.unwrap();
        assert_eq!(store.add_time_spent(&id, 30).await.unwrap(), 30);
        assert_eq!(store.add_time_spent(&id, 15).await.unwrap(), 45);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_time_is_not_lost() {
        let (collection, store) = started().await;
        let store = Arc::new(store);
        let id = store.add_task(write_spec()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { store.add_time_spent(&id, 5).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(collection.get(&id).await.unwrap().unwrap()["timeSpent"], 100);
    }

    #[tokio::test]
    async fn test_concurrent_time_on_sqlite() {
        let db = Database::open_in_memory().unwrap();
        let store = Arc::new(TaskStore::new(Arc::new(SqliteCollection::open(db, "tasks").unwrap())));
        store.start().unwrap();
        let id = store.add_task(write_spec()).await.unwrap();

        let (a, b) = tokio::join!(store.add_time_spent(&id, 30), store.add_time_spent(&id, 15));
        a.unwrap();
        b.unwrap();
        assert_eq!(store.add_time_spent(&id, 0).await.unwrap(), 45);
    }

    #[tokio::test]
    async fn test_tasks_are_ordered_newest_first() {
        let (_collection, store) = started().await;
        let mut rx = store.watch();
        let older = store.add_task(write_spec()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = store
            .add_task(NewTask::new("Review", "2025-01-02T09:00", TaskPriority::Low))
            .await
            .unwrap();

        let state = wait_for(&mut rx, |s| s.items.len() == 2).await;
        assert_eq!(state.items[0].id, newer);
        assert_eq!(state.items[1].id, older);
    }

    #[tokio::test]
    async fn test_delete_task() {
        let (_collection, store) = started().await;
        let mut rx = store.watch();
        let id = store.add_task(write_spec()).await.unwrap();
        wait_for(&mut rx, |s| s.items.len() == 1).await;

        store.delete_task(&id).await.unwrap();
        wait_for(&mut rx, |s| s.items.is_empty()).await;
        assert!(store.get_task(&id).is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let store = TaskStore::new(Arc::new(FailingCollection::new()));
        store.start().unwrap();
        store.wait_until_loaded().await.unwrap();

        assert!(matches!(store.add_task(write_spec()).await, Err(StoreError::Remote(_))));
        assert!(matches!(store.add_time_spent("x", 5).await, Err(StoreError::Remote(_))));
        assert!(store.tasks().is_empty());
        assert_eq!(store.summary(), TaskSummary::default());
    }
}
