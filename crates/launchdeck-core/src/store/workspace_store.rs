use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use super::replica::{project, Record, Replica, ReplicaState};
use super::logged;
use crate::collection::RemoteCollection;
use crate::error::StoreError;
use crate::models::{diff_records, ItemType, NewWorkspaceItem, WorkspaceItem, WorkspaceItemPatch};
use crate::tree::{descendants, WorkspaceTree};

impl Record for WorkspaceItem {
    const KIND: &'static str = "workspace item";

    fn decode(id: &str, value: &Value) -> Result<Self, serde_json::Error> {
        WorkspaceItem::from_record(id, value)
    }

    fn id(&self) -> &str {
        &self.id
    }

    /// Oldest first, ties broken by key.
    fn order(a: &Self, b: &Self) -> Ordering {
        a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
    }
}

/// What happens to the children of a deleted item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete only the item; children keep a dangling `parentId`.
    #[default]
    Orphan,
    /// Refuse to delete an item that still has children.
    Reject,
    /// Delete the item and everything below it.
    Cascade,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orphan => "orphan",
            Self::Reject => "reject",
            Self::Cascade => "cascade",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "orphan" => Some(Self::Orphan),
            "reject" => Some(Self::Reject),
            "cascade" => Some(Self::Cascade),
            _ => None,
        }
    }
}

/// Dashboard items backed by the `workspaces` collection.
///
/// Reads come from the local replica; writes go straight to the collection
/// and show up in the replica once the collection publishes them.
pub struct WorkspaceStore {
    collection: Arc<dyn RemoteCollection>,
    replica: Replica<WorkspaceItem>,
}

impl WorkspaceStore {
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

    pub fn items(&self) -> Arc<Vec<WorkspaceItem>> {
        self.replica.items()
    }

    pub fn is_loading(&self) -> bool {
        self.replica.is_loading()
    }

    pub fn watch(&self) -> watch::Receiver<ReplicaState<WorkspaceItem>> {
        self.replica.watch()
    }

    pub async fn wait_until_loaded(&self) -> Result<Arc<Vec<WorkspaceItem>>, StoreError> {
        self.replica.wait_until_loaded().await
    }

    pub fn get_item(&self, id: &str) -> Option<WorkspaceItem> {
        self.replica.get(id)
    }

    pub fn top_level_items(&self) -> Vec<WorkspaceItem> {
        self.items()
            .iter()
            .filter(|item| item.is_top_level())
            .cloned()
            .collect()
    }

    pub fn children_of(&self, parent_id: &str) -> Vec<WorkspaceItem> {
        self.items()
            .iter()
            .filter(|item| item.is_child_of(parent_id))
            .cloned()
            .collect()
    }

    pub fn tree(&self) -> WorkspaceTree {
        WorkspaceTree::build(&self.items())
    }

    /// Create an item and return the key the collection assigned to it.
    pub async fn add_item(&self, new_item: NewWorkspaceItem) -> Result<String, StoreError> {
        new_item.validate()?;
        let item = new_item.into_item(Utc::now());
        self.check_parent(None, item.parent_id.as_deref()).await?;

        let record = item.to_record()?;
        let id = logged(
            "Adding workspace item",
            self.collection.push(Value::Object(record)).await,
        )?;
        tracing::debug!("Added workspace item '{}' ({})", item.title, id);
        Ok(id)
    }

    pub async fn update_item(
        &self,
        id: &str,
        patch: WorkspaceItemPatch,
    ) -> Result<WorkspaceItem, StoreError> {
        let current = self.fetch(id).await?;
        let updated = patch.apply(&current);
        updated.validate()?;
        if updated.parent_id != current.parent_id {
            self.check_parent(Some(id), updated.parent_id.as_deref()).await?;
        }
        if current.item_type == ItemType::Nested && updated.item_type != ItemType::Nested {
            let items = self.remote_items().await?;
            let children = items.iter().filter(|i| i.is_child_of(id)).count();
            if children > 0 {
                return Err(StoreError::Conflict(format!(
                    "Workspace item {} still has {} child item(s) and must stay nested",
                    id, children
                )));
            }
        }

        let fields = diff_records(&current.to_record()?, &updated.to_record()?);
        if fields.is_empty() {
            return Ok(current);
        }
        let changed: Vec<&String> = fields.keys().collect();
        tracing::debug!("Updating workspace item {} ({:?})", id, changed);

        let merged = logged(
            "Updating workspace item",
            self.collection.patch(id, fields).await,
        )?;
        Ok(WorkspaceItem::from_record(id, &merged)?)
    }

    /// Delete one item, leaving its children orphaned.
    pub async fn delete_item(&self, id: &str) -> Result<(), StoreError> {
        self.delete_item_with(id, DeletePolicy::Orphan).await.map(|_| ())
    }

    /// Delete an item under `policy` and return every id that was removed.
    pub async fn delete_item_with(
        &self,
        id: &str,
        policy: DeletePolicy,
    ) -> Result<Vec<String>, StoreError> {
        let mut removed = Vec::new();
        match policy {
            DeletePolicy::Orphan => {}
            DeletePolicy::Reject => {
                let items = self.remote_items().await?;
                let children = items.iter().filter(|i| i.is_child_of(id)).count();
                if children > 0 {
                    return Err(StoreError::Conflict(format!(
                        "Workspace item {} still has {} child item(s)",
                        id, children
                    )));
                }
            }
            DeletePolicy::Cascade => {
                let items = self.remote_items().await?;
                for child in descendants(&items, id) {
                    logged(
                        "Deleting workspace item",
                        self.collection.remove(&child).await,
                    )?;
                    removed.push(child);
                }
            }
        }

        logged("Deleting workspace item", self.collection.remove(id).await)?;
        removed.push(id.to_string());
        tracing::debug!(
            "Deleted workspace item {} ({}, {} record(s))",
            id,
            policy.as_str(),
            removed.len()
        );
        Ok(removed)
    }

    /// Canonical record from the collection, not the replica.
    async fn fetch(&self, id: &str) -> Result<WorkspaceItem, StoreError> {
        let raw = logged("Fetching workspace item", self.collection.get(id).await)?
            .ok_or_else(|| StoreError::NotFound(format!("Workspace item {} not found", id)))?;
        Ok(WorkspaceItem::from_record(id, &raw)?)
    }

    async fn remote_items(&self) -> Result<Vec<WorkspaceItem>, StoreError> {
        let snapshot = logged("Reading workspaces", self.collection.snapshot().await)?;
        Ok(project(&snapshot))
    }

    /// A parent must exist, must be a folder, and must not sit below the
    /// item being moved.
    async fn check_parent(&self, item_id: Option<&str>, parent_id: Option<&str>) -> Result<(), StoreError> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if item_id == Some(parent_id) {
            return Err(StoreError::BadRequest("An item cannot be its own parent".into()));
        }

        let parent = self.lookup(parent_id).await?.ok_or_else(|| {
            StoreError::BadRequest(format!("Parent item {} does not exist", parent_id))
        })?;
        if parent.item_type != ItemType::Nested {
            return Err(StoreError::BadRequest(format!(
                "Parent item {} is not a nested item",
                parent_id
            )));
        }

        let Some(item_id) = item_id else {
            return Ok(());
        };
        let mut seen = HashSet::from([parent_id.to_string()]);
        let mut ancestor = parent.parent_id;
        while let Some(current) = ancestor {
            if current == item_id {
                return Err(StoreError::BadRequest(format!(
                    "Moving {} under {} would create a cycle",
                    item_id, parent_id
                )));
            }
            if !seen.insert(current.clone()) {
                break;
            }
            ancestor = self.lookup(&current).await?.and_then(|a| a.parent_id);
        }
        Ok(())
    }

    async fn lookup(&self, id: &str) -> Result<Option<WorkspaceItem>, StoreError> {
        match logged("Fetching workspace item", self.collection.get(id).await)? {
            Some(raw) => Ok(Some(WorkspaceItem::from_record(id, &raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MemoryCollection;
    use crate::models::LaunchTarget;
    use crate::store::testing::{wait_for, FailingCollection};
    use serde_json::json;

    async fn started() -> (Arc<MemoryCollection>, WorkspaceStore) {
        let collection = Arc::new(MemoryCollection::new("workspaces"));
        let store = WorkspaceStore::new(collection.clone());
        store.start().unwrap();
        store.wait_until_loaded().await.unwrap();
        (collection, store)
    }

    fn docs() -> NewWorkspaceItem {
        NewWorkspaceItem::new("Docs", ItemType::External).with_url("https://docs.rs")
    }

    #[tokio::test]
    async fn test_add_item_shows_up_through_the_subscription() {
        let (_collection, store) = started().await;
        let mut rx = store.watch();

        let id = store.add_item(docs()).await.unwrap();
        let state = wait_for(&mut rx, |s| s.items.len() == 1).await;

        let item = &state.items[0];
        assert_eq!(item.id, id);
        assert_eq!(item.title, "Docs");
        assert_eq!(item.url, "https://docs.rs");
        assert_eq!(item.item_type, ItemType::External);
        assert!(item.is_top_level());
        assert_eq!(store.get_item(&id).as_ref(), Some(item));
        assert_eq!(
            item.launch_target(),
            LaunchTarget::OpenUrl { url: "https://docs.rs".into() }
        );
    }

    #[tokio::test]
    async fn test_items_are_ordered_oldest_first() {
        let (_collection, store) = started().await;
        let mut rx = store.watch();
        let first = store.add_item(docs()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .add_item(NewWorkspaceItem::new("Folder", ItemType::Nested))
            .await
            .unwrap();

        let state = wait_for(&mut rx, |s| s.items.len() == 2).await;
        assert_eq!(state.items[0].id, first);
        assert_eq!(state.items[1].id, second);
    }

    #[tokio::test]
    async fn test_add_item_validates_before_writing() {
        let (collection, store) = started().await;
        let missing_url = NewWorkspaceItem::new("Docs", ItemType::Embed);
        assert!(matches!(store.add_item(missing_url).await, Err(StoreError::BadRequest(_))));
        assert!(collection.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_item_patches_only_changed_fields() {
        let (collection, store) = started().await;
        let id = store.add_item(docs()).await.unwrap();
        let before = collection.get(&id).await.unwrap().unwrap();

        let patch = WorkspaceItemPatch {
            title: Some("Rust docs".into()),
            ..Default::default()
        };
        let updated = store.update_item(&id, patch).await.unwrap();
        assert_eq!(updated.title, "Rust docs");
        assert_eq!(updated.url, "https://docs.rs");

        let after = collection.get(&id).await.unwrap().unwrap();
        assert_eq!(after["createdAt"], before["createdAt"]);
        assert_eq!(after["title"], "Rust docs");
    }

    #[tokio::test]
    async fn test_update_item_can_clear_icon() {
        let (collection, store) = started().await;
        let mut new_item = docs();
        new_item.icon = Some("globe".into());
        let id = store.add_item(new_item).await.unwrap();

        let patch = WorkspaceItemPatch {
            icon: Some(None),
            ..Default::default()
        };
        let updated = store.update_item(&id, patch).await.unwrap();
        assert_eq!(updated.icon, None);

        let after = collection.get(&id).await.unwrap().unwrap();
        assert!(after.get("icon").is_none());
        assert_eq!(after["title"], "Docs");
    }

    #[tokio::test]
    async fn test_update_item_reads_the_canonical_record() {
        let (collection, store) = started().await;
        let id = store.add_item(docs()).await.unwrap();
        // written behind the store's back; the replica may not have it yet
        let mut fields = serde_json::Map::new();
        fields.insert("description".into(), json!("from elsewhere"));
        collection.patch(&id, fields).await.unwrap();

        let patch = WorkspaceItemPatch {
            color: Some(Some("blue".into())),
            ..Default::default()
        };
        let updated = store.update_item(&id, patch).await.unwrap();
        assert_eq!(updated.description, "from elsewhere");
        assert_eq!(updated.color.as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn test_update_unknown_item_is_not_found() {
        let (collection, store) = started().await;
        let patch = WorkspaceItemPatch {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_item("missing", patch).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(collection.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_merged_record() {
        let (_collection, store) = started().await;
        let id = store.add_item(docs()).await.unwrap();
        let patch = WorkspaceItemPatch {
            url: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(store.update_item(&id, patch).await, Err(StoreError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_parent_must_exist_and_be_nested() {
        let (_collection, store) = started().await;
        let link = store.add_item(docs()).await.unwrap();

        let under_missing = docs().with_parent("ghost");
        assert!(matches!(store.add_item(under_missing).await, Err(StoreError::BadRequest(_))));

        let under_link = docs().with_parent(link.clone());
        assert!(matches!(store.add_item(under_link).await, Err(StoreError::BadRequest(_))));

        let self_parent = WorkspaceItemPatch {
            parent_id: Some(Some(link.clone())),
            ..Default::default()
        };
        assert!(matches!(
            store.update_item(&link, self_parent).await,
            Err(StoreError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_folder_with_children_cannot_change_type() {
        let (collection, store) = started().await;
        let folder = store
            .add_item(NewWorkspaceItem::new("Tools", ItemType::Nested))
            .await
            .unwrap();
        let child = store.add_item(docs().with_parent(folder.clone())).await.unwrap();

        let retype = WorkspaceItemPatch {
            item_type: Some(ItemType::External),
            url: Some("https://tools.example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_item(&folder, retype.clone()).await,
            Err(StoreError::Conflict(_))
        ));
        let raw = collection.get(&folder).await.unwrap().unwrap();
        assert_eq!(raw["type"], "nested");

        store.delete_item(&child).await.unwrap();
        let updated = store.update_item(&folder, retype).await.unwrap();
        assert_eq!(updated.item_type, ItemType::External);
    }

    #[tokio::test]
    async fn test_moving_a_folder_below_itself_is_rejected() {
        let (_collection, store) = started().await;
        let outer = store
            .add_item(NewWorkspaceItem::new("Outer", ItemType::Nested))
            .await
            .unwrap();
        let inner = store
            .add_item(NewWorkspaceItem::new("Inner", ItemType::Nested).with_parent(outer.clone()))
            .await
            .unwrap();

        let patch = WorkspaceItemPatch {
            parent_id: Some(Some(inner)),
            ..Default::default()
        };
        assert!(matches!(store.update_item(&outer, patch).await, Err(StoreError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_orphans_children() {
        let (_collection, store) = started().await;
        let mut rx = store.watch();
        let folder = store
            .add_item(NewWorkspaceItem::new("Folder", ItemType::Nested))
            .await
            .unwrap();
        let child = store.add_item(docs().with_parent(folder.clone())).await.unwrap();
        wait_for(&mut rx, |s| s.items.len() == 2).await;
        assert_eq!(store.children_of(&folder).len(), 1);
        assert_eq!(store.top_level_items().len(), 1);

        store.delete_item(&folder).await.unwrap();
        let state = wait_for(&mut rx, |s| s.items.len() == 1).await;
        assert_eq!(state.items[0].id, child);
        assert_eq!(state.items[0].parent_id.as_deref(), Some(folder.as_str()));
        assert!(store.top_level_items().is_empty());

        let tree = store.tree();
        assert!(tree.roots.is_empty());
        assert_eq!(tree.orphans[0].item.id, child);
    }

    #[tokio::test]
    async fn test_reject_policy_keeps_folders_with_children() {
        let (collection, store) = started().await;
        let folder = store
            .add_item(NewWorkspaceItem::new("Folder", ItemType::Nested))
            .await
            .unwrap();
        store.add_item(docs().with_parent(folder.clone())).await.unwrap();

        let result = store.delete_item_with(&folder, DeletePolicy::Reject).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(collection.snapshot().await.unwrap().len(), 2);

        let empty = store
            .add_item(NewWorkspaceItem::new("Empty", ItemType::Nested))
            .await
            .unwrap();
        let removed = store.delete_item_with(&empty, DeletePolicy::Reject).await.unwrap();
        assert_eq!(removed, vec![empty]);
    }

    #[tokio::test]
    async fn test_cascade_policy_removes_descendants() {
        let (collection, store) = started().await;
        let top = store
            .add_item(NewWorkspaceItem::new("Top", ItemType::Nested))
            .await
            .unwrap();
        let mid = store
            .add_item(NewWorkspaceItem::new("Mid", ItemType::Nested).with_parent(top.clone()))
            .await
            .unwrap();
        store.add_item(docs().with_parent(mid.clone())).await.unwrap();
        let other = store.add_item(docs()).await.unwrap();

        let removed = store.delete_item_with(&top, DeletePolicy::Cascade).await.unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(removed.last(), Some(&top));

        let remaining = collection.snapshot().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key(&other));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let store = WorkspaceStore::new(Arc::new(FailingCollection::new()));
        store.start().unwrap();
        store.wait_until_loaded().await.unwrap();

        assert!(matches!(store.add_item(docs()).await, Err(StoreError::Remote(_))));
        assert!(matches!(store.delete_item("x").await, Err(StoreError::Remote(_))));
        assert!(store.items().is_empty());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_delete_policy_names() {
        assert_eq!(DeletePolicy::default(), DeletePolicy::Orphan);
        assert_eq!(DeletePolicy::from_str("cascade"), Some(DeletePolicy::Cascade));
        assert_eq!(DeletePolicy::from_str("purge"), None);
    }
}
