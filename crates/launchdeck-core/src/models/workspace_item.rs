use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Marker some clients persist instead of omitting `parentId`.
pub const NO_PARENT: &str = "none";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Opens the URL in a new browser tab.
    External,
    /// Renders the URL inside an embedded frame view.
    Embed,
    /// Folder grouping child items through their `parentId`.
    Nested,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Embed => "embed",
            Self::Nested => "nested",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "external" => Some(Self::External),
            "embed" => Some(Self::Embed),
            "nested" => Some(Self::Nested),
            _ => None,
        }
    }

    pub fn requires_url(&self) -> bool {
        !matches!(self, Self::Nested)
    }
}

/// A dashboard entry: a link, an embedded page, or a folder of other items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_parent_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkspaceItem {
    /// Decode a record read from the `workspaces` collection.
    pub fn from_record(id: &str, value: &Value) -> Result<Self, serde_json::Error> {
        let mut item: WorkspaceItem = serde_json::from_value(value.clone())?;
        item.id = id.to_string();
        Ok(item)
    }

    pub fn to_record(&self) -> Result<Map<String, Value>, serde_json::Error> {
        super::to_record(self)
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_child_of(&self, parent_id: &str) -> bool {
        self.parent_id.as_deref() == Some(parent_id)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_fields(&self.title, &self.url, self.item_type)
    }

    /// Where activating this card should take the user.
    pub fn launch_target(&self) -> LaunchTarget {
        match self.item_type {
            ItemType::External => LaunchTarget::OpenUrl {
                url: self.url.clone(),
            },
            ItemType::Embed => LaunchTarget::Embed {
                route: format!("/embed/{}", self.id),
                url: self.url.clone(),
            },
            ItemType::Nested => LaunchTarget::Folder {
                route: format!("/nested/{}", self.id),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LaunchTarget {
    OpenUrl { url: String },
    Embed { route: String, url: String },
    Folder { route: String },
}

/// A workspace item as submitted for creation (no `id` / `createdAt` yet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkspaceItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "deserialize_parent_id")]
    pub parent_id: Option<String>,
}

impl NewWorkspaceItem {
    pub fn new(title: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            url: String::new(),
            item_type,
            icon: None,
            color: None,
            parent_id: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = normalize_parent_id(Some(parent_id.into()));
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_fields(&self.title, &self.url, self.item_type)
    }

    pub fn into_item(self, created_at: DateTime<Utc>) -> WorkspaceItem {
        WorkspaceItem {
            id: String::new(),
            title: self.title,
            description: self.description,
            url: self.url,
            item_type: self.item_type,
            icon: self.icon,
            color: self.color,
            parent_id: normalize_parent_id(self.parent_id),
            created_at,
        }
    }
}

/// Typed partial update for a workspace item.
///
/// `parent_id` distinguishes "leave unchanged" (`None`) from "move to top
/// level" (`Some(None)`, sent as `null`, `""` or `"none"`). `icon` and
/// `color` follow the same shape: `null` or `""` clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkspaceItemPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<ItemType>,
    #[serde(
        default,
        deserialize_with = "deserialize_clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_parent_patch")]
    pub parent_id: Option<Option<String>>,
}

impl WorkspaceItemPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, item: &WorkspaceItem) -> WorkspaceItem {
        let mut updated = item.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(url) = &self.url {
            updated.url = url.clone();
        }
        if let Some(item_type) = self.item_type {
            updated.item_type = item_type;
        }
        if let Some(icon) = &self.icon {
            updated.icon = icon.clone();
        }
        if let Some(color) = &self.color {
            updated.color = color.clone();
        }
        if let Some(parent_id) = &self.parent_id {
            updated.parent_id = normalize_parent_id(parent_id.clone());
        }
        updated
    }
}

/// Map the "no parent" spellings (absent, empty, `"none"`) to `None`.
pub fn normalize_parent_id(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != NO_PARENT)
}

fn validate_fields(title: &str, url: &str, item_type: ItemType) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::BadRequest("Title is required".into()));
    }
    if item_type.requires_url() && url.trim().is_empty() {
        return Err(StoreError::BadRequest(format!(
            "URL is required for {} items",
            item_type.as_str()
        )));
    }
    Ok(())
}

fn deserialize_parent_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(normalize_parent_id(raw))
}

fn deserialize_clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(Some(raw.filter(|s| !s.trim().is_empty())))
}

fn deserialize_parent_patch<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(Some(normalize_parent_id(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(item_type: ItemType) -> WorkspaceItem {
        WorkspaceItem {
            id: "abc".into(),
            title: "Docs".into(),
            description: String::new(),
            url: "https://example.com".into(),
            item_type,
            icon: None,
            color: None,
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parent_id_marker_values_mean_top_level() {
        for raw in [json!("none"), json!(""), json!(null)] {
            let value = json!({
                "title": "Docs",
                "type": "external",
                "url": "https://example.com",
                "parentId": raw,
                "createdAt": "2025-01-01T00:00:00Z"
            });
            let item = WorkspaceItem::from_record("k1", &value).unwrap();
            assert_eq!(item.id, "k1");
            assert!(item.is_top_level());
        }
    }

    #[test]
    fn test_record_omits_id_and_empty_parent() {
        let record = sample(ItemType::External).to_record().unwrap();
        assert!(!record.contains_key("id"));
        assert!(!record.contains_key("parentId"));
        assert_eq!(record["type"], "external");
        assert!(record["createdAt"].is_string());
    }

    #[test]
    fn test_nested_items_do_not_require_url() {
        let folder = NewWorkspaceItem::new("Folder", ItemType::Nested);
        assert!(folder.validate().is_ok());

        let link = NewWorkspaceItem::new("Link", ItemType::Embed);
        assert!(matches!(link.validate(), Err(StoreError::BadRequest(_))));

        let untitled = NewWorkspaceItem::new("  ", ItemType::Nested);
        assert!(untitled.validate().is_err());
    }

    #[test]
    fn test_patch_moves_item_to_top_level() {
        let mut item = sample(ItemType::External);
        item.parent_id = Some("folder".into());

        let patch: WorkspaceItemPatch = serde_json::from_value(json!({ "parentId": "none" })).unwrap();
        assert_eq!(patch.parent_id, Some(None));
        assert!(patch.apply(&item).is_top_level());

        let untouched: WorkspaceItemPatch = serde_json::from_value(json!({ "title": "New" })).unwrap();
        assert_eq!(untouched.parent_id, None);
        let updated = untouched.apply(&item);
        assert_eq!(updated.title, "New");
        assert_eq!(updated.parent_id.as_deref(), Some("folder"));
    }

    #[test]
    fn test_patch_clears_icon_and_color() {
        let mut item = sample(ItemType::External);
        item.icon = Some("globe".into());
        item.color = Some("#ff0000".into());

        let patch: WorkspaceItemPatch =
            serde_json::from_value(json!({ "icon": null, "color": "" })).unwrap();
        assert_eq!(patch.icon, Some(None));
        assert_eq!(patch.color, Some(None));
        let cleared = patch.apply(&item);
        assert_eq!(cleared.icon, None);
        assert_eq!(cleared.color, None);

        let untouched: WorkspaceItemPatch = serde_json::from_value(json!({ "icon": "book" })).unwrap();
        let updated = untouched.apply(&item);
        assert_eq!(updated.icon.as_deref(), Some("book"));
        assert_eq!(updated.color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let result: Result<WorkspaceItemPatch, _> =
            serde_json::from_value(json!({ "createdAt": "2020-01-01T00:00:00Z" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_launch_targets() {
        assert_eq!(
            sample(ItemType::External).launch_target(),
            LaunchTarget::OpenUrl { url: "https://example.com".into() }
        );
        assert_eq!(
            sample(ItemType::Embed).launch_target(),
            LaunchTarget::Embed {
                route: "/embed/abc".into(),
                url: "https://example.com".into()
            }
        );
        assert_eq!(
            sample(ItemType::Nested).launch_target(),
            LaunchTarget::Folder { route: "/nested/abc".into() }
        );
    }
}
