pub mod task;
pub mod workspace_item;

pub use task::*;
pub use workspace_item::*;

use serde_json::{Map, Value};

/// Compute the field-level difference between two stored records.
///
/// Keys whose value changed (or that were added) map to the new value; keys
/// present in `before` but missing from `after` map to `null`, which every
/// collection backend treats as "remove this field".
pub fn diff_records(before: &Map<String, Value>, after: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in after {
        if before.get(key) != Some(value) {
            fields.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            fields.insert(key.clone(), Value::Null);
        }
    }
    fields
}

/// Serialize a model into the JSON object stored in a remote collection.
/// The `id` lives in the collection key, never inside the record.
pub(crate) fn to_record<T: serde::Serialize>(model: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(model)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_records_reports_changed_added_and_removed() {
        let before = json!({ "title": "a", "url": "x", "icon": "globe" });
        let after = json!({ "title": "b", "url": "x", "color": "blue" });
        let diff = diff_records(
            before.as_object().unwrap(),
            after.as_object().unwrap(),
        );
        assert_eq!(diff.len(), 3);
        assert_eq!(diff["title"], "b");
        assert_eq!(diff["color"], "blue");
        assert_eq!(diff["icon"], Value::Null);
        assert!(!diff.contains_key("url"));
    }

    #[test]
    fn test_diff_identical_records_is_empty() {
        let record = json!({ "title": "same" });
        let map = record.as_object().unwrap();
        assert!(diff_records(map, map).is_empty());
    }
}
