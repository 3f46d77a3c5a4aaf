//! Remote collections - the document store behind both stores.
//!
//! A collection holds JSON object records keyed by a string id generated on
//! insert. Every backend publishes the full collection through a
//! `tokio::sync::watch` channel after each change; a receiver always holds
//! the latest snapshot, and dropping it is the whole unsubscribe story.
//!
//! Backends:
//! - [`MemoryCollection`] - process-local, used by tests and `--backend memory`
//! - [`SqliteCollection`] - rusqlite table, one row per record
//! - [`FirebaseCollection`] - Firebase Realtime Database over its REST API

pub mod firebase;
pub mod memory;
pub mod sqlite;

pub use firebase::FirebaseCollection;
pub use memory::MemoryCollection;
pub use sqlite::SqliteCollection;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::StoreError;

/// Full contents of a collection at one point in time, keyed by record id.
pub type Snapshot = Arc<BTreeMap<String, Value>>;

/// Injectable transport over one named collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Collection name, e.g. `"workspaces"`.
    fn name(&self) -> &str;

    /// Insert a record under a freshly generated key and return the key.
    async fn push(&self, record: Value) -> Result<String, StoreError>;

    /// Fetch the canonical record for `id`.
    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Overwrite the record stored under `id`.
    async fn set(&self, id: &str, record: Value) -> Result<(), StoreError>;

    /// Merge `fields` into an existing record and return the result.
    /// A `null` value removes that field. Fails with `NotFound` when the
    /// record does not exist.
    async fn patch(&self, id: &str, fields: Map<String, Value>) -> Result<Value, StoreError>;

    /// Atomically add `delta` to an integer field (missing or `null` counts
    /// as 0) and return the new value. Fails with `NotFound` when the record
    /// does not exist and with `BadRequest` when the field holds anything
    /// but an integer.
    async fn increment(&self, id: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    /// Delete the record. Removing an absent id succeeds.
    async fn remove(&self, id: &str) -> Result<(), StoreError>;

    /// Read the whole collection.
    async fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Live feed of the whole collection.
    fn subscribe(&self) -> watch::Receiver<Snapshot>;
}

pub(crate) fn expect_object(record: Value) -> Result<Map<String, Value>, StoreError> {
    match record {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::BadRequest(format!(
            "Records must be JSON objects, got {}",
            other
        ))),
    }
}

pub(crate) fn merge_fields(record: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        if value.is_null() {
            record.remove(&key);
        } else {
            record.insert(key, value);
        }
    }
}

/// Current value of an integer counter field, as `increment` sees it.
pub(crate) fn counter_value(record: &Map<String, Value>, field: &str) -> Result<i64, StoreError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| not_an_integer(field, value)),
    }
}

pub(crate) fn not_an_integer(field: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::BadRequest(format!("Field '{}' is not an integer: {}", field, value))
}

/// Field names end up inside JSON paths and URLs, so only plain identifiers
/// are accepted.
pub(crate) fn check_field_name(field: &str) -> Result<(), StoreError> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::BadRequest(format!("Invalid field name: '{}'", field)))
    }
}

pub(crate) fn new_key() -> String {
    uuid::Uuid::new_v4().to_string()
}
