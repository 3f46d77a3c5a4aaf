use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{
    check_field_name, counter_value, expect_object, merge_fields, new_key, RemoteCollection,
    Snapshot,
};
use crate::error::StoreError;

/// In-process collection. Every write publishes a new snapshot while the
/// record lock is still held, so subscribers observe writes in order.
pub struct MemoryCollection {
    name: String,
    records: Mutex<BTreeMap<String, Value>>,
    feed: watch::Sender<Snapshot>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        let (feed, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            name: name.into(),
            records: Mutex::new(BTreeMap::new()),
            feed,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))
    }

    fn publish(&self, records: &BTreeMap<String, Value>) {
        self.feed.send_replace(Arc::new(records.clone()));
    }
}

#[async_trait]
impl RemoteCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, record: Value) -> Result<String, StoreError> {
        let record = expect_object(record)?;
        let id = new_key();
        let mut records = self.lock()?;
        records.insert(id.clone(), Value::Object(record));
        self.publish(&records);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn set(&self, id: &str, record: Value) -> Result<(), StoreError> {
        let record = expect_object(record)?;
        let mut records = self.lock()?;
        records.insert(id.to_string(), Value::Object(record));
        self.publish(&records);
        Ok(())
    }

    async fn patch(&self, id: &str, fields: Map<String, Value>) -> Result<Value, StoreError> {
        let mut records = self.lock()?;
        let merged = match records.get_mut(id) {
            Some(Value::Object(record)) => {
                merge_fields(record, fields);
                Value::Object(record.clone())
            }
            Some(_) => {
                return Err(StoreError::Remote(format!(
                    "Record {}/{} is not an object",
                    self.name, id
                )))
            }
            None => {
                return Err(StoreError::NotFound(format!(
                    "Record {}/{} not found",
                    self.name, id
                )))
            }
        };
        self.publish(&records);
        Ok(merged)
    }

    async fn increment(&self, id: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        check_field_name(field)?;
        let mut records = self.lock()?;
        let record = records
            .get_mut(id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::NotFound(format!("Record {}/{} not found", self.name, id)))?;
        let current = counter_value(record, field)?;
        let next = current + delta;
        record.insert(field.to_string(), Value::from(next));
        self.publish(&records);
        Ok(next)
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        if records.remove(id).is_some() {
            self.publish(&records);
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(Arc::new(self.lock()?.clone()))
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.feed.subscribe()
    }
}
