use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{check_field_name, expect_object, new_key, not_an_integer, RemoteCollection, Snapshot};
use crate::db::Database;
use crate::error::StoreError;

/// Collection stored as JSON documents in the `records` table.
///
/// Writes and the snapshot they publish run inside one locked connection
/// call, so the feed never goes backwards. `patch` and `increment` are single
/// `UPDATE ... RETURNING` statements.
pub struct SqliteCollection {
    db: Database,
    name: String,
    feed: Arc<watch::Sender<Snapshot>>,
}

impl SqliteCollection {
    pub fn open(db: Database, name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let initial = db.with_conn(|conn| load_records(conn, &name))?;
        let (feed, _) = watch::channel(Arc::new(initial));
        tracing::debug!("Opened sqlite collection '{}'", name);
        Ok(Self {
            db,
            name,
            feed: Arc::new(feed),
        })
    }

    /// Run a write, then republish the collection before releasing the lock.
    async fn write<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection, &str) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let name = self.name.clone();
        let feed = self.feed.clone();
        self.db
            .with_conn_async(move |conn| {
                let out = f(conn, &name)?;
                let snapshot = load_records(conn, &name)?;
                feed.send_replace(Arc::new(snapshot));
                Ok(out)
            })
            .await
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound(format!("Record {}/{} not found", self.name, id))
    }
}

enum Increment {
    Done(i64),
    Missing,
    NotInteger(String),
}

#[async_trait]
impl RemoteCollection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, record: Value) -> Result<String, StoreError> {
        let data = serde_json::to_string(&expect_object(record)?)?;
        let id = new_key();
        let key = id.clone();
        let now = Utc::now().timestamp_millis();
        self.write(move |conn, name| {
            conn.execute(
                "INSERT INTO records (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                rusqlite::params![name, key, data, now],
            )
        })
        .await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let name = self.name.clone();
        let id = id.to_string();
        let raw: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                    rusqlite::params![name, id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    async fn set(&self, id: &str, record: Value) -> Result<(), StoreError> {
        let data = serde_json::to_string(&expect_object(record)?)?;
        let id = id.to_string();
        let now = Utc::now().timestamp_millis();
        self.write(move |conn, name| {
            conn.execute(
                "INSERT INTO records (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET
                   data = excluded.data,
                   updated_at = excluded.updated_at",
                rusqlite::params![name, id, data, now],
            )
        })
        .await?;
        Ok(())
    }

    async fn patch(&self, id: &str, fields: Map<String, Value>) -> Result<Value, StoreError> {
        let patch = serde_json::to_string(&fields)?;
        let key = id.to_string();
        let now = Utc::now().timestamp_millis();
        let raw: Option<String> = self
            .write(move |conn, name| {
                conn.query_row(
                    "UPDATE records SET data = json_patch(data, ?1), updated_at = ?2
                     WHERE collection = ?3 AND id = ?4
                     RETURNING data",
                    rusqlite::params![patch, now, name, key],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;
        let raw = raw.ok_or_else(|| self.not_found(id))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn increment(&self, id: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        check_field_name(field)?;
        let path = format!("$.{}", field);
        let key = id.to_string();
        let now = Utc::now().timestamp_millis();
        let outcome = self
            .write(move |conn, name| {
                // The type check and the update share the connection lock.
                let kind: Option<Option<String>> = conn
                    .query_row(
                        "SELECT json_type(data, ?1) FROM records WHERE collection = ?2 AND id = ?3",
                        rusqlite::params![path, name, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                match kind {
                    None => Ok(Increment::Missing),
                    Some(Some(kind)) if kind != "integer" && kind != "null" => {
                        Ok(Increment::NotInteger(kind))
                    }
                    Some(_) => conn
                        .query_row(
                            "UPDATE records
                             SET data = json_set(data, ?1, COALESCE(json_extract(data, ?1), 0) + ?2),
                                 updated_at = ?3
                             WHERE collection = ?4 AND id = ?5
                             RETURNING json_extract(data, ?1)",
                            rusqlite::params![path, delta, now, name, key],
                            |row| row.get(0),
                        )
                        .map(Increment::Done),
                }
            })
            .await?;
        match outcome {
            Increment::Done(next) => Ok(next),
            Increment::Missing => Err(self.not_found(id)),
            Increment::NotInteger(kind) => Err(not_an_integer(field, kind)),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.write(move |conn, name| {
            conn.execute(
                "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![name, id],
            )
        })
        .await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let name = self.name.clone();
        let records = self
            .db
            .with_conn_async(move |conn| load_records(conn, &name))
            .await?;
        Ok(Arc::new(records))
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.feed.subscribe()
    }
}

fn load_records(conn: &Connection, collection: &str) -> Result<BTreeMap<String, Value>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, data FROM records WHERE collection = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![collection], |row| {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;
        let data: Value = serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok((id, data))
    })?;
    let records = rows.collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection(name: &str) -> SqliteCollection {
        let db = Database::open_in_memory().unwrap();
        SqliteCollection::open(db, name).unwrap()
    }

    #[tokio::test]
    async fn test_push_get_and_remove() {
        let c = collection("workspaces");
        let id = c.push(json!({ "title": "Docs" })).await.unwrap();
        assert_eq!(c.get(&id).await.unwrap(), Some(json!({ "title": "Docs" })));

        c.remove(&id).await.unwrap();
        assert_eq!(c.get(&id).await.unwrap(), None);
        // removing twice is fine
        c.remove(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_patch_merges_and_drops_nulls() {
        let c = collection("workspaces");
        let id = c
            .push(json!({ "title": "Docs", "icon": "globe", "url": "https://a" }))
            .await
            .unwrap();
        let fields = json!({ "title": "Guides", "icon": null }).as_object().unwrap().clone();
        let merged = c.patch(&id, fields).await.unwrap();
        assert_eq!(merged, json!({ "title": "Guides", "url": "https://a" }));

        let missing = c.patch("nope", Map::new()).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_increment_is_additive() {
        let c = collection("tasks");
        let id = c.push(json!({ "title": "t", "timeSpent": 10 })).await.unwrap();
        assert_eq!(c.increment(&id, "timeSpent", 5).await.unwrap(), 15);
        assert_eq!(c.increment(&id, "timeSpent", 30).await.unwrap(), 45);
        assert_eq!(c.get(&id).await.unwrap().unwrap()["timeSpent"], 45);

        assert!(matches!(
            c.increment("missing", "timeSpent", 1).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_increment_rejects_fractional_values() {
        let c = collection("tasks");
        let id = c.push(json!({ "title": "t", "timeSpent": 90.5 })).await.unwrap();
        assert!(matches!(
            c.increment(&id, "timeSpent", 10).await,
            Err(StoreError::BadRequest(_))
        ));
        assert_eq!(c.get(&id).await.unwrap().unwrap()["timeSpent"], 90.5);

        let cleared = c.push(json!({ "title": "t", "timeSpent": null })).await.unwrap();
        assert_eq!(c.increment(&cleared, "timeSpent", 10).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_collections_share_a_table_without_mixing() {
        let db = Database::open_in_memory().unwrap();
        let workspaces = SqliteCollection::open(db.clone(), "workspaces").unwrap();
        let tasks = SqliteCollection::open(db, "tasks").unwrap();
        workspaces.push(json!({ "title": "w" })).await.unwrap();
        assert_eq!(workspaces.snapshot().await.unwrap().len(), 1);
        assert!(tasks.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_publishes_after_write() {
        let c = collection("tasks");
        let mut rx = c.subscribe();
        let id = c.push(json!({ "title": "t" })).await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().contains_key(&id));
    }

    #[tokio::test]
    async fn test_reopen_reads_persisted_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launchdeck.db");
        let id = {
            let db = Database::open(&path).unwrap();
            let c = SqliteCollection::open(db, "tasks").unwrap();
            c.push(json!({ "title": "persisted" })).await.unwrap()
        };
        let db = Database::open(&path).unwrap();
        let c = SqliteCollection::open(db, "tasks").unwrap();
        assert!(c.subscribe().borrow().contains_key(&id));
    }
}
