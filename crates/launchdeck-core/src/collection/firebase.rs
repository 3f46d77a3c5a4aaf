//! Firebase Realtime Database backend over the REST API.
//!
//! - `POST /{collection}.json` inserts and answers `{"name": "<key>"}`
//! - `PUT` / `PATCH` / `DELETE /{collection}/{id}.json` write one record
//! - `PATCH` with `{".sv": {"increment": n}}` is the server-side atomic add
//!
//! `patch` is a compare-and-set: the record is read with its ETag and the
//! merged record is written back with `if-match`, so a concurrent delete
//! surfaces as `NotFound` instead of resurrecting a partial record.
//!
//! Live updates come from a background poller that republishes the
//! collection whenever its contents change. Every successful write also
//! refreshes the feed immediately.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{
    check_field_name, counter_value, expect_object, merge_fields, not_an_integer, RemoteCollection,
    Snapshot,
};
use crate::error::StoreError;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const ETAG_REQUEST_HEADER: &str = "x-firebase-etag";
const MAX_PATCH_ATTEMPTS: usize = 5;

/// Connection parameters for a Firebase Realtime Database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// e.g. `https://my-project-default-rtdb.firebaseio.com`
    pub database_url: String,
    /// Database secret or ID token, sent as the `auth` query parameter.
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

pub struct FirebaseCollection {
    client: reqwest::Client,
    base_url: String,
    name: String,
    auth_token: Option<String>,
    feed: watch::Sender<Snapshot>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl FirebaseCollection {
    /// Load the initial snapshot and start polling for remote changes.
    pub async fn connect(
        client: reqwest::Client,
        config: &FirebaseConfig,
        name: impl Into<String>,
    ) -> Result<Arc<Self>, StoreError> {
        let collection = Arc::new(Self::build(client, config, name));
        collection.refresh().await?;

        let interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let weak = Arc::downgrade(&collection);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(collection) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = collection.refresh().await {
                    tracing::warn!("Polling '{}' failed: {}", collection.name, e);
                }
            }
        });
        if let Ok(mut poller) = collection.poller.lock() {
            *poller = Some(handle);
        }

        tracing::info!(
            "Connected to Firebase collection '{}' (polling every {:?})",
            collection.name,
            interval
        );
        Ok(collection)
    }

    fn build(client: reqwest::Client, config: &FirebaseConfig, name: impl Into<String>) -> Self {
        let (feed, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            client,
            base_url: config.database_url.trim_end_matches('/').to_string(),
            name: name.into(),
            auth_token: config.auth_token.clone(),
            feed,
            poller: Mutex::new(None),
        }
    }

    /// Re-read the collection and publish it if it changed.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let latest = self.fetch_all().await?;
        self.feed.send_if_modified(|current| {
            if **current == latest {
                false
            } else {
                *current = Arc::new(latest);
                true
            }
        });
        Ok(())
    }

    async fn refresh_after_write(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Refreshing '{}' after write failed: {}", self.name, e);
        }
    }

    fn url(&self, id: Option<&str>, field: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, self.name);
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
        }
        if let Some(field) = field {
            url.push('/');
            url.push_str(field);
        }
        url.push_str(".json");
        url
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    async fn fetch_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let body: Option<Map<String, Value>> = self
            .request(reqwest::Method::GET, self.url(None, None))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.unwrap_or_default().into_iter().collect())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let body: Value = self
            .request(reqwest::Method::GET, self.url(Some(id), None))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(if body.is_null() { None } else { Some(body) })
    }

    fn etag_read(&self, id: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::GET, self.url(Some(id), None))
            .header(ETAG_REQUEST_HEADER, "true")
    }

    fn conditional_put(&self, id: &str, record: &Map<String, Value>, etag: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::PUT, self.url(Some(id), None))
            .header(reqwest::header::IF_MATCH, etag)
            .json(record)
    }

    async fn fetch_with_etag(&self, id: &str) -> Result<(Option<Value>, String), StoreError> {
        let response = self.etag_read(id).send().await?.error_for_status()?;
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
            .ok_or_else(|| StoreError::Remote(format!("No ETag returned for {}/{}", self.name, id)))?;
        let body: Value = response.json().await?;
        Ok((if body.is_null() { None } else { Some(body) }, etag))
    }

    /// `false` when the record changed since `etag` was read.
    async fn put_if_match(&self, id: &str, record: &Map<String, Value>, etag: &str) -> Result<bool, StoreError> {
        let response = self.conditional_put(id, record, etag).send().await?;
        if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            return Ok(false);
        }
        response.error_for_status()?;
        Ok(true)
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound(format!("Record {}/{} not found", self.name, id))
    }
}

impl Drop for FirebaseCollection {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        }
    }
}

/// Firebase keys may not contain `. $ # [ ] /`.
fn check_key(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.chars().any(|c| matches!(c, '.' | '$' | '#' | '[' | ']' | '/')) {
        return Err(StoreError::BadRequest(format!("Invalid record id: '{}'", id)));
    }
    Ok(())
}

#[async_trait]
impl RemoteCollection for FirebaseCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, record: Value) -> Result<String, StoreError> {
        let record = expect_object(record)?;
        let created: PushResponse = self
            .request(reqwest::Method::POST, self.url(None, None))
            .json(&record)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.refresh_after_write().await;
        Ok(created.name)
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        check_key(id)?;
        self.fetch(id).await
    }

    async fn set(&self, id: &str, record: Value) -> Result<(), StoreError> {
        check_key(id)?;
        let record = expect_object(record)?;
        self.request(reqwest::Method::PUT, self.url(Some(id), None))
            .json(&record)
            .send()
            .await?
            .error_for_status()?;
        self.refresh_after_write().await;
        Ok(())
    }

    async fn patch(&self, id: &str, fields: Map<String, Value>) -> Result<Value, StoreError> {
        check_key(id)?;
        for _ in 0..MAX_PATCH_ATTEMPTS {
            let (current, etag) = self.fetch_with_etag(id).await?;
            let mut merged = expect_object(current.ok_or_else(|| self.not_found(id))?)?;
            merge_fields(&mut merged, fields.clone());

            if self.put_if_match(id, &merged, &etag).await? {
                self.refresh_after_write().await;
                return Ok(Value::Object(merged));
            }
            tracing::debug!("Record {}/{} changed during patch, retrying", self.name, id);
        }
        Err(StoreError::Conflict(format!(
            "Record {}/{} kept changing during patch",
            self.name, id
        )))
    }

    async fn increment(&self, id: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        check_key(id)?;
        check_field_name(field)?;
        let current = self.fetch(id).await?.ok_or_else(|| self.not_found(id))?;
        counter_value(&expect_object(current)?, field)?;

        let body = serde_json::json!({ field: { ".sv": { "increment": delta } } });
        self.request(reqwest::Method::PATCH, self.url(Some(id), None))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: Value = self
            .request(reqwest::Method::GET, self.url(Some(id), Some(field)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.refresh_after_write().await;

        value.as_i64().ok_or_else(|| not_an_integer(field, &value))
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        check_key(id)?;
        self.request(reqwest::Method::DELETE, self.url(Some(id), None))
            .send()
            .await?
            .error_for_status()?;
        self.refresh_after_write().await;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(Arc::new(self.fetch_all().await?))
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.feed.subscribe()
    }
}
