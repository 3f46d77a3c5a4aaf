//! Local read replica of a remote collection.
//!
//! A `Replica` subscribes to a [`RemoteCollection`] and, on every published
//! snapshot, replaces its cached sequence with a freshly decoded and sorted
//! projection. It never writes to the cache on its own; stores write to the
//! remote collection and wait for the change to come back through the feed.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collection::{RemoteCollection, Snapshot};
use crate::error::StoreError;

/// A model that can be projected out of a collection snapshot.
pub trait Record: Clone + Send + Sync + 'static {
    /// Human-readable record kind used in log and error messages.
    const KIND: &'static str;

    fn decode(id: &str, value: &Value) -> Result<Self, serde_json::Error>;

    fn id(&self) -> &str;

    /// Display order of the cached sequence.
    fn order(a: &Self, b: &Self) -> Ordering;
}

/// What consumers observe: the cached sequence plus whether the first
/// snapshot has arrived yet.
#[derive(Debug)]
pub struct ReplicaState<T> {
    pub items: Arc<Vec<T>>,
    pub loading: bool,
}

impl<T> Clone for ReplicaState<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            loading: self.loading,
        }
    }
}

pub struct Replica<T: Record> {
    collection: Arc<dyn RemoteCollection>,
    state: Arc<watch::Sender<ReplicaState<T>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Record> Replica<T> {
    pub fn new(collection: Arc<dyn RemoteCollection>) -> Self {
        let (state, _) = watch::channel(ReplicaState {
            items: Arc::new(Vec::new()),
            loading: true,
        });
        Self {
            collection,
            state: Arc::new(state),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to the collection. Must be called from within a Tokio
    /// runtime. Starting a running replica is a no-op.
    pub fn start(&self) -> Result<(), StoreError> {
        let mut listener = self.lock_listener()?;
        if listener.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }

        let mut feed = self.collection.subscribe();
        let state = self.state.clone();
        let name = self.collection.name().to_string();
        *listener = Some(tokio::spawn(async move {
            loop {
                let snapshot = feed.borrow_and_update().clone();
                let items = project::<T>(&snapshot);
                tracing::debug!("'{}' replica refreshed: {} {}(s)", name, items.len(), T::KIND);
                state.send_replace(ReplicaState {
                    items: Arc::new(items),
                    loading: false,
                });
                if feed.changed().await.is_err() {
                    tracing::debug!("'{}' feed closed", name);
                    break;
                }
            }
        }));
        tracing::info!("Subscribed to '{}'", self.collection.name());
        Ok(())
    }

    /// Drop the subscription. The last cached sequence stays readable.
    pub fn stop(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
                tracing::info!("Unsubscribed from '{}'", self.collection.name());
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.listener
            .lock()
            .map(|l| l.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        self.state.borrow().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.state.borrow().items.iter().find(|item| item.id() == id).cloned()
    }

    /// Receiver that is notified every time the cache is replaced.
    pub fn watch(&self) -> watch::Receiver<ReplicaState<T>> {
        self.state.subscribe()
    }

    /// Wait for the first snapshot after `start()`.
    pub async fn wait_until_loaded(&self) -> Result<Arc<Vec<T>>, StoreError> {
        if !self.is_running() && self.is_loading() {
            return Err(StoreError::Internal(format!(
                "'{}' replica was never started",
                self.collection.name()
            )));
        }
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| !s.loading)
            .await
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(state.items.clone())
    }

    fn lock_listener(&self) -> Result<std::sync::MutexGuard<'_, Option<JoinHandle<()>>>, StoreError> {
        self.listener
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))
    }
}

impl<T: Record> Drop for Replica<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode every record, skipping malformed ones, and sort.
pub fn project<T: Record>(snapshot: &Snapshot) -> Vec<T> {
    let mut items: Vec<T> = snapshot
        .iter()
        .filter_map(|(id, value)| match T::decode(id, value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping malformed {} '{}': {}", T::KIND, id, e);
                None
            }
        })
        .collect();
    items.sort_by(T::order);
    items
}
