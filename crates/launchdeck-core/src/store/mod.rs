pub mod replica;
pub mod task_store;
pub mod workspace_store;

pub use replica::{Record, Replica, ReplicaState};
pub use task_store::TaskStore;
pub use workspace_store::{DeletePolicy, WorkspaceStore};

use crate::error::StoreError;

/// Log a failed remote call before handing it back to the caller.
pub(crate) fn logged<T>(operation: &str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    if let Err(e) = &result {
        tracing::error!("{} failed: {}", operation, e);
    }
    result
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tokio::sync::watch;

    use super::ReplicaState;
    use crate::collection::{RemoteCollection, Snapshot};
    use crate::error::StoreError;

    /// Collection whose every call fails, with a feed that never changes.
    pub struct FailingCollection {
        feed: watch::Sender<Snapshot>,
    }

    impl FailingCollection {
        pub fn new() -> Self {
            let (feed, _) = watch::channel(Arc::new(BTreeMap::new()));
            Self { feed }
        }

        fn fail<T>() -> Result<T, StoreError> {
            Err(StoreError::Remote("connection refused".into()))
        }
    }

    #[async_trait]
    impl RemoteCollection for FailingCollection {
        fn name(&self) -> &str {
            "failing"
        }
        async fn push(&self, _record: Value) -> Result<String, StoreError> {
            Self::fail()
        }
        async fn get(&self, _id: &str) -> Result<Option<Value>, StoreError> {
            Self::fail()
        }
        async fn set(&self, _id: &str, _record: Value) -> Result<(), StoreError> {
            Self::fail()
        }
        async fn patch(&self, _id: &str, _fields: Map<String, Value>) -> Result<Value, StoreError> {
            Self::fail()
        }
        async fn increment(&self, _id: &str, _field: &str, _delta: i64) -> Result<i64, StoreError> {
            Self::fail()
        }
        async fn remove(&self, _id: &str) -> Result<(), StoreError> {
            Self::fail()
        }
        async fn snapshot(&self) -> Result<Snapshot, StoreError> {
            Self::fail()
        }
        fn subscribe(&self) -> watch::Receiver<Snapshot> {
            self.feed.subscribe()
        }
    }

    /// Wait (bounded) until the replica state satisfies `pred`.
    pub async fn wait_for<T>(
        rx: &mut watch::Receiver<ReplicaState<T>>,
        pred: impl FnMut(&ReplicaState<T>) -> bool,
    ) -> ReplicaState<T> {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("timed out waiting for the replica")
            .expect("replica state channel closed")
            .clone()
    }
}
