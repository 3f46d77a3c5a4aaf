//! Shared application state for the server, the CLI and the RPC router.

use std::sync::Arc;

use crate::config::{Collections, LaunchdeckConfig};
use crate::error::StoreError;
use crate::store::{TaskStore, WorkspaceStore};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub workspace_store: WorkspaceStore,
    pub task_store: TaskStore,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(collections: Collections) -> Self {
        Self {
            workspace_store: WorkspaceStore::new(collections.workspaces),
            task_store: TaskStore::new(collections.tasks),
        }
    }

    /// Start both stores' subscriptions.
    pub fn start(&self) -> Result<(), StoreError> {
        self.workspace_store.start()?;
        self.task_store.start()
    }

    pub fn stop(&self) {
        self.workspace_store.stop();
        self.task_store.stop();
    }

    /// Open the configured backend and wait for both replicas to load.
    pub async fn open(config: &LaunchdeckConfig) -> Result<AppState, StoreError> {
        let collections = Collections::open(&config.backend).await?;
        let state = Arc::new(Self::new(collections));
        state.start()?;
        state.workspace_store.wait_until_loaded().await?;
        state.task_store.wait_until_loaded().await?;
        Ok(state)
    }

    /// Started state over fresh in-memory collections.
    pub async fn in_memory() -> Result<AppState, StoreError> {
        let config = LaunchdeckConfig {
            backend: crate::config::Backend::Memory,
        };
        Self::open(&config).await
    }
}
