//! Backend selection and collection wiring.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::collection::{
    FirebaseCollection, MemoryCollection, RemoteCollection, SqliteCollection,
};
use crate::db::Database;
use crate::error::StoreError;

pub use crate::collection::firebase::FirebaseConfig;

/// Collection holding workspace items.
pub const WORKSPACES: &str = "workspaces";
/// Collection holding tasks.
pub const TASKS: &str = "tasks";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Process-local collections, lost on exit.
    Memory,
    /// Local SQLite document store.
    Sqlite { path: PathBuf },
    /// Firebase Realtime Database.
    Firebase(FirebaseConfig),
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
            Self::Firebase(_) => "firebase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchdeckConfig {
    pub backend: Backend,
}

impl Default for LaunchdeckConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite {
                path: default_db_path(),
            },
        }
    }
}

/// `~/.launchdeck/launchdeck.db`, or `./launchdeck.db` without a home dir.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".launchdeck"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("launchdeck.db")
}

/// The two collections every launchdeck instance works with.
#[derive(Clone)]
pub struct Collections {
    pub workspaces: Arc<dyn RemoteCollection>,
    pub tasks: Arc<dyn RemoteCollection>,
}

impl Collections {
    pub async fn open(backend: &Backend) -> Result<Self, StoreError> {
        tracing::info!("Opening {} backend", backend.as_str());
        match backend {
            Backend::Memory => Ok(Self::in_memory()),
            Backend::Sqlite { path } => {
                let db = Database::open(path)?;
                Ok(Self {
                    workspaces: Arc::new(SqliteCollection::open(db.clone(), WORKSPACES)?),
                    tasks: Arc::new(SqliteCollection::open(db, TASKS)?),
                })
            }
            Backend::Firebase(config) => {
                let client = reqwest::Client::new();
                let workspaces: Arc<dyn RemoteCollection> =
                    FirebaseCollection::connect(client.clone(), config, WORKSPACES).await?;
                let tasks: Arc<dyn RemoteCollection> =
                    FirebaseCollection::connect(client, config, TASKS).await?;
                Ok(Self { workspaces, tasks })
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            workspaces: Arc::new(MemoryCollection::new(WORKSPACES)),
            tasks: Arc::new(MemoryCollection::new(TASKS)),
        }
    }
}
