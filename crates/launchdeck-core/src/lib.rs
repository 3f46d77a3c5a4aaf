//! Launchdeck Core - transport-agnostic domain logic for the launchdeck
//! dashboard.
//!
//! Two live-synced stores sit on top of a remote document collection:
//!
//! - `WorkspaceStore` keeps the dashboard's links, embeds and folders
//! - `TaskStore` keeps to-do entries with progress, status and time spent
//!
//! Each store subscribes to its collection, holds a sorted local replica for
//! synchronous reads, and sends every mutation back to the collection. The
//! crate has **no HTTP framework dependency** by default, so the same stores
//! and JSON-RPC router serve the HTTP server and the CLI.
//!
//! # Feature Flags
//!
//! - `axum` - Enables `IntoResponse` impl on `StoreError` for use in axum handlers.

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rpc;
pub mod state;
pub mod store;
pub mod tree;

// Convenience re-exports
pub use collection::{RemoteCollection, Snapshot};
pub use config::{Backend, Collections, LaunchdeckConfig};
pub use db::Database;
pub use error::StoreError;
pub use state::{AppState, AppStateInner};
pub use store::{DeletePolicy, TaskStore, WorkspaceStore};
pub use tree::{TreeNode, WorkspaceTree};
