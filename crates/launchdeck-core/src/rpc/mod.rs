//! Transport-agnostic JSON-RPC 2.0 layer over the workspace and task stores.
//!
//! The same router serves:
//!
//! - **HTTP**, via the axum endpoint at `/api/rpc`
//! - **CLI**, where every subcommand is a single in-process call
//!
//! # Example
//!
//! ```ignore
//! use launchdeck_core::rpc::RpcRouter;
//!
//! let router = RpcRouter::new(app_state);
//! let response = router.handle_request(r#"{
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "tasks.addTime",
//!     "params": { "id": "-Nabc", "minutes": 25 }
//! }"#).await;
//! ```

pub mod error;
pub mod methods;
pub mod router;
pub mod types;

pub use error::RpcError;
pub use router::RpcRouter;
pub use types::{JsonRpcRequest, JsonRpcResponse};
