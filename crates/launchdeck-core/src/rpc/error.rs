//! RPC error type that bridges `StoreError` to JSON-RPC errors.

use super::types;
use crate::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::NotFound(_) => types::NOT_FOUND,
            RpcError::BadRequest(_) => types::BAD_REQUEST,
            RpcError::Conflict(_) => types::CONFLICT,
            RpcError::Remote(_) => types::REMOTE_ERROR,
            RpcError::Internal(_) => types::INTERNAL_ERROR,
            RpcError::InvalidParams(_) => types::INVALID_PARAMS,
            RpcError::MethodNotFound(_) => types::METHOD_NOT_FOUND,
        }
    }

    pub fn to_response(&self, id: Option<serde_json::Value>) -> types::JsonRpcResponse {
        types::JsonRpcResponse::error(id, self.code(), self.to_string())
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => RpcError::NotFound(msg),
            StoreError::BadRequest(msg) => RpcError::BadRequest(msg),
            StoreError::Conflict(msg) => RpcError::Conflict(msg),
            StoreError::Remote(msg) => RpcError::Remote(msg),
            StoreError::Internal(msg) => RpcError::Internal(msg),
        }
    }
}
