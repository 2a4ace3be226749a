//! Server errors and their JSON-RPC codes.

use feedpilot::PilotError;

use super::message::{JsonRpcError, RequestId};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Engine-specific error codes.
pub mod pilot_error_codes {
    /// Rule import document failed validation. Nothing was changed.
    pub const INVALID_IMPORT: i32 = -32010;
    /// State file could not be read or written.
    pub const STORAGE_ERROR: i32 = -32011;
}

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Invalid import: {0}")]
    InvalidImport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use pilot_error_codes::*;
        match self {
            ServerError::ParseError(_) => PARSE_ERROR,
            ServerError::InvalidRequest(_) => INVALID_REQUEST,
            ServerError::MethodNotFound(_) => METHOD_NOT_FOUND,
            ServerError::InvalidParams(_) => INVALID_PARAMS,
            ServerError::InternalError(_) | ServerError::Io(_) => INTERNAL_ERROR,
            ServerError::InvalidImport(_) => INVALID_IMPORT,
            ServerError::Storage(_) => STORAGE_ERROR,
            ServerError::Json(_) => PARSE_ERROR,
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError::new(id, self.code(), self.to_string())
    }
}

impl From<PilotError> for ServerError {
    fn from(e: PilotError) -> Self {
        match e {
            PilotError::InvalidImport(msg) => ServerError::InvalidImport(msg),
            PilotError::Storage(msg) => ServerError::Storage(msg),
            PilotError::Io(e) => ServerError::Storage(e.to_string()),
            other => ServerError::InternalError(other.to_string()),
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
