//! JSON-RPC request validation.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{JsonRpcRequest, ServerError, ServerResult, JSONRPC_VERSION};

/// Check that a request is well-formed.
pub fn validate_request(request: &JsonRpcRequest) -> ServerResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(ServerError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(ServerError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Deserialize required params.
pub fn require_params<T: DeserializeOwned>(params: Option<Value>, method: &str) -> ServerResult<T> {
    let params = params
        .ok_or_else(|| ServerError::InvalidParams(format!("{method} params required")))?;
    serde_json::from_value(params).map_err(|e| ServerError::InvalidParams(e.to_string()))
}
