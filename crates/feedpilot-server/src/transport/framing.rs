//! Newline-delimited JSON framing.

use crate::types::{JsonRpcMessage, ServerError, ServerResult};

/// Parse one line of text as a JSON-RPC message.
pub fn parse_message(line: &str) -> ServerResult<JsonRpcMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ServerError::ParseError("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| ServerError::ParseError(e.to_string()))
}

/// Serialize a value to one JSON line, newline included.
pub fn frame_message(value: &serde_json::Value) -> ServerResult<String> {
    let mut json = serde_json::to_string(value).map_err(ServerError::Json)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Request(_)));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_message("{nope"), Err(ServerError::ParseError(_))));
        assert!(matches!(parse_message("   "), Err(ServerError::ParseError(_))));
    }

    #[test]
    fn test_frame_single_line() {
        let framed = frame_message(&serde_json::json!({ "a": "x\ny" })).unwrap();
        assert!(framed.ends_with('\n'));
        assert_eq!(framed.matches('\n').count(), 1);
    }
}
