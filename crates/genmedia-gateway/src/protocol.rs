//! JSON-RPC 2.0 framing and the MCP shapes layered on top of it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use genmedia_types::{ContentBlock, ProgressUpdate, ToolResult};

/// MCP revision reported when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SERVER_NAME: &str = "genmedia-gateway";

// ──────────────────── Error codes ────────────────────

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Server-defined: the caller exceeded its request budget.
pub const RATE_LIMITED: i64 = -32029;

// ──────────────────── Messages ────────────────────

/// An inbound request or notification. A missing `id` marks a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        // Every field is a plain JSON value, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A server-initiated `notifications/progress` message.
pub fn progress_notification(token: &Value, update: &ProgressUpdate) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/progress",
        "params": {
            "progressToken": token,
            "progress": update.progress,
            "message": update.message,
        }
    })
}

// ──────────────────── Content mapping ────────────────────

/// MCP content item for one core block.
///
/// Binary payloads map by MIME family: `image/*` and `audio/*` have their own
/// item types, everything else travels as an embedded resource blob.
pub fn content_item(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::Binary { data, mime_type } if mime_type.starts_with("image/") => {
            json!({"type": "image", "data": data, "mimeType": mime_type})
        }
        ContentBlock::Binary { data, mime_type } if mime_type.starts_with("audio/") => {
            json!({"type": "audio", "data": data, "mimeType": mime_type})
        }
        ContentBlock::Binary { data, mime_type } => json!({
            "type": "resource",
            "resource": {
                "uri": "genmedia://output",
                "mimeType": mime_type,
                "blob": data,
            }
        }),
    }
}

/// The `tools/call` result body.
pub fn call_result(result: &ToolResult) -> Value {
    let content: Vec<Value> = result.content.iter().map(content_item).collect();
    json!({
        "content": content,
        "isError": result.is_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_id_is_notification() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.is_notification());
        assert!(req.params.is_null());

        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"a-1","method":"ping"}"#).unwrap();
        assert_eq!(req.id, Some(json!("a-1")));
    }

    #[test]
    fn test_error_response_serialization() {
        let resp = JsonRpcResponse::error(json!(7), METHOD_NOT_FOUND, "Method not found: nope");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"error\""));
        assert!(!json.contains("\"result\""));
        assert!(json.contains("-32601"));
    }

    #[test]
    fn test_content_items_by_mime_family() {
        let png = content_item(&ContentBlock::binary(b"x", "image/png"));
        assert_eq!(png["type"], "image");
        assert_eq!(png["mimeType"], "image/png");

        let wav = content_item(&ContentBlock::binary(b"x", "audio/wav"));
        assert_eq!(wav["type"], "audio");

        let mp4 = content_item(&ContentBlock::binary(b"x", "video/mp4"));
        assert_eq!(mp4["type"], "resource");
        assert_eq!(mp4["resource"]["blob"], "eA==");
        assert_eq!(mp4["resource"]["mimeType"], "video/mp4");
    }

    #[test]
    fn test_call_result_shape() {
        let value = call_result(&ToolResult::error("boom"));
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0], json!({"type": "text", "text": "boom"}));
    }

    #[test]
    fn test_progress_notification() {
        let update = ProgressUpdate {
            progress: 3,
            message: "Generation in progress (6s)".into(),
        };
        let value = progress_notification(&json!("tok"), &update);
        assert_eq!(value["method"], "notifications/progress");
        assert_eq!(value["params"]["progressToken"], "tok");
        assert_eq!(value["params"]["progress"], 3);
    }
}
