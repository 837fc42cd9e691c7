//! Read-only discovery documents: the model catalog and the language-code table.

use serde_json::{Value, json};

use genmedia_registry::CapabilityRegistry;

use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, JsonRpcResponse};

pub const CATALOG_URI: &str = "genmedia://catalog";
pub const LANGUAGE_CODES_URI: &str = "genmedia://language_codes";

/// resources/list
pub fn handle_list(id: Value) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "resources": [
                {
                    "uri": CATALOG_URI,
                    "name": "Model catalog",
                    "description": "Supported models per media type with aliases and constraints (durations, aspect ratios, output limits).",
                    "mimeType": "application/json",
                },
                {
                    "uri": LANGUAGE_CODES_URI,
                    "name": "Language codes",
                    "description": "Descriptive language names mapped to BCP-47 codes, for speech and voice lookup.",
                    "mimeType": "application/json",
                },
            ]
        }),
    )
}

/// resources/read
///
/// Params:
///   - uri: string (required)
pub fn handle_read(params: &Value, id: Value, registry: &CapabilityRegistry) -> JsonRpcResponse {
    let Some(uri) = params.get("uri").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing 'uri' parameter");
    };
    let document = match uri {
        CATALOG_URI => registry.catalog_json(),
        LANGUAGE_CODES_URI => registry.languages().to_json(),
        other => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown resource: {other}"));
        }
    };
    let text = match serde_json::to_string_pretty(&document) {
        Ok(text) => text,
        Err(e) => return JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    };

    JsonRpcResponse::success(
        id,
        json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": text,
            }]
        }),
    )
}
