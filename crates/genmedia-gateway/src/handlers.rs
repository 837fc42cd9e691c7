//! MCP method handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use genmedia_registry::CapabilityRegistry;
use genmedia_types::{ProgressUpdate, ToolInvocation};

use crate::dispatcher::ToolDispatcher;
use crate::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, SERVER_NAME, call_result, progress_notification,
};
use crate::{prompts, resources};

/// Per-request context supplied by the transport.
#[derive(Clone, Default)]
pub struct CallContext {
    /// Fires when the caller goes away.
    pub cancel: CancellationToken,
    /// Channel for server-initiated messages. `None` when the transport cannot push.
    pub notifier: Option<mpsc::UnboundedSender<Value>>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: mpsc::UnboundedSender<Value>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// The protocol surface shared by every transport.
pub struct McpServer {
    dispatcher: Arc<ToolDispatcher>,
    registry: Arc<CapabilityRegistry>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl McpServer {
    pub fn new(dispatcher: Arc<ToolDispatcher>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            dispatcher,
            registry,
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Handle one raw frame. Returns `None` for notifications.
    pub async fn handle_text(&self, text: &str, ctx: &CallContext) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.handle_value(value, ctx).await,
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
        }
    }

    pub async fn handle_value(&self, value: Value, ctx: &CallContext) -> Option<JsonRpcResponse> {
        if value.is_array() {
            return Some(JsonRpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                "Batch requests are not supported",
            ));
        }
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request, ctx).await,
            Err(e) => Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Invalid request: {e}"),
            )),
        }
    }

    /// Route a request to its method handler.
    pub async fn handle(&self, request: JsonRpcRequest, ctx: &CallContext) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return request.id.map(|id| {
                JsonRpcResponse::error(id, INVALID_REQUEST, "jsonrpc must be \"2.0\"")
            });
        }
        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        let params = &request.params;
        let response = match request.method.as_str() {
            "initialize" => handle_initialize(params, id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(params, id, ctx).await,
            "resources/list" => resources::handle_list(id),
            "resources/read" => resources::handle_read(params, id, &self.registry),
            "prompts/list" => prompts::handle_list(id),
            "prompts/get" => prompts::handle_get(params, id, &self.dispatcher, ctx).await,
            method => {
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
            }
        };
        Some(response)
    }

    /// tools/list — every registered tool with its input schema.
    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": self.dispatcher.definitions() }))
    }

    /// tools/call — run a tool, streaming poll ticks when the caller asked for them.
    ///
    /// Params:
    ///   - name: string (required)
    ///   - arguments: object (optional)
    ///   - _meta.progressToken: string | number (optional)
    async fn handle_tools_call(&self, params: &Value, id: Value, ctx: &CallContext) -> JsonRpcResponse {
        let call: CallParams = match serde_json::from_value(params.clone()) {
            Ok(call) => call,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid tools/call params: {e}"),
                );
            }
        };

        let token = call.meta.and_then(|m| m.progress_token);
        let (sink, forwarder) = match (token, &ctx.notifier) {
            (Some(token), Some(notifier)) => {
                let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
                let notifier = notifier.clone();
                let forwarder = tokio::spawn(async move {
                    while let Some(update) = rx.recv().await {
                        if notifier.send(progress_notification(&token, &update)).is_err() {
                            break;
                        }
                    }
                });
                (Some(tx), Some(forwarder))
            }
            _ => (None, None),
        };

        let result = self
            .dispatcher
            .dispatch(
                ToolInvocation::new(call.name, call.arguments),
                ctx.cancel.clone(),
                sink,
            )
            .await;
        // Drain pending ticks so they reach the client before the response.
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }
        JsonRpcResponse::success(id, call_result(&result))
    }
}

#[derive(Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default, rename = "_meta")]
    meta: Option<CallMeta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallMeta {
    #[serde(default)]
    progress_token: Option<Value>,
}

/// initialize — server identity and capabilities.
fn handle_initialize(params: &Value, id: Value) -> JsonRpcResponse {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    let client = params
        .pointer("/clientInfo/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!(client, protocol = version, "Client initialized");

    JsonRpcResponse::success(
        id,
        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false },
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        }),
    )
}
