//! MCP server implementation

use serde::Deserialize;
use tokio::sync::watch;

use crate::handlers::{ToolCallRequest, ToolHandler};
use crate::tools::get_tools;
use crate::transport::{
    Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, StdioTransport, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND,
};

const SERVER_NAME: &str = "kubescope";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method of the notification sent when a new graph is committed
pub const GRAPH_CHANGED: &str = "notifications/graph/changed";

/// MCP Server for kubescope
pub struct McpServer {
    handler: ToolHandler,
}

impl McpServer {
    pub fn new(handler: ToolHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }

    /// Receiver that yields the generation of every committed graph
    pub fn graph_changes(&self) -> watch::Receiver<u64> {
        self.handler.topology().subscribe()
    }

    /// Notification announcing a committed graph
    pub fn graph_changed_notification(generation: u64) -> JsonRpcNotification {
        JsonRpcNotification::new(GRAPH_CHANGED, serde_json::json!({ "generation": generation }))
    }

    /// Start the MCP server on stdio
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        tracing::info!("Starting MCP server on stdio");

        let mut transport = StdioTransport::new();
        let mut changes = self.graph_changes();

        loop {
            tokio::select! {
                message = transport.read_message() => match message {
                    Ok(Some(Incoming::Request(request))) => {
                        tracing::debug!("Received request: {:?}", request.method);
                        if let Some(response) = self.handle_request_public(request).await {
                            if let Err(e) = transport.write(&response).await {
                                tracing::error!("Failed to write response: {}", e);
                            }
                        }
                    }
                    Ok(Some(Incoming::Malformed(response))) => {
                        tracing::warn!("Rejected malformed message");
                        if let Err(e) = transport.write(&response).await {
                            tracing::error!("Failed to write response: {}", e);
                        }
                    }
                    Ok(None) => {
                        tracing::info!("EOF on stdin, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read request: {}", e);
                        break;
                    }
                },
                changed = changes.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    let generation = *changes.borrow_and_update();
                    let notification = Self::graph_changed_notification(generation);
                    if let Err(e) = transport.write(&notification).await {
                        tracing::error!("Failed to write notification: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle a JSON-RPC message (public for SSE transport). Notifications get no response.
    pub async fn handle_request_public(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!("Notification: {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or(serde_json::Value::Null);
        Some(self.handle_request(id, request).await)
    }

    async fn handle_request(&self, id: serde_json::Value, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", request.method)),
        }
    }

    fn handle_initialize(&self, id: serde_json::Value) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_tools_list(&self, id: serde_json::Value) -> JsonRpcResponse {
        let tools = get_tools();
        JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: serde_json::Value, params: serde_json::Value) -> JsonRpcResponse {
        #[derive(Deserialize)]
        struct ToolCallParams {
            name: String,
            #[serde(default)]
            arguments: serde_json::Value,
        }

        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        };

        tracing::debug!("Tool call: {} with args: {:?}", params.name, params.arguments);

        let response = self
            .handler
            .handle(ToolCallRequest {
                name: params.name,
                arguments: params.arguments,
            })
            .await;

        match serde_json::to_value(response) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Serialization error: {}", e)),
        }
    }
}
