//! MCP server implementation.
//!
//! Requests are handled one at a time, in arrival order:
//! 1. Initialize - exchange capabilities
//! 2. List tools / call tools against the Bitbucket API
//! 3. Stop at EOF

use std::sync::Arc;

use bbmcp_core::BitbucketApi;
use serde::Serialize;
use serde_json::Value;

use crate::handlers::ToolHandler;
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability, ToolsListResult,
    JSONRPC_VERSION, MCP_VERSION,
};
use crate::transport::{IncomingMessage, StdioTransport};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "bbmcp";

/// MCP server for bbmcp.
pub struct McpServer {
    handler: ToolHandler,
}

impl McpServer {
    /// Create a new MCP server backed by `api`.
    pub fn new(api: Arc<dyn BitbucketApi>) -> Self {
        Self {
            handler: ToolHandler::new(api),
        }
    }

    /// Run the MCP server on stdin/stdout until EOF.
    pub async fn run(&self) -> bbmcp_core::Result<()> {
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    /// Serve requests from `transport` until EOF.
    pub async fn serve(&self, transport: &mut StdioTransport) -> bbmcp_core::Result<()> {
        tracing::info!("Starting MCP server");

        loop {
            match transport.read_message() {
                Ok(Some(msg)) => {
                    if let Some(resp) = self.handle_message(msg).await {
                        if let Err(e) = transport.write_response(&resp) {
                            tracing::error!("Failed to write response: {}", e);
                            break;
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("EOF received, shutting down");
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    let error_resp = JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(&e.to_string()),
                    );
                    if let Err(e) = transport.write_response(&error_resp) {
                        tracing::error!("Failed to write response: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Transport error: {}", e);
                    break;
                }
            }
        }

        tracing::info!("MCP server stopped");
        Ok(())
    }

    /// Handle an incoming message. Returns `None` when nothing must be sent back.
    pub async fn handle_message(&self, msg: IncomingMessage) -> Option<JsonRpcResponse> {
        match msg {
            IncomingMessage::Request(req) => self.handle_request(req).await,
            IncomingMessage::Notification(notif) => {
                self.handle_notification(&notif.method);
                None
            }
        }
    }

    /// Handle a JSON-RPC request.
    async fn handle_request(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Handling request: {} (id: {:?})", req.method, req.id);

        // One-way methods never get a response, even when sent with an id
        if is_notification_method(&req.method) {
            self.handle_notification(&req.method);
            return None;
        }

        if req.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                req.id,
                JsonRpcError::invalid_request(&format!("unsupported jsonrpc version {}", req.jsonrpc)),
            ));
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id, req.params),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            method => {
                tracing::warn!("Unknown method: {}", method);
                JsonRpcResponse::error(req.id, JsonRpcError::method_not_found(method))
            }
        };
        Some(response)
    }

    /// Handle notifications (no response).
    fn handle_notification(&self, method: &str) {
        match method {
            "initialized" | "notifications/initialized" => {
                tracing::info!("Client initialized");
            }
            "notifications/cancelled" => {
                tracing::debug!("Request cancelled by client");
            }
            _ => {
                tracing::debug!("Ignoring notification: {}", method);
            }
        }
    }

    /// Handle initialize request.
    fn handle_initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init_params) => {
                    tracing::info!(
                        "Client: {} v{} (protocol: {})",
                        init_params.client_info.name,
                        init_params.client_info.version,
                        init_params.protocol_version
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to parse initialize params: {}", e);
                }
            }
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: true }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        success(id, &result)
    }

    /// Handle tools/list request.
    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.handler.available_tools(),
        };
        success(id, &result)
    }

    /// Handle tools/call request.
    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(&e.to_string()),
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        tracing::info!("Calling tool: {}", params.name);

        match self.handler.execute(&params.name, params.arguments).await {
            Ok(result) => success(id, &result),
            Err(e) => {
                tracing::warn!(tool = params.name.as_str(), error = %e, "Tool call failed");
                JsonRpcResponse::error(id, JsonRpcError::from_error(&e))
            }
        }
    }
}

fn is_notification_method(method: &str) -> bool {
    method == "initialized" || method.starts_with("notifications/")
}

fn success<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string())),
    }
}
