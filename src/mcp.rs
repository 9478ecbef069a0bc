//! MCP JSON-RPC message handling
//!
//! Transport independent: the HTTP layer hands raw message bodies to
//! [`McpServer::handle_raw`] and forwards whatever response comes back.
//! Notifications produce no response.

use crate::tools::{is_error, NocoDbTools, ToolName};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const SERVER_NAME: &str = "NocoDB MCP Server";

/// Protocol revisions this server speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// JSON-RPC request or notification (a notification has no `id`)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// MCP method dispatcher exposing the NocoDB tools
#[derive(Clone)]
pub struct McpServer {
    tools: NocoDbTools,
}

impl McpServer {
    pub fn new(tools: NocoDbTools) -> Self {
        Self { tools }
    }

    /// Handle one raw message body
    pub async fn handle_raw(&self, body: &[u8]) -> Option<JsonRpcResponse> {
        match serde_json::from_slice::<Value>(body) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::debug!("Unparseable MCP message: {}", e);
                Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Handle one decoded message
    pub async fn handle_message(&self, message: Value) -> Option<JsonRpcResponse> {
        // Client replies to server requests carry no method; nothing to answer.
        if message.get("method").is_none()
            && (message.get("result").is_some() || message.get("error").is_some())
        {
            return None;
        }

        let id = message.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(message) {
            Ok(request) if request.jsonrpc == JSONRPC_VERSION => self.handle_request(request).await,
            Ok(_) => Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("Invalid Request: {}", e),
            )),
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = match request.id {
            Some(id) if !id.is_null() => id,
            _ => {
                tracing::debug!("Received notification '{}'", request.method);
                return None;
            }
        };
        tracing::debug!("Handling MCP method '{}'", request.method);

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize(request.params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({"tools": self.tools.definitions()})),
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

        if let Some(client) = params.and_then(|p| p.get("clientInfo")) {
            tracing::info!("MCP client connected: {}", client);
        }

        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": {"listChanged": false}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
            None => return JsonRpcResponse::failure(id, INVALID_PARAMS, "Invalid params"),
        };

        let tool: ToolName = match params.name.parse() {
            Ok(tool) => tool,
            Err(message) => return JsonRpcResponse::failure(id, INVALID_PARAMS, message),
        };

        let output = self.tools.call(tool, params.arguments).await;
        let mut result = json!({
            "content": [{"type": "text", "text": output.to_string()}],
            "isError": is_error(&output),
        });
        if output.is_object() {
            result["structuredContent"] = output;
        }
        JsonRpcResponse::success(id, result)
    }
}
