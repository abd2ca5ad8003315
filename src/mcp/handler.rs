use serde_json::Value;
use tracing::{debug, warn};

use super::types::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, McpTool, McpToolCall, McpToolResult,
    ServerCapabilities, ServerInfo, ToolContent, ToolListResponse, ToolsCapability,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;

/// Answer one JSON-RPC message against the registry. Notifications get no
/// response.
pub async fn handle_message(registry: &ToolRegistry, body: &[u8]) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejecting malformed JSON-RPC body");
            return Some(JsonRpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            ));
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::error(
            request.id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
        ));
    }

    let Some(id) = request.id.clone() else {
        debug!(method = %request.method, "Notification received");
        return None;
    };

    debug!(method = %request.method, "JSON-RPC request");
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "tools/list" => JsonRpcResponse::success(id, list_tools(registry)),
        "tools/call" => call_tool(registry, id, request.params).await,
        other => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        ),
    };
    Some(response)
}

fn initialize_result() -> Value {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        server_info: ServerInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        },
    };
    serde_json::to_value(result).unwrap_or(Value::Null)
}

fn list_tools(registry: &ToolRegistry) -> Value {
    let tools = registry
        .list()
        .iter()
        .map(|tool| McpTool {
            name: tool.name.clone(),
            description: Some(tool.description.clone()),
            input_schema: tool.input_schema(),
        })
        .collect();
    serde_json::to_value(ToolListResponse { tools }).unwrap_or(Value::Null)
}

async fn call_tool(registry: &ToolRegistry, id: Value, params: Option<Value>) -> JsonRpcResponse {
    let call: McpToolCall = match params.map(serde_json::from_value) {
        Some(Ok(call)) => call,
        Some(Err(e)) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
        }
        None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
    };

    let result = registry.execute(&call.name, &call.arguments).await;
    let payload = McpToolResult {
        content: vec![ToolContent::text(result.text)],
        is_error: !result.success,
    };
    match serde_json::to_value(payload) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}
