use serde_json::{json, Value};
use twinchat::mcp::handle_message;
use twinchat::tools::{ParamKind, ParamSpec, ToolRegistry, ToolSchema};

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(
        "get_calendar_slots",
        "Find open slots",
        ToolSchema::new(vec![ParamSpec::required(
            "duration",
            ParamKind::Integer,
            "Minutes",
        )
        .with_range(1, 480)]),
        |args| {
            let duration = args["duration"].as_i64().unwrap_or_default();
            Box::pin(async move { Ok(format!("{} minutes free at 10:00", duration)) })
        },
    );
    registry
}

async fn call(body: Value) -> Value {
    let bytes = serde_json::to_vec(&body).unwrap();
    let response = handle_message(&registry(), &bytes).await.expect("response");
    serde_json::to_value(response).unwrap()
}

#[tokio::test]
async fn test_initialize_advertises_tools() {
    let response = call(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).await;

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["serverInfo"]["name"], "twinchat");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert!(response["result"]["protocolVersion"].is_string());
}

#[tokio::test]
async fn test_tools_list_includes_schema() {
    let response = call(json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"})).await;

    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "get_calendar_slots");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["duration"]));
    assert_eq!(tools[0]["inputSchema"]["properties"]["duration"]["maximum"], 480);
}

#[tokio::test]
async fn test_tools_call_returns_text_content() {
    let response = call(json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": "get_calendar_slots", "arguments": {"duration": 30}}
    }))
    .await;

    assert_eq!(response["result"]["isError"], false);
    assert_eq!(response["result"]["content"][0]["type"], "text");
    assert_eq!(
        response["result"]["content"][0]["text"],
        "30 minutes free at 10:00"
    );
}

#[tokio::test]
async fn test_tool_failure_is_flagged_not_faulted() {
    let response = call(json!({
        "jsonrpc": "2.0",
        "id": 8,
        "method": "tools/call",
        "params": {"name": "get_calendar_slots", "arguments": {}}
    }))
    .await;

    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert!(response["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("missing required argument: duration"));
}

#[tokio::test]
async fn test_unknown_method() {
    let response = call(json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_malformed_params() {
    let response = call(json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {"arguments": {}}
    }))
    .await;
    assert_eq!(response["error"]["code"], -32602);

    let response = call(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call"})).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_invalid_request_bodies() {
    let response = handle_message(&registry(), b"not json").await.unwrap();
    assert_eq!(response.error.unwrap().code, -32600);
    assert_eq!(response.id, Value::Null);

    let response = call(json!({"jsonrpc": "1.0", "id": 5, "method": "tools/list"})).await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 5);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let body = serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }))
    .unwrap();
    assert!(handle_message(&registry(), &body).await.is_none());
}

#[tokio::test]
async fn test_null_id_is_a_request_not_a_notification() {
    let body = br#"{"jsonrpc": "2.0", "id": null, "method": "tools/list"}"#;
    let response = handle_message(&registry(), body)
        .await
        .expect("null id still gets an answer");

    assert_eq!(response.id, Value::Null);
    assert!(response.result.is_some());
}
