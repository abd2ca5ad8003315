use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Message;

#[derive(Serialize)]
pub struct RequestBody<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [Value]>,
}

#[derive(Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Deserialize)]
pub struct ToolCallDelta {
    pub index: Option<usize>,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub delta: Option<Delta>,
}

#[derive(Deserialize)]
pub struct StreamResponse {
    pub choices: Option<Vec<Choice>>,
}
