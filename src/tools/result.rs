use serde::Serialize;

use crate::error::ToolError;

/// Outcome of one tool invocation. `text` is what the model reads next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            error: None,
        }
    }

    pub fn failure(err: &ToolError) -> Self {
        let descriptor = match err {
            ToolError::InvalidArguments(msg) => msg.clone(),
            other => other.kind().to_string(),
        };

        Self {
            success: false,
            text: format!("Error: {}", err),
            error: Some(descriptor),
        }
    }
}
