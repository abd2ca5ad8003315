use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use tracing::{debug, info, warn};

use super::result::ToolResult;
use super::schema::ToolSchema;
use crate::error::ToolError;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

pub type ToolHandler =
    Box<dyn for<'a> Fn(&'a Map<String, Value>) -> ToolFuture<'a> + Send + Sync>;

pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
    handler: ToolHandler,
}

impl RegisteredTool {
    pub fn input_schema(&self) -> Value {
        self.schema.to_json_schema()
    }
}

/// Explicit name -> tool table, filled at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces the
    /// earlier one.
    pub fn register<F>(&mut self, name: &str, description: &str, schema: ToolSchema, handler: F)
    where
        F: for<'a> Fn(&'a Map<String, Value>) -> ToolFuture<'a> + Send + Sync + 'static,
    {
        let tool = RegisteredTool {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler: Box::new(handler),
        };

        match self.tools.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn list(&self) -> &[RegisteredTool] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    /// Tool list in the chat completions `tools` format.
    pub fn format_tools_for_llm(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema(),
                    }
                })
            })
            .collect()
    }

    /// Run a tool by name. Never fails: unknown tools, bad arguments, executor
    /// errors and executor panics all come back as a failed `ToolResult`.
    pub async fn execute(&self, name: &str, arguments: &Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return ToolResult::failure(&ToolError::UnknownTool(name.to_string()));
        };

        // Preconditions are checked before the executor can touch the network
        let args = match tool.schema.validate(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool arguments rejected");
                return ToolResult::failure(&e);
            }
        };

        let shown = Value::Object(args.clone());
        debug!(tool = %name, args = %shown, "Executing tool");
        let outcome = AssertUnwindSafe((tool.handler)(&args)).catch_unwind().await;

        match outcome {
            Ok(Ok(text)) => {
                info!(tool = %name, bytes = text.len(), "Tool succeeded");
                ToolResult::ok(text)
            }
            Ok(Err(e)) => {
                warn!(tool = %name, kind = e.kind(), error = %e, "Tool failed");
                ToolResult::failure(&e)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(tool = %name, panic = %message, "Tool panicked");
                ToolResult::failure(&ToolError::Panicked(message))
            }
        }
    }
}
