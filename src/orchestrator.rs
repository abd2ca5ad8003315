use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::directive::{self, Directive, TokenGate};
use crate::error::Result;
use crate::llm::{ChatBackend, Completion};
use crate::models::{Conversation, ServerEvent, ToolCall};
use crate::tools::{ToolRegistry, ToolResult};

const ECHO_CHARS: usize = 20;

/// What one user turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text the visitor saw as tokens.
    pub answer: String,
    /// Tool name and result when the first pass asked for one.
    pub tool: Option<(String, ToolResult)>,
}

/// Drives the two-pass generation for every session. Cheap to share: all
/// per-session state lives in the caller's `Conversation`.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    tool_definitions: Vec<Value>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, registry: Arc<ToolRegistry>) -> Self {
        let tool_definitions = registry.format_tools_for_llm();
        Self {
            backend,
            registry,
            tool_definitions,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one user turn. Progress goes out on `events` as it happens; the
    /// caller sends the terminal `done` or `error` frame. A closed receiver
    /// is not an error here, the caller notices it on its own.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
        events: &UnboundedSender<ServerEvent>,
    ) -> Result<TurnOutcome> {
        let echo: String = user_message.chars().take(ECHO_CHARS).collect();
        let ellipsis = if user_message.chars().count() > ECHO_CHARS { "..." } else { "" };
        let _ = events.send(ServerEvent::log(format!("Received: {}{}", echo, ellipsis)));

        conversation.push_user(user_message);

        // First pass: tools advertised, tokens gated against a directive marker
        let mut gate = TokenGate::new();
        let first = {
            let gate = &mut gate;
            let mut on_token = |token: &str| {
                if let Some(visible) = gate.push(token) {
                    let _ = events.send(ServerEvent::token(visible));
                }
            };
            self.backend
                .stream_chat(
                    &conversation.to_messages(),
                    Some(self.tool_definitions.as_slice()),
                    &mut on_token,
                )
                .await?
        };

        let Some(found) = self.find_directive(&first, &gate) else {
            let withheld = gate.withheld();
            if !withheld.is_empty() {
                let _ = events.send(ServerEvent::token(withheld));
            }
            let answer = gate.text().to_string();
            conversation.push_assistant(answer.clone());
            debug!(chars = answer.len(), "Answered without a tool");
            return Ok(TurnOutcome { answer, tool: None });
        };

        let arguments = Value::Object(found.arguments);
        let _ = events.send(ServerEvent::log(format!("Tool call detected: {}", found.name)));
        let _ = events.send(ServerEvent::log(format!(
            "Executing {} with {}",
            found.name, arguments
        )));
        info!(tool = %found.name, "Running tool for turn");

        let result = self.registry.execute(&found.name, &arguments).await;
        let _ = events.send(ServerEvent::log(if result.success {
            format!("Tool {} complete", found.name)
        } else {
            format!("Tool {} failed", found.name)
        }));

        let call = ToolCall::function(
            format!("call_{}", uuid::Uuid::new_v4().simple()),
            found.name.clone(),
            arguments.to_string(),
        );
        conversation.push_tool_exchange(&found.preamble, call, result.text.clone());

        // Second pass: no tools, every token goes straight out
        let mut on_token = |token: &str| {
            let _ = events.send(ServerEvent::token(token));
        };
        let second = self
            .backend
            .stream_chat(&conversation.to_messages(), None, &mut on_token)
            .await?;

        conversation.push_assistant(second.content.clone());
        Ok(TurnOutcome {
            answer: second.content,
            tool: Some((found.name, result)),
        })
    }

    /// A native function call wins over the textual marker.
    fn find_directive(&self, first: &Completion, gate: &TokenGate) -> Option<Directive> {
        if let Some(call) = first.tool_calls.first() {
            let raw = call.function.arguments.trim();
            let arguments = if raw.is_empty() {
                Some(Map::new())
            } else {
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(map)) => Some(map),
                    _ => None,
                }
            };
            match arguments {
                Some(arguments) => {
                    return Some(Directive {
                        name: call.function.name.clone(),
                        arguments,
                        preamble: gate.text().to_string(),
                    })
                }
                None => warn!(tool = %call.function.name, "Ignoring native tool call with malformed arguments"),
            }
        }

        directive::detect(gate.text())
    }
}
