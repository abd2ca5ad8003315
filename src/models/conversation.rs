use super::message::{Message, Role};
use super::tool::ToolCall;

/// Append-only history for one chat session.
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    turns: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            turns: Vec::new(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Message::assistant(content));
    }

    /// Record an executed tool call: the assistant turn that requested it and
    /// the result entry the model reads on its next pass. The result entry is
    /// context for the model only and never shown to the visitor.
    pub fn push_tool_exchange(&mut self, preamble: &str, call: ToolCall, result_text: String) {
        let call_id = call.id.clone();
        let preamble = preamble.trim();

        self.turns.push(Message {
            role: Role::Assistant,
            content: if preamble.is_empty() {
                None
            } else {
                Some(preamble.to_string())
            },
            tool_calls: Some(vec![call]),
            tool_call_id: None,
        });
        self.turns.push(Message {
            role: Role::Tool,
            content: Some(result_text),
            tool_calls: None,
            tool_call_id: Some(call_id),
        });
    }

    /// Full request history, system prompt first.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(self.turns.iter().cloned());
        messages
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
