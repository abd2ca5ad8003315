pub mod client;
pub mod models;
pub mod streaming;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Message, ToolCall};

pub use client::{make_api_request, OpenAiBackend};
pub use streaming::process_streaming_response;

/// Everything one generation pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    /// Complete native function calls, in the order the model opened them.
    pub tool_calls: Vec<ToolCall>,
}

/// A chat model that streams its answer token by token.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one generation over `messages`. Every content fragment is passed
    /// to `on_token` as soon as it arrives; the full pass is returned at the
    /// end. `tools` is advertised to the model when given.
    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Completion>;
}
