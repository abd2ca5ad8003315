use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::models::{StreamResponse, ToolCallDelta};
use super::Completion;
use crate::error::{Result, TwinError};
use crate::models::ToolCall;

/// Upper bound on parallel calls tracked per pass.
const MAX_TOOL_CALLS: usize = 16;

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Reassembles native function calls from streamed fragments.
#[derive(Default)]
struct ToolCallAccumulator {
    calls: Vec<PartialCall>,
}

impl ToolCallAccumulator {
    fn apply(&mut self, delta: ToolCallDelta) {
        let index = match delta.index {
            Some(index) => index,
            None if delta.id.is_some() || self.calls.is_empty() => self.calls.len(),
            None => self.calls.len() - 1,
        };
        if index >= MAX_TOOL_CALLS {
            debug!(index, "Ignoring tool call fragment with out-of-range index");
            return;
        }
        while self.calls.len() <= index {
            self.calls.push(PartialCall::default());
        }

        let call = &mut self.calls[index];
        if let Some(id) = delta.id {
            call.id = Some(id);
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                call.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let id = call
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                ToolCall::function(id, call.name, call.arguments)
            })
            .collect()
    }
}

/// Read a server-sent-events body of chat completion chunks.
///
/// Content fragments go to `on_token` as they arrive. The stream ends at
/// `data: [DONE]` or when the body closes; a gap longer than `timeout_secs`
/// between chunks is an error.
pub async fn process_streaming_response<S>(
    stream: S,
    timeout_secs: u64,
    on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
) -> Result<Completion>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send,
{
    let mut stream = Box::pin(stream);
    // Bytes, not text: a multi-byte character may straddle two chunks
    let mut incomplete_line: Vec<u8> = Vec::new();
    let mut content = String::new();
    let mut tool_calls = ToolCallAccumulator::default();
    let chunk_timeout = Duration::from_secs(timeout_secs);
    let mut finished = false;

    while !finished {
        match timeout(chunk_timeout, stream.next()).await {
            Ok(Some(chunk)) => {
                let chunk = chunk.map_err(TwinError::NetworkError)?;
                incomplete_line.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(_) => return Err(TwinError::Timeout),
        }

        // Only complete lines are parsed; the tail waits for the next chunk
        let Some(last_newline_pos) = incomplete_line.iter().rposition(|&b| b == b'\n') else {
            continue;
        };
        let complete: Vec<u8> = incomplete_line.drain(..=last_newline_pos).collect();
        let complete = String::from_utf8_lossy(&complete);

        for line in complete.lines() {
            if handle_line(line, &mut content, &mut tool_calls, on_token) {
                finished = true;
                break;
            }
        }
    }

    // A body that closes without a trailing newline still counts
    if !finished {
        let rest = String::from_utf8_lossy(&incomplete_line);
        if !rest.trim().is_empty() {
            handle_line(&rest, &mut content, &mut tool_calls, on_token);
        }
    }

    Ok(Completion {
        content,
        tool_calls: tool_calls.finish(),
    })
}

/// Returns true on the `[DONE]` sentinel.
fn handle_line(
    line: &str,
    content: &mut String,
    tool_calls: &mut ToolCallAccumulator,
    on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
) -> bool {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return false;
    }

    let Some(colon_pos) = line.find(':') else {
        return false;
    };
    let field = line[..colon_pos].trim();
    let value = line[colon_pos + 1..].trim_start();

    match field {
        "data" => {
            if value == "[DONE]" {
                return true;
            }

            match serde_json::from_str::<StreamResponse>(value) {
                Ok(parsed) => {
                    for choice in parsed.choices.unwrap_or_default() {
                        let Some(delta) = choice.delta else {
                            continue;
                        };
                        if let Some(fragment) = delta.content.filter(|c| !c.is_empty()) {
                            content.push_str(&fragment);
                            on_token(&fragment);
                        }
                        for call in delta.tool_calls.unwrap_or_default() {
                            tool_calls.apply(call);
                        }
                    }
                }
                Err(e) => debug!(error = %e, "Skipping unparseable stream chunk"),
            }
        }
        "event" | "id" | "retry" => debug!(field = %field, value = %value, "SSE metadata"),
        _ => debug!(field = %field, "Unknown SSE field"),
    }

    false
}
