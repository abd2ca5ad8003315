//! Textual tool-call directives embedded in model output.
//!
//! Grammar: `<function=NAME>{ json object }` with an optional `</function>`
//! tail. Only the first marker in a message is considered. A marker whose
//! argument object does not parse yields no directive, and the text is
//! treated as an ordinary answer.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const MARKER_OPEN: &str = "<function=";

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Map<String, Value>,
    /// Prose the model wrote before the marker.
    pub preamble: String,
}

fn marker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<function=([A-Za-z0-9_\-]+)>").expect("marker pattern is valid"))
}

pub fn detect(text: &str) -> Option<Directive> {
    let captures = marker_pattern().captures(text)?;
    let marker = captures.get(0)?;
    let name = captures.get(1)?.as_str().to_string();

    let rest = text[marker.end()..].trim_start();
    if !rest.starts_with('{') {
        return None;
    }

    // Read exactly one JSON value; whatever follows it is ignored
    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(arguments))) => Some(Directive {
            name,
            arguments,
            preamble: text[..marker.start()].to_string(),
        }),
        _ => None,
    }
}

/// Decides which first-pass tokens may reach the visitor while the model is
/// still generating. Text is released as it arrives, except a tail that could
/// be the start of a directive marker. Once a full marker shows up nothing
/// more is released until the pass ends.
#[derive(Debug, Default)]
pub struct TokenGate {
    buffer: String,
    released: usize,
    marker_seen: bool,
}

impl TokenGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one token; returns the text that is safe to forward now.
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.buffer.push_str(token);
        if self.marker_seen {
            return None;
        }

        let pending = &self.buffer[self.released..];
        let release_len = match pending.find(MARKER_OPEN) {
            Some(pos) => {
                self.marker_seen = true;
                pos
            }
            None => pending.len() - partial_marker_len(pending),
        };

        if release_len == 0 {
            return None;
        }
        let released = pending[..release_len].to_string();
        self.released += release_len;
        Some(released)
    }

    pub fn marker_seen(&self) -> bool {
        self.marker_seen
    }

    /// Everything generated so far, released or not.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Text that was held back and still needs forwarding when the pass
    /// turns out to be a plain answer.
    pub fn withheld(&self) -> &str {
        &self.buffer[self.released..]
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the marker.
fn partial_marker_len(text: &str) -> usize {
    (1..MARKER_OPEN.len())
        .rev()
        .find(|&len| text.ends_with(&MARKER_OPEN[..len]))
        .unwrap_or(0)
}
