use serde::{Deserialize, Serialize};

/// One frame on the chat WebSocket. Clients rebuild the answer by
/// concatenating `Token` contents in arrival order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Log { message: String },
    Token { content: String },
    Done,
    Error { message: String },
}

impl ServerEvent {
    pub fn log(message: impl Into<String>) -> Self {
        ServerEvent::Log {
            message: message.into(),
        }
    }

    pub fn token(content: impl Into<String>) -> Self {
        ServerEvent::Token {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
