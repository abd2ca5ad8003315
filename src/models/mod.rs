mod conversation;
mod event;
mod message;
mod tool;

pub use conversation::Conversation;
pub use event::ServerEvent;
pub use message::{Message, Role};
pub use tool::{FunctionCall, ToolCall};
