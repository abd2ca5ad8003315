pub mod handler;
pub mod types;

pub use handler::handle_message;
pub use types::{JsonRpcRequest, JsonRpcResponse, McpToolCall};
