pub mod alert;
mod builtins;
pub mod calendar;
pub mod excerpt;
pub mod github;
mod registry;
mod result;
pub mod schema;
pub mod slots;

pub use builtins::{build_registry, ToolServices};
pub use registry::{RegisteredTool, ToolFuture, ToolHandler, ToolRegistry};
pub use result::ToolResult;
pub use schema::{ParamKind, ParamSpec, ToolSchema};
