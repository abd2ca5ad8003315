pub mod cli;
pub mod config;
pub mod directive;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod server;
pub mod tools;

pub use error::{Result, ToolError, TwinError};
