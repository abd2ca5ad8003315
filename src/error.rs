use std::fmt;

#[derive(Debug)]
pub enum TwinError {
    ApiError {
        status: u16,
        message: String,
    },
    ConfigError(String),
    NetworkError(reqwest::Error),
    Timeout,
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    YamlError(serde_yaml::Error),
    Other(String),
}

impl fmt::Display for TwinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwinError::ApiError { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            TwinError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            TwinError::NetworkError(e) => write!(f, "Network error: {}", e),
            TwinError::Timeout => write!(f, "Model stream timed out"),
            TwinError::IoError(e) => write!(f, "IO error: {}", e),
            TwinError::JsonError(e) => write!(f, "JSON error: {}", e),
            TwinError::YamlError(e) => write!(f, "YAML error: {}", e),
            TwinError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TwinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TwinError::NetworkError(e) => Some(e),
            TwinError::IoError(e) => Some(e),
            TwinError::JsonError(e) => Some(e),
            TwinError::YamlError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TwinError {
    fn from(err: reqwest::Error) -> Self {
        TwinError::NetworkError(err)
    }
}

impl From<std::io::Error> for TwinError {
    fn from(err: std::io::Error) -> Self {
        TwinError::IoError(err)
    }
}

impl From<serde_json::Error> for TwinError {
    fn from(err: serde_json::Error) -> Self {
        TwinError::JsonError(err)
    }
}

impl From<serde_yaml::Error> for TwinError {
    fn from(err: serde_yaml::Error) -> Self {
        TwinError::YamlError(err)
    }
}

impl From<anyhow::Error> for TwinError {
    fn from(err: anyhow::Error) -> Self {
        TwinError::Other(format!("{:#}", err))
    }
}

impl From<String> for TwinError {
    fn from(msg: String) -> Self {
        TwinError::Other(msg)
    }
}

impl From<&str> for TwinError {
    fn from(msg: &str) -> Self {
        TwinError::Other(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TwinError>;

/// Failure raised inside a tool executor. The registry turns every variant
/// into a failed `ToolResult`; nothing of this type escapes to the chat loop.
#[derive(Debug)]
pub enum ToolError {
    /// Credential, URL or identifier missing. Detected before any request.
    Config(String),
    InvalidArguments(String),
    UnknownTool(String),
    Upstream {
        status: u16,
        body: String,
    },
    Network(reqwest::Error),
    Decode(String),
    Panicked(String),
}

impl ToolError {
    /// Short machine-readable descriptor carried on failed results.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Config(_) => "configuration",
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::UnknownTool(_) => "unknown tool",
            ToolError::Upstream { .. } => "upstream",
            ToolError::Network(_) => "network",
            ToolError::Decode(_) => "decode",
            ToolError::Panicked(_) => "internal",
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ToolError::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: '{}'", name),
            ToolError::Upstream { status, body } => {
                write!(f, "Upstream API error (HTTP {}): {}", status, body)
            }
            ToolError::Network(e) => write!(f, "Request failed: {}", e),
            ToolError::Decode(msg) => write!(f, "Failed to decode response: {}", msg),
            ToolError::Panicked(msg) => write!(f, "Tool crashed: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Network(err)
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Decode(err.to_string())
    }
}
