mod api;
pub mod defaults;
mod tools;
mod validation;

use crate::cli::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use api::{ApiConfig, ModelConfig, ServerConfig};
pub use tools::{AlertConfig, CalendarConfig, GithubConfig, ToolsConfig};
pub use validation::{expand_env_var_in_string, expand_optional};

use defaults::{
    default_host, default_port, default_stream_timeout, DEFAULT_API_ENDPOINT, DEFAULT_MODEL,
    DEFAULT_PERSONA_NAME,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_endpoint: String,
    pub model: String,
    pub persona_name: String,
    pub system_prompt: Option<String>,
    pub stream_timeout: u64,
    pub verbose: bool,
    pub host: String,
    pub port: u16,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    pub fn from_env_and_args(args: &Args) -> Result<Self, String> {
        let file_config = match args.config.as_deref() {
            Some(path) => FileConfig::load_from(Path::new(path)).map_err(|e| format!("{:#}", e))?,
            None => FileConfig::load().map_err(|e| format!("{:#}", e))?,
        };

        Self::resolve(args, file_config, |name| env::var(name).ok())
    }

    /// Merge CLI flags > environment > config file > defaults.
    pub fn resolve<F>(args: &Args, file: FileConfig, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // The key stays an env var so it never lands in a config file
        let api_key = env_value("TWIN_API_KEY")
            .or_else(|| env_value("FEATHERLESS_API_KEY"))
            .ok_or("TWIN_API_KEY environment variable not set")?;

        let api_endpoint = args
            .api_endpoint
            .clone()
            .or_else(|| env_value("TWIN_API_ENDPOINT"))
            .or(file.api.endpoint.clone())
            .map(|endpoint| normalize_endpoint(&endpoint))
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());

        let model = args
            .model
            .clone()
            .or_else(|| env_value("TWIN_MODEL"))
            .or(file.model.default_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let persona_name = env_value("TWIN_PERSONA_NAME")
            .or(file.model.persona_name.clone())
            .unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string());

        let system_prompt = env_value("TWIN_SYSTEM_PROMPT").or(file.model.system_prompt.clone());

        let stream_timeout = env_value("TWIN_STREAM_TIMEOUT")
            .and_then(|s| s.parse::<u64>().ok())
            .or(file.api.stream_timeout)
            .unwrap_or_else(default_stream_timeout);

        let verbose = args.verbose
            || env_value("TWIN_VERBOSE")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .or(file.server.verbose)
                .unwrap_or(false);

        let host = args
            .host
            .clone()
            .or_else(|| env_value("TWIN_HOST"))
            .or(file.server.host.clone())
            .unwrap_or_else(default_host);

        let port = match args.port {
            Some(port) => port,
            None => match env_value("TWIN_PORT") {
                Some(raw) => raw
                    .parse::<u16>()
                    .map_err(|_| format!("TWIN_PORT is not a valid port: {}", raw))?,
                None => file.server.port.unwrap_or_else(default_port),
            },
        };

        let tools = Self::resolve_tools(file.tools, &lookup);

        Ok(Config {
            api_key,
            api_endpoint,
            model,
            persona_name,
            system_prompt,
            stream_timeout,
            verbose,
            host,
            port,
            tools,
        })
    }

    fn resolve_tools<F>(file: ToolsConfig, lookup: &F) -> ToolsConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let from_file = |value: Option<&String>| expand_optional(value, lookup);

        let github = GithubConfig {
            token: env_value("GITHUB_TOKEN").or_else(|| from_file(file.github.token.as_ref())),
            username: env_value("GITHUB_USERNAME")
                .or_else(|| from_file(file.github.username.as_ref())),
            api_base: file.github.api_base.trim_end_matches('/').to_string(),
        };

        let calendar = CalendarConfig {
            credentials_json: env_value("GOOGLE_SERVICE_ACCOUNT_JSON")
                .or_else(|| from_file(file.calendar.credentials_json.as_ref())),
            credentials_path: env_value("GOOGLE_APPLICATION_CREDENTIALS")
                .or_else(|| from_file(file.calendar.credentials_path.as_ref())),
            calendar_id: env_value("GOOGLE_CALENDAR_ID")
                .or_else(|| from_file(file.calendar.calendar_id.as_ref())),
            timezone: env_value("TWIN_TIMEZONE").unwrap_or(file.calendar.timezone),
            api_base: file.calendar.api_base.trim_end_matches('/').to_string(),
            ..file.calendar
        };

        let alert = AlertConfig {
            webhook_url: env_value("DISCORD_WEBHOOK_URL")
                .or_else(|| from_file(file.alert.webhook_url.as_ref())),
        };

        ToolsConfig {
            http_timeout_secs: file.http_timeout_secs,
            github,
            calendar,
            alert,
        }
    }
}

/// Accept either a full `/chat/completions` URL or an API base URL.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.ends_with("/chat/completions") {
        endpoint.to_string()
    } else if endpoint.ends_with("/v1") {
        format!("{}/chat/completions", endpoint)
    } else if endpoint.ends_with("/v1/") {
        format!("{}chat/completions", endpoint)
    } else {
        format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'))
    }
}

impl FileConfig {
    pub fn load() -> Result<Self> {
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(FileConfig::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());
        let config = if extension == Some("json") {
            serde_json::from_str(&contents).with_context(|| {
                format!("Failed to parse JSON config file: {}", path.display())
            })?
        } else {
            serde_yaml::from_str(&contents).with_context(|| {
                format!("Failed to parse YAML config file: {}", path.display())
            })?
        };

        Ok(config)
    }

    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".twinchat.yaml"),
            PathBuf::from(".twinchat.yml"),
            PathBuf::from(".twinchat.json"),
        ];

        if let Some(home_dir) = dirs::home_dir() {
            let config_dir = home_dir.join(".config").join("twinchat");
            paths.push(config_dir.join("twinchat.yaml"));
            paths.push(config_dir.join("twinchat.yml"));
            paths.push(config_dir.join("twinchat.json"));
        }

        paths
    }
}
