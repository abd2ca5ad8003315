use serde::{Deserialize, Serialize};

use crate::config::defaults::{
    default_calendar_api_base, default_github_api_base, default_lookahead_hours,
    default_timezone, default_tool_http_timeout, default_work_end_hour, default_work_start_hour,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tool_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub alert: AlertConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_tool_http_timeout(),
            github: GithubConfig::default(),
            calendar: CalendarConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: Option<String>,
    /// Account whose code and repositories are searched.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            api_base: default_github_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// Service-account key as inline JSON.
    #[serde(default)]
    pub credentials_json: Option<String>,
    /// Path to a service-account key file. Used when no inline key is set.
    #[serde(default)]
    pub credentials_path: Option<String>,
    #[serde(default)]
    pub calendar_id: Option<String>,
    /// IANA zone the working-hours band is expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_work_start_hour")]
    pub work_start_hour: u32,
    #[serde(default = "default_work_end_hour")]
    pub work_end_hour: u32,
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
    #[serde(default = "default_calendar_api_base")]
    pub api_base: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            credentials_json: None,
            credentials_path: None,
            calendar_id: None,
            timezone: default_timezone(),
            work_start_hour: default_work_start_hour(),
            work_end_hour: default_work_end_hour(),
            lookahead_hours: default_lookahead_hours(),
            api_base: default_calendar_api_base(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}
