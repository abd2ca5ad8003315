pub const DEFAULT_API_ENDPOINT: &str = "https://api.featherless.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct";
pub const DEFAULT_PERSONA_NAME: &str = "Digital Twin";

pub fn default_stream_timeout() -> u64 {
    60
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8000
}

pub fn default_tool_http_timeout() -> u64 {
    15
}

pub fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

pub fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

pub fn default_timezone() -> String {
    "UTC".to_string()
}

pub fn default_work_start_hour() -> u32 {
    9
}

pub fn default_work_end_hour() -> u32 {
    18
}

pub fn default_lookahead_hours() -> i64 {
    48
}
