use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::alert::{send_alert, AlertRequest, AlertSender, HttpAlertSender};
use super::calendar::{get_calendar_slots, CalendarHandle};
use super::github::{search_github, GithubApi, GithubClient};
use super::registry::ToolRegistry;
use super::schema::{ParamKind, ParamSpec, ToolSchema};
use crate::config::{Config, ToolsConfig};
use crate::error::{Result, ToolError};

/// Collaborators shared by every session. Built once per process.
pub struct ToolServices {
    pub persona_name: String,
    /// `Err` holds the configuration problem reported on each call.
    pub github: std::result::Result<Arc<dyn GithubApi>, String>,
    pub calendar: Arc<CalendarHandle>,
    pub alerts: Arc<dyn AlertSender>,
    pub webhook_url: Option<String>,
}

impl ToolServices {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.persona_name, &config.tools)
    }

    pub fn new(persona_name: &str, tools: &ToolsConfig) -> Result<Self> {
        let timeout = Duration::from_secs(tools.http_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let github = match GithubClient::from_config(&tools.github, timeout) {
            Ok(client) => Ok(Arc::new(client) as Arc<dyn GithubApi>),
            Err(e) => {
                info!(reason = %e, "GitHub search unavailable until configured");
                Err(e.to_string())
            }
        };

        Ok(Self {
            persona_name: persona_name.to_string(),
            github,
            calendar: Arc::new(CalendarHandle::new(tools.calendar.clone(), http.clone())),
            alerts: Arc::new(HttpAlertSender::new(http)),
            webhook_url: tools.alert.webhook_url.clone(),
        })
    }
}

fn string_arg(args: &Map<String, Value>, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn build_registry(services: Arc<ToolServices>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let github_services = services.clone();
    registry.register(
        "github_search",
        "Search the owner's GitHub code and repositories. Use it to show evidence of technical skills.",
        ToolSchema::new(vec![ParamSpec::required(
            "query",
            ParamKind::String,
            "Technology, topic or project to look for",
        )]),
        move |args| {
            let services = github_services.clone();
            let query = string_arg(args, "query");
            Box::pin(async move {
                let api = services
                    .github
                    .as_ref()
                    .map_err(|reason| ToolError::Config(reason.clone()))?;
                search_github(api.as_ref(), &query).await
            })
        },
    );

    let calendar_services = services.clone();
    registry.register(
        "get_calendar_slots",
        "Find open meeting slots in the next 48 hours within working hours.",
        ToolSchema::new(vec![ParamSpec::required(
            "duration",
            ParamKind::Integer,
            "Meeting length in minutes",
        )
        .with_range(1, 480)]),
        move |args| {
            let services = calendar_services.clone();
            let duration = args.get("duration").and_then(Value::as_i64);
            Box::pin(async move {
                let duration = duration.ok_or_else(|| {
                    ToolError::InvalidArguments(
                        "duration must be a whole number of minutes".to_string(),
                    )
                })?;
                get_calendar_slots(&services.calendar, duration, Utc::now()).await
            })
        },
    );

    let alert_services = services;
    registry.register(
        "send_discord_alert",
        "Notify the owner about a high-value visitor (hiring, investment, partnership).",
        ToolSchema::new(vec![
            ParamSpec::required("visitor", ParamKind::String, "Visitor's name"),
            ParamSpec::optional(
                "affiliation",
                ParamKind::String,
                "Company or organisation the visitor represents",
                json!("Unknown"),
            ),
            ParamSpec::optional(
                "message",
                ParamKind::String,
                "Why the visitor matters, in one or two sentences",
                json!(""),
            ),
        ]),
        move |args| {
            let services = alert_services.clone();
            let request = AlertRequest {
                visitor: string_arg(args, "visitor"),
                affiliation: string_arg(args, "affiliation"),
                message: string_arg(args, "message"),
            };
            Box::pin(async move {
                send_alert(
                    services.alerts.as_ref(),
                    services.webhook_url.as_deref(),
                    &services.persona_name,
                    &request,
                    Utc::now(),
                )
                .await
            })
        },
    );

    registry
}
