use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::ToolError;

pub const ALERT_TITLE: &str = "High-priority visitor";
pub const ALERT_COLOR: u32 = 0x00FF9C;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRequest {
    pub visitor: String,
    pub affiliation: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Outbound half of the alert: deliver a payload, report status and body.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<(u16, String), ToolError>;
}

pub struct HttpAlertSender {
    http: reqwest::Client,
}

impl HttpAlertSender {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AlertSender for HttpAlertSender {
    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<(u16, String), ToolError> {
        let response = self.http.post(url).json(payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

pub fn build_payload(request: &AlertRequest, persona_name: &str, now: DateTime<Utc>) -> WebhookPayload {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let field = |name: &str, value: &str| EmbedField {
        name: name.to_string(),
        value: if value.trim().is_empty() {
            "-".to_string()
        } else {
            value.to_string()
        },
        inline: true,
    };

    let description = if request.message.trim().is_empty() {
        format!("{} wants to get in touch.", request.visitor)
    } else {
        request.message.clone()
    };

    WebhookPayload {
        embeds: vec![Embed {
            title: ALERT_TITLE.to_string(),
            description,
            color: ALERT_COLOR,
            fields: vec![
                field("Visitor", &request.visitor),
                field("Affiliation", &request.affiliation),
                field("Timestamp", &timestamp),
            ],
            footer: EmbedFooter {
                text: format!("{} alert", persona_name),
            },
            timestamp,
        }],
    }
}

/// Accepted webhook statuses: 200 with a body, 204 without.
pub fn is_delivered(status: u16) -> bool {
    matches!(status, 200 | 204)
}

pub async fn send_alert(
    sender: &dyn AlertSender,
    webhook_url: Option<&str>,
    persona_name: &str,
    request: &AlertRequest,
    now: DateTime<Utc>,
) -> Result<String, ToolError> {
    let url = webhook_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ToolError::Config("DISCORD_WEBHOOK_URL is not set".to_string()))?;

    let payload = build_payload(request, persona_name, now);
    let (status, body) = sender.post(url, &payload).await?;
    if !is_delivered(status) {
        return Err(ToolError::Upstream { status, body });
    }

    info!(visitor = %request.visitor, status, "Alert delivered");
    Ok(format!(
        "Alert sent. {} has been notified about {} ({}).",
        persona_name, request.visitor, request.affiliation
    ))
}
