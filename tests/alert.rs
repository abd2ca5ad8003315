use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use twinchat::error::ToolError;
use twinchat::tools::alert::{
    build_payload, send_alert, AlertRequest, AlertSender, WebhookPayload, ALERT_COLOR,
};

struct FakeWebhook {
    status: u16,
    body: String,
    posts: AtomicUsize,
    last: Mutex<Option<WebhookPayload>>,
}

impl FakeWebhook {
    fn replying(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            posts: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AlertSender for FakeWebhook {
    async fn post(&self, _url: &str, payload: &WebhookPayload) -> Result<(u16, String), ToolError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(payload.clone());
        Ok((self.status, self.body.clone()))
    }
}

fn request() -> AlertRequest {
    AlertRequest {
        visitor: "Ada".to_string(),
        affiliation: "Analytical Engines".to_string(),
        message: "Wants to talk about a staff role".to_string(),
    }
}

#[tokio::test]
async fn test_unconfigured_destination_makes_no_request() {
    let webhook = FakeWebhook::replying(204, "");

    let err = send_alert(&webhook, None, "Twin", &request(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Config(_)));
    assert!(err.to_string().starts_with("Configuration error"));

    let err = send_alert(&webhook, Some("  "), "Twin", &request(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Config(_)));

    assert_eq!(webhook.posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_content_counts_as_delivered() {
    let webhook = FakeWebhook::replying(204, "");

    let text = send_alert(
        &webhook,
        Some("https://discord.example/webhook"),
        "Twin",
        &request(),
        Utc::now(),
    )
    .await
    .unwrap();

    assert!(text.contains("Ada"));
    assert_eq!(webhook.posts.load(Ordering::SeqCst), 1);
    let payload = webhook.last.lock().unwrap().clone().unwrap();
    assert_eq!(payload.embeds[0].description, "Wants to talk about a staff role");
}

#[tokio::test]
async fn test_other_status_surfaces_body() {
    let webhook = FakeWebhook::replying(400, "{\"message\": \"Invalid Form Body\"}");

    let err = send_alert(
        &webhook,
        Some("https://discord.example/webhook"),
        "Twin",
        &request(),
        Utc::now(),
    )
    .await
    .unwrap_err();

    match err {
        ToolError::Upstream { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid Form Body"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_payload_has_fixed_schema() {
    let now = Utc.with_ymd_and_hms(2025, 3, 10, 14, 5, 0).unwrap();
    let mut req = request();
    req.message = String::new();
    req.affiliation = String::new();

    let payload = build_payload(&req, "Twin", now);
    let value = serde_json::to_value(&payload).unwrap();
    let embed = &value["embeds"][0];

    assert_eq!(embed["title"], "High-priority visitor");
    assert_eq!(embed["color"], ALERT_COLOR);
    assert_eq!(embed["description"], "Ada wants to get in touch.");
    assert_eq!(embed["footer"]["text"], "Twin alert");
    assert_eq!(embed["timestamp"], "2025-03-10T14:05:00Z");

    let fields = embed["fields"].as_array().unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Visitor", "Affiliation", "Timestamp"]);
    assert_eq!(fields[1]["value"], "-");
    assert!(fields.iter().all(|f| f["inline"] == true));
}
