use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::slots::{
    align_up, free_slots, pick_spread, within_working_hours, TimeSpan, SLOT_STEP_MINUTES,
};
use crate::config::CalendarConfig;
use crate::error::ToolError;

pub const MAX_SUGGESTIONS: usize = 6;
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Start or end of a calendar event. All-day events only carry `date`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub summary: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Events overlapping `window`, recurring events expanded.
    async fn list_events(&self, window: TimeSpan) -> Result<Vec<CalendarEvent>, ToolError>;
}

/// Timed events as busy intervals; all-day events are skipped.
pub fn busy_intervals(events: &[CalendarEvent]) -> Vec<TimeSpan> {
    events
        .iter()
        .filter_map(|event| {
            let start = event.start.date_time?;
            let end = event.end.date_time?;
            Some(TimeSpan::new(start.with_timezone(&Utc), end.with_timezone(&Utc)))
        })
        .collect()
}

// ============================================================================
// Service-account authentication
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// JWT-bearer flow for a service account, with the access token cached
/// until shortly before it expires.
pub struct ServiceAccountAuth {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(http: reqwest::Client, key: ServiceAccountKey) -> Result<Self, ToolError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            ToolError::Config(format!("Service account private key is unusable: {}", e))
        })?;

        Ok(Self {
            http,
            client_email: key.client_email,
            token_uri: key
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            signing_key,
            cached: Mutex::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String, ToolError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.value.clone());
            }
        }

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CALENDAR_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
                .map_err(|e| ToolError::Config(format!("Failed to sign token request: {}", e)))?;

        debug!(token_uri = %self.token_uri, "Requesting calendar access token");
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }
}

// ============================================================================
// Google Calendar client
// ============================================================================

#[derive(Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

/// A 48 hour window never needs more pages than this at 250 events each.
const MAX_EVENT_PAGES: usize = 20;

/// Follow `nextPageToken` until the listing ends, giving up after
/// `MAX_EVENT_PAGES` pages.
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<CalendarEvent>, ToolError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<EventsPage, ToolError>>,
{
    let mut events = Vec::new();
    let mut page_token = None;
    for _ in 0..MAX_EVENT_PAGES {
        let page = fetch_page(page_token.take()).await?;
        events.extend(page.items);
        match page.next_page_token {
            Some(next) => page_token = Some(next),
            None => return Ok(events),
        }
    }
    Err(ToolError::Decode(format!(
        "events listing did not end after {} pages",
        MAX_EVENT_PAGES
    )))
}

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    auth: ServiceAccountAuth,
}

impl GoogleCalendarClient {
    pub fn new(
        http: reqwest::Client,
        api_base: String,
        calendar_id: String,
        key: ServiceAccountKey,
    ) -> Result<Self, ToolError> {
        let auth = ServiceAccountAuth::new(http.clone(), key)?;
        Ok(Self {
            http,
            api_base,
            calendar_id,
            auth,
        })
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_events(&self, window: TimeSpan) -> Result<Vec<CalendarEvent>, ToolError> {
        let token = self.auth.access_token().await?;
        let base_url = format!(
            "{}/calendars/{}/events?singleEvents=true&orderBy=startTime&maxResults=250&timeMin={}&timeMax={}",
            self.api_base,
            urlencoding::encode(&self.calendar_id),
            urlencoding::encode(&window.start.to_rfc3339()),
            urlencoding::encode(&window.end.to_rfc3339()),
        );

        let token = &token;
        let base_url = &base_url;
        let events = collect_pages(|page_token| async move {
            let url = match &page_token {
                Some(next) => format!("{}&pageToken={}", base_url, urlencoding::encode(next)),
                None => base_url.clone(),
            };
            let response = self.http.get(&url).bearer_auth(token).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ToolError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(response.json::<EventsPage>().await?)
        })
        .await?;

        debug!(count = events.len(), "Fetched calendar events");
        Ok(events)
    }
}

// ============================================================================
// Lazily constructed shared handle
// ============================================================================

/// Calendar settings plus a client built on first use and shared by every
/// session afterwards. A failed construction is not cached, so fixing the
/// configuration does not need a restart of the orchestration context.
pub struct CalendarHandle {
    config: CalendarConfig,
    http: reqwest::Client,
    client: OnceCell<Arc<dyn CalendarApi>>,
}

impl CalendarHandle {
    pub fn new(config: CalendarConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            client: OnceCell::new(),
        }
    }

    /// Handle with an already constructed client.
    pub fn with_client(config: CalendarConfig, client: Arc<dyn CalendarApi>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            client: OnceCell::from(client),
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub async fn client(&self) -> Result<Arc<dyn CalendarApi>, ToolError> {
        self.client
            .get_or_try_init(|| async {
                let client = self.build_client().await?;
                info!("Calendar client initialised");
                Ok::<Arc<dyn CalendarApi>, ToolError>(Arc::new(client))
            })
            .await
            .cloned()
    }

    async fn build_client(&self) -> Result<GoogleCalendarClient, ToolError> {
        let calendar_id = self
            .config
            .calendar_id
            .clone()
            .ok_or_else(|| ToolError::Config("GOOGLE_CALENDAR_ID is not set".to_string()))?;
        let key = load_service_account_key(&self.config).await?;

        GoogleCalendarClient::new(
            self.http.clone(),
            self.config.api_base.clone(),
            calendar_id,
            key,
        )
    }
}

/// Inline JSON wins over a key file path.
pub async fn load_service_account_key(
    config: &CalendarConfig,
) -> Result<ServiceAccountKey, ToolError> {
    let raw = match (&config.credentials_json, &config.credentials_path) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await.map_err(|e| {
            ToolError::Config(format!("Cannot read credentials file {}: {}", path, e))
        })?,
        (None, None) => {
            return Err(ToolError::Config(
                "No calendar service-account credentials configured".to_string(),
            ))
        }
    };

    serde_json::from_str(&raw)
        .map_err(|e| ToolError::Config(format!("Invalid service-account credentials: {}", e)))
}

// ============================================================================
// Tool entry point
// ============================================================================

/// Suggest up to six open slots of `duration_minutes` in the lookahead window.
pub async fn get_calendar_slots(
    handle: &CalendarHandle,
    duration_minutes: i64,
    now: DateTime<Utc>,
) -> Result<String, ToolError> {
    let config = handle.config();
    if duration_minutes <= 0 {
        return Err(ToolError::InvalidArguments(
            "duration must be a positive number of minutes".to_string(),
        ));
    }
    let tz: Tz = config
        .timezone
        .parse()
        .map_err(|_| ToolError::Config(format!("Unknown time zone '{}'", config.timezone)))?;

    let api = handle.client().await?;

    let step = Duration::minutes(SLOT_STEP_MINUTES);
    let window = TimeSpan::new(
        align_up(now, step),
        now + Duration::hours(config.lookahead_hours),
    );
    let events = api.list_events(window).await?;
    let busy = busy_intervals(&events);

    let candidates: Vec<TimeSpan> =
        free_slots(&busy, window, Duration::minutes(duration_minutes), step)
            .into_iter()
            .filter(|slot| {
                within_working_hours(slot, &tz, config.work_start_hour, config.work_end_hour)
            })
            .collect();

    info!(
        events = events.len(),
        busy = busy.len(),
        candidates = candidates.len(),
        "Computed free slots"
    );

    if candidates.is_empty() {
        return Ok(format!(
            "Fully booked: no {}-minute openings between {:02}:00 and {:02}:00 ({}) in the next {} hours.",
            duration_minutes,
            config.work_start_hour,
            config.work_end_hour,
            config.timezone,
            config.lookahead_hours
        ));
    }

    Ok(render_slots(
        &pick_spread(&candidates, MAX_SUGGESTIONS),
        duration_minutes,
        &tz,
    ))
}

fn render_slots(slots: &[TimeSpan], duration_minutes: i64, tz: &Tz) -> String {
    let mut output = format!("Available {}-minute slots ({}):\n", duration_minutes, tz.name());
    for slot in slots {
        let start = slot.start.with_timezone(tz);
        let end = slot.end.with_timezone(tz);
        output.push_str(&format!(
            "- {} to {} [{}]\n",
            start.format("%a %d %b, %H:%M"),
            end.format("%H:%M"),
            start.to_rfc3339()
        ));
    }
    output
}
