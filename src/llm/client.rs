use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use super::models::RequestBody;
use super::streaming::process_streaming_response;
use super::{ChatBackend, Completion};
use crate::config::Config;
use crate::error::{Result, TwinError};
use crate::models::Message;

pub async fn make_api_request(
    client: &reqwest::Client,
    api_endpoint: &str,
    request_body: &RequestBody<'_>,
) -> Result<reqwest::Response> {
    let response = client.post(api_endpoint).json(request_body).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(TwinError::ApiError { status, message });
    }

    Ok(response)
}

/// Chat completions client for any OpenAI-compatible endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_endpoint: String,
    model: String,
    stream_timeout: u64,
}

impl OpenAiBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| TwinError::ConfigError(format!("Invalid authorization header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // No overall timeout: the stream is policed per chunk instead
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_endpoint: config.api_endpoint.clone(),
            model: config.model.clone(),
            stream_timeout: config.stream_timeout,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Completion> {
        let request_body = RequestBody {
            model: &self.model,
            messages,
            stream: true,
            tools,
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.map(|t| t.len()).unwrap_or(0),
            "Requesting completion"
        );
        let response = make_api_request(&self.client, &self.api_endpoint, &request_body).await?;

        process_streaming_response(response.bytes_stream(), self.stream_timeout, on_token).await
    }
}
