use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::AppState;
use crate::mcp::handle_message;

/// `POST /mcp`: one JSON-RPC message in, one response out, either as plain
/// JSON or as a single SSE `message` event when the client asks for a stream.
pub async fn rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(response) = handle_message(state.orchestrator.registry(), &body).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let payload = match serde_json::to_string(&response) {
        Ok(payload) => payload,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    if wants_event_stream(&headers) {
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            format!("event: message\ndata: {}\n\n", payload),
        )
            .into_response()
    } else {
        ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
    }
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}
