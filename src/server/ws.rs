use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::models::{Conversation, ServerEvent};

pub async fn chat_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    debug!("Chat connection upgrade requested");
    ws.on_upgrade(move |socket: WebSocket| {
        let (sink, stream) = socket.split();
        run_session(sink, stream, state)
    })
}

/// One visitor, one conversation. Turns run one at a time in arrival order.
/// Returns once the client goes away.
pub async fn run_session<W, R, E>(mut sink: W, mut stream: R, state: AppState)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let session_id = Uuid::new_v4();
    info!(%session_id, "Chat session opened");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (inbox_tx, mut inbox) = mpsc::unbounded_channel::<String>();
    let (closed_tx, mut closed_rx) = oneshot::channel::<()>();

    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Dropping unserialisable event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if inbox_tx.send(text).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Chat socket read failed");
                    break;
                }
            }
        }
        let _ = closed_tx.send(());
    });

    let _ = tx.send(ServerEvent::log(format!(
        "Link active. {} is online.",
        state.persona_name
    )));

    let mut conversation = Conversation::new(state.system_prompt.to_string());
    while let Some(text) = inbox.recv().await {
        if text.trim().is_empty() {
            continue;
        }

        let outcome = tokio::select! {
            result = state.orchestrator.run_turn(&mut conversation, &text, &tx) => Some(result),
            _ = &mut closed_rx => None,
            _ = tx.closed() => None,
        };

        match outcome {
            Some(Ok(turn)) => {
                debug!(%session_id, tool = ?turn.tool.as_ref().map(|(name, _)| name), "Turn complete");
                let _ = tx.send(ServerEvent::Done);
            }
            Some(Err(e)) => {
                error!(%session_id, error = %e, "Turn failed");
                let _ = tx.send(ServerEvent::log(format!("Error: {}", e)));
                let _ = tx.send(ServerEvent::error(e.to_string()));
            }
            None => {
                info!(%session_id, "Client left mid-turn, abandoning it");
                break;
            }
        }
    }

    drop(tx);
    let _ = forwarder.await;
    reader.abort();
    info!(%session_id, turns = conversation.len(), "Chat session closed");
}
