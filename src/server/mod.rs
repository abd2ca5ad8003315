pub mod mcp;
pub mod ws;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{Result, TwinError};
use crate::orchestrator::Orchestrator;

/// Shared by every request and every chat session.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub system_prompt: Arc<str>,
    pub persona_name: Arc<str>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, system_prompt: String, persona_name: String) -> Self {
        Self {
            orchestrator,
            system_prompt: system_prompt.into(),
            persona_name: persona_name.into(),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    // The chat page is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ws/chat", get(ws::chat_socket))
        .route("/mcp", post(mcp::rpc))
        .layer(cors)
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "message": format!("{} backend online", state.persona_name) }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "tools": state.orchestrator.registry().names(),
    }))
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let ip: IpAddr = host
        .parse()
        .map_err(|e| TwinError::ConfigError(format!("Invalid host '{}': {}", host, e)))?;
    let addr = SocketAddr::new(ip, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "Listening");
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
