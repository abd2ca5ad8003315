use async_trait::async_trait;
use axum::extract::ws::Message as Frame;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use twinchat::error::{Result, TwinError};
use twinchat::llm::{ChatBackend, Completion};
use twinchat::models::{Message, ServerEvent};
use twinchat::orchestrator::Orchestrator;
use twinchat::server::ws::run_session;
use twinchat::server::{build_app, AppState};
use twinchat::tools::{ParamKind, ParamSpec, ToolRegistry, ToolSchema};

/// Answers "Hi there", fails on "fail" and never finishes on "hang".
struct ReplyBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatBackend for ReplyBackend {
    async fn stream_chat(
        &self,
        messages: &[Message],
        _tools: Option<&[Value]>,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = messages
            .last()
            .and_then(|m| m.content.clone())
            .unwrap_or_default();
        match last.as_str() {
            "fail" => Err(TwinError::Other("model unavailable".to_string())),
            "hang" => std::future::pending().await,
            _ => {
                on_token("Hi");
                on_token(" there");
                Ok(Completion {
                    content: "Hi there".to_string(),
                    tool_calls: Vec::new(),
                })
            }
        }
    }
}

fn app_state() -> (AppState, Arc<ReplyBackend>) {
    let backend = Arc::new(ReplyBackend {
        calls: AtomicUsize::new(0),
    });
    let mut registry = ToolRegistry::new();
    registry.register(
        "get_calendar_slots",
        "Find open slots",
        ToolSchema::new(vec![ParamSpec::required(
            "duration",
            ParamKind::Integer,
            "Minutes",
        )]),
        |_| Box::pin(async { Ok("10:00".to_string()) }),
    );
    let orchestrator = Orchestrator::new(backend.clone(), Arc::new(registry));
    let state = AppState::new(
        Arc::new(orchestrator),
        "You are Twin.".to_string(),
        "Twin".to_string(),
    );
    (state, backend)
}

struct Client {
    input: Option<mpsc::UnboundedSender<std::result::Result<Frame, axum::Error>>>,
    output: mpsc::UnboundedReceiver<Frame>,
    session: JoinHandle<()>,
}

impl Client {
    fn connect(state: AppState) -> Self {
        let (input, stream) = mpsc::unbounded();
        let (sink, output) = mpsc::unbounded();
        let session = tokio::spawn(run_session(sink, stream, state));
        Self {
            input: Some(input),
            output,
            session,
        }
    }

    fn say(&self, text: &str) {
        self.input
            .as_ref()
            .unwrap()
            .unbounded_send(Ok(Frame::Text(text.to_string())))
            .unwrap();
    }

    async fn next_event(&mut self) -> Option<ServerEvent> {
        let frame = timeout(Duration::from_secs(5), self.output.next())
            .await
            .expect("event within five seconds")?;
        match frame {
            Frame::Text(text) => Some(serde_json::from_str(&text).unwrap()),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    /// Events up to and including the first `done` or `error`.
    async fn turn(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            let terminal = matches!(event, ServerEvent::Done | ServerEvent::Error { .. });
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

fn tokens(events: &[ServerEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_session_greets_and_answers() {
    let (state, backend) = app_state();
    let mut client = Client::connect(state);

    assert_eq!(
        client.next_event().await,
        Some(ServerEvent::log("Link active. Twin is online."))
    );

    client.say("   ");
    client.say("hello");
    let events = client.turn().await;

    assert_eq!(events.first(), Some(&ServerEvent::log("Received: hello")));
    assert_eq!(tokens(&events), "Hi there");
    assert_eq!(events.last(), Some(&ServerEvent::Done));
    // The blank message never reached the model
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_turn_reports_and_session_continues() {
    let (state, _backend) = app_state();
    let mut client = Client::connect(state);
    client.next_event().await;

    client.say("fail");
    let events = client.turn().await;
    assert_eq!(
        events,
        vec![
            ServerEvent::log("Received: fail"),
            ServerEvent::log("Error: model unavailable"),
            ServerEvent::error("model unavailable"),
        ]
    );

    client.say("hello again");
    let events = client.turn().await;
    assert_eq!(tokens(&events), "Hi there");
    assert_eq!(events.last(), Some(&ServerEvent::Done));
}

#[tokio::test]
async fn test_closing_mid_turn_abandons_it() {
    let (state, _backend) = app_state();
    let mut client = Client::connect(state);
    client.next_event().await;

    client.say("hang");
    assert_eq!(
        client.next_event().await,
        Some(ServerEvent::log("Received: hang"))
    );

    client.input.take();
    timeout(Duration::from_secs(5), &mut client.session)
        .await
        .expect("session ends after the client leaves")
        .unwrap();

    let mut rest = Vec::new();
    while let Some(event) = client.next_event().await {
        rest.push(event);
    }
    assert!(!rest.contains(&ServerEvent::Done));
}

async fn spawn_app() -> String {
    let (state, _backend) = app_state();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_app(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_and_root_routes() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["tools"], json!(["get_calendar_slots"]));

    let root: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert!(root["message"].as_str().unwrap().contains("Twin"));
}

#[tokio::test]
async fn test_mcp_route_framing() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let url = format!("{}/mcp", base);

    let response = client
        .post(&url)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    assert!(response.text().await.unwrap().is_empty());

    let response = client
        .post(&url)
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["tools"][0]["name"], "get_calendar_slots");

    let response = client
        .post(&url)
        .header("Accept", "application/json, text/event-stream")
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let text = response.text().await.unwrap();
    let data = text
        .strip_prefix("event: message\ndata: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .expect("single message event");
    let body: Value = serde_json::from_str(data).unwrap();
    assert_eq!(body["id"], 2);
}
