use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use twinchat::error::{Result, TwinError};
use twinchat::llm::{ChatBackend, Completion};
use twinchat::models::{Conversation, Message, Role, ServerEvent, ToolCall};
use twinchat::orchestrator::Orchestrator;
use twinchat::tools::{ParamKind, ParamSpec, ToolRegistry, ToolSchema};

/// One scripted generation pass: tokens to stream plus native calls.
struct Pass {
    tokens: Vec<&'static str>,
    tool_calls: Vec<ToolCall>,
}

impl Pass {
    fn text(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            tool_calls: Vec::new(),
        }
    }
}

struct ScriptedBackend {
    passes: Mutex<VecDeque<Result<Pass>>>,
    requests: Mutex<Vec<(Vec<Message>, bool)>>,
}

impl ScriptedBackend {
    fn new(passes: Vec<Result<Pass>>) -> Arc<Self> {
        Arc::new(Self {
            passes: Mutex::new(passes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn stream_chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Completion> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.is_some()));
        let pass = self
            .passes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TwinError::Other("script exhausted".to_string())))?;

        let mut content = String::new();
        for token in pass.tokens {
            on_token(token);
            content.push_str(token);
        }
        Ok(Completion {
            content,
            tool_calls: pass.tool_calls,
        })
    }
}

fn lookup_registry(calls: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(
        "github_search",
        "Search code",
        ToolSchema::new(vec![ParamSpec::required(
            "query",
            ParamKind::String,
            "Topic",
        )]),
        move |args| {
            let calls = calls.clone();
            let query = args["query"].as_str().unwrap_or_default().to_string();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("2 repositories match {}", query))
            })
        },
    );
    Arc::new(registry)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
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

fn logs(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Log { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_plain_answer_uses_one_pass() {
    let backend = ScriptedBackend::new(vec![Ok(Pass::text(vec!["I am ", "the twin."]))]);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(backend.clone(), lookup_registry(calls.clone()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    let outcome = orchestrator
        .run_turn(&mut conversation, "who are you?", &tx)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "I am the twin.");
    assert!(outcome.tool.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.requests.lock().unwrap().len(), 1);

    let events = drain(&mut rx);
    assert_eq!(tokens(&events), "I am the twin.");
    assert_eq!(logs(&events), vec!["Received: who are you?".to_string()]);

    let turns = conversation.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_directive_triggers_tool_and_second_pass() {
    let backend = ScriptedBackend::new(vec![
        Ok(Pass::text(vec![
            "Checking. ",
            "<function=github_search>",
            "{\"query\": \"rust\"}",
            "</function>",
        ])),
        Ok(Pass::text(vec!["Found ", "two projects."])),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(backend.clone(), lookup_registry(calls.clone()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    let outcome = orchestrator
        .run_turn(&mut conversation, "show me your rust work please", &tx)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.answer, "Found two projects.");
    let (name, result) = outcome.tool.unwrap();
    assert_eq!(name, "github_search");
    assert!(result.success);

    let events = drain(&mut rx);
    // The marker and its arguments never reach the visitor
    assert_eq!(tokens(&events), "Checking. Found two projects.");
    let logs = logs(&events);
    assert_eq!(logs[0], "Received: show me your rust wo...");
    assert_eq!(logs[1], "Tool call detected: github_search");
    assert!(logs[2].starts_with("Executing github_search with"));
    assert_eq!(logs[3], "Tool github_search complete");

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].1, "first pass advertises tools");
    assert!(!requests[1].1, "second pass sends no tools");

    // Second pass sees the call and its result as context
    let second = &requests[1].0;
    let tool_entry = second.last().unwrap();
    assert_eq!(tool_entry.role, Role::Tool);
    assert_eq!(
        tool_entry.content.as_deref(),
        Some("2 repositories match rust")
    );
    let call_entry = &second[second.len() - 2];
    assert_eq!(call_entry.content.as_deref(), Some("Checking."));
    let call = &call_entry.tool_calls.as_ref().unwrap()[0];
    assert_eq!(tool_entry.tool_call_id.as_deref(), Some(call.id.as_str()));
    assert_eq!(
        serde_json::from_str::<Value>(&call.function.arguments).unwrap(),
        json!({"query": "rust"})
    );

    assert_eq!(conversation.len(), 4);
}

#[tokio::test]
async fn test_malformed_directive_fails_open() {
    let backend = ScriptedBackend::new(vec![Ok(Pass::text(vec![
        "Sure ",
        "<function=github_search>{query: rust}",
    ]))]);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(backend.clone(), lookup_registry(calls.clone()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    let outcome = orchestrator
        .run_turn(&mut conversation, "rust?", &tx)
        .await
        .unwrap();

    assert!(outcome.tool.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.requests.lock().unwrap().len(), 1);
    // Withheld text is flushed once it turns out to be a plain answer
    assert_eq!(
        tokens(&drain(&mut rx)),
        "Sure <function=github_search>{query: rust}"
    );
}

#[tokio::test]
async fn test_native_tool_call_is_honoured() {
    let backend = ScriptedBackend::new(vec![
        Ok(Pass {
            tokens: Vec::new(),
            tool_calls: vec![ToolCall::function(
                "call_native",
                "github_search",
                "{\"query\":\"axum\"}".to_string(),
            )],
        }),
        Ok(Pass::text(vec!["Here it is."])),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(backend, lookup_registry(calls.clone()));
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    let outcome = orchestrator
        .run_turn(&mut conversation, "axum?", &tx)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.answer, "Here it is.");
    // No prose before the call, so the recorded assistant turn has no content
    assert_eq!(conversation.turns()[1].content, None);
}

#[tokio::test]
async fn test_tool_failure_still_reaches_second_pass() {
    let backend = ScriptedBackend::new(vec![
        Ok(Pass::text(vec!["<function=book_meeting>{\"when\": \"now\"}"])),
        Ok(Pass::text(vec!["I can't book that yet."])),
    ]);
    let orchestrator = Orchestrator::new(
        backend.clone(),
        lookup_registry(Arc::new(AtomicUsize::new(0))),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    let outcome = orchestrator
        .run_turn(&mut conversation, "book it", &tx)
        .await
        .unwrap();

    let (_, result) = outcome.tool.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("unknown tool"));
    assert!(logs(&drain(&mut rx)).contains(&"Tool book_meeting failed".to_string()));

    let requests = backend.requests.lock().unwrap();
    let tool_entry = requests[1].0.last().unwrap();
    assert!(tool_entry
        .content
        .as_deref()
        .unwrap()
        .starts_with("Error: Unknown tool"));
}

#[tokio::test]
async fn test_second_pass_directive_is_not_rerun() {
    let backend = ScriptedBackend::new(vec![
        Ok(Pass::text(vec!["<function=github_search>{\"query\": \"a\"}"])),
        Ok(Pass::text(vec!["<function=github_search>{\"query\": \"b\"}"])),
    ]);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(backend, lookup_registry(calls.clone()));
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    orchestrator
        .run_turn(&mut conversation, "go", &tx)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_failure_is_returned() {
    let backend = ScriptedBackend::new(vec![Err(TwinError::ApiError {
        status: 503,
        message: "overloaded".to_string(),
    })]);
    let orchestrator = Orchestrator::new(backend, lookup_registry(Arc::new(AtomicUsize::new(0))));
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new("persona");

    let err = orchestrator
        .run_turn(&mut conversation, "hello", &tx)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("503"));
    // The user turn stays recorded; the session can carry on
    assert_eq!(conversation.len(), 1);
}
