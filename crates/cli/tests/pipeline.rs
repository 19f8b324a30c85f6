//! End-to-end tests for the Parley pipeline.
//!
//! These wire real endpoints, history backends, tools and the engine
//! together, with only the language model scripted.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{Dice, Engine, EngineHandle, EngineParts};
use parley_config::AppConfig;
use parley_core::chat::ChatMessage;
use parley_core::endpoint::InboundKind;
use parley_core::error::ProviderError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::history::HistoryStore;
use parley_core::message::{Message, MessageToolCall, Role};
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use parley_endpoints::{EndpointRegistry, LocalEndpoint};
use parley_history::{InMemoryHistory, SqliteHistory};
use tokio::sync::broadcast;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<ProviderResponse>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted: call #{call}");
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "e2e-model".into(),
    }
}

fn tool_response(name: &str, arguments: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments: arguments.to_string(),
    }];
    ProviderResponse {
        message,
        usage: None,
        model: "e2e-model".into(),
    }
}

struct FixedDice(f64);

impl Dice for FixedDice {
    fn roll(&mut self) -> f64 {
        self.0
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    handle: EngineHandle,
    endpoint: Arc<LocalEndpoint>,
    events: broadcast::Receiver<Arc<DomainEvent>>,
}

async fn launch(
    mut config: AppConfig,
    provider: Arc<dyn Provider>,
    history: Arc<dyn HistoryStore>,
    roll: f64,
) -> Harness {
    config.debounce.delay_ms = 50;

    let endpoint = Arc::new(LocalEndpoint::new("local", "bot"));
    let mut registry = EndpointRegistry::new();
    registry.register(endpoint.clone());
    let registry = Arc::new(registry);

    let bus = Arc::new(EventBus::default());
    let events = bus.subscribe();
    let parts = EngineParts::new(config, provider, history, registry.clone())
        .with_dice(Box::new(FixedDice(roll)))
        .with_event_bus(bus);
    let engine = Engine::new(parts).await.unwrap();
    let handle = engine.handle();
    engine.attach(registry.start_all().await.unwrap());
    tokio::spawn(engine.run());

    Harness { handle, endpoint, events }
}

async fn wait_completed(events: &mut broadcast::Receiver<Arc<DomainEvent>>) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let DomainEvent::GenerationCompleted { success, .. } = events.recv().await.unwrap().as_ref() {
                return *success;
            }
        }
    })
    .await
    .expect("generation did not complete")
}

async fn wait_history_len(handle: &EngineHandle, len: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.mirror().len().await < len {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("history did not grow");
}

fn stored(ts: i64, id: &str, content: &str) -> ChatMessage {
    ChatMessage {
        timestamp: ts,
        message_id: id.into(),
        sender_name: "Alice".into(),
        sender_id: "u1".into(),
        channel_id: "c1".into(),
        channel_name: Some("general".into()),
        guild_id: None,
        guild_name: None,
        role: Role::User,
        content: content.into(),
        quote: None,
        need_reply: false,
        origin: "local:u1".into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_mention_tool_call_reply_and_loopback() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("history.db");
    let history = Arc::new(SqliteHistory::open(&db).await.unwrap());

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response("get_message", serde_json::json!({"message_id": "m1"})),
        text_response(
            r#"{"groups":[{"channel_id":"c1","segments":[{"quote_message_id":"m1","contents":["not much","you?"],"reaction_emojis":["😄"]}]}]}"#,
        ),
    ]));
    let mut h = launch(AppConfig::default(), provider.clone(), history, 0.99).await;
    h.endpoint.echo_sends(true);
    h.endpoint.set_user_name("u1", "Alice").await;

    h.endpoint
        .inject(InboundKind::Message, h.endpoint.session("m1", "u1", "c1", "Xiaoming, what's up?"))
        .await
        .unwrap();
    assert!(wait_completed(&mut h.events).await);

    // The model saw the tool result before answering
    assert_eq!(provider.calls(), 2);
    {
        let requests = provider.requests.lock().unwrap();
        let tool_turn = requests[1].messages.last().unwrap();
        assert_eq!(tool_turn.role, Role::Tool);
        let payload: serde_json::Value = serde_json::from_str(&tool_turn.content).unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["message"]["content"], "Xiaoming, what's up?");
    }

    let sent = h.endpoint.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].items[0].quote.as_deref(), Some("m1"));
    assert_eq!(sent[0].items[1].quote, None);
    let reactions = h.endpoint.reactions().await;
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].message_id, sent[0].message_ids[1]);

    // Both echoed bubbles come back as loopback and never trigger
    wait_history_len(&h.handle, 3).await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.attempts_started, 1);
    assert_eq!(status.attempts_succeeded, 1);
    assert_eq!(status.probability, 0.0);

    h.handle.shutdown().await;

    let reopened = SqliteHistory::open(&db).await.unwrap();
    let records = reopened.bulk_load().await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].sender_name, "Alice");
    assert!(records.iter().all(|m| !m.need_reply));
    assert!(records[1..].iter().all(|m| m.role == Role::Assistant && m.origin == "local:bot"));
    assert!(records.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn e2e_edit_within_settle_window_and_channel_filter() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response(r#"{"groups":[]}"#)]));
    let mut config = AppConfig::default();
    config.channels.allowed = vec!["c1".into()];
    let mut h = launch(config, provider.clone(), Arc::new(InMemoryHistory::new()), 0.99).await;

    let ep = &h.endpoint;
    ep.inject(InboundKind::Message, ep.session("x1", "u2", "c2", "Xiaoming elsewhere"))
        .await
        .unwrap();
    ep.inject(InboundKind::Message, ep.session("m1", "u1", "c1", "hi")).await.unwrap();
    ep.inject(InboundKind::Edit, ep.session("m1", "u1", "c1", "hi Xiaoming")).await.unwrap();

    // Silent reply: the attempt ran but nothing was delivered
    assert!(!wait_completed(&mut h.events).await);
    assert!(h.endpoint.sent().await.is_empty());

    let history = h.handle.mirror().snapshot().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message_id, "m1");
    assert_eq!(history[0].content, "hi Xiaoming");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_restart_resumes_from_stored_history() {
    let far_future = chrono::Utc::now().timestamp_millis() + 86_400_000;
    let store = Arc::new(InMemoryHistory::new());
    let preload: Vec<ChatMessage> = (0..25)
        .map(|i| stored(far_future + i, &format!("old{i}"), "earlier chatter"))
        .collect();
    store.upsert(&preload).await.unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let h = launch(AppConfig::default(), provider.clone(), store.clone(), 0.99).await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.history_len, 25);
    assert_eq!(status.context_window, 20);

    h.endpoint
        .inject(InboundKind::Message, h.endpoint.session("new1", "u1", "c1", "just chatting"))
        .await
        .unwrap();
    wait_history_len(&h.handle, 26).await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.context_window, 21);
    assert_eq!(status.attempts_started, 0);
    assert_eq!(provider.calls(), 0);

    let records = store.bulk_load().await.unwrap();
    let newest = records.last().unwrap();
    assert_eq!(newest.message_id, "new1");
    assert!(newest.timestamp > far_future + 24);
}
