//! Tool-augmented generation.
//!
//! Drives one generation attempt: streams the model's answer, dispatches any
//! tool calls it makes and feeds the results back, and finally parses the
//! text against the reply schema. Tool failures never abort the attempt;
//! they are reported to the model as `{"error": ...}` payloads.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parley_config::AppConfig;
use parley_core::chat::ChatMessage;
use parley_core::error::{Error, ProviderError, ToolError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{Message, MessageToolCall};
use parley_core::provider::{Provider, ProviderRequest, Usage};
use parley_core::tool::{ToolCall, ToolRegistry};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::output::{ReplyPlan, parse_reply, response_format};
use crate::prompt::PromptBuilder;
use crate::stream_event::GenerationEvent;

/// Model parameters for every attempt.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Model calls allowed per attempt, tool rounds included
    pub max_tool_iterations: u32,
}

impl GeneratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: Some(config.provider.max_tokens),
            max_tool_iterations: config.generation.max_tool_iterations,
        }
    }
}

/// One streamed model turn.
struct Turn {
    text: String,
    tool_calls: Vec<MessageToolCall>,
    usage: Option<Usage>,
}

pub struct Generator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    prompt: PromptBuilder,
    settings: GeneratorSettings,
    event_bus: Arc<EventBus>,
    stream_tx: broadcast::Sender<GenerationEvent>,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        prompt: PromptBuilder,
        settings: GeneratorSettings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let (stream_tx, _) = broadcast::channel(512);
        Self {
            provider,
            tools,
            prompt,
            settings,
            event_bus,
            stream_tx,
        }
    }

    /// Follow generation events live.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.stream_tx.subscribe()
    }

    fn emit(&self, event: GenerationEvent) {
        // No subscribers is fine
        let _ = self.stream_tx.send(event);
    }

    /// Run one attempt over a history snapshot and return the validated reply.
    pub async fn generate(&self, attempt: u64, history: &[ChatMessage]) -> Result<ReplyPlan, Error> {
        let result = self.run(attempt, history).await;
        if let Err(e) = &result {
            self.emit(GenerationEvent::Error {
                attempt,
                message: e.to_string(),
            });
        }
        result
    }

    async fn run(&self, attempt: u64, history: &[ChatMessage]) -> Result<ReplyPlan, Error> {
        let definitions = self.tools.definitions();
        let mut messages = self.prompt.build(history, &definitions);
        let mut tool_calls_made = 0;

        for iteration in 1..=self.settings.max_tool_iterations {
            debug!(attempt, iteration, turns = messages.len(), "Generation round");

            let request = ProviderRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                tools: definitions.clone(),
                response_format: Some(response_format()),
                stream: true,
            };
            let turn = self.stream_turn(attempt, request).await?;

            if turn.tool_calls.is_empty() {
                self.emit(GenerationEvent::Done {
                    attempt,
                    usage: turn.usage,
                    iterations: iteration,
                    tool_calls_made,
                });
                return Ok(parse_reply(&turn.text)?);
            }

            let mut assistant = Message::assistant(turn.text);
            assistant.tool_calls = turn.tool_calls.clone();
            messages.push(assistant);

            for call in &turn.tool_calls {
                let output = self.run_tool(attempt, call).await;
                messages.push(Message::tool_result(&call.id, output));
                tool_calls_made += 1;
            }
        }

        warn!(attempt, limit = self.settings.max_tool_iterations, "Tool iteration limit reached without a reply");
        Err(Error::Internal(format!(
            "no final reply after {} model rounds",
            self.settings.max_tool_iterations
        )))
    }

    async fn stream_turn(&self, attempt: u64, request: ProviderRequest) -> Result<Turn, ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut turn = Turn {
            text: String::new(),
            tool_calls: Vec::new(),
            usage: None,
        };

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content.filter(|d| !d.is_empty()) {
                turn.text.push_str(&delta);
                self.emit(GenerationEvent::Chunk {
                    attempt,
                    content: delta,
                });
            }
            turn.tool_calls.extend(chunk.tool_calls);
            if chunk.usage.is_some() {
                turn.usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }
        Ok(turn)
    }

    /// Execute one tool call. Always returns a payload for the model.
    async fn run_tool(&self, attempt: u64, call: &MessageToolCall) -> String {
        let raw = if call.arguments.trim().is_empty() { "{}" } else { call.arguments.as_str() };
        let parsed = serde_json::from_str::<serde_json::Value>(raw);

        self.emit(GenerationEvent::ToolCall {
            attempt,
            id: call.id.clone(),
            name: call.name.clone(),
            input: parsed
                .as_ref()
                .cloned()
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone())),
        });

        let started = Instant::now();
        let outcome = match parsed {
            Ok(arguments) => {
                self.tools
                    .execute(&ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments,
                    })
                    .await
            }
            Err(e) => Err(ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}"))),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (success, output) = match outcome {
            Ok(result) => (result.success, result.output),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                (false, serde_json::json!({ "error": e.to_string() }).to_string())
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
        self.emit(GenerationEvent::ToolResult {
            attempt,
            id: call.id.clone(),
            name: call.name.clone(),
            output: output.clone(),
            success,
        });
        output
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::agent::Persona;
    use parley_core::error::ValidationError;
    use parley_core::history::HistoryMirror;
    use parley_core::message::Role;
    use parley_core::provider::{ProviderResponse, StreamChunk};
    use parley_tools::GetMessageTool;
    use std::collections::VecDeque;
    use tokio::sync::{Mutex, mpsc};

    /// Provider that plays back scripted turns and records every request.
    pub(crate) struct ScriptedProvider {
        turns: Mutex<VecDeque<Result<Vec<StreamChunk>, ProviderError>>>,
        pub(crate) requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(turns: Vec<Result<Vec<StreamChunk>, ProviderError>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    pub(crate) fn text_turn(parts: &[&str]) -> Result<Vec<StreamChunk>, ProviderError> {
        let mut chunks: Vec<StreamChunk> = parts
            .iter()
            .map(|p| StreamChunk {
                content: Some(p.to_string()),
                ..Default::default()
            })
            .collect();
        chunks.push(StreamChunk {
            done: true,
            ..Default::default()
        });
        Ok(chunks)
    }

    pub(crate) fn tool_turn(name: &str, arguments: &str) -> Result<Vec<StreamChunk>, ProviderError> {
        Ok(vec![StreamChunk {
            tool_calls: vec![MessageToolCall {
                id: format!("call_{name}"),
                name: name.into(),
                arguments: arguments.into(),
            }],
            done: true,
            ..Default::default()
        }])
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("stream only".into()))
        }

        async fn stream(
            &self,
            request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
            self.requests.lock().await.push(request);
            let chunks = self
                .turns
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::StreamInterrupted("script exhausted".into())))?;
            let (tx, rx) = mpsc::channel(chunks.len().max(1));
            for chunk in chunks {
                let _ = tx.send(Ok(chunk)).await;
            }
            Ok(rx)
        }
    }

    pub(crate) fn chat(id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            timestamp: 1,
            message_id: id.into(),
            sender_name: "Alice".into(),
            sender_id: "u1".into(),
            channel_id: "c1".into(),
            channel_name: None,
            guild_id: None,
            guild_name: None,
            role: Role::User,
            content: content.into(),
            quote: None,
            need_reply: true,
            origin: "local:u1".into(),
        }
    }

    fn generator(provider: Arc<ScriptedProvider>, max_tool_iterations: u32) -> Generator {
        let mirror = HistoryMirror::from_loaded(vec![chat("m1", "what does yyds mean?")]);
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(GetMessageTool::new(mirror)));
        Generator::new(
            provider,
            Arc::new(tools),
            PromptBuilder::new(Persona::default()),
            GeneratorSettings {
                model: "test-model".into(),
                temperature: 0.7,
                max_tokens: Some(256),
                max_tool_iterations,
            },
            Arc::new(EventBus::default()),
        )
    }

    const REPLY: &str = r#"{"groups":[{"channel_id":"c1","segments":[{"quote_message_id":null,"contents":["hi"],"reaction_emojis":null}]}]}"#;

    #[tokio::test]
    async fn streamed_reply_is_parsed() {
        let (head, tail) = REPLY.split_at(20);
        let provider = Arc::new(ScriptedProvider::new(vec![text_turn(&[head, tail])]));
        let generator = generator(provider.clone(), 8);
        let mut events = generator.subscribe();

        let plan = generator.generate(1, &[chat("m1", "hello")]).await.unwrap();
        assert_eq!(plan.groups[0].segments[0].contents, vec!["hi"]);

        let requests = provider.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].stream);
        assert_eq!(requests[0].response_format.as_ref().unwrap().name, "chat_respond");
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].messages.len(), 2);

        assert_eq!(events.recv().await.unwrap().event_type(), "chunk");
        assert_eq!(events.recv().await.unwrap().event_type(), "chunk");
        assert_eq!(events.recv().await.unwrap().event_type(), "done");
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("get_message", r#"{"message_id":"m1"}"#),
            text_turn(&[REPLY]),
        ]));
        let generator = generator(provider.clone(), 8);

        generator.generate(1, &[]).await.unwrap();

        let requests = provider.requests.lock().await;
        assert_eq!(requests.len(), 2);
        let second = &requests[1].messages;
        let assistant = &second[second.len() - 2];
        assert_eq!(assistant.tool_calls[0].name, "get_message");
        let result = second.last().unwrap();
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_get_message"));
        assert!(result.content.contains("what does yyds mean?"));
    }

    #[tokio::test]
    async fn tool_failures_become_error_payloads() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("get_message", r#"{"message_id":"missing"}"#),
            tool_turn("no_such_tool", "{}"),
            tool_turn("get_message", "not json"),
            text_turn(&[REPLY]),
        ]));
        let generator = generator(provider.clone(), 8);
        let bus_rx = generator.event_bus.subscribe();

        generator.generate(1, &[]).await.unwrap();

        let requests = provider.requests.lock().await;
        for (i, needle) in [(1, "Message not found"), (2, "Tool not found"), (3, "not valid JSON")] {
            let payload: serde_json::Value =
                serde_json::from_str(&requests[i].messages.last().unwrap().content).unwrap();
            assert!(payload["error"].as_str().unwrap().contains(needle), "round {i}: {payload}");
        }
        assert_eq!(bus_rx.len(), 3);
    }

    #[tokio::test]
    async fn invalid_final_text_is_a_validation_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_turn(&["I'd rather not reply in JSON"])]));
        let generator = generator(provider, 8);
        let mut events = generator.subscribe();

        let err = generator.generate(4, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Malformed(_))));

        // chunk, done, error
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_eq!(last.unwrap().event_type(), "error");
    }

    #[tokio::test]
    async fn iteration_limit_bounds_tool_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_turn("get_message", r#"{"message_id":"m1"}"#),
            tool_turn("get_message", r#"{"message_id":"m1"}"#),
            tool_turn("get_message", r#"{"message_id":"m1"}"#),
        ]));
        let generator = generator(provider.clone(), 2);

        let err = generator.generate(1, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(provider.requests.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn provider_failure_ends_attempt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network("down".into()))]));
        let generator = generator(provider, 8);

        let err = generator.generate(1, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Network(_))));
    }
}
