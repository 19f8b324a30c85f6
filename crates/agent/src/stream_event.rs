//! Generation-level streaming events.
//!
//! `GenerationEvent` turns provider stream chunks and tool activity into
//! higher-level events that observers (the CLI, tests) can follow live.

use parley_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted while a generation attempt runs.
///
/// - `chunk`       — partial text from the model
/// - `tool_call`   — the model is invoking a tool
/// - `tool_result` — tool execution completed
/// - `done`        — the attempt produced a final text
/// - `error`       — the attempt failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// Partial text from the model.
    Chunk { attempt: u64, content: String },

    /// The model is calling a tool.
    ToolCall {
        attempt: u64,
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        attempt: u64,
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// The model finished.
    Done {
        attempt: u64,
        usage: Option<Usage>,
        iterations: u32,
        tool_calls_made: usize,
    },

    /// The attempt failed.
    Error { attempt: u64, message: String },
}

impl GenerationEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// The attempt this event belongs to.
    pub fn attempt(&self) -> u64 {
        match self {
            Self::Chunk { attempt, .. }
            | Self::ToolCall { attempt, .. }
            | Self::ToolResult { attempt, .. }
            | Self::Done { attempt, .. }
            | Self::Error { attempt, .. } => *attempt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = GenerationEvent::Chunk {
            attempt: 3,
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
        assert_eq!(event.attempt(), 3);
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = GenerationEvent::ToolCall {
            attempt: 1,
            id: "call_1".into(),
            name: "get_message".into(),
            input: serde_json::json!({"message_id": "m1"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""name":"get_message""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = GenerationEvent::Done {
            attempt: 1,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            }),
            iterations: 2,
            tool_calls_made: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""iterations":2"#));
    }

    #[test]
    fn event_type_names() {
        let result = GenerationEvent::ToolResult {
            attempt: 1,
            id: "a".into(),
            name: "b".into(),
            output: "c".into(),
            success: true,
        };
        assert_eq!(result.event_type(), "tool_result");
        assert_eq!(
            GenerationEvent::Error {
                attempt: 1,
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"chunk","attempt":2,"content":"hi"}"#;
        let event: GenerationEvent = serde_json::from_str(json).unwrap();
        match event {
            GenerationEvent::Chunk { attempt, content } => {
                assert_eq!(attempt, 2);
                assert_eq!(content, "hi");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
