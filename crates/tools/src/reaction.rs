//! Reaction tool — lets the persona react to other people's messages.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::history::HistoryMirror;
use parley_core::tool::{Tool, ToolResult};
use parley_endpoints::EndpointRegistry;
use std::sync::Arc;
use tracing::debug;

pub struct CreateReactionTool {
    mirror: HistoryMirror,
    endpoints: Arc<EndpointRegistry>,
}

impl CreateReactionTool {
    pub fn new(mirror: HistoryMirror, endpoints: Arc<EndpointRegistry>) -> Self {
        Self { mirror, endpoints }
    }
}

#[async_trait]
impl Tool for CreateReactionTool {
    fn name(&self) -> &str {
        "create_reaction"
    }

    fn description(&self) -> &str {
        "Add emoji reactions to a message in the chat history."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message_id": {
                    "type": "string",
                    "description": "ID of the message to react to"
                },
                "emojis": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Emojis to add, one reaction each"
                }
            },
            "required": ["message_id", "emojis"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let message_id = arguments["message_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message_id' argument".into()))?;
        let emojis: Vec<&str> = arguments["emojis"]
            .as_array()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'emojis' array".into()))?
            .iter()
            .filter_map(|e| e.as_str())
            .filter(|e| !e.trim().is_empty())
            .collect();
        if emojis.is_empty() {
            return Err(ToolError::InvalidArguments("'emojis' must contain at least one emoji".into()));
        }

        let target = self
            .mirror
            .find(message_id)
            .await
            .ok_or_else(|| ToolError::MessageNotFound(message_id.to_string()))?;

        let mut succeeded = 0;
        for emoji in &emojis {
            succeeded += self
                .endpoints
                .react_everywhere(&target.channel_id, message_id, emoji)
                .await;
        }
        debug!(message_id, emojis = emojis.len(), succeeded, "create_reaction");

        if succeeded == 0 {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: "no endpoint could add the reaction".into(),
            });
        }
        Ok(ToolResult::json(true, serde_json::json!({ "success": true })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::chat::ChatMessage;
    use parley_core::message::Role;
    use parley_endpoints::LocalEndpoint;

    fn message(id: &str, channel: &str) -> ChatMessage {
        ChatMessage {
            timestamp: 1,
            message_id: id.into(),
            sender_name: "Alice".into(),
            sender_id: "u1".into(),
            channel_id: channel.into(),
            channel_name: None,
            guild_id: None,
            guild_name: None,
            role: Role::User,
            content: "lol".into(),
            quote: None,
            need_reply: false,
            origin: "local:u1".into(),
        }
    }

    fn setup(endpoints: &[Arc<LocalEndpoint>]) -> CreateReactionTool {
        let mut registry = EndpointRegistry::new();
        for e in endpoints {
            registry.register(e.clone());
        }
        let mirror = HistoryMirror::from_loaded(vec![message("m1", "c7")]);
        CreateReactionTool::new(mirror, Arc::new(registry))
    }

    #[tokio::test]
    async fn reacts_on_every_endpoint_in_message_channel() {
        let a = Arc::new(LocalEndpoint::new("alpha", "bot-a"));
        let b = Arc::new(LocalEndpoint::new("beta", "bot-b"));
        let tool = setup(&[a.clone(), b.clone()]);

        let result = tool
            .execute(serde_json::json!({"message_id": "m1", "emojis": ["👍", "🎉"]}))
            .await
            .unwrap();
        assert_eq!(result.output, r#"{"success":true}"#);

        let reactions = a.reactions().await;
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[0].channel_id, "c7");
        assert_eq!(b.reactions().await.len(), 2);
    }

    #[tokio::test]
    async fn partial_endpoint_failure_still_succeeds() {
        let a = Arc::new(LocalEndpoint::new("alpha", "bot-a"));
        let b = Arc::new(LocalEndpoint::new("beta", "bot-b"));
        a.fail_reactions(true);
        let tool = setup(&[a, b.clone()]);

        let result = tool.execute(serde_json::json!({"message_id": "m1", "emojis": ["👍"]})).await;
        assert!(result.unwrap().success);
        assert_eq!(b.reactions().await.len(), 1);
    }

    #[tokio::test]
    async fn all_endpoints_failing_is_an_error() {
        let a = Arc::new(LocalEndpoint::new("alpha", "bot-a"));
        a.fail_reactions(true);
        let tool = setup(&[a]);

        let err = tool
            .execute(serde_json::json!({"message_id": "m1", "emojis": ["👍"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn unknown_message_is_not_found() {
        let a = Arc::new(LocalEndpoint::new("alpha", "bot-a"));
        let tool = setup(&[a.clone()]);

        let err = tool
            .execute(serde_json::json!({"message_id": "nope", "emojis": ["👍"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MessageNotFound(id) if id == "nope"));
        assert!(a.reactions().await.is_empty());
    }

    #[tokio::test]
    async fn empty_emoji_list_rejected() {
        let tool = setup(&[]);
        let err = tool
            .execute(serde_json::json!({"message_id": "m1", "emojis": [" "]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
