//! Message lookup tool — reads a message from the history by ID.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::history::HistoryMirror;
use parley_core::tool::{Tool, ToolResult};

pub struct GetMessageTool {
    mirror: HistoryMirror,
}

impl GetMessageTool {
    pub fn new(mirror: HistoryMirror) -> Self {
        Self { mirror }
    }
}

#[async_trait]
impl Tool for GetMessageTool {
    fn name(&self) -> &str {
        "get_message"
    }

    fn description(&self) -> &str {
        "Read a message by ID, e.g. one that was quoted but is outside the visible history."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message_id": {
                    "type": "string",
                    "description": "ID of the message to read"
                }
            },
            "required": ["message_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let message_id = arguments["message_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message_id' argument".into()))?;

        let message = self
            .mirror
            .find(message_id)
            .await
            .ok_or_else(|| ToolError::MessageNotFound(message_id.to_string()))?;

        let view = serde_json::to_value(message.redacted())
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;
        Ok(ToolResult::json(true, serde_json::json!({ "success": true, "message": view })))
    }
}
