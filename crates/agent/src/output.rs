//! The structured reply the model must produce, and its strict parser.
//!
//! A reply is a list of groups, one per target channel. Each group holds
//! segments; a segment is a run of chat bubbles that may quote an earlier
//! message and may carry reactions for the last bubble. An empty `groups`
//! list means the persona chose to stay silent.

use parley_core::error::ValidationError;
use parley_core::provider::ResponseFormat;
use serde::{Deserialize, Serialize};

/// Name under which the reply schema is registered with the model.
pub const REPLY_SCHEMA_NAME: &str = "chat_respond";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyPlan {
    pub groups: Vec<ReplyGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyGroup {
    pub channel_id: String,
    pub segments: Vec<ReplySegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplySegment {
    pub quote_message_id: Option<String>,
    pub contents: Vec<String>,
    pub reaction_emojis: Option<Vec<String>>,
}

impl ReplySegment {
    /// Content strings that are worth sending.
    pub fn bubbles(&self) -> impl Iterator<Item = &str> {
        self.contents.iter().map(String::as_str).filter(|c| !c.trim().is_empty())
    }

    pub fn reactions(&self) -> &[String] {
        self.reaction_emojis.as_deref().unwrap_or_default()
    }
}

impl ReplyPlan {
    /// Whether the model chose not to say anything.
    pub fn is_silent(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (g, group) in self.groups.iter().enumerate() {
            if group.channel_id.trim().is_empty() {
                return Err(schema_error(format!("groups[{g}].channel_id"), "must not be empty"));
            }
            if group.segments.is_empty() {
                return Err(schema_error(format!("groups[{g}].segments"), "needs at least one segment"));
            }
            for (s, segment) in group.segments.iter().enumerate() {
                if segment.bubbles().next().is_none() {
                    return Err(schema_error(
                        format!("groups[{g}].segments[{s}].contents"),
                        "needs at least one non-blank message",
                    ));
                }
                if let Some(i) = segment.reactions().iter().position(|e| e.trim().is_empty()) {
                    return Err(schema_error(
                        format!("groups[{g}].segments[{s}].reaction_emojis[{i}]"),
                        "must not be blank",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn schema_error(path: String, reason: &str) -> ValidationError {
    ValidationError::Schema {
        path,
        reason: reason.to_string(),
    }
}

/// Strictly parse and validate the model's final text.
pub fn parse_reply(text: &str) -> Result<ReplyPlan, ValidationError> {
    let plan: ReplyPlan =
        serde_json::from_str(text.trim()).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    plan.validate()?;
    Ok(plan)
}

/// JSON Schema for [`ReplyPlan`], in the strict structured-output dialect.
pub fn reply_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "groups": {
                "type": "array",
                "description": "One entry per channel to reply in. Empty to stay silent.",
                "items": {
                    "type": "object",
                    "properties": {
                        "channel_id": {
                            "type": "string",
                            "description": "Channel to send the messages to"
                        },
                        "segments": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "quote_message_id": {
                                        "type": ["string", "null"],
                                        "description": "ID of the message to quote, or null"
                                    },
                                    "contents": {
                                        "type": "array",
                                        "items": { "type": "string" },
                                        "description": "Messages to send, one chat bubble each"
                                    },
                                    "reaction_emojis": {
                                        "type": ["array", "null"],
                                        "items": { "type": "string" },
                                        "description": "Emojis to react to your own last message with, or null"
                                    }
                                },
                                "required": ["quote_message_id", "contents", "reaction_emojis"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["channel_id", "segments"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["groups"],
        "additionalProperties": false
    })
}

pub fn response_format() -> ResponseFormat {
    ResponseFormat {
        name: REPLY_SCHEMA_NAME.into(),
        schema: reply_schema(),
        strict: true,
    }
}
