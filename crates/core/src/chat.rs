//! Chat history records.
//!
//! A [`ChatMessage`] is created once a message settles on ingestion and is
//! never mutated afterwards, with one exception: the `need_reply` flag is
//! cleared right before each generation attempt.

use serde::{Deserialize, Serialize};

use crate::message::Role;

/// A settled chat message, keyed by `(timestamp, message_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Milliseconds since the Unix epoch; the append-order primary key.
    pub timestamp: i64,

    /// Platform message ID
    pub message_id: String,

    /// Sender display name
    pub sender_name: String,

    /// Platform sender ID
    pub sender_id: String,

    /// Chat channel the message was posted in
    pub channel_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,

    /// Guild (server) ID; `None` for direct or ungrouped channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_name: Option<String>,

    pub role: Role,

    pub content: String,

    /// ID of the message this one quotes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,

    /// True while the message is an unanswered user utterance.
    pub need_reply: bool,

    /// Delivery-origin identifier (`platform:user`), used for loopback detection.
    pub origin: String,
}

impl ChatMessage {
    /// Primary key of this record.
    pub fn key(&self) -> (i64, &str) {
        (self.timestamp, self.message_id.as_str())
    }

    /// Compact view sent to the model as part of the prompt.
    pub fn envelope(&self) -> PromptEnvelope<'_> {
        PromptEnvelope {
            name: &self.sender_name,
            content: &self.content,
            message_id: &self.message_id,
            channel_id: &self.channel_id,
            quote: self.quote.as_deref(),
            need_reply: self.need_reply,
        }
    }

    /// View returned by the `get_message` tool. Internal fields are excluded.
    pub fn redacted(&self) -> RedactedMessage {
        RedactedMessage {
            timestamp: self.timestamp,
            message_id: self.message_id.clone(),
            name: self.sender_name.clone(),
            user_id: self.sender_id.clone(),
            channel_id: self.channel_id.clone(),
            channel_name: self.channel_name.clone(),
            guild_name: self.guild_name.clone(),
            content: self.content.clone(),
            quote: self.quote.clone(),
        }
    }
}

/// Per-message prompt envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEnvelope<'a> {
    pub name: &'a str,
    pub content: &'a str,
    pub message_id: &'a str,
    pub channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<&'a str>,
    pub need_reply: bool,
}

/// A chat message with the origin, guild ID, role and reply flag stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedMessage {
    pub timestamp: i64,
    pub message_id: String,
    pub name: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_name: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample(timestamp: i64, message_id: &str, content: &str) -> ChatMessage {
    ChatMessage {
        timestamp,
        message_id: message_id.into(),
        sender_name: "Alice".into(),
        sender_id: "u1".into(),
        channel_id: "c1".into(),
        channel_name: Some("general".into()),
        guild_id: Some("g1".into()),
        guild_name: Some("Guild".into()),
        role: Role::User,
        content: content.into(),
        quote: None,
        need_reply: true,
        origin: "local:u1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_compactly() {
        let msg = sample(1, "m1", "hello");
        let json = serde_json::to_string(&msg.envelope()).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Alice","content":"hello","messageId":"m1","channelId":"c1","needReply":true}"#
        );
    }

    #[test]
    fn redacted_view_drops_internal_fields() {
        let mut msg = sample(1, "m1", "hello");
        msg.quote = Some("m0".into());
        let json = serde_json::to_value(msg.redacted()).unwrap();
        assert!(json.get("origin").is_none());
        assert!(json.get("guildId").is_none());
        assert!(json.get("role").is_none());
        assert!(json.get("needReply").is_none());
        assert_eq!(json["quote"], "m0");
        assert_eq!(json["channelName"], "general");
    }

    #[test]
    fn key_is_timestamp_and_id() {
        let msg = sample(42, "m9", "x");
        assert_eq!(msg.key(), (42, "m9"));
    }
}
