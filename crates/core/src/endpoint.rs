//! Endpoint trait — the abstraction over delivery bots.
//!
//! An Endpoint is one bot identity on one chat platform. It yields inbound
//! message/edit events, sends outbound messages and reactions, and answers
//! metadata lookups for the ids it has seen. Several endpoints may serve the
//! same channels; the delivery layer falls back between them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::{EndpointError, LookupError};

/// Snapshot of an inbound message as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Platform message ID
    pub message_id: String,

    /// Current text content
    pub content: String,

    /// Platform name of the receiving endpoint (e.g., "console", "local")
    pub platform: String,

    /// Platform sender ID
    pub sender_id: String,

    /// Account username, used when no nickname can be resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    pub channel_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// ID of the quoted message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

impl Session {
    /// Delivery-origin identifier: `platform:sender_id`.
    pub fn origin(&self) -> String {
        format!("{}:{}", self.platform, self.sender_id)
    }
}

/// Whether an inbound event is a new message or an edit of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundKind {
    Message,
    Edit,
}

/// An inbound event tagged with the endpoint that received it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Name of the receiving endpoint
    pub endpoint: String,

    pub kind: InboundKind,

    pub session: Session,
}

/// One outbound chat bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundItem {
    pub content: String,

    /// Message to quote (only set on the first item of a segment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

impl OutboundItem {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), quote: None }
    }
}

/// The core Endpoint trait.
///
/// Implementations handle platform connection, formatting, and rate limits.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Endpoint name (e.g., "console", "local"). Also the origin platform.
    fn name(&self) -> &str;

    /// The bot's own user ID on its platform.
    fn self_id(&self) -> &str;

    /// Start listening for inbound events.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<InboundEvent, EndpointError>>,
        EndpointError,
    >;

    /// Send items to a channel, in order. Returns one platform message ID per item.
    async fn send(
        &self,
        channel_id: &str,
        items: &[OutboundItem],
    ) -> std::result::Result<Vec<String>, EndpointError>;

    /// Attach an emoji reaction to a message.
    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> std::result::Result<(), EndpointError>;

    /// Whether an origin identifier belongs to this endpoint.
    fn is_self(&self, origin: &str) -> bool {
        origin
            .split_once(':')
            .map(|(platform, id)| platform == self.name() && id == self.self_id())
            .unwrap_or(false)
    }

    /// Resolve a user's display name in a guild.
    async fn resolve_user(
        &self,
        _guild_id: Option<&str>,
        _user_id: &str,
    ) -> std::result::Result<Option<String>, LookupError> {
        Ok(None)
    }

    async fn resolve_channel(&self, _channel_id: &str) -> std::result::Result<Option<String>, LookupError> {
        Ok(None)
    }

    async fn resolve_guild(&self, _guild_id: &str) -> std::result::Result<Option<String>, LookupError> {
        Ok(None)
    }

    /// Stop the endpoint gracefully.
    async fn stop(&self) -> std::result::Result<(), EndpointError> {
        Ok(())
    }

    /// Health check — is the endpoint connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, EndpointError> {
        Ok(true)
    }
}
