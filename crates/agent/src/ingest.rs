//! Ingestion — turns a settled inbound snapshot into a history record.
//!
//! Resolves display names through the receiving endpoint, stamps a
//! strictly increasing timestamp, and classifies the message as loopback
//! (one of our own endpoints said it), mention, or plain chatter.

use std::sync::Arc;

use chrono::Utc;
use parley_config::PlaceholderConfig;
use parley_core::chat::ChatMessage;
use parley_core::endpoint::InboundEvent;
use parley_core::message::Role;
use parley_endpoints::{EndpointRegistry, MetadataResolver};
use tracing::{debug, warn};

use crate::trigger::TriggerSignal;

/// Millisecond clock that never repeats or goes backwards.
#[derive(Debug, Clone, Default)]
pub struct MonotonicClock {
    last: i64,
}

impl MonotonicClock {
    /// Clock whose first reading is strictly after `last`.
    pub fn starting_after(last: i64) -> Self {
        Self { last }
    }

    /// Next timestamp given the wall clock reading `now_ms`.
    pub fn next(&mut self, now_ms: i64) -> i64 {
        let ts = now_ms.max(self.last + 1);
        self.last = ts;
        ts
    }

    pub fn now(&mut self) -> i64 {
        self.next(Utc::now().timestamp_millis())
    }
}

/// Channel allowlist. Empty means every channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    allowed: Vec<String>,
}

impl ChannelFilter {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn accepts(&self, channel_id: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|c| c == channel_id)
    }
}

/// A settled message ready for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub message: ChatMessage,
    pub signal: TriggerSignal,
}

pub struct Ingestor {
    endpoints: Arc<EndpointRegistry>,
    resolver: MetadataResolver,
    persona_name: String,
    clock: MonotonicClock,
}

impl Ingestor {
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        placeholders: PlaceholderConfig,
        persona_name: impl Into<String>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            endpoints,
            resolver: MetadataResolver::new(placeholders),
            persona_name: persona_name.into(),
            clock,
        }
    }

    fn mentions_persona(&self, content: &str) -> bool {
        (!self.persona_name.is_empty() && content.contains(&self.persona_name)) || self.endpoints.mentions(content)
    }

    /// Build the history record for a settled event.
    ///
    /// Returns `None` when the receiving endpoint is no longer registered.
    pub async fn prepare(&mut self, event: InboundEvent) -> Option<Settled> {
        let Some(endpoint) = self.endpoints.get(&event.endpoint) else {
            warn!(endpoint = %event.endpoint, message_id = %event.session.message_id, "Dropping message from unknown endpoint");
            return None;
        };

        let session = event.session;
        let names = self.resolver.resolve(endpoint.as_ref(), &session).await;
        let origin = session.origin();
        let loopback = self.endpoints.is_self(&origin);
        let signal = TriggerSignal::classify(loopback, self.mentions_persona(&session.content));

        let message = ChatMessage {
            timestamp: self.clock.now(),
            message_id: session.message_id,
            sender_name: names.sender_name,
            sender_id: session.sender_id,
            channel_id: session.channel_id,
            channel_name: names.channel_name,
            guild_id: session.guild_id,
            guild_name: names.guild_name,
            role: if loopback { Role::Assistant } else { Role::User },
            content: session.content,
            quote: session.quote,
            need_reply: !loopback,
            origin,
        };
        debug!(message_id = %message.message_id, ?signal, "Message prepared");

        Some(Settled { message, signal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::endpoint::{Endpoint, InboundKind};
    use parley_endpoints::LocalEndpoint;

    fn ingestor(endpoint: &Arc<LocalEndpoint>) -> Ingestor {
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint.clone());
        Ingestor::new(
            Arc::new(registry),
            PlaceholderConfig::default(),
            "Xiaoming",
            MonotonicClock::default(),
        )
    }

    fn event(endpoint: &LocalEndpoint, sender: &str, content: &str) -> InboundEvent {
        InboundEvent {
            endpoint: endpoint.name().to_string(),
            kind: InboundKind::Message,
            session: endpoint.session("m1", sender, "c1", content),
        }
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let mut clock = MonotonicClock::starting_after(1_000);
        assert_eq!(clock.next(500), 1_001);
        assert_eq!(clock.next(1_001), 1_002);
        assert_eq!(clock.next(5_000), 5_000);
        assert_eq!(clock.next(5_000), 5_001);
    }

    #[test]
    fn empty_allowlist_accepts_everything() {
        assert!(ChannelFilter::default().accepts("anything"));
        let filter = ChannelFilter::new(vec!["c1".into()]);
        assert!(filter.accepts("c1"));
        assert!(!filter.accepts("c2"));
    }

    #[tokio::test]
    async fn user_message_is_recorded_with_resolved_names() {
        let ep = Arc::new(LocalEndpoint::new("local", "bot"));
        ep.set_user_name("u1", "Alice").await;
        let mut ingestor = ingestor(&ep);

        let settled = ingestor.prepare(event(&ep, "u1", "hello all")).await.unwrap();
        assert_eq!(settled.signal, TriggerSignal::Plain);
        let m = settled.message;
        assert_eq!(m.sender_name, "Alice");
        assert_eq!(m.channel_name.as_deref(), Some("Unknown channel"));
        assert_eq!(m.role, Role::User);
        assert!(m.need_reply);
        assert_eq!(m.origin, "local:u1");
    }

    #[tokio::test]
    async fn own_echo_is_loopback_even_when_it_mentions_the_persona() {
        let ep = Arc::new(LocalEndpoint::new("local", "bot"));
        let mut ingestor = ingestor(&ep);

        let settled = ingestor.prepare(event(&ep, "bot", "I'm Xiaoming!")).await.unwrap();
        assert_eq!(settled.signal, TriggerSignal::Loopback);
        assert_eq!(settled.message.role, Role::Assistant);
        assert!(!settled.message.need_reply);
    }

    #[tokio::test]
    async fn persona_name_or_endpoint_id_is_a_mention() {
        let ep = Arc::new(LocalEndpoint::new("local", "bot"));
        let mut ingestor = ingestor(&ep);

        let by_name = ingestor.prepare(event(&ep, "u1", "hey Xiaoming")).await.unwrap();
        assert_eq!(by_name.signal, TriggerSignal::Mention);
        let by_id = ingestor.prepare(event(&ep, "u1", "@bot ping")).await.unwrap();
        assert_eq!(by_id.signal, TriggerSignal::Mention);
        assert!(by_id.message.timestamp > by_name.message.timestamp);
    }

    #[tokio::test]
    async fn unknown_endpoint_is_dropped() {
        let ep = Arc::new(LocalEndpoint::new("local", "bot"));
        let mut ingestor = ingestor(&ep);
        let mut e = event(&ep, "u1", "hi");
        e.endpoint = "gone".into();
        assert!(ingestor.prepare(e).await.is_none());
    }
}
