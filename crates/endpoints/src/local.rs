//! Local endpoint — an in-process bot.
//!
//! Inbound events are injected programmatically and every outbound send and
//! reaction is recorded. Sends, reactions, and metadata lookups can be made
//! to fail on demand, and sent messages can be echoed back as inbound events
//! the way real platforms echo a bot's own posts.

use async_trait::async_trait;
use parley_core::endpoint::{Endpoint, InboundEvent, InboundKind, OutboundItem, Session};
use parley_core::error::{EndpointError, LookupError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// One recorded `send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentBatch {
    pub channel_id: String,
    pub items: Vec<OutboundItem>,
    pub message_ids: Vec<String>,
}

/// One recorded reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub channel_id: String,
    pub message_id: String,
    pub emoji: String,
}

#[derive(Default)]
struct Directory {
    users: HashMap<String, String>,
    channels: HashMap<String, String>,
    guilds: HashMap<String, String>,
}

/// In-process endpoint.
pub struct LocalEndpoint {
    name: String,
    self_id: String,
    inject_tx: Mutex<Option<mpsc::Sender<Result<InboundEvent, EndpointError>>>>,
    next_id: AtomicU64,
    sent: Mutex<Vec<SentBatch>>,
    reactions: Mutex<Vec<Reaction>>,
    directory: Mutex<Directory>,
    fail_sends: AtomicBool,
    failing_channels: Mutex<HashSet<String>>,
    fail_reactions: AtomicBool,
    fail_lookups: AtomicBool,
    echo_sends: AtomicBool,
}

impl LocalEndpoint {
    pub fn new(name: impl Into<String>, self_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            self_id: self_id.into(),
            inject_tx: Mutex::new(None),
            next_id: AtomicU64::new(1),
            sent: Mutex::new(Vec::new()),
            reactions: Mutex::new(Vec::new()),
            directory: Mutex::new(Directory::default()),
            fail_sends: AtomicBool::new(false),
            failing_channels: Mutex::new(HashSet::new()),
            fail_reactions: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            echo_sends: AtomicBool::new(false),
        }
    }

    /// A session on this endpoint's platform.
    pub fn session(&self, message_id: &str, sender_id: &str, channel_id: &str, content: &str) -> Session {
        Session {
            message_id: message_id.into(),
            content: content.into(),
            platform: self.name.clone(),
            sender_id: sender_id.into(),
            username: Some(sender_id.into()),
            channel_id: channel_id.into(),
            guild_id: None,
            quote: None,
        }
    }

    /// Deliver an inbound event as if it came from the platform.
    pub async fn inject(&self, kind: InboundKind, session: Session) -> Result<(), EndpointError> {
        let guard = self.inject_tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| EndpointError::ConnectionLost("Endpoint not started".into()))?;
        let event = InboundEvent {
            endpoint: self.name.clone(),
            kind,
            session,
        };
        tx.send(Ok(event))
            .await
            .map_err(|_| EndpointError::ConnectionLost("Inbound channel closed".into()))
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Reject sends to one channel only.
    pub async fn fail_channel(&self, channel_id: &str) {
        self.failing_channels.lock().await.insert(channel_id.into());
    }

    pub fn fail_reactions(&self, fail: bool) {
        self.fail_reactions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Echo every sent item back as an inbound message from this bot.
    pub fn echo_sends(&self, echo: bool) {
        self.echo_sends.store(echo, Ordering::SeqCst);
    }

    pub async fn set_user_name(&self, user_id: &str, name: &str) {
        self.directory.lock().await.users.insert(user_id.into(), name.into());
    }

    pub async fn set_channel_name(&self, channel_id: &str, name: &str) {
        self.directory.lock().await.channels.insert(channel_id.into(), name.into());
    }

    pub async fn set_guild_name(&self, guild_id: &str, name: &str) {
        self.directory.lock().await.guilds.insert(guild_id.into(), name.into());
    }

    /// Recorded sends, oldest first.
    pub async fn sent(&self) -> Vec<SentBatch> {
        self.sent.lock().await.clone()
    }

    /// Recorded reactions, oldest first.
    pub async fn reactions(&self) -> Vec<Reaction> {
        self.reactions.lock().await.clone()
    }

    fn lookup_guard(&self) -> Result<(), LookupError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(LookupError::Network(format!("{} directory unavailable", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl Endpoint for LocalEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<InboundEvent, EndpointError>>, EndpointError> {
        info!(endpoint = %self.name, "Local endpoint starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, channel_id: &str, items: &[OutboundItem]) -> Result<Vec<String>, EndpointError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(EndpointError::DeliveryFailed {
                endpoint: self.name.clone(),
                reason: "send disabled".into(),
            });
        }
        if self.failing_channels.lock().await.contains(channel_id) {
            return Err(EndpointError::DeliveryFailed {
                endpoint: self.name.clone(),
                reason: format!("channel {channel_id} unavailable"),
            });
        }

        let message_ids: Vec<String> = items
            .iter()
            .map(|_| format!("{}-{}", self.name, self.next_id.fetch_add(1, Ordering::SeqCst)))
            .collect();

        self.sent.lock().await.push(SentBatch {
            channel_id: channel_id.into(),
            items: items.to_vec(),
            message_ids: message_ids.clone(),
        });

        if self.echo_sends.load(Ordering::SeqCst) {
            for (item, id) in items.iter().zip(&message_ids) {
                let mut session = self.session(id, &self.self_id, channel_id, &item.content);
                session.quote = item.quote.clone();
                // Not started or receiver gone: nothing to echo to
                let _ = self.inject(InboundKind::Message, session).await;
            }
        }

        Ok(message_ids)
    }

    async fn react(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<(), EndpointError> {
        if self.fail_reactions.load(Ordering::SeqCst) {
            return Err(EndpointError::ReactionFailed {
                endpoint: self.name.clone(),
                reason: "reactions disabled".into(),
            });
        }
        self.reactions.lock().await.push(Reaction {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            emoji: emoji.into(),
        });
        Ok(())
    }

    async fn resolve_user(&self, _guild_id: Option<&str>, user_id: &str) -> Result<Option<String>, LookupError> {
        self.lookup_guard()?;
        Ok(self.directory.lock().await.users.get(user_id).cloned())
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<String>, LookupError> {
        self.lookup_guard()?;
        Ok(self.directory.lock().await.channels.get(channel_id).cloned())
    }

    async fn resolve_guild(&self, guild_id: &str) -> Result<Option<String>, LookupError> {
        self.lookup_guard()?;
        Ok(self.directory.lock().await.guilds.get(guild_id).cloned())
    }

    async fn stop(&self) -> Result<(), EndpointError> {
        info!(endpoint = %self.name, "Local endpoint stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, EndpointError> {
        Ok(self.inject_tx.lock().await.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inject_before_start_fails() {
        let ep = LocalEndpoint::new("local", "bot");
        let err = ep.inject(InboundKind::Message, ep.session("m1", "u1", "c1", "hi")).await;
        assert!(matches!(err, Err(EndpointError::ConnectionLost(_))));
    }

    #[tokio::test]
    async fn failing_channel_rejects_only_that_channel() {
        let ep = LocalEndpoint::new("local", "bot");
        ep.fail_channel("c1").await;
        assert!(ep.send("c1", &[OutboundItem::text("a")]).await.is_err());
        assert!(ep.send("c2", &[OutboundItem::text("b")]).await.is_ok());
        assert_eq!(ep.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn send_records_and_numbers_items() {
        let ep = LocalEndpoint::new("local", "bot");
        let ids = ep
            .send("c1", &[OutboundItem::text("a"), OutboundItem::text("b")])
            .await
            .unwrap();
        assert_eq!(ids, vec!["local-1", "local-2"]);

        let sent = ep.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, "c1");
        assert_eq!(sent[0].message_ids, ids);
    }

    #[tokio::test]
    async fn echoed_sends_come_back_as_own_messages() {
        let ep = LocalEndpoint::new("local", "bot");
        let mut rx = ep.start().await.unwrap();
        ep.echo_sends(true);

        ep.send("c1", &[OutboundItem { content: "hi".into(), quote: Some("m0".into()) }])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap().unwrap();
        assert_eq!(event.session.sender_id, "bot");
        assert_eq!(event.session.quote.as_deref(), Some("m0"));
        assert!(ep.is_self(&event.session.origin()));
    }

    #[tokio::test]
    async fn failures_on_demand() {
        let ep = LocalEndpoint::new("local", "bot");
        ep.fail_sends(true);
        ep.fail_reactions(true);
        ep.fail_lookups(true);

        assert!(matches!(
            ep.send("c1", &[OutboundItem::text("x")]).await,
            Err(EndpointError::DeliveryFailed { .. })
        ));
        assert!(matches!(ep.react("c1", "m1", "👍").await, Err(EndpointError::ReactionFailed { .. })));
        assert!(ep.resolve_channel("c1").await.is_err());
        assert!(ep.sent().await.is_empty());
    }

    #[tokio::test]
    async fn directory_lookups() {
        let ep = LocalEndpoint::new("local", "bot");
        ep.set_user_name("u1", "Alice").await;
        ep.set_guild_name("g1", "Rustaceans").await;

        assert_eq!(ep.resolve_user(Some("g1"), "u1").await.unwrap().as_deref(), Some("Alice"));
        assert_eq!(ep.resolve_guild("g1").await.unwrap().as_deref(), Some("Rustaceans"));
        assert_eq!(ep.resolve_channel("c9").await.unwrap(), None);
    }
}
