//! History storage — the durable message log and its in-memory mirror.
//!
//! The store is append-mostly: records are upserted by `(timestamp, message_id)`
//! and never deleted. The mirror holds the full ordered history for the
//! running agent; only the engine appends to it, tools read it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chat::ChatMessage;
use crate::error::HistoryError;

/// The core HistoryStore trait.
///
/// Implementations: SQLite, in-memory (for testing), none (no-op).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory", "none").
    fn name(&self) -> &str;

    /// Load every stored message, ordered by `(timestamp, message_id)`.
    async fn bulk_load(&self) -> std::result::Result<Vec<ChatMessage>, HistoryError>;

    /// Insert or replace records. Idempotent on the primary key.
    async fn upsert(&self, messages: &[ChatMessage]) -> std::result::Result<(), HistoryError>;

    /// The `limit` most recent messages, oldest first.
    async fn recent(&self, limit: usize) -> std::result::Result<Vec<ChatMessage>, HistoryError> {
        let mut all = self.bulk_load().await?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }
}

/// Shared, ordered in-memory copy of the chat history.
#[derive(Debug, Clone, Default)]
pub struct HistoryMirror {
    inner: Arc<RwLock<Vec<ChatMessage>>>,
}

impl HistoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror seeded from a bulk load.
    pub fn from_loaded(messages: Vec<ChatMessage>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(messages)),
        }
    }

    pub async fn push(&self, message: ChatMessage) {
        self.inner.write().await.push(message);
    }

    /// Most recent message with the given ID.
    pub async fn find(&self, message_id: &str) -> Option<ChatMessage> {
        self.inner
            .read()
            .await
            .iter()
            .rev()
            .find(|m| m.message_id == message_id)
            .cloned()
    }

    /// The last `n` messages, oldest first.
    pub async fn tail(&self, n: usize) -> Vec<ChatMessage> {
        let guard = self.inner.read().await;
        let start = guard.len().saturating_sub(n);
        guard[start..].to_vec()
    }

    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.inner.read().await.clone()
    }

    /// Clear `need_reply` everywhere. Returns the records that changed.
    pub async fn clear_need_reply(&self) -> Vec<ChatMessage> {
        let mut guard = self.inner.write().await;
        let mut changed = Vec::new();
        for message in guard.iter_mut().filter(|m| m.need_reply) {
            message.need_reply = false;
            changed.push(message.clone());
        }
        changed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
