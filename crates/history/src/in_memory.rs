//! In-memory backend — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::chat::ChatMessage;
use parley_core::error::HistoryError;
use parley_core::history::HistoryStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Key = (i64, String);

/// Stores messages in an ordered map keyed like the SQLite primary key.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    entries: Arc<RwLock<BTreeMap<Key, ChatMessage>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str { "in_memory" }

    async fn bulk_load(&self) -> Result<Vec<ChatMessage>, HistoryError> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn upsert(&self, messages: &[ChatMessage]) -> Result<(), HistoryError> {
        let mut entries = self.entries.write().await;
        for message in messages {
            entries.insert((message.timestamp, message.message_id.clone()), message.clone());
        }
        Ok(())
    }
}
