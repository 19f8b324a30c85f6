//! No-op history backend — disables persistence entirely.

use async_trait::async_trait;
use parley_core::chat::ChatMessage;
use parley_core::error::HistoryError;
use parley_core::history::HistoryStore;

/// A history backend that stores nothing and always loads empty.
pub struct NoopHistory;

#[async_trait]
impl HistoryStore for NoopHistory {
    fn name(&self) -> &str { "none" }

    async fn bulk_load(&self) -> Result<Vec<ChatMessage>, HistoryError> {
        Ok(Vec::new())
    }

    async fn upsert(&self, _messages: &[ChatMessage]) -> Result<(), HistoryError> {
        Ok(())
    }
}
