//! Chat history backends for Parley.
//!
//! Every backend implements `parley_core::HistoryStore`: an upsert-only log
//! keyed by `(timestamp, message_id)` that can be bulk-loaded at startup.

pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryHistory;
pub use noop::NoopHistory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistory;

use parley_core::HistoryStore;
use parley_core::error::HistoryError;
use std::path::Path;
use std::sync::Arc;

/// Open the backend named by `history.backend` ("sqlite", "memory", "none").
pub async fn open(backend: &str, path: &Path) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match backend {
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteHistory::open(path).await?)),
        "memory" => Ok(Arc::new(InMemoryHistory::new())),
        "none" => Ok(Arc::new(NoopHistory)),
        other => Err(HistoryError::Storage(format!("unknown history backend '{other}'"))),
    }
}
