//! SQLite history backend.
//!
//! One table, `messages`, with a composite primary key
//! `(timestamp, message_id)`. Writes are upserts so replaying a record
//! (e.g. after a `need_reply` reset) never duplicates it.

use async_trait::async_trait;
use parley_core::chat::ChatMessage;
use parley_core::error::HistoryError;
use parley_core::history::HistoryStore;
use parley_core::message::Role;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// A SQLite-backed chat history.
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) the database file at `path`.
    ///
    /// The parent directory and the schema are created automatically.
    pub async fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HistoryError::Storage(format!("Cannot create {}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let history = Self { pool };
        history.run_migrations().await?;
        info!("SQLite history initialized at {}", path.display());
        Ok(history)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let history = Self { pool };
        history.run_migrations().await?;
        Ok(history)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                timestamp     INTEGER NOT NULL,
                message_id    TEXT NOT NULL,
                sender_name   TEXT NOT NULL,
                sender_id     TEXT NOT NULL,
                channel_id    TEXT NOT NULL,
                channel_name  TEXT,
                guild_id      TEXT,
                guild_name    TEXT,
                role          TEXT NOT NULL,
                content       TEXT NOT NULL,
                quote         TEXT,
                need_reply    INTEGER NOT NULL DEFAULT 0,
                origin        TEXT NOT NULL,
                PRIMARY KEY (timestamp, message_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("messages table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage, HistoryError> {
        fn col<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, HistoryError>
        where
            T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
        {
            row.try_get(name)
                .map_err(|e| HistoryError::QueryFailed(format!("{name} column: {e}")))
        }

        let role: String = col(row, "role")?;
        Ok(ChatMessage {
            timestamp: col(row, "timestamp")?,
            message_id: col(row, "message_id")?,
            sender_name: col(row, "sender_name")?,
            sender_id: col(row, "sender_id")?,
            channel_id: col(row, "channel_id")?,
            channel_name: col(row, "channel_name")?,
            guild_id: col(row, "guild_id")?,
            guild_name: col(row, "guild_name")?,
            role: Role::parse(&role),
            content: col(row, "content")?,
            quote: col(row, "quote")?,
            need_reply: col(row, "need_reply")?,
            origin: col(row, "origin")?,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn bulk_load(&self) -> Result<Vec<ChatMessage>, HistoryError> {
        let rows = sqlx::query("SELECT * FROM messages ORDER BY timestamp ASC, message_id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::QueryFailed(format!("bulk load: {e}")))?;

        let messages: Vec<ChatMessage> = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<_, _>>()?;
        debug!(count = messages.len(), "Loaded chat history");
        Ok(messages)
    }

    async fn upsert(&self, messages: &[ChatMessage]) -> Result<(), HistoryError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HistoryError::Storage(format!("BEGIN failed: {e}")))?;

        for m in messages {
            sqlx::query(
                r#"
                INSERT INTO messages (timestamp, message_id, sender_name, sender_id, channel_id,
                                      channel_name, guild_id, guild_name, role, content, quote,
                                      need_reply, origin)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(timestamp, message_id) DO UPDATE SET
                    sender_name = excluded.sender_name,
                    sender_id = excluded.sender_id,
                    channel_id = excluded.channel_id,
                    channel_name = excluded.channel_name,
                    guild_id = excluded.guild_id,
                    guild_name = excluded.guild_name,
                    role = excluded.role,
                    content = excluded.content,
                    quote = excluded.quote,
                    need_reply = excluded.need_reply,
                    origin = excluded.origin
                "#,
            )
            .bind(m.timestamp)
            .bind(&m.message_id)
            .bind(&m.sender_name)
            .bind(&m.sender_id)
            .bind(&m.channel_id)
            .bind(&m.channel_name)
            .bind(&m.guild_id)
            .bind(&m.guild_name)
            .bind(m.role.as_str())
            .bind(&m.content)
            .bind(&m.quote)
            .bind(m.need_reply)
            .bind(&m.origin)
            .execute(&mut *tx)
            .await
            .map_err(|e| HistoryError::Storage(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| HistoryError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(count = messages.len(), "Upserted history records");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, HistoryError> {
        let rows = sqlx::query(
            "SELECT * FROM (SELECT * FROM messages ORDER BY timestamp DESC, message_id DESC LIMIT ?1)
             ORDER BY timestamp ASC, message_id ASC",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::QueryFailed(format!("recent: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }
}
