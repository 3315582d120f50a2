//! Durable chat message storage.
//!
//! The router only needs `append`; the history endpoint uses `history`.
//! Both are blocking calls and must be driven from `spawn_blocking`.

use chrono::{DateTime, Utc};

use crate::chat::message::ChatMessage;
use crate::db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("blocking task failed: {0}")]
    TaskJoin(String),
}

/// Append/query interface for chat messages.
pub trait MessageStore: Send + Sync {
    /// Durably record one message.
    fn append(&self, message: &ChatMessage) -> Result<(), StoreError>;

    /// Messages exchanged between `a` and `b` in either direction.
    ///
    /// Selects the newest `limit` messages after skipping `offset` newer
    /// ones, and returns them oldest first.
    fn history(
        &self,
        a: &str,
        b: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

/// SQLite-backed store sharing the server's connection.
#[derive(Clone)]
pub struct SqliteMessageStore {
    db: DbPool,
}

impl SqliteMessageStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl MessageStore for SqliteMessageStore {
    fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".into()))?;
        conn.execute(
            "INSERT INTO messages (sender, receiver, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                message.from,
                message.to,
                message.content,
                message.timestamp_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn history(
        &self,
        a: &str,
        b: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".into()))?;
        let mut stmt = conn.prepare(
            "SELECT sender, receiver, content, timestamp
             FROM messages
             WHERE (sender = ?1 AND receiver = ?2) OR (sender = ?2 AND receiver = ?1)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3 OFFSET ?4",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![a, b, i64::from(limit), i64::from(offset)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?;

        let mut messages = Vec::new();
        for row in rows {
            let (from, to, content, raw_ts) = row?;
            let timestamp = parse_timestamp(&raw_ts)?;
            messages.push(ChatMessage {
                from,
                to,
                content,
                timestamp,
            });
        }
        // Newest-first from SQL, callers want reading order.
        messages.reverse();
        Ok(messages)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Unavailable(format!("corrupt timestamp {raw:?}: {e}")))
}
