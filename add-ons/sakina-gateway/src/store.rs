//! Conversation history on local SQLite. One row per completed turn.
//!
//! The store holds only the database path and opens a connection per
//! operation; rusqlite connections are not Sync, and turn volume is far
//! below the point where per-append opens matter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use sakina_core::{ConversationLogger, SakinaError, SakinaResult, TurnRecord};

#[derive(Clone)]
pub struct SqliteLog {
    db_path: PathBuf,
}

impl SqliteLog {
    pub fn new(db_path: PathBuf) -> Result<Self, rusqlite::Error> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
    }

    fn init(&self) -> Result<(), rusqlite::Error> {
        let conn = self.open()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                transcript TEXT NOT NULL,
                response TEXT NOT NULL,
                intent TEXT NOT NULL,
                emotion TEXT NOT NULL,
                escalated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_session
                ON conversations(session_id);",
        )?;
        Ok(())
    }

    fn insert(&self, record: &TurnRecord) -> Result<i64, rusqlite::Error> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO conversations
                (session_id, transcript, response, intent, emotion, escalated, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.session_id,
                record.transcript,
                record.response_text,
                record.intent,
                record.emotion,
                record.escalated as i64,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[async_trait]
impl ConversationLogger for SqliteLog {
    async fn append(&self, record: &TurnRecord) -> SakinaResult<i64> {
        let store = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.insert(&record))
            .await
            .map_err(|e| SakinaError::Persistence(format!("log task failed: {e}")))?
            .map_err(|e| SakinaError::Persistence(format!("sqlite insert failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(session: &str, escalated: bool) -> TurnRecord {
        TurnRecord {
            session_id: session.to_string(),
            transcript: "كيف حالك".to_string(),
            response_text: "بخير والحمد لله".to_string(),
            intent: "تحية".to_string(),
            emotion: "هدوء".to_string(),
            escalated,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_return_monotonic_row_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteLog::new(dir.path().join("conversations.db")).unwrap();
        let first = store.append(&record("s1", false)).await.unwrap();
        let second = store.append(&record("s1", true)).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.db");
        let store = SqliteLog::new(path.clone()).unwrap();
        store.append(&record("s1", false)).await.unwrap();
        drop(store);

        let reopened = SqliteLog::new(path).unwrap();
        let third = reopened.append(&record("s2", false)).await.unwrap();
        assert_eq!(third, 2);
    }
}
