//! Conversation logging seam.
//!
//! The pipeline appends one [`TurnRecord`](crate::turn::TurnRecord) per
//! terminal turn, escalated or not. Appends are fire-and-forget from the
//! pipeline's perspective: a failed write is logged as a warning and never
//! undoes a response already delivered to the caller.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::SakinaResult;
use crate::turn::TurnRecord;

/// Append-only sink for completed turns. Writers append independently; no
/// update or delete, so no cross-turn locking is required of callers.
#[async_trait]
pub trait ConversationLogger: Send + Sync {
    /// Append one record; returns the stored row id.
    async fn append(&self, record: &TurnRecord) -> SakinaResult<i64>;
}

/// In-memory logger for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<TurnRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<TurnRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ConversationLogger for MemoryLogger {
    async fn append(&self, record: &TurnRecord) -> SakinaResult<i64> {
        let mut records = self.records.lock().await;
        records.push(record.clone());
        Ok(records.len() as i64)
    }
}
