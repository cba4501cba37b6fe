//! SQLite-backed checkpointer (SqliteSaver). Persistent across process restarts.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::memory::checkpoint_id::next_checkpoint_id;
use crate::memory::checkpointer::{CheckpointError, CheckpointInfo, Checkpointer};
use crate::message::next_timestamp_ms;
use crate::state::AgentState;

/// SQLite-backed checkpointer. Key: `(thread_id, checkpoint_id)`.
///
/// Persistent; for single-node and dev. Uses spawn_blocking for async; each
/// operation opens its own connection so the saver is `Send + Sync` without a
/// connection pool.
///
/// **Interaction**: Used as `Arc<dyn Checkpointer>` via
/// [`AgentBuilder::checkpointer`](crate::agent::AgentBuilder::checkpointer).
pub struct SqliteSaver {
    db_path: std::path::PathBuf,
}

impl SqliteSaver {
    /// Creates a new SQLite checkpointer and ensures the table exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT NOT NULL,
                checkpoint_id TEXT NOT NULL,
                parent_checkpoint_id TEXT,
                created_at INTEGER NOT NULL,
                message_count INTEGER NOT NULL,
                payload BLOB NOT NULL,
                PRIMARY KEY (thread_id, checkpoint_id)
            )
            "#,
            [],
        )
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_thread
             ON checkpoints (thread_id, checkpoint_id)",
            [],
        )
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(Self { db_path })
    }

    fn row_to_state(payload: Vec<u8>) -> Result<AgentState, CheckpointError> {
        serde_json::from_slice(&payload).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl Checkpointer for SqliteSaver {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<String, CheckpointError> {
        let payload = serde_json::to_vec(state)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let message_count = state.messages.len() as i64;
        let checkpoint_id = next_checkpoint_id();
        let created_at = next_timestamp_ms();
        let thread_id = thread_id.to_string();
        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            // One transaction per save: parent lookup and insert see a consistent
            // newest row even under concurrent saves on the thread.
            let tx = conn
                .transaction()
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            let parent: Option<String> = tx
                .query_row(
                    "SELECT checkpoint_id FROM checkpoints WHERE thread_id = ?1
                     ORDER BY checkpoint_id DESC LIMIT 1",
                    params![thread_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            tx.execute(
                r#"
                INSERT INTO checkpoints
                (thread_id, checkpoint_id, parent_checkpoint_id, created_at, message_count, payload)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    thread_id,
                    checkpoint_id,
                    parent,
                    created_at,
                    message_count,
                    payload,
                ],
            )
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            tx.commit()
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            Ok::<String, CheckpointError>(checkpoint_id)
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<AgentState>, CheckpointError> {
        let thread_id = thread_id.to_string();
        let checkpoint_id = checkpoint_id.to_string();
        let db_path = self.db_path.clone();

        let payload: Option<Vec<u8>> = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            conn.query_row(
                "SELECT payload FROM checkpoints WHERE thread_id = ?1 AND checkpoint_id = ?2",
                params![thread_id, checkpoint_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CheckpointError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))??;

        payload.map(Self::row_to_state).transpose()
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError> {
        let thread_id = thread_id.to_string();
        let db_path = self.db_path.clone();

        let payload: Option<Vec<u8>> = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            conn.query_row(
                "SELECT payload FROM checkpoints WHERE thread_id = ?1
                 ORDER BY checkpoint_id DESC LIMIT 1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CheckpointError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))??;

        payload.map(Self::row_to_state).transpose()
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let thread_id = thread_id.to_string();
        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            let mut stmt = conn
                .prepare(
                    "SELECT checkpoint_id, parent_checkpoint_id, created_at, message_count
                     FROM checkpoints WHERE thread_id = ?1
                     ORDER BY checkpoint_id DESC",
                )
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![thread_id.clone()], |row| {
                    Ok(CheckpointInfo {
                        thread_id: thread_id.clone(),
                        checkpoint_id: row.get(0)?,
                        parent_checkpoint_id: row.get(1)?,
                        created_at: row.get(2)?,
                        message_count: row.get::<_, i64>(3)? as usize,
                    })
                })
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| CheckpointError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, CheckpointError> {
        let thread_id = thread_id.to_string();
        let checkpoint_id = checkpoint_id.to_string();
        let db_path = self.db_path.clone();

        let deleted = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            conn.execute(
                "DELETE FROM checkpoints WHERE thread_id = ?1 AND checkpoint_id = ?2",
                params![thread_id, checkpoint_id],
            )
            .map_err(|e| CheckpointError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))??;

        Ok(deleted > 0)
    }
}
