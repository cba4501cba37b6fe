//! In-memory checkpointer (MemorySaver). Process-local; for dev and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::memory::checkpoint_id::next_checkpoint_id;
use crate::memory::checkpointer::{CheckpointError, CheckpointInfo, Checkpointer};
use crate::message::next_timestamp_ms;
use crate::state::AgentState;

struct Record {
    /// JSON blob, so load returns a deep copy with the same round-trip semantics
    /// as the SQLite saver.
    payload: String,
    info: CheckpointInfo,
}

/// In-memory checkpointer keyed by `(thread_id, checkpoint_id)`.
///
/// Writes on a thread go through the per-thread entry lock of the map, which keeps
/// checkpoint ids strictly monotone per thread under concurrent saves.
#[derive(Default)]
pub struct MemorySaver {
    threads: DashMap<String, Vec<Record>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<String, CheckpointError> {
        let payload = serde_json::to_string(state)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let mut entry = self.threads.entry(thread_id.to_string()).or_default();
        let checkpoint_id = next_checkpoint_id();
        let parent_checkpoint_id = entry.last().map(|r| r.info.checkpoint_id.clone());
        entry.push(Record {
            payload,
            info: CheckpointInfo {
                thread_id: thread_id.to_string(),
                checkpoint_id: checkpoint_id.clone(),
                created_at: next_timestamp_ms(),
                message_count: state.messages.len(),
                parent_checkpoint_id,
            },
        });
        Ok(checkpoint_id)
    }

    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<AgentState>, CheckpointError> {
        let Some(records) = self.threads.get(thread_id) else {
            return Ok(None);
        };
        let Some(record) = records
            .iter()
            .find(|r| r.info.checkpoint_id == checkpoint_id)
        else {
            return Ok(None);
        };
        let state = serde_json::from_str(&record.payload)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        Ok(Some(state))
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError> {
        let Some(records) = self.threads.get(thread_id) else {
            return Ok(None);
        };
        let Some(record) = records.last() else {
            return Ok(None);
        };
        let state = serde_json::from_str(&record.payload)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        Ok(Some(state))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let Some(records) = self.threads.get(thread_id) else {
            return Ok(Vec::new());
        };
        Ok(records.iter().rev().map(|r| r.info.clone()).collect())
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, CheckpointError> {
        let Some(mut records) = self.threads.get_mut(thread_id) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.info.checkpoint_id != checkpoint_id);
        Ok(records.len() != before)
    }
}
