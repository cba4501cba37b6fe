//! Checkpointer trait, CheckpointError, CheckpointInfo.
//!
//! Saves and loads state snapshots by `(thread_id, checkpoint_id)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::AgentState;

/// Error type for checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage: {0}")]
    Storage(String),
}

/// Listing entry for one saved checkpoint. Carries enough for a host to render a
/// thread timeline without deserializing state blobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub thread_id: String,
    /// Unique per thread; lexicographically sortable, newest has the largest id.
    pub checkpoint_id: String,
    /// Epoch millis at save time.
    pub created_at: i64,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_checkpoint_id: Option<String>,
}

/// Saves and loads checkpoints by `(thread_id, checkpoint_id)`.
///
/// Implementations must serialize writes per thread so that checkpoint ids stay
/// strictly monotone per thread, and must persist a deep copy: mutating the saved
/// state afterwards never changes what `load` returns.
///
/// **Interaction**: Injected into [`Agent`](crate::agent::Agent) at build time; the
/// executor saves after each completed invocation and at approval interrupts, and
/// loads on thread resume.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persists a deep copy of the state; returns the newly minted checkpoint id,
    /// strictly greater than any prior id on the thread.
    async fn save(&self, thread_id: &str, state: &AgentState) -> Result<String, CheckpointError>;

    /// Returns the state at the given checkpoint, or `None`.
    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<AgentState>, CheckpointError>;

    /// Returns the state with the greatest checkpoint id on the thread, if any.
    async fn load_latest(&self, thread_id: &str) -> Result<Option<AgentState>, CheckpointError>;

    /// Lists checkpoints on the thread, newest first.
    async fn list(&self, thread_id: &str) -> Result<Vec<CheckpointInfo>, CheckpointError>;

    /// Deletes one checkpoint. Returns whether it existed.
    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of each CheckpointError variant contains expected keywords.
    #[test]
    fn checkpoint_error_display_all_variants() {
        assert!(CheckpointError::Serialization("err".into())
            .to_string()
            .contains("serialization"));
        assert!(CheckpointError::Storage("io".into())
            .to_string()
            .contains("storage"));
    }
}
