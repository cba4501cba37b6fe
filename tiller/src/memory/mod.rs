//! # Memory: checkpoint persistence
//!
//! [`Checkpointer`] saves and loads [`AgentState`](crate::state::AgentState) snapshots
//! per conversation thread.
//!
//! ## Overview
//!
//! A **thread** is a conversation identified by `thread_id`: a sequence of checkpoints
//! that share state history. Checkpoint ids are sortable ASCII (epoch micros + random
//! suffix) and strictly increase per thread, so `load_latest` and newest-first `list`
//! need no extra ordering column.
//!
//! ## Implementations
//!
//! | Type             | Persistence | Use case                |
//! |------------------|-------------|-------------------------|
//! | [`MemorySaver`]  | In-memory   | Dev, tests              |
//! | [`SqliteSaver`]  | SQLite file | Single-node, production |
//!
//! Both persist the full serialized state (`messages` + `data` + `version` +
//! timestamps); a `load(save(s))` round-trip is deep-equal to `s`.

mod checkpoint_id;
mod checkpointer;
mod memory_saver;
mod sqlite_saver;

pub use checkpoint_id::next_checkpoint_id;
pub use checkpointer::{CheckpointError, CheckpointInfo, Checkpointer};
pub use memory_saver::MemorySaver;
pub use sqlite_saver::SqliteSaver;
