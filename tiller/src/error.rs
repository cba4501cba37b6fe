//! Framework-level error type for agent runs.
//!
//! Tool failures are data (an error [`ToolResult`](crate::state::ToolResult) fed back to
//! the model), never an `AgentError`. Everything that aborts an invocation (model
//! transport, auth, checkpoint I/O, middleware bugs, timeout, cancellation) is one of
//! the variants here.

use std::time::Duration;

use crate::memory::CheckpointError;

/// Error for one agent invocation. Carries a kind per variant; wrapped causes are
/// flattened into the message.
///
/// **Interaction**: Returned by `ChatModel::chat`, the middleware chain, and
/// `Agent::{invoke, stream, batch, resume}`. `is_retryable` classifies transport-level
/// failures for callers that retry.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// HTTP, timeout, or parse failure talking to the model endpoint.
    #[error("model transport: {message}")]
    ModelTransport { message: String, retryable: bool },

    /// 401/403 from the model endpoint. Fatal.
    #[error("model auth: {0}")]
    ModelAuth(String),

    /// The model signalled prompt overflow; the application may retry with
    /// summarization middleware enabled.
    #[error("context too long: {0}")]
    ContextTooLong(String),

    /// Checkpoint persistence failed; the current invocation is aborted.
    #[error("checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// No checkpoint with the given id on the thread (resume path).
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// A middleware hook raised; wrapped with the middleware name.
    #[error("middleware {name}: {message}")]
    Middleware { name: String, message: String },

    /// Wall clock exceeded the configured per-invocation bound.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The caller's cancellation signal fired.
    #[error("cancelled")]
    Cancelled,

    /// Malformed request (e.g. unknown coordinator node, empty entry point).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AgentError {
    /// True for failures worth retrying: transient transport errors (429, 5xx,
    /// connect/read timeouts) and the invocation timeout itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::ModelTransport { retryable, .. } => *retryable,
            AgentError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Shorthand for a retryable transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        AgentError::ModelTransport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Shorthand for a non-retryable transport error (4xx other than auth).
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        AgentError::ModelTransport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a hook failure with the middleware's name.
    pub fn middleware(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AgentError::Middleware {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
