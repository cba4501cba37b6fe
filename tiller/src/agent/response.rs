//! Response: the outcome of one agent invocation.

use crate::agent::interrupt::Interrupt;
use crate::llm::TokenUsage;
use crate::message::Message;
use crate::state::{AgentState, ToolCall};

/// Result of `invoke`/`stream`/`resume`.
///
/// `output` is the content of the last assistant message (empty while paused on an
/// interrupt). `tool_calls` is flattened across iterations. Soft failures carry a
/// non-empty `error` with empty output; check [`is_success`](Response::is_success).
#[derive(Clone, Debug)]
pub struct Response {
    pub output: String,
    pub messages: Vec<Message>,
    pub state: AgentState,
    pub thread_id: Option<String>,
    pub checkpoint_id: Option<String>,
    pub duration_ms: u64,
    /// Epoch millis.
    pub start_time: i64,
    pub end_time: i64,
    /// Model calls made during this invocation.
    pub iterations: u32,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    /// Set when execution paused for human approval.
    pub interrupt: Option<Interrupt>,
    pub error: Option<String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True when the run paused for external input instead of finishing.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_some()
    }
}
