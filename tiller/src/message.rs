//! Conversation message model: System / Human / Assistant / Tool.
//!
//! Every message carries a creation timestamp (epoch millis, monotonically increasing
//! within a process) and is immutable after construction. Tool messages correlate to a
//! tool call in the preceding assistant message via `tool_call_id`; see
//! [`AgentState::validate`](crate::state::AgentState::validate) for the invariant.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use crate::state::{ToolCall, ToolResult};

/// Last timestamp handed out, to keep message creation times strictly increasing
/// even when the wall clock ties within one millisecond.
static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Returns the current epoch-millis timestamp, bumped past the previous one on ties.
pub(crate) fn next_timestamp_ms() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_TIMESTAMP_MS.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_TIMESTAMP_MS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}

/// Sets role/instructions. At most one per state, always at index 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub content: String,
    pub created_at: i64,
}

/// One user turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HumanMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: i64,
}

/// One model turn: text (possibly empty) plus the tool calls it requested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_tokens: Option<u32>,
    pub created_at: i64,
}

/// The framework's report of one tool execution, fed back to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolMessage {
    /// Must match a `ToolCall::id` in the immediately preceding assistant message.
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: i64,
}

/// Tagged conversation record. Constructed via the helpers below; fields are
/// never mutated after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Human(HumanMessage),
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(SystemMessage {
            content: content.into(),
            created_at: next_timestamp_ms(),
        })
    }

    pub fn human(content: impl Into<String>) -> Self {
        Message::Human(HumanMessage {
            content: content.into(),
            user_id: None,
            created_at: next_timestamp_ms(),
        })
    }

    pub fn human_from(content: impl Into<String>, user_id: impl Into<String>) -> Self {
        Message::Human(HumanMessage {
            content: content.into(),
            user_id: Some(user_id.into()),
            created_at: next_timestamp_ms(),
        })
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage {
            content: content.into(),
            tool_calls: Vec::new(),
            reasoning: None,
            usage_tokens: None,
            created_at: next_timestamp_ms(),
        })
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Message::Assistant(AssistantMessage {
            content: content.into(),
            tool_calls,
            reasoning: None,
            usage_tokens: None,
            created_at: next_timestamp_ms(),
        })
    }

    /// Builds the tool-role message for one executed (or refused) tool call.
    pub fn tool(result: &ToolResult) -> Self {
        Message::Tool(ToolMessage {
            tool_call_id: result.tool_call_id.clone(),
            content: result.content.clone(),
            is_error: result.is_error,
            error_message: result.error_message.clone(),
            created_at: next_timestamp_ms(),
        })
    }

    /// Wire role name: `system` / `human` / `assistant` / `tool`.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System(_) => "system",
            Message::Human(_) => "human",
            Message::Assistant(_) => "assistant",
            Message::Tool(_) => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System(m) => &m.content,
            Message::Human(m) => &m.content,
            Message::Assistant(m) => &m.content,
            Message::Tool(m) => &m.content,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            Message::System(m) => m.created_at,
            Message::Human(m) => m.created_at,
            Message::Assistant(m) => m.created_at,
            Message::Tool(m) => m.created_at,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Message::Assistant(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tool(&self) -> Option<&ToolMessage> {
        match self {
            Message::Tool(m) => Some(m),
            _ => None,
        }
    }
}
