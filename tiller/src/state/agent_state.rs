//! AgentState, ToolCall, ToolResult.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{next_timestamp_ms, AssistantMessage, Message};

/// A single tool invocation from the model. Ids are unique per assistant message;
/// `arguments` is the raw JSON string the model emitted (parsing is the invoker's
/// concern at call time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Result of one tool execution, correlated back to the call by `tool_call_id`.
///
/// **Interaction**: Produced by [`ToolInvoker::invoke`](crate::tools::ToolInvoker::invoke)
/// (never an `Err`; failures are carried in `is_error`), turned into a tool-role
/// message via [`Message::tool`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
            error_message: None,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            tool_call_id: tool_call_id.into(),
            content: message.clone(),
            is_error: true,
            error_message: Some(message),
        }
    }
}

/// Violation of a state invariant, reported by [`AgentState::validate`].
#[derive(Debug, thiserror::Error)]
pub enum StateInvariantError {
    #[error("tool message at index {index} references unknown tool_call_id {tool_call_id}")]
    UnmatchedToolMessage { index: usize, tool_call_id: String },
    #[error("system message at index {0}; at most one is allowed, at index 0")]
    MisplacedSystemMessage(usize),
}

/// Immutable conversation snapshot: messages, scratch data, version.
///
/// Updates never mutate; [`with_message`](AgentState::with_message) and
/// [`with_data_entry`](AgentState::with_data_entry) consume the snapshot and return a
/// derived one with `version + 1`. The executor holds the current snapshot and swaps
/// it on every append, so middleware and responses can keep earlier snapshots alive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Ordered conversation (append-only semantics).
    pub messages: Vec<Message>,
    /// Scratch space for middleware and application code.
    #[serde(default)]
    pub data: HashMap<String, Value>,
    /// Incremented on every derived state.
    pub version: u64,
    /// Epoch millis when this snapshot was derived.
    pub created_at: i64,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentState {
    /// Empty state, version 1.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            data: HashMap::new(),
            version: 1,
            created_at: next_timestamp_ms(),
        }
    }

    /// Fresh state seeded with a system message.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self::new().with_message(Message::system(prompt))
    }

    /// Derives a new state with one more message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self.version += 1;
        self.created_at = next_timestamp_ms();
        self
    }

    /// Derives a new state with `key` set in the data map.
    pub fn with_data_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self.version += 1;
        self.created_at = next_timestamp_ms();
        self
    }

    /// Derives a new state with the message list replaced wholesale. Used by
    /// summarization, which compacts history; version still advances by one.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self.version += 1;
        self.created_at = next_timestamp_ms();
        self
    }

    /// Content of the system message, when present (always index 0).
    pub fn system_prompt(&self) -> Option<&str> {
        match self.messages.first() {
            Some(Message::System(m)) => Some(&m.content),
            _ => None,
        }
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&AssistantMessage> {
        self.messages.iter().rev().find_map(Message::as_assistant)
    }

    /// Content of the most recent assistant message, or empty.
    pub fn last_assistant_reply(&self) -> &str {
        self.last_assistant().map(|m| m.content.as_str()).unwrap_or("")
    }

    /// Checks the structural invariants:
    /// - every tool message's `tool_call_id` matches a tool call in the nearest
    ///   preceding assistant message;
    /// - at most one system message, at index 0.
    pub fn validate(&self) -> Result<(), StateInvariantError> {
        let mut live_call_ids: Vec<String> = Vec::new();
        for (index, message) in self.messages.iter().enumerate() {
            match message {
                Message::System(_) if index != 0 => {
                    return Err(StateInvariantError::MisplacedSystemMessage(index));
                }
                Message::Assistant(m) => {
                    live_call_ids = m.tool_calls.iter().map(|c| c.id.clone()).collect();
                }
                Message::Tool(m) => {
                    if !live_call_ids.iter().any(|id| id == &m.tool_call_id) {
                        return Err(StateInvariantError::UnmatchedToolMessage {
                            index,
                            tool_call_id: m.tool_call_id.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
