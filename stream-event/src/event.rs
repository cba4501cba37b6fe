//! Protocol-level event types (type + payload).
//! State-carrying variants use `serde_json::Value`; the bridge in tiller serializes into that.

use serde::Serialize;
use serde_json::Value;

/// Protocol event: wire shape for one stream event (type + payload).
/// Envelope (session_id, thread_id, event_id) is applied separately.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    RunStart {
        thread_id: Option<String>,
    },
    Token {
        content: String,
    },
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },
    Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
    },
    Interrupt {
        kind: String,
        call_id: String,
        description: String,
        checkpoint_id: Option<String>,
    },
    Checkpoint {
        checkpoint_id: String,
        thread_id: String,
        message_count: usize,
    },
    Handoff {
        from: String,
        to: String,
    },
    RunEnd {
        output: String,
        duration_ms: u64,
    },
    Error {
        message: String,
    },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag() {
        let ev = ProtocolEvent::Token {
            content: "hi".to_string(),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "token");
        assert_eq!(v["content"], "hi");
    }

    #[test]
    fn tool_call_event_keeps_arguments_as_value() {
        let ev = ProtocolEvent::ToolCall {
            call_id: "call-1".to_string(),
            name: "add".to_string(),
            arguments: serde_json::json!({"a": 1, "b": 2}),
        };
        let v = ev.to_value().unwrap();
        assert_eq!(v["type"], "tool_call");
        assert_eq!(v["arguments"]["a"], 1);
    }
}
