//! Streaming events for agent runs.
//!
//! [`StreamEvent`] is the in-process event the executor forwards to the
//! application callback during `Agent::stream`. [`to_protocol_event`] bridges it
//! into the dependency-light wire shape of the `stream-event` crate for transport
//! layers (SSE, WebSocket).

use stream_event::ProtocolEvent;

use crate::agent::Interrupt;
use crate::llm::TokenUsage;
use crate::state::{ToolCall, ToolResult};

/// One event in an agent run's stream, in emission order:
/// `RunStart`, then tokens/tool activity/checkpoints, then exactly one of
/// `RunEnd`, `Interrupt` (pause), or `Error`.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    RunStart {
        thread_id: Option<String>,
    },
    /// Incremental assistant content delta.
    Token {
        content: String,
    },
    /// A tool call's payload completed accumulation.
    ToolCall {
        call: ToolCall,
    },
    /// One tool execution finished (or was refused).
    ToolResult {
        result: ToolResult,
    },
    Usage {
        usage: TokenUsage,
    },
    /// Execution paused for human approval.
    Interrupt {
        interrupt: Interrupt,
    },
    /// A checkpoint was persisted.
    Checkpoint {
        checkpoint_id: String,
        thread_id: String,
        message_count: usize,
    },
    /// The coordinator transferred control between sub-agents.
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

/// Bridges an internal event into the wire protocol shape.
pub fn to_protocol_event(event: &StreamEvent) -> ProtocolEvent {
    match event {
        StreamEvent::RunStart { thread_id } => ProtocolEvent::RunStart {
            thread_id: thread_id.clone(),
        },
        StreamEvent::Token { content } => ProtocolEvent::Token {
            content: content.clone(),
        },
        StreamEvent::ToolCall { call } => ProtocolEvent::ToolCall {
            call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: serde_json::from_str(&call.arguments)
                .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone())),
        },
        StreamEvent::ToolResult { result } => ProtocolEvent::ToolResult {
            call_id: result.tool_call_id.clone(),
            content: result.content.clone(),
            is_error: result.is_error,
        },
        StreamEvent::Usage { usage } => ProtocolEvent::Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        },
        StreamEvent::Interrupt { interrupt } => ProtocolEvent::Interrupt {
            kind: "approval_required".to_string(),
            call_id: interrupt.tool_call.id.clone(),
            description: interrupt.description.clone(),
            checkpoint_id: interrupt.checkpoint_id.clone(),
        },
        StreamEvent::Checkpoint {
            checkpoint_id,
            thread_id,
            message_count,
        } => ProtocolEvent::Checkpoint {
            checkpoint_id: checkpoint_id.clone(),
            thread_id: thread_id.clone(),
            message_count: *message_count,
        },
        StreamEvent::Handoff { from, to } => ProtocolEvent::Handoff {
            from: from.clone(),
            to: to.clone(),
        },
        StreamEvent::RunEnd {
            output,
            duration_ms,
        } => ProtocolEvent::RunEnd {
            output: output.clone(),
            duration_ms: *duration_ms,
        },
        StreamEvent::Error { message } => ProtocolEvent::Error {
            message: message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Tool-call arguments bridge as parsed JSON; malformed arguments
    /// degrade to a string payload instead of failing.
    #[test]
    fn tool_call_arguments_bridge_to_json() {
        let event = StreamEvent::ToolCall {
            call: ToolCall::new("c1", "add", r#"{"a":1}"#),
        };
        let value = to_protocol_event(&event).to_value().unwrap();
        assert_eq!(value["arguments"]["a"], 1);

        let raw = StreamEvent::ToolCall {
            call: ToolCall::new("c2", "add", "not-json"),
        };
        let value = to_protocol_event(&raw).to_value().unwrap();
        assert_eq!(value["arguments"], "not-json");
    }

    /// **Scenario**: The interrupt bridge carries kind, call id, and checkpoint id.
    #[test]
    fn interrupt_bridges_with_checkpoint() {
        let mut interrupt = Interrupt::approval_required(ToolCall::new("c1", "delete_file", "{}"));
        interrupt.checkpoint_id = Some("0000000000000000001-abc123".to_string());
        let value = to_protocol_event(&StreamEvent::Interrupt { interrupt })
            .to_value()
            .unwrap();
        assert_eq!(value["type"], "interrupt");
        assert_eq!(value["kind"], "approval_required");
        assert_eq!(value["call_id"], "c1");
        assert!(value["checkpoint_id"]
            .as_str()
            .unwrap()
            .ends_with("abc123"));
    }
}
