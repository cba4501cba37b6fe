//! Interrupts and resume commands for human-in-the-loop suspension.

use serde::{Deserialize, Serialize};

use crate::state::ToolCall;

/// Why execution paused. Approval is the only defined cause today.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    ApprovalRequired,
}

/// A suspension of the loop requiring external input.
///
/// Carries the pending tool call and, once the executor has checkpointed, the
/// `(thread_id, checkpoint_id)` to resume from. Approvals are scoped to that pair;
/// they are never cached across threads or users.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    pub kind: InterruptKind,
    pub tool_call: ToolCall,
    pub description: String,
    pub thread_id: Option<String>,
    pub checkpoint_id: Option<String>,
}

impl Interrupt {
    pub fn approval_required(tool_call: ToolCall) -> Self {
        let description = format!(
            "tool call '{}' requires human approval before execution",
            tool_call.name
        );
        Self {
            kind: InterruptKind::ApprovalRequired,
            tool_call,
            description,
            thread_id: None,
            checkpoint_id: None,
        }
    }
}

/// How to continue a paused tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ResumeCommand {
    /// Execute the paused call with its original arguments.
    Approve,
    /// Execute with replacement arguments; the call id is preserved so the
    /// resulting tool message still correlates.
    ApproveEdited { arguments: String },
    /// Skip execution; the model observes the refusal as an error tool message.
    Reject { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: The approval interrupt names the tool in its description and
    /// starts with no checkpoint attached.
    #[test]
    fn approval_interrupt_describes_tool() {
        let interrupt = Interrupt::approval_required(ToolCall::new("c1", "delete_file", "{}"));
        assert_eq!(interrupt.kind, InterruptKind::ApprovalRequired);
        assert!(interrupt.description.contains("delete_file"));
        assert!(interrupt.checkpoint_id.is_none());
    }

    #[test]
    fn resume_command_serde_tagging() {
        let cmd = ResumeCommand::Reject {
            reason: "policy forbids system paths".into(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"command\":\"reject\""));
        let back: ResumeCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }
}
