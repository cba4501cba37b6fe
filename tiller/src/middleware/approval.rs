//! Human-in-the-loop approval middleware.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::agent::Interrupt;
use crate::error::AgentError;
use crate::middleware::context::AgentContext;
use crate::middleware::{InterceptionResult, Middleware};
use crate::state::ToolCall;

/// Which tool calls require human approval before execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Every tool call pauses for approval.
    Always,
    /// Only the named tools pause.
    Whitelist(HashSet<String>),
    /// Every tool except the named ones pauses.
    Blacklist(HashSet<String>),
    /// No tool pauses.
    Never,
}

impl ApprovalPolicy {
    pub fn whitelist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ApprovalPolicy::Whitelist(names.into_iter().map(Into::into).collect())
    }

    pub fn blacklist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ApprovalPolicy::Blacklist(names.into_iter().map(Into::into).collect())
    }

    /// Whether a call to `tool_name` must pause for approval.
    pub fn requires_approval(&self, tool_name: &str) -> bool {
        match self {
            ApprovalPolicy::Always => true,
            ApprovalPolicy::Whitelist(names) => names.contains(tool_name),
            ApprovalPolicy::Blacklist(names) => !names.contains(tool_name),
            ApprovalPolicy::Never => false,
        }
    }
}

/// Raises an approval interrupt for policy-matched tool calls.
///
/// Approvals are never cached: every matching call interrupts, and the resulting
/// approval is consumed by the resume of its own `(thread_id, checkpoint_id)`.
pub struct ApprovalMiddleware {
    policy: ApprovalPolicy,
}

impl ApprovalMiddleware {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }
}

#[async_trait]
impl Middleware for ApprovalMiddleware {
    fn name(&self) -> &str {
        "approval"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn before_tool_call(
        &self,
        call: &ToolCall,
        _ctx: &mut AgentContext,
    ) -> Result<InterceptionResult, AgentError> {
        if self.policy.requires_approval(&call.name) {
            tracing::info!(tool = %call.name, call_id = %call.id, "approval required");
            return Ok(InterceptionResult::Interrupt(Interrupt::approval_required(
                call.clone(),
            )));
        }
        Ok(InterceptionResult::Continue)
    }
}
