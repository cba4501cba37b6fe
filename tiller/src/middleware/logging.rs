//! Structured logging middleware. No control-flow effect.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::middleware::context::AgentContext;
use crate::middleware::{InterceptionResult, Middleware};
use crate::state::{AgentState, ToolCall, ToolResult};

/// Emits tracing events around the invocation, each tool call, and (optionally)
/// every state update. Runs first on forward hooks and last on reverse ones.
pub struct LoggingMiddleware {
    log_state_updates: bool,
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            log_state_updates: false,
        }
    }

    pub fn with_state_updates(mut self, enabled: bool) -> Self {
        self.log_state_updates = enabled;
        self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn before_invoke(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        tracing::info!(
            session_id = %ctx.request.session_id,
            thread_id = ?ctx.request.thread_id,
            iteration = ctx.iteration,
            message_count = ctx.state().messages.len(),
            "model call starting"
        );
        Ok(())
    }

    async fn after_invoke(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        let output_len = ctx
            .response
            .as_ref()
            .map(|r| r.output.len())
            .unwrap_or_default();
        tracing::info!(
            session_id = %ctx.request.session_id,
            iteration = ctx.iteration,
            output_len,
            "iteration finished"
        );
        Ok(())
    }

    async fn before_tool_call(
        &self,
        call: &ToolCall,
        _ctx: &mut AgentContext,
    ) -> Result<InterceptionResult, AgentError> {
        tracing::info!(tool = %call.name, call_id = %call.id, "tool call starting");
        Ok(InterceptionResult::Continue)
    }

    async fn after_tool_call(
        &self,
        call: &ToolCall,
        result: &mut ToolResult,
        _ctx: &mut AgentContext,
    ) -> Result<(), AgentError> {
        tracing::info!(
            tool = %call.name,
            call_id = %call.id,
            is_error = result.is_error,
            content_len = result.content.len(),
            "tool call finished"
        );
        Ok(())
    }

    async fn on_state_update(
        &self,
        state: AgentState,
        _ctx: &mut AgentContext,
    ) -> Result<AgentState, AgentError> {
        if self.log_state_updates {
            tracing::debug!(
                version = state.version,
                message_count = state.messages.len(),
                "state updated"
            );
        }
        Ok(state)
    }

    async fn on_error(&self, error: &AgentError, ctx: &mut AgentContext) {
        tracing::warn!(
            session_id = %ctx.request.session_id,
            error = %error,
            "invocation failed"
        );
    }

    async fn on_finally(&self, ctx: &mut AgentContext, error: Option<&AgentError>) {
        tracing::debug!(
            session_id = %ctx.request.session_id,
            had_error = error.is_some(),
            "invocation cleanup"
        );
    }
}
