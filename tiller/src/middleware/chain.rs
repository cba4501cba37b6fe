//! Middleware chain: stable priority order, forward/reverse traversal,
//! short-circuiting tool-call interception.

use std::sync::Arc;

use crate::error::AgentError;
use crate::middleware::context::AgentContext;
use crate::middleware::{InterceptionResult, Middleware};
use crate::state::{AgentState, ToolCall, ToolResult};

fn wrap_hook_error(name: &str, error: AgentError) -> AgentError {
    match error {
        already @ AgentError::Middleware { .. } => already,
        other => AgentError::middleware(name, other),
    }
}

/// Ordered interceptor list. Sorts stably on priority at construction, so
/// middleware with equal priorities keep their registration order.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    items: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(mut items: Vec<Arc<dyn Middleware>>) -> Self {
        items.sort_by_key(|m| m.priority());
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Names in execution (forward) order; mainly for logs and tests.
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|m| m.name().to_string()).collect()
    }

    /// Forward traversal; the first failing hook aborts with a wrapped error.
    pub async fn before_invoke(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        for m in &self.items {
            m.before_invoke(ctx)
                .await
                .map_err(|e| wrap_hook_error(m.name(), e))?;
        }
        Ok(())
    }

    /// Reverse traversal.
    pub async fn after_invoke(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        for m in self.items.iter().rev() {
            m.after_invoke(ctx)
                .await
                .map_err(|e| wrap_hook_error(m.name(), e))?;
        }
        Ok(())
    }

    /// Forward traversal; the first non-`Continue` result wins.
    pub async fn before_tool_call(
        &self,
        call: &ToolCall,
        ctx: &mut AgentContext,
    ) -> Result<InterceptionResult, AgentError> {
        for m in &self.items {
            match m
                .before_tool_call(call, ctx)
                .await
                .map_err(|e| wrap_hook_error(m.name(), e))?
            {
                InterceptionResult::Continue => continue,
                other => return Ok(other),
            }
        }
        Ok(InterceptionResult::Continue)
    }

    /// Reverse traversal; hooks may replace the result in place.
    pub async fn after_tool_call(
        &self,
        call: &ToolCall,
        result: &mut ToolResult,
        ctx: &mut AgentContext,
    ) -> Result<(), AgentError> {
        for m in self.items.iter().rev() {
            m.after_tool_call(call, result, ctx)
                .await
                .map_err(|e| wrap_hook_error(m.name(), e))?;
        }
        Ok(())
    }

    /// Forward fold: each hook receives the previous hook's output state.
    pub async fn on_state_update(
        &self,
        mut state: AgentState,
        ctx: &mut AgentContext,
    ) -> Result<AgentState, AgentError> {
        for m in &self.items {
            state = m
                .on_state_update(state, ctx)
                .await
                .map_err(|e| wrap_hook_error(m.name(), e))?;
        }
        Ok(state)
    }

    /// Reverse traversal; hooks are infallible by signature, so nothing to log.
    pub async fn on_error(&self, error: &AgentError, ctx: &mut AgentContext) {
        for m in self.items.iter().rev() {
            m.on_error(error, ctx).await;
        }
    }

    /// Reverse traversal; always runs.
    pub async fn on_finally(&self, ctx: &mut AgentContext, error: Option<&AgentError>) {
        for m in self.items.iter().rev() {
            m.on_finally(ctx, error).await;
        }
    }
}
