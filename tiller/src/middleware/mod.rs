//! Middleware: ordered interceptors around invoke, tool calls, state updates,
//! and errors.
//!
//! Each middleware carries a priority (smaller = earlier) and a name; the chain
//! sorts stably on priority at construction. Hooks default to no-ops, so an
//! implementation picks only the points it cares about.
//!
//! | Hook | Fired | Order |
//! |------|-------|-------|
//! | `before_invoke` | once per iteration, before the model call | forward |
//! | `after_invoke` | once per iteration, after the model call completes | reverse |
//! | `before_tool_call` | before each tool execution | forward, short-circuit |
//! | `after_tool_call` | after each tool execution | reverse |
//! | `on_state_update` | after each state mutation | forward, each may replace |
//! | `on_error` | if the pipeline raises | reverse |
//! | `on_finally` | always, after success or error | reverse |
//!
//! Built-ins: [`LoggingMiddleware`], [`SummarizingMiddleware`],
//! [`ApprovalMiddleware`], [`InjectionMiddleware`].

mod approval;
mod chain;
mod context;
mod inject;
mod logging;
mod summarize;

use async_trait::async_trait;

use crate::agent::Interrupt;
use crate::error::AgentError;
use crate::state::{AgentState, ToolCall, ToolResult};

pub use approval::{ApprovalMiddleware, ApprovalPolicy};
pub use chain::MiddlewareChain;
pub use context::{AgentContext, ContextSnapshot, RuntimeStatus};
pub use inject::{InjectionMiddleware, InjectionMode};
pub use logging::LoggingMiddleware;
pub use summarize::SummarizingMiddleware;

/// Default middleware priority; smaller runs earlier in forward hooks.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Outcome of the `before_tool_call` traversal. The first non-`Continue` result
/// terminates the forward pass and is returned to the executor.
#[derive(Clone, Debug)]
pub enum InterceptionResult {
    /// Proceed with tool execution.
    Continue,
    /// Skip this tool call; the executor appends a synthetic error tool message
    /// with the reason and treats the current assistant message as final.
    Stop(String),
    /// Suspend the invocation for external input (checkpointed by the executor).
    Interrupt(Interrupt),
}

/// One interceptor in the chain. All hooks are optional.
///
/// Instances are typically singletons shared across invocations and must be
/// thread-safe; per-invocation mutable data belongs in [`AgentContext::scratch`].
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Smaller runs earlier in forward hooks (and later in reverse hooks).
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Before each model call. May mutate the request or state on `ctx`.
    async fn before_invoke(&self, _ctx: &mut AgentContext) -> Result<(), AgentError> {
        Ok(())
    }

    /// After each model call (and that iteration's tool processing) completed.
    async fn after_invoke(&self, _ctx: &mut AgentContext) -> Result<(), AgentError> {
        Ok(())
    }

    /// Before one tool execution. The first non-`Continue` short-circuits.
    async fn before_tool_call(
        &self,
        _call: &ToolCall,
        _ctx: &mut AgentContext,
    ) -> Result<InterceptionResult, AgentError> {
        Ok(InterceptionResult::Continue)
    }

    /// After one tool execution; may inspect or replace the result in place.
    async fn after_tool_call(
        &self,
        _call: &ToolCall,
        _result: &mut ToolResult,
        _ctx: &mut AgentContext,
    ) -> Result<(), AgentError> {
        Ok(())
    }

    /// After each state mutation. Must return a state (possibly the argument
    /// unchanged); the returned snapshot becomes current.
    async fn on_state_update(
        &self,
        state: AgentState,
        _ctx: &mut AgentContext,
    ) -> Result<AgentState, AgentError> {
        Ok(state)
    }

    /// Observational; fired in reverse order when the pipeline raises.
    async fn on_error(&self, _error: &AgentError, _ctx: &mut AgentContext) {}

    /// Resource cleanup; always fired, after success or error.
    async fn on_finally(&self, _ctx: &mut AgentContext, _error: Option<&AgentError>) {}
}
