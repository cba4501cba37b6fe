//! Per-invocation context threaded through the middleware chain.

use std::collections::HashMap;

use serde_json::Value;

use crate::agent::{Request, Response};
use crate::state::AgentState;

/// Where the invocation currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeStatus {
    Idle,
    Running,
    WaitingForTool,
    WaitingForApproval,
    Error,
    Stopped,
}

/// Mutable view of one invocation, handed to every middleware hook.
///
/// One context per invocation; it is never shared across invocations and never
/// stored in thread-local storage; the executor threads it explicitly. The state
/// it points at is the current immutable snapshot; during an `on_state_update`
/// traversal the hook receives the candidate snapshot as an argument while the
/// context still points at the pre-update one.
pub struct AgentContext {
    /// The request; `before_invoke` middleware may adjust it.
    pub request: Request,
    /// Becomes non-None once a provisional or final response exists.
    pub response: Option<Response>,
    state: AgentState,
    pub status: RuntimeStatus,
    /// Completed loop iterations; 0 during the first model call of a fresh run.
    pub iteration: u32,
    /// Inter-middleware scratch map (`${context:key}` in variable injection).
    pub scratch: HashMap<String, Value>,
}

/// Shallow-immutable copy of a context, for saving across suspension points.
#[derive(Clone)]
pub struct ContextSnapshot {
    request: Request,
    response: Option<Response>,
    state: AgentState,
    status: RuntimeStatus,
    iteration: u32,
    scratch: HashMap<String, Value>,
}

impl AgentContext {
    pub fn new(request: Request, state: AgentState) -> Self {
        Self {
            request,
            response: None,
            state,
            status: RuntimeStatus::Idle,
            iteration: 0,
            scratch: HashMap::new(),
        }
    }

    /// Read-only view of the current state snapshot.
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Swaps in a replacement snapshot. For the executor's append path and for
    /// state-rewriting middleware such as summarization.
    pub fn replace_state(&mut self, state: AgentState) {
        self.state = state;
    }

    /// Moves the current snapshot out (leaving an empty one) so it can be derived
    /// without cloning; pair with [`replace_state`](AgentContext::replace_state).
    pub fn take_state(&mut self) -> AgentState {
        std::mem::take(&mut self.state)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            request: self.request.clone(),
            response: self.response.clone(),
            state: self.state.clone(),
            status: self.status,
            iteration: self.iteration,
            scratch: self.scratch.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: ContextSnapshot) {
        self.request = snapshot.request;
        self.response = snapshot.response;
        self.state = snapshot.state;
        self.status = snapshot.status;
        self.iteration = snapshot.iteration;
        self.scratch = snapshot.scratch;
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("status", &self.status)
            .field("iteration", &self.iteration)
            .field("state_version", &self.state.version)
            .field("has_response", &self.response.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    /// **Scenario**: snapshot/restore round-trips status, iteration, state, and scratch.
    #[test]
    fn snapshot_restore_round_trip() {
        let mut ctx = AgentContext::new(Request::new("q"), AgentState::new());
        ctx.status = RuntimeStatus::Running;
        ctx.iteration = 2;
        ctx.scratch
            .insert("k".to_string(), serde_json::json!("v"));
        let snapshot = ctx.snapshot();

        ctx.status = RuntimeStatus::Error;
        ctx.iteration = 9;
        ctx.replace_state(AgentState::new().with_message(Message::human("changed")));
        ctx.scratch.clear();

        ctx.restore(snapshot);
        assert_eq!(ctx.status, RuntimeStatus::Running);
        assert_eq!(ctx.iteration, 2);
        assert!(ctx.state().messages.is_empty());
        assert_eq!(ctx.scratch["k"], "v");
    }

    /// **Scenario**: take_state + replace_state derive without cloning and keep the
    /// context coherent.
    #[test]
    fn take_and_replace_state() {
        let mut ctx = AgentContext::new(Request::new("q"), AgentState::new());
        let state = ctx.take_state();
        let derived = state.with_message(Message::human("hi"));
        ctx.replace_state(derived);
        assert_eq!(ctx.state().messages.len(), 1);
        assert_eq!(ctx.state().version, 2);
    }
}
