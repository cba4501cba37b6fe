//! Request: one user turn handed to an agent.

use std::collections::HashMap;

use serde_json::Value;

use crate::state::AgentState;

/// Input for one `invoke`/`stream` call.
///
/// `session_id` is minted when absent. `parameters` feeds middleware-visible
/// variable injection (`${request:key}`); it does not set model parameters.
/// `state` carries a prior conversation snapshot for continuation: when present,
/// the executor resumes from it instead of loading a checkpoint.
#[derive(Clone, Debug)]
pub struct Request {
    pub input: String,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: String,
    pub parameters: HashMap<String, Value>,
    pub system_prompt: Option<String>,
    pub max_iterations: Option<u32>,
    pub stream_enabled: bool,
    pub state: Option<AgentState>,
}

impl Request {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            thread_id: None,
            user_id: None,
            session_id: uuid::Uuid::new_v4().to_string(),
            parameters: HashMap::new(),
            system_prompt: None,
            max_iterations: None,
            stream_enabled: false,
            state: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.stream_enabled = enabled;
        self
    }

    /// Continue from an existing snapshot instead of a fresh or checkpointed state.
    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = Some(state);
        self
    }
}
