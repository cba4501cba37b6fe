//! Agent-level configuration.

use std::time::Duration;

/// Default bound on model calls per invocation.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Default wall-clock bound per invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration shared by every invocation of one agent. Per-request values
/// (`Request::system_prompt`, `Request::max_iterations`) override these defaults.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Display name, used in logs and by the coordinator.
    pub name: String,
    pub description: String,
    pub system_prompt: Option<String>,
    pub max_iterations: u32,
    pub timeout: Duration,
    /// Default for `Request::stream_enabled` when hosts call `invoke`.
    pub stream: bool,
    /// Default conversation thread; `Request::thread_id` overrides per call.
    pub thread_id: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            description: String::new(),
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: DEFAULT_TIMEOUT,
            stream: false,
            thread_id: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop_sequences: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(!config.stream);
        assert!(config.thread_id.is_none());
    }
}
