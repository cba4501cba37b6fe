//! Multi-agent coordinator: routes one request across named sub-agents.
//!
//! A [`Coordinator`] holds named [`AgentNode`]s, an entry point, and a
//! [`HandoffStrategy`]. After each sub-agent run the strategy inspects the
//! response and either finishes or transfers control; every hop forwards the full
//! accumulated conversation state, not just the last message. Transfers are
//! bounded by `max_handoffs` (default 5); on exceeding it the last response is
//! returned with the reason in its `error` field.
//!
//! # Example
//!
//! ```rust,no_run
//! use tiller::{Agent, Coordinator, MockChatModel, Request};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let researcher = Agent::builder()
//!     .model(MockChatModel::replies(&["done. HANDOFF:coder:now write it"]))
//!     .build()?;
//! let coder = Agent::builder()
//!     .model(MockChatModel::replies(&["def f(): pass"]))
//!     .build()?;
//!
//! let coordinator = Coordinator::builder()
//!     .node("researcher", researcher)
//!     .node("coder", coder)
//!     .entry_point("researcher")
//!     .build()?;
//! let response = coordinator.invoke(Request::new("build me a tool")).await?;
//! assert_eq!(response.output, "def f(): pass");
//! # Ok(())
//! # }
//! ```

mod marker;
mod strategy;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::{Agent, Request, Response};
use crate::error::AgentError;
use crate::stream::StreamEvent;

pub use marker::{parse_handoff, HandoffDirective};
pub use strategy::{HandoffDecision, HandoffStrategy, ResponseMarkerStrategy, SupervisorStrategy};

/// Default bound on control transfers in one coordinator invocation.
pub const DEFAULT_MAX_HANDOFFS: u32 = 5;

/// One sub-agent plus its routing metadata.
pub struct AgentNode {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Smaller sorts earlier in the supervisor's directory.
    pub priority: i32,
    /// Whether this node's answer may be returned to the user directly.
    pub can_return_result: bool,
    pub agent: Agent,
}

impl AgentNode {
    pub fn new(name: impl Into<String>, agent: Agent) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            priority: 100,
            can_return_result: true,
            agent,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_can_return_result(mut self, can_return_result: bool) -> Self {
        self.can_return_result = can_return_result;
        self
    }
}

/// Error building a coordinator.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorBuildError {
    #[error("coordinator requires at least one node")]
    NoNodes,
    #[error("entry point '{0}' is not a registered node")]
    UnknownEntryPoint(String),
}

/// Fluent construction of a [`Coordinator`].
pub struct CoordinatorBuilder {
    nodes: HashMap<String, AgentNode>,
    entry_point: Option<String>,
    max_handoffs: u32,
    strategy: Arc<dyn HandoffStrategy>,
    events: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            entry_point: None,
            max_handoffs: DEFAULT_MAX_HANDOFFS,
            strategy: Arc::new(ResponseMarkerStrategy::new()),
            events: None,
        }
    }

    /// Registers an agent under a name with default metadata.
    pub fn node(mut self, name: impl Into<String>, agent: Agent) -> Self {
        let name = name.into();
        self.nodes.insert(name.clone(), AgentNode::new(name, agent));
        self
    }

    /// Registers a fully configured node (description, tags, priority).
    pub fn agent_node(mut self, node: AgentNode) -> Self {
        self.nodes.insert(node.name.clone(), node);
        self
    }

    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    pub fn max_handoffs(mut self, max_handoffs: u32) -> Self {
        self.max_handoffs = max_handoffs;
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn HandoffStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Attaches a sink that receives a [`StreamEvent::Handoff`] per transfer.
    pub fn event_sink(mut self, sink: mpsc::UnboundedSender<StreamEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn build(self) -> Result<Coordinator, CoordinatorBuildError> {
        if self.nodes.is_empty() {
            return Err(CoordinatorBuildError::NoNodes);
        }
        let entry_point = self
            .entry_point
            .ok_or_else(|| CoordinatorBuildError::UnknownEntryPoint(String::new()))?;
        if !self.nodes.contains_key(&entry_point) {
            return Err(CoordinatorBuildError::UnknownEntryPoint(entry_point));
        }
        Ok(Coordinator {
            nodes: self.nodes,
            entry_point,
            max_handoffs: self.max_handoffs,
            strategy: self.strategy,
            events: self.events,
        })
    }
}

/// Routes a request across named sub-agents via handoff or supervisor strategy.
pub struct Coordinator {
    nodes: HashMap<String, AgentNode>,
    entry_point: String,
    max_handoffs: u32,
    strategy: Arc<dyn HandoffStrategy>,
    events: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    /// Runs the request through the entry node, then follows the strategy's
    /// routing until it finishes or the handoff bound trips. Each hop hands the
    /// next node the full accumulated state with the embedded message as its new
    /// input; the marker text stays in the transcript.
    pub async fn invoke(&self, request: Request) -> Result<Response, AgentError> {
        let mut current = self.entry_point.clone();
        let mut input = request.input.clone();
        let mut carry_state = request.state.clone();
        let mut handoffs: u32 = 0;
        let mut runs: u32 = 0;

        loop {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| AgentError::InvalidRequest(format!("unknown node: {current}")))?;

            let mut sub_request = Request::new(input.clone())
                .with_session_id(request.session_id.clone());
            sub_request.thread_id = request.thread_id.clone();
            sub_request.user_id = request.user_id.clone();
            sub_request.parameters = request.parameters.clone();
            sub_request.max_iterations = request.max_iterations;
            sub_request.state = carry_state.take();

            tracing::info!(node = %current, runs, handoffs, "coordinator running node");
            let response = node.agent.invoke(sub_request).await?;
            runs += 1;

            match self
                .strategy
                .next(&current, &response, &self.nodes)
                .await?
            {
                HandoffDecision::Finish => {
                    tracing::info!(node = %current, runs, handoffs, "coordinator finished");
                    return Ok(response);
                }
                HandoffDecision::Route { target, input: next_input } => {
                    if !self.nodes.contains_key(&target) {
                        tracing::warn!(
                            from = %current,
                            target = %target,
                            "handoff to unknown node; returning current response"
                        );
                        return Ok(response);
                    }
                    if handoffs >= self.max_handoffs {
                        let reason = format!(
                            "handoff limit reached ({} transfers); control stays with '{current}'",
                            self.max_handoffs
                        );
                        tracing::warn!(%reason, "coordinator halting");
                        let mut capped = response;
                        capped.error = Some(reason);
                        return Ok(capped);
                    }
                    if let Some(ref events) = self.events {
                        let _ = events.send(StreamEvent::Handoff {
                            from: current.clone(),
                            to: target.clone(),
                        });
                    }
                    tracing::info!(from = %current, to = %target, "handoff");
                    handoffs += 1;
                    carry_state = Some(response.state.clone());
                    input = next_input;
                    current = target;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;

    fn echo_agent(reply: &str) -> Agent {
        Agent::builder()
            .model(MockChatModel::replies(&[reply]))
            .build()
            .unwrap()
    }

    /// **Scenario**: Building without nodes or with a dangling entry point fails.
    #[test]
    fn build_validates_entry_point() {
        assert!(matches!(
            Coordinator::builder().build(),
            Err(CoordinatorBuildError::NoNodes)
        ));
        assert!(matches!(
            Coordinator::builder()
                .node("a", echo_agent("x"))
                .entry_point("missing")
                .build(),
            Err(CoordinatorBuildError::UnknownEntryPoint(name)) if name == "missing"
        ));
    }

    /// **Scenario**: A handoff to a name outside the node set returns the current
    /// response instead of erroring.
    #[tokio::test]
    async fn unknown_handoff_target_finishes() {
        let coordinator = Coordinator::builder()
            .node("entry", echo_agent("HANDOFF:ghost:boo"))
            .entry_point("entry")
            .build()
            .unwrap();
        let response = coordinator.invoke(Request::new("go")).await.unwrap();
        assert!(response.is_success());
        assert!(response.output.contains("HANDOFF:ghost"));
    }
}
