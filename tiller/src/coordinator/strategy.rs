//! Handoff strategies: response-marker (default) and model-supervised routing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::Response;
use crate::coordinator::marker::parse_handoff;
use crate::coordinator::AgentNode;
use crate::error::AgentError;
use crate::llm::{ChatModel, ChatOptions};
use crate::message::Message;

/// What the coordinator does after a sub-agent run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffDecision {
    /// Return the current response to the caller.
    Finish,
    /// Transfer control to `target` with `input` as its new user turn.
    Route { target: String, input: String },
}

/// Decides routing after each sub-agent run.
#[async_trait]
pub trait HandoffStrategy: Send + Sync {
    async fn next(
        &self,
        current: &str,
        response: &Response,
        nodes: &HashMap<String, AgentNode>,
    ) -> Result<HandoffDecision, AgentError>;
}

/// Default strategy: scan the sub-agent's output for an explicit handoff marker
/// (`HANDOFF:target:message` or `[HANDOFF target] message`); no marker means done.
#[derive(Default)]
pub struct ResponseMarkerStrategy;

impl ResponseMarkerStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HandoffStrategy for ResponseMarkerStrategy {
    async fn next(
        &self,
        _current: &str,
        response: &Response,
        _nodes: &HashMap<String, AgentNode>,
    ) -> Result<HandoffDecision, AgentError> {
        match parse_handoff(&response.output) {
            Some((directive, _stripped)) => Ok(HandoffDecision::Route {
                target: directive.target,
                input: directive.message,
            }),
            None => Ok(HandoffDecision::Finish),
        }
    }
}

/// Token the supervisor model uses to end the conversation.
const FINAL_TOKEN: &str = "FINAL";

/// Parses a supervisor reply. Structured JSON `{"next": "<node>"}` is tried
/// first; the fallback scans the raw text for `FINAL` or a known node name, so
/// models that ignore the format still terminate.
pub(crate) fn parse_supervisor_reply(
    text: &str,
    nodes: &HashMap<String, AgentNode>,
) -> Option<HandoffDecision> {
    let trimmed = text.trim();
    let json_start = trimmed.find('{');
    if let Some(start) = json_start {
        if let Some(end) = trimmed.rfind('}') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if let Some(next) = value.get("next").and_then(|v| v.as_str()) {
                    if next.eq_ignore_ascii_case(FINAL_TOKEN) {
                        return Some(HandoffDecision::Finish);
                    }
                    if nodes.contains_key(next) {
                        return Some(HandoffDecision::Route {
                            target: next.to_string(),
                            input: String::new(),
                        });
                    }
                }
            }
        }
    }

    // Plain-text fallback.
    for word in trimmed.split(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-') {
        if word.eq_ignore_ascii_case(FINAL_TOKEN) {
            return Some(HandoffDecision::Finish);
        }
        if nodes.contains_key(word) {
            return Some(HandoffDecision::Route {
                target: word.to_string(),
                input: String::new(),
            });
        }
    }
    None
}

/// Routing by an auxiliary model: after each run the supervisor sees a state
/// summary and the node directory, and answers with the next node or `FINAL`.
pub struct SupervisorStrategy {
    model: Arc<dyn ChatModel>,
}

impl SupervisorStrategy {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn build_prompt(
        current: &str,
        response: &Response,
        nodes: &HashMap<String, AgentNode>,
    ) -> String {
        let mut directory: Vec<&AgentNode> = nodes.values().collect();
        directory.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));
        let mut prompt = String::from(
            "You are routing work between agents. Reply with JSON {\"next\": \"<agent>\"} \
             to transfer, or {\"next\": \"FINAL\"} to finish.\n\nAgents:\n",
        );
        for node in directory {
            let suffix = if node.can_return_result {
                ""
            } else {
                " (must hand off; cannot answer the user directly)"
            };
            prompt.push_str(&format!("- {}: {}{suffix}\n", node.name, node.description));
        }
        prompt.push_str(&format!(
            "\nAgent '{current}' just answered ({} messages in the conversation):\n{}\n",
            response.messages.len(),
            response.output
        ));
        prompt
    }
}

#[async_trait]
impl HandoffStrategy for SupervisorStrategy {
    async fn next(
        &self,
        current: &str,
        response: &Response,
        nodes: &HashMap<String, AgentNode>,
    ) -> Result<HandoffDecision, AgentError> {
        let prompt = Self::build_prompt(current, response, nodes);
        let completion = self
            .model
            .chat(&[Message::human(prompt)], &ChatOptions::default())
            .await?;
        let decision = parse_supervisor_reply(&completion.content, nodes);
        Ok(match decision {
            Some(HandoffDecision::Route { target, .. }) => HandoffDecision::Route {
                target,
                // The routed node continues from the full forwarded state; its new
                // input is the previous node's answer.
                input: response.output.clone(),
            },
            Some(HandoffDecision::Finish) => HandoffDecision::Finish,
            None => {
                tracing::warn!(reply = %completion.content, "unparseable supervisor reply; finishing");
                HandoffDecision::Finish
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::llm::MockChatModel;

    fn nodes(names: &[&str]) -> HashMap<String, AgentNode> {
        names
            .iter()
            .map(|n| {
                let agent = Agent::builder()
                    .model(MockChatModel::replies(&["x"]))
                    .build()
                    .unwrap();
                (n.to_string(), AgentNode::new(*n, agent))
            })
            .collect()
    }

    /// **Scenario**: JSON replies route to the named node or finish on FINAL.
    #[test]
    fn supervisor_reply_json_paths() {
        let nodes = nodes(&["coder", "researcher"]);
        assert_eq!(
            parse_supervisor_reply(r#"{"next": "coder"}"#, &nodes),
            Some(HandoffDecision::Route {
                target: "coder".into(),
                input: String::new()
            })
        );
        assert_eq!(
            parse_supervisor_reply(r#"{"next": "FINAL"}"#, &nodes),
            Some(HandoffDecision::Finish)
        );
        assert_eq!(
            parse_supervisor_reply(r#"sure: {"next": "researcher"} ok?"#, &nodes),
            Some(HandoffDecision::Route {
                target: "researcher".into(),
                input: String::new()
            })
        );
    }

    /// **Scenario**: Plain-text replies fall back to scanning for FINAL or a node name.
    #[test]
    fn supervisor_reply_text_fallback() {
        let nodes = nodes(&["coder"]);
        assert_eq!(
            parse_supervisor_reply("I think coder should take over", &nodes),
            Some(HandoffDecision::Route {
                target: "coder".into(),
                input: String::new()
            })
        );
        assert_eq!(
            parse_supervisor_reply("we are FINAL here", &nodes),
            Some(HandoffDecision::Finish)
        );
        assert_eq!(parse_supervisor_reply("no idea", &nodes), None);
    }

    /// **Scenario**: A JSON reply naming an unknown node falls through to the text
    /// scan rather than routing blindly.
    #[test]
    fn supervisor_reply_unknown_json_node() {
        let nodes = nodes(&["coder"]);
        assert_eq!(parse_supervisor_reply(r#"{"next": "ghost"}"#, &nodes), None);
    }
}
