//! Integration tests for the reason-act loop: single-turn answers, tool round
//! trips, the iteration bound, and message ordering.


use std::sync::Arc;

use async_trait::async_trait;
use tiller::tools::{Tool, ToolCallContent, ToolError, ToolSpec};
use tiller::{Agent, Message, MockChatModel, MockTurn, Request};

struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add".to_string(),
            description: Some("Adds two integers".to_string()),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }),
        }
    }

    async fn call(&self, args: serde_json::Value) -> Result<ToolCallContent, ToolError> {
        let a = args["a"]
            .as_i64()
            .ok_or_else(|| ToolError::InvalidArguments("a".into()))?;
        let b = args["b"]
            .as_i64()
            .ok_or_else(|| ToolError::InvalidArguments("b".into()))?;
        Ok(ToolCallContent {
            text: (a + b).to_string(),
        })
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "echo".to_string(),
            description: None,
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    async fn call(&self, args: serde_json::Value) -> Result<ToolCallContent, ToolError> {
        Ok(ToolCallContent {
            text: args.to_string(),
        })
    }
}

/// **Scenario**: Single-turn Q&A without tools: system, human, assistant; one
/// iteration; the stub's text is the output.
#[tokio::test]
async fn single_turn_without_tools() {
    let agent = Agent::builder()
        .model(MockChatModel::replies(&["4"]))
        .system_prompt("You are a concise assistant.")
        .build()
        .unwrap();

    let response = agent.invoke(Request::new("What is 2+2?")).await.unwrap();

    assert_eq!(response.output, "4");
    assert_eq!(response.iterations, 1);
    assert!(response.is_success());
    assert_eq!(response.messages.len(), 3);
    assert!(matches!(&response.messages[0], Message::System(m) if m.content == "You are a concise assistant."));
    assert!(matches!(&response.messages[1], Message::Human(m) if m.content == "What is 2+2?"));
    assert!(matches!(&response.messages[2], Message::Assistant(m) if m.content == "4"));
    assert!(response.state.validate().is_ok());
}

/// **Scenario**: Tool round trip: the model requests `add`, observes its result,
/// and answers; two iterations, one recorded tool call.
#[tokio::test]
async fn tool_call_round_trip() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("add", r#"{"a":125,"b":287}"#),
            MockTurn::text("412"),
        ]))
        .tool(Arc::new(AddTool))
        .build()
        .unwrap();

    let response = agent.invoke(Request::new("125 + 287 ?")).await.unwrap();

    assert_eq!(response.output, "412");
    assert_eq!(response.iterations, 2);
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "add");

    let kinds: Vec<&str> = response.messages.iter().map(Message::role).collect();
    assert_eq!(kinds, vec!["human", "assistant", "tool", "assistant"]);
    let tool_message = response.messages[2].as_tool().unwrap();
    assert_eq!(tool_message.content, "412");
    assert!(!tool_message.is_error);
    assert_eq!(tool_message.tool_call_id, response.tool_calls[0].id);
    assert!(response.state.validate().is_ok());
}

/// **Scenario**: An unknown tool comes back to the model as an error tool message
/// it can adapt to, not as a framework error.
#[tokio::test]
async fn unknown_tool_is_recovered_locally() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("frobnicate", "{}"),
            MockTurn::text("that tool does not exist"),
        ]))
        .build()
        .unwrap();

    let response = agent.invoke(Request::new("use the tool")).await.unwrap();

    assert_eq!(response.output, "that tool does not exist");
    let tool_message = response
        .messages
        .iter()
        .find_map(Message::as_tool)
        .unwrap();
    assert!(tool_message.is_error);
    assert!(tool_message.content.contains("tool not found"));
}

/// **Scenario**: Max-iterations guard: the model always asks for `echo`; with a
/// bound of 3 the loop makes exactly 3 model calls, and the third assistant's
/// calls are never executed.
#[tokio::test]
async fn max_iterations_guard() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![MockTurn::tool_call(
            "echo",
            r#"{"n":1}"#,
        )]))
        .tool(Arc::new(EchoTool))
        .max_iterations(3)
        .build()
        .unwrap();

    let response = agent.invoke(Request::new("loop forever")).await.unwrap();

    assert_eq!(response.iterations, 3);
    let assistants = response
        .messages
        .iter()
        .filter(|m| matches!(m, Message::Assistant(_)))
        .count();
    let tools = response
        .messages
        .iter()
        .filter(|m| matches!(m, Message::Tool(_)))
        .count();
    assert_eq!(assistants, 3);
    assert_eq!(tools, 2, "the third assistant's tool calls stay unprocessed");
    // Output is the last assistant's content, empty for a pure tool-call turn.
    assert_eq!(response.output, "");
    assert!(response.state.validate().is_ok());
}

/// **Scenario**: The per-request bound overrides the agent default.
#[tokio::test]
async fn request_max_iterations_overrides_config() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![MockTurn::tool_call(
            "echo",
            "{}",
        )]))
        .tool(Arc::new(EchoTool))
        .max_iterations(10)
        .build()
        .unwrap();

    let response = agent
        .invoke(Request::new("loop").with_max_iterations(2))
        .await
        .unwrap();
    assert_eq!(response.iterations, 2);
}

/// **Scenario**: batch preserves order and runs requests sequentially against the
/// shared script.
#[tokio::test]
async fn batch_preserves_order() {
    let agent = Agent::builder()
        .model(MockChatModel::replies(&["first", "second", "third"]))
        .build()
        .unwrap();

    let responses = agent
        .batch(vec![
            Request::new("1"),
            Request::new("2"),
            Request::new("3"),
        ])
        .await
        .unwrap();

    let outputs: Vec<&str> = responses.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(outputs, vec!["first", "second", "third"]);
}

/// **Scenario**: A request carrying prior state continues the conversation; the
/// model sees the old messages plus the new human turn.
#[tokio::test]
async fn request_state_continues_conversation() {
    let model = MockChatModel::replies(&["answer one", "answer two"]);
    let agent = Agent::builder().model(model.clone()).build().unwrap();

    let first = agent.invoke(Request::new("question one")).await.unwrap();
    let second = agent
        .invoke(Request::new("question two").with_state(first.state.clone()))
        .await
        .unwrap();

    assert_eq!(second.output, "answer two");
    let observed = model.observed_messages();
    assert_eq!(observed[1].len(), 3, "human + assistant + new human");
    assert_eq!(second.messages.len(), 4);
    assert!(second.state.validate().is_ok());
}

/// **Scenario**: The assistant's usage flows into the response aggregate.
#[tokio::test]
async fn usage_aggregates_across_iterations() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("echo", "{}").with_usage(100, 10),
            MockTurn::text("done").with_usage(150, 5),
        ]))
        .tool(Arc::new(EchoTool))
        .build()
        .unwrap();

    let response = agent.invoke(Request::new("go")).await.unwrap();
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 250);
    assert_eq!(usage.completion_tokens, 15);
    assert_eq!(usage.total_tokens, 265);
}
