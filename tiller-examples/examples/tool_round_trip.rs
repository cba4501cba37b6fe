//! Example: one tool round trip through the reason-act loop.
//!
//! The scripted model first requests the `add` tool, observes its result, then
//! answers. With a real model the flow is identical; swap in `ChatOpenAI`.
//!
//! Run: `cargo run -p tiller-examples --example tool_round_trip`

use std::sync::Arc;

use async_trait::async_trait;
use tiller::tools::{Tool, ToolCallContent, ToolError, ToolSpec};
use tiller::{Agent, MockChatModel, MockTurn, Request};

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
            .ok_or_else(|| ToolError::InvalidArguments("a must be an integer".into()))?;
        let b = args["b"]
            .as_i64()
            .ok_or_else(|| ToolError::InvalidArguments("b must be an integer".into()))?;
        Ok(ToolCallContent {
            text: (a + b).to_string(),
        })
    }
}

#[tokio::main]
async fn main() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("add", r#"{"a":125,"b":287}"#),
            MockTurn::text("125 + 287 = 412"),
        ]))
        .tool(Arc::new(AddTool))
        .build()
        .expect("agent builds");

    let response = agent.invoke(Request::new("125 + 287 ?")).await.expect("invoke");

    println!("output: {}", response.output);
    println!("tool calls made: {}", response.tool_calls.len());
    for message in &response.messages {
        println!("  [{}] {}", message.role(), message.content());
    }
}
