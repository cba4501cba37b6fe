//! Example: human-in-the-loop approval with checkpointed resume.
//!
//! A whitelisted tool pauses the run; the checkpoint id from the interrupt is
//! then used to resume with a rejection, which the model observes and adapts to.
//!
//! Run: `cargo run -p tiller-examples --example approval_resume`

use std::sync::Arc;

use async_trait::async_trait;
use tiller::tools::{Tool, ToolCallContent, ToolError, ToolSpec};
use tiller::{
    Agent, ApprovalMiddleware, ApprovalPolicy, MemorySaver, MockChatModel, MockTurn, Request,
    ResumeCommand,
};

struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete_file".to_string(),
            description: Some("Deletes a file by path".to_string()),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: serde_json::Value) -> Result<ToolCallContent, ToolError> {
        // A real implementation would touch the filesystem; the example never
        // reaches this because the call is rejected.
        Ok(ToolCallContent {
            text: format!("deleted {}", args["path"]),
        })
    }
}

#[tokio::main]
async fn main() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("delete_file", r#"{"path":"/etc/passwd"}"#),
            MockTurn::text("I cannot delete that file."),
        ]))
        .tool(Arc::new(DeleteFileTool))
        .checkpointer(Arc::new(MemorySaver::new()))
        .middleware(Arc::new(ApprovalMiddleware::new(ApprovalPolicy::whitelist([
            "delete_file",
        ]))))
        .thread_id("approval-demo")
        .build()
        .expect("agent builds");

    let paused = agent
        .invoke(Request::new("please delete /etc/passwd"))
        .await
        .expect("invoke");

    let interrupt = paused.interrupt.as_ref().expect("run paused for approval");
    println!("paused: {}", interrupt.description);
    println!(
        "pending call: {}({})",
        interrupt.tool_call.name, interrupt.tool_call.arguments
    );

    let checkpoint_id = paused.checkpoint_id.expect("checkpoint saved at interrupt");
    let resumed = agent
        .resume(
            &checkpoint_id,
            ResumeCommand::Reject {
                reason: "policy forbids system paths".to_string(),
            },
        )
        .await
        .expect("resume");

    println!("final answer: {}", resumed.output);
}
