//! Example: thread persistence with a checkpointer.
//!
//! Two invocations share a thread; the second restores the first's checkpoint, so
//! the model sees the whole conversation. The checkpoint listing shows the
//! newest-first thread timeline.
//!
//! Run: `cargo run -p tiller-examples --example memory_checkpoint`

use std::sync::Arc;

use tiller::{Agent, Checkpointer, MemorySaver, MockChatModel, Request};

#[tokio::main]
async fn main() {
    let checkpointer: Arc<MemorySaver> = Arc::new(MemorySaver::new());

    let agent = Agent::builder()
        .model(MockChatModel::replies(&[
            "Nice to meet you, Ada.",
            "Your name is Ada.",
        ]))
        .checkpointer(checkpointer.clone())
        .thread_id("session-1")
        .system_prompt("You remember the conversation.")
        .build()
        .expect("agent builds");

    let first = agent
        .invoke(Request::new("Hi, my name is Ada."))
        .await
        .expect("first invoke");
    println!("turn 1: {}", first.output);

    let second = agent
        .invoke(Request::new("What is my name?"))
        .await
        .expect("second invoke");
    println!("turn 2: {}", second.output);
    println!("messages in state: {}", second.messages.len());

    let checkpoints = checkpointer.list("session-1").await.expect("list");
    println!("checkpoints (newest first):");
    for info in checkpoints {
        println!(
            "  {}: {} messages, parent: {:?}",
            info.checkpoint_id, info.message_count, info.parent_checkpoint_id
        );
    }
}
