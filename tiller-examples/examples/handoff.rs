//! Example: multi-agent handoff via response markers.
//!
//! A researcher node hands its result to a coder node with
//! `HANDOFF:coder:<message>`; the coordinator forwards the full conversation
//! state so the coder sees the whole transcript.
//!
//! Run: `cargo run -p tiller-examples --example handoff`

use tiller::{Agent, Coordinator, MockChatModel, Request};

#[tokio::main]
async fn main() {
    let researcher = Agent::builder()
        .model(MockChatModel::replies(&[
            "Findings: a fibonacci helper is needed. HANDOFF:coder:write fib(n) in python",
        ]))
        .name("researcher")
        .build()
        .expect("researcher builds");

    let coder = Agent::builder()
        .model(MockChatModel::replies(&[
            "def fib(n):\n    return n if n < 2 else fib(n - 1) + fib(n - 2)",
        ]))
        .name("coder")
        .build()
        .expect("coder builds");

    let coordinator = Coordinator::builder()
        .node("researcher", researcher)
        .node("coder", coder)
        .entry_point("researcher")
        .max_handoffs(3)
        .build()
        .expect("coordinator builds");

    let response = coordinator
        .invoke(Request::new("I need a fibonacci function"))
        .await
        .expect("invoke");

    println!("final output:\n{}", response.output);
    println!("\ntranscript:");
    for message in &response.messages {
        println!("  [{}] {}", message.role(), message.content());
    }
}
