//! Example: single-turn agent with a scripted model.
//!
//! Builds an agent with a system prompt and a mock model, runs one request, and
//! prints the answer plus the resulting conversation.
//!
//! Run: `cargo run -p tiller-examples --example quickstart -- "What is 2+2?"`

use std::env;

use tiller::{Agent, MockChatModel, Request};

#[tokio::main]
async fn main() {
    let input = env::args()
        .nth(1)
        .unwrap_or_else(|| "What is 2+2?".to_string());

    let agent = Agent::builder()
        .model(MockChatModel::replies(&["4"]))
        .system_prompt("You are a concise assistant.")
        .build()
        .expect("agent with a model builds");

    let response = agent.invoke(Request::new(input)).await.expect("invoke");

    println!("output: {}", response.output);
    println!(
        "iterations: {}, duration: {}ms",
        response.iterations, response.duration_ms
    );
    for message in &response.messages {
        println!("  [{}] {}", message.role(), message.content());
    }
}
