//! Example: real chat completions endpoint.
//!
//! Reads `TILLER_API_KEY` / `TILLER_BASE_URL` / `TILLER_MODEL` from the
//! environment (with `.env` and `~/.config/tiller/config.toml` fallbacks) and
//! streams one answer token by token.
//!
//! Run: `TILLER_API_KEY=sk-... cargo run -p tiller-examples --example openai_chat -- "Say hi"`

use std::env;
use std::io::Write;
use std::sync::Arc;

use tiller::{Agent, ChatOpenAI, Request, StreamEvent};

#[tokio::main]
async fn main() {
    let input = env::args().nth(1).unwrap_or_else(|| "Say hi".to_string());

    let model = match ChatOpenAI::from_env() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("model configuration error: {e}");
            std::process::exit(1);
        }
    };

    let agent = Agent::builder()
        .model(Arc::new(model))
        .system_prompt("You are a concise assistant.")
        .build()
        .expect("agent builds");

    let response = agent
        .stream(Request::new(input), |event| {
            if let StreamEvent::Token { content } = event {
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
        })
        .await
        .expect("stream");

    println!();
    if let Some(usage) = response.usage {
        eprintln!(
            "[{} prompt + {} completion tokens]",
            usage.prompt_tokens, usage.completion_tokens
        );
    }
}
