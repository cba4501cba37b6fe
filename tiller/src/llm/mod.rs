//! Chat model abstraction for the executor's think step.
//!
//! The executor depends on a callable that turns the conversation into assistant
//! text plus optional tool calls; this module defines the [`ChatModel`] trait, the
//! per-call [`ChatOptions`], the streaming callback contract, and two
//! implementations: [`ChatOpenAI`] (OpenAI-compatible API) and [`MockChatModel`]
//! (scripted turns for offline runs and tests).
//!
//! # Streaming
//!
//! `chat_stream` pushes events to a [`ChatStreamCallback`]: `on_start` once,
//! `on_token` per content delta, `on_tool_call` once per tool call as soon as its
//! accumulated arguments parse as JSON, then exactly one terminal event:
//! `on_completion` or `on_error`. Callbacks run on the task parsing the server
//! stream and must not block it.
//!
//! The default `chat_stream` degrades to a blocking `chat` and emits the full
//! content as one token, so models without a streaming transport still satisfy the
//! contract.

mod accumulate;
mod mock;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::message::Message;
use crate::state::ToolCall;
use crate::tools::ToolSpec;

pub use accumulate::ToolCallAccumulator;
pub use mock::{MockChatModel, MockTurn};
pub use openai::ChatOpenAI;

/// Token usage for one model call (prompt + completion).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Componentwise sum; used by the executor to aggregate usage across iterations.
    pub fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

/// Per-call options for a chat completion.
#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
    /// Out-of-band system prompt; used only when the message list carries no
    /// system message of its own.
    pub system_prompt: Option<String>,
    /// Declared tools. Non-empty means the model may answer with tool calls.
    pub tools: Vec<ToolSpec>,
}

impl ChatOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// Result of one model call: assistant text, tool calls, optional usage.
///
/// **Interaction**: Returned by [`ChatModel::chat`]; the executor turns it into an
/// assistant [`Message`] and queues the tool calls.
#[derive(Clone, Debug, Default)]
pub struct ChatCompletion {
    /// Assistant text (may be empty when the model only calls tools).
    pub content: String,
    /// Tool calls from this turn, in the model's order; empty means terminal.
    pub tool_calls: Vec<ToolCall>,
    /// Provider-reported reasoning text, when available.
    pub reasoning: Option<String>,
    /// Token usage for this call, when the provider reports it.
    pub usage: Option<TokenUsage>,
}

impl ChatCompletion {
    /// Builds the conversation record for this completion.
    pub fn to_message(&self) -> Message {
        let mut message =
            Message::assistant_with_tool_calls(self.content.as_str(), self.tool_calls.clone());
        if let Message::Assistant(ref mut m) = message {
            m.reasoning = self.reasoning.clone();
            m.usage_tokens = self.usage.map(|u| u.total_tokens);
        }
        message
    }
}

/// Receives streaming events from [`ChatModel::chat_stream`].
///
/// All methods default to no-ops so implementations can pick the events they care
/// about. Callbacks fire on the stream-parsing task; implementations must be cheap
/// and thread-safe.
pub trait ChatStreamCallback: Send + Sync {
    /// The stream opened.
    fn on_start(&self) {}

    /// One incremental content delta.
    fn on_token(&self, _token: &str) {}

    /// A tool call's accumulated arguments became valid JSON. Fires exactly once
    /// per call id; `content_so_far` is the assistant text accumulated so far.
    fn on_tool_call(&self, _content_so_far: &str, _call: &ToolCall) {}

    /// Terminal: the server closed the stream and the completion is final.
    fn on_completion(&self, _completion: &ChatCompletion) {}

    /// Terminal: transport or parse failure.
    fn on_error(&self, _error: &AgentError) {}
}

/// No-op callback for callers that only want the returned completion.
pub struct NoopStreamCallback;

impl ChatStreamCallback for NoopStreamCallback {}

/// Chat model: given messages and options, returns assistant text and optional
/// tool calls.
///
/// Implementations: [`MockChatModel`] (scripted), [`ChatOpenAI`] (OpenAI-compatible
/// chat completions API).
///
/// **Interaction**: Used by the ReAct executor once per iteration, and by
/// summarization middleware and the supervisor handoff strategy for auxiliary calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Blocking completion for one turn.
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatCompletion, AgentError>;

    /// Streaming completion. Pushes events to `callback` (exactly one terminal
    /// event) and returns the final completion.
    ///
    /// Default implementation calls `chat` and emits the full content as a single
    /// token before `on_completion`.
    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        callback: Arc<dyn ChatStreamCallback>,
    ) -> Result<ChatCompletion, AgentError> {
        callback.on_start();
        match self.chat(messages, options).await {
            Ok(completion) => {
                if !completion.content.is_empty() {
                    callback.on_token(&completion.content);
                }
                for call in &completion.tool_calls {
                    callback.on_tool_call(&completion.content, call);
                }
                callback.on_completion(&completion);
                Ok(completion)
            }
            Err(e) => {
                callback.on_error(&e);
                Err(e)
            }
        }
    }
}
