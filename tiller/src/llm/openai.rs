//! OpenAI-compatible chat completions client implementing `ChatModel` (ChatOpenAI).
//!
//! Works against any endpoint speaking the chat completions wire contract
//! (`/v1/chat/completions`, SSE streaming with `data: {json}` lines). Tool-role
//! messages carry `tool_call_id` matching a prior assistant tool call, and declared
//! tools are sent with `tool_choice: auto`.
//!
//! # Streaming
//!
//! `chat_stream` reads `choices[0].delta.content` for incremental text and
//! `choices[0].delta.tool_calls` for tool-call fragments. Fragments are folded
//! through a fresh [`ToolCallAccumulator`] per stream, never kept on the client,
//! so concurrent streams on one handle cannot bleed state into each other. `usage`
//! appears on the final chunk when the server reports it at all.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::error::AgentError;
use crate::llm::accumulate::ToolCallAccumulator;
use crate::llm::{ChatCompletion, ChatModel, ChatOptions, ChatStreamCallback, TokenUsage};
use crate::message::Message;
use crate::state::ToolCall;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
        ToolChoiceOptions,
    },
    Client,
};

/// Environment variables consumed by [`ChatOpenAI::from_env`]; the `config` crate's
/// `load_and_apply` fills them from `.env` / `config.toml` when unset.
const ENV_API_KEY: &str = "TILLER_API_KEY";
const ENV_BASE_URL: &str = "TILLER_BASE_URL";
const ENV_MODEL: &str = "TILLER_MODEL";

/// OpenAI-compatible chat completions client implementing [`ChatModel`].
///
/// **Interaction**: Injected into [`AgentBuilder::model`](crate::agent::AgentBuilder::model);
/// per-call parameters (temperature, tools, stop sequences) arrive through
/// [`ChatOptions`], so one handle serves many agents.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatOpenAI {
    /// Build client with default config (API key from `OPENAI_API_KEY` env, as the
    /// underlying SDK does).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    /// Build client from `TILLER_API_KEY` / `TILLER_BASE_URL` / `TILLER_MODEL`,
    /// after applying `.env` / user `config.toml` via the config crate.
    pub fn from_env() -> Result<Self, AgentError> {
        let _ = env_config::load_and_apply("tiller", None);
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| AgentError::ModelAuth(format!("{ENV_API_KEY} is not set")))?;
        let model = std::env::var(ENV_MODEL).unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Ok(base) = std::env::var(ENV_BASE_URL) {
            config = config.with_api_base(base);
        }
        Ok(Self::with_config(config, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert the conversation to request messages. A leading options-level system
    /// prompt is injected only when the conversation has none of its own.
    fn messages_to_request(
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        let has_system = matches!(messages.first(), Some(Message::System(_)));
        if !has_system {
            if let Some(ref prompt) = options.system_prompt {
                out.push(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(prompt.as_str()),
                ));
            }
        }
        for message in messages {
            match message {
                Message::System(m) => out.push(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(m.content.as_str()),
                )),
                Message::Human(m) => out.push(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(m.content.as_str()),
                )),
                Message::Assistant(m) => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() {
                        args.content(m.content.as_str());
                    }
                    if !m.tool_calls.is_empty() {
                        let calls: Vec<ChatCompletionMessageToolCalls> = m
                            .tool_calls
                            .iter()
                            .map(|c| {
                                ChatCompletionMessageToolCalls::Function(
                                    ChatCompletionMessageToolCall {
                                        id: c.id.clone(),
                                        function: FunctionCall {
                                            name: c.name.clone(),
                                            arguments: c.arguments.clone(),
                                        },
                                    },
                                )
                            })
                            .collect();
                        args.tool_calls(calls);
                    }
                    let built = args.build().map_err(|e| {
                        AgentError::transport_fatal(format!("request build failed: {e}"))
                    })?;
                    out.push(ChatCompletionRequestMessage::Assistant(built));
                }
                Message::Tool(m) => {
                    let built = ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.as_str())
                        .tool_call_id(m.tool_call_id.as_str())
                        .build()
                        .map_err(|e| {
                            AgentError::transport_fatal(format!("request build failed: {e}"))
                        })?;
                    out.push(ChatCompletionRequestMessage::Tool(built));
                }
            }
        }
        Ok(out)
    }

    fn build_request(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, AgentError> {
        let request_messages = Self::messages_to_request(messages, options)?;
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(request_messages);
        if stream {
            args.stream(true);
        }
        if let Some(t) = options.temperature {
            args.temperature(t);
        }
        if let Some(p) = options.top_p {
            args.top_p(p);
        }
        if let Some(m) = options.max_tokens {
            args.max_completion_tokens(m);
        }
        if !options.stop_sequences.is_empty() {
            args.stop(options.stop_sequences.clone());
        }
        if !options.tools.is_empty() {
            let tools: Vec<ChatCompletionTools> = options
                .tools
                .iter()
                .map(|t| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: Some(t.parameters.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(tools);
            args.tool_choice(ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto));
        }
        args.build()
            .map_err(|e| AgentError::transport_fatal(format!("request build failed: {e}")))
    }

    /// Classify an SDK error into the framework's error kinds. Auth and context
    /// overflow are fatal; rate limits and server errors stay retryable.
    fn classify_error(e: OpenAIError) -> AgentError {
        match e {
            OpenAIError::ApiError(api) => {
                let kind = api.r#type.clone().unwrap_or_default();
                let text = format!("{kind}: {}", api.message);
                let lower = text.to_lowercase();
                if lower.contains("api key")
                    || lower.contains("api_key")
                    || lower.contains("authentication")
                    || lower.contains("permission")
                {
                    AgentError::ModelAuth(text)
                } else if lower.contains("context length")
                    || lower.contains("context_length")
                    || lower.contains("maximum context")
                {
                    AgentError::ContextTooLong(text)
                } else if lower.contains("rate limit")
                    || lower.contains("rate_limit")
                    || lower.contains("overloaded")
                    || lower.contains("server_error")
                    || lower.contains("timeout")
                {
                    AgentError::transport(text)
                } else {
                    AgentError::transport_fatal(text)
                }
            }
            other => AgentError::transport(other.to_string()),
        }
    }

    fn completion_from_response(
        response: async_openai::types::chat::CreateChatCompletionResponse,
    ) -> Result<ChatCompletion, AgentError> {
        let usage = response.usage.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::transport("model returned no choices"))?;
        let message = choice.message;
        let content = message.content.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(ToolCall::new(f.id, f.function.name, f.function.arguments))
                } else {
                    None
                }
            })
            .collect();
        Ok(ChatCompletion {
            content,
            tool_calls,
            reasoning: None,
            usage,
        })
    }
}

#[async_trait]
impl ChatModel for ChatOpenAI {
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatCompletion, AgentError> {
        let request = self.build_request(messages, options, false)?;
        debug!(
            model = %self.model,
            message_count = messages.len(),
            tools_count = options.tools.len(),
            "chat completions create"
        );
        if let Ok(body) = serde_json::to_string(&request) {
            trace!(request = %body, "chat completions request body");
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(Self::classify_error)?;

        Self::completion_from_response(response)
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        callback: Arc<dyn ChatStreamCallback>,
    ) -> Result<ChatCompletion, AgentError> {
        let request = self.build_request(messages, options, true)?;
        debug!(
            model = %self.model,
            message_count = messages.len(),
            tools_count = options.tools.len(),
            "chat completions create_stream"
        );

        let mut stream = match self.client.chat().create_stream(request).await {
            Ok(s) => s,
            Err(e) => {
                let error = Self::classify_error(e);
                callback.on_error(&error);
                return Err(error);
            }
        };

        callback.on_start();

        // Fragment table and fired-id set live here, per stream.
        let mut accumulator = ToolCallAccumulator::new();
        let mut content = String::new();
        let mut usage: Option<TokenUsage> = None;

        while let Some(result) = stream.next().await {
            let chunk = match result {
                Ok(c) => c,
                Err(e) => {
                    let error = Self::classify_error(e);
                    callback.on_error(&error);
                    return Err(error);
                }
            };

            if let Some(ref u) = chunk.usage {
                usage = Some(TokenUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
            }

            for choice in chunk.choices {
                let delta = choice.delta;
                if let Some(ref token) = delta.content {
                    if !token.is_empty() {
                        content.push_str(token);
                        callback.on_token(token);
                    }
                }
                if let Some(fragments) = delta.tool_calls {
                    for fragment in fragments {
                        let (name, arguments) = fragment
                            .function
                            .as_ref()
                            .map(|f| (f.name.as_deref(), f.arguments.as_deref()))
                            .unwrap_or((None, None));
                        if let Some(call) = accumulator.push_fragment(
                            fragment.index,
                            fragment.id.as_deref(),
                            name,
                            arguments,
                        ) {
                            callback.on_tool_call(&content, &call);
                        }
                    }
                }
            }
        }

        let completion = ChatCompletion {
            content,
            tool_calls: accumulator.finish(),
            reasoning: None,
            usage,
        };
        trace!(
            content_len = completion.content.len(),
            tool_calls = completion.tool_calls.len(),
            "chat completions stream closed"
        );
        callback.on_completion(&completion);
        Ok(completion)
    }
}
