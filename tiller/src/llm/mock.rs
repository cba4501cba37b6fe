//! Scripted chat model for offline runs and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::AgentError;
use crate::llm::{ChatCompletion, ChatModel, ChatOptions, ChatStreamCallback, TokenUsage};
use crate::message::Message;
use crate::state::ToolCall;

/// One scripted model turn.
#[derive(Clone, Debug, Default)]
pub struct MockTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl MockTurn {
    /// Plain text turn.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Turn carrying a single tool call; the id is `call-1`.
    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::default().with_tool_call(name, arguments)
    }

    /// Appends a tool call; ids are `call-1`, `call-2`, … unique within the turn.
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let id = format!("call-{}", self.tool_calls.len() + 1);
        self.tool_calls
            .push(ToolCall::new(id, name.into(), arguments.into()));
        self
    }

    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.usage = Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        });
        self
    }
}

/// Chat model that replays a script, one turn per `chat` call.
///
/// When the script runs out, the final turn repeats, so a one-turn script models
/// "always answers the same" (e.g. a model that keeps requesting the same tool).
/// The cursor is shared across clones of the `Arc`, which lets an interrupted run
/// and its resume consume one script in order.
pub struct MockChatModel {
    script: Vec<MockTurn>,
    cursor: AtomicUsize,
    /// Messages seen by each call, for assertions on prompt construction.
    observed: Mutex<Vec<Vec<Message>>>,
}

impl MockChatModel {
    pub fn scripted(script: Vec<MockTurn>) -> Arc<Self> {
        Arc::new(Self {
            script,
            cursor: AtomicUsize::new(0),
            observed: Mutex::new(Vec::new()),
        })
    }

    /// Script of plain text replies.
    pub fn replies<S: Into<String> + Clone>(texts: &[S]) -> Arc<Self> {
        Self::scripted(texts.iter().cloned().map(|t| MockTurn::text(t)).collect())
    }

    /// How many `chat` calls have been made.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// The message lists passed to each call, in order.
    pub fn observed_messages(&self) -> Vec<Vec<Message>> {
        self.observed.lock().expect("observed poisoned").clone()
    }

    fn next_turn(&self) -> Result<MockTurn, AgentError> {
        if self.script.is_empty() {
            return Err(AgentError::transport_fatal("mock script is empty"));
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        Ok(self.script[i.min(self.script.len() - 1)].clone())
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn chat(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<ChatCompletion, AgentError> {
        self.observed
            .lock()
            .expect("observed poisoned")
            .push(messages.to_vec());
        let turn = self.next_turn()?;
        Ok(ChatCompletion {
            content: turn.content,
            tool_calls: turn.tool_calls,
            reasoning: None,
            usage: turn.usage,
        })
    }

    /// Streams the scripted turn: whitespace-split tokens, then each tool call,
    /// then `on_completion`.
    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        callback: Arc<dyn ChatStreamCallback>,
    ) -> Result<ChatCompletion, AgentError> {
        callback.on_start();
        let completion = match self.chat(messages, options).await {
            Ok(c) => c,
            Err(e) => {
                callback.on_error(&e);
                return Err(e);
            }
        };
        let mut emitted = String::new();
        for piece in completion.content.split_inclusive(' ') {
            emitted.push_str(piece);
            callback.on_token(piece);
        }
        for call in &completion.tool_calls {
            callback.on_tool_call(&emitted, call);
        }
        callback.on_completion(&completion);
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: The script advances one turn per call and repeats its last turn.
    #[tokio::test]
    async fn script_advances_then_repeats_last() {
        let model = MockChatModel::scripted(vec![
            MockTurn::tool_call("echo", "{}"),
            MockTurn::text("done"),
        ]);
        let opts = ChatOptions::default();
        let first = model.chat(&[], &opts).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        let second = model.chat(&[], &opts).await.unwrap();
        assert_eq!(second.content, "done");
        let third = model.chat(&[], &opts).await.unwrap();
        assert_eq!(third.content, "done");
        assert_eq!(model.calls(), 3);
    }

    /// **Scenario**: Tool-call ids are unique within a turn.
    #[test]
    fn tool_call_ids_unique_within_turn() {
        let turn = MockTurn::default()
            .with_tool_call("a", "{}")
            .with_tool_call("b", "{}");
        assert_eq!(turn.tool_calls[0].id, "call-1");
        assert_eq!(turn.tool_calls[1].id, "call-2");
    }

    /// **Scenario**: Streaming a text turn emits word tokens that concatenate to the content.
    #[tokio::test]
    async fn stream_tokens_concatenate_to_content() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct Collect(Mutex<String>);
        impl ChatStreamCallback for Collect {
            fn on_token(&self, token: &str) {
                self.0.lock().unwrap().push_str(token);
            }
        }

        let model = MockChatModel::replies(&["the quick brown fox"]);
        let callback = Arc::new(Collect::default());
        let completion = model
            .chat_stream(&[], &ChatOptions::default(), callback.clone())
            .await
            .unwrap();
        assert_eq!(completion.content, "the quick brown fox");
        assert_eq!(&*callback.0.lock().unwrap(), "the quick brown fox");
    }

    /// **Scenario**: An empty script is a model error, surfaced through on_error semantics.
    #[tokio::test]
    async fn empty_script_is_error() {
        let model = MockChatModel::scripted(vec![]);
        assert!(model.chat(&[], &ChatOptions::default()).await.is_err());
    }
}
