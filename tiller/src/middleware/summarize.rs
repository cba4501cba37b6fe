//! Summarization middleware: compacts old history via an auxiliary model call.
//!
//! On `before_invoke`, when the estimated token count of the conversation exceeds
//! the configured threshold, older messages are replaced by a summary folded into
//! the system prompt, preserving the last N messages. The replacement is applied
//! only when it strictly shrinks the estimate, so repeated invocations converge.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::llm::{ChatModel, ChatOptions};
use crate::message::Message;
use crate::middleware::context::AgentContext;
use crate::middleware::Middleware;

/// Crude token estimate: one token per four characters, plus a fixed per-message
/// overhead. Deliberately provider-agnostic; precision plugs in here if a host
/// needs it.
pub(crate) fn estimate_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| m.content().chars().count() / 4 + 8)
        .sum()
}

const SUMMARY_INSTRUCTION: &str = "Summarize the conversation below into a compact brief. \
Keep decisions, facts, tool outcomes, and open questions. Answer with the summary only.";

/// Threshold-triggered history compaction.
pub struct SummarizingMiddleware {
    model: Arc<dyn ChatModel>,
    token_threshold: usize,
    keep_last: usize,
}

impl SummarizingMiddleware {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            token_threshold: 3000,
            keep_last: 6,
        }
    }

    pub fn with_token_threshold(mut self, token_threshold: usize) -> Self {
        self.token_threshold = token_threshold;
        self
    }

    /// How many trailing messages survive compaction untouched.
    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last.max(1);
        self
    }

    /// Index of the first kept message: `keep_last` from the end, moved forward
    /// past any leading tool message so the kept window never starts with an
    /// orphaned tool result (which would break the correlation invariant).
    fn keep_boundary(messages: &[Message], keep_last: usize, first_summarizable: usize) -> usize {
        let mut boundary = messages.len().saturating_sub(keep_last);
        while boundary > first_summarizable
            && matches!(messages.get(boundary), Some(Message::Tool(_)))
        {
            boundary -= 1;
        }
        boundary.max(first_summarizable)
    }

    fn render_transcript(messages: &[Message]) -> String {
        let mut out = String::new();
        for message in messages {
            out.push_str(message.role());
            out.push_str(": ");
            out.push_str(message.content());
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl Middleware for SummarizingMiddleware {
    fn name(&self) -> &str {
        "summarize"
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn before_invoke(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        let before = estimate_tokens(&ctx.state().messages);
        if before <= self.token_threshold {
            return Ok(());
        }

        let messages = &ctx.state().messages;
        let has_system = matches!(messages.first(), Some(Message::System(_)));
        let first_summarizable = usize::from(has_system);
        let boundary = Self::keep_boundary(messages, self.keep_last, first_summarizable);
        if boundary <= first_summarizable {
            return Ok(());
        }

        let older = &messages[first_summarizable..boundary];
        let transcript = Self::render_transcript(older);
        let summary_request = [
            Message::system(SUMMARY_INSTRUCTION),
            Message::human(transcript),
        ];
        let completion = self
            .model
            .chat(&summary_request, &ChatOptions::default())
            .await?;
        let summary = completion.content.trim().to_string();
        if summary.is_empty() {
            tracing::warn!("summarization produced empty output; keeping full history");
            return Ok(());
        }

        // Fold the summary into the system prompt: the state keeps a single
        // system message at index 0, and the original instructions survive.
        let original_prompt = ctx.state().system_prompt().unwrap_or_default();
        let merged_prompt = if original_prompt.is_empty() {
            format!("Conversation summary so far:\n{summary}")
        } else {
            format!("{original_prompt}\n\nConversation summary so far:\n{summary}")
        };

        let mut compacted = Vec::with_capacity(messages.len() - older.len() + 1);
        compacted.push(Message::system(merged_prompt));
        compacted.extend(messages[boundary..].iter().cloned());

        let after = estimate_tokens(&compacted);
        if after >= before {
            tracing::warn!(before, after, "summary did not shrink context; skipping");
            return Ok(());
        }

        tracing::info!(
            before,
            after,
            summarized = older.len(),
            kept = messages.len() - boundary,
            "history compacted"
        );
        let state = ctx.take_state();
        ctx.replace_state(state.with_messages(compacted));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Request;
    use crate::llm::{MockChatModel, MockTurn};
    use crate::state::{AgentState, ToolCall, ToolResult};

    fn long_state(turns: usize) -> AgentState {
        let mut state = AgentState::with_system_prompt("You are helpful.");
        for i in 0..turns {
            state = state
                .with_message(Message::human(format!("question {i}: {}", "x".repeat(200))))
                .with_message(Message::assistant(format!("answer {i}: {}", "y".repeat(200))));
        }
        state
    }

    /// **Scenario**: Above the threshold, older messages collapse into the system
    /// prompt and the token estimate strictly shrinks.
    #[tokio::test]
    async fn compacts_when_over_threshold() {
        let model = MockChatModel::replies(&["the user asked many questions; all answered"]);
        let middleware = SummarizingMiddleware::new(model)
            .with_token_threshold(100)
            .with_keep_last(4);
        let mut ctx = AgentContext::new(Request::new("q"), long_state(10));
        let before = estimate_tokens(&ctx.state().messages);

        middleware.before_invoke(&mut ctx).await.unwrap();

        let after = estimate_tokens(&ctx.state().messages);
        assert!(after < before, "estimate must strictly shrink");
        assert_eq!(ctx.state().messages.len(), 5); // merged system + 4 kept
        let prompt = ctx.state().system_prompt().unwrap();
        assert!(prompt.contains("You are helpful."));
        assert!(prompt.contains("Conversation summary so far:"));
        assert!(ctx.state().validate().is_ok());
    }

    /// **Scenario**: Below the threshold nothing changes and no model call is made.
    #[tokio::test]
    async fn below_threshold_is_a_no_op() {
        let model = MockChatModel::replies(&["unused"]);
        let middleware = SummarizingMiddleware::new(model.clone()).with_token_threshold(100_000);
        let state = long_state(3);
        let version = state.version;
        let mut ctx = AgentContext::new(Request::new("q"), state);

        middleware.before_invoke(&mut ctx).await.unwrap();

        assert_eq!(ctx.state().version, version);
        assert_eq!(model.calls(), 0);
    }

    /// **Scenario**: The kept window never starts with an orphaned tool message.
    #[tokio::test]
    async fn kept_window_respects_tool_correlation() {
        let call = ToolCall::new("call-1", "add", "{}");
        let mut state = long_state(6);
        state = state
            .with_message(Message::assistant_with_tool_calls("", vec![call]))
            .with_message(Message::tool(&ToolResult::ok("call-1", "3")))
            .with_message(Message::assistant("412"));
        let model = MockChatModel::replies(&["summary"]);
        // keep_last = 2 would land the boundary on the tool message; it must slide
        // back to include its assistant.
        let middleware = SummarizingMiddleware::new(model)
            .with_token_threshold(100)
            .with_keep_last(2);
        let mut ctx = AgentContext::new(Request::new("q"), state);

        middleware.before_invoke(&mut ctx).await.unwrap();

        assert!(ctx.state().validate().is_ok());
        assert!(!matches!(
            ctx.state().messages.get(1),
            Some(Message::Tool(_))
        ));
    }

    /// **Scenario**: An empty summary leaves the history untouched.
    #[tokio::test]
    async fn empty_summary_keeps_history() {
        let model = MockChatModel::scripted(vec![MockTurn::text("")]);
        let middleware = SummarizingMiddleware::new(model).with_token_threshold(100);
        let state = long_state(10);
        let message_count = state.messages.len();
        let mut ctx = AgentContext::new(Request::new("q"), state);

        middleware.before_invoke(&mut ctx).await.unwrap();

        assert_eq!(ctx.state().messages.len(), message_count);
    }
}
