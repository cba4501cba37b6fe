//! Middleware behavior inside the running loop: injection, summarization, stop
//! interception, hook accounting, timeout, and cancellation.


use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tiller::middleware::{AgentContext, InterceptionResult, Middleware};
use tiller::tools::{Tool, ToolCallContent, ToolError, ToolSpec};
use tiller::{
    Agent, AgentError, AgentState, ChatCompletion, ChatModel, ChatOptions, InjectionMiddleware,
    Message, MockChatModel, MockTurn, Request, SummarizingMiddleware, ToolCall, ToolResult,
};
use tokio_util::sync::CancellationToken;

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "echo".to_string(),
            description: None,
            parameters: serde_json::json!({"type": "object"}),
        }
    }
    async fn call(&self, args: serde_json::Value) -> Result<ToolCallContent, ToolError> {
        Ok(ToolCallContent {
            text: args.to_string(),
        })
    }
}

/// **Scenario**: Variable injection rewrites the system prompt before the first
/// model call; the model observes the resolved text.
#[tokio::test]
async fn injection_resolves_before_first_model_call() {
    let model = MockChatModel::replies(&["ok"]);
    let agent = Agent::builder()
        .model(model.clone())
        .system_prompt("You are an assistant.")
        .middleware(Arc::new(InjectionMiddleware::suffix(
            "Answer in a ${request:tone} tone for ${request:audience}.",
        )))
        .build()
        .unwrap();

    agent
        .invoke(
            Request::new("hello")
                .with_parameter("tone", serde_json::json!("formal"))
                .with_parameter("audience", serde_json::json!("auditors")),
        )
        .await
        .unwrap();

    let observed = model.observed_messages();
    let system = observed[0][0].content();
    assert!(system.starts_with("You are an assistant."));
    assert!(system.contains("formal tone for auditors"));
}

/// **Scenario**: Summarization fires inside the loop when the carried history is
/// over threshold; the model then sees the compacted conversation.
#[tokio::test]
async fn summarization_compacts_in_loop() {
    let mut prior = AgentState::with_system_prompt("You are helpful.");
    for i in 0..20 {
        prior = prior
            .with_message(Message::human(format!("q{i}: {}", "x".repeat(120))))
            .with_message(Message::assistant(format!("a{i}: {}", "y".repeat(120))));
    }

    let summarizer = MockChatModel::replies(&["twenty earlier Q&A rounds, all answered"]);
    let model = MockChatModel::replies(&["compact enough"]);
    let agent = Agent::builder()
        .model(model.clone())
        .middleware(Arc::new(
            SummarizingMiddleware::new(summarizer).with_token_threshold(200).with_keep_last(4),
        ))
        .build()
        .unwrap();

    let response = agent
        .invoke(Request::new("and now?").with_state(prior))
        .await
        .unwrap();

    assert_eq!(response.output, "compact enough");
    let seen = &model.observed_messages()[0];
    assert!(seen.len() <= 7, "model saw the compacted history, got {}", seen.len());
    assert!(seen[0]
        .content()
        .contains("Conversation summary so far:"));
    assert!(response.state.validate().is_ok());
}

/// A middleware that stops every tool call with a fixed reason.
struct StopAll;

#[async_trait]
impl Middleware for StopAll {
    fn name(&self) -> &str {
        "stop-all"
    }
    async fn before_tool_call(
        &self,
        _call: &ToolCall,
        _ctx: &mut AgentContext,
    ) -> Result<InterceptionResult, AgentError> {
        Ok(InterceptionResult::Stop("tools are disabled here".into()))
    }
}

/// **Scenario**: A stop interception appends a synthetic error tool message and
/// ends the run with the current assistant message as final.
#[tokio::test]
async fn stop_interception_is_cooperative_and_final() {
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("echo", "{}"),
            MockTurn::text("never reached"),
        ]))
        .tool(Arc::new(EchoTool))
        .middleware(Arc::new(StopAll))
        .build()
        .unwrap();

    let response = agent.invoke(Request::new("go")).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.iterations, 1, "no second model call after stop");
    let tool_message = response
        .messages
        .iter()
        .find_map(Message::as_tool)
        .unwrap();
    assert!(tool_message.is_error);
    assert_eq!(
        tool_message.error_message.as_deref(),
        Some("tools are disabled here")
    );
}

/// Counts hook firings across one invocation.
#[derive(Default)]
struct HookCounter {
    before_invoke: AtomicU32,
    after_invoke: AtomicU32,
    before_tool: AtomicU32,
    after_tool: AtomicU32,
    state_updates: AtomicU32,
    finally_calls: AtomicU32,
}

#[async_trait]
impl Middleware for HookCounter {
    fn name(&self) -> &str {
        "counter"
    }
    async fn before_invoke(&self, _ctx: &mut AgentContext) -> Result<(), AgentError> {
        self.before_invoke.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn after_invoke(&self, _ctx: &mut AgentContext) -> Result<(), AgentError> {
        self.after_invoke.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn before_tool_call(
        &self,
        _call: &ToolCall,
        _ctx: &mut AgentContext,
    ) -> Result<InterceptionResult, AgentError> {
        self.before_tool.fetch_add(1, Ordering::SeqCst);
        Ok(InterceptionResult::Continue)
    }
    async fn after_tool_call(
        &self,
        _call: &ToolCall,
        _result: &mut ToolResult,
        _ctx: &mut AgentContext,
    ) -> Result<(), AgentError> {
        self.after_tool.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn on_state_update(
        &self,
        state: AgentState,
        _ctx: &mut AgentContext,
    ) -> Result<AgentState, AgentError> {
        self.state_updates.fetch_add(1, Ordering::SeqCst);
        Ok(state)
    }
    async fn on_finally(&self, _ctx: &mut AgentContext, _error: Option<&AgentError>) {
        self.finally_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// **Scenario**: Every hook fires exactly once per logical point per iteration:
/// two iterations, one tool call, one cleanup.
#[tokio::test]
async fn hooks_fire_once_per_logical_point() {
    let counter = Arc::new(HookCounter::default());
    let agent = Agent::builder()
        .model(MockChatModel::scripted(vec![
            MockTurn::tool_call("echo", "{}"),
            MockTurn::text("done"),
        ]))
        .tool(Arc::new(EchoTool))
        .middleware(counter.clone())
        .build()
        .unwrap();

    agent.invoke(Request::new("go")).await.unwrap();

    assert_eq!(counter.before_invoke.load(Ordering::SeqCst), 2);
    assert_eq!(counter.after_invoke.load(Ordering::SeqCst), 2);
    assert_eq!(counter.before_tool.load(Ordering::SeqCst), 1);
    assert_eq!(counter.after_tool.load(Ordering::SeqCst), 1);
    // human + assistant + tool + assistant appends, plus the final pass.
    assert_eq!(counter.state_updates.load(Ordering::SeqCst), 5);
    assert_eq!(counter.finally_calls.load(Ordering::SeqCst), 1);
}

/// Model that sleeps before answering, for timeout and cancellation tests.
struct SlowModel {
    delay: Duration,
}

#[async_trait]
impl ChatModel for SlowModel {
    async fn chat(
        &self,
        _messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<ChatCompletion, AgentError> {
        tokio::time::sleep(self.delay).await;
        Ok(ChatCompletion {
            content: "too late".to_string(),
            ..Default::default()
        })
    }
}

/// **Scenario**: Exceeding the wall-clock bound surfaces a timeout and still runs
/// `on_finally`.
#[tokio::test]
async fn timeout_surfaces_and_cleans_up() {
    let counter = Arc::new(HookCounter::default());
    let agent = Agent::builder()
        .model(Arc::new(SlowModel {
            delay: Duration::from_millis(500),
        }))
        .middleware(counter.clone())
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = agent.invoke(Request::new("hello")).await.unwrap_err();
    assert!(matches!(err, AgentError::Timeout(_)));
    assert!(err.is_retryable());
    assert_eq!(counter.finally_calls.load(Ordering::SeqCst), 1);
}

/// **Scenario**: Caller cancellation interrupts an in-flight model call at the
/// next suspension point; no further state mutations occur.
#[tokio::test]
async fn cancellation_propagates() {
    let token = CancellationToken::new();
    let agent = Agent::builder()
        .model(Arc::new(SlowModel {
            delay: Duration::from_secs(5),
        }))
        .cancellation_token(token.clone())
        .build()
        .unwrap();

    let runner = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.invoke(Request::new("hello")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let err = runner.await.unwrap().unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));
}
