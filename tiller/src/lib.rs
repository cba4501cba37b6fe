//! # Tiller
//!
//! An agent execution core in Rust: a reason-act loop that coordinates a chat
//! model, a set of callable tools, and durable conversation state, driving them
//! until the model produces a final answer or a human-approval interrupt pauses
//! the run.
//!
//! ## Design principles
//!
//! - **Immutable state**: One [`AgentState`] snapshot flows through the loop;
//!   every update derives a new snapshot (`version + 1`), never mutates.
//! - **Interception everywhere**: A priority-ordered [`Middleware`] chain wraps
//!   the model call, each tool call, each state update, and the error path.
//! - **Tool failures are data**: An unknown or raising tool becomes an error
//!   [`ToolResult`] the model observes and adapts to; only framework failures
//!   (transport, checkpoint I/O, middleware bugs, timeout) surface as
//!   [`AgentError`].
//! - **Durable threads**: A [`Checkpointer`] persists state per conversation
//!   thread with sortable checkpoint ids, powering resume after approval
//!   interrupts and process restarts (at-least-once for side-effecting tools).
//!
//! ## Features
//!
//! - **ReAct loop**: [`Agent`] with `invoke` / `stream` / `batch` / `resume`;
//!   iteration and wall-clock bounds; caller cancellation.
//! - **Model integration**: [`ChatModel`] trait with [`ChatOpenAI`]
//!   (OpenAI-compatible chat completions, SSE streaming with per-stream tool-call
//!   accumulation) and scripted [`MockChatModel`].
//! - **Tools**: [`Tool`] / [`ToolRegistry`] / [`ToolInvoker`] with a bounded
//!   async worker pool and graceful-then-forced shutdown.
//! - **Middleware**: [`LoggingMiddleware`], [`SummarizingMiddleware`],
//!   [`ApprovalMiddleware`] (human-in-the-loop policies), [`InjectionMiddleware`]
//!   (`${state:key}`-style variable resolution).
//! - **Checkpointing**: [`MemorySaver`] and [`SqliteSaver`].
//! - **Multi-agent**: [`Coordinator`] with response-marker and supervisor
//!   [`HandoffStrategy`]s under a bounded handoff count.
//! - **Streaming**: [`StreamEvent`] plus a bridge to the `stream-event` protocol
//!   crate for transport layers.
//!
//! ## Main modules
//!
//! - [`agent`]: [`Agent`], [`AgentBuilder`], [`Request`], [`Response`],
//!   [`Interrupt`], [`ResumeCommand`], [`AgentConfig`].
//! - [`message`]: [`Message`] (System / Human / Assistant / Tool).
//! - [`state`]: [`AgentState`], [`ToolCall`], [`ToolResult`].
//! - [`llm`]: [`ChatModel`], [`ChatOptions`], [`ChatOpenAI`], [`MockChatModel`],
//!   [`ToolCallAccumulator`].
//! - [`tools`]: [`Tool`], [`ToolRegistry`], [`ToolInvoker`].
//! - [`middleware`]: [`Middleware`], [`MiddlewareChain`], [`AgentContext`],
//!   built-ins.
//! - [`memory`]: [`Checkpointer`], [`MemorySaver`], [`SqliteSaver`],
//!   [`CheckpointInfo`].
//! - [`coordinator`]: [`Coordinator`], [`AgentNode`], handoff strategies.
//! - [`stream`]: [`StreamEvent`], [`to_protocol_event`].
//!
//! Key types are re-exported at the crate root:
//! `use tiller::{Agent, Request, Message, AgentState};`.

pub mod agent;
pub mod coordinator;
pub mod error;
pub mod llm;
pub mod memory;
pub mod message;
pub mod middleware;
pub mod state;
pub mod stream;
pub mod tools;

pub use agent::{
    Agent, AgentBuilder, AgentConfig, BuildError, Interrupt, InterruptKind, Request, Response,
    ResumeCommand, DEFAULT_MAX_ITERATIONS, DEFAULT_TIMEOUT,
};
pub use coordinator::{
    parse_handoff, AgentNode, Coordinator, CoordinatorBuildError, CoordinatorBuilder,
    HandoffDecision, HandoffDirective, HandoffStrategy, ResponseMarkerStrategy,
    SupervisorStrategy, DEFAULT_MAX_HANDOFFS,
};
pub use error::AgentError;
pub use llm::{
    ChatCompletion, ChatModel, ChatOpenAI, ChatOptions, ChatStreamCallback, MockChatModel,
    MockTurn, NoopStreamCallback, TokenUsage, ToolCallAccumulator,
};
pub use memory::{CheckpointError, CheckpointInfo, Checkpointer, MemorySaver, SqliteSaver};
pub use message::{AssistantMessage, HumanMessage, Message, SystemMessage, ToolMessage};
pub use middleware::{
    AgentContext, ApprovalMiddleware, ApprovalPolicy, ContextSnapshot, InjectionMiddleware,
    InjectionMode, InterceptionResult, LoggingMiddleware, Middleware, MiddlewareChain,
    RuntimeStatus, SummarizingMiddleware,
};
pub use state::{AgentState, StateInvariantError, ToolCall, ToolResult};
pub use stream::{to_protocol_event, StreamEvent};
pub use tools::{
    Tool, ToolCallContent, ToolError, ToolInvoker, ToolRegistry, ToolSpec, DEFAULT_POOL_WORKERS,
};

/// When running `cargo test -p tiller`, initializes tracing from `RUST_LOG` so
/// unit tests in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
