//! The agent: a chat model, a tool set, optional checkpointer, middleware chain,
//! and configuration bound into `invoke` / `stream` / `batch` / `resume`.
//!
//! # Main types
//!
//! - [`Agent`]: entry point; build with [`Agent::builder`].
//! - [`Request`] / [`Response`]: one turn in, one outcome out.
//! - [`Interrupt`] / [`ResumeCommand`]: human-in-the-loop suspension and its
//!   continuation.
//! - [`AgentConfig`]: per-agent defaults (system prompt, iteration bound, timeout,
//!   thread id, model parameters).
//!
//! # Example
//!
//! ```rust,no_run
//! use tiller::{Agent, MockChatModel, Request};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = Agent::builder()
//!     .model(MockChatModel::replies(&["4"]))
//!     .system_prompt("You are a concise assistant.")
//!     .build()?;
//! let response = agent.invoke(Request::new("What is 2+2?")).await?;
//! assert_eq!(response.output, "4");
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod executor;
mod interrupt;
mod request;
mod response;

use std::sync::Arc;

use crate::error::AgentError;
use crate::stream::StreamEvent;

pub use builder::{AgentBuilder, BuildError};
pub use config::{AgentConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_TIMEOUT};
pub use interrupt::{Interrupt, InterruptKind, ResumeCommand};
pub use request::Request;
pub use response::Response;

pub(crate) use executor::Executor;

/// The top-level agent handle. Cheap to clone; clones share the executor, the
/// tool pool, and the mock-model cursor (when one is used).
#[derive(Clone)]
pub struct Agent {
    executor: Arc<Executor>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Runs the reason-act loop to completion, an approval interrupt, or an error.
    pub async fn invoke(&self, request: Request) -> Result<Response, AgentError> {
        self.executor.execute(request, None).await
    }

    /// Like [`invoke`](Agent::invoke), but forwards tokens, tool activity,
    /// checkpoints, and the terminal event to `on_event` as they happen.
    ///
    /// Approval interrupts are not honored mid-stream: a streamed assistant
    /// message is buffered to completion, then the synchronous tool path runs and
    /// may end the call with `Response::interrupt` set.
    pub async fn stream<F>(&self, request: Request, mut on_event: F) -> Result<Response, AgentError>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let request = request.with_streaming(true);
        self.executor.execute(request, Some(&mut on_event)).await
    }

    /// Ordered sequential execution; the first failing request aborts the batch.
    pub async fn batch(&self, requests: Vec<Request>) -> Result<Vec<Response>, AgentError> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.invoke(request).await?);
        }
        Ok(responses)
    }

    /// Continues from an approval interrupt on the agent's configured thread.
    ///
    /// The loaded checkpoint is the source of truth: the original user input is
    /// not re-consumed, and an approved side-effecting tool may run again if an
    /// earlier attempt crashed after execution but before checkpointing
    /// (at-least-once semantics).
    pub async fn resume(
        &self,
        checkpoint_id: &str,
        command: ResumeCommand,
    ) -> Result<Response, AgentError> {
        let thread_id = self.executor.config.thread_id.clone().ok_or_else(|| {
            AgentError::InvalidRequest(
                "resume without an explicit thread requires AgentConfig::thread_id".into(),
            )
        })?;
        self.executor
            .execute_resume(&thread_id, checkpoint_id, command, None)
            .await
    }

    /// [`resume`](Agent::resume) for hosts that multiplex threads over one agent.
    pub async fn resume_thread(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        command: ResumeCommand,
    ) -> Result<Response, AgentError> {
        self.executor
            .execute_resume(thread_id, checkpoint_id, command, None)
            .await
    }

    pub fn config(&self) -> &AgentConfig {
        &self.executor.config
    }

    /// Signals cancellation to in-flight invocations; they stop at the next
    /// suspension point with [`AgentError::Cancelled`].
    pub fn cancel(&self) {
        self.executor.cancel.cancel();
    }

    /// Shuts down the tool invoker's worker pool (graceful, then forced).
    pub async fn shutdown(&self) {
        self.executor.invoker.shutdown().await;
    }
}
