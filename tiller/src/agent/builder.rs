//! Agent builder: binds a model, tools, optional checkpointer, middleware, and
//! configuration into an [`Agent`](crate::agent::Agent).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent::config::AgentConfig;
use crate::agent::executor::Executor;
use crate::agent::Agent;
use crate::llm::ChatModel;
use crate::memory::Checkpointer;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::tools::{Tool, ToolInvoker, ToolRegistry, DEFAULT_POOL_WORKERS};

/// Error building an agent.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("agent requires a chat model")]
    MissingModel,
}

/// Fluent construction of an [`Agent`]. The registry is populated here and
/// treated as immutable afterwards, so runtime lookups are lock-free.
pub struct AgentBuilder {
    model: Option<Arc<dyn ChatModel>>,
    tools: Vec<Arc<dyn Tool>>,
    pool_workers: usize,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    middleware: Vec<Arc<dyn Middleware>>,
    config: AgentConfig,
    cancel: CancellationToken,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            tools: Vec::new(),
            pool_workers: DEFAULT_POOL_WORKERS,
            checkpointer: None,
            middleware: Vec::new(),
            config: AgentConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Size of the invoker's shared async worker pool (default 10).
    pub fn pool_workers(mut self, workers: usize) -> Self {
        self.pool_workers = workers;
        self
    }

    pub fn checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replaces the whole configuration; the setters below tweak single fields.
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.config.thread_id = Some(thread_id.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Caller-held cancellation: cancelling the token interrupts in-flight runs at
    /// the next suspension point.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> Result<Agent, BuildError> {
        let model = self.model.ok_or(BuildError::MissingModel)?;
        let registry = Arc::new(ToolRegistry::new());
        for tool in self.tools {
            registry.register(tool);
        }
        let invoker = Arc::new(ToolInvoker::with_pool_size(registry, self.pool_workers));
        Ok(Agent::from_executor(Executor {
            model,
            invoker,
            checkpointer: self.checkpointer,
            middleware: MiddlewareChain::new(self.middleware),
            config: self.config,
            cancel: self.cancel,
        }))
    }
}
