//! Tool invoker: synchronous and pooled async execution.
//!
//! Tool failures never surface as errors here; unknown tools, argument parse
//! failures, and raising tools all become error `ToolResult`s, normalized so the
//! result's `tool_call_id` matches the call's id.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::state::{ToolCall, ToolResult};
use crate::tools::registry::ToolRegistry;

/// Default size of the shared async worker pool.
pub const DEFAULT_POOL_WORKERS: usize = 10;

/// How long `shutdown` waits for in-flight async invocations before cancelling them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runs one call against the registry, folding every failure into an error result.
async fn run_call(registry: &ToolRegistry, call: &ToolCall) -> ToolResult {
    let Some(tool) = registry.get(&call.name) else {
        tracing::warn!(tool = %call.name, call_id = %call.id, "tool not found");
        return ToolResult::error(&call.id, format!("tool not found: {}", call.name));
    };

    let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
        Ok(v) => v,
        Err(e) => {
            return ToolResult::error(&call.id, format!("invalid tool arguments: {e}"));
        }
    };

    tracing::debug!(tool = %call.name, call_id = %call.id, "invoking tool");
    match tool.call(args).await {
        Ok(content) => ToolResult::ok(&call.id, content.text),
        Err(e) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool failed");
            ToolResult::error(&call.id, e.to_string())
        }
    }
}

/// Executes tool calls against a registry.
///
/// `invoke` runs inline on the caller's task (tool invocations within one loop
/// iteration stay serialized in model order). `invoke_async` submits to a shared
/// bounded worker pool; the pool is owned by the invoker and must be shut down with
/// [`shutdown`](ToolInvoker::shutdown) (graceful wait, then forced cancellation).
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    pool: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_pool_size(registry, DEFAULT_POOL_WORKERS)
    }

    pub fn with_pool_size(registry: Arc<ToolRegistry>, workers: usize) -> Self {
        Self {
            registry,
            pool: Arc::new(Semaphore::new(workers.max(1))),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Executes one tool call. Never fails: unknown tool, bad arguments JSON, and
    /// tool errors all come back as an error result with the call's id.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        run_call(&self.registry, call).await
    }

    /// Submits one call to the shared worker pool; at most the pool size run
    /// concurrently, excess submissions queue on the pool. After `shutdown` has
    /// completed, submissions resolve to an error result without running.
    pub fn invoke_async(&self, call: ToolCall) -> JoinHandle<ToolResult> {
        let registry = Arc::clone(&self.registry);
        let pool = Arc::clone(&self.pool);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    return ToolResult::error(&call.id, "invoker shut down");
                }
                permit = pool.acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => return ToolResult::error(&call.id, "invoker shut down"),
                },
            };
            let _permit = permit;
            tokio::select! {
                _ = cancel.cancelled() => ToolResult::error(&call.id, "invoker shut down"),
                result = run_call(&registry, &call) => result,
            }
        })
    }

    /// Ordered, per-call fallible execution preserving input order.
    pub async fn invoke_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.invoke(call).await);
        }
        results
    }

    /// Stops the pool: waits up to five seconds for in-flight async work, then
    /// cancels whatever remains. Later submissions resolve to error results.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!("tool pool did not drain in time; forcing cancellation");
            self.cancel.cancel();
            self.tracker.wait().await;
        }
        // Refuse anything submitted after shutdown completed.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::{Tool, ToolCallContent, ToolError, ToolSpec};
    use async_trait::async_trait;

    struct Adder;

    #[async_trait]
    impl Tool for Adder {
        fn name(&self) -> &str {
            "add"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "add".to_string(),
                description: Some("Adds two integers".to_string()),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "a": { "type": "integer" },
                        "b": { "type": "integer" }
                    },
                    "required": ["a", "b"]
                }),
            }
        }
        async fn call(&self, args: serde_json::Value) -> Result<ToolCallContent, ToolError> {
            let a = args["a"]
                .as_i64()
                .ok_or_else(|| ToolError::InvalidArguments("a must be an integer".into()))?;
            let b = args["b"]
                .as_i64()
                .ok_or_else(|| ToolError::InvalidArguments("b must be an integer".into()))?;
            Ok(ToolCallContent {
                text: (a + b).to_string(),
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "failing".to_string(),
                description: None,
                parameters: serde_json::json!({}),
            }
        }
        async fn call(&self, _args: serde_json::Value) -> Result<ToolCallContent, ToolError> {
            Err(ToolError::Execution("disk on fire".into()))
        }
    }

    fn invoker() -> ToolInvoker {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Adder));
        registry.register(Arc::new(Failing));
        ToolInvoker::new(registry)
    }

    /// **Scenario**: A successful call returns the tool's text, correlated to the call id.
    #[tokio::test]
    async fn invoke_success_normalizes_call_id() {
        let invoker = invoker();
        let call = ToolCall::new("call-1", "add", r#"{"a":125,"b":287}"#);
        let result = invoker.invoke(&call).await;
        assert!(!result.is_error);
        assert_eq!(result.tool_call_id, "call-1");
        assert_eq!(result.content, "412");
    }

    /// **Scenario**: Unknown tool and raising tool both come back as error results,
    /// never as panics or Err.
    #[tokio::test]
    async fn invoke_failures_become_error_results() {
        let invoker = invoker();

        let missing = invoker
            .invoke(&ToolCall::new("c1", "no_such_tool", "{}"))
            .await;
        assert!(missing.is_error);
        assert!(missing.content.contains("tool not found"));

        let raised = invoker.invoke(&ToolCall::new("c2", "failing", "{}")).await;
        assert!(raised.is_error);
        assert!(raised.content.contains("disk on fire"));

        let bad_json = invoker
            .invoke(&ToolCall::new("c3", "add", "{not json"))
            .await;
        assert!(bad_json.is_error);
        assert!(bad_json.content.contains("invalid tool arguments"));
    }

    /// **Scenario**: invoke_all preserves input order, including across failures.
    #[tokio::test]
    async fn invoke_all_preserves_order() {
        let invoker = invoker();
        let calls = vec![
            ToolCall::new("c1", "add", r#"{"a":1,"b":2}"#),
            ToolCall::new("c2", "failing", "{}"),
            ToolCall::new("c3", "add", r#"{"a":2,"b":3}"#),
        ];
        let results = invoker.invoke_all(&calls).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].content, "3");
        assert!(results[1].is_error);
        assert_eq!(results[2].content, "5");
        assert_eq!(results[2].tool_call_id, "c3");
    }

    /// **Scenario**: invoke_async runs through the pool and resolves to the result;
    /// shutdown afterwards completes promptly.
    #[tokio::test]
    async fn invoke_async_and_shutdown() {
        let invoker = invoker();
        let handle = invoker.invoke_async(ToolCall::new("c1", "add", r#"{"a":20,"b":22}"#));
        let result = handle.await.unwrap();
        assert_eq!(result.content, "42");
        invoker.shutdown().await;
    }

    /// **Scenario**: Submissions after shutdown resolve to error results instead of running.
    #[tokio::test]
    async fn invoke_async_after_shutdown_errors() {
        let invoker = invoker();
        invoker.shutdown().await;
        let handle = invoker.invoke_async(ToolCall::new("c1", "add", r#"{"a":1,"b":1}"#));
        let result = handle.await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("shut down"));
    }

    /// **Scenario**: Many concurrent submissions all complete; the pool bounds
    /// concurrency but drops nothing.
    #[tokio::test]
    async fn pool_drains_burst_of_submissions() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Adder));
        let invoker = ToolInvoker::with_pool_size(registry, 2);
        let handles: Vec<_> = (0..20)
            .map(|i| {
                invoker.invoke_async(ToolCall::new(
                    format!("c{i}"),
                    "add",
                    format!(r#"{{"a":{i},"b":1}}"#),
                ))
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            assert_eq!(result.content, (i as i64 + 1).to_string());
        }
        invoker.shutdown().await;
    }
}
