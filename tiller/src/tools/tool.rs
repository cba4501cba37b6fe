use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Declared interface of one tool: name, description for the model, and the JSON
/// schema of its arguments. Sent to the model in
/// [`ChatOptions::tools`](crate::llm::ChatOptions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for the arguments object.
    pub parameters: serde_json::Value,
}

/// Text content returned by a successful tool call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallContent {
    pub text: String,
}

/// Error raised by a tool implementation. The invoker converts this into an error
/// [`ToolResult`](crate::state::ToolResult); it never crosses the framework boundary.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("execution: {0}")]
    Execution(String),
}

/// Represents a single tool that can be called by the model.
///
/// Each tool has a unique name, a specification (description and JSON schema), and
/// implements the call logic. A tool is not required to be thread-safe beyond
/// `Send + Sync` unless the host runs concurrent invocations of it.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use tiller::tools::{Tool, ToolCallContent, ToolError, ToolSpec};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn spec(&self) -> ToolSpec {
///         ToolSpec {
///             name: "echo".to_string(),
///             description: Some("Echoes the input text".to_string()),
///             parameters: serde_json::json!({
///                 "type": "object",
///                 "properties": { "text": { "type": "string" } }
///             }),
///         }
///     }
///
///     async fn call(&self, args: Value) -> Result<ToolCallContent, ToolError> {
///         let text = args["text"].as_str().unwrap_or_default().to_string();
///         Ok(ToolCallContent { text })
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name across all tools registered in one registry.
    fn name(&self) -> &str;

    /// Specification shown to the model: name, description, argument schema.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool with the parsed arguments object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for validation or execution failures; the invoker turns
    /// either into an error `ToolResult` fed back to the model.
    async fn call(&self, args: serde_json::Value) -> Result<ToolCallContent, ToolError>;
}
