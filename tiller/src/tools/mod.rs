//! Tool system: trait, registry, invoker.
//!
//! A [`Tool`] declares a name, a spec (description + JSON schema), and call logic.
//! Tools are registered with [`ToolRegistry`] (thread-safe for registration and
//! lookup; reads are lock-free after construction) and executed through
//! [`ToolInvoker`], which never surfaces tool failures as errors: an unknown tool
//! or a raising tool becomes an error [`ToolResult`](crate::state::ToolResult) the
//! model can observe and adapt to.

mod invoker;
mod registry;
mod tool;

pub use invoker::{ToolInvoker, DEFAULT_POOL_WORKERS};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolCallContent, ToolError, ToolSpec};
