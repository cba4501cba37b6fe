//! State types for agent runs.
//!
//! This module provides the immutable conversation snapshot and the tool call/result
//! types the executor moves between the model and the invoker.
//!
//! # Main types
//!
//! - [`AgentState`]: Conversation messages plus a scratch `data` map and a version
//!   counter; every update derives a new state, never mutates.
//! - [`ToolCall`]: A single tool invocation requested by the model; consumed by the
//!   [`ToolInvoker`](crate::tools::ToolInvoker).
//! - [`ToolResult`]: Result of one tool execution; converted into a tool-role
//!   [`Message`](crate::message::Message) and appended to state.
//!
//! # Example
//!
//! ```rust
//! use tiller::{AgentState, Message};
//!
//! let state = AgentState::with_system_prompt("You are a concise assistant.")
//!     .with_message(Message::human("What is 2+2?"));
//! assert_eq!(state.version, 2);
//! ```

mod agent_state;

pub use agent_state::{AgentState, StateInvariantError, ToolCall, ToolResult};
