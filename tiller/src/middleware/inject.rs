//! Variable injection into the system prompt.
//!
//! Resolves `${state:key}`, `${request:key}`, and `${context:key}` against the
//! state data map, the request parameters, and the context scratch map, then
//! combines the resolved text with the existing system prompt. Unresolved
//! variables pass through verbatim. Runs only on the first iteration of a request.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::AgentError;
use crate::message::Message;
use crate::middleware::context::AgentContext;
use crate::middleware::Middleware;

static VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(state|request|context):([A-Za-z0-9_.\-]+)\}").expect("variable regex")
});

/// How the resolved text combines with the existing system prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectionMode {
    /// Resolved text, then the existing prompt.
    Prefix,
    /// Existing prompt, then the resolved text.
    Suffix,
    /// No extra text: resolve variables inside the existing prompt in place.
    Replace,
    /// Resolved text replaces the existing prompt entirely.
    Override,
}

/// Resolves `${...}` variables and rewrites the state's system message.
pub struct InjectionMiddleware {
    mode: InjectionMode,
    /// Text carrying variables; unused in `Replace` mode.
    template: Option<String>,
}

impl InjectionMiddleware {
    pub fn new(mode: InjectionMode, template: Option<String>) -> Self {
        Self { mode, template }
    }

    pub fn prefix(template: impl Into<String>) -> Self {
        Self::new(InjectionMode::Prefix, Some(template.into()))
    }

    pub fn suffix(template: impl Into<String>) -> Self {
        Self::new(InjectionMode::Suffix, Some(template.into()))
    }

    pub fn replace_in_place() -> Self {
        Self::new(InjectionMode::Replace, None)
    }

    pub fn override_with(template: impl Into<String>) -> Self {
        Self::new(InjectionMode::Override, Some(template.into()))
    }

    fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Resolves every variable in `text` against the three maps; unknown keys and
    /// unknown scopes stay verbatim.
    fn resolve(text: &str, ctx: &AgentContext) -> String {
        VARIABLE
            .replace_all(text, |caps: &Captures| {
                let scope = &caps[1];
                let key = &caps[2];
                let value = match scope {
                    "state" => ctx.state().data.get(key),
                    "request" => ctx.request.parameters.get(key),
                    "context" => ctx.scratch.get(key),
                    _ => None,
                };
                match value {
                    Some(v) => Self::value_to_string(v),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn combined_prompt(&self, ctx: &AgentContext) -> Option<String> {
        let current = ctx.state().system_prompt().map(str::to_string);
        let resolved = self
            .template
            .as_deref()
            .map(|t| Self::resolve(t, ctx));
        match self.mode {
            InjectionMode::Prefix => match (resolved, current) {
                (Some(r), Some(c)) => Some(format!("{r}\n\n{c}")),
                (Some(r), None) => Some(r),
                (None, c) => c,
            },
            InjectionMode::Suffix => match (resolved, current) {
                (Some(r), Some(c)) => Some(format!("{c}\n\n{r}")),
                (Some(r), None) => Some(r),
                (None, c) => c,
            },
            InjectionMode::Replace => current.map(|c| Self::resolve(&c, ctx)),
            InjectionMode::Override => resolved.or(current),
        }
    }
}

#[async_trait]
impl Middleware for InjectionMiddleware {
    fn name(&self) -> &str {
        "inject"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn before_invoke(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        if ctx.iteration != 0 {
            return Ok(());
        }
        let Some(prompt) = self.combined_prompt(ctx) else {
            return Ok(());
        };
        if ctx.state().system_prompt() == Some(prompt.as_str()) {
            return Ok(());
        }

        let state = ctx.take_state();
        let mut messages = state.messages.clone();
        let has_system = matches!(messages.first(), Some(Message::System(_)));
        if has_system {
            messages[0] = Message::system(prompt);
        } else {
            messages.insert(0, Message::system(prompt));
        }
        ctx.replace_state(state.with_messages(messages));
        Ok(())
    }
}
