//! Name → tool map. Mutated only at agent build time; reads are lock-free after.

use std::sync::Arc;

use dashmap::DashMap;

use crate::tools::tool::{Tool, ToolSpec};

/// Thread-safe registry mapping unique tool names to implementations.
///
/// **Interaction**: Built by [`AgentBuilder`](crate::agent::AgentBuilder) from the
/// configured tool list; the executor reads specs for
/// [`ChatOptions::tools`](crate::llm::ChatOptions) and the invoker looks tools up
/// per call.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its own name. Replaces any tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| Arc::clone(&t))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Specs of all registered tools, sorted by name for a stable prompt order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.iter().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
