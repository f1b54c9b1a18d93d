//! MCP Tools
//!
//! Tools are registered once at startup into a [`ToolRegistry`] that every
//! session's server instance shares read-only.

mod get_current_time;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::protocol::{McpTool, Tool};

pub use get_current_time::GetCurrentTimeTool;

/// Immutable-after-startup set of tools, keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name();
        self.tools.insert(name, tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tool definitions for tools/list, ordered by name
    pub fn definitions(&self) -> Vec<McpTool> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Register the tools that ship with the server
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(GetCurrentTimeTool::new()));
}
