//! Tools offered to multi-tool ("mag") model statements.
//!
//! Each tool wraps one catalog API. The model addresses it by its
//! transliterated `name`; narration shown to people uses `origin_name`.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by.
    fn name(&self) -> &str;

    /// Name of the underlying resource, for narration.
    fn origin_name(&self) -> &str {
        self.name()
    }

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run with parsed arguments; the text goes back to the model verbatim.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Tools bound to one statement, keyed by model-facing name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. On a name collision the later tool replaces the earlier.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if let Some(previous) = self.tools.insert(name.clone(), tool) {
            tracing::warn!(
                tool = %name,
                replaced = %previous.origin_name(),
                "Tool name collision, later registration wins"
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Definitions for the model request, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
