//! Catalog APIs exposed to multi-tool models as tools.

use async_trait::async_trait;
use serde_json::Value;
use splforge_core::catalog::{ApiCatalog, ApiSpec};
use splforge_core::error::ToolError;
use splforge_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

use crate::api_call::ApiInvoker;

const FALLBACK_TOOL_NAME: &str = "Tool";

/// ASCII transliteration of an API name with every non-letter stripped.
///
/// `"Météo Lookup 2"` becomes `"MeteoLookup"`. A name with no letters left
/// falls back to a fixed name.
pub fn transliterate_name(name: &str) -> String {
    let ascii: String = deunicode::deunicode(name)
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();
    if ascii.is_empty() {
        FALLBACK_TOOL_NAME.to_string()
    } else {
        ascii
    }
}

/// One catalog API as a tool with a single required string parameter.
pub struct ApiTool {
    name: String,
    description: String,
    param_key: String,
    api: ApiSpec,
    invoker: Arc<ApiInvoker>,
}

impl ApiTool {
    /// `None` when the API declares no parameters.
    pub fn new(api: ApiSpec, invoker: Arc<ApiInvoker>) -> Option<Self> {
        let param_key = api.first_parameter()?.name.clone();
        let description = if api.description.is_empty() {
            api.name.clone()
        } else {
            api.description.clone()
        };
        Some(Self {
            name: transliterate_name(&api.name),
            description,
            param_key,
            api,
            invoker,
        })
    }

    pub fn param_key(&self) -> &str {
        &self.param_key
    }
}

#[async_trait]
impl Tool for ApiTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn origin_name(&self) -> &str {
        &self.api.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let param_description = self
            .api
            .first_parameter()
            .map(|p| p.description.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Value for {}", self.param_key));
        serde_json::json!({
            "type": "object",
            "properties": {
                self.param_key.clone(): {
                    "type": "string",
                    "description": param_description
                }
            },
            "required": [self.param_key]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let value = match arguments.get(&self.param_key) {
            Some(Value::Null) | None => {
                return Err(ToolError::InvalidArguments(format!(
                    "Missing '{}' argument",
                    self.param_key
                )));
            }
            Some(v) => v.clone(),
        };

        let mut input = serde_json::Map::new();
        input.insert(self.param_key.clone(), value);

        self.invoker
            .call(&self.api, &Value::Object(input))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

/// Build the tool registry for a multi-tool model statement.
///
/// Every API with at least one parameter becomes a tool. Transliterated
/// name collisions are not deduplicated; the registry keeps the later one.
pub fn build_tool_registry(catalog: &ApiCatalog, invoker: Arc<ApiInvoker>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for api in catalog.iter() {
        match ApiTool::new(api.clone(), invoker.clone()) {
            Some(tool) => {
                tracing::debug!(tool = %tool.name, origin = %api.name, "Registered API tool");
                registry.register(Box::new(tool));
            }
            None => tracing::debug!(api = %api.name, "Skipping API without parameters"),
        }
    }
    registry
}
