//! The bound, executable chain.
//!
//! Binding replaces every link id with the resource it names, so execution
//! never consults a catalog. Statements are a closed enum; executors match on
//! it exhaustively.

use serde_json::Value;
use splforge_compiler::StatementKind;
use splforge_core::catalog::{ApiSpec, ModelConfig};
use splforge_core::error::BindingError;
use splforge_core::message::Message;
use splforge_core::provider::ProviderRequest;
use splforge_core::tool::ToolRegistry;
use splforge_core::view::DataView;
use splforge_core::{Parameter, ParameterStore};
use std::sync::Arc;

/// A chain ready to execute: built once per invocation, consumed once.
#[derive(Debug)]
pub struct BoundChain {
    pub id: String,
    pub name: String,
    pub global_params: Vec<Parameter>,
    pub units: Vec<BoundUnit>,
    /// Statements dropped while binding
    pub warnings: Vec<BindingError>,
}

impl BoundChain {
    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.name.as_str())
    }
}

#[derive(Debug)]
pub struct BoundUnit {
    pub id: String,
    pub name: String,
    pub kind: StatementKind,
    /// Reference the unit reads, e.g. `${UserRequest}$`
    pub input: String,
    pub statements: Vec<BoundStatement>,
}

#[derive(Debug)]
pub struct BoundStatement {
    pub name: String,
    pub description: String,
    /// Bare name of the parameter the result is written to
    pub output: String,
    /// Further parameters that receive the same result
    pub aliases: Vec<String>,
    pub action: StatementAction,
}

impl BoundStatement {
    pub fn kind(&self) -> StatementKind {
        match &self.action {
            StatementAction::Api { .. } => StatementKind::Api,
            StatementAction::Data { .. } => StatementKind::Data,
            StatementAction::ToolModel(_) => StatementKind::ToolModel,
            StatementAction::MagModel { .. } => StatementKind::MagModel,
        }
    }
}

/// What a statement does when it runs.
pub enum StatementAction {
    Api {
        link_id: String,
        api: ApiSpec,
        input: Value,
    },
    Data {
        link_id: String,
        view: DataView,
        input: Value,
    },
    ToolModel(ModelCall),
    MagModel {
        call: ModelCall,
        tools: Arc<ToolRegistry>,
    },
}

impl std::fmt::Debug for StatementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api { link_id, api, .. } => f
                .debug_struct("Api")
                .field("link_id", link_id)
                .field("api", &api.name)
                .finish(),
            Self::Data { link_id, view, .. } => f
                .debug_struct("Data")
                .field("link_id", link_id)
                .field("view", &view.kind())
                .finish(),
            Self::ToolModel(call) => f.debug_tuple("ToolModel").field(call).finish(),
            Self::MagModel { call, tools } => f
                .debug_struct("MagModel")
                .field("call", call)
                .field("tools", &tools.len())
                .finish(),
        }
    }
}

/// A model request template: system prompt plus the reference it reads.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub model: ModelConfig,
    pub system_prompt: String,
    /// Usually a single reference such as `${UserRequest}$`
    pub input: String,
}

impl ModelCall {
    /// The two-message prompt with every known reference substituted.
    pub fn messages(&self, store: &ParameterStore) -> Vec<Message> {
        vec![
            Message::system(store.resolve(&self.system_prompt)),
            Message::user(store.resolve(&self.input)),
        ]
    }

    pub fn request(&self, messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: self.model.model.clone(),
            messages,
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            tools: Vec::new(),
            stream: true,
        }
    }
}

/// The text a data statement sends to the retriever.
///
/// A string input is used as is; an object contributes its `query` field,
/// or else its string values joined by newlines.
pub fn retrieval_query(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("query").and_then(Value::as_str) {
            Some(q) => q.to_string(),
            None => map
                .values()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ModelCall {
        ModelCall {
            model: ModelConfig {
                base_url: "http://localhost".into(),
                api_key: None,
                model: "m".into(),
                temperature: 0.2,
                max_tokens: Some(64),
            },
            system_prompt: "Use ${Facts}$ and keep ${Unknown}$".into(),
            input: "${UserRequest}$".into(),
        }
    }

    #[test]
    fn messages_resolve_known_references() {
        let mut store = ParameterStore::new();
        store.set("Facts", "Paris is in France");
        store.set("UserRequest", "where is Paris?");

        let messages = call().messages(&store);
        assert_eq!(messages[0].content, "Use Paris is in France and keep ${Unknown}$");
        assert_eq!(messages[1].content, "where is Paris?");
    }

    #[test]
    fn request_streams_with_model_settings() {
        let request = call().request(Vec::new());
        assert!(request.stream);
        assert_eq!(request.model, "m");
        assert_eq!(request.max_tokens, Some(64));
        assert!(request.tools.is_empty());
    }

    #[test]
    fn retrieval_query_shapes() {
        assert_eq!(retrieval_query(&json!("plain")), "plain");
        assert_eq!(retrieval_query(&json!({"query": "q", "k": "v"})), "q");
        assert_eq!(retrieval_query(&json!({"a": "x", "n": 1})), "x");
        assert_eq!(retrieval_query(&json!(3)), "3");
    }
}
