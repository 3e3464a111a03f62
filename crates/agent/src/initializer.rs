//! Chain initializer: binds a compiled chain descriptor to live resources.
//!
//! API statements resolve against the API catalog, data statements against
//! the knowledge-base catalog, and model statements share one model config.
//! Multi-tool model statements additionally get the tool registry derived
//! from the API catalog. A statement that cannot be bound is dropped with a
//! warning; binding never fails as a whole.

use serde_json::Value;
use splforge_compiler::{ChainDescriptor, StatementDescriptor, StatementKind, UnitDescriptor};
use splforge_core::catalog::{ApiCatalog, KnowledgeBase, KnowledgeCatalog, ModelConfig};
use splforge_core::error::BindingError;
use splforge_core::tool::ToolRegistry;
use splforge_core::view::{DataView, GraphView, TextView};
use splforge_tools::{build_tool_registry, ApiInvoker};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::chain::{BoundChain, BoundStatement, BoundUnit, ModelCall, StatementAction};

/// Exactly one view per knowledge base: text when it has text blocks,
/// otherwise graph when it has graph collections.
pub fn build_view(kb: &KnowledgeBase) -> Option<DataView> {
    if !kb.text_blocks.is_empty() {
        return Some(DataView::Text(TextView {
            knowledge_base: kb.name.clone(),
            blocks: kb.text_blocks.clone(),
        }));
    }
    kb.graph
        .as_ref()
        .filter(|g| !g.is_empty())
        .map(|g| {
            DataView::Graph(GraphView {
                knowledge_base: kb.name.clone(),
                collections: g.clone(),
            })
        })
}

fn input_reference(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct ChainInitializer {
    apis: Arc<ApiCatalog>,
    knowledge: Arc<KnowledgeCatalog>,
    model: ModelConfig,
    invoker: Arc<ApiInvoker>,
    tools: OnceLock<Arc<ToolRegistry>>,
}

impl ChainInitializer {
    pub fn new(
        apis: Arc<ApiCatalog>,
        knowledge: Arc<KnowledgeCatalog>,
        model: ModelConfig,
        invoker: Arc<ApiInvoker>,
    ) -> Self {
        Self {
            apis,
            knowledge,
            model,
            invoker,
            tools: OnceLock::new(),
        }
    }

    /// The catalog-derived tool registry, built on first use.
    fn tools(&self) -> Arc<ToolRegistry> {
        self.tools
            .get_or_init(|| Arc::new(build_tool_registry(&self.apis, self.invoker.clone())))
            .clone()
    }

    /// Bind every unit of `descriptor` in workflow order.
    pub fn bind(&self, name: impl Into<String>, descriptor: &ChainDescriptor) -> BoundChain {
        let mut warnings = Vec::new();
        let units = descriptor
            .workflow
            .iter()
            .map(|unit| self.bind_unit(unit, &mut warnings))
            .collect();

        let chain = BoundChain {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            global_params: descriptor.global_params.clone(),
            units,
            warnings,
        };
        debug!(
            chain = %chain.name,
            units = chain.units.len(),
            params = chain.global_params.len(),
            dropped = chain.warnings.len(),
            "Chain bound"
        );
        chain
    }

    fn bind_unit(&self, unit: &UnitDescriptor, warnings: &mut Vec<BindingError>) -> BoundUnit {
        let statements = unit
            .statements()
            .filter_map(|s| match self.bind_statement(s) {
                Ok(bound) => Some(bound),
                Err(err) => {
                    warn!(unit = %unit.name, statement = %s.name, warning = %err, "Dropping statement");
                    warnings.push(err);
                    None
                }
            })
            .collect();

        BoundUnit {
            id: uuid::Uuid::new_v4().to_string(),
            name: unit.name.clone(),
            kind: unit.kind,
            input: unit.input.clone(),
            statements,
        }
    }

    fn bind_statement(&self, s: &StatementDescriptor) -> Result<BoundStatement, BindingError> {
        let action = match s.kind {
            StatementKind::Api => {
                let link_id = self.link_id(s)?;
                let api = self.apis.get(&link_id).ok_or_else(|| BindingError::UnknownApi {
                    statement: s.name.clone(),
                    link_id: link_id.clone(),
                })?;
                StatementAction::Api {
                    api: api.clone(),
                    input: s.input.clone(),
                    link_id,
                }
            }
            StatementKind::Data => {
                let link_id = self.link_id(s)?;
                let kb = self
                    .knowledge
                    .get(&link_id)
                    .ok_or_else(|| BindingError::UnknownKnowledgeBase {
                        statement: s.name.clone(),
                        link_id: link_id.clone(),
                    })?;
                let view = build_view(kb).ok_or_else(|| BindingError::EmptyKnowledgeBase {
                    statement: s.name.clone(),
                    link_id: link_id.clone(),
                })?;
                StatementAction::Data {
                    view,
                    input: s.input.clone(),
                    link_id,
                }
            }
            StatementKind::ToolModel => StatementAction::ToolModel(self.model_call(s)),
            StatementKind::MagModel => StatementAction::MagModel {
                call: self.model_call(s),
                tools: self.tools(),
            },
        };

        Ok(BoundStatement {
            name: s.name.clone(),
            description: s.description.clone(),
            output: s.output.clone(),
            aliases: s.aliases.clone(),
            action,
        })
    }

    fn link_id(&self, s: &StatementDescriptor) -> Result<String, BindingError> {
        s.link_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BindingError::MissingLinkId {
                statement: s.name.clone(),
            })
    }

    fn model_call(&self, s: &StatementDescriptor) -> ModelCall {
        ModelCall {
            model: self.model.clone(),
            system_prompt: s.system_prompt.clone().unwrap_or_default(),
            input: input_reference(&s.input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{model_config, test_invoker};
    use serde_json::json;
    use splforge_core::catalog::ApiSpec;
    use splforge_core::view::{Entity, GraphCollections, TextBlock};

    fn catalogs() -> (Arc<ApiCatalog>, Arc<KnowledgeCatalog>) {
        let apis: Vec<ApiSpec> = serde_json::from_value(json!([
            {"uuid": "api-1", "name": "Geo", "url": "https://geo", "parameters": [{"name": "q"}]},
            {"uuid": "api-2", "name": "Clock", "url": "https://clock"}
        ]))
        .unwrap();
        let kbs = vec![
            KnowledgeBase {
                uuid: "kb-text".into(),
                name: "Docs".into(),
                text_blocks: vec![TextBlock { text: "a".into(), ..Default::default() }],
                graph: Some(GraphCollections {
                    entities: vec![Entity { name: "x".into(), ..Default::default() }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            KnowledgeBase {
                uuid: "kb-graph".into(),
                name: "Graph".into(),
                graph: Some(GraphCollections {
                    entities: vec![Entity { name: "x".into(), ..Default::default() }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            KnowledgeBase {
                uuid: "kb-empty".into(),
                name: "Empty".into(),
                ..Default::default()
            },
        ];
        (Arc::new(ApiCatalog::new(apis)), Arc::new(KnowledgeCatalog::new(kbs)))
    }

    fn initializer() -> ChainInitializer {
        let (apis, kbs) = catalogs();
        ChainInitializer::new(apis, kbs, model_config(), test_invoker().0)
    }

    fn descriptor(statements: serde_json::Value) -> ChainDescriptor {
        serde_json::from_value(json!({
            "workflow": [{"name": "U1", "type": "MagModel", "input": "${UserRequest}$", "functions": statements}]
        }))
        .unwrap()
    }

    #[test]
    fn text_view_wins_over_graph() {
        let (_, kbs) = catalogs();
        assert!(matches!(build_view(kbs.get("kb-text").unwrap()), Some(DataView::Text(_))));
        assert!(matches!(build_view(kbs.get("kb-graph").unwrap()), Some(DataView::Graph(_))));
        assert!(build_view(kbs.get("kb-empty").unwrap()).is_none());
    }

    #[test]
    fn unresolved_statements_are_dropped_with_warnings() {
        let chain = initializer().bind(
            "demo",
            &descriptor(json!({
                "statement_0": {"name": "API:api-9", "type": "API", "link_id": "api-9", "input": {}, "output": "A"},
                "statement_1": {"name": "Data:kb-empty", "type": "Data", "link_id": "kb-empty", "input": "q", "output": "B"},
                "statement_2": {"name": "API", "type": "API", "input": {}, "output": "C"},
                "statement_3": {"name": "API:api-1", "type": "API", "link_id": "api-1", "input": {"q": "x"}, "output": "D"},
                "statement_4": {"name": "MagModel", "type": "MagModel", "input": "${UserRequest}$", "output": "E", "system_prompt": "be nice"}
            })),
        );

        let unit = &chain.units[0];
        let kinds: Vec<StatementKind> = unit.statements.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![StatementKind::Api, StatementKind::MagModel]);
        assert_eq!(chain.warnings.len(), 3);
        assert!(matches!(chain.warnings[0], BindingError::UnknownApi { .. }));
        assert!(matches!(chain.warnings[1], BindingError::EmptyKnowledgeBase { .. }));
        assert!(matches!(chain.warnings[2], BindingError::MissingLinkId { .. }));
    }

    #[test]
    fn mag_statements_get_parameterized_apis_as_tools() {
        let chain = initializer().bind(
            "demo",
            &descriptor(json!({
                "statement_0": {"name": "MagModel", "type": "MagModel", "input": "${UserRequest}$", "output": "E", "system_prompt": "sys"}
            })),
        );
        match &chain.units[0].statements[0].action {
            StatementAction::MagModel { call, tools } => {
                assert_eq!(tools.len(), 1);
                assert!(tools.get("Geo").is_some());
                assert_eq!(call.system_prompt, "sys");
                assert_eq!(call.input, "${UserRequest}$");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn workflow_order_and_params_are_kept() {
        let mut desc: ChainDescriptor = serde_json::from_value(json!({
            "global_params": [{"uuid": "p1", "placeholder": "${Tone}$", "value": "warm"}],
            "workflow": [
                {"name": "A", "type": "ToolModel", "functions": {}},
                {"name": "B", "type": "ToolModel", "functions": {}}
            ]
        }))
        .unwrap();
        desc.workflow.swap(0, 1);
        let chain = initializer().bind("demo", &desc);
        assert_eq!(chain.unit_names().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(chain.global_params[0].value, "warm");
        assert_ne!(chain.units[0].id, chain.units[1].id);
    }
}
