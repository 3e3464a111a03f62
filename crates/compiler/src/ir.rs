//! The unbound chain descriptor: the compiler's output and the binder's input.
//!
//! ```json
//! {"global_params": [{"uuid": "...", "type": "string", "placeholder": "${Tone}$", ...}],
//!  "workflow": [{"name": "Instruction1", "type": "ToolModel", "input": "${UserRequest}$",
//!                "functions": {"statement_0": {"link_id": null, "input": ..., "output": "..."}}}]}
//! ```
//!
//! `functions` is a JSON object whose key order is the execution order.

use serde::{Deserialize, Serialize};
use splforge_core::{AgentKind, Parameter};

/// Tag of a statement (and of the unit it belongs to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    #[serde(rename = "API")]
    Api,
    Data,
    ToolModel,
    MagModel,
}

impl StatementKind {
    pub fn model_for(agent: AgentKind) -> Self {
        match agent {
            AgentKind::Tool => Self::ToolModel,
            AgentKind::Mag => Self::MagModel,
        }
    }

    pub fn is_model(self) -> bool {
        matches!(self, Self::ToolModel | Self::MagModel)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Data => "Data",
            Self::ToolModel => "ToolModel",
            Self::MagModel => "MagModel",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One statement before binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementDescriptor {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type")]
    pub kind: StatementKind,

    /// Catalog uuid for API and data statements
    #[serde(default)]
    pub link_id: Option<String>,

    /// Parsed input JSON (ref statements) or an input reference string (model statements)
    #[serde(default)]
    pub input: serde_json::Value,

    /// Bare name of the parameter the result is written to
    pub output: String,

    /// Further parameters that receive the same result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Serialized non-reference sections (model statements only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// One unit before binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: StatementKind,

    /// Reference to the parameter the unit reads, e.g. `${UserRequest}$`
    #[serde(default)]
    pub input: String,

    #[serde(with = "ordered_functions")]
    pub functions: Vec<(String, StatementDescriptor)>,
}

impl UnitDescriptor {
    pub fn statements(&self) -> impl Iterator<Item = &StatementDescriptor> {
        self.functions.iter().map(|(_, s)| s)
    }
}

/// The whole unbound chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    #[serde(default)]
    pub global_params: Vec<Parameter>,

    #[serde(default)]
    pub workflow: Vec<UnitDescriptor>,
}

impl ChainDescriptor {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Statement maps keep insertion order on both sides of the wire.
mod ordered_functions {
    use super::StatementDescriptor;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        functions: &[(String, StatementDescriptor)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(functions.len()))?;
        for (key, statement) in functions {
            map.serialize_entry(key, statement)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, StatementDescriptor)>, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Vec<(String, StatementDescriptor)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of statement descriptors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, StatementDescriptor>()? {
                    out.push(entry);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(name: &str, kind: StatementKind) -> StatementDescriptor {
        StatementDescriptor {
            name: name.into(),
            description: String::new(),
            kind,
            link_id: None,
            input: serde_json::json!("${UserRequest}$"),
            output: format!("{name}_Out"),
            aliases: Vec::new(),
            system_prompt: None,
        }
    }

    #[test]
    fn kinds_use_wire_names() {
        assert_eq!(serde_json::to_value(StatementKind::Api).unwrap(), "API");
        assert_eq!(serde_json::to_value(StatementKind::MagModel).unwrap(), "MagModel");
        assert_eq!(StatementKind::model_for(AgentKind::Mag), StatementKind::MagModel);
    }

    #[test]
    fn functions_keep_order_through_json() {
        // Keys deliberately out of lexical order.
        let unit = UnitDescriptor {
            name: "Instruction1".into(),
            kind: StatementKind::ToolModel,
            input: "${UserRequest}$".into(),
            functions: vec![
                ("statement_1".into(), statement("b", StatementKind::Data)),
                ("statement_0".into(), statement("a", StatementKind::ToolModel)),
            ],
        };
        let chain = ChainDescriptor {
            global_params: vec![],
            workflow: vec![unit],
        };
        let json = chain.to_json_pretty().unwrap();
        let parsed = ChainDescriptor::from_json(&json).unwrap();
        let keys: Vec<&str> = parsed.workflow[0].functions.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["statement_1", "statement_0"]);
        assert_eq!(parsed, chain);
    }
}
