//! Data views: the resolved retrieval corpus bound to a data statement.
//!
//! A view is either text or graph, never both. The enum makes the union
//! strict; retrievers match on it.

use serde::{Deserialize, Serialize};

/// A text block with its precomputed embedding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,

    #[serde(default)]
    pub embedding: Vec<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityReport {
    #[serde(default)]
    pub title: String,

    pub summary: String,

    #[serde(default)]
    pub rank: f32,
}

/// The graph collections a knowledge base may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphCollections {
    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub community_reports: Vec<CommunityReport>,
}

impl GraphCollections {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty() && self.community_reports.is_empty()
    }
}

/// Ordered text blocks of one knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextView {
    pub knowledge_base: String,
    pub blocks: Vec<TextBlock>,
}

/// Graph collections of one knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub knowledge_base: String,
    pub collections: GraphCollections,
}

/// A retrieval corpus: text or graph, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataView {
    Text(TextView),
    Graph(GraphView),
}

impl DataView {
    /// Name of the knowledge base this view was built from.
    pub fn knowledge_base(&self) -> &str {
        match self {
            Self::Text(v) => &v.knowledge_base,
            Self::Graph(v) => &v.knowledge_base,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Graph(_) => "graph",
        }
    }
}
