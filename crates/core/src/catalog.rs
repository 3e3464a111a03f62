//! Resource catalogs consulted when a compiled chain is bound.
//!
//! The compiler only knows abstract link ids. The initializer resolves them
//! against these catalogs: APIs by uuid, knowledge bases by uuid, and one
//! shared model configuration for every model-call statement.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::transport::HttpMethod;
use crate::view::{GraphCollections, TextBlock};

/// One step of a parse path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Key(k) => write!(f, ".{k}"),
        }
    }
}

/// Walk `path` into `value`. `None` when any step does not match.
pub fn apply_parse_path<'a>(value: &'a serde_json::Value, path: &[PathSegment]) -> Option<&'a serde_json::Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        PathSegment::Key(key) => current.get(key.as_str()),
        PathSegment::Index(i) => current.get(*i),
    })
}

/// What an API returns once its parse path has been applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    #[default]
    Text,
    Json,
    Image,
    Audio,
}

impl ReturnKind {
    /// Binary kinds are persisted and replaced by a storage handle.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Image | Self::Audio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// A declared API parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParameter {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// An external API an SPL document can reference with `~refAPI{uuid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub uuid: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// JSON object the resolved input is merged over (POST only)
    #[serde(default = "empty_object")]
    pub body: serde_json::Value,

    /// Declared parameters, in declaration order
    #[serde(default)]
    pub parameters: Vec<ApiParameter>,

    /// Keys/indices that locate the field of interest in each response
    #[serde(default)]
    pub parse_path: Vec<PathSegment>,

    #[serde(default)]
    pub return_value_type: ReturnKind,

    /// Consume the response as an SSE / line-delimited stream
    #[serde(default)]
    pub stream: bool,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ApiSpec {
    /// The first declared parameter key, used as the single tool argument.
    pub fn first_parameter(&self) -> Option<&ApiParameter> {
        self.parameters.first()
    }
}

/// APIs keyed by uuid.
#[derive(Debug, Clone, Default)]
pub struct ApiCatalog {
    apis: HashMap<String, ApiSpec>,
    order: Vec<String>,
}

impl ApiCatalog {
    pub fn new(apis: impl IntoIterator<Item = ApiSpec>) -> Self {
        let mut catalog = Self::default();
        for api in apis {
            catalog.insert(api);
        }
        catalog
    }

    pub fn insert(&mut self, api: ApiSpec) {
        if !self.apis.contains_key(&api.uuid) {
            self.order.push(api.uuid.clone());
        }
        self.apis.insert(api.uuid.clone(), api);
    }

    pub fn get(&self, uuid: &str) -> Option<&ApiSpec> {
        self.apis.get(uuid)
    }

    /// All APIs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ApiSpec> {
        self.order.iter().filter_map(|id| self.apis.get(id))
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

/// A retrieval corpus an SPL document can reference with `~refData{uuid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub uuid: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Text blocks with precomputed embeddings
    #[serde(default)]
    pub text_blocks: Vec<TextBlock>,

    /// Graph collections (entities, relationships, community reports)
    #[serde(default)]
    pub graph: Option<GraphCollections>,
}

/// Knowledge bases keyed by uuid.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeCatalog {
    bases: HashMap<String, KnowledgeBase>,
}

impl KnowledgeCatalog {
    pub fn new(bases: impl IntoIterator<Item = KnowledgeBase>) -> Self {
        Self {
            bases: bases.into_iter().map(|kb| (kb.uuid.clone(), kb)).collect(),
        }
    }

    pub fn get(&self, uuid: &str) -> Option<&KnowledgeBase> {
        self.bases.get(uuid)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

/// Which model statement kind an SPL document's instructions compile to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Single streamed model call, no tools
    #[default]
    Tool,
    /// Model call with the API catalog exposed as tools
    Mag,
}

/// The model configuration shared by every model-call statement of a chain.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
