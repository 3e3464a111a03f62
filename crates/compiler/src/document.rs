//! The SPL document model as authored: ordered sections of typed subsections.

use serde::{Deserialize, Serialize};
use splforge_core::AgentKind;

/// A whole SPL document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplDocument {
    #[serde(default)]
    pub agent_type: AgentKind,

    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentShape {
    Full(SplDocument),
    Sections(Vec<Section>),
}

impl SplDocument {
    /// Parse a document, accepting either the full object or a bare section array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str::<DocumentShape>(json)? {
            DocumentShape::Full(doc) => doc,
            DocumentShape::Sections(sections) => Self {
                agent_type: AgentKind::default(),
                sections,
            },
        })
    }

    /// Every subsection line of the document, in document order.
    pub fn all_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.sections
            .iter()
            .flat_map(|s| s.section.iter())
            .flat_map(|sub| sub.lines())
    }
}

/// A top-level section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "sectionType")]
    pub section_type: String,

    #[serde(default)]
    pub section: Vec<SubSection>,
}

/// Recognized section kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Persona,
    Audience,
    Context,
    ContextControl,
    Instruction,
    Other(String),
}

impl SectionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Persona" => Self::Persona,
            "Audience" => Self::Audience,
            "Context" => Self::Context,
            "ContextControl" => Self::ContextControl,
            "Instruction" => Self::Instruction,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        SectionKind::parse(&self.section_type)
    }

    /// Lines of the first subsection with the given type, if present.
    pub fn subsection(&self, sub_type: &str) -> Option<Vec<String>> {
        self.section
            .iter()
            .find(|s| s.sub_section_type == sub_type)
            .map(SubSection::lines)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSection {
    #[serde(rename = "subSectionType")]
    pub sub_section_type: String,

    /// A string or an array; anything else is rendered as JSON text
    #[serde(default)]
    pub content: serde_json::Value,
}

impl SubSection {
    pub fn lines(&self) -> Vec<String> {
        use serde_json::Value;
        match &self.content {
            Value::Null => Vec::new(),
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            other => vec![other.to_string()],
        }
    }
}
