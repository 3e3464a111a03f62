//! Chain-level streaming events.
//!
//! `ChainStreamEvent` is what an invocation's receiver yields, one JSON
//! object per event:
//! - `unit`: a unit changed state or produced output
//! - `truncated`: the invocation timed out; carries the partial text
//! - `done`: the invocation ended; carries the totals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splforge_compiler::StatementKind;
use splforge_telemetry::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl UnitStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub started: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
}

/// Kinds of content a unit event carries.
pub mod payload_type {
    /// Model or API text; part of the unit's output
    pub const TEXT: &str = "text";
    /// Retrieved context
    pub const DATA: &str = "data";
    /// Tool narration from the tool-calling loop
    pub const TOOL: &str = "tool";
    pub const JSON: &str = "json";
    pub const IMAGE: &str = "image";
    pub const AUDIO: &str = "audio";
    /// Failure message of a failed unit
    pub const ERROR: &str = "error";
}

/// The `input` / `output` block of a unit event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl Payload {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(payload_type::TEXT, content)
    }

    /// Whether the content belongs to the unit's textual output.
    pub fn is_output_text(&self) -> bool {
        self.kind == payload_type::TEXT || self.kind == payload_type::JSON
    }
}

/// The resource the unit is currently calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentRef {
    pub ref_id: String,
    pub ref_name: String,
    pub ref_type: StatementKind,
}

/// One state change or output increment of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEvent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StatementKind,
    pub status: UnitStatus,
    pub timestamps: Timestamps,
    pub metrics: Metrics,
    pub input: Payload,
    pub output: Payload,
    #[serde(rename = "currentRef", default, skip_serializing_if = "Option::is_none")]
    pub current_ref: Option<CurrentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChainStreamEvent {
    Unit(UnitEvent),

    /// The wall-clock budget ran out.
    Truncated { partial: String, execution_time: String },

    Done {
        metrics: Metrics,
        units_completed: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failed_unit: Option<String>,
    },
}

impl ChainStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Unit(_) => "unit",
            Self::Truncated { .. } => "truncated",
            Self::Done { .. } => "done",
        }
    }

    pub fn as_unit(&self) -> Option<&UnitEvent> {
        match self {
            Self::Unit(e) => Some(e),
            _ => None,
        }
    }
}
