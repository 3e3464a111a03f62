//! Data model for statement spans, invocation traces, and event metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splforge_core::provider::Usage;
use std::time::Duration;
use uuid::Uuid;

// ── Metrics ───────────────────────────────────────────────────────────────

/// Token counts as they appear in stream events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn add(&mut self, usage: Usage) {
        self.input += u64::from(usage.prompt_tokens);
        self.output += u64::from(usage.completion_tokens);
        self.total += u64::from(usage.total_tokens.max(usage.prompt_tokens + usage.completion_tokens));
    }

    pub fn merge(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        let mut t = Self::default();
        t.add(usage);
        t
    }
}

/// The `metrics` block of a stream event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub token_usage: TokenUsage,
    /// Humanized, e.g. `"1.25s"`
    pub execution_time: String,
}

impl Metrics {
    pub fn new(token_usage: TokenUsage, elapsed: Duration) -> Self {
        Self {
            token_usage,
            execution_time: humanize_duration(elapsed),
        }
    }
}

/// Render a duration the way stream events show it.
///
/// Below one second: `"350ms"`. Below one minute: seconds with two decimals,
/// `"1.25s"`. Longer: `"2m 5s"`, and `"1h 0m 3s"` past an hour.
pub fn humanize_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1_000 {
        return format!("{ms}ms");
    }
    let secs = d.as_secs();
    if secs < 60 {
        return format!("{:.2}s", d.as_secs_f64());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else {
        format!("{m}m {s}s")
    }
}

// ── Span ──────────────────────────────────────────────────────────────────

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// One unit, from its pending event to its terminal event.
    Unit,
    /// An API statement or API-backed tool call.
    ApiCall,
    /// A data statement's retriever call.
    Retrieval,
    /// One model request (each tool-loop round is its own span).
    ModelCall,
    /// One tool execution inside the tool loop.
    ToolCall,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::ApiCall => write!(f, "api_call"),
            Self::Retrieval => write!(f, "retrieval"),
            Self::ModelCall => write!(f, "model_call"),
            Self::ToolCall => write!(f, "tool_call"),
        }
    }
}

/// A single traced piece of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    pub kind: SpanKind,
    /// Unit or statement name, tool origin name, or model name
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub tokens: TokenUsage,
    pub success: Option<bool>,
}

impl Span {
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            tokens: TokenUsage::default(),
            success: None,
        }
    }

    /// Mark the span as ended after `elapsed`.
    ///
    /// The duration is passed in rather than derived from wall-clock
    /// timestamps so it follows the runtime clock.
    pub fn end(&mut self, success: bool, elapsed: Duration) {
        self.ended_at = Some(Utc::now());
        self.duration_ms = Some(elapsed.as_millis() as u64);
        self.success = Some(success);
    }

    pub fn record_tokens(&mut self, usage: Usage) {
        self.tokens.add(usage);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans of one chain invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub invocation_id: Uuid,
    pub spans: Vec<Span>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trace {
    pub fn new(invocation_id: Uuid) -> Self {
        Self {
            invocation_id,
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_span(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn count(&self, kind: SpanKind) -> usize {
        self.spans.iter().filter(|s| s.kind == kind).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.success == Some(false))
    }
}
