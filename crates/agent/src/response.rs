//! Response formatter: turns raw chain events into client envelopes.
//!
//! Every envelope carries the status of *every* unit, so a client can render
//! the whole chain from any single message. Running totals accumulate across
//! the invocation; `progress` and `suggestion` envelopes sit outside the
//! unit loop.

use serde::{Deserialize, Serialize};
use splforge_core::catalog::ModelConfig;
use splforge_core::error::ProviderError;
use splforge_core::message::Message;
use splforge_core::provider::{Provider, ProviderRequest};
use splforge_telemetry::{humanize_duration, Metrics, TokenUsage};
use std::time::Instant;

use crate::chain::BoundChain;
use crate::stream_event::{ChainStreamEvent, UnitEvent, UnitStatus};

pub const PROGRESS_EVENT: &str = "progress";
pub const SUGGESTION_EVENT: &str = "suggestion";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub name: String,
    pub status: UnitStatus,
}

/// One message to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// `unit`, `truncated`, `done`, `progress`, or `suggestion`
    pub event: String,
    pub chain: ChainRef,
    pub units: Vec<UnitState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<UnitEvent>,
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

pub struct ResponseFormatter {
    chain: ChainRef,
    /// `(unit id, state)` in workflow order
    units: Vec<(String, UnitState)>,
    /// Tokens of units that already reached a terminal state
    settled: TokenUsage,
    /// Tokens of the unit currently running
    in_flight: TokenUsage,
    started: Instant,
}

impl ResponseFormatter {
    pub fn new(chain: &BoundChain) -> Self {
        Self {
            chain: ChainRef {
                id: chain.id.clone(),
                name: chain.name.clone(),
            },
            units: chain
                .units
                .iter()
                .map(|u| {
                    (
                        u.id.clone(),
                        UnitState {
                            name: u.name.clone(),
                            status: UnitStatus::Pending,
                        },
                    )
                })
                .collect(),
            settled: TokenUsage::default(),
            in_flight: TokenUsage::default(),
            started: Instant::now(),
        }
    }

    pub fn format(&mut self, event: &ChainStreamEvent) -> ResponseEnvelope {
        match event {
            ChainStreamEvent::Unit(unit) => {
                if let Some((_, state)) = self.units.iter_mut().find(|(id, _)| *id == unit.id) {
                    state.status = unit.status;
                }
                if unit.status.is_terminal() {
                    self.settled.merge(unit.metrics.token_usage);
                    self.in_flight = TokenUsage::default();
                } else {
                    self.in_flight = unit.metrics.token_usage;
                }
                let metrics = self.totals();
                self.envelope(event.event_type(), Some(unit.clone()), metrics, None)
            }
            ChainStreamEvent::Truncated {
                partial,
                execution_time,
            } => {
                let metrics = Metrics {
                    token_usage: self.token_totals(),
                    execution_time: execution_time.clone(),
                };
                self.envelope(event.event_type(), None, metrics, Some(partial.clone()))
            }
            ChainStreamEvent::Done {
                metrics,
                failed_unit,
                ..
            } => {
                let message = failed_unit.as_ref().map(|u| format!("Unit {u} failed"));
                self.envelope(event.event_type(), None, metrics.clone(), message)
            }
        }
    }

    /// A status line outside the unit loop, e.g. while files are ingested.
    pub fn progress(&self, text: impl Into<String>) -> ResponseEnvelope {
        self.envelope(PROGRESS_EVENT, None, self.totals(), Some(text.into()))
    }

    pub fn suggestion(&self, suggestions: Vec<String>) -> ResponseEnvelope {
        let mut envelope = self.envelope(SUGGESTION_EVENT, None, self.totals(), None);
        envelope.suggestions = suggestions;
        envelope
    }

    fn token_totals(&self) -> TokenUsage {
        let mut total = self.settled;
        total.merge(self.in_flight);
        total
    }

    fn totals(&self) -> Metrics {
        Metrics {
            token_usage: self.token_totals(),
            execution_time: humanize_duration(self.started.elapsed()),
        }
    }

    fn envelope(
        &self,
        event: &str,
        current: Option<UnitEvent>,
        metrics: Metrics,
        message: Option<String>,
    ) -> ResponseEnvelope {
        ResponseEnvelope {
            event: event.to_string(),
            chain: self.chain.clone(),
            units: self.units.iter().map(|(_, s)| s.clone()).collect(),
            current,
            metrics,
            message,
            suggestions: Vec::new(),
        }
    }
}

/// Ask the model for up to `n` follow-up questions about `transcript`.
pub async fn generate_suggestions(
    provider: &dyn Provider,
    model: &ModelConfig,
    transcript: &str,
    n: usize,
) -> Result<Vec<String>, ProviderError> {
    if n == 0 || transcript.trim().is_empty() {
        return Ok(Vec::new());
    }

    let prompt = format!(
        "You suggest follow-up questions a user might ask next.\n\n\
        Conversation:\n{transcript}\n\n\
        Respond with a JSON array of at most {n} short questions and nothing else."
    );
    let request = ProviderRequest {
        model: model.model.clone(),
        messages: vec![Message::system(prompt)],
        temperature: model.temperature,
        max_tokens: model.max_tokens,
        tools: Vec::new(),
        stream: false,
    };

    let response = provider.complete(request).await?;
    Ok(parse_suggestions(&response.message.content, n))
}

/// Read suggestions from model output: a JSON array (optionally fenced), or
/// else one suggestion per line with list markers removed.
pub fn parse_suggestions(raw: &str, n: usize) -> Vec<String> {
    let body = strip_fence(raw.trim());

    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Ok(list) = serde_json::from_str::<Vec<String>>(&body[start..=end]) {
                return list
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .take(n)
                    .collect();
            }
        }
    }

    body.lines()
        .map(strip_list_marker)
        .map(|line| line.trim_matches(|c| c == '"' || c == ',').trim())
        .filter(|line| !line.is_empty() && *line != "[" && *line != "]")
        .map(str::to_string)
        .take(n)
        .collect()
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return rest.trim_start();
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    line
}
