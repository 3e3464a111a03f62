//! Per-invocation meter: collects spans and keeps unit and chain totals.
//!
//! One meter lives for one chain invocation and is owned by the executor, so
//! it needs no locking. Elapsed times come from `tokio::time::Instant` and
//! follow the runtime clock.

use splforge_core::provider::Usage;
use splforge_core::usage::{InvocationOutcome, InvocationUsage};
use tokio::time::Instant;
use uuid::Uuid;

use crate::model::{Metrics, Span, SpanKind, TokenUsage, Trace};

/// A span that has started but not ended.
#[derive(Debug)]
pub struct OpenSpan {
    span: Span,
    started: Instant,
}

impl OpenSpan {
    pub fn id(&self) -> &str {
        &self.span.id
    }

    pub fn record_tokens(&mut self, usage: Usage) {
        self.span.record_tokens(usage);
    }
}

#[derive(Debug)]
pub struct InvocationMeter {
    trace: Trace,
    started: Instant,
    unit_started: Instant,
    unit_tokens: TokenUsage,
    total_tokens: TokenUsage,
}

impl InvocationMeter {
    pub fn new(invocation_id: Uuid) -> Self {
        let now = Instant::now();
        Self {
            trace: Trace::new(invocation_id),
            started: now,
            unit_started: now,
            unit_tokens: TokenUsage::default(),
            total_tokens: TokenUsage::default(),
        }
    }

    pub fn invocation_id(&self) -> Uuid {
        self.trace.invocation_id
    }

    /// Reset the unit counters; call before each unit starts.
    pub fn begin_unit(&mut self) {
        self.unit_started = Instant::now();
        self.unit_tokens = TokenUsage::default();
    }

    pub fn start(&self, kind: SpanKind, label: impl Into<String>) -> OpenSpan {
        OpenSpan {
            span: Span::new(kind, label),
            started: Instant::now(),
        }
    }

    /// End `open` and fold its tokens into the unit and chain totals.
    pub fn finish(&mut self, open: OpenSpan, success: bool) {
        let OpenSpan { mut span, started } = open;
        span.end(success, started.elapsed());
        self.unit_tokens.merge(span.tokens);
        self.total_tokens.merge(span.tokens);
        tracing::debug!(
            span = %span.kind,
            label = %span.label,
            success,
            duration_ms = span.duration_ms.unwrap_or(0),
            tokens = span.tokens.total,
            "Span finished"
        );
        self.trace.add_span(span);
    }

    /// Cumulative metrics of the current unit.
    pub fn unit_metrics(&self) -> Metrics {
        Metrics::new(self.unit_tokens, self.unit_started.elapsed())
    }

    /// Cumulative metrics of the whole invocation.
    pub fn total_metrics(&self) -> Metrics {
        Metrics::new(self.total_tokens, self.started.elapsed())
    }

    pub fn total_tokens(&self) -> TokenUsage {
        self.total_tokens
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Close the trace and summarize it for the usage recorder.
    pub fn report(&mut self, outcome: InvocationOutcome) -> InvocationUsage {
        self.trace.end();
        let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX);
        let count = |kind| clamp(self.trace.count(kind) as u64);

        let mut usage = InvocationUsage::new(self.trace.invocation_id);
        usage.outcome = outcome;
        usage.usage = Usage {
            prompt_tokens: clamp(self.total_tokens.input),
            completion_tokens: clamp(self.total_tokens.output),
            total_tokens: clamp(self.total_tokens.total),
        };
        usage.model_calls = count(SpanKind::ModelCall);
        usage.api_calls = count(SpanKind::ApiCall) + count(SpanKind::ToolCall);
        usage.retrievals = count(SpanKind::Retrieval);
        usage.elapsed_ms = self.elapsed_ms();
        usage
    }
}
