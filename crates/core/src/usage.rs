//! Usage accounting for one chain invocation.
//!
//! The executor reports exactly one `InvocationUsage` per invocation, after
//! execution ends, whether the invocation finished, timed out, or failed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::Usage;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    Completed,
    TimedOut,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationUsage {
    pub invocation_id: uuid::Uuid,
    pub outcome: InvocationOutcome,
    pub usage: Usage,
    pub model_calls: u32,
    pub api_calls: u32,
    pub retrievals: u32,
    pub elapsed_ms: u64,
}

impl InvocationUsage {
    pub fn new(invocation_id: uuid::Uuid) -> Self {
        Self {
            invocation_id,
            outcome: InvocationOutcome::Completed,
            usage: Usage::default(),
            model_calls: 0,
            api_calls: 0,
            retrievals: 0,
            elapsed_ms: 0,
        }
    }

    /// Fold one model call's token usage into the running total.
    pub fn add_model_usage(&mut self, usage: Usage) {
        self.model_calls += 1;
        self.usage.prompt_tokens += usage.prompt_tokens;
        self.usage.completion_tokens += usage.completion_tokens;
        self.usage.total_tokens += usage.total_tokens;
    }
}

/// Receives the usage report of each invocation.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, usage: &InvocationUsage);
}

/// Recorder that only logs.
pub struct LoggingRecorder;

#[async_trait]
impl UsageRecorder for LoggingRecorder {
    async fn record(&self, usage: &InvocationUsage) {
        tracing::info!(
            invocation_id = %usage.invocation_id,
            outcome = ?usage.outcome,
            total_tokens = usage.usage.total_tokens,
            model_calls = usage.model_calls,
            elapsed_ms = usage.elapsed_ms,
            "Invocation usage"
        );
    }
}
