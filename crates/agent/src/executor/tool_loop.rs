//! The tool-calling loop of multi-tool model statements.
//!
//! ```text
//! AwaitingModel ──finish=tool_calls──▶ AwaitingToolResults ──▶ AwaitingModel
//!       │
//!       └──finish=stop / length / content_filter / ceiling──▶ Done
//! ```
//!
//! Content deltas are forwarded as they arrive. Tool-call deltas are
//! accumulated per stream index until the turn ends, then every call is
//! dispatched and its result appended as a `tool` message. Bad calls become
//! error text in that message; they never abort the loop.

use serde_json::Value;
use splforge_core::message::{Message, MessageToolCall};
use splforge_core::provider::{FinishReason, ProviderRequest, ToolCallDelta};
use splforge_core::tool::ToolRegistry;
use splforge_telemetry::{OpenSpan, SpanKind};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::unit::UnitRun;
use super::{Interrupt, RunState};
use crate::chain::ModelCall;
use crate::stream_event::{payload_type, Payload};

/// A tool call as assembled from stream deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingCall {
    pub id: String,
    pub name: String,
    /// The raw JSON argument string
    pub arguments: String,
}

impl PendingCall {
    /// Empty arguments count as `{}`.
    pub fn parse_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }

    fn to_message_call(&self) -> MessageToolCall {
        MessageToolCall {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Collects tool-call fragments keyed by their stream index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PendingCall>,
}

impl ToolCallAccumulator {
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let call = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = delta.name.as_deref().filter(|n| !n.is_empty()) {
            call.name = name.to_string();
        }
        if let Some(fragment) = &delta.arguments {
            call.arguments.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// The accumulated calls in index order. Calls that never got an id get
    /// `call_<index>`.
    pub fn finish(self) -> Vec<PendingCall> {
        self.calls
            .into_iter()
            .map(|(index, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{index}");
                }
                call
            })
            .collect()
    }
}

/// One streamed model response.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ModelTurn {
    pub content: String,
    pub calls: Vec<PendingCall>,
    pub finish: FinishReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    AwaitingToolResults(Vec<PendingCall>),
    Done,
}

impl LoopState {
    /// The state after a model turn. Appends the assistant tool request to
    /// `messages` when the turn asks for tools.
    pub(super) fn after_turn(turn: ModelTurn, messages: &mut Vec<Message>) -> Self {
        let ModelTurn {
            content,
            calls,
            finish,
        } = turn;
        match finish {
            FinishReason::ToolCalls if !calls.is_empty() => {
                let requested = calls.iter().map(PendingCall::to_message_call).collect();
                messages.push(Message::assistant_tool_calls(content, requested));
                Self::AwaitingToolResults(calls)
            }
            FinishReason::Stop => Self::Done,
            other => {
                warn!(finish = ?other, calls = calls.len(), "Model turn ended the tool loop");
                Self::Done
            }
        }
    }
}

/// Stream one model request. The stream's end without a finish reason
/// counts as `stop`, or `tool_calls` when calls accumulated.
pub(super) async fn model_turn(
    request: ProviderRequest,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
) -> Result<ModelTurn, Interrupt> {
    let mut span = run.meter.start(SpanKind::ModelCall, request.model.as_str());
    let result = stream_turn(request, run, unit, &mut span).await;
    run.meter.finish(span, result.is_ok());
    result
}

async fn stream_turn(
    request: ProviderRequest,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
    span: &mut OpenSpan,
) -> Result<ModelTurn, Interrupt> {
    let provider = run.collab.provider.clone();
    let mut rx = provider.stream(request).await?;

    let mut content = String::new();
    let mut calls = ToolCallAccumulator::default();
    let mut finish = None;

    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;
        if let Some(usage) = chunk.usage {
            span.record_tokens(usage);
        }
        for delta in &chunk.tool_calls {
            calls.push(delta);
        }
        if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
            content.push_str(&text);
            run.emit_output(unit, Payload::text(text)).await?;
        }
        if let Some(reason) = chunk.finish_reason {
            finish = Some(reason);
        }
    }

    let calls = calls.finish();
    let finish = finish.unwrap_or(if calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    });
    Ok(ModelTurn {
        content,
        calls,
        finish,
    })
}

/// Execute one requested call; the text goes back to the model.
async fn dispatch(
    pending: &PendingCall,
    tools: &ToolRegistry,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
) -> Result<String, Interrupt> {
    let Some(tool) = tools.get(&pending.name) else {
        warn!(tool = %pending.name, "Model requested an unknown tool");
        return Ok(format!("Error: unknown tool `{}`", pending.name));
    };
    let arguments = match pending.parse_arguments() {
        Ok(arguments) => arguments,
        Err(e) => {
            warn!(tool = %pending.name, error = %e, "Tool arguments are not valid JSON");
            return Ok(format!("Error: invalid arguments for `{}`: {e}", pending.name));
        }
    };

    run.emit_output(
        unit,
        Payload::new(payload_type::TOOL, format!("Calling {}\n", tool.origin_name())),
    )
    .await?;

    let span = run.meter.start(SpanKind::ToolCall, tool.origin_name());
    let result = tool.execute(arguments).await;
    run.meter.finish(span, result.is_ok());

    Ok(match result {
        Ok(output) => output,
        Err(e) => {
            warn!(tool = %pending.name, error = %e, "Tool execution failed");
            format!("Error: {e}")
        }
    })
}

/// Run the loop to completion and return all content the model produced.
pub(super) async fn run(
    call: &ModelCall,
    tools: &ToolRegistry,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
) -> Result<String, Interrupt> {
    let definitions = tools.definitions();
    let mut messages = call.messages(&run.store);
    let mut output = String::new();
    let mut rounds = 0;
    let mut state = LoopState::AwaitingModel;

    loop {
        state = match state {
            LoopState::AwaitingModel => {
                if rounds >= run.settings.max_tool_iterations {
                    warn!(rounds, "Tool iteration ceiling reached, ending loop");
                    break;
                }
                rounds += 1;
                let mut request = call.request(messages.clone());
                request.tools = definitions.clone();
                let turn = model_turn(request, run, unit).await?;
                output.push_str(&turn.content);
                LoopState::after_turn(turn, &mut messages)
            }
            LoopState::AwaitingToolResults(calls) => {
                debug!(calls = calls.len(), round = rounds, "Dispatching tool calls");
                for pending in &calls {
                    let result = dispatch(pending, tools, run, unit).await?;
                    messages.push(Message::tool_result(pending.id.as_str(), result));
                }
                LoopState::AwaitingModel
            }
            LoopState::Done => break,
        };
    }

    Ok(output)
}
