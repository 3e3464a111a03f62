//! Statement executors for API, data, and single-call model statements.

use serde_json::Value;
use splforge_core::catalog::ApiSpec;
use splforge_telemetry::SpanKind;
use tracing::warn;

use super::tool_loop;
use super::unit::UnitRun;
use super::{Interrupt, RunState};
use crate::chain::{retrieval_query, BoundStatement, ModelCall, StatementAction};
use crate::stream_event::{payload_type, Payload};

/// Run one statement and return the value for its output parameter.
pub(super) async fn execute(
    stmt: &BoundStatement,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
) -> Result<String, Interrupt> {
    match &stmt.action {
        StatementAction::Api { api, input, .. } => {
            let input = run.store.resolve_json(input);
            let span = run.meter.start(SpanKind::ApiCall, &api.name);
            let result = call_api(api, &input, run, unit).await;
            run.meter.finish(span, result.is_ok());
            result
        }
        StatementAction::Data { view, input, .. } => {
            let query = retrieval_query(&run.store.resolve_json(input));
            let retriever = run.collab.retriever.clone();
            let span = run.meter.start(SpanKind::Retrieval, view.knowledge_base());
            let result = retriever.retrieve(&query, view).await;
            run.meter.finish(span, result.is_ok());
            let text = result?;
            run.emit_output(unit, Payload::new(payload_type::DATA, text.as_str())).await?;
            Ok(text)
        }
        StatementAction::ToolModel(call) => single_call(call, run, unit).await,
        StatementAction::MagModel { call, tools } => tool_loop::run(call, tools, run, unit).await,
    }
}

/// Text results are forwarded piece by piece; binary results once, as a handle.
async fn call_api(
    api: &ApiSpec,
    input: &Value,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
) -> Result<String, Interrupt> {
    let invoker = run.collab.invoker.clone();
    let kind = api.return_value_type;
    let mut pieces = invoker.open(api, input).await?;

    let mut collected = String::new();
    while let Some(piece) = pieces.next_piece().await {
        let piece = piece?;
        if piece.is_empty() {
            continue;
        }
        if !kind.is_binary() {
            run.emit_output(unit, Payload::new(kind.as_str(), piece.as_str())).await?;
        }
        collected.push_str(&piece);
    }

    let result = invoker.finish(api, collected).await?;
    if kind.is_binary() && !result.is_empty() {
        run.emit_output(unit, Payload::new(kind.as_str(), result.as_str())).await?;
    }
    Ok(result)
}

/// Stream one model response, forwarding every delta as it arrives.
async fn single_call(
    call: &ModelCall,
    run: &mut RunState,
    unit: &mut UnitRun<'_>,
) -> Result<String, Interrupt> {
    let request = call.request(call.messages(&run.store));
    let turn = tool_loop::model_turn(request, run, unit).await?;
    if !turn.calls.is_empty() {
        warn!(calls = turn.calls.len(), "Ignoring tool calls from a model statement without tools");
    }
    Ok(turn.content)
}
