//! Unit executor: runs a unit's statements in order and owns its events.

use chrono::{DateTime, Utc};
use splforge_memory::MemoryState;
use splforge_telemetry::{Metrics, SpanKind};
use tracing::{debug, warn};

use super::{statement, Cancelled, Interrupt, RunState};
use crate::chain::{BoundStatement, BoundUnit, StatementAction};
use crate::stream_event::{
    payload_type, ChainStreamEvent, CurrentRef, Payload, Timestamps, UnitEvent, UnitStatus,
};

/// Event state of the unit being executed.
pub(crate) struct UnitRun<'a> {
    unit: &'a BoundUnit,
    started: Option<DateTime<Utc>>,
    input: Payload,
    pub current_ref: Option<CurrentRef>,
    /// Output text accumulated across statements
    pub output: String,
}

impl<'a> UnitRun<'a> {
    fn new(unit: &'a BoundUnit, resolved_input: String) -> Self {
        Self {
            unit,
            started: None,
            input: Payload::text(resolved_input),
            current_ref: None,
            output: String::new(),
        }
    }

    pub fn event(&self, status: UnitStatus, output: Payload, metrics: Metrics) -> ChainStreamEvent {
        let now = Utc::now();
        ChainStreamEvent::Unit(UnitEvent {
            id: self.unit.id.clone(),
            name: self.unit.name.clone(),
            kind: self.unit.kind,
            status,
            timestamps: Timestamps {
                started: self.started,
                updated: now,
                finished: status.is_terminal().then_some(now),
            },
            metrics,
            input: self.input.clone(),
            output,
            current_ref: self.current_ref.clone(),
        })
    }
}

fn current_ref(statement: &BoundStatement) -> CurrentRef {
    let (ref_id, ref_name) = match &statement.action {
        StatementAction::Api { link_id, api, .. } => (link_id.clone(), api.name.clone()),
        StatementAction::Data { link_id, view, .. } => {
            (link_id.clone(), view.knowledge_base().to_string())
        }
        StatementAction::ToolModel(call) | StatementAction::MagModel { call, .. } => {
            (call.model.model.clone(), call.model.model.clone())
        }
    };
    CurrentRef {
        ref_id,
        ref_name,
        ref_type: statement.kind(),
    }
}

impl RunState {
    /// Send a `running` event. Text payloads also extend the unit's output.
    pub(crate) async fn emit_output(
        &mut self,
        unit: &mut UnitRun<'_>,
        payload: Payload,
    ) -> Result<(), Cancelled> {
        if payload.is_output_text() {
            unit.output.push_str(&payload.content);
            self.emitter.partial.push_str(&payload.content);
        }
        let event = unit.event(UnitStatus::Running, payload, self.meter.unit_metrics());
        self.emitter.send(event).await
    }

    /// Fold a finished unit's output into short memory.
    fn record_unit_output(&mut self, output: &str) {
        if self.memory.check_memory_state() == MemoryState::Overloading {
            self.memory.clear_short_memory();
        }
        let records = if output.trim().is_empty() {
            Vec::new()
        } else {
            vec![output.to_string()]
        };
        self.memory.update_short_memory(records, self.store.snapshot());
    }
}

/// Run one unit. `Ok(false)` means it failed and the chain should stop.
pub(crate) async fn run_unit(unit: &BoundUnit, run: &mut RunState) -> Result<bool, Cancelled> {
    run.meter.begin_unit();
    let span = run.meter.start(SpanKind::Unit, &unit.name);
    let mut state = UnitRun::new(unit, run.store.resolve(&unit.input));

    debug!(unit = %unit.name, kind = %unit.kind, statements = unit.statements.len(), "Unit pending");
    run.emitter
        .send(state.event(UnitStatus::Pending, Payload::default(), run.meter.unit_metrics()))
        .await?;
    state.started = Some(Utc::now());

    let mut failure = None;
    for stmt in &unit.statements {
        state.current_ref = Some(current_ref(stmt));
        debug!(unit = %unit.name, statement = %stmt.name, "Statement running");

        match statement::execute(stmt, run, &mut state).await {
            Ok(result) => {
                debug!(statement = %stmt.name, output = %stmt.output, len = result.len(), "Statement finished");
                for alias in &stmt.aliases {
                    run.store.set(alias, result.as_str());
                }
                run.store.set(&stmt.output, result);
            }
            Err(Interrupt::Cancelled) => {
                run.meter.finish(span, false);
                return Err(Cancelled);
            }
            Err(Interrupt::Failed(err)) => {
                warn!(unit = %unit.name, statement = %stmt.name, error = %err, "Statement failed");
                failure = Some(err);
                break;
            }
        }
    }

    run.meter.finish(span, failure.is_none());
    let metrics = run.meter.unit_metrics();
    let terminal = match failure {
        None => {
            run.record_unit_output(&state.output);
            run.completed += 1;
            debug!(unit = %unit.name, "Unit succeeded");
            state.event(UnitStatus::Success, Payload::text(state.output.clone()), metrics)
        }
        Some(err) => {
            run.failed_unit = Some(unit.name.clone());
            state.event(UnitStatus::Failed, Payload::new(payload_type::ERROR, err.to_string()), metrics)
        }
    };
    run.emitter.send(terminal).await?;
    Ok(run.failed_unit.is_none())
}
