//! Chain executor: runs a bound chain as one streaming invocation.
//!
//! Units run strictly in workflow order and statements strictly in list
//! order; results flow between them only through the per-invocation
//! [`ParameterStore`]. Events go out through a bounded channel as soon as
//! they are produced.
//!
//! Three things end an invocation early:
//! - a unit fails: it emits its `failed` event and no later unit starts;
//! - the wall-clock budget runs out: a `truncated` event carries the
//!   partial text produced so far;
//! - the receiver is dropped: execution stops at the next suspension point
//!   and in-flight streams are dropped with it.
//!
//! The usage recorder runs once after any of these, and after a normal end.

mod statement;
mod tool_loop;
mod unit;

use splforge_compiler::decomposer::DEFAULT_INPUT;
use splforge_config::EngineConfig;
use splforge_core::error::{BlobError, ProviderError, RetrievalError, TransportError};
use splforge_core::usage::{InvocationOutcome, InvocationUsage, UsageRecorder};
use splforge_core::{Error, ParameterStore, Provider, Retriever};
use splforge_memory::{LongMemory, MemoryManager, ShortMemory, DEFAULT_MEMORY_CAP};
use splforge_telemetry::{InvocationMeter, Metrics};
use splforge_tools::ApiInvoker;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chain::BoundChain;
use crate::stream_event::ChainStreamEvent;

pub use tool_loop::{LoopState, PendingCall, ToolCallAccumulator};

/// Reserved parameter holding the short-memory transcript.
pub const CHAT_HISTORY: &str = "ChatHistory";
/// Reserved parameter holding the long-memory preference.
pub const PREFERENCE: &str = "Preference";

/// The external services statements call.
pub struct Collaborators {
    pub provider: Arc<dyn Provider>,
    pub retriever: Arc<dyn Retriever>,
    pub invoker: Arc<ApiInvoker>,
    pub recorder: Arc<dyn UsageRecorder>,
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub memory_cap: usize,
    /// Wall-clock budget for the whole invocation
    pub timeout: Duration,
    /// Model rounds a tool-calling loop may take
    pub max_tool_iterations: usize,
    pub event_buffer: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            memory_cap: DEFAULT_MEMORY_CAP,
            timeout: Duration::from_secs(120),
            max_tool_iterations: 8,
            event_buffer: 64,
        }
    }
}

impl ExecutorSettings {
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self {
            memory_cap: engine.memory_cap,
            timeout: Duration::from_millis(engine.invocation_timeout_ms),
            max_tool_iterations: engine.max_tool_iterations,
            ..Self::default()
        }
    }
}

/// What the caller hands in at invocation start.
#[derive(Debug, Clone, Default)]
pub struct InvocationInput {
    pub query: String,
    pub short_memory: ShortMemory,
    pub long_memory: LongMemory,
}

/// A running invocation.
pub struct Invocation {
    pub id: Uuid,
    pub events: mpsc::Receiver<ChainStreamEvent>,
    pub report: JoinHandle<InvocationReport>,
}

/// What the caller gets back once the invocation has ended.
#[derive(Debug)]
pub struct InvocationReport {
    pub invocation_id: Uuid,
    pub outcome: InvocationOutcome,
    pub short_memory: ShortMemory,
    pub long_memory: LongMemory,
    /// Final parameter values by name
    pub parameters: BTreeMap<String, String>,
    pub usage: InvocationUsage,
    pub metrics: Metrics,
    pub units_completed: usize,
    pub failed_unit: Option<String>,
    /// All output text streamed during the invocation
    pub partial_output: String,
}

impl InvocationReport {
    pub fn truncated(&self) -> bool {
        self.outcome == InvocationOutcome::TimedOut
    }
}

/// The receiver went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Why a statement stopped before producing its result.
#[derive(Debug)]
pub(crate) enum Interrupt {
    Cancelled,
    Failed(Error),
}

impl From<Cancelled> for Interrupt {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<Error> for Interrupt {
    fn from(err: Error) -> Self {
        Self::Failed(err)
    }
}

macro_rules! interrupt_from {
    ($($err:ty),*) => {
        $(impl From<$err> for Interrupt {
            fn from(err: $err) -> Self {
                Self::Failed(err.into())
            }
        })*
    };
}

interrupt_from!(TransportError, ProviderError, RetrievalError, BlobError);

/// Event sink that remembers all output text sent through it.
pub(crate) struct Emitter {
    tx: mpsc::Sender<ChainStreamEvent>,
    partial: String,
}

impl Emitter {
    pub(crate) async fn send(&self, event: ChainStreamEvent) -> Result<(), Cancelled> {
        self.tx.send(event).await.map_err(|_| Cancelled)
    }
}

/// Mutable state of one invocation, threaded through every executor.
pub(crate) struct RunState {
    pub collab: Arc<Collaborators>,
    pub settings: ExecutorSettings,
    pub store: ParameterStore,
    pub memory: MemoryManager,
    pub meter: InvocationMeter,
    pub emitter: Emitter,
    pub completed: usize,
    pub failed_unit: Option<String>,
}

async fn run_units(chain: &BoundChain, run: &mut RunState) -> Result<(), Cancelled> {
    for unit in &chain.units {
        if !unit::run_unit(unit, run).await? {
            break;
        }
    }
    Ok(())
}

/// Seed the parameter table: global params, then the reserved names.
pub fn seed_parameters(chain: &BoundChain, input: &InvocationInput) -> ParameterStore {
    let mut store = ParameterStore::from_params(&chain.global_params);
    store.set(DEFAULT_INPUT, input.query.as_str());
    store.set(CHAT_HISTORY, input.short_memory.transcript());
    store.set(PREFERENCE, input.long_memory.preference.as_str());
    store
}

pub struct ChainExecutor {
    collab: Arc<Collaborators>,
    settings: ExecutorSettings,
}

impl ChainExecutor {
    pub fn new(collab: Collaborators, settings: ExecutorSettings) -> Self {
        Self {
            collab: Arc::new(collab),
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Start executing `chain` on a new task.
    pub fn spawn(&self, chain: BoundChain, input: InvocationInput) -> Invocation {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.settings.event_buffer.max(1));
        let collab = self.collab.clone();
        let settings = self.settings.clone();

        let report = tokio::spawn(async move {
            let watcher = tx.clone();
            let store = seed_parameters(&chain, &input);
            let memory = MemoryManager::new(input.short_memory, input.long_memory, settings.memory_cap);
            let timeout = settings.timeout;
            let mut run = RunState {
                collab,
                settings,
                store,
                memory,
                meter: InvocationMeter::new(id),
                emitter: Emitter {
                    tx,
                    partial: String::new(),
                },
                completed: 0,
                failed_unit: None,
            };

            info!(invocation_id = %id, chain = %chain.name, units = chain.units.len(), "Invocation started");

            let outcome = tokio::select! {
                biased;
                _ = watcher.closed() => InvocationOutcome::Cancelled,
                result = tokio::time::timeout(timeout, run_units(&chain, &mut run)) => match result {
                    Ok(Ok(())) if run.failed_unit.is_some() => InvocationOutcome::Failed,
                    Ok(Ok(())) => InvocationOutcome::Completed,
                    Ok(Err(Cancelled)) => InvocationOutcome::Cancelled,
                    Err(_) => InvocationOutcome::TimedOut,
                },
            };
            drop(watcher);

            let metrics = run.meter.total_metrics();
            if outcome == InvocationOutcome::TimedOut {
                warn!(invocation_id = %id, partial_len = run.emitter.partial.len(), "Invocation timed out");
                let _ = run
                    .emitter
                    .send(ChainStreamEvent::Truncated {
                        partial: run.emitter.partial.clone(),
                        execution_time: metrics.execution_time.clone(),
                    })
                    .await;
            }
            if outcome != InvocationOutcome::Cancelled {
                let _ = run
                    .emitter
                    .send(ChainStreamEvent::Done {
                        metrics: metrics.clone(),
                        units_completed: run.completed,
                        failed_unit: run.failed_unit.clone(),
                    })
                    .await;
            }

            let usage = run.meter.report(outcome);
            run.collab.recorder.record(&usage).await;
            info!(
                invocation_id = %id,
                outcome = ?outcome,
                units_completed = run.completed,
                total_tokens = usage.usage.total_tokens,
                elapsed_ms = usage.elapsed_ms,
                "Invocation finished"
            );

            let RunState {
                store,
                memory,
                emitter,
                completed,
                failed_unit,
                ..
            } = run;
            let (short_memory, long_memory) = memory.into_parts();
            InvocationReport {
                invocation_id: id,
                outcome,
                short_memory,
                long_memory,
                parameters: store.snapshot(),
                usage,
                metrics,
                units_completed: completed,
                failed_unit,
                partial_output: emitter.partial,
            }
        });

        Invocation {
            id,
            events: rx,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BoundStatement, BoundUnit, ModelCall, StatementAction};
    use crate::stream_event::{payload_type, UnitStatus};
    use crate::test_helpers::*;
    use serde_json::json;
    use splforge_compiler::StatementKind;
    use splforge_core::catalog::{ApiCatalog, ApiSpec};
    use splforge_core::message::Role;
    use splforge_core::view::{DataView, TextView};
    use splforge_core::Parameter;
    use splforge_tools::build_tool_registry;

    fn model_statement(output: &str, system_prompt: &str) -> BoundStatement {
        BoundStatement {
            name: "ToolModel".into(),
            description: String::new(),
            output: output.into(),
            aliases: Vec::new(),
            action: StatementAction::ToolModel(ModelCall {
                model: model_config(),
                system_prompt: system_prompt.into(),
                input: "${UserRequest}$".into(),
            }),
        }
    }

    fn unit(name: &str, kind: StatementKind, statements: Vec<BoundStatement>) -> BoundUnit {
        BoundUnit {
            id: format!("id-{name}"),
            name: name.into(),
            kind,
            input: "${UserRequest}$".into(),
            statements,
        }
    }

    fn chain(units: Vec<BoundUnit>) -> BoundChain {
        BoundChain {
            id: "chain-1".into(),
            name: "demo".into(),
            global_params: Vec::new(),
            units,
            warnings: Vec::new(),
        }
    }

    fn geo_api() -> ApiSpec {
        serde_json::from_value(json!({
            "uuid": "api-geo",
            "name": "Geo",
            "url": "https://geo.example/lookup",
            "parameters": [{"name": "q"}],
            "parse_path": ["answer"]
        }))
        .unwrap()
    }

    fn api_statement(output: &str) -> BoundStatement {
        BoundStatement {
            name: "API:api-geo".into(),
            description: String::new(),
            output: output.into(),
            aliases: Vec::new(),
            action: StatementAction::Api {
                link_id: "api-geo".into(),
                api: geo_api(),
                input: json!({"q": "${UserRequest}$"}),
            },
        }
    }

    fn query(text: &str) -> InvocationInput {
        InvocationInput {
            query: text.into(),
            ..Default::default()
        }
    }

    async fn drain(mut invocation: Invocation) -> (Vec<ChainStreamEvent>, InvocationReport) {
        let mut events = Vec::new();
        while let Some(event) = invocation.events.recv().await {
            events.push(event);
        }
        (events, invocation.report.await.unwrap())
    }

    fn statuses(events: &[ChainStreamEvent]) -> Vec<(String, UnitStatus)> {
        events
            .iter()
            .filter_map(ChainStreamEvent::as_unit)
            .map(|e| (e.name.clone(), e.status))
            .collect()
    }

    fn running_outputs<'a>(events: &'a [ChainStreamEvent], kind: &str) -> Vec<&'a str> {
        events
            .iter()
            .filter_map(ChainStreamEvent::as_unit)
            .filter(|e| e.status == UnitStatus::Running && e.output.kind == kind)
            .map(|e| e.output.content.as_str())
            .collect()
    }

    fn terminal_output(events: &[ChainStreamEvent], unit: &str) -> String {
        events
            .iter()
            .filter_map(ChainStreamEvent::as_unit)
            .find(|e| e.name == unit && e.status.is_terminal())
            .map(|e| e.output.content.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn units_run_in_order_and_share_parameters() {
        let provider = ScriptedProvider::new(vec![text_turn(&["Hel", "lo"]), text_turn(&["World"])]);
        let h = harness(provider, ExecutorSettings::default());
        let chain = chain(vec![
            unit("U1", StatementKind::ToolModel, vec![model_statement("Greeting", "Greet")]),
            unit("U2", StatementKind::ToolModel, vec![model_statement("Reply", "Answer after ${Greeting}$")]),
        ]);

        let (events, report) = drain(h.executor.spawn(chain, query("hi"))).await;

        let statuses = statuses(&events);
        assert_eq!(statuses[0], ("U1".to_string(), UnitStatus::Pending));
        let u1_done = statuses.iter().position(|(n, s)| n == "U1" && s.is_terminal()).unwrap();
        let u2_first = statuses.iter().position(|(n, _)| n == "U2").unwrap();
        assert!(u1_done < u2_first);
        assert_eq!(statuses[u1_done].1, UnitStatus::Success);
        assert_eq!(running_outputs(&events, payload_type::TEXT), vec!["Hel", "lo", "World"]);
        assert_eq!(terminal_output(&events, "U1"), "Hello");

        let requests = h.provider.requests();
        assert_eq!(requests[0].messages[1].content, "hi");
        assert_eq!(requests[1].messages[0].content, "Answer after Hello");
        assert!(requests.iter().all(|r| r.stream));

        assert!(matches!(
            events.last(),
            Some(ChainStreamEvent::Done { units_completed: 2, failed_unit: None, .. })
        ));
        assert_eq!(report.outcome, InvocationOutcome::Completed);
        assert_eq!(report.parameters.get("Reply").map(String::as_str), Some("World"));
        assert_eq!(report.short_memory.chat_history, ["Hello", "World"]);
        assert_eq!(report.metrics.token_usage.total, 30);

        let records = h.recorder.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_calls, 2);
        assert_eq!(records[0].usage.total_tokens, 30);
    }

    #[tokio::test]
    async fn failed_unit_stops_the_chain() {
        let h = harness(ScriptedProvider::new(vec![text_turn(&["unused"])]), ExecutorSettings::default());
        let chain = chain(vec![
            unit("U1", StatementKind::Api, vec![api_statement("Coords")]),
            unit("U2", StatementKind::ToolModel, vec![model_statement("Reply", "sys")]),
        ]);

        let (events, report) = drain(h.executor.spawn(chain, query("Paris"))).await;

        assert_eq!(
            statuses(&events),
            vec![("U1".to_string(), UnitStatus::Pending), ("U1".to_string(), UnitStatus::Failed)]
        );
        let failed = events[1].as_unit().unwrap();
        assert_eq!(failed.output.kind, payload_type::ERROR);
        assert!(failed.output.content.contains("404"));
        assert!(matches!(
            events.last(),
            Some(ChainStreamEvent::Done { units_completed: 0, failed_unit: Some(u), .. }) if u == "U1"
        ));

        assert_eq!(h.transport.requests()[0].body, json!({"q": "Paris"}));
        assert!(h.provider.requests().is_empty());
        assert_eq!(report.outcome, InvocationOutcome::Failed);
        assert!(report.short_memory.is_empty());
        assert_eq!(h.recorder.records()[0].outcome, InvocationOutcome::Failed);
    }

    #[tokio::test]
    async fn api_pieces_stream_and_join_into_the_result() {
        let h = harness(ScriptedProvider::new(Vec::new()), ExecutorSettings::default());
        h.transport.respond(
            "https://geo.example/lookup",
            vec![json!({"answer": "48.8"}), json!({"other": 1}), json!({"answer": "N"})],
        );
        let chain = chain(vec![unit("U1", StatementKind::Api, vec![api_statement("Coords")])]);

        let (events, report) = drain(h.executor.spawn(chain, query("Paris"))).await;

        assert_eq!(running_outputs(&events, payload_type::TEXT), vec!["48.8", "N"]);
        assert_eq!(terminal_output(&events, "U1"), "48.8N");
        assert_eq!(report.parameters.get("Coords").map(String::as_str), Some("48.8N"));
        let current = events[1].as_unit().unwrap().current_ref.clone().unwrap();
        assert_eq!(current.ref_id, "api-geo");
        assert_eq!(current.ref_name, "Geo");
        assert_eq!(h.recorder.records()[0].api_calls, 1);
    }

    #[tokio::test]
    async fn aliased_output_feeds_the_next_unit() {
        let h = harness(ScriptedProvider::new(vec![text_turn(&["Near the river."])]), ExecutorSettings::default());
        h.transport.respond("https://geo.example/lookup", vec![json!({"answer": "48.8N"})]);
        let mut api = api_statement("Coords");
        api.aliases = vec!["Answer".into()];
        let chain = chain(vec![
            unit("U1", StatementKind::Api, vec![api]),
            unit("U2", StatementKind::ToolModel, vec![model_statement("Reply", "Describe ${Answer}$")]),
        ]);

        let (_, report) = drain(h.executor.spawn(chain, query("Paris"))).await;

        assert_eq!(report.parameters.get("Coords").map(String::as_str), Some("48.8N"));
        assert_eq!(report.parameters.get("Answer").map(String::as_str), Some("48.8N"));
        assert_eq!(h.provider.requests()[0].messages[0].content, "Describe 48.8N");
    }

    #[tokio::test]
    async fn data_results_reach_parameters_but_not_unit_output() {
        let h = harness(ScriptedProvider::new(vec![text_turn(&["Answer"])]), ExecutorSettings::default());
        let data = BoundStatement {
            name: "Data:kb-docs".into(),
            description: String::new(),
            output: "Facts".into(),
            aliases: Vec::new(),
            action: StatementAction::Data {
                link_id: "kb-docs".into(),
                view: DataView::Text(TextView {
                    knowledge_base: "Docs".into(),
                    blocks: Vec::new(),
                }),
                input: json!("${UserRequest}$"),
            },
        };
        let chain = chain(vec![unit(
            "U1",
            StatementKind::Data,
            vec![data, model_statement("Reply", "Use ${Facts}$")],
        )]);

        let (events, report) = drain(h.executor.spawn(chain, query("capital of France"))).await;

        assert_eq!(
            running_outputs(&events, payload_type::DATA),
            vec!["Paris is the capital of France."]
        );
        assert_eq!(terminal_output(&events, "U1"), "Answer");
        assert_eq!(
            h.retriever.queries(),
            vec![("capital of France".to_string(), "Docs".to_string())]
        );
        assert_eq!(
            h.provider.requests()[0].messages[0].content,
            "Use Paris is the capital of France."
        );
        assert_eq!(report.partial_output, "Answer");
        assert_eq!(h.recorder.records()[0].retrievals, 1);
    }

    fn mag_statement(tools: Arc<splforge_core::tool::ToolRegistry>) -> BoundStatement {
        BoundStatement {
            name: "MagModel".into(),
            description: String::new(),
            output: "Answer".into(),
            aliases: Vec::new(),
            action: StatementAction::MagModel {
                call: ModelCall {
                    model: model_config(),
                    system_prompt: "Use tools".into(),
                    input: "${UserRequest}$".into(),
                },
                tools,
            },
        }
    }

    #[tokio::test]
    async fn mag_model_calls_tools_until_the_model_stops() {
        let provider = ScriptedProvider::new(vec![
            tool_call_turn("call_1", "Geo", r#"{"q":"#, r#""Paris"}"#),
            text_turn(&["Paris is at ", "48.8N"]),
        ]);
        let h = harness(provider, ExecutorSettings::default());
        h.transport
            .respond("https://geo.example/lookup", vec![json!({"answer": "48.8N"})]);
        let tools = Arc::new(build_tool_registry(&ApiCatalog::new([geo_api()]), h.invoker.clone()));
        let chain = chain(vec![unit("U1", StatementKind::MagModel, vec![mag_statement(tools)])]);

        let (events, report) = drain(h.executor.spawn(chain, query("where is Paris?"))).await;

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "Geo");

        let follow_up = &requests[1].messages;
        assert_eq!(follow_up.len(), 4);
        assert_eq!(follow_up[2].role, Role::Assistant);
        assert_eq!(follow_up[2].tool_calls[0].arguments, r#"{"q":"Paris"}"#);
        assert_eq!(follow_up[3].role, Role::Tool);
        assert_eq!(follow_up[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(follow_up[3].content, "48.8N");

        assert_eq!(h.transport.requests()[0].body, json!({"q": "Paris"}));
        assert_eq!(running_outputs(&events, payload_type::TOOL), vec!["Calling Geo\n"]);
        assert_eq!(terminal_output(&events, "U1"), "Paris is at 48.8N");
        assert_eq!(report.parameters.get("Answer").map(String::as_str), Some("Paris is at 48.8N"));

        let record = &h.recorder.records()[0];
        assert_eq!(record.model_calls, 2);
        assert_eq!(record.api_calls, 1);
        assert_eq!(record.usage.total_tokens, 38);
    }

    #[tokio::test]
    async fn tool_loop_stops_at_the_iteration_ceiling() {
        let provider = ScriptedProvider::new(vec![
            tool_call_turn("c1", "Nope", "{", "}"),
            tool_call_turn("c2", "Nope", "{", "}"),
            text_turn(&["never reached"]),
        ]);
        let settings = ExecutorSettings {
            max_tool_iterations: 2,
            ..ExecutorSettings::default()
        };
        let h = harness(provider, settings);
        let tools = Arc::new(build_tool_registry(&ApiCatalog::new([geo_api()]), h.invoker.clone()));
        let chain = chain(vec![unit("U1", StatementKind::MagModel, vec![mag_statement(tools)])]);

        let (events, report) = drain(h.executor.spawn(chain, query("go"))).await;

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].messages[3].content.starts_with("Error: unknown tool `Nope`"));
        assert!(h.transport.requests().is_empty());
        assert_eq!(statuses(&events).last().unwrap().1, UnitStatus::Success);
        assert_eq!(report.outcome, InvocationOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_truncates_with_partial_output() {
        let provider = ScriptedProvider::new(vec![text_turn(&["Par", "tial", " never"])])
            .with_delay(Duration::from_secs(1));
        let settings = ExecutorSettings {
            timeout: Duration::from_millis(2500),
            ..ExecutorSettings::default()
        };
        let h = harness(provider, settings);
        let chain = chain(vec![unit("U1", StatementKind::ToolModel, vec![model_statement("Reply", "sys")])]);

        let (events, report) = drain(h.executor.spawn(chain, query("hi"))).await;

        let n = events.len();
        assert!(matches!(&events[n - 2], ChainStreamEvent::Truncated { partial, .. } if partial == "Partial"));
        assert!(matches!(&events[n - 1], ChainStreamEvent::Done { units_completed: 0, .. }));
        assert!(statuses(&events).iter().all(|(_, s)| !s.is_terminal()));

        assert!(report.truncated());
        assert_eq!(report.partial_output, "Partial");
        assert!(!report.parameters.contains_key("Reply"));
        assert_eq!(h.recorder.records()[0].outcome, InvocationOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_receiver_cancels_and_still_records_usage() {
        let provider = ScriptedProvider::new(vec![text_turn(&["a", "b", "c"])]).with_delay(Duration::from_secs(1));
        let h = harness(provider, ExecutorSettings::default());
        let chain = chain(vec![unit("U1", StatementKind::ToolModel, vec![model_statement("Reply", "sys")])]);

        let mut invocation = h.executor.spawn(chain, query("hi"));
        let first = invocation.events.recv().await.unwrap();
        assert_eq!(first.as_unit().unwrap().status, UnitStatus::Pending);
        drop(invocation.events);

        let report = invocation.report.await.unwrap();
        assert_eq!(report.outcome, InvocationOutcome::Cancelled);
        let records = h.recorder.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, InvocationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn short_memory_never_exceeds_the_cap() {
        let provider = ScriptedProvider::new(vec![text_turn(&["A"]), text_turn(&["B"])]);
        let settings = ExecutorSettings {
            memory_cap: 2,
            ..ExecutorSettings::default()
        };
        let h = harness(provider, settings);
        let chain = chain(vec![
            unit("U1", StatementKind::ToolModel, vec![model_statement("First", "Prefer ${Preference}$")]),
            unit("U2", StatementKind::ToolModel, vec![model_statement("Second", "sys")]),
        ]);
        let mut input = query("hi");
        input.short_memory.chat_history = ["old1", "old2", "old3"].map(String::from).into();
        input.long_memory.preference = "metric units".into();

        let (_, report) = drain(h.executor.spawn(chain, input)).await;

        assert_eq!(report.short_memory.chat_history, ["A", "B"]);
        assert_eq!(report.short_memory.parameters.get("First").map(String::as_str), Some("A"));
        assert_eq!(report.long_memory.preference, "metric units");
        assert_eq!(h.provider.requests()[0].messages[0].content, "Prefer metric units");
    }

    #[tokio::test]
    async fn empty_chain_finishes_immediately() {
        let h = harness(ScriptedProvider::new(Vec::new()), ExecutorSettings::default());
        let (events, report) = drain(h.executor.spawn(chain(Vec::new()), query("hi"))).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "done");
        assert_eq!(report.outcome, InvocationOutcome::Completed);
        assert_eq!(h.recorder.records().len(), 1);
    }

    #[test]
    fn seeding_sets_reserved_parameters() {
        let mut tone = Parameter::new("Tone");
        tone.value = "warm".into();
        let mut chain = chain(Vec::new());
        chain.global_params.push(tone);

        let mut input = query("hi");
        input.short_memory.chat_history = ["q1", "a1"].map(String::from).into();
        input.long_memory.preference = "brief".into();

        let store = seed_parameters(&chain, &input);
        assert_eq!(store.get("UserRequest"), Some("hi"));
        assert_eq!(store.get("ChatHistory"), Some("q1\na1"));
        assert_eq!(store.get("Preference"), Some("brief"));
        assert_eq!(store.get("Tone"), Some("warm"));
    }

    #[test]
    fn settings_follow_engine_config() {
        let engine = EngineConfig {
            memory_cap: 3,
            invocation_timeout_ms: 1500,
            max_tool_iterations: 4,
            ..EngineConfig::default()
        };
        let settings = ExecutorSettings::from_config(&engine);
        assert_eq!(settings.memory_cap, 3);
        assert_eq!(settings.timeout, Duration::from_millis(1500));
        assert_eq!(settings.max_tool_iterations, 4);
    }
}
