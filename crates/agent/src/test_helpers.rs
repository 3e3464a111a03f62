//! Shared test doubles for binder and executor tests.

use async_trait::async_trait;
use serde_json::Value;
use splforge_core::blob::BlobStore;
use splforge_core::catalog::{ModelConfig, ReturnKind};
use splforge_core::error::{BlobError, ProviderError, RetrievalError, TransportError};
use splforge_core::message::Message;
use splforge_core::provider::{
    FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta, Usage,
};
use splforge_core::retriever::Retriever;
use splforge_core::transport::{FragmentStream, Transport, TransportRequest};
use splforge_core::usage::{InvocationUsage, UsageRecorder};
use splforge_core::view::DataView;
use splforge_tools::ApiInvoker;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::executor::{ChainExecutor, Collaborators, ExecutorSettings};

pub fn model_config() -> ModelConfig {
    ModelConfig {
        base_url: "http://localhost:9".into(),
        api_key: None,
        model: "mock-model".into(),
        temperature: 0.0,
        max_tokens: None,
    }
}

pub fn usage(prompt: u32, completion: u32) -> Usage {
    Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    }
}

/// A streamed turn of text deltas followed by `stop` and a usage chunk.
pub fn text_turn(deltas: &[&str]) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = deltas.iter().map(|d| StreamChunk::text(*d)).collect();
    chunks.push(StreamChunk::finish(FinishReason::Stop));
    chunks.push(StreamChunk {
        usage: Some(usage(10, 5)),
        ..Default::default()
    });
    chunks
}

/// A turn requesting one tool call, with its arguments split in two fragments.
pub fn tool_call_turn(id: &str, name: &str, args_head: &str, args_tail: &str) -> Vec<StreamChunk> {
    vec![
        StreamChunk {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: Some(id.into()),
                name: Some(name.into()),
                arguments: Some(args_head.into()),
            }],
            ..Default::default()
        },
        StreamChunk {
            tool_calls: vec![ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments: Some(args_tail.into()),
            }],
            ..Default::default()
        },
        StreamChunk {
            finish_reason: Some(FinishReason::ToolCalls),
            usage: Some(usage(20, 3)),
            ..Default::default()
        },
    ]
}

/// Streams scripted turns in order and records every request.
///
/// With a delay set, every chunk waits that long before it is sent.
pub struct ScriptedProvider {
    turns: Mutex<Vec<Vec<StreamChunk>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Vec<StreamChunk>>) -> Self {
        Self {
            turns: Mutex::new(turns),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, request: ProviderRequest) -> Result<Vec<StreamChunk>, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            });
        }
        Ok(turns.remove(0))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let chunks = self.next_turn(request)?;
        let text: String = chunks.iter().filter_map(|c| c.content.as_deref()).collect();
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: chunks.iter().find_map(|c| c.usage),
            model: "mock-model".into(),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let chunks = self.next_turn(request)?;
        let delay = self.delay;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            for chunk in chunks {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Answers by URL with canned fragments; unknown URLs get a 404.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<HashMap<String, Vec<Value>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    pub fn respond(&self, url: &str, fragments: Vec<Value>) {
        self.responses.lock().unwrap().insert(url.to_string(), fragments);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: TransportRequest) -> Result<FragmentStream, TransportError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        let fragments = self
            .responses
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.clone(),
                status_code: 404,
                message: "not found".into(),
            })?;
        let (tx, rx) = mpsc::channel(fragments.len().max(1));
        for fragment in fragments {
            let _ = tx.send(Ok(fragment)).await;
        }
        Ok(rx)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        Ok(url.as_bytes().to_vec())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<Vec<(ReturnKind, Vec<u8>)>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, kind: ReturnKind, bytes: Vec<u8>) -> Result<String, BlobError> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.push((kind, bytes));
        Ok(format!("mem://{}/{}", kind.as_str(), blobs.len()))
    }
}

/// Returns the same text for every query and records what it was asked.
pub struct CannedRetriever {
    answer: String,
    queries: Mutex<Vec<(String, String)>>,
}

impl CannedRetriever {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// `(query, knowledge base)` pairs in call order.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for CannedRetriever {
    async fn retrieve(&self, query: &str, view: &DataView) -> Result<String, RetrievalError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), view.knowledge_base().to_string()));
        Ok(self.answer.clone())
    }
}

#[derive(Default)]
pub struct RecordingRecorder {
    records: Mutex<Vec<InvocationUsage>>,
}

impl RecordingRecorder {
    pub fn records(&self) -> Vec<InvocationUsage> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageRecorder for RecordingRecorder {
    async fn record(&self, usage: &InvocationUsage) {
        self.records.lock().unwrap().push(usage.clone());
    }
}

pub fn test_invoker() -> (Arc<ApiInvoker>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let invoker = Arc::new(ApiInvoker::new(transport.clone(), Arc::new(MemoryBlobStore::default())));
    (invoker, transport)
}

/// Everything an executor test needs to inspect afterwards.
pub struct Harness {
    pub executor: ChainExecutor,
    pub provider: Arc<ScriptedProvider>,
    pub transport: Arc<RecordingTransport>,
    pub retriever: Arc<CannedRetriever>,
    pub recorder: Arc<RecordingRecorder>,
    pub invoker: Arc<ApiInvoker>,
}

pub fn harness(provider: ScriptedProvider, settings: ExecutorSettings) -> Harness {
    let provider = Arc::new(provider);
    let (invoker, transport) = test_invoker();
    let retriever = Arc::new(CannedRetriever::new("Paris is the capital of France."));
    let recorder = Arc::new(RecordingRecorder::default());
    let executor = ChainExecutor::new(
        Collaborators {
            provider: provider.clone(),
            retriever: retriever.clone(),
            invoker: invoker.clone(),
            recorder: recorder.clone(),
        },
        settings,
    );
    Harness {
        executor,
        provider,
        transport,
        retriever,
        recorder,
        invoker,
    }
}
