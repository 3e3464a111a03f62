//! `splforge run`: compile, bind, and execute one chain invocation.
//!
//! Every event is printed to stdout as one JSON envelope per line.

use serde::Deserialize;
use splforge_agent::{
    generate_suggestions, ChainExecutor, ChainInitializer, Collaborators, ExecutorSettings,
    InvocationInput, ResponseEnvelope, ResponseFormatter,
};
use splforge_config::{AgentKind, AppConfig};
use splforge_core::catalog::{ApiCatalog, ApiSpec, KnowledgeBase, KnowledgeCatalog};
use splforge_core::usage::{InvocationOutcome, LoggingRecorder};
use splforge_core::Provider;
use splforge_memory::MemorySnapshot;
use splforge_providers::{HttpTransport, OpenAiCompatProvider};
use splforge_tools::{ApiInvoker, EmbeddingRetriever, LocalBlobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::compile::load_and_compile;

/// Follow-up questions requested when suggestions are enabled.
const SUGGESTION_COUNT: usize = 3;

pub struct RunArgs {
    pub document: PathBuf,
    pub catalog: PathBuf,
    pub query: String,
    pub memory: Option<PathBuf>,
    pub agent_type: Option<AgentKind>,
}

/// The resources a chain may reference.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub apis: Vec<ApiSpec>,

    #[serde(default)]
    pub knowledge_bases: Vec<KnowledgeBase>,
}

impl CatalogFile {
    pub async fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read catalog {}: {e}", path.display()))?;
        let catalog = serde_json::from_str(&json)
            .map_err(|e| format!("Catalog {} is invalid: {e}", path.display()))?;
        Ok(catalog)
    }
}

fn chain_name(document: &Path) -> String {
    document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chain".into())
}

fn print_envelope(envelope: &ResponseEnvelope) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(envelope)?);
    Ok(())
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        warn!("No API key configured; set SPLFORGE_API_KEY unless the endpoint needs none");
    }

    let compiled = load_and_compile(&args.document, args.agent_type, config.engine.agent_type).await?;
    let catalog = CatalogFile::load(&args.catalog).await?;
    let memory = match &args.memory {
        Some(path) => MemorySnapshot::load(path).await?,
        None => MemorySnapshot::default(),
    };

    // --- Collaborators ---
    let timeout = Duration::from_secs(config.transport.request_timeout_secs);
    let model = config.model_config();
    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_model_config(&model, timeout));
    let invoker = Arc::new(ApiInvoker::new(
        Arc::new(HttpTransport::new(timeout)),
        Arc::new(LocalBlobStore::new(config.blobs.dir.clone())),
    ));
    let retriever = Arc::new(EmbeddingRetriever::new(
        provider.clone(),
        config.retrieval.embedding_model.clone(),
        config.retrieval.top_k,
    ));

    // --- Bind ---
    let initializer = ChainInitializer::new(
        Arc::new(ApiCatalog::new(catalog.apis)),
        Arc::new(KnowledgeCatalog::new(catalog.knowledge_bases)),
        model.clone(),
        invoker.clone(),
    );
    let chain = initializer.bind(&chain_name(&args.document), &compiled.chain);

    let executor = ChainExecutor::new(
        Collaborators {
            provider: provider.clone(),
            retriever,
            invoker,
            recorder: Arc::new(LoggingRecorder),
        },
        ExecutorSettings::from_config(&config.engine),
    );

    // --- Execute ---
    let mut formatter = ResponseFormatter::new(&chain);
    print_envelope(&formatter.progress(format!(
        "Bound {} units ({} statements dropped)",
        chain.units.len(),
        chain.warnings.len()
    )))?;

    let mut invocation = executor.spawn(
        chain,
        InvocationInput {
            query: args.query.clone(),
            short_memory: memory.short,
            long_memory: memory.long,
        },
    );
    while let Some(event) = invocation.events.recv().await {
        print_envelope(&formatter.format(&event))?;
    }
    let report = invocation.report.await?;

    if config.engine.suggestions && report.outcome == InvocationOutcome::Completed {
        let transcript = format!("user: {}\nassistant: {}", args.query, report.partial_output);
        match generate_suggestions(provider.as_ref(), &model, &transcript, SUGGESTION_COUNT).await {
            Ok(list) if !list.is_empty() => print_envelope(&formatter.suggestion(list))?,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Suggestion generation failed"),
        }
    }

    if let Some(path) = &args.memory {
        MemorySnapshot {
            short: report.short_memory,
            long: report.long_memory,
        }
        .save(path)
        .await?;
        info!(path = %path.display(), "Memory saved");
    }

    Ok(())
}
