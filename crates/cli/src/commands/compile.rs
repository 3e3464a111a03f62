//! `splforge compile`: SPL document to chain descriptor.

use serde_json::Value;
use splforge_compiler::{compile, CompileOutput, SplDocument};
use splforge_config::AgentKind;
use std::path::Path;
use tracing::warn;

/// Read and compile a document.
///
/// The agent type comes from `agent_type` when given, else from the
/// document, else from `fallback`.
pub async fn load_and_compile(
    path: &Path,
    agent_type: Option<AgentKind>,
    fallback: AgentKind,
) -> Result<CompileOutput, Box<dyn std::error::Error>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let mut doc = SplDocument::from_json(&json)
        .map_err(|e| format!("{} is not an SPL document: {e}", path.display()))?;

    doc.agent_type = match agent_type {
        Some(kind) => kind,
        None if declares_agent_type(&json) => doc.agent_type,
        None => fallback,
    };

    let output = compile(&doc);
    for warning in &output.warnings {
        warn!(document = %path.display(), "{warning}");
    }
    Ok(output)
}

fn declares_agent_type(json: &str) -> bool {
    serde_json::from_str::<Value>(json)
        .ok()
        .is_some_and(|v| v.get("agent_type").is_some())
}

pub async fn run(path: &Path, agent_type: Option<AgentKind>) -> Result<(), Box<dyn std::error::Error>> {
    let output = load_and_compile(path, agent_type, AgentKind::default()).await?;
    println!("{}", output.chain.to_json_pretty()?);
    Ok(())
}
