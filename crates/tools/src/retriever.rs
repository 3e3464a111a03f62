//! Reference retriever used by the CLI.
//!
//! Text views are ranked by cosine similarity between the query embedding and
//! each block's precomputed embedding. Graph views, and text views without
//! usable embeddings, are ranked by query-term overlap.

use async_trait::async_trait;
use splforge_core::error::RetrievalError;
use splforge_core::provider::{EmbeddingRequest, Provider};
use splforge_core::retriever::Retriever;
use splforge_core::view::{DataView, GraphView, TextView};
use splforge_memory::top_k_by_similarity;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_TOP_K: usize = 4;

pub struct EmbeddingRetriever {
    provider: Arc<dyn Provider>,
    model: String,
    top_k: usize,
}

impl EmbeddingRetriever {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, top_k: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            top_k: top_k.max(1),
        }
    }

    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            inputs: vec![query.to_string()],
        };
        match self.provider.embed(request).await {
            Ok(response) => response.embeddings.into_iter().next().filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, ranking by term overlap");
                None
            }
        }
    }

    async fn retrieve_text(&self, query: &str, view: &TextView) -> Vec<String> {
        let embedded = view.blocks.iter().any(|b| !b.embedding.is_empty());
        let query_vec = if embedded { self.embed_query(query).await } else { None };

        let ranked: Vec<usize> = match query_vec {
            Some(q) => top_k_by_similarity(&view.blocks, |b| b.embedding.as_slice(), &q, self.top_k)
                .into_iter()
                .map(|(i, _)| i)
                .collect(),
            None => rank_by_overlap(query, view.blocks.iter().map(|b| b.text.as_str()), self.top_k),
        };
        ranked.into_iter().map(|i| view.blocks[i].text.clone()).collect()
    }

    fn retrieve_graph(&self, query: &str, view: &GraphView) -> Vec<String> {
        let c = &view.collections;
        let entity_text: Vec<String> = c
            .entities
            .iter()
            .map(|e| format!("{} ({}): {}", e.name, e.kind, e.description))
            .collect();
        let relation_text: Vec<String> = c
            .relationships
            .iter()
            .map(|r| format!("{} -> {}: {}", r.source, r.target, r.description))
            .collect();
        let report_text: Vec<String> = c
            .community_reports
            .iter()
            .map(|r| format!("{}: {}", r.title, r.summary))
            .collect();

        let mut sections = Vec::new();
        for (heading, items) in [
            ("Entities", &entity_text),
            ("Relationships", &relation_text),
            ("Reports", &report_text),
        ] {
            let picked = rank_by_overlap(query, items.iter().map(String::as_str), self.top_k);
            if picked.is_empty() {
                continue;
            }
            let mut section = format!("## {heading}");
            for i in picked {
                section.push_str("\n- ");
                section.push_str(&items[i]);
            }
            sections.push(section);
        }
        sections
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Indices of the `k` texts sharing the most terms with `query`, best first.
///
/// Texts sharing no term are left out. Ties keep input order.
fn rank_by_overlap<'a>(query: &str, texts: impl Iterator<Item = &'a str>, k: usize) -> Vec<usize> {
    let wanted = terms(query);
    let mut scored: Vec<(usize, usize)> = texts
        .enumerate()
        .map(|(i, text)| (i, terms(text).intersection(&wanted).count()))
        .filter(|(_, score)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn retrieve(&self, query: &str, view: &DataView) -> Result<String, RetrievalError> {
        let pieces = match view {
            DataView::Text(text) => self.retrieve_text(query, text).await,
            DataView::Graph(graph) => self.retrieve_graph(query, graph),
        };
        debug!(
            knowledge_base = %view.knowledge_base(),
            view = view.kind(),
            hits = pieces.len(),
            "Retrieved context"
        );
        Ok(pieces.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splforge_core::error::ProviderError;
    use splforge_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};
    use splforge_core::view::{Entity, GraphCollections, Relationship, TextBlock};

    struct FixedEmbedder(Option<Vec<f32>>);

    #[async_trait]
    impl Provider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("no chat".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            match &self.0 {
                Some(v) => Ok(EmbeddingResponse {
                    embeddings: vec![v.clone()],
                    model: request.model,
                    usage: None,
                }),
                None => Err(ProviderError::NotConfigured("no embeddings".into())),
            }
        }
    }

    fn block(text: &str, embedding: Vec<f32>) -> TextBlock {
        TextBlock {
            text: text.into(),
            embedding,
            source: None,
        }
    }

    fn text_view() -> DataView {
        DataView::Text(TextView {
            knowledge_base: "kb".into(),
            blocks: vec![
                block("Paris is the capital of France", vec![1.0, 0.0]),
                block("Rust has no garbage collector", vec![0.0, 1.0]),
                block("Lyon is in France too", vec![0.9, 0.1]),
            ],
        })
    }

    #[tokio::test]
    async fn text_view_ranks_by_cosine() {
        let retriever = EmbeddingRetriever::new(Arc::new(FixedEmbedder(Some(vec![1.0, 0.0]))), "m", 2);
        let out = retriever.retrieve("anything", &text_view()).await.unwrap();
        assert_eq!(out, "Paris is the capital of France\n\nLyon is in France too");
    }

    #[tokio::test]
    async fn embedding_failure_falls_back_to_overlap() {
        let retriever = EmbeddingRetriever::new(Arc::new(FixedEmbedder(None)), "m", 1);
        let out = retriever.retrieve("garbage collector?", &text_view()).await.unwrap();
        assert_eq!(out, "Rust has no garbage collector");
    }

    #[tokio::test]
    async fn graph_view_lists_matching_items() {
        let view = DataView::Graph(GraphView {
            knowledge_base: "kb".into(),
            collections: GraphCollections {
                entities: vec![
                    Entity { name: "Paris".into(), kind: "city".into(), description: "capital".into() },
                    Entity { name: "Ferris".into(), kind: "crab".into(), description: "mascot".into() },
                ],
                relationships: vec![Relationship {
                    source: "Paris".into(),
                    target: "France".into(),
                    description: "capital of".into(),
                    weight: 1.0,
                }],
                community_reports: vec![],
            },
        });
        let retriever = EmbeddingRetriever::new(Arc::new(FixedEmbedder(None)), "m", 4);
        let out = retriever.retrieve("tell me about paris", &view).await.unwrap();
        assert!(out.contains("## Entities\n- Paris (city): capital"));
        assert!(!out.contains("Ferris"));
        assert!(out.contains("## Relationships\n- Paris -> France"));
        assert!(!out.contains("## Reports"));
    }

    #[test]
    fn overlap_ignores_single_characters() {
        let picked = rank_by_overlap("a b", ["a b c"].into_iter(), 3);
        assert!(picked.is_empty());
    }
}
