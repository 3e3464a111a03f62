//! Retriever trait, the boundary to the retrieval engine.

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::view::DataView;

/// Answers a query against one data view.
///
/// Implementations must treat text and graph views as distinct inputs; the
/// returned text is used verbatim as the data statement's result.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, view: &DataView) -> std::result::Result<String, RetrievalError>;
}
