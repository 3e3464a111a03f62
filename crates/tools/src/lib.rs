//! Statement-side collaborators for splforge.
//!
//! - [`ApiInvoker`] runs API statements: builds the request, extracts each
//!   response fragment along the parse path, and persists binary results.
//! - [`ApiTool`] and [`build_tool_registry`] expose catalog APIs to
//!   multi-tool models.
//! - [`LocalBlobStore`] and [`EmbeddingRetriever`] are the default blob store
//!   and retriever the CLI wires in.

pub mod api_call;
pub mod api_tool;
pub mod blob_store;
pub mod retriever;

pub use api_call::{ApiInvoker, ApiResponseStream};
pub use api_tool::{build_tool_registry, transliterate_name, ApiTool};
pub use blob_store::LocalBlobStore;
pub use retriever::{EmbeddingRetriever, DEFAULT_TOP_K};
