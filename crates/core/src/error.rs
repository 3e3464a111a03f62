//! Error types for the splforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all splforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Compilation ---
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    // --- Binding ---
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Blob storage ---
    #[error("Blob storage error: {0}")]
    Blob(#[from] BlobError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Problems found while compiling an SPL document.
///
/// None of these abort compilation: the compiler synthesizes a default,
/// records the error as a warning, and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Instruction {index} has no {subsection} subsection; using `{default}`")]
    MissingSubsection {
        index: usize,
        subsection: String,
        default: String,
    },

    #[error("Unknown section type `{0}`, kept as context")]
    UnknownSection(String),

    #[error("Malformed section: {0}")]
    MalformedSection(String),
}

/// A statement whose link id could not be bound to a concrete resource.
///
/// Binding errors drop the statement; the unit keeps its other statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("API `{link_id}` referenced by {statement} is not in the catalog")]
    UnknownApi { statement: String, link_id: String },

    #[error("Knowledge base `{link_id}` referenced by {statement} is not in the catalog")]
    UnknownKnowledgeBase { statement: String, link_id: String },

    #[error("Knowledge base `{link_id}` referenced by {statement} has neither text blocks nor graph collections")]
    EmptyKnowledgeBase { statement: String, link_id: String },

    #[error("Statement {statement} has no link id")]
    MissingLinkId { statement: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// HTTP or stream failure while calling an external API.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request to {url} failed with status {status_code}: {message}")]
    Status {
        url: String,
        status_code: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval backend failed: {0}")]
    Backend(String),

    #[error("Query embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob write failed: {0}")]
    Write(String),

    #[error("Blob payload could not be decoded: {0}")]
    Decode(String),
}
