//! # splforge Core
//!
//! Domain types, collaborator traits, and error definitions for the splforge
//! prompt-chain engine. This crate performs no I/O of its own: it
//! defines the model that the compiler, binder, and executor crates share.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM provider, HTTP transport, retriever,
//! blob storage, usage accounting) is a trait here. Implementations live in
//! their respective crates, which keeps the executor testable with scripted
//! mocks and keeps the dependency graph pointing inward.

pub mod blob;
pub mod catalog;
pub mod error;
pub mod message;
pub mod parameter;
pub mod provider;
pub mod retriever;
pub mod tool;
pub mod transport;
pub mod usage;
pub mod view;

// Re-export key types at crate root for ergonomics
pub use blob::BlobStore;
pub use catalog::{AgentKind, ApiCatalog, ApiSpec, KnowledgeBase, KnowledgeCatalog, ModelConfig, PathSegment, ReturnKind};
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use parameter::{Parameter, ParameterStore};
pub use provider::{FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta, Usage};
pub use retriever::Retriever;
pub use tool::{Tool, ToolRegistry};
pub use transport::{HttpMethod, Transport, TransportRequest};
pub use usage::{InvocationOutcome, InvocationUsage, LoggingRecorder, UsageRecorder};
pub use view::{DataView, GraphView, TextView};
