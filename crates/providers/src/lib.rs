//! Network collaborators for splforge.
//!
//! - [`OpenAiCompatProvider`] implements `splforge_core::Provider` for any
//!   OpenAI-compatible chat endpoint, streaming raw deltas.
//! - [`HttpTransport`] implements `splforge_core::Transport` for API
//!   statements and tools, including SSE and line-delimited streams.

pub mod http_transport;
pub mod openai_compat;
mod sse;

pub use http_transport::HttpTransport;
pub use openai_compat::OpenAiCompatProvider;
