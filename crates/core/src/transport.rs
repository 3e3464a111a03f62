//! Transport trait: the HTTP boundary used by API statements and tools.
//!
//! A transport sends one request and yields parsed JSON fragments: exactly
//! one for a plain response, one per `data:` line (or JSON line) for a
//! streamed one. A `[DONE]` line ends a stream. Callers apply their own
//! parse path to each fragment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

/// One outgoing API request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// JSON body for POST; query parameters for GET (object entries)
    pub body: serde_json::Value,

    /// Consume the response as a stream of fragments
    #[serde(default)]
    pub stream: bool,
}

/// Receiver side of a fragment stream.
pub type FragmentStream = mpsc::Receiver<std::result::Result<serde_json::Value, TransportError>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and receive its parsed fragments.
    ///
    /// A non-JSON body arrives as a single `Value::String` fragment.
    async fn send(&self, request: TransportRequest) -> std::result::Result<FragmentStream, TransportError>;

    /// Download raw bytes (used to persist binary API results).
    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, TransportError>;
}
