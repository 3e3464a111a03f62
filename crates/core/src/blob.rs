//! Blob storage: where binary API results (images, audio) are persisted.

use async_trait::async_trait;

use crate::catalog::ReturnKind;
use crate::error::BlobError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` and return a handle that later steps can reference.
    async fn put(&self, kind: ReturnKind, bytes: Vec<u8>) -> std::result::Result<String, BlobError>;
}
