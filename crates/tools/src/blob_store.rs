//! Filesystem [`BlobStore`].

use async_trait::async_trait;
use splforge_core::blob::BlobStore;
use splforge_core::catalog::ReturnKind;
use splforge_core::error::BlobError;
use std::path::{Path, PathBuf};

/// Writes each blob to `<dir>/<uuid>.<ext>` and returns the file path.
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn extension(kind: ReturnKind) -> &'static str {
    match kind {
        ReturnKind::Image => "png",
        ReturnKind::Audio => "mp3",
        ReturnKind::Json => "json",
        ReturnKind::Text => "txt",
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, kind: ReturnKind, bytes: Vec<u8>) -> Result<String, BlobError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BlobError::Write(format!("{}: {e}", self.dir.display())))?;

        let path = self
            .dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), extension(kind)));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| BlobError::Write(format!("{}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote blob");
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_writes_file_with_kind_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(tmp.path().join("blobs"));

        let handle = store.put(ReturnKind::Image, vec![9, 8, 7]).await.unwrap();
        assert!(handle.ends_with(".png"));
        assert_eq!(tokio::fs::read(&handle).await.unwrap(), vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn handles_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(tmp.path());
        let a = store.put(ReturnKind::Audio, vec![1]).await.unwrap();
        let b = store.put(ReturnKind::Audio, vec![1]).await.unwrap();
        assert_ne!(a, b);
    }
}
