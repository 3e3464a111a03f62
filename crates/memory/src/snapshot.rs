//! JSON file holding both memories between runs.
//!
//! A missing file is an empty memory. Writes create the parent directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::long::LongMemory;
use crate::short::ShortMemory;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub short: ShortMemory,

    #[serde(default)]
    pub long: LongMemory,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to access memory file at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Memory file at {path} is not valid JSON: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl MemorySnapshot {
    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No memory file, starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content).map_err(|e| SnapshotError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let io_err = |e: std::io::Error| SnapshotError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(path, content).await.map_err(io_err)?;
        debug!(path = %path.display(), entries = self.short.len(), "Memory file written");
        Ok(())
    }
}
