//! Runtime snapshot loading from disk.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::source::types::RuntimeConfiguration;

/// Error type for runtime snapshot loading.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read runtime configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse runtime configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load the JSON runtime snapshot.
pub async fn load_runtime(path: &Path) -> Result<RuntimeConfiguration, SourceError> {
    let content = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&content).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
