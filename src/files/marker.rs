//! Liveness marker maintenance.
//!
//! External health checks watch the marker's mtime to see that the converger
//! is still applying changes. Marker failures are logged, never fatal.

use std::path::Path;
use std::time::SystemTime;

/// Set the marker's mtime to now, creating it if needed. Contents are kept.
pub async fn touch(path: &Path) {
    let result = async {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.into_std().await.set_modified(SystemTime::now())
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "Could not touch liveness marker");
    }
}

/// Replace the marker's contents with the last applied command batch.
pub async fn record(path: &Path, contents: &str) {
    if let Err(e) = tokio::fs::write(path, contents).await {
        tracing::error!(path = %path.display(), error = %e, "Could not update liveness marker");
    }
}
