//! Stats socket client.
//!
//! # Responsibilities
//! - Resolve the socket glob to concrete paths
//! - Query `show stat` and parse the reply
//! - Send fire-and-forget admin command batches

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::haproxy::stat::{parse_stat, LiveBackendSnapshot};
use crate::resilience::timeouts::with_deadline;

/// Query sent to read per-server state.
pub const SHOW_STAT: &str = "show stat\n";

/// Errors talking to a stats socket.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("invalid socket pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to connect to {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} did not answer within {}s", .path.display(), .deadline.as_secs())]
    Timeout { path: PathBuf, deadline: Duration },
}

/// Resolve `pattern` to existing socket paths, in glob order.
pub fn resolve_sockets(pattern: &str) -> Result<Vec<PathBuf>, SocketError> {
    let paths = glob::glob(pattern).map_err(|source| SocketError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable socket glob entry");
                None
            }
        })
        .collect())
}

/// Read live server state through the first socket matching `pattern`.
///
/// `Ok(None)` means no socket exists, so there is no live state to compare.
pub async fn read_status(
    pattern: &str,
    deadline: Duration,
) -> Result<Option<LiveBackendSnapshot>, SocketError> {
    let sockets = resolve_sockets(pattern)?;
    let Some(path) = sockets.first() else {
        tracing::warn!(pattern, "No haproxy stats socket found");
        return Ok(None);
    };

    query_stat(path, deadline).await.map(Some)
}

/// Send `show stat` to one socket and parse the reply.
pub async fn query_stat(path: &Path, deadline: Duration) -> Result<LiveBackendSnapshot, SocketError> {
    let response = with_deadline(
        deadline,
        async {
            let mut stream = connect(path).await?;
            stream
                .write_all(SHOW_STAT.as_bytes())
                .await
                .map_err(|source| io_error(path, source))?;

            let mut raw = Vec::new();
            stream
                .read_to_end(&mut raw)
                .await
                .map_err(|source| io_error(path, source))?;
            Ok::<_, SocketError>(raw)
        },
        || SocketError::Timeout {
            path: path.to_path_buf(),
            deadline,
        },
    )
    .await?;

    Ok(parse_stat(&String::from_utf8_lossy(&response)))
}

/// Write a batch of newline-terminated commands. No reply is read.
pub async fn send_commands(path: &Path, commands: &str, deadline: Duration) -> Result<(), SocketError> {
    with_deadline(
        deadline,
        async {
            let mut stream = connect(path).await?;
            stream
                .write_all(commands.as_bytes())
                .await
                .map_err(|source| io_error(path, source))?;
            stream
                .shutdown()
                .await
                .map_err(|source| io_error(path, source))
        },
        || SocketError::Timeout {
            path: path.to_path_buf(),
            deadline,
        },
    )
    .await
}

async fn connect(path: &Path) -> Result<UnixStream, SocketError> {
    UnixStream::connect(path)
        .await
        .map_err(|source| SocketError::Connect {
            path: path.to_path_buf(),
            source,
        })
}

fn io_error(path: &Path, source: std::io::Error) -> SocketError {
    SocketError::Io {
        path: path.to_path_buf(),
        source,
    }
}
