//! Active configuration commit with backup.
//!
//! # Responsibilities
//! - Compare the verified candidate against the active file
//! - Hard-link the previous file to `<active>-<RFC3339>` before replacing it
//! - Overwrite the active file and touch the liveness marker
//!
//! # Design Decisions
//! - A missing active file compares as empty and produces no backup
//! - Backup and write failures abort the convergence; the marker never does
//! - The new file is staged as `<active>-new` and renamed over the active one,
//!   leaving the backup link pointing at the untouched previous inode
//! - Contents are compared as bytes; the active file need not be UTF-8
//! - A symlinked active file is written through; the link itself stays

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::HaproxyConfig;
use crate::files::marker;

/// Permission bits for a newly created active file, before umask.
const ACTIVE_MODE: u32 = 0o664;

const MAX_SYMLINK_DEPTH: usize = 40;

/// What a commit changed, kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChangeLog {
    pub old_config: String,
    pub new_config: String,
    /// Hard link to the previous file; `None` when there was no previous file.
    pub backup_file: Option<PathBuf>,
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Candidate equals the active file. Nothing was touched.
    Unchanged,
    /// The active file was replaced.
    Applied(ConfigChangeLog),
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied(_))
    }
}

/// Errors writing the active configuration.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to read active configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to back up configuration to {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write active configuration {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replace the active configuration with `candidate` if it differs.
///
/// When the active file is a symlink, the file it points to is replaced and
/// the link is kept.
pub async fn commit(
    haproxy: &HaproxyConfig,
    candidate: &str,
    backup: bool,
) -> Result<CommitOutcome, CommitError> {
    let active = haproxy.active_config();
    let target = resolve_target(&active).await.map_err(|source| CommitError::Read {
        path: active.clone(),
        source,
    })?;

    let old_config = match tokio::fs::read(&target).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(source) => {
            return Err(CommitError::Read {
                path: target.clone(),
                source,
            })
        }
    };

    if old_config == candidate.as_bytes() {
        tracing::debug!(path = %active.display(), "Configuration file has not changed");
        return Ok(CommitOutcome::Unchanged);
    }

    tracing::info!(path = %active.display(), "Configuration contents changed, writing new file");

    let backup_file = if backup {
        backup_active(&target, &active).await?
    } else {
        None
    };

    let mode = tokio::fs::metadata(&target)
        .await
        .ok()
        .map(|meta| meta.permissions().mode());

    replace_active(&target, candidate, mode).await.map_err(|source| {
        tracing::error!(path = %target.display(), error = %source, "Could not write new configuration");
        CommitError::Write {
            path: target.clone(),
            source,
        }
    })?;

    marker::touch(&haproxy.marker_file()).await;

    Ok(CommitOutcome::Applied(ConfigChangeLog {
        old_config: String::from_utf8_lossy(&old_config).into_owned(),
        new_config: candidate.to_string(),
        backup_file,
    }))
}

/// Follow symlinks from `active` to the file holding the configuration.
/// A dangling link resolves to the path it names.
async fn resolve_target(active: &Path) -> std::io::Result<PathBuf> {
    let mut target = active.to_path_buf();
    for _ in 0..MAX_SYMLINK_DEPTH {
        match tokio::fs::symlink_metadata(&target).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                let link = tokio::fs::read_link(&target).await?;
                target = match target.parent() {
                    Some(parent) => parent.join(link),
                    None => link,
                };
            }
            Ok(_) => return Ok(target),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(target),
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        ErrorKind::Other,
        "too many levels of symbolic links",
    ))
}

/// Hard-link `target` to a timestamped sibling of `active`. `None` if
/// `target` is missing.
async fn backup_active(target: &Path, active: &Path) -> Result<Option<PathBuf>, CommitError> {
    let now = Local::now();
    let mut backup = sibling_path(active, &now.to_rfc3339_opts(SecondsFormat::Secs, true));

    let mut result = tokio::fs::hard_link(target, &backup).await;
    if matches!(&result, Err(e) if e.kind() == ErrorKind::AlreadyExists) {
        // Two commits within one second.
        backup = sibling_path(active, &now.to_rfc3339_opts(SecondsFormat::Nanos, true));
        result = tokio::fs::hard_link(target, &backup).await;
    }

    match result {
        Ok(()) => {
            tracing::info!(backup = %backup.display(), "Previous configuration backed up");
            Ok(Some(backup))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => {
            tracing::error!(backup = %backup.display(), error = %source, "Error linking config backup");
            Err(CommitError::Backup {
                path: backup,
                source,
            })
        }
    }
}

/// Write `contents` next to `target` and rename it into place, keeping the
/// previous file's permission bits when there was one.
///
/// The backup is a hard link to the old inode, so the old inode must not be
/// truncated.
async fn replace_active(target: &Path, contents: &str, mode: Option<u32>) -> std::io::Result<()> {
    let staged = sibling_path(target, "new");
    if let Err(e) = write_staged(&staged, contents, mode).await {
        let _ = tokio::fs::remove_file(&staged).await;
        return Err(e);
    }
    tokio::fs::rename(&staged, target).await
}

async fn write_staged(staged: &Path, contents: &str, mode: Option<u32>) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(ACTIVE_MODE)
        .open(staged)
        .await?;
    if let Some(mode) = mode {
        file.set_permissions(std::fs::Permissions::from_mode(mode)).await?;
    }
    file.write_all(contents.as_bytes()).await?;
    file.flush().await
}

fn sibling_path(active: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(active.as_os_str());
    name.push("-");
    name.push(suffix);
    PathBuf::from(name)
}
