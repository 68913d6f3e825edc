//! HAProxy reload.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::resilience::timeouts::with_deadline;

/// What [`reload`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadOutcome {
    /// No reload command configured.
    Skipped,
    Reloaded,
}

/// Errors running the reload command.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The command could not be started at all. The controller cannot
    /// make progress without a working reload, so this is fatal.
    #[error("failed to launch reload command {command:?}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command {command:?} failed ({status}): {stderr}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed waiting for reload command {command:?}: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command {command:?} did not finish within {}s", .deadline.as_secs())]
    Timeout { command: String, deadline: Duration },
}

impl ReloadError {
    /// True when the process should stop instead of retrying next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReloadError::Launch { .. })
    }
}

/// Run `command` (split on whitespace, no shell) and wait for it.
pub async fn reload(command: &str, deadline: Duration) -> Result<ReloadOutcome, ReloadError> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        tracing::debug!("Tried to reload haproxy but no reload command set");
        return Ok(ReloadOutcome::Skipped);
    };

    tracing::info!(command, "Reloading haproxy");

    let child = Command::new(program)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ReloadError::Launch {
            command: command.to_string(),
            source,
        })?;

    let output = with_deadline(
        deadline,
        async {
            child.wait_with_output().await.map_err(|source| ReloadError::Wait {
                command: command.to_string(),
                source,
            })
        },
        || ReloadError::Timeout {
            command: command.to_string(),
            deadline,
        },
    )
    .await?;

    if !output.status.success() {
        return Err(ReloadError::Exit {
            command: command.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(ReloadOutcome::Reloaded)
}
